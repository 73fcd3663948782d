pub mod analysis;
pub mod capture;
pub mod cpal_backend;
pub mod session;
