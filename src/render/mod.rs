pub mod bars;
pub mod canvas;
pub mod frame;
pub mod gpu;
pub mod pipeline;
pub mod render_loop;
