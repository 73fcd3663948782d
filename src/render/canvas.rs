//! 2D drawing surface and its software rasteriser.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Colour with 8-bit channels and a fractional alpha, like a CSS `rgba()`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 1.0)
    }

    fn lerp(self, other: Rgba, t: f32) -> Rgba {
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgba {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: self.a + (other.a - self.a) * t,
        }
    }
}

impl FromStr for Rgba {
    type Err = String;

    /// Parses `#rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .filter(|h| h.len() == 6 && h.is_ascii())
            .ok_or_else(|| format!("expected a #rrggbb colour, got '{}'", s))?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|_| format!("invalid hex digits in colour '{}'", s))
        };
        Ok(Rgba::opaque(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl TryFrom<String> for Rgba {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a >= 1.0 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Same area with non-negative extents.
    fn normalized(self) -> Self {
        let (x, width) = if self.width < 0.0 {
            (self.x + self.width, -self.width)
        } else {
            (self.x, self.width)
        };
        let (y, height) = if self.height < 0.0 {
            (self.y + self.height, -self.height)
        } else {
            (self.y, self.height)
        };
        Self { x, y, width, height }
    }
}

/// Two-stop linear gradient between `(x0, y0)` and `(x1, y1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearGradient {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub start: Rgba,
    pub end: Rgba,
}

impl LinearGradient {
    pub fn vertical(y0: f32, y1: f32, start: Rgba, end: Rgba) -> Self {
        Self {
            x0: 0.0,
            y0,
            x1: 0.0,
            y1,
            start,
            end,
        }
    }

    /// Colour at a point, or `None` for a degenerate gradient, which paints
    /// nothing.
    pub fn color_at(&self, x: f32, y: f32) -> Option<Rgba> {
        let dx = self.x1 - self.x0;
        let dy = self.y1 - self.y0;
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            return None;
        }
        let t = (((x - self.x0) * dx + (y - self.y0) * dy) / len_sq).clamp(0.0, 1.0);
        Some(self.start.lerp(self.end, t))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fill {
    Solid(Rgba),
    Linear(LinearGradient),
}

pub trait Canvas {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Resize the surface. Contents are cleared unless the size is unchanged.
    fn set_size(&mut self, width: u32, height: u32);

    /// Blend `fill` over `rect` (source-over).
    fn fill_rect(&mut self, rect: Rect, fill: &Fill);
}

/// Opaque RGBA8 canvas, initially black.
pub struct PixelCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        let mut canvas = Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        };
        canvas.set_size(width, height);
        canvas
    }

    /// Row-major RGBA bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    /// Pixel span whose centres fall inside `[start, start + len)`.
    fn span(start: f32, len: f32, limit: u32) -> std::ops::Range<u32> {
        let first = (start - 0.5).ceil().max(0.0);
        let last = (start + len - 0.5).ceil().min(limit as f32);
        if !(first < last) {
            return 0..0;
        }
        first as u32..last as u32
    }

    fn blend(&mut self, x: u32, y: u32, color: Rgba) {
        let a = color.a.clamp(0.0, 1.0);
        if a == 0.0 {
            return;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        let inv_a = 1.0 - a;
        // Truncate: repeated translucent fills must converge on the fill colour.
        self.pixels[idx] = (color.r as f32 * a + self.pixels[idx] as f32 * inv_a) as u8;
        self.pixels[idx + 1] = (color.g as f32 * a + self.pixels[idx + 1] as f32 * inv_a) as u8;
        self.pixels[idx + 2] = (color.b as f32 * a + self.pixels[idx + 2] as f32 * inv_a) as u8;
        self.pixels[idx + 3] = 255;
    }
}

impl Canvas for PixelCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_size(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels
            .resize((width as usize) * (height as usize) * 4, 0);
        for px in self.pixels.chunks_exact_mut(4) {
            px[3] = 255;
        }
    }

    fn fill_rect(&mut self, rect: Rect, fill: &Fill) {
        let rect = rect.normalized();
        let xs = Self::span(rect.x, rect.width, self.width);
        let ys = Self::span(rect.y, rect.height, self.height);

        for y in ys {
            for x in xs.clone() {
                let color = match fill {
                    Fill::Solid(color) => *color,
                    Fill::Linear(gradient) => {
                        match gradient.color_at(x as f32 + 0.5, y as f32 + 0.5) {
                            Some(color) => color,
                            None => return,
                        }
                    }
                };
                self.blend(x, y, color);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colours() {
        assert_eq!("#ff00ff".parse::<Rgba>().unwrap(), Rgba::opaque(255, 0, 255));
        assert_eq!("#00FFff".parse::<Rgba>().unwrap(), Rgba::opaque(0, 255, 255));
        assert!("ff00ff".parse::<Rgba>().is_err());
        assert!("#ff00f".parse::<Rgba>().is_err());
        assert!("#gg0000".parse::<Rgba>().is_err());
    }

    #[test]
    fn displays_like_css() {
        assert_eq!(Rgba::opaque(255, 0, 255).to_string(), "#ff00ff");
        assert_eq!(Rgba::new(0, 0, 0, 0.2).to_string(), "rgba(0, 0, 0, 0.2)");
    }

    #[test]
    fn starts_opaque_black() {
        let canvas = PixelCanvas::new(3, 2);
        assert_eq!(canvas.pixels().len(), 3 * 2 * 4);
        assert_eq!(canvas.pixel(2, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn solid_fill_covers_pixel_centres_only() {
        let mut canvas = PixelCanvas::new(4, 4);
        canvas.fill_rect(Rect::new(0.6, 1.0, 2.0, 1.0), &Fill::Solid(Rgba::opaque(255, 255, 255)));

        assert_eq!(canvas.pixel(0, 1), [0, 0, 0, 255]);
        assert_eq!(canvas.pixel(1, 1), [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(2, 1), [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(3, 1), [0, 0, 0, 255]);
        assert_eq!(canvas.pixel(1, 0), [0, 0, 0, 255]);
        assert_eq!(canvas.pixel(1, 2), [0, 0, 0, 255]);
    }

    #[test]
    fn translucent_fill_blends() {
        let mut canvas = PixelCanvas::new(1, 1);
        canvas.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), &Fill::Solid(Rgba::opaque(200, 100, 50)));
        canvas.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), &Fill::Solid(Rgba::new(0, 0, 0, 0.5)));
        assert_eq!(canvas.pixel(0, 0), [100, 50, 25, 255]);
    }

    #[test]
    fn repeated_fade_reaches_black() {
        let mut canvas = PixelCanvas::new(1, 1);
        canvas.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), &Fill::Solid(Rgba::opaque(255, 255, 255)));
        for _ in 0..40 {
            canvas.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), &Fill::Solid(Rgba::new(0, 0, 0, 0.2)));
        }
        assert_eq!(canvas.pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn fills_are_clipped_to_the_surface() {
        let mut canvas = PixelCanvas::new(2, 2);
        canvas.fill_rect(Rect::new(-5.0, -5.0, 100.0, 100.0), &Fill::Solid(Rgba::opaque(9, 9, 9)));
        assert!(canvas.pixels().chunks(4).all(|px| px == [9, 9, 9, 255]));

        canvas.fill_rect(Rect::new(2.0, 0.0, 3.0, 2.0), &Fill::Solid(Rgba::opaque(1, 1, 1)));
        assert!(canvas.pixels().chunks(4).all(|px| px == [9, 9, 9, 255]));
    }

    #[test]
    fn negative_extents_are_normalized() {
        let mut canvas = PixelCanvas::new(2, 1);
        canvas.fill_rect(Rect::new(2.0, 1.0, -1.0, -1.0), &Fill::Solid(Rgba::opaque(255, 0, 0)));
        assert_eq!(canvas.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(canvas.pixel(1, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn vertical_gradient_runs_top_to_bottom() {
        let start = Rgba::opaque(255, 0, 255);
        let end = Rgba::opaque(0, 255, 255);
        let mut canvas = PixelCanvas::new(1, 10);
        let gradient = LinearGradient::vertical(0.0, 10.0, start, end);
        canvas.fill_rect(Rect::new(0.0, 0.0, 1.0, 10.0), &Fill::Linear(gradient));

        let top = canvas.pixel(0, 0);
        let bottom = canvas.pixel(0, 9);
        assert!(top[0] > 230 && top[1] < 25);
        assert!(bottom[0] < 25 && bottom[1] > 230);
        assert_eq!(top[2], 255);
    }

    #[test]
    fn degenerate_gradient_paints_nothing() {
        let mut canvas = PixelCanvas::new(2, 2);
        let gradient = LinearGradient::vertical(1.0, 1.0, Rgba::opaque(255, 255, 255), Rgba::opaque(255, 255, 255));
        canvas.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0), &Fill::Linear(gradient));
        assert!(canvas.pixels().chunks(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn resize_reallocates_and_clears() {
        let mut canvas = PixelCanvas::new(2, 2);
        canvas.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0), &Fill::Solid(Rgba::opaque(255, 255, 255)));
        canvas.set_size(3, 1);
        assert_eq!((canvas.width(), canvas.height()), (3, 1));
        assert!(canvas.pixels().chunks(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn same_size_keeps_the_picture() {
        let mut canvas = PixelCanvas::new(2, 2);
        canvas.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0), &Fill::Solid(Rgba::opaque(255, 255, 255)));
        canvas.set_size(2, 2);
        assert!(canvas.pixels().chunks(4).all(|px| px == [255, 255, 255, 255]));
    }
}
