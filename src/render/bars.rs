//! Bar geometry and per-frame painting.

use super::canvas::{Canvas, Fill, LinearGradient, Rect, Rgba};

/// Visual constants of the bar spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarStyle {
    /// Share of each bar slot taken by the bar itself.
    pub bar_width_ratio: f32,
    /// Bar height at full magnitude, as a share of the canvas height.
    pub max_height_ratio: f32,
    /// Opacity of the black overlay that fades the previous frame.
    pub fade_alpha: f32,
    pub line_count: usize,
    pub line_alpha: f32,
    pub line_height: f32,
    pub gradient_start: Rgba,
    pub gradient_end: Rgba,
}

impl Default for BarStyle {
    fn default() -> Self {
        Self {
            bar_width_ratio: 0.8,
            max_height_ratio: 0.8,
            fade_alpha: 0.2,
            line_count: 5,
            line_alpha: 0.3,
            line_height: 2.0,
            gradient_start: Rgba::opaque(0xff, 0x00, 0xff),
            gradient_end: Rgba::opaque(0x00, 0xff, 0xff),
        }
    }
}

/// Horizontal placement of `count` bars across a canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarLayout {
    pub count: usize,
    pub bar_width: f32,
    pub spacing: f32,
    /// Left margin of the centred block.
    pub start_x: f32,
}

impl BarLayout {
    pub fn new(canvas_width: f32, count: usize, bar_width_ratio: f32) -> Self {
        if count == 0 {
            return Self {
                count,
                bar_width: 0.0,
                spacing: 0.0,
                start_x: canvas_width / 2.0,
            };
        }
        let slot = canvas_width / count as f32;
        let bar_width = slot * bar_width_ratio;
        let mut layout = Self {
            count,
            bar_width,
            spacing: slot - bar_width,
            start_x: 0.0,
        };
        layout.start_x = (canvas_width - layout.total_width()) / 2.0;
        layout
    }

    pub fn x(&self, index: usize) -> f32 {
        self.start_x + index as f32 * (self.bar_width + self.spacing)
    }

    pub fn total_width(&self) -> f32 {
        (self.bar_width + self.spacing) * self.count as f32
    }
}

/// Height of a bar for a byte magnitude.
pub fn bar_height(magnitude: u8, canvas_height: f32, max_height_ratio: f32) -> f32 {
    (magnitude as f32 / 255.0) * canvas_height * max_height_ratio
}

/// Paint one frame: fade the previous one, then draw a bar per magnitude.
pub fn paint_frame<C: Canvas + ?Sized>(canvas: &mut C, magnitudes: &[u8], style: &BarStyle) {
    let width = canvas.width() as f32;
    let height = canvas.height() as f32;

    canvas.fill_rect(
        Rect::new(0.0, 0.0, width, height),
        &Fill::Solid(Rgba::new(0, 0, 0, style.fade_alpha)),
    );

    let layout = BarLayout::new(width, magnitudes.len(), style.bar_width_ratio);
    for (i, &magnitude) in magnitudes.iter().enumerate() {
        let bar = bar_height(magnitude, height, style.max_height_ratio);
        if bar <= 0.0 {
            continue;
        }
        draw_bar(canvas, layout.x(i), layout.bar_width, bar, style);
    }
}

fn draw_bar<C: Canvas + ?Sized>(canvas: &mut C, x: f32, width: f32, bar: f32, style: &BarStyle) {
    let bottom = canvas.height() as f32;
    let top = bottom - bar;

    let gradient = LinearGradient::vertical(top, bottom, style.gradient_start, style.gradient_end);
    canvas.fill_rect(Rect::new(x, top, width, bar), &Fill::Linear(gradient));

    if style.line_count == 0 {
        return;
    }
    let line_spacing = bar / style.line_count as f32;
    let line = Fill::Solid(Rgba::new(0, 0, 0, style.line_alpha));
    for j in 0..style.line_count {
        canvas.fill_rect(
            Rect::new(x, top + j as f32 * line_spacing, width, style.line_height),
            &line,
        );
    }
}
