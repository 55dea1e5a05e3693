use breedblink::image_pool::Thumbnail;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Paragraph, Widget, Wrap},
};

const HALF_BLOCK: &str = "▀";
const PLACEHOLDER: &str = "no picture this time\ntrust your nose";

/// Paints a thumbnail with half-block cells: the upper pixel is the
/// foreground colour, the lower pixel the background. Hidden pictures leave
/// the area blank; a missing one draws a placeholder box.
pub struct Picture<'a> {
    thumbnail: Option<&'a Thumbnail>,
    visible: bool,
}

impl<'a> Picture<'a> {
    pub fn new(thumbnail: Option<&'a Thumbnail>, visible: bool) -> Self {
        Self { thumbnail, visible }
    }
}

/// Downscale factor so `thumb` fits `area` (never upscales)
pub fn fit_scale(thumb: &Thumbnail, area: Rect) -> f64 {
    if area.width == 0 || area.height == 0 {
        return f64::INFINITY;
    }
    let sx = thumb.width as f64 / area.width as f64;
    let sy = thumb.height as f64 / (area.height as f64 * 2.0);
    sx.max(sy).max(1.0)
}

fn rgb([r, g, b]: [u8; 3]) -> Color {
    Color::Rgb(r, g, b)
}

impl Widget for Picture<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if !self.visible || area.is_empty() {
            return;
        }

        let Some(thumb) = self.thumbnail.filter(|t| !t.is_empty()) else {
            let width = 26.min(area.width);
            let height = 4.min(area.height);
            let boxed = Rect::new(
                area.x + (area.width - width) / 2,
                area.y + (area.height - height) / 2,
                width,
                height,
            );
            Paragraph::new(PLACEHOLDER)
                .style(Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(Block::bordered())
                .render(boxed, buf);
            return;
        };

        let scale = fit_scale(thumb, area);
        let cols = ((thumb.width as f64 / scale) as u16).min(area.width);
        let pixel_rows = (thumb.height as f64 / scale) as u32;
        let rows = (pixel_rows.div_ceil(2) as u16).min(area.height);
        let x0 = area.x + (area.width - cols) / 2;
        let y0 = area.y + (area.height - rows) / 2;

        for row in 0..rows {
            for col in 0..cols {
                let sample = |py: u32| {
                    let sx = (col as f64 * scale) as u32;
                    let sy = (py as f64 * scale) as u32;
                    thumb.pixel(sx, sy)
                };
                let top = sample(row as u32 * 2);
                let bottom = sample(row as u32 * 2 + 1);
                if let Some(cell) = buf.cell_mut((x0 + col, y0 + row)) {
                    cell.set_symbol(HALF_BLOCK);
                    if let Some(top) = top {
                        cell.set_fg(rgb(top));
                    }
                    if let Some(bottom) = bottom {
                        cell.set_bg(rgb(bottom));
                    }
                }
            }
        }
    }
}
