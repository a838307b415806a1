use crate::layout::AtlasLayout;
use image::{Rgba, RgbaImage};

/// Rasterize a layout into a flat-colored preview image.
///
/// - `color`: fill color per source material
/// - `outlines`: if true, draw a red 1px outline around every quad
///
/// UV v grows upward, image y grows downward; quads are flipped accordingly.
pub fn render_layout_preview<M, F>(layout: &AtlasLayout<M>, color: F, outlines: bool) -> RgbaImage
where
    F: Fn(&M) -> Rgba<u8>,
{
    let mut canvas = RgbaImage::new(layout.width, layout.height);
    let (cw, ch) = (layout.width as f64, layout.height as f64);
    for quad in &layout.quads {
        let t = quad.target;
        let x0 = (t.x * cw).floor().max(0.0) as u32;
        let x1 = ((t.x + t.w) * cw).ceil().max(0.0) as u32;
        let y0 = ((1.0 - t.y - t.h) * ch).floor().max(0.0) as u32;
        let y1 = ((1.0 - t.y) * ch).ceil().max(0.0) as u32;
        fill_rect(
            &mut canvas,
            x0,
            y0,
            x1.saturating_sub(x0),
            y1.saturating_sub(y0),
            color(&quad.material),
            outlines,
        );
    }
    canvas
}

/// Fill `(dx, dy, w, h)` clipped to the canvas, optionally with a red outline.
pub fn fill_rect(
    canvas: &mut RgbaImage,
    dx: u32,
    dy: u32,
    w: u32,
    h: u32,
    px: Rgba<u8>,
    outlines: bool,
) {
    let (cw, ch) = canvas.dimensions();
    for yy in 0..h {
        for xx in 0..w {
            if dx + xx < cw && dy + yy < ch {
                canvas.put_pixel(dx + xx, dy + yy, px);
            }
        }
    }

    if outlines && w > 0 && h > 0 {
        let red = Rgba([255, 0, 0, 255]);
        for xx in 0..w {
            if dx + xx < cw && dy < ch {
                canvas.put_pixel(dx + xx, dy, red);
            }
            let by = dy + h - 1;
            if dx + xx < cw && by < ch {
                canvas.put_pixel(dx + xx, by, red);
            }
        }
        for yy in 0..h {
            if dx < cw && dy + yy < ch {
                canvas.put_pixel(dx, dy + yy, red);
            }
            let rx = dx + w - 1;
            if rx < cw && dy + yy < ch {
                canvas.put_pixel(rx, dy + yy, red);
            }
        }
    }
}

/// Stable color for a material name, used when a scene does not assign one.
pub fn name_color(name: &str) -> Rgba<u8> {
    // FNV-1a
    let hash = name
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ b as u64).wrapping_mul(0x0100_0000_01b3));
    let [r, g, b, ..] = hash.to_le_bytes();
    Rgba([r | 0x40, g | 0x40, b | 0x40, 255])
}
