/*!
Screenshot helpers (feature `screenshot`).

Dumps a packed-pixel framebuffer to a PNG file via the `image` crate. The
buffer layout matches `Machine::framebuffer`: row-major, one little-endian
RGBA word per pixel.
*/

use std::path::Path;

use image::{ImageBuffer, Rgba};

/// Write `pixels` (row-major, `width * height` packed RGBA words) to `path`
/// as a PNG.
pub fn save_png<P: AsRef<Path>>(
    path: P,
    pixels: &[u32],
    width: u32,
    height: u32,
) -> Result<(), String> {
    if pixels.len() != (width as usize) * (height as usize) {
        return Err(format!(
            "Pixel buffer holds {} words; expected {}x{}",
            pixels.len(),
            width,
            height
        ));
    }

    let mut img = ImageBuffer::new(width, height);
    for (i, px) in pixels.iter().enumerate() {
        let x = (i as u32) % width;
        let y = (i as u32) / width;
        let [r, g, b, a] = px.to_le_bytes();
        img.put_pixel(x, y, Rgba([r, g, b, a]));
    }

    img.save(path)
        .map_err(|e| format!("Failed to write screenshot: {e}"))
}
