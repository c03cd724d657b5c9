use std::path::Path;

use anyhow::Result;

pub fn load_rgba(path: &Path) -> Result<image::RgbaImage> {
    log::debug!("Loading image {}", path.display());

    Ok(image::open(path)?.to_rgba8())
}

/// A `size` x `size` board of `cells` x `cells` alternating squares.
pub fn checkerboard(size: u32, cells: u32, light: [u8; 4], dark: [u8; 4]) -> image::RgbaImage {
    let cell_size = (size / cells.max(1)).max(1);

    image::RgbaImage::from_fn(size, size, |x, y| {
        match (x / cell_size + y / cell_size) % 2 {
            0 => image::Rgba(light),
            _ => image::Rgba(dark),
        }
    })
}
