//! RGBA8 tile images on top of [`image::RgbaImage`].

use std::fmt;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{ImageResult, RgbaImage};

use crate::geom::Rect;

pub type Rgba = [u8; 4];

pub const TRANSPARENT: Rgba = [0, 0, 0, 0];

#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    buf: RgbaImage,
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({}x{})", self.buf.width(), self.buf.height())
    }
}

impl From<RgbaImage> for Image {
    fn from(buf: RgbaImage) -> Self {
        Self { buf }
    }
}

impl Image {
    /// Fully transparent image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: RgbaImage::new(width, height),
        }
    }

    pub fn solid(width: u32, height: u32, color: Rgba) -> Self {
        Self {
            buf: RgbaImage::from_pixel(width, height, image::Rgba(color)),
        }
    }

    /// `cells x cells` checkerboard; the top-left cell uses `a`.
    pub fn checkerboard(size: u32, cells: u32, a: Rgba, b: Rgba) -> Self {
        let cell = (size / cells.max(1)).max(1);
        let buf = RgbaImage::from_fn(size, size, |x, y| {
            image::Rgba(if (x / cell) % 2 == (y / cell) % 2 { a } else { b })
        });
        Self { buf }
    }

    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.buf
    }

    /// Panics if `(x, y)` is outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        self.buf.get_pixel(x, y).0
    }

    /// Replace the pixels under `src` placed at `(dx, dy)`. Clipped to bounds.
    pub fn copy_from(&mut self, src: &Image, dx: u32, dy: u32) {
        imageops::replace(&mut self.buf, &src.buf, dx as i64, dy as i64);
    }

    /// Copy the pixels of `src` inside `area` to the same position here.
    pub fn copy_region_from(&mut self, src: &Image, area: Rect) {
        let (x0, y0) = (area.min.x.max(0), area.min.y.max(0));
        let (x1, y1) = (area.max.x.max(x0), area.max.y.max(y0));
        let region = imageops::crop_imm(&src.buf, x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32);
        imageops::replace(&mut self.buf, &region.to_image(), x0 as i64, y0 as i64);
    }

    /// Resample all of `src` into `area` of this image with a triangle filter.
    pub fn scale_from(&mut self, src: &Image, area: Rect) {
        if area.is_empty() || src.width() == 0 || src.height() == 0 {
            return;
        }
        let scaled = imageops::resize(&src.buf, area.width() as u32, area.height() as u32, FilterType::Triangle);
        imageops::replace(&mut self.buf, &scaled, area.min.x as i64, area.min.y as i64);
    }

    /// Write the image; the format follows the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> ImageResult<()> {
        self.buf.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = [255, 0, 0, 255];
    const BLUE: Rgba = [0, 0, 255, 255];

    #[test]
    fn test_copy_from_clips() {
        let mut dst = Image::new(20, 20);
        dst.copy_from(&Image::solid(16, 16, RED), 10, 10);
        assert_eq!(dst.pixel(10, 10), RED);
        assert_eq!(dst.pixel(19, 19), RED);
        assert_eq!(dst.pixel(9, 9), TRANSPARENT);
    }

    #[test]
    fn test_copy_region_same_position() {
        let pattern = Image::checkerboard(256, 8, RED, BLUE);
        let mut dst = Image::new(256, 256);
        dst.copy_region_from(&pattern, Rect::new(128, 0, 256, 128));
        assert_eq!(dst.pixel(128, 0), pattern.pixel(128, 0));
        assert_eq!(dst.pixel(160, 0), pattern.pixel(160, 0));
        assert_eq!(dst.pixel(255, 127), pattern.pixel(255, 127));
        assert_eq!(dst.pixel(0, 0), TRANSPARENT);
        assert_eq!(dst.pixel(128, 128), TRANSPARENT);
    }

    #[test]
    fn test_checkerboard_cells() {
        let img = Image::checkerboard(256, 8, RED, BLUE);
        assert_eq!(img.pixel(0, 0), RED);
        assert_eq!(img.pixel(32, 0), BLUE);
        assert_eq!(img.pixel(32, 32), RED);
        assert_eq!(img.pixel(255, 0), BLUE);
    }

    #[test]
    fn test_downscale_uniform_stays_uniform() {
        let src = Image::solid(256, 256, RED);
        let mut dst = Image::new(256, 256);
        dst.scale_from(&src, Rect::new(128, 128, 256, 256));
        assert_eq!(dst.pixel(128, 128), RED);
        assert_eq!(dst.pixel(255, 255), RED);
        assert_eq!(dst.pixel(127, 127), TRANSPARENT);
    }

    #[test]
    fn test_downscale_halves_blocks() {
        // Left half red, right half blue: away from the seam the halves
        // survive a 2x downscale unblended.
        let mut src = Image::solid(256, 256, BLUE);
        src.copy_from(&Image::solid(128, 256, RED), 0, 0);
        let mut dst = Image::new(128, 128);
        dst.scale_from(&src, Rect::new(0, 0, 128, 128));
        assert_eq!(dst.pixel(0, 0), RED);
        assert_eq!(dst.pixel(60, 64), RED);
        assert_eq!(dst.pixel(68, 64), BLUE);
        assert_eq!(dst.pixel(127, 127), BLUE);
    }

    #[test]
    fn test_save_png() {
        let path = std::env::temp_dir().join(format!("bedrockview-tiles-{}.png", std::process::id()));
        let img = Image::checkerboard(16, 2, RED, BLUE);
        img.save(&path).unwrap();
        let back = image::open(&path).unwrap().to_rgba8();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(Image::from(back), img);
    }
}
