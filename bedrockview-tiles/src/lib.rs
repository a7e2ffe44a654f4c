//! Level-of-detail tile pyramid.
//!
//! A [`TileSource`] supplies 16x16 pixel images for single units. The
//! [`TileServer`] composes 16x16 of them into 256x256 base tiles, then
//! builds every coarser power-of-two level by downsampling four children
//! into one 256x256 tile. Tiles that cover nothing share one image per
//! level.

use anyhow::Result;

pub mod geom;
pub mod image;
pub mod server;

pub use crate::image::{Image, Rgba};
pub use geom::{Point, Rect};
pub use server::{CacheStats, Tile, TileServer};

/// Side length of every tile image, in pixels.
pub const TILE_SIZE: u32 = 256;
/// Side length of one unit image, in pixels.
pub const UNIT_SIZE: u32 = 16;
/// Smallest tile, in units.
pub const BASE_UNITS: u32 = 16;
/// Largest tile, in units. One tile of this size spans the whole
/// ±30,000,000 block world border.
pub const MAX_UNITS: u32 = 1 << 26;

/// Provider of unit images.
pub trait TileSource {
    /// Image for one unit, or `None` when there is nothing there.
    fn get(&mut self, x: i32, y: i32) -> Result<Option<Image>>;

    /// True only if every unit in `area` is known to be empty.
    fn all_empty(&mut self, area: Rect) -> Result<bool>;

    /// Human readable description of one unit.
    fn info(&mut self, x: i32, y: i32) -> Result<String>;
}
