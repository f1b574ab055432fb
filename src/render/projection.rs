//! Web Mercator math for placing tiles and markers on the output image.

use std::f64::consts::PI;

use crate::request::Point;

/// Latitude limit of the square Web Mercator world.
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Pixel frame of the output image inside the world at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: u32,
    pub tile_size: u32,
    pub width: u32,
    pub height: u32,

    /// World pixel of the image's top-left corner
    origin_x: i64,
    origin_y: i64,
}

/// Inclusive range of tile indices covering a viewport.
///
/// `x` may fall outside `0..tiles_per_axis` near the antimeridian and must
/// be wrapped before fetching; `y` outside that range has no tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
}

impl TileRange {
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        (self.y_min..=self.y_max).flat_map(move |y| (self.x_min..=self.x_max).map(move |x| (x, y)))
    }

    pub fn len(&self) -> usize {
        ((self.x_max - self.x_min + 1) * (self.y_max - self.y_min + 1)) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Viewport {
    pub fn new(center: Point, zoom: u32, width: u32, height: u32, tile_size: u32) -> Self {
        let (cx, cy) = world_pixel(center, zoom, tile_size);
        Self {
            zoom,
            tile_size,
            width,
            height,
            origin_x: (cx - width as f64 / 2.0).round() as i64,
            origin_y: (cy - height as f64 / 2.0).round() as i64,
        }
    }

    /// Tiles along each axis at this zoom.
    pub fn tiles_per_axis(&self) -> i64 {
        1i64 << self.zoom
    }

    /// Position of `point` in image pixels. May lie outside the image.
    pub fn project(&self, point: Point) -> (f64, f64) {
        let (x, y) = world_pixel(point, self.zoom, self.tile_size);
        (x - self.origin_x as f64, y - self.origin_y as f64)
    }

    pub fn tile_range(&self) -> TileRange {
        let ts = self.tile_size as i64;
        TileRange {
            x_min: self.origin_x.div_euclid(ts),
            x_max: (self.origin_x + self.width as i64 - 1).div_euclid(ts),
            y_min: self.origin_y.div_euclid(ts),
            y_max: (self.origin_y + self.height as i64 - 1).div_euclid(ts),
        }
    }

    /// Image pixel of the top-left corner of tile (`x`, `y`).
    pub fn tile_offset(&self, x: i64, y: i64) -> (i64, i64) {
        let ts = self.tile_size as i64;
        (x * ts - self.origin_x, y * ts - self.origin_y)
    }

    /// Wrap a tile column around the antimeridian; `None` for rows outside the world.
    pub fn wrap_tile(&self, x: i64, y: i64) -> Option<(u32, u32)> {
        let n = self.tiles_per_axis();
        if !(0..n).contains(&y) {
            return None;
        }
        Some((x.rem_euclid(n) as u32, y as u32))
    }
}

/// Position of `point` in world pixels at `zoom`.
fn world_pixel(point: Point, zoom: u32, tile_size: u32) -> (f64, f64) {
    let world = tile_size as f64 * (1u64 << zoom) as f64;
    let lat = point
        .lat()
        .clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT)
        .to_radians();

    let x = (point.lon() + 180.0) / 360.0 * world;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * world;
    (x, y)
}
