//! Slippy-map tile addressing and tile-local to geographic conversion.
//!
//! Tiles use the Web Mercator scheme: at zoom `z` the world is split into
//! `2^z × 2^z` tiles, `x` growing eastward and `y` growing southward. Inside
//! a tile, local coordinates run from `0` to `extent` with the origin at the
//! top-left corner.

use serde::Serialize;
use std::f64::consts::PI;

/// Local coordinate extent assumed when a layer does not declare one
pub const DEFAULT_EXTENT: u32 = 4096;

/// A fully known tile address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileId {
    /// Zoom level
    pub zoom: u32,
    /// Column, counted from the antimeridian eastward
    pub x: u32,
    /// Row, counted from the north edge southward
    pub y: u32,
}

/// A tile address whose components may be unknown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct TileAddress {
    /// Zoom level, if known
    pub zoom: Option<u32>,
    /// Column, if known
    pub x: Option<u32>,
    /// Row, if known
    pub y: Option<u32>,
}

impl TileAddress {
    /// Creates a fully known address
    pub fn new(zoom: u32, x: u32, y: u32) -> Self {
        Self {
            zoom: Some(zoom),
            x: Some(x),
            y: Some(y),
        }
    }

    /// Returns the tile id when every component is known
    pub fn complete(&self) -> Option<TileId> {
        Some(TileId {
            zoom: self.zoom?,
            x: self.x?,
            y: self.y?,
        })
    }
}

impl From<TileId> for TileAddress {
    fn from(tile: TileId) -> Self {
        Self::new(tile.zoom, tile.x, tile.y)
    }
}

/// Geographic bounding box of a tile, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TileBounds {
    /// Western longitude
    pub west: f64,
    /// Southern latitude
    pub south: f64,
    /// Eastern longitude
    pub east: f64,
    /// Northern latitude
    pub north: f64,
}

impl TileId {
    /// Creates a new tile id
    pub fn new(zoom: u32, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Geographic bounds of this tile
    pub fn bounds(&self) -> TileBounds {
        let n = 2f64.powf(f64::from(self.zoom));
        let x = f64::from(self.x);
        let y = f64::from(self.y);

        TileBounds {
            west: tile_x_to_lon(x, n),
            south: tile_y_to_lat(y + 1.0, n),
            east: tile_x_to_lon(x + 1.0, n),
            north: tile_y_to_lat(y, n),
        }
    }
}

fn tile_x_to_lon(x: f64, n: f64) -> f64 {
    x / n * 360.0 - 180.0
}

fn tile_y_to_lat(y: f64, n: f64) -> f64 {
    (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees()
}

/// Convert a tile-local point to `(longitude, latitude)`.
///
/// Local `y` grows downward while latitude grows upward, so latitude is
/// measured from the north edge. An `extent` of 0 is read as
/// [`DEFAULT_EXTENT`].
pub fn to_geographic(tile: TileId, extent: u32, local_x: f64, local_y: f64) -> (f64, f64) {
    let extent = f64::from(if extent == 0 { DEFAULT_EXTENT } else { extent });
    let bounds = tile.bounds();

    let longitude = bounds.west + (local_x / extent) * (bounds.east - bounds.west);
    let latitude = bounds.north - (local_y / extent) * (bounds.north - bounds.south);
    (longitude, latitude)
}
