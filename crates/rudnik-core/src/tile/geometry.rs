//! Vector tile geometry command decoding.
//!
//! A geometry is a stream of `u32`s: a command integer (`id | count << 3`)
//! followed by `count` parameter pairs for MoveTo (1) and LineTo (2), or none
//! for ClosePath (7). Parameters are zig-zag encoded deltas from the cursor.

use super::schema::GeomType;
use crate::error::{Error, Result};
use serde::Serialize;

const MOVE_TO: u32 = 1;
const LINE_TO: u32 = 2;
const CLOSE_PATH: u32 = 7;

/// A point in tile-local integer space
pub type LocalPoint = (i64, i64);

/// Decoded feature geometry; multi-geometries keep one entry per part
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    /// One or more points
    Point(Vec<LocalPoint>),
    /// One or more lines
    LineString(Vec<Vec<LocalPoint>>),
    /// One or more rings, each closed on its first point
    Polygon(Vec<Vec<LocalPoint>>),
    /// The feature declared no usable geometry type
    Unknown,
}

impl Geometry {
    /// All points of the geometry, in command order
    pub fn points(&self) -> Vec<LocalPoint> {
        match self {
            Geometry::Point(points) => points.clone(),
            Geometry::LineString(parts) | Geometry::Polygon(parts) => {
                parts.iter().flatten().copied().collect()
            }
            Geometry::Unknown => Vec::new(),
        }
    }

    /// The first point, if any
    pub fn first_point(&self) -> Option<LocalPoint> {
        match self {
            Geometry::Point(points) => points.first().copied(),
            Geometry::LineString(parts) | Geometry::Polygon(parts) => {
                parts.iter().flatten().next().copied()
            }
            Geometry::Unknown => None,
        }
    }
}

fn zigzag(value: u32) -> i64 {
    i64::from(value >> 1) ^ -i64::from(value & 1)
}

/// Decode a command stream into parts (one per MoveTo).
fn decode_parts(commands: &[u32]) -> Result<Vec<Vec<LocalPoint>>> {
    let mut parts: Vec<Vec<LocalPoint>> = Vec::new();
    let mut cursor: LocalPoint = (0, 0);
    let mut i = 0;

    while i < commands.len() {
        let command = commands[i];
        let id = command & 0x7;
        let count = (command >> 3) as usize;
        i += 1;

        match id {
            MOVE_TO | LINE_TO => {
                let params = &commands[i..];
                if params.len() / 2 < count {
                    return Err(Error::tile_decode(format!(
                        "geometry command {} wants {} points, {} parameters remain",
                        id,
                        count,
                        params.len()
                    )));
                }
                if id == LINE_TO && parts.is_empty() {
                    return Err(Error::tile_decode("LineTo before any MoveTo"));
                }

                for pair in params[..count * 2].chunks_exact(2) {
                    cursor.0 += zigzag(pair[0]);
                    cursor.1 += zigzag(pair[1]);
                    if id == MOVE_TO {
                        parts.push(vec![cursor]);
                    } else if let Some(part) = parts.last_mut() {
                        part.push(cursor);
                    }
                }
                i += count * 2;
            }
            CLOSE_PATH => {
                let part = parts
                    .last_mut()
                    .ok_or_else(|| Error::tile_decode("ClosePath before any MoveTo"))?;
                if let Some(&first) = part.first() {
                    part.push(first);
                }
            }
            other => {
                return Err(Error::tile_decode(format!(
                    "unknown geometry command {}",
                    other
                )))
            }
        }
    }

    Ok(parts)
}

/// Decode the geometry of a feature of the given type.
pub fn decode_geometry(kind: GeomType, commands: &[u32]) -> Result<Geometry> {
    Ok(match kind {
        GeomType::Point => Geometry::Point(decode_parts(commands)?.into_iter().flatten().collect()),
        GeomType::Linestring => Geometry::LineString(decode_parts(commands)?),
        GeomType::Polygon => Geometry::Polygon(decode_parts(commands)?),
        GeomType::Unknown => Geometry::Unknown,
    })
}
