//! Known-schema decoding of Mapbox vector tiles.
//!
//! Unlike the schema-less path, field meaning is fixed here: a tile holds
//! layers, a layer holds features plus key/value dictionaries, and each
//! feature refers into those dictionaries through index pairs. Anything that
//! breaks those structural rules fails the whole buffer with
//! [`Error::TileDecode`].
//!
//! ## Example
//!
//! ```no_run
//! use rudnik_core::{TileAddress, TileDecoder};
//!
//! let data = std::fs::read("captures/vt_1700000000000_abcdef0123.pbf")?;
//! let address = TileAddress::from_sideband("https://example.com/vt?x=4823&y=3082&zoom=13");
//!
//! for (layer, features) in TileDecoder::new().decode(&data, &address)? {
//!     for feature in features {
//!         println!("{} {:?} {:?}", layer, feature.name, feature.geographic_coordinates);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod geometry;
pub mod schema;

use crate::error::{Error, Result};
use crate::geo::{self, TileAddress, DEFAULT_EXTENT};
use prost::Message;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

pub use geometry::{decode_geometry, Geometry, LocalPoint};

/// Property keys consulted, in order, for a feature's display name
pub const DEFAULT_NAME_KEYS: &[&str] = &["name", "title", "label", "caption"];

/// Decoded features grouped by layer name
pub type Layers = BTreeMap<String, Vec<TileFeature>>;

/// A feature property value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// `string_value`
    String(String),
    /// `float_value`
    Float(f32),
    /// `double_value`
    Double(f64),
    /// `int_value`
    Int(i64),
    /// `uint_value`
    UInt(u64),
    /// `sint_value`
    SInt(i64),
    /// `bool_value`
    Bool(bool),
    /// A value message with none of the above set
    Null,
}

impl From<&schema::Value> for PropertyValue {
    fn from(value: &schema::Value) -> Self {
        if let Some(s) = &value.string_value {
            PropertyValue::String(s.clone())
        } else if let Some(f) = value.float_value {
            PropertyValue::Float(f)
        } else if let Some(d) = value.double_value {
            PropertyValue::Double(d)
        } else if let Some(i) = value.int_value {
            PropertyValue::Int(i)
        } else if let Some(u) = value.uint_value {
            PropertyValue::UInt(u)
        } else if let Some(s) = value.sint_value {
            PropertyValue::SInt(s)
        } else if let Some(b) = value.bool_value {
            PropertyValue::Bool(b)
        } else {
            PropertyValue::Null
        }
    }
}

impl PropertyValue {
    /// Returns the string if this is a non-empty string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

/// One decoded vector tile feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileFeature {
    /// Name of the layer the feature belongs to
    pub layer_name: String,
    /// Feature id, if the tile set one
    pub id: Option<u64>,
    /// Display name taken from the first matching name property
    pub name: Option<String>,
    /// Resolved key/value properties
    pub properties: BTreeMap<String, PropertyValue>,
    /// Decoded geometry
    pub geometry: Geometry,
    /// Extent the local coordinates are expressed in
    pub extent: u32,
    /// Every geometry point in tile-local space
    pub local_coordinates: Vec<LocalPoint>,
    /// `(lon, lat)` of the first point, when the tile address is known
    pub geographic_coordinates: Option<(f64, f64)>,
}

/// Configuration for the tile decoder
#[derive(Debug, Clone, PartialEq)]
pub struct TileConfig {
    /// Extent used when a layer declares none (or zero)
    pub default_extent: u32,
    /// Property keys searched for a display name
    pub name_keys: Vec<String>,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            default_extent: DEFAULT_EXTENT,
            name_keys: DEFAULT_NAME_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl TileConfig {
    /// Creates a new tile config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback extent
    pub fn default_extent(mut self, extent: u32) -> Self {
        self.default_extent = extent;
        self
    }

    /// Sets the property keys searched for a display name
    pub fn name_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.name_keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// Decodes vector tiles into named layers of features
#[derive(Debug, Clone, Default)]
pub struct TileDecoder {
    config: TileConfig,
}

impl TileDecoder {
    /// Creates a decoder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder with custom configuration
    pub fn with_config(config: TileConfig) -> Self {
        Self { config }
    }

    /// Decode `buf`, georeferencing features when `address` is complete.
    pub fn decode(&self, buf: &[u8], address: &TileAddress) -> Result<Layers> {
        let tile = schema::Tile::decode(buf)?;
        let tile_id = address.complete();
        let mut layers = Layers::new();

        for layer in &tile.layers {
            let extent = match layer.extent() {
                0 => self.config.default_extent,
                extent => extent,
            };

            let features = layers.entry(layer.name.clone()).or_default();
            for feature in &layer.features {
                let mut decoded = self.decode_feature(layer, feature, extent)?;
                if let (Some(tile_id), Some((x, y))) = (tile_id, decoded.local_coordinates.first()) {
                    decoded.geographic_coordinates =
                        Some(geo::to_geographic(tile_id, extent, *x as f64, *y as f64));
                }
                features.push(decoded);
            }

            debug!(
                "Decoded layer '{}': {} features, extent {}",
                layer.name,
                layer.features.len(),
                extent
            );
        }

        Ok(layers)
    }

    fn decode_feature(
        &self,
        layer: &schema::Layer,
        feature: &schema::Feature,
        extent: u32,
    ) -> Result<TileFeature> {
        let properties = resolve_properties(layer, &feature.tags)?;
        let geometry = decode_geometry(feature.r#type(), &feature.geometry)?;

        let name = self
            .config
            .name_keys
            .iter()
            .find_map(|key| properties.get(key).and_then(PropertyValue::as_str))
            .map(str::to_owned);

        Ok(TileFeature {
            layer_name: layer.name.clone(),
            id: feature.id,
            name,
            local_coordinates: geometry.points(),
            properties,
            geometry,
            extent,
            geographic_coordinates: None,
        })
    }
}

/// Resolve a feature's `[key_index, value_index, ...]` tag list.
fn resolve_properties(
    layer: &schema::Layer,
    tags: &[u32],
) -> Result<BTreeMap<String, PropertyValue>> {
    if tags.len() % 2 != 0 {
        return Err(Error::tile_decode(format!(
            "layer '{}': odd number of feature tags ({})",
            layer.name,
            tags.len()
        )));
    }

    let mut properties = BTreeMap::new();
    for pair in tags.chunks_exact(2) {
        let key = layer.keys.get(pair[0] as usize).ok_or_else(|| {
            Error::tile_decode(format!(
                "layer '{}': key index {} out of range ({} keys)",
                layer.name,
                pair[0],
                layer.keys.len()
            ))
        })?;
        let value = layer.values.get(pair[1] as usize).ok_or_else(|| {
            Error::tile_decode(format!(
                "layer '{}': value index {} out of range ({} values)",
                layer.name,
                pair[1],
                layer.values.len()
            ))
        })?;
        properties.insert(key.clone(), PropertyValue::from(value));
    }

    Ok(properties)
}

/// Decode `buf` with default configuration and no tile address.
pub fn decode_tile(buf: &[u8]) -> Result<Layers> {
    TileDecoder::new().decode(buf, &TileAddress::default())
}
