//! # rudnik-core
//!
//! A library for pulling place names and coordinates out of captured
//! Protocol Buffer responses, with or without their schema.
//!
//! This crate provides the core functionality for:
//! - Reading raw protobuf wire format without a schema
//! - Walking noisy buffers field by field, resynchronising after corrupt bytes
//! - Labelling fields as text, coordinate-like numbers, or opaque spans
//! - Decoding Mapbox vector tiles and placing their features on the globe
//!
//! ## Architecture
//!
//! The schema-less path is layered leaves first:
//!
//! - [`wire`]: varint, fixed-width and span primitives
//! - [`field`]: one key + payload at a time
//! - [`walker`]: every field of a buffer, skipping what does not decode
//! - [`classify`]: heuristic labelling and nested-message descent
//!
//! The known-schema path lives in [`tile`] and [`geo`]; [`sideband`] recovers
//! tile addresses from request metadata and [`pipeline`] ties both paths to
//! captures.
//!
//! ## Example
//!
//! ```no_run
//! use rudnik_core::{Capture, Pipeline};
//!
//! let capture = Capture::from_path("captures/search_1700000000000_0123456789.pbf")?;
//! let result = Pipeline::new().probe(&capture);
//!
//! for item in &result.items {
//!     if let Some(text) = item.as_text() {
//!         println!("field {}: {}", item.field_number, text);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod classify;
pub mod error;
pub mod field;
pub mod geo;
pub mod pipeline;
pub mod sideband;
pub mod tile;
pub mod walker;
pub mod wire;

// Re-export primary types for convenience
pub use classify::{ClassifiedItem, Classifier, ClassifierConfig, ItemValue};
pub use error::{Error, Result};
pub use field::{decode_field, DecodedField, Payload};
pub use geo::{to_geographic, TileAddress, TileBounds, TileId};
pub use pipeline::{Capture, CaptureFailure, ExtractionResult, Pipeline, PlaceRecord, TileExtraction};
pub use tile::{decode_tile, Geometry, PropertyValue, TileConfig, TileDecoder, TileFeature};
pub use walker::{walk, FieldWalker};
pub use wire::WireType;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
