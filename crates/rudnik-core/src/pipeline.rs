//! Per-capture processing for both decoding paths.
//!
//! A [`Capture`] is one response body plus optional request metadata. The
//! [`Pipeline`] runs it through either the schema-less path
//! ([`Pipeline::probe`]) or the vector tile path
//! ([`Pipeline::decode_tiles`]). Captures never share state, so the batch
//! variants fan out across a rayon pool and keep input order.

use crate::classify::{ClassifiedItem, Classifier, ClassifierConfig};
use crate::error::{Error, Result};
use crate::geo::TileAddress;
use crate::tile::{Layers, PropertyValue, TileConfig, TileDecoder};
use bytes::Bytes;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix of the request metadata file stored next to a capture
pub const SIDECAR_SUFFIX: &str = ".meta.txt";

/// One captured response body
#[derive(Debug, Clone)]
pub struct Capture {
    /// Name the capture is reported under (usually its path)
    pub source_identifier: String,
    /// Raw response bytes
    pub data: Bytes,
    /// Request URL and headers, if recorded
    pub sideband: Option<String>,
}

impl Capture {
    /// Creates a capture without metadata
    pub fn new(source_identifier: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            source_identifier: source_identifier.into(),
            data: data.into(),
            sideband: None,
        }
    }

    /// Attaches request metadata
    pub fn with_sideband(mut self, sideband: impl Into<String>) -> Self {
        self.sideband = Some(sideband.into());
        self
    }

    /// Path of the metadata file for the capture at `path`
    pub fn sidecar_path(path: &Path) -> PathBuf {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(SIDECAR_SUFFIX);
        PathBuf::from(sidecar)
    }

    /// Read a capture and, if present, its metadata sidecar
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| Error::file_read(path, e))?;

        let sidecar = Self::sidecar_path(path);
        let sideband = match fs::read(&sidecar) {
            Ok(raw) => Some(String::from_utf8_lossy(&raw).into_owned()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::file_read(sidecar, e)),
        };

        Ok(Self {
            source_identifier: path.display().to_string(),
            data: Bytes::from(data),
            sideband,
        })
    }

    /// Tile address mentioned by the metadata (all unknown without it)
    pub fn tile_address(&self) -> TileAddress {
        self.sideband
            .as_deref()
            .map(TileAddress::from_sideband)
            .unwrap_or_default()
    }
}

/// Schema-less extraction result for one capture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    /// Capture the items came from
    pub source_identifier: String,
    /// Size of the capture in bytes
    pub byte_length: usize,
    /// Classified items in document order
    pub items: Vec<ClassifiedItem>,
}

/// Vector tile extraction result for one capture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileExtraction {
    /// Capture the features came from
    pub source_identifier: String,
    /// Tile address recovered from the metadata
    pub address: TileAddress,
    /// Features grouped by layer
    pub features: Layers,
}

/// One named place found in a vector tile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceRecord {
    /// Capture the place came from
    pub source_file: String,
    /// Layer name
    pub layer: String,
    /// Display name
    pub name: String,
    /// All feature properties
    pub properties: BTreeMap<String, PropertyValue>,
    /// First geometry point in tile-local space
    pub coords_tile: (i64, i64),
    /// Geographic position of `coords_tile`, when the tile address is known
    pub lonlat: Option<(f64, f64)>,
}

impl TileExtraction {
    /// Total number of features across layers
    pub fn feature_count(&self) -> usize {
        self.features.values().map(Vec::len).sum()
    }

    /// Features that have both a display name and a point, as place records
    pub fn place_records(&self) -> Vec<PlaceRecord> {
        self.features
            .iter()
            .flat_map(|(layer, features)| features.iter().map(move |f| (layer, f)))
            .filter_map(|(layer, feature)| {
                let name = feature.name.clone()?;
                let coords_tile = *feature.local_coordinates.first()?;
                Some(PlaceRecord {
                    source_file: self.source_identifier.clone(),
                    layer: layer.clone(),
                    name,
                    properties: feature.properties.clone(),
                    coords_tile,
                    lonlat: feature.geographic_coordinates,
                })
            })
            .collect()
    }
}

/// A capture that could not be processed
#[derive(Debug, thiserror::Error)]
#[error("{source_identifier}: {error}")]
pub struct CaptureFailure {
    /// Capture that failed
    pub source_identifier: String,
    /// What went wrong
    #[source]
    pub error: Error,
}

/// Both decoding paths, configured once and shared across captures
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    classifier: Classifier,
    tiles: TileDecoder,
}

impl Pipeline {
    /// Creates a pipeline with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pipeline with custom configuration
    pub fn with_config(classifier: ClassifierConfig, tiles: TileConfig) -> Self {
        Self {
            classifier: Classifier::with_config(classifier),
            tiles: TileDecoder::with_config(tiles),
        }
    }

    /// Run the schema-less path on one capture
    pub fn probe(&self, capture: &Capture) -> ExtractionResult {
        let items = self.classifier.extract(&capture.data);
        debug!(
            "{}: {} items from {} bytes",
            capture.source_identifier,
            items.len(),
            capture.data.len()
        );

        ExtractionResult {
            source_identifier: capture.source_identifier.clone(),
            byte_length: capture.data.len(),
            items,
        }
    }

    /// Run the vector tile path on one capture
    pub fn decode_tiles(&self, capture: &Capture) -> std::result::Result<TileExtraction, CaptureFailure> {
        let address = capture.tile_address();
        if address.complete().is_none() {
            debug!(
                "{}: incomplete tile address {:?}, skipping georeferencing",
                capture.source_identifier, address
            );
        }

        match self.tiles.decode(&capture.data, &address) {
            Ok(features) => Ok(TileExtraction {
                source_identifier: capture.source_identifier.clone(),
                address,
                features,
            }),
            Err(error) => {
                debug!("{}: tile decode failed: {}", capture.source_identifier, error);
                Err(CaptureFailure {
                    source_identifier: capture.source_identifier.clone(),
                    error,
                })
            }
        }
    }

    /// Probe many captures in parallel; output order follows input order
    pub fn probe_all(&self, captures: &[Capture]) -> Vec<ExtractionResult> {
        captures.par_iter().map(|c| self.probe(c)).collect()
    }

    /// Decode many tile captures in parallel; output order follows input order
    pub fn decode_tiles_all(
        &self,
        captures: &[Capture],
    ) -> Vec<std::result::Result<TileExtraction, CaptureFailure>> {
        captures.par_iter().map(|c| self.decode_tiles(c)).collect()
    }
}
