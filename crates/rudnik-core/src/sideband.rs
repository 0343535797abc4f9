//! Tile address recovery from request metadata.
//!
//! Captures are often stored next to a text blob holding the request URL and
//! headers. Tile requests carry their address as query parameters (`x=`,
//! `y=`, and `zoom=` or `z=`); whichever of those are present fill in the
//! corresponding parts of a [`TileAddress`].

use crate::geo::TileAddress;
use once_cell::sync::Lazy;
use regex::Regex;

static X_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]x=(\d+)").unwrap());
static Y_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]y=(\d+)").unwrap());
static ZOOM_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&](?:zoom|z)=(\d+)").unwrap());

/// First value of the query parameter matched by `pattern`
fn first_param(pattern: &Regex, text: &str) -> Option<u32> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

impl TileAddress {
    /// Extract whatever parts of a tile address `text` mentions.
    ///
    /// Only the first occurrence of each parameter counts. Values that do not
    /// fit a `u32` leave that component unknown.
    pub fn from_sideband(text: &str) -> Self {
        Self {
            zoom: first_param(&ZOOM_PARAM, text),
            x: first_param(&X_PARAM, text),
            y: first_param(&Y_PARAM, text),
        }
    }
}
