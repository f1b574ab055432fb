//! JSON request bodies for `POST /map.png`.
//!
//! The envelope carries the same information as the query string form but
//! with structured coordinates. Marker styles go through [`MarkerState`], so
//! names, hex colors and error messages match the query form exactly.

use serde::Deserialize;

use crate::error::ParseError;

use super::model::{MapRequest, Marker, MarkerSize, Point, SizeBounds};
use super::parser::{parse_overlays, MarkerState};

/// Top-level POST body.
#[derive(Debug, Clone, Deserialize)]
pub struct MapEnvelope {
    pub center: EnvelopePoint,
    pub zoom: u32,
    pub width: u32,
    pub height: u32,

    #[serde(default)]
    pub markers: Vec<EnvelopeMarker>,

    #[serde(default)]
    pub disable_attribution: bool,

    /// Raw overlay patterns with `{0}`/`{1}`/`{2}` placeholders
    #[serde(default)]
    pub overlays: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EnvelopePoint {
    pub lat: f64,
    pub lon: f64,
}

/// Marker size given as a table name or a pixel diameter.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnvelopeSize {
    Pixels(u32),
    Named(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeMarker {
    #[serde(default)]
    pub size: Option<EnvelopeSize>,

    /// Palette name or `0x` hex
    #[serde(default)]
    pub color: Option<String>,

    pub coord: EnvelopePoint,
}

impl EnvelopePoint {
    fn to_point(self) -> Result<Point, ParseError> {
        Point::new(self.lat, self.lon)
    }
}

impl EnvelopeMarker {
    fn to_marker(&self) -> Result<Marker, ParseError> {
        let mut state = MarkerState::default();

        match &self.size {
            Some(EnvelopeSize::Named(name)) => state.set_size(name)?,
            Some(EnvelopeSize::Pixels(0)) => return Err(ParseError::UnknownMarkerSize("0".into())),
            Some(EnvelopeSize::Pixels(px)) => state.size = MarkerSize::Pixels(*px),
            None => {}
        }
        if let Some(color) = &self.color {
            state.set_color(color)?;
        }

        Ok(state.place(self.coord.to_point()?))
    }
}

impl MapEnvelope {
    /// Decode a JSON body.
    pub fn from_slice(body: &[u8]) -> Result<Self, ParseError> {
        serde_json::from_slice(body).map_err(|e| ParseError::invalid_format("body", e.to_string()))
    }

    /// Validate the envelope into a request.
    pub fn into_request(self, bounds: SizeBounds) -> Result<MapRequest, ParseError> {
        let center = self.center.to_point().map_err(|e| e.in_parameter("center"))?;
        bounds.check(self.width, self.height)?;

        let markers = self
            .markers
            .iter()
            .map(EnvelopeMarker::to_marker)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.in_parameter("markers"))?;
        let overlays = parse_overlays(&self.overlays).map_err(|e| e.in_parameter("overlays"))?;

        Ok(MapRequest::new(center, self.zoom, self.width, self.height)?
            .with_markers(markers)
            .with_overlays(overlays)
            .with_attribution_disabled(self.disable_attribution))
    }
}

// =============================================================================
// Tests
// =============================================================================
