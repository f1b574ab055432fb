//! Parsing of raw client parameters into a [`MapRequest`].
//!
//! All functions are fail-fast: the first invalid field aborts the parse and
//! nothing partially built is returned.
//!
//! # Marker syntax
//!
//! Each `markers` value is a `|`-separated token list processed left to right:
//!
//! ```text
//! size:tiny|color:blue|52.5,13.4|color:0xff0000|53.1,13.9
//! ```
//!
//! `size:` and `color:` tokens change the style applied to every coordinate
//! token that follows them in the same value. Each value starts again from
//! the defaults (`small`, `red`).

use url::form_urlencoded;

use crate::error::ParseError;

use super::model::{MapRequest, Marker, MarkerSize, OverlaySpec, Point, Rgba, SizeBounds};

/// Palette entry used when a marker value sets no color.
pub const DEFAULT_MARKER_COLOR: &str = "red";

/// Value of [`DEFAULT_MARKER_COLOR`] in the palette.
const DEFAULT_COLOR: Rgba = Rgba::opaque(246, 118, 112);

// =============================================================================
// Scalars
// =============================================================================

/// Parse `lat,lon` in degrees.
pub fn parse_point(s: &str) -> Result<Point, ParseError> {
    if s.is_empty() {
        return Err(ParseError::invalid_format("coordinate", "no coordinate given"));
    }

    let (lat, lon) = match s.split_once(',') {
        Some((lat, lon)) if !lon.contains(',') => (lat, lon),
        _ => {
            return Err(ParseError::invalid_format(
                "coordinate",
                format!("{s:?} not in format lat,lon"),
            ))
        }
    };

    let lat: f64 = lat.parse().map_err(|_| {
        ParseError::invalid_format("latitude", format!("{lat:?} not parseable as float"))
    })?;
    let lon: f64 = lon.parse().map_err(|_| {
        ParseError::invalid_format("longitude", format!("{lon:?} not parseable as float"))
    })?;

    Point::new(lat, lon)
}

/// Parse `WIDTHxHEIGHT` and check it against `bounds`.
///
/// A `0x0` size passes here; [`MapRequest::new`] rejects zero dimensions.
pub fn parse_size(s: &str, bounds: SizeBounds) -> Result<(u32, u32), ParseError> {
    if s.is_empty() {
        return Err(ParseError::invalid_format("size", "no size given"));
    }

    let (width, height) = match s.split_once('x') {
        Some((w, h)) if !h.contains('x') => (w, h),
        _ => {
            return Err(ParseError::invalid_format(
                "size",
                format!("{s:?} not in format 600x300"),
            ))
        }
    };

    let width: u32 = width
        .parse()
        .map_err(|e| ParseError::invalid_format("width", format!("{width:?}: {e}")))?;
    let height: u32 = height
        .parse()
        .map_err(|e| ParseError::invalid_format("height", format!("{height:?}: {e}")))?;

    bounds.check(width, height)?;
    Ok((width, height))
}

/// Parse a zoom level.
pub fn parse_zoom(s: &str) -> Result<u32, ParseError> {
    s.parse()
        .map_err(|e| ParseError::invalid_format("zoom", format!("{s:?}: {e}")))
}

// =============================================================================
// Markers
// =============================================================================

/// Style carried across the tokens of one marker value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerState {
    pub size: MarkerSize,
    pub color: Rgba,
}

impl Default for MarkerState {
    fn default() -> Self {
        Self {
            size: MarkerSize::default(),
            color: DEFAULT_COLOR,
        }
    }
}

impl MarkerState {
    /// Apply a named size (`tiny`, `mid`, `small`).
    pub fn set_size(&mut self, name: &str) -> Result<(), ParseError> {
        self.size =
            MarkerSize::named(name).ok_or_else(|| ParseError::UnknownMarkerSize(name.into()))?;
        Ok(())
    }

    /// Apply a color spec: `0x` followed by hex digits, or a palette name.
    pub fn set_color(&mut self, spec: &str) -> Result<(), ParseError> {
        self.color = match spec.strip_prefix("0x") {
            Some(digits) => Rgba::from_hex(digits)?,
            None => Rgba::named(spec).ok_or_else(|| ParseError::UnknownMarkerColor(spec.into()))?,
        };
        Ok(())
    }

    /// Build a marker at `position` with the current style.
    pub fn place(&self, position: Point) -> Marker {
        Marker {
            position,
            color: self.color,
            size: self.size,
        }
    }

    /// Apply one token, returning the marker it places, if any.
    fn apply(&mut self, token: &str) -> Result<Option<Marker>, ParseError> {
        if let Some(name) = token.strip_prefix("size:") {
            self.set_size(name)?;
            Ok(None)
        } else if let Some(spec) = token.strip_prefix("color:") {
            self.set_color(spec)?;
            Ok(None)
        } else {
            let position = parse_point(token)
                .map_err(|_| ParseError::UnparsableMarkerToken(token.to_string()))?;
            Ok(Some(self.place(position)))
        }
    }
}

/// Parse marker values in order. Each value starts from a fresh
/// [`MarkerState`]; values with no coordinate tokens yield no markers.
pub fn parse_markers<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Marker>, ParseError> {
    let mut markers = Vec::new();

    for value in raw {
        let mut state = MarkerState::default();
        for token in value.as_ref().split('|') {
            if let Some(marker) = state.apply(token)? {
                markers.push(marker);
            }
        }
    }

    Ok(markers)
}

// =============================================================================
// Overlays
// =============================================================================

/// Validate overlay patterns, keeping their order.
pub fn parse_overlays<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<OverlaySpec>, ParseError> {
    patterns
        .iter()
        .map(|p| OverlaySpec::parse(p.as_ref()))
        .collect()
}

// =============================================================================
// Request Parser
// =============================================================================

/// Builds [`MapRequest`]s from URL query strings, enforcing size bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestParser {
    bounds: SizeBounds,
}

impl RequestParser {
    pub fn new(bounds: SizeBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> SizeBounds {
        self.bounds
    }

    /// Parse a raw (still percent-encoded) query string.
    ///
    /// Recognized keys: `center`, `zoom`, `size`, repeated `markers`,
    /// repeated `overlays` and `no-attribution=true`. Unknown keys are ignored.
    /// When a single-valued key repeats, its first occurrence is used.
    pub fn from_query(&self, query: &str) -> Result<MapRequest, ParseError> {
        let mut center = None;
        let mut zoom = None;
        let mut size = None;
        let mut markers = Vec::new();
        let mut overlays = Vec::new();
        let mut disable_attribution = None;

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "center" => {
                    center.get_or_insert_with(|| value.into_owned());
                }
                "zoom" => {
                    zoom.get_or_insert_with(|| value.into_owned());
                }
                "size" => {
                    size.get_or_insert_with(|| value.into_owned());
                }
                "markers" => markers.push(value.into_owned()),
                "overlays" => overlays.push(value.into_owned()),
                "no-attribution" => {
                    disable_attribution.get_or_insert(value == "true");
                }
                _ => {}
            }
        }

        let center = parse_point(center.as_deref().unwrap_or_default())
            .map_err(|e| e.in_parameter("center"))?;
        let zoom =
            parse_zoom(zoom.as_deref().unwrap_or_default()).map_err(|e| e.in_parameter("zoom"))?;
        let (width, height) = parse_size(size.as_deref().unwrap_or_default(), self.bounds)
            .map_err(|e| e.in_parameter("size"))?;
        let markers = parse_markers(&markers).map_err(|e| e.in_parameter("markers"))?;
        let overlays = parse_overlays(&overlays).map_err(|e| e.in_parameter("overlays"))?;

        Ok(MapRequest::new(center, zoom, width, height)?
            .with_markers(markers)
            .with_overlays(overlays)
            .with_attribution_disabled(disable_attribution.unwrap_or(false)))
    }
}

// =============================================================================
// Tests
// =============================================================================
