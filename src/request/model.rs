//! Canonical, validated map request types.

use sha2::{Digest, Sha256};

use crate::error::{ParseError, Placeholder};

/// Highest zoom level accepted in a request.
pub const MAX_ZOOM: u32 = 20;

/// Pixel size of overlay tiles. They are rescaled onto the base layer grid.
pub const OVERLAY_TILE_SIZE: u32 = 256;

// =============================================================================
// Point
// =============================================================================

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    lat: f64,
    lon: f64,
}

impl Point {
    /// Create a point, rejecting out-of-range or non-finite coordinates.
    pub fn new(lat: f64, lon: f64) -> Result<Self, ParseError> {
        check_range("latitude", lat, 90.0)?;
        check_range("longitude", lon, 180.0)?;
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Fixed textual form used in cache keys.
    pub fn canonical(&self) -> String {
        format!("[{:.7}, {:.7}]", self.lat, self.lon)
    }
}

fn check_range(field: &'static str, value: f64, limit: f64) -> Result<(), ParseError> {
    // NaN fails `contains`, infinities fall outside the range
    if (-limit..=limit).contains(&value) {
        Ok(())
    } else {
        Err(ParseError::CoordinateOutOfRange {
            field,
            value,
            min: -limit,
            max: limit,
        })
    }
}

// =============================================================================
// Color
// =============================================================================

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Named marker colors.
pub const MARKER_PALETTE: [(&str, Rgba); 10] = [
    ("black", Rgba::opaque(145, 145, 145)),
    ("brown", Rgba::opaque(178, 154, 123)),
    ("green", Rgba::opaque(168, 196, 68)),
    ("purple", Rgba::opaque(177, 150, 191)),
    ("yellow", Rgba::opaque(237, 201, 107)),
    ("blue", Rgba::opaque(163, 196, 253)),
    ("gray", Rgba::opaque(204, 204, 204)),
    ("orange", Rgba::opaque(229, 165, 68)),
    ("red", Rgba::opaque(246, 118, 112)),
    ("white", Rgba::opaque(245, 244, 241)),
];

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    /// Look up a color in [`MARKER_PALETTE`].
    pub fn named(name: &str) -> Option<Self> {
        MARKER_PALETTE
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, color)| *color)
    }

    /// Parse `RRGGBB` or `RRGGBBAA` hex digits (no prefix).
    pub fn from_hex(digits: &str) -> Result<Self, ParseError> {
        let bytes = match digits.len() {
            6 | 8 => {
                hex::decode(digits).map_err(|_| ParseError::InvalidColorHex(digits.into()))?
            }
            _ => return Err(ParseError::InvalidColorHex(digits.into())),
        };

        Ok(Self {
            r: bytes[0],
            g: bytes[1],
            b: bytes[2],
            a: bytes.get(3).copied().unwrap_or(0xff),
        })
    }
}

// =============================================================================
// Marker
// =============================================================================

/// Marker size: one of the named sizes or an explicit pixel diameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerSize {
    Tiny,
    Mid,
    #[default]
    Small,
    Pixels(u32),
}

impl MarkerSize {
    /// Look up a named size.
    pub fn named(name: &str) -> Option<Self> {
        match name {
            "tiny" => Some(MarkerSize::Tiny),
            "mid" => Some(MarkerSize::Mid),
            "small" => Some(MarkerSize::Small),
            _ => None,
        }
    }

    /// Marker diameter in pixels.
    pub fn pixels(&self) -> u32 {
        match self {
            MarkerSize::Tiny => 10,
            MarkerSize::Mid => 15,
            MarkerSize::Small => 20,
            MarkerSize::Pixels(px) => *px,
        }
    }
}

/// A colored pin drawn on the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub position: Point,
    pub color: Rgba,
    pub size: MarkerSize,
}

impl Marker {
    /// Fixed textual form used in cache keys.
    pub fn canonical(&self) -> String {
        format!(
            "{}|{}|{},{},{},{}",
            self.position.canonical(),
            self.size.pixels(),
            self.color.r,
            self.color.g,
            self.color.b,
            self.color.a
        )
    }
}

// =============================================================================
// Overlay
// =============================================================================

/// A validated tile overlay layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySpec {
    /// Pattern as supplied by the client (`{0}`/`{1}`/`{2}` placeholders)
    pub pattern: String,

    /// Pattern rewritten to the engine's `{z}`/`{x}`/`{y}` syntax
    pub url_template: String,

    /// Tile edge length in pixels
    pub tile_size: u32,

    /// Hex SHA-256 of the template, for logs and debugging
    pub name: String,
}

impl OverlaySpec {
    /// Validate a raw pattern and derive the engine template and name.
    pub fn parse(pattern: &str) -> Result<Self, ParseError> {
        for placeholder in [Placeholder::Zoom, Placeholder::X, Placeholder::Y] {
            if !pattern.contains(placeholder.token()) {
                return Err(ParseError::MissingPlaceholder {
                    placeholder,
                    pattern: pattern.to_string(),
                });
            }
        }

        let url_template = pattern
            .replace("{0}", "{z}")
            .replace("{1}", "{x}")
            .replace("{2}", "{y}");
        let name = hex::encode(Sha256::digest(url_template.as_bytes()));

        Ok(Self {
            pattern: pattern.to_string(),
            url_template,
            tile_size: OVERLAY_TILE_SIZE,
            name,
        })
    }
}

// =============================================================================
// Size Bounds
// =============================================================================

/// Maximum map size. Zero on either axis means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeBounds {
    pub max_width: u32,
    pub max_height: u32,
}

impl SizeBounds {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Bounds only apply when both maxima are positive.
    pub fn is_bounded(&self) -> bool {
        self.max_width > 0 && self.max_height > 0
    }

    pub fn check(&self, width: u32, height: u32) -> Result<(), ParseError> {
        if self.is_bounded() && (width > self.max_width || height > self.max_height) {
            return Err(ParseError::SizeExceedsBounds {
                max_width: self.max_width,
                max_height: self.max_height,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Map Request
// =============================================================================

/// A canonical, validated description of one map image.
///
/// Built once by the parser and read-only afterwards. Marker and overlay
/// order is preserved exactly as supplied since it changes the rendering
/// (later markers are drawn on top) and therefore the cache key.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRequest {
    center: Point,
    zoom: u32,
    width: u32,
    height: u32,
    markers: Vec<Marker>,
    overlays: Vec<OverlaySpec>,
    disable_attribution: bool,
}

impl MapRequest {
    /// Create a request without markers or overlays.
    pub fn new(center: Point, zoom: u32, width: u32, height: u32) -> Result<Self, ParseError> {
        if zoom > MAX_ZOOM {
            return Err(ParseError::InvalidZoom {
                zoom,
                max: MAX_ZOOM,
            });
        }
        if width == 0 || height == 0 {
            return Err(ParseError::InvalidDimensions { width, height });
        }

        Ok(Self {
            center,
            zoom,
            width,
            height,
            markers: Vec::new(),
            overlays: Vec::new(),
            disable_attribution: false,
        })
    }

    pub fn with_markers(mut self, markers: Vec<Marker>) -> Self {
        self.markers = markers;
        self
    }

    pub fn with_overlays(mut self, overlays: Vec<OverlaySpec>) -> Self {
        self.overlays = overlays;
        self
    }

    pub fn with_attribution_disabled(mut self, disabled: bool) -> Self {
        self.disable_attribution = disabled;
        self
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn overlays(&self) -> &[OverlaySpec] {
        &self.overlays
    }

    pub fn disable_attribution(&self) -> bool {
        self.disable_attribution
    }
}

// =============================================================================
// Tests
// =============================================================================
