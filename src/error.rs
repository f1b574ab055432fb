use thiserror::Error;

/// Overlay URL placeholders, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `{0}`
    Zoom,
    /// `{1}`
    X,
    /// `{2}`
    Y,
}

impl Placeholder {
    /// The literal token expected in a raw overlay pattern.
    pub fn token(self) -> &'static str {
        match self {
            Placeholder::Zoom => "{0}",
            Placeholder::X => "{1}",
            Placeholder::Y => "{2}",
        }
    }

    /// Human readable name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Placeholder::Zoom => "zoom",
            Placeholder::X => "x",
            Placeholder::Y => "y",
        }
    }
}

impl std::fmt::Display for Placeholder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.token())
    }
}

/// Errors raised while turning client input into a map request.
///
/// Every variant is a client error: it is detected before any rendering or
/// cache I/O happens and is never worth retrying.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// Input does not have the expected shape
    #[error("invalid {field}: {message}")]
    InvalidFormat { field: &'static str, message: String },

    /// Latitude or longitude outside its valid range
    #[error("{field} {value} is out of range (allowed: {min} to {max})")]
    CoordinateOutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Requested size exceeds the configured maximum
    #[error("map size exceeds allowed bounds of {max_width}x{max_height}")]
    SizeExceedsBounds { max_width: u32, max_height: u32 },

    /// Width or height is zero
    #[error("map size {width}x{height} is invalid: width and height must be positive")]
    InvalidDimensions { width: u32, height: u32 },

    /// Zoom level beyond what tile sources serve
    #[error("zoom level {zoom} is out of range (allowed: 0 to {max})")]
    InvalidZoom { zoom: u32, max: u32 },

    /// `size:` token with a name not in the size table
    #[error("bad marker size {0:?}")]
    UnknownMarkerSize(String),

    /// `color:0x` token with malformed hex digits
    #[error("bad marker color hex {0:?}: expected 6 or 8 hex digits")]
    InvalidColorHex(String),

    /// `color:` token with a name not in the palette
    #[error("bad color name {0:?}")]
    UnknownMarkerColor(String),

    /// Marker token that is neither a directive nor a coordinate
    #[error("unparsable chunk found in marker: {0:?}")]
    UnparsableMarkerToken(String),

    /// Overlay pattern without one of the tile placeholders
    #[error("placeholder {placeholder} not found in pattern {pattern:?}")]
    MissingPlaceholder {
        placeholder: Placeholder,
        pattern: String,
    },

    /// Wraps an error with the request parameter it came from
    #[error("unable to parse '{parameter}' parameter: {source}")]
    InvalidParameter {
        parameter: &'static str,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    pub(crate) fn invalid_format(field: &'static str, message: impl Into<String>) -> Self {
        ParseError::InvalidFormat {
            field,
            message: message.into(),
        }
    }

    /// Attribute this error to a named request parameter.
    pub fn in_parameter(self, parameter: &'static str) -> Self {
        ParseError::InvalidParameter {
            parameter,
            source: Box::new(self),
        }
    }
}

/// Errors from the render engine.
///
/// These are opaque to the cache: they are never persisted or retried.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// The tile HTTP client could not be built
    #[error("creating tile client: {0}")]
    Client(String),

    /// A tile could not be downloaded
    #[error("fetching tile {url}: {message}")]
    TileFetch { url: String, message: String },

    /// A downloaded tile is not a decodable image
    #[error("decoding tile {url}: {message}")]
    TileDecode { url: String, message: String },

    /// The composed map could not be encoded
    #[error("encoding map image: {0}")]
    Encode(String),

    /// The render task panicked or was aborted
    #[error("render task failed: {0}")]
    Task(String),
}

/// Filesystem errors inside the render cache.
///
/// Logged where they happen and never returned to callers: a failed read
/// falls back to rendering, a failed write still returns the rendered bytes.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("creating cache directory {path}: {message}")]
    CreateDir { path: String, message: String },

    #[error("writing cache file {path}: {message}")]
    Write { path: String, message: String },

    #[error("reading cache file {path}: {message}")]
    Read { path: String, message: String },
}

/// Errors surfaced to the HTTP boundary.
#[derive(Debug, Clone, Error)]
pub enum MapError {
    /// Request rejected by the parser (HTTP 400)
    #[error(transparent)]
    InvalidInput(#[from] ParseError),

    /// Render engine failed (HTTP 500)
    #[error("rendering map: {0}")]
    Render(#[from] RenderError),
}
