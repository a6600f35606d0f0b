//! Error types for the snip library.

use thiserror::Error;

/// Main error type for the snip library.
#[derive(Error, Debug)]
pub enum Error {
    /// Container format errors (demuxing/muxing).
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    /// Codec errors (encoding/decoding).
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The requested encode profile is not supported by the platform.
    #[error("Unsupported codec configuration: {0}")]
    UnsupportedCodec(String),

    /// No decode capability is available for a track's codec.
    ///
    /// This is recoverable: the pipeline falls back to the capture
    /// frame extractor instead of failing the operation.
    #[error("Decode capability unavailable: {0}")]
    DecodeUnavailable(String),

    /// The source contains neither a video nor an audio track.
    #[error("No media tracks in source")]
    NoMediaTracks,

    /// Fetching the source over the network failed.
    #[error("Network error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Network {
        /// HTTP status, when the server responded at all.
        status: Option<u16>,
        message: String,
    },

    /// The operation was cancelled via its abort signal.
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid parameter provided by the caller.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Container format errors.
#[derive(Error, Debug)]
pub enum ContainerError {
    /// The byte stream is not a recognised container.
    #[error("Unknown container format{}", found.as_deref().map(|f| format!(" (detected {f})")).unwrap_or_default())]
    UnknownFormat {
        /// Format name when the signature was recognised but unsupported.
        found: Option<String>,
    },

    /// Invalid or corrupted container structure.
    #[error("Invalid container structure: {0}")]
    InvalidStructure(String),

    /// Missing required atom/element.
    #[error("Missing required element: {0}")]
    MissingElement(&'static str),

    /// An element declares a size the parser refuses to allocate.
    #[error("Invalid element size at offset {offset}: {message}")]
    InvalidSize { offset: u64, message: String },

    /// Track index out of range.
    #[error("Track {index} not found")]
    TrackNotFound { index: usize },

    /// Generic container error message.
    #[error("{0}")]
    Other(String),
}

impl From<String> for ContainerError {
    fn from(s: String) -> Self {
        ContainerError::Other(s)
    }
}

impl From<&str> for ContainerError {
    fn from(s: &str) -> Self {
        ContainerError::Other(s.to_string())
    }
}

/// Codec errors.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Decoder configuration error.
    #[error("Decoder configuration error: {0}")]
    DecoderConfig(String),

    /// Encoder configuration error.
    #[error("Encoder configuration error: {0}")]
    EncoderConfig(String),

    /// Decode failure on a chunk.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Encode failure on a frame.
    #[error("Encode error: {0}")]
    Encode(String),

    /// The operation is not valid for the frame's pixel format.
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// Generic codec error message.
    #[error("{0}")]
    Other(String),
}

impl From<String> for CodecError {
    fn from(s: String) -> Self {
        CodecError::Other(s)
    }
}

impl From<&str> for CodecError {
    fn from(s: &str) -> Self {
        CodecError::Other(s.to_string())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid parameter error.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// Check if this is the cancellation error.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Check if this error is fatal for the whole operation.
    ///
    /// `DecodeUnavailable` is handled locally by falling back to the
    /// capture extractor; everything else aborts the trim.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::DecodeUnavailable(_))
    }
}
