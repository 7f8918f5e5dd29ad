//! Error types.
//!
//! Only engine construction and asset loading can fail. Note playback,
//! parameter setters and rendering are infallible: out-of-range values are
//! clamped and stale voices are ignored.

/// Fatal errors surfaced by engine construction and configuration parsing.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("Unsupported output channel count {0} (expected 2)")]
    InvalidChannelCount(u16),

    #[error("Invalid range for {name}: min {min} exceeds max {max}")]
    InvalidRange { name: &'static str, min: f64, max: f64 },

    #[error("Invalid master volume maximum: {0}")]
    InvalidMasterVolumeMax(f64),

    #[error("Echo delay line of {seconds} s cannot hold a {longest_ms} ms delay")]
    EchoLineTooShort { seconds: f64, longest_ms: f64 },

    #[error("Unknown {kind} '{name}'")]
    UnknownName { kind: &'static str, name: String },

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Errors raised while fetching or decoding a single sample.
///
/// The loader never propagates these: a failed sample is logged and treated
/// as absent.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[cfg(feature = "catalog")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
