//! Error types for the capture-to-wire pipeline.
//!
//! Most per-tick problems never surface as errors: a missing depth map or
//! camera frame is a normal outcome and is simply skipped. The variants below
//! cover what is left: transport setup failures that are returned to the
//! caller, transient failures that the loops log and back off from, and
//! decoding/validation errors on the receiving side.
//!
//! ## Error Categories
//!
//! - **Setup Errors**: socket binding, destination validation, configuration
//! - **Transient Errors**: datagram send failures, frame acquisition failures
//! - **Format Errors**: unsupported image layouts, malformed packets
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use sensorcast::StreamError;
//!
//! let error = StreamError::transport_failed("network unreachable");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("Transport failure: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid destination {host}:{port}: {reason}")]
    Address { host: String, port: u32, reason: String },

    #[error("Configuration error: {details}")]
    Config { details: String },

    #[error("Unsupported {kind} format: {format}")]
    UnsupportedFormat { kind: String, format: String },

    #[error("Invalid argument '{name}': {details}")]
    InvalidArgument { name: String, details: String },

    #[error("Decode error in {context}: {details}")]
    Decode { context: String, details: String },

    #[error("Payload of {len} bytes does not fit a 32-bit length field")]
    PayloadTooLarge { len: usize },

    #[error("Frame acquisition failed: {reason}")]
    Acquisition {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding error")]
    Json(#[from] serde_json::Error),
}

impl StreamError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Transport { .. } => true,
            StreamError::Acquisition { .. } => true,
            StreamError::Io(_) => true,
            StreamError::Address { .. } => false,
            StreamError::Config { .. } => false,
            StreamError::UnsupportedFormat { .. } => false,
            StreamError::InvalidArgument { .. } => false,
            StreamError::Decode { .. } => false,
            StreamError::PayloadTooLarge { .. } => false,
            StreamError::Json(_) => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            StreamError::Transport { .. } => vec![
                "Check that the network interface is up",
                "Verify the destination host is reachable",
                "Restart the transport with stop() followed by start()",
            ],
            StreamError::Address { .. } => vec![
                "Use a dotted-quad IPv4 address",
                "Use a port between 1 and 65535",
            ],
            StreamError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Compare field names against StreamerConfig",
                "Remove the offending key to fall back to its default",
            ],
            StreamError::UnsupportedFormat { .. } => vec![
                "Configure the camera for planar YUV 4:2:0 output",
                "Skip the stream for this tick",
            ],
            StreamError::InvalidArgument { .. } => vec![
                "Check the argument against the documented range",
            ],
            StreamError::Decode { .. } => vec![
                "Verify the sender and receiver use the same wire format",
                "Check for truncated datagrams",
            ],
            StreamError::PayloadTooLarge { .. } => vec![
                "Compress or downsample the payload before framing",
                "Increase the depth downsample factor",
            ],
            StreamError::Acquisition { .. } => vec![
                "Check the tracking session is still running",
                "Wait for the camera to deliver the next frame",
            ],
            StreamError::Io(_) => vec![
                "Check file and socket permissions",
                "Retry the operation",
            ],
            StreamError::Json(_) => vec![
                "Check that all floating point values are finite",
            ],
        }
    }

    /// Helper constructor for transport errors without an I/O source.
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        StreamError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors caused by an I/O failure.
    pub fn transport_io(reason: impl Into<String>, source: std::io::Error) -> Self {
        StreamError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for destination validation errors.
    pub fn invalid_address(host: impl Into<String>, port: u32, reason: impl Into<String>) -> Self {
        StreamError::Address { host: host.into(), port, reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        StreamError::Config { details: details.into() }
    }

    /// Helper constructor for unsupported format errors.
    pub fn unsupported_format(kind: impl Into<String>, format: impl Into<String>) -> Self {
        StreamError::UnsupportedFormat { kind: kind.into(), format: format.into() }
    }

    /// Helper constructor for argument validation errors.
    pub fn invalid_argument(name: impl Into<String>, details: impl Into<String>) -> Self {
        StreamError::InvalidArgument { name: name.into(), details: details.into() }
    }

    /// Helper constructor for decode errors.
    pub fn decode(context: impl Into<String>, details: impl Into<String>) -> Self {
        StreamError::Decode { context: context.into(), details: details.into() }
    }

    /// Helper constructor for acquisition errors.
    pub fn acquisition_failed(reason: impl Into<String>) -> Self {
        StreamError::Acquisition { reason: reason.into(), source: None }
    }
}
