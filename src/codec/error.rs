//! Codec error definitions.

use thiserror::Error;

/// Errors raised while encoding or decoding a client blob.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A crypto adapter matched the framing but rejected it (bad tag, short frame).
    #[error("authentication failed in {adapter}: {reason}")]
    Authentication {
        adapter: &'static str,
        reason: String,
    },

    /// The compression frame failed its integrity checks.
    #[error("checksum error: {0}")]
    Checksum(String),

    /// No adapter combination produced UTF-8 JSON.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Key material or adapter selection is unusable.
    #[error("codec configuration error: {0}")]
    Configuration(String),

    #[error("codec I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn auth(adapter: &'static str, reason: impl Into<String>) -> Self {
        Self::Authentication {
            adapter,
            reason: reason.into(),
        }
    }
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
