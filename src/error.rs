//! Crate-level error type.

use thiserror::Error;

use crate::codec::CodecError;
use crate::multipart::MultipartError;
use crate::protocol::{RequestError, RouteError};

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Route(#[from] RouteError),
}

impl GatewayError {
    /// Short label used as the `outcome` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Multipart(_) => "multipart_error",
            GatewayError::Codec(CodecError::Authentication { .. }) => "authentication_error",
            GatewayError::Codec(CodecError::Checksum(_)) => "checksum_error",
            GatewayError::Codec(_) => "invalid_payload",
            GatewayError::Request(_) => "invalid_request",
            GatewayError::Route(RouteError::UnknownProtocol(_)) => "unknown_protocol",
            GatewayError::Route(_) => "handler_error",
        }
    }

    /// Errors raised after the request was decoded travel back inside an
    /// encoded `Error` envelope instead of an HTTP error status.
    pub fn is_payload_level(&self) -> bool {
        matches!(self, GatewayError::Route(_))
    }
}
