//! Handler boundary.
//!
//! Handlers receive the enriched legacy packet and answer with UTF-8 JSON
//! bytes of the form `{"protocol": ..., "packet": "<json string>"}`.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::protocol::descriptor::ProtocolCode;

/// Error type handlers may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned by [`ProtocolHandler::invoke`].
pub type HandlerFuture = BoxFuture<'static, Result<Vec<u8>, BoxError>>;

/// One protocol operation.
pub trait ProtocolHandler: Send + Sync {
    fn invoke(&self, packet: String) -> HandlerFuture;
}

impl<F, Fut> ProtocolHandler for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>, BoxError>> + Send + 'static,
{
    fn invoke(&self, packet: String) -> HandlerFuture {
        Box::pin(self(packet))
    }
}

/// A handler together with the identity it is registered under.
#[derive(Clone)]
pub struct HandlerRegistration {
    pub code: ProtocolCode,
    pub name: String,
    pub handler: Arc<dyn ProtocolHandler>,
}

impl HandlerRegistration {
    pub fn new(
        code: ProtocolCode,
        name: impl Into<String>,
        handler: impl ProtocolHandler + 'static,
    ) -> Self {
        Self {
            code,
            name: name.into(),
            handler: Arc::new(handler),
        }
    }
}

impl std::fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("code", &self.code)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
