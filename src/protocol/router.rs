//! Protocol dispatch.
//!
//! # Responsibilities
//! - Resolve the handler by name, falling back to the numeric code
//! - Enrich the payload with the session identity the handlers expect
//! - Wrap the payload as a legacy packet and invoke the handler
//! - Unwrap the `{protocol, packet}` reply and feed the snapshot collaborator

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::protocol::handler::BoxError;
use crate::protocol::packet::{encode_legacy_packet, PacketError, ServerPacket};
use crate::protocol::registry::{ProtocolRegistry, RegisteredProtocol};
use crate::protocol::request::GameRequest;
use crate::protocol::snapshot::{is_account_protocol, AccountSnapshot, AccountSnapshotSink};
use crate::session::GameSession;

/// Errors raised while routing a request.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("handler for {protocol} failed: {source}")]
    Handler {
        protocol: String,
        #[source]
        source: BoxError,
    },

    #[error("handler for {protocol} returned a malformed reply: {reason}")]
    MalformedReply { protocol: String, reason: String },

    #[error("failed to build legacy packet: {0}")]
    Packet(#[from] PacketError),
}

/// The unwrapped handler reply.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedReply {
    pub protocol: String,
    pub payload: Value,
}

impl RoutedReply {
    /// Re-wrap for the wire: `packet` holds the payload as JSON text.
    pub fn to_server_packet(&self) -> ServerPacket {
        ServerPacket {
            protocol: self.protocol.clone(),
            packet: self.payload.to_string(),
        }
    }
}

pub struct ProtocolRouter {
    registry: Arc<ProtocolRegistry>,
    snapshots: Option<Arc<dyn AccountSnapshotSink>>,
}

impl ProtocolRouter {
    pub fn new(registry: Arc<ProtocolRegistry>) -> Self {
        Self {
            registry,
            snapshots: None,
        }
    }

    pub fn with_snapshot_sink(mut self, sink: Arc<dyn AccountSnapshotSink>) -> Self {
        self.snapshots = Some(sink);
        self
    }

    pub fn registry(&self) -> &ProtocolRegistry {
        &self.registry
    }

    /// Name first, then code.
    pub fn resolve(&self, request: &GameRequest) -> Option<&RegisteredProtocol> {
        request
            .protocol
            .as_deref()
            .and_then(|name| self.registry.resolve_name(name))
            .or_else(|| request.protocol_code.and_then(|code| self.registry.resolve_code(code)))
    }

    /// Dispatch one request within `session`.
    ///
    /// `header_token` is an `MxToken` presented outside the payload; the
    /// payload's own `SessionKey.MxToken` takes precedence.
    pub async fn route(
        &self,
        request: &GameRequest,
        session: &GameSession,
        header_token: Option<&str>,
    ) -> Result<RoutedReply, RouteError> {
        let entry = self
            .resolve(request)
            .ok_or_else(|| RouteError::UnknownProtocol(request.identifier()))?;
        let name = entry.descriptor.name.as_str();

        let enriched = enrich_payload(request.payload.clone(), session, header_token);
        let packet = encode_legacy_packet(&enriched)?;

        tracing::debug!(
            request_id = %request.request_id,
            protocol = %name,
            code = entry.descriptor.code,
            session_id = %session.id(),
            "Dispatching to handler"
        );

        let raw = entry
            .handler
            .invoke(packet)
            .await
            .map_err(|source| RouteError::Handler {
                protocol: name.to_string(),
                source,
            })?;
        let reply = parse_reply(name, &raw)?;

        if is_account_protocol(name) {
            self.forward_snapshot(request, session, name, &reply.payload);
        }

        Ok(reply)
    }

    fn forward_snapshot(&self, request: &GameRequest, session: &GameSession, protocol: &str, payload: &Value) {
        let Some(sink) = &self.snapshots else {
            return;
        };
        let snapshot = AccountSnapshot::extract(payload);
        if snapshot.is_empty() {
            return;
        }
        let account_id = session.identity().account_id;
        if let Err(e) = sink.record(account_id, protocol, &snapshot) {
            tracing::warn!(
                request_id = %request.request_id,
                account_id,
                protocol,
                error = %e,
                "Account snapshot sink failed"
            );
        }
    }
}

/// Inject `SessionKey {AccountServerId, MxToken}` and root `AccountId`.
///
/// The payload's `SessionKey.MxToken` (or `header_token`) is the capture
/// candidate; the session's token always wins in the output.
pub fn enrich_payload(payload: Value, session: &GameSession, header_token: Option<&str>) -> Value {
    let mut root = match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("Payload".to_string(), other);
            map
        }
    };

    let candidate = root
        .get("SessionKey")
        .and_then(|key| key.get("MxToken"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| header_token.map(str::to_string));
    let token = session.capture_or_get_mx_token(candidate.as_deref());
    let identity = session.identity();

    let session_key = root
        .entry("SessionKey")
        .or_insert_with(|| Value::Object(Map::new()));
    if !session_key.is_object() {
        *session_key = Value::Object(Map::new());
    }
    if let Value::Object(key) = session_key {
        key.insert("AccountServerId".to_string(), identity.account_server_id.into());
        key.insert("MxToken".to_string(), token.into());
    }

    if root.get("AccountId").map_or(true, Value::is_null) {
        root.insert("AccountId".to_string(), identity.account_id.into());
    }

    Value::Object(root)
}

/// Parse `{protocol, packet}` handler output.
fn parse_reply(protocol: &str, raw: &[u8]) -> Result<RoutedReply, RouteError> {
    let malformed = |reason: String| RouteError::MalformedReply {
        protocol: protocol.to_string(),
        reason,
    };

    let envelope: Value =
        serde_json::from_slice(raw).map_err(|e| malformed(format!("not JSON: {}", e)))?;
    let reply_protocol = envelope
        .get("protocol")
        .and_then(Value::as_str)
        .unwrap_or(protocol)
        .to_string();

    let payload = match envelope.get("packet") {
        Some(Value::String(inner)) => {
            serde_json::from_str(inner).map_err(|e| malformed(format!("packet is not JSON: {}", e)))?
        }
        Some(inner @ Value::Object(_)) => inner.clone(),
        Some(_) | None => return Err(malformed("missing packet".to_string())),
    };

    Ok(RoutedReply {
        protocol: reply_protocol,
        payload,
    })
}
