//! Built-in reference handlers.
//!
//! # Data Flow
//! ```text
//! legacy packet (from the router)
//!     → decode_legacy_packet → typed fields read from the enriched payload
//!     → reply payload
//!     → ServerPacket {protocol, packet} as UTF-8 JSON bytes
//! ```
//!
//! These are enough to drive a client through queue and login; game logic
//! lives in external handlers registered the same way.

pub mod account;
pub mod queue;

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

use crate::protocol::{BoxError, HandlerRegistration, ServerPacket};

/// .NET ticks at the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// The handlers the gateway binary registers by default.
pub fn builtin_registrations() -> Vec<HandlerRegistration> {
    vec![
        HandlerRegistration::new(queue::GET_TICKET_CODE, queue::GET_TICKET, queue::get_ticket),
        HandlerRegistration::new(account::CHECK_CODE, account::CHECK, account::check),
        HandlerRegistration::new(account::AUTH_CODE, account::AUTH, account::auth),
    ]
}

/// Server time in 100ns ticks since 0001-01-01, the unit the client expects.
pub(crate) fn server_time_ticks() -> i64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    UNIX_EPOCH_TICKS + nanos / 100
}

pub(crate) fn reply(protocol: &str, payload: &impl Serialize) -> Result<Vec<u8>, BoxError> {
    Ok(ServerPacket::new(protocol, payload)?.to_bytes())
}

/// `SessionKey` as injected by the router, or `null`.
pub(crate) fn session_key(request: &Value) -> Value {
    request.get("SessionKey").cloned().unwrap_or(Value::Null)
}
