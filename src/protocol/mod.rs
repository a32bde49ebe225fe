//! Protocol identity and dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! decoded JSON text
//!     → request.rs (GameRequest: protocol name and/or code, payload, request id)
//!     → registry.rs (name → normalized → path alias → code; hash alias on the alias route)
//!     → router.rs (inject SessionKey + AccountId, wrap as legacy packet)
//!     → handler.rs (ProtocolHandler::invoke → {protocol, packet})
//!     → router.rs (unwrap reply, forward account snapshot)
//! ```
//!
//! # Design Decisions
//! - The registry is immutable after startup and shared via `Arc`
//! - Aliases are derived from the canonical name, so they never drift from it
//! - Handlers only see the legacy packet format, never the wire codec

pub mod descriptor;
pub mod handler;
pub mod packet;
pub mod registry;
pub mod request;
pub mod router;
pub mod snapshot;

pub use descriptor::{ProtocolCode, ProtocolDescriptor};
pub use handler::{BoxError, HandlerRegistration, ProtocolHandler};
pub use packet::{decode_legacy_packet, encode_legacy_packet, PacketError, ServerPacket};
pub use registry::{ProtocolId, ProtocolRegistry, RegisteredProtocol, RegistryError};
pub use request::{GameRequest, RequestError};
pub use router::{enrich_payload, ProtocolRouter, RouteError, RoutedReply};
pub use snapshot::{AccountSnapshot, AccountSnapshotSink, InMemorySnapshotSink};
