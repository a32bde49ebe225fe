//! Wire codec subsystem.
//!
//! # Data Flow
//! ```text
//! Decode (sniffed):
//!     blob → first crypto adapter whose framing matches → decrypt
//!          → first compression adapter whose header matches → inflate
//!          → must be UTF-8 JSON, else InvalidPayload
//!
//! Encode (configured):
//!     JSON → deflate (if enabled) → configured cipher (if enabled) → blob
//! ```
//!
//! # Design Decisions
//! - Adapters are stateless after construction and shared across requests
//! - Decode accepts every enabled format; encode always emits one format
//! - A matched adapter that rejects its frame fails the decode, it never falls through

pub mod compression;
pub mod crypto;
pub mod error;
pub mod pipeline;

pub use compression::{CompressionAdapter, DeflateAdapter};
pub use crypto::{Aes256GcmAdapter, ChaCha20Poly1305Adapter, CryptoAdapter, CryptoKey, MxDataAdapter};
pub use error::{CodecError, CodecResult};
pub use pipeline::{CodecPipeline, DecodeTrace, Encoded};
