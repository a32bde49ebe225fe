//! Legacy inner packet and the `{protocol, packet}` reply envelope.
//!
//! ```text
//! legacy packet = base64( u32_le(len(json)) ‖ gzip(json) )
//! ```

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const LENGTH_PREFIX: usize = 4;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("legacy packet is not base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("legacy packet is shorter than its length prefix")]
    Truncated,

    #[error("legacy packet declares {declared} bytes but inflates to {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("legacy packet gzip error: {0}")]
    Gzip(#[from] std::io::Error),

    #[error("legacy packet JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a payload as a legacy packet.
pub fn encode_legacy_packet(payload: &Value) -> Result<String, PacketError> {
    let json = serde_json::to_vec(payload)?;
    let declared = u32::try_from(json.len()).map_err(|_| PacketError::LengthMismatch {
        declared: u32::MAX as usize,
        actual: json.len(),
    })?;

    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2 + 32), Compression::default());
    encoder.write_all(&json)?;
    let gzipped = encoder.finish()?;

    let mut raw = Vec::with_capacity(LENGTH_PREFIX + gzipped.len());
    raw.extend_from_slice(&declared.to_le_bytes());
    raw.extend_from_slice(&gzipped);
    Ok(BASE64.encode(raw))
}

/// Decode a legacy packet back into JSON.
pub fn decode_legacy_packet(packet: &str) -> Result<Value, PacketError> {
    let raw = BASE64.decode(packet.trim())?;
    if raw.len() < LENGTH_PREFIX {
        return Err(PacketError::Truncated);
    }
    let mut prefix = [0u8; LENGTH_PREFIX];
    prefix.copy_from_slice(&raw[..LENGTH_PREFIX]);
    let declared = u32::from_le_bytes(prefix) as usize;

    // Read one byte past the declared size so an oversized stream is detected
    // without inflating all of it.
    let mut json = Vec::with_capacity(declared.min(1 << 20));
    GzDecoder::new(&raw[LENGTH_PREFIX..])
        .take(declared as u64 + 1)
        .read_to_end(&mut json)?;
    if json.len() != declared {
        return Err(PacketError::LengthMismatch {
            declared,
            actual: json.len(),
        });
    }

    Ok(serde_json::from_slice(&json)?)
}

/// Handler reply: `packet` is the JSON text of the real response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPacket {
    pub protocol: String,
    pub packet: String,
}

impl ServerPacket {
    pub fn new(protocol: impl Into<String>, payload: &impl Serialize) -> serde_json::Result<Self> {
        Ok(Self {
            protocol: protocol.into(),
            packet: serde_json::to_string(payload)?,
        })
    }

    /// The payload-level error envelope.
    pub fn error(message: &str) -> Self {
        Self {
            protocol: "Error".to_string(),
            packet: serde_json::json!({ "error": message }).to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({ "protocol": self.protocol, "packet": self.packet }).to_string()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_json().into_bytes()
    }
}
