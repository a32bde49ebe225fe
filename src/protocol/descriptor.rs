//! Protocol identity and alias derivation.

use data_encoding::BASE32_NOPAD;
use md5::{Digest, Md5};
use serde::Serialize;

/// Hash aliases that do not follow the derived formula.
const HASH_ALIAS_OVERRIDES: &[(&str, &str)] =
    &[("Campaign_ConfirmTutorialStage", "RL4MMUF2L7GQFJ7HNX2TP5CZJY")];

/// Numeric protocol code as sent by the client.
pub type ProtocolCode = i32;

/// Every way a protocol can be addressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolDescriptor {
    pub code: ProtocolCode,
    /// Canonical name, e.g. `Account_Auth`.
    pub name: String,
    /// `account/auth`
    pub path_alias: String,
    /// Base32 MD5 of the UTF-16LE name, or a fixed override.
    pub hash_alias: String,
}

impl ProtocolDescriptor {
    pub fn new(code: ProtocolCode, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code,
            path_alias: path_alias(&name),
            hash_alias: hash_alias(&name),
            name,
        }
    }
}

/// `Account_Auth` → `account/auth`.
pub fn path_alias(name: &str) -> String {
    name.replace('_', "/").to_lowercase()
}

/// Hash alias for `name`, honouring the override table.
pub fn hash_alias(name: &str) -> String {
    HASH_ALIAS_OVERRIDES
        .iter()
        .find(|(overridden, _)| *overridden == name)
        .map(|(_, alias)| alias.to_string())
        .unwrap_or_else(|| derived_hash_alias(name))
}

/// Base32 (RFC 4648, unpadded) of MD5 over the UTF-16LE bytes of `name`.
pub fn derived_hash_alias(name: &str) -> String {
    let utf16: Vec<u8> = name.encode_utf16().flat_map(u16::to_le_bytes).collect();
    BASE32_NOPAD.encode(&Md5::digest(&utf16))
}
