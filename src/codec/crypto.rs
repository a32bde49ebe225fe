//! Symmetric crypto adapters.
//!
//! # Responsibilities
//! - Encrypt/decrypt whole buffers with a shared 32-byte key
//! - Recognise each adapter's framing without attempting decryption
//!
//! # Frame Layouts
//! ```text
//! AES-256-GCM  : [ "AGCM" ][ nonce:12 ][ tag:16 ][ ciphertext ]
//! ChaCha tagged: [ "CHP1" ][ nonce:12 ][ ciphertext ‖ tag:16 ]
//! MX data      : [ nonce:12 ][ ciphertext ‖ tag:16 ]
//! ```
//!
//! # Design Decisions
//! - Every `encrypt` call draws a fresh nonce from the OS RNG
//! - The untagged MX data adapter is detected by elimination and must be tried last

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::Aes256Gcm;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::aead::Aead;
use chacha20poly1305::ChaCha20Poly1305;
use rand::{rngs::OsRng, RngCore};

use crate::codec::compression;
use crate::codec::error::{CodecError, CodecResult};
use crate::codec::pipeline::is_plain_json;

/// Key length shared by every adapter.
pub const KEY_LEN: usize = 32;
/// AEAD nonce length.
pub const NONCE_LEN: usize = 12;
/// AEAD tag length.
pub const TAG_LEN: usize = 16;
/// Magic prefix of the AES-256-GCM frame.
pub const AES_GCM_MAGIC: [u8; 4] = *b"AGCM";
/// Magic prefix of the tagged ChaCha20-Poly1305 frame.
pub const CHACHA_MAGIC: [u8; 4] = *b"CHP1";

const MAGIC_LEN: usize = 4;

/// A stateless cipher over byte buffers.
pub trait CryptoAdapter: Send + Sync {
    /// Short adapter name used in decode traces and metrics.
    fn name(&self) -> &'static str;

    /// Encrypt `plaintext` into this adapter's frame.
    fn encrypt(&self, plaintext: &[u8]) -> CodecResult<Vec<u8>>;

    /// Decrypt a frame produced by [`CryptoAdapter::encrypt`].
    fn decrypt(&self, frame: &[u8]) -> CodecResult<Vec<u8>>;

    /// Cheap framing check. Never fails.
    fn can_decrypt(&self, data: &[u8]) -> bool;
}

/// 256-bit key material.
#[derive(Clone)]
pub struct CryptoKey([u8; KEY_LEN]);

impl CryptoKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> CodecResult<Self> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| CodecError::Configuration(format!("crypto key is not base64: {}", e)))?;
        let bytes: [u8; KEY_LEN] = raw.try_into().map_err(|raw: Vec<u8>| {
            CodecError::Configuration(format!(
                "crypto key must be {} bytes, got {}",
                KEY_LEN,
                raw.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Generate a random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Use the configured key, or mint an ephemeral one and log it.
    pub fn resolve(configured: Option<&str>) -> CodecResult<Self> {
        match configured {
            Some(encoded) if !encoded.trim().is_empty() => Self::from_base64(encoded),
            _ => {
                let key = Self::generate();
                tracing::warn!(
                    key = %key.to_base64(),
                    "Crypto enabled without a configured key; generated an ephemeral key"
                );
                Ok(key)
            }
        }
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for CryptoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CryptoKey(..)")
    }
}

fn fresh_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// True if `data` starts with the magic of any tagged adapter.
pub fn has_known_magic(data: &[u8]) -> bool {
    data.len() >= MAGIC_LEN
        && (data[..MAGIC_LEN] == AES_GCM_MAGIC || data[..MAGIC_LEN] == CHACHA_MAGIC)
}

/// AES-256-GCM with a detached tag stored ahead of the ciphertext.
pub struct Aes256GcmAdapter {
    cipher: Aes256Gcm,
}

impl Aes256GcmAdapter {
    pub const NAME: &'static str = "aes256-gcm";

    pub fn new(key: &CryptoKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.as_bytes().into()),
        }
    }
}

impl CryptoAdapter for Aes256GcmAdapter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn encrypt(&self, plaintext: &[u8]) -> CodecResult<Vec<u8>> {
        let nonce = fresh_nonce();
        let mut buffer = plaintext.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(aes_gcm::Nonce::from_slice(&nonce), b"", &mut buffer)
            .map_err(|_| CodecError::auth(Self::NAME, "encryption failed"))?;

        let mut frame = Vec::with_capacity(MAGIC_LEN + NONCE_LEN + TAG_LEN + buffer.len());
        frame.extend_from_slice(&AES_GCM_MAGIC);
        frame.extend_from_slice(&nonce);
        frame.extend_from_slice(&tag);
        frame.extend_from_slice(&buffer);
        Ok(frame)
    }

    fn decrypt(&self, frame: &[u8]) -> CodecResult<Vec<u8>> {
        if frame.len() < MAGIC_LEN + NONCE_LEN + TAG_LEN {
            return Err(CodecError::auth(Self::NAME, "frame too short"));
        }
        if frame[..MAGIC_LEN] != AES_GCM_MAGIC {
            return Err(CodecError::auth(Self::NAME, "magic mismatch"));
        }

        let (nonce, rest) = frame[MAGIC_LEN..].split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);
        let mut buffer = ciphertext.to_vec();
        self.cipher
            .decrypt_in_place_detached(
                aes_gcm::Nonce::from_slice(nonce),
                b"",
                &mut buffer,
                aes_gcm::Tag::from_slice(tag),
            )
            .map_err(|_| CodecError::auth(Self::NAME, "tag verification failed"))?;
        Ok(buffer)
    }

    fn can_decrypt(&self, data: &[u8]) -> bool {
        data.len() >= MAGIC_LEN + NONCE_LEN + TAG_LEN && data[..MAGIC_LEN] == AES_GCM_MAGIC
    }
}

/// ChaCha20-Poly1305 behind the `CHP1` magic, tag appended by the AEAD.
pub struct ChaCha20Poly1305Adapter {
    cipher: ChaCha20Poly1305,
}

impl ChaCha20Poly1305Adapter {
    pub const NAME: &'static str = "chacha20-poly1305";

    pub fn new(key: &CryptoKey) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(key.as_bytes().into()),
        }
    }
}

impl CryptoAdapter for ChaCha20Poly1305Adapter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn encrypt(&self, plaintext: &[u8]) -> CodecResult<Vec<u8>> {
        let nonce = fresh_nonce();
        let sealed = self
            .cipher
            .encrypt(chacha20poly1305::Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CodecError::auth(Self::NAME, "encryption failed"))?;

        let mut frame = Vec::with_capacity(MAGIC_LEN + NONCE_LEN + sealed.len());
        frame.extend_from_slice(&CHACHA_MAGIC);
        frame.extend_from_slice(&nonce);
        frame.extend_from_slice(&sealed);
        Ok(frame)
    }

    fn decrypt(&self, frame: &[u8]) -> CodecResult<Vec<u8>> {
        if frame.len() < MAGIC_LEN + NONCE_LEN + TAG_LEN {
            return Err(CodecError::auth(Self::NAME, "frame too short"));
        }
        if frame[..MAGIC_LEN] != CHACHA_MAGIC {
            return Err(CodecError::auth(Self::NAME, "magic mismatch"));
        }

        let (nonce, sealed) = frame[MAGIC_LEN..].split_at(NONCE_LEN);
        self.cipher
            .decrypt(chacha20poly1305::Nonce::from_slice(nonce), sealed)
            .map_err(|_| CodecError::auth(Self::NAME, "tag verification failed"))
    }

    fn can_decrypt(&self, data: &[u8]) -> bool {
        data.len() >= MAGIC_LEN + NONCE_LEN + TAG_LEN && data[..MAGIC_LEN] == CHACHA_MAGIC
    }
}

/// The client's native untagged ChaCha20-Poly1305 frame.
pub struct MxDataAdapter {
    cipher: ChaCha20Poly1305,
}

impl MxDataAdapter {
    pub const NAME: &'static str = "mx-data";

    pub fn new(key: &CryptoKey) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(key.as_bytes().into()),
        }
    }
}

impl CryptoAdapter for MxDataAdapter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn encrypt(&self, plaintext: &[u8]) -> CodecResult<Vec<u8>> {
        // The frame starts with the nonce, so it must not look like another format.
        let nonce = loop {
            let candidate = fresh_nonce();
            if !has_known_magic(&candidate) && !compression::has_zlib_header(&candidate) {
                break candidate;
            }
        };
        let sealed = self
            .cipher
            .encrypt(chacha20poly1305::Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CodecError::auth(Self::NAME, "encryption failed"))?;

        let mut frame = nonce.to_vec();
        frame.extend_from_slice(&sealed);
        Ok(frame)
    }

    fn decrypt(&self, frame: &[u8]) -> CodecResult<Vec<u8>> {
        if frame.len() < NONCE_LEN + TAG_LEN {
            return Err(CodecError::auth(Self::NAME, "frame too short"));
        }

        let (nonce, sealed) = frame.split_at(NONCE_LEN);
        self.cipher
            .decrypt(chacha20poly1305::Nonce::from_slice(nonce), sealed)
            .map_err(|_| CodecError::auth(Self::NAME, "tag verification failed"))
    }

    fn can_decrypt(&self, data: &[u8]) -> bool {
        data.len() >= NONCE_LEN + TAG_LEN
            && !has_known_magic(data)
            && !compression::has_zlib_header(data)
            && !is_plain_json(data)
    }
}
