//! Codec pipeline: sniffing decode, deterministic encode.

use std::borrow::Cow;
use std::fmt;

use serde::de::IgnoredAny;

use crate::codec::compression::{CompressionAdapter, DeflateAdapter};
use crate::codec::crypto::{
    Aes256GcmAdapter, ChaCha20Poly1305Adapter, CryptoAdapter, CryptoKey, MxDataAdapter,
};
use crate::codec::error::{CodecError, CodecResult};
use crate::config::schema::{CodecConfig, CryptoAlgorithm};

/// True if `data` is a JSON object or array, ignoring leading whitespace.
pub fn is_plain_json(data: &[u8]) -> bool {
    let start = data.iter().position(|b| !b.is_ascii_whitespace());
    match start.map(|i| data[i]) {
        Some(b'{') | Some(b'[') => serde_json::from_slice::<IgnoredAny>(data).is_ok(),
        _ => false,
    }
}

/// Which adapters a decode went through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeTrace {
    pub crypto: Option<&'static str>,
    pub compression: Option<&'static str>,
}

impl fmt::Display for DecodeTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "decrypt:{}+decompress:{}",
            self.crypto.unwrap_or("none"),
            self.compression.unwrap_or("none")
        )
    }
}

/// Output of [`CodecPipeline::encode`].
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    /// False when no adapter touched the text.
    pub transformed: bool,
}

/// Crypto and compression adapters composed for one deployment.
///
/// Built once at startup and shared read-only across requests.
pub struct CodecPipeline {
    /// Decode order. The heuristic adapter must be last.
    crypto: Vec<Box<dyn CryptoAdapter>>,
    /// Index into `crypto` of the adapter used by `encode`.
    encoder: Option<usize>,
    compression: Vec<Box<dyn CompressionAdapter>>,
}

impl CodecPipeline {
    /// A pipeline with no adapters: plain JSON in, plain JSON out.
    pub fn passthrough() -> Self {
        Self {
            crypto: Vec::new(),
            encoder: None,
            compression: Vec::new(),
        }
    }

    /// Compose adapters explicitly. `encoder` names the crypto adapter used on encode.
    pub fn new(
        crypto: Vec<Box<dyn CryptoAdapter>>,
        compression: Vec<Box<dyn CompressionAdapter>>,
        encoder: Option<&str>,
    ) -> CodecResult<Self> {
        let encoder = match encoder {
            Some(name) => Some(
                crypto
                    .iter()
                    .position(|a| a.name() == name)
                    .ok_or_else(|| {
                        CodecError::Configuration(format!("no crypto adapter named {}", name))
                    })?,
            ),
            None => None,
        };
        Ok(Self {
            crypto,
            encoder,
            compression,
        })
    }

    /// Build the standard adapter set from configuration.
    pub fn from_config(config: &CodecConfig) -> CodecResult<Self> {
        let mut crypto: Vec<Box<dyn CryptoAdapter>> = Vec::new();
        let mut encoder = None;

        if config.crypto.enabled {
            let key = CryptoKey::resolve(config.crypto.key.as_deref())?;
            crypto.push(Box::new(Aes256GcmAdapter::new(&key)));
            crypto.push(Box::new(ChaCha20Poly1305Adapter::new(&key)));
            crypto.push(Box::new(MxDataAdapter::new(&key)));
            encoder = Some(match config.crypto.algorithm {
                CryptoAlgorithm::Aes256Gcm => Aes256GcmAdapter::NAME,
                CryptoAlgorithm::ChaCha20Poly1305 => ChaCha20Poly1305Adapter::NAME,
                CryptoAlgorithm::MxData => MxDataAdapter::NAME,
            });
        }

        let mut compression: Vec<Box<dyn CompressionAdapter>> = Vec::new();
        if config.compression.enabled {
            compression.push(Box::new(DeflateAdapter::default()));
        }

        let pipeline = Self::new(crypto, compression, encoder)?;
        tracing::info!(
            crypto = ?pipeline.crypto_names(),
            encoder = pipeline.encoder_name().unwrap_or("none"),
            compression = pipeline.compression.len(),
            "Codec pipeline configured"
        );
        Ok(pipeline)
    }

    /// Decode a client blob into JSON text.
    ///
    /// At most one crypto adapter and one compression adapter are applied,
    /// each chosen by its framing check.
    pub fn decode(&self, data: &[u8]) -> CodecResult<(String, DecodeTrace)> {
        let mut trace = DecodeTrace::default();
        let mut bytes = Cow::Borrowed(data);

        if let Some(adapter) = self.crypto.iter().find(|a| a.can_decrypt(&bytes)) {
            bytes = Cow::Owned(adapter.decrypt(&bytes)?);
            trace.crypto = Some(adapter.name());
        }

        if let Some(adapter) = self.compression.iter().find(|a| a.can_decompress(&bytes)) {
            bytes = Cow::Owned(adapter.decompress(&bytes)?);
            trace.compression = Some(adapter.name());
        }

        let text = String::from_utf8(bytes.into_owned()).map_err(|_| {
            CodecError::InvalidPayload(format!("{} produced non UTF-8 output", trace))
        })?;
        if serde_json::from_str::<IgnoredAny>(&text).is_err() {
            return Err(CodecError::InvalidPayload(format!(
                "{} produced non JSON output",
                trace
            )));
        }

        Ok((text, trace))
    }

    /// Encode JSON text: compression first, then the configured cipher.
    pub fn encode(&self, text: &str) -> CodecResult<Encoded> {
        let mut bytes = text.as_bytes().to_vec();
        let mut transformed = false;

        if let Some(adapter) = self.compression.first() {
            bytes = adapter.compress(&bytes)?;
            transformed = true;
        }
        if let Some(adapter) = self.encoder.map(|i| &self.crypto[i]) {
            bytes = adapter.encrypt(&bytes)?;
            transformed = true;
        }

        Ok(Encoded { bytes, transformed })
    }

    pub fn crypto_names(&self) -> Vec<&'static str> {
        self.crypto.iter().map(|a| a.name()).collect()
    }

    pub fn encoder_name(&self) -> Option<&'static str> {
        self.encoder.map(|i| self.crypto[i].name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::crypto::KEY_LEN;
    use crate::config::schema::{CompressionConfig, CryptoConfig};

    fn full_config(algorithm: CryptoAlgorithm) -> CodecConfig {
        CodecConfig {
            crypto: CryptoConfig {
                enabled: true,
                algorithm,
                key: Some(CryptoKey::from_bytes([3u8; KEY_LEN]).to_base64()),
            },
            compression: CompressionConfig { enabled: true },
        }
    }

    #[test]
    fn test_passthrough_decodes_plain_json() {
        let pipeline = CodecPipeline::passthrough();
        let (text, trace) = pipeline.decode(br#"{"Protocol":"Account_Check"}"#).unwrap();
        assert_eq!(text, r#"{"Protocol":"Account_Check"}"#);
        assert_eq!(trace.to_string(), "decrypt:none+decompress:none");

        let encoded = pipeline.encode("{}").unwrap();
        assert!(!encoded.transformed);
        assert_eq!(encoded.bytes, b"{}");
    }

    #[test]
    fn test_roundtrip_for_each_encoder() {
        for algorithm in [
            CryptoAlgorithm::Aes256Gcm,
            CryptoAlgorithm::ChaCha20Poly1305,
            CryptoAlgorithm::MxData,
        ] {
            let pipeline = CodecPipeline::from_config(&full_config(algorithm)).unwrap();
            let encoded = pipeline.encode(r#"{"protocol":"Error"}"#).unwrap();
            assert!(encoded.transformed);

            let (text, trace) = pipeline.decode(&encoded.bytes).unwrap();
            assert_eq!(text, r#"{"protocol":"Error"}"#);
            assert_eq!(trace.crypto, pipeline.encoder_name());
            assert_eq!(trace.compression, Some(DeflateAdapter::NAME));
        }
    }

    #[test]
    fn test_decode_accepts_any_enabled_format() {
        let key = CryptoKey::from_bytes([3u8; KEY_LEN]);
        let pipeline = CodecPipeline::from_config(&full_config(CryptoAlgorithm::MxData)).unwrap();

        let compressed_only = DeflateAdapter::default().compress(b"[1,2,3]").unwrap();
        let (text, trace) = pipeline.decode(&compressed_only).unwrap();
        assert_eq!(text, "[1,2,3]");
        assert_eq!(trace.to_string(), "decrypt:none+decompress:deflate");

        let aes_only = Aes256GcmAdapter::new(&key).encrypt(b"{\"a\":1}").unwrap();
        let (_, trace) = pipeline.decode(&aes_only).unwrap();
        assert_eq!(trace.to_string(), "decrypt:aes256-gcm+decompress:none");

        let (_, trace) = pipeline.decode(b"  {\"plain\":true}").unwrap();
        assert_eq!(trace, DecodeTrace::default());
    }

    #[test]
    fn test_non_json_result_is_invalid_payload() {
        let pipeline = CodecPipeline::passthrough();
        assert!(matches!(
            pipeline.decode(b"definitely not json"),
            Err(CodecError::InvalidPayload(_))
        ));

        let key = CryptoKey::from_bytes([3u8; KEY_LEN]);
        let pipeline = CodecPipeline::from_config(&full_config(CryptoAlgorithm::ChaCha20Poly1305)).unwrap();
        let frame = ChaCha20Poly1305Adapter::new(&key).encrypt(b"<xml/>").unwrap();
        assert!(matches!(
            pipeline.decode(&frame),
            Err(CodecError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_adapter_rejection_is_surfaced() {
        let pipeline = CodecPipeline::from_config(&full_config(CryptoAlgorithm::Aes256Gcm)).unwrap();
        let mut frame = pipeline.encode("{}").unwrap().bytes;
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        assert!(matches!(
            pipeline.decode(&frame),
            Err(CodecError::Authentication { .. })
        ));
    }

    #[test]
    fn test_unknown_encoder_name_is_rejected() {
        let result = CodecPipeline::new(Vec::new(), Vec::new(), Some("rot13"));
        assert!(matches!(result, Err(CodecError::Configuration(_))));
    }

    #[test]
    fn test_is_plain_json() {
        assert!(is_plain_json(b"{}"));
        assert!(is_plain_json(b"\n [1]"));
        assert!(!is_plain_json(b"{broken"));
        assert!(!is_plain_json(b"42"));
        assert!(!is_plain_json(b""));
    }
}
