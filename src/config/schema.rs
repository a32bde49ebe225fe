//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub security: SecurityConfig,

    /// Gateway endpoint settings.
    pub gateway: EndpointConfig,

    /// Crypto and compression adapters.
    pub codec: CodecConfig,

    /// Session cookie and cache settings.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent requests in flight.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum accepted request body in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 4 * 1024 * 1024,
        }
    }
}

/// How replies are wrapped on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStyle {
    /// The codec output as `application/octet-stream`.
    Opaque,
    /// `{protocol, packet}` JSON with `packet` base64-armored when the codec transformed it.
    JsonEnvelope,
}

/// Gateway endpoint settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Path of the multipart upload endpoint.
    pub path: String,

    /// Outer response format.
    pub response_style: ResponseStyle,

    /// Serve the protocol listing under `{path}/protocols`.
    pub expose_protocol_list: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            path: "/api/gateway".to_string(),
            response_style: ResponseStyle::Opaque,
            expose_protocol_list: true,
        }
    }
}

/// Codec adapter selection.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CodecConfig {
    pub crypto: CryptoConfig,
    pub compression: CompressionConfig,
}

/// Cipher used when encoding replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum CryptoAlgorithm {
    #[serde(rename = "aes256_gcm")]
    Aes256Gcm,
    #[serde(rename = "chacha20_poly1305")]
    ChaCha20Poly1305,
    #[serde(rename = "mx_data")]
    MxData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Enable the crypto adapters.
    pub enabled: bool,

    /// Adapter used on encode. Decode accepts all of them.
    pub algorithm: CryptoAlgorithm,

    /// Base64 32-byte key shared by all adapters. Overridden by `MXGW_CRYPTO_KEY`.
    pub key: Option<String>,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            algorithm: CryptoAlgorithm::MxData,
            key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CompressionConfig {
    /// Enable the deflate adapter.
    pub enabled: bool,
}

/// Session cache and cookie settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the session cookie.
    pub cookie_name: String,

    /// Sliding time-to-live in seconds.
    pub ttl_secs: u64,

    /// How often expired sessions are swept.
    pub sweep_interval_secs: u64,

    /// Cookie-name prefixes that are never captured or replayed.
    pub capture_denylist: Vec<String>,

    /// Cookies set on every response (e.g. load-balancer affinity).
    pub static_cookies: BTreeMap<String, String>,

    /// Recreate a session under an unknown but well-formed cookie instead of minting a new id.
    pub resume_unknown: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "uuid".to_string(),
            ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 60,
            capture_denylist: default_capture_denylist(),
            static_cookies: BTreeMap::new(),
            resume_unknown: false,
        }
    }
}

/// Session-framework, antiforgery and analytics cookie prefixes.
pub fn default_capture_denylist() -> Vec<String> {
    [
        ".AspNetCore.",
        "__RequestVerificationToken",
        "ASP.NET_SessionId",
        "_ga",
        "_gid",
        "_gat",
        "_fbp",
        "__utm",
        "AMCV_",
        "mp_",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Address of the Prometheus scrape endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "mx_gateway=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
