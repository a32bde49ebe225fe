//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use mx_gateway::config::GatewayConfig;
use mx_gateway::handlers::builtin_registrations;
use mx_gateway::lifecycle::Shutdown;
use mx_gateway::protocol::{InMemorySnapshotSink, ProtocolRegistry, ProtocolRouter};
use mx_gateway::HttpServer;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

/// A gateway running on a fixed local port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub snapshots: InMemorySnapshotSink,
}

#[allow(dead_code)]
impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn gateway_url(&self) -> String {
        self.url("/api/gateway")
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the gateway with the built-in handlers on `addr`.
pub async fn start_gateway(addr: SocketAddr, configure: impl FnOnce(&mut GatewayConfig)) -> TestGateway {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = addr.to_string();
    configure(&mut config);

    let snapshots = InMemorySnapshotSink::new();
    let registry = ProtocolRegistry::build(builtin_registrations()).unwrap();
    let router = ProtocolRouter::new(Arc::new(registry)).with_snapshot_sink(Arc::new(snapshots.clone()));

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, router).unwrap();
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;

    TestGateway {
        addr,
        shutdown,
        snapshots,
    }
}

/// Non-pooled client, optionally keeping cookies between requests.
pub fn client(cookie_store: bool) -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .cookie_store(cookie_store)
        .build()
        .unwrap()
}

/// A form holding `bytes` as the base64-armored `mx.dat` part.
pub fn mx_form(bytes: &[u8]) -> Form {
    let part = Part::text(BASE64.encode(bytes))
        .file_name("mx.dat")
        .mime_str("application/octet-stream")
        .unwrap();
    Form::new().part("mx.dat", part)
}

/// Split a passthrough opaque reply into its protocol and inner payload.
#[allow(dead_code)]
pub fn unwrap_reply(body: &[u8]) -> (String, Value) {
    let outer: Value = serde_json::from_slice(body).unwrap();
    let protocol = outer["protocol"].as_str().unwrap().to_string();
    let inner = serde_json::from_str(outer["packet"].as_str().unwrap()).unwrap();
    (protocol, inner)
}
