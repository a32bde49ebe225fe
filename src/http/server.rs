//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the gateway, alias, listing and health routes
//! - Wire up middleware (tracing, timeout, body limit, concurrency limit, request ID)
//! - Serve over plain TCP or rustls until the shutdown broadcast fires
//! - Run the session sweeper alongside the listener

use std::io;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::codec::{CodecPipeline, CodecResult};
use crate::config::schema::TlsConfig;
use crate::config::{EndpointConfig, GatewayConfig, SessionConfig};
use crate::http::gateway::{gateway_alias_handler, gateway_handler};
use crate::lifecycle::Shutdown;
use crate::protocol::{ProtocolDescriptor, ProtocolRouter};
use crate::session::SessionStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<CodecPipeline>,
    pub router: Arc<ProtocolRouter>,
    pub sessions: SessionStore,
    pub session_config: Arc<SessionConfig>,
    pub endpoint: Arc<EndpointConfig>,
    /// The listener terminates TLS itself.
    pub tls: bool,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    sessions: SessionStore,
}

impl HttpServer {
    /// Build the codec pipeline and session store, then the Axum router.
    pub fn new(config: GatewayConfig, router: ProtocolRouter) -> CodecResult<Self> {
        let pipeline = Arc::new(CodecPipeline::from_config(&config.codec)?);
        let sessions = SessionStore::new(&config.session);

        let state = AppState {
            pipeline,
            router: Arc::new(router),
            sessions: sessions.clone(),
            session_config: Arc::new(config.session.clone()),
            endpoint: Arc::new(config.gateway.clone()),
            tls: config.listener.tls.is_some(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            sessions,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let path = config.gateway.path.as_str();
        let mut router = Router::new()
            .route(path, post(gateway_handler))
            .route(&format!("{}/{{*alias}}", path), post(gateway_alias_handler))
            .route("/health", get(health_handler));
        if config.gateway.expose_protocol_list {
            router = router.route(&format!("{}/protocols", path), get(protocols_handler));
        }

        with_middleware(router.with_state(state), config)
    }

    /// Run the server on a plain TCP listener until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            gateway_path = %self.config.gateway.path,
            "HTTP server starting"
        );
        self.spawn_sweeper(&shutdown);

        let mut stop = shutdown.subscribe();
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server behind rustls until `shutdown` fires.
    pub async fn run_tls(self, listener: std::net::TcpListener, tls: &TlsConfig, shutdown: Shutdown) -> io::Result<()> {
        let rustls = load_tls_config(tls).await?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            gateway_path = %self.config.gateway.path,
            "HTTPS server starting"
        );
        self.spawn_sweeper(&shutdown);

        let handle = axum_server::Handle::new();
        let drain = Duration::from_secs(self.config.timeouts.request_secs);
        let mut stop = shutdown.subscribe();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            let _ = stop.recv().await;
            signal_handle.graceful_shutdown(Some(drain));
        });

        axum_server::from_tcp_rustls(listener, rustls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    fn spawn_sweeper(&self, shutdown: &Shutdown) {
        let interval = Duration::from_secs(self.config.session.sweep_interval_secs);
        tokio::spawn(self.sessions.clone().run_sweeper(interval, shutdown.subscribe()));
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

/// Wrap every route in the shared middleware stack.
///
/// The concurrency limit holds one semaphore for the whole router; axum
/// clones a layer per route, so a per-service limit would not be global.
#[allow(deprecated)]
fn with_middleware(router: Router, config: &GatewayConfig) -> Router {
    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
        .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Load the PEM certificate chain and private key.
async fn load_tls_config(tls: &TlsConfig) -> io::Result<RustlsConfig> {
    for (kind, path) in [("certificate", &tls.cert_path), ("private key", &tls.key_path)] {
        if !std::path::Path::new(path).exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} file not found: {}", kind, path),
            ));
        }
    }
    RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await
}

/// `GET /health`
async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Json(json!({
        "status": "healthy",
        "timestamp": timestamp,
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.len(),
        "protocols": state.router.registry().len(),
    }))
}

/// `GET {gateway.path}/protocols`
async fn protocols_handler(State(state): State<AppState>) -> Json<Vec<ProtocolDescriptor>> {
    Json(state.router.registry().descriptors().cloned().collect())
}
