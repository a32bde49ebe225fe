//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware: request id, trace, timeout, limits)
//!     → gateway.rs
//!         multipart extract → codec decode → GameRequest
//!         → session resolve + cookie capture
//!         → protocol router (errors become an "Error" envelope)
//!     → response.rs (encode reply: opaque bytes or JSON envelope)
//!     → session cookies reissued → Send to client
//! ```

pub mod gateway;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
