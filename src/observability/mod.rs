//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! gateway / session / codec
//!     → logging.rs (structured events, request id as a field)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
