//! Session continuity subsystem.
//!
//! # Data Flow
//! ```text
//! request cookie "uuid"
//!     → store.rs get_or_create: live → touch | missing/expired → new id | malformed → recover
//!     → GameSession: MxToken captured once, identity derived from the id
//!     → request cookies (minus denylist) merged into the session jar
//! response
//!     → cookies.rs: session cookie + static cookies + captured jar
//! ```
//!
//! # Design Decisions
//! - Process-local cache only; identity is re-derivable from the session id
//! - Sharded map (DashMap) so unrelated sessions never contend
//! - Write-once fields use `OnceLock`, so the first writer wins a capture race

pub mod cookies;
pub mod game;
pub mod store;

pub use cookies::{write_session_cookies, CookieDenylist, CookiePolicy};
pub use game::{AccountIdentity, GameSession};
pub use store::{SessionOutcome, SessionStore};
