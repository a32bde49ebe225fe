//! Multipart extraction of the client's `mx.dat` upload.
//!
//! # Data Flow
//! ```text
//! Content-Type → boundary
//! body → split on "--boundary" → per part: headers until blank line
//!      → Content-Disposition name ∈ {mx, mx.dat} → body bytes
//!      → base64 decode, or raw bytes when the body is not base64
//! ```
//!
//! # Design Decisions
//! - Only the subset the client emits is understood: no nesting, no transfer encodings
//! - Works on bytes so raw binary parts survive untouched
//! - Part Content-Type and filename are diagnostic only

pub mod extractor;

pub use extractor::{extract_mx_part, ExtractedPart, MultipartError, PART_NAMES};
