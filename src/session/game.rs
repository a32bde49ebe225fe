//! Per-session state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dashmap::DashMap;
use md5::{Digest, Md5};
use rand::{rngs::OsRng, RngCore};

const MX_TOKEN_BYTES: usize = 32;

/// Account and account-server ids bound to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountIdentity {
    pub account_id: i64,
    pub account_server_id: i64,
}

impl AccountIdentity {
    /// Deterministic identity from the session id: MD5, two little-endian
    /// halves, masked positive. Zero maps to one.
    pub fn derive(session_id: &str) -> Self {
        let digest = Md5::digest(session_id.as_bytes());
        let half = |range: std::ops::Range<usize>| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest[range]);
            match i64::from_le_bytes(bytes) & i64::MAX {
                0 => 1,
                id => id,
            }
        };
        Self {
            account_id: half(0..8),
            account_server_id: half(8..16),
        }
    }
}

/// One client session.
///
/// The token and identity are write-once; the cookie jar only grows.
#[derive(Debug)]
pub struct GameSession {
    id: String,
    mx_token: OnceLock<String>,
    identity: OnceLock<AccountIdentity>,
    cookies: DashMap<String, String>,
    created_at: Instant,
    /// Nanoseconds after `created_at` of the last lookup.
    last_accessed: AtomicU64,
}

impl GameSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mx_token: OnceLock::new(),
            identity: OnceLock::new(),
            cookies: DashMap::new(),
            created_at: Instant::now(),
            last_accessed: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The session token, fixed by the first call.
    ///
    /// A non-empty `candidate` is adopted if no token is set yet; otherwise a
    /// random token is minted. Later candidates are ignored.
    pub fn capture_or_get_mx_token(&self, candidate: Option<&str>) -> &str {
        self.mx_token.get_or_init(|| {
            match candidate.map(str::trim).filter(|c| !c.is_empty()) {
                Some(token) => token.to_string(),
                None => {
                    let mut bytes = [0u8; MX_TOKEN_BYTES];
                    OsRng.fill_bytes(&mut bytes);
                    BASE64.encode(bytes)
                }
            }
        })
    }

    pub fn mx_token(&self) -> Option<&str> {
        self.mx_token.get().map(String::as_str)
    }

    pub fn identity(&self) -> AccountIdentity {
        *self.identity.get_or_init(|| AccountIdentity::derive(&self.id))
    }

    /// Last-write-wins insert into the cookie jar.
    pub fn remember_cookie(&self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    /// Captured cookies ordered by name.
    pub fn cookie_jar(&self) -> Vec<(String, String)> {
        let mut jar: Vec<_> = self
            .cookies
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        jar.sort();
        jar
    }

    pub fn touch(&self) {
        let elapsed = self.created_at.elapsed().as_nanos() as u64;
        self.last_accessed.fetch_max(elapsed, Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_nanos(self.last_accessed.load(Ordering::Relaxed));
        self.created_at.elapsed().saturating_sub(last)
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.idle_for() > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_identity_is_deterministic_and_positive() {
        let id = "0b7e1a0c-3f6d-4a53-9a35-2a8e1c9d4f10";
        let a = AccountIdentity::derive(id);
        let b = GameSession::new(id).identity();
        assert_eq!(a, b);
        assert!(a.account_id > 0);
        assert!(a.account_server_id > 0);
        assert_ne!(a, AccountIdentity::derive("another-session"));
    }

    #[test]
    fn test_mx_token_is_captured_once() {
        let session = GameSession::new("s");
        assert_eq!(session.mx_token(), None);
        assert_eq!(session.capture_or_get_mx_token(Some("client-token")), "client-token");
        assert_eq!(session.capture_or_get_mx_token(Some("other-token")), "client-token");
        assert_eq!(session.capture_or_get_mx_token(None), "client-token");
    }

    #[test]
    fn test_mx_token_is_synthesized_when_absent() {
        let session = GameSession::new("s");
        let token = session.capture_or_get_mx_token(Some("   ")).to_string();
        assert_eq!(BASE64.decode(&token).unwrap().len(), MX_TOKEN_BYTES);
        assert_eq!(session.capture_or_get_mx_token(Some("late")), token);
    }

    #[test]
    fn test_concurrent_capture_has_one_winner() {
        let session = Arc::new(GameSession::new("race"));
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let session = session.clone();
                std::thread::spawn(move || {
                    session
                        .capture_or_get_mx_token(Some(format!("token-{}", i).as_str()))
                        .to_string()
                })
            })
            .collect();
        let tokens: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(tokens.iter().all(|t| t == &tokens[0]));
        assert_eq!(session.mx_token(), Some(tokens[0].as_str()));
    }

    #[test]
    fn test_cookie_jar_last_write_wins() {
        let session = GameSession::new("s");
        session.remember_cookie("b", "1");
        session.remember_cookie("a", "1");
        session.remember_cookie("b", "2");
        assert_eq!(
            session.cookie_jar(),
            vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn test_touch_resets_idle_time() {
        let session = GameSession::new("s");
        std::thread::sleep(Duration::from_millis(100));
        assert!(session.is_expired(Duration::from_millis(50)));
        session.touch();
        assert!(!session.is_expired(Duration::from_millis(50)));
    }
}
