//! Cookie-keyed session cache with sliding expiry.
//!
//! # Responsibilities
//! - Resume, create or recover a session from the request cookie
//! - Merge captured request cookies into the session jar
//! - Evict idle sessions lazily and from a periodic sweeper

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::observability::metrics;
use crate::session::cookies::CookieDenylist;
use crate::session::game::GameSession;

/// How `get_or_create` satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The cookie named a live session.
    Resumed,
    /// No usable cookie, or the session expired.
    Created,
    /// The cookie was malformed and was replaced.
    Recovered,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Resumed => "resumed",
            SessionOutcome::Created => "created",
            SessionOutcome::Recovered => "recovered",
        }
    }
}

/// Decision taken while the shard lock is held.
enum Lookup {
    Live(Arc<GameSession>),
    Recreated(Arc<GameSession>),
    Missing,
}

/// Thread-safe session cache.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<DashMap<String, Arc<GameSession>>>,
    ttl: Duration,
    resume_unknown: bool,
    denylist: Arc<CookieDenylist>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl: Duration::from_secs(config.ttl_secs),
            resume_unknown: config.resume_unknown,
            denylist: Arc::new(CookieDenylist::new(&config.capture_denylist, &config.cookie_name)),
        }
    }

    /// Override the idle TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Resolve the session named by `cookie`, creating one when needed.
    pub fn get_or_create(&self, cookie: Option<&str>) -> (Arc<GameSession>, SessionOutcome) {
        let Some(raw) = cookie.map(str::trim).filter(|c| !c.is_empty()) else {
            return (self.create_fresh(), self.record(SessionOutcome::Created));
        };

        let id = match Uuid::parse_str(raw) {
            Ok(uuid) => uuid.hyphenated().to_string(),
            Err(_) => {
                tracing::warn!(cookie = %raw, "Discarding malformed session cookie");
                self.inner.remove(raw);
                return (self.create_fresh(), self.record(SessionOutcome::Recovered));
            }
        };

        // The entry guard holds a shard lock; inserting another key must wait until it drops.
        let lookup = match self.inner.entry(id) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_expired(self.ttl) {
                    entry.get().touch();
                    Lookup::Live(entry.get().clone())
                } else if self.resume_unknown {
                    let session = Arc::new(GameSession::new(entry.key().clone()));
                    entry.insert(session.clone());
                    Lookup::Recreated(session)
                } else {
                    entry.remove();
                    Lookup::Missing
                }
            }
            Entry::Vacant(entry) => {
                if self.resume_unknown {
                    let session = Arc::new(GameSession::new(entry.key().clone()));
                    entry.insert(session.clone());
                    Lookup::Recreated(session)
                } else {
                    Lookup::Missing
                }
            }
        };

        match lookup {
            Lookup::Live(session) => (session, self.record(SessionOutcome::Resumed)),
            Lookup::Recreated(session) => {
                tracing::debug!(session_id = %session.id(), "Resumed unknown session id");
                (session, self.record(SessionOutcome::Created))
            }
            Lookup::Missing => (self.create_fresh(), self.record(SessionOutcome::Created)),
        }
    }

    fn create_fresh(&self) -> Arc<GameSession> {
        loop {
            let id = Uuid::new_v4().hyphenated().to_string();
            if let Entry::Vacant(entry) = self.inner.entry(id) {
                let session = Arc::new(GameSession::new(entry.key().clone()));
                entry.insert(session.clone());
                tracing::debug!(session_id = %session.id(), "Session created");
                return session;
            }
        }
    }

    fn record(&self, outcome: SessionOutcome) -> SessionOutcome {
        metrics::record_session(outcome.as_str(), self.inner.len());
        outcome
    }

    /// Merge request cookies into the session jar, skipping denied names.
    /// Returns how many were captured.
    pub fn capture_cookies<'a>(
        &self,
        session: &GameSession,
        cookies: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> usize {
        let mut captured = 0;
        for (name, value) in cookies {
            if name.is_empty() || self.denylist.is_denied(name) {
                continue;
            }
            session.remember_cookie(name, value);
            captured += 1;
        }
        captured
    }

    /// Remove every expired session. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, session| !session.is_expired(self.ttl));
        let removed = before.saturating_sub(self.inner.len());
        metrics::record_active_sessions(self.inner.len());
        removed
    }

    /// Periodically sweep until shutdown.
    pub async fn run_sweeper(self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = interval.as_secs(), "Session sweeper starting");
        let mut ticker = time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep_expired();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.len(), "Swept expired sessions");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Session sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<GameSession>> {
        self.inner.get(id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
