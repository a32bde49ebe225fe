//! Cookie capture policy and response cookie construction.

use axum_extra::extract::cookie::{Cookie, CookieJar, Expiration, SameSite};
use time::OffsetDateTime;

use crate::session::game::GameSession;

/// Cookie names that are never captured or replayed.
#[derive(Debug, Clone)]
pub struct CookieDenylist {
    /// Lowercased prefixes.
    prefixes: Vec<String>,
    session_cookie: String,
}

impl CookieDenylist {
    pub fn new(prefixes: &[String], session_cookie: &str) -> Self {
        Self {
            prefixes: prefixes
                .iter()
                .map(|p| p.trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            session_cookie: session_cookie.to_string(),
        }
    }

    pub fn is_denied(&self, name: &str) -> bool {
        if name.eq_ignore_ascii_case(&self.session_cookie) {
            return true;
        }
        let lower = name.to_ascii_lowercase();
        self.prefixes.iter().any(|p| lower.starts_with(p.as_str()))
    }
}

/// Cookie attributes chosen per request.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    /// Request arrived over https.
    pub secure: bool,
    pub ttl: std::time::Duration,
}

impl CookiePolicy {
    /// `now + ttl`, or a browser-session cookie when that is not representable.
    fn expiration(&self) -> Expiration {
        time::Duration::try_from(self.ttl)
            .ok()
            .and_then(|ttl| OffsetDateTime::now_utc().checked_add(ttl))
            .map_or(Expiration::Session, Expiration::DateTime)
    }

    fn apply(&self, name: String, value: String) -> Cookie<'static> {
        let builder = Cookie::build((name, value))
            .path("/")
            .http_only(false)
            .expires(self.expiration());
        if self.secure {
            builder.same_site(SameSite::None).secure(true).build()
        } else {
            builder.same_site(SameSite::Lax).build()
        }
    }
}

/// Add the session cookie, static cookies and the session's captured jar.
pub fn write_session_cookies<'a>(
    mut jar: CookieJar,
    session_cookie: &str,
    session: &GameSession,
    static_cookies: impl IntoIterator<Item = (&'a String, &'a String)>,
    policy: CookiePolicy,
) -> CookieJar {
    jar = jar.add(policy.apply(session_cookie.to_string(), session.id().to_string()));
    for (name, value) in static_cookies {
        jar = jar.add(policy.apply(name.clone(), value.clone()));
    }
    for (name, value) in session.cookie_jar() {
        jar = jar.add(policy.apply(name, value));
    }
    jar
}
