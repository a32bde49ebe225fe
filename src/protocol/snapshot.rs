//! Account-snapshot collaborator.
//!
//! The router forwards the parsed reply of account-related protocols here.
//! Delivery is best-effort: failures are logged and never fail the request.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

use crate::protocol::handler::BoxError;

const NICKNAME_PATHS: &[&str] = &["/AccountInfo/Nickname", "/Nickname", "/Account/Nickname"];
const LEVEL_PATHS: &[&str] = &["/AccountInfo/Level", "/Level", "/Account/Level"];
const PYROXENE_PATHS: &[&str] = &["/Pyroxene", "/AccountInfo/Pyroxene"];
const PAID_PYROXENE_PATHS: &[&str] = &["/AccountCurrency/CurrencyDict/PaidPyroxene", "/PaidPyroxene"];
const FREE_PYROXENE_PATHS: &[&str] = &["/AccountCurrency/CurrencyDict/FreePyroxene", "/FreePyroxene"];
const CREDITS_PATHS: &[&str] = &[
    "/AccountCurrency/CurrencyDict/Gold",
    "/Credits",
    "/AccountInfo/Credits",
];

/// Fields pulled out of an account-related reply. Any of them may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub nickname: Option<String>,
    pub level: Option<i64>,
    pub pyroxene: Option<i64>,
    pub paid_pyroxene: Option<i64>,
    pub free_pyroxene: Option<i64>,
    pub credits: Option<i64>,
}

impl AccountSnapshot {
    /// Extract known fields, trying each candidate path in order.
    pub fn extract(payload: &Value) -> Self {
        Self {
            nickname: first_match(payload, NICKNAME_PATHS, |v| v.as_str().map(str::to_string)),
            level: first_match(payload, LEVEL_PATHS, as_integer),
            pyroxene: first_match(payload, PYROXENE_PATHS, as_integer),
            paid_pyroxene: first_match(payload, PAID_PYROXENE_PATHS, as_integer),
            free_pyroxene: first_match(payload, FREE_PYROXENE_PATHS, as_integer),
            credits: first_match(payload, CREDITS_PATHS, as_integer),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn first_match<T>(payload: &Value, paths: &[&str], convert: impl Fn(&Value) -> Option<T>) -> Option<T> {
    paths
        .iter()
        .filter_map(|p| payload.pointer(p))
        .find_map(convert)
}

fn as_integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Protocols whose replies are forwarded to the snapshot sink.
pub fn is_account_protocol(name: &str) -> bool {
    name.starts_with("Account_")
        || name.contains("Auth")
        || name.contains("Login")
        || name.contains("Check")
}

/// Receiver of account snapshots. Implementations must not block.
pub trait AccountSnapshotSink: Send + Sync {
    fn record(&self, account_id: i64, protocol: &str, snapshot: &AccountSnapshot) -> Result<(), BoxError>;
}

/// Keeps the latest snapshot per account in memory, merging field by field.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotSink {
    inner: Arc<DashMap<i64, AccountSnapshot>>,
}

impl InMemorySnapshotSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, account_id: i64) -> Option<AccountSnapshot> {
        self.inner.get(&account_id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl AccountSnapshotSink for InMemorySnapshotSink {
    fn record(&self, account_id: i64, protocol: &str, snapshot: &AccountSnapshot) -> Result<(), BoxError> {
        let mut entry = self.inner.entry(account_id).or_default();
        let current = entry.value_mut();
        if snapshot.nickname.is_some() {
            current.nickname = snapshot.nickname.clone();
        }
        current.level = snapshot.level.or(current.level);
        current.pyroxene = snapshot.pyroxene.or(current.pyroxene);
        current.paid_pyroxene = snapshot.paid_pyroxene.or(current.paid_pyroxene);
        current.free_pyroxene = snapshot.free_pyroxene.or(current.free_pyroxene);
        current.credits = snapshot.credits.or(current.credits);

        tracing::debug!(account_id, protocol, "Account snapshot updated");
        Ok(())
    }
}
