//! Immutable protocol registry.
//!
//! # Responsibilities
//! - Build descriptors from handler registrations once, before serving
//! - Resolve a code, name, normalized name or path alias to one handler
//! - Resolve hash aliases through a separate explicit lookup
//!
//! # Design Decisions
//! - Any key collision is a startup error, so every key maps to exactly one descriptor
//! - Lookups never fail loudly: an unknown identifier is `None`

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::protocol::descriptor::{ProtocolCode, ProtocolDescriptor};
use crate::protocol::handler::{HandlerRegistration, ProtocolHandler};

/// Errors raised while building the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("protocol code {code} registered by both {first} and {second}")]
    DuplicateCode {
        code: ProtocolCode,
        first: String,
        second: String,
    },

    #[error("{kind} '{alias}' derived from both {first} and {second}")]
    DuplicateAlias {
        kind: &'static str,
        alias: String,
        first: String,
        second: String,
    },

    #[error("protocol code {0} registered with an empty name")]
    EmptyName(ProtocolCode),
}

/// How a request identifies its protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolId<'a> {
    Code(ProtocolCode),
    Name(&'a str),
}

/// A descriptor and its handler.
#[derive(Clone)]
pub struct RegisteredProtocol {
    pub descriptor: ProtocolDescriptor,
    pub handler: Arc<dyn ProtocolHandler>,
}

impl std::fmt::Debug for RegisteredProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProtocol")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct ProtocolRegistry {
    /// Ordered by code.
    entries: Vec<RegisteredProtocol>,
    by_code: HashMap<ProtocolCode, usize>,
    by_name: HashMap<String, usize>,
    by_normalized: HashMap<String, usize>,
    by_path: HashMap<String, usize>,
    by_hash: HashMap<String, usize>,
}

fn normalize(name: &str) -> String {
    name.replace('/', "_").to_lowercase()
}

impl ProtocolRegistry {
    /// Build the registry from handler registrations.
    pub fn build(
        registrations: impl IntoIterator<Item = HandlerRegistration>,
    ) -> Result<Self, RegistryError> {
        let mut entries: Vec<RegisteredProtocol> = registrations
            .into_iter()
            .map(|r| RegisteredProtocol {
                descriptor: ProtocolDescriptor::new(r.code, r.name),
                handler: r.handler,
            })
            .collect();
        entries.sort_by_key(|e| e.descriptor.code);

        let mut registry = Self::default();
        for (index, entry) in entries.iter().enumerate() {
            let d = &entry.descriptor;
            if d.name.trim().is_empty() {
                return Err(RegistryError::EmptyName(d.code));
            }
            if let Some(&prev) = registry.by_code.get(&d.code) {
                return Err(RegistryError::DuplicateCode {
                    code: d.code,
                    first: entries[prev].descriptor.name.clone(),
                    second: d.name.clone(),
                });
            }
            registry.by_code.insert(d.code, index);

            let keys = [
                ("name", &mut registry.by_name, d.name.clone()),
                ("normalized name", &mut registry.by_normalized, normalize(&d.name)),
                ("path alias", &mut registry.by_path, d.path_alias.clone()),
                ("hash alias", &mut registry.by_hash, d.hash_alias.to_ascii_uppercase()),
            ];
            for (kind, map, key) in keys {
                if let Some(&prev) = map.get(&key) {
                    return Err(RegistryError::DuplicateAlias {
                        kind,
                        alias: key,
                        first: entries[prev].descriptor.name.clone(),
                        second: d.name.clone(),
                    });
                }
                map.insert(key, index);
            }
        }

        registry.entries = entries;
        tracing::info!(protocols = registry.entries.len(), "Protocol registry built");
        Ok(registry)
    }

    pub fn resolve(&self, id: ProtocolId<'_>) -> Option<&RegisteredProtocol> {
        match id {
            ProtocolId::Code(code) => self.resolve_code(code),
            ProtocolId::Name(name) => self.resolve_name(name),
        }
    }

    pub fn resolve_code(&self, code: ProtocolCode) -> Option<&RegisteredProtocol> {
        self.by_code.get(&code).map(|&i| &self.entries[i])
    }

    /// Exact name, then normalized name, then path alias. A numeric string
    /// falls back to a code lookup.
    pub fn resolve_name(&self, ident: &str) -> Option<&RegisteredProtocol> {
        let ident = ident.trim();
        if ident.is_empty() {
            return None;
        }

        self.by_name
            .get(ident)
            .or_else(|| self.by_normalized.get(&normalize(ident)))
            .or_else(|| {
                self.by_path
                    .get(&ident.trim_start_matches('/').to_lowercase())
            })
            .map(|&i| &self.entries[i])
            .or_else(|| ident.parse::<ProtocolCode>().ok().and_then(|c| self.resolve_code(c)))
    }

    /// Explicit hash-alias lookup, case-insensitive.
    pub fn resolve_hash(&self, hash: &str) -> Option<&RegisteredProtocol> {
        self.by_hash
            .get(&hash.trim().to_ascii_uppercase())
            .map(|&i| &self.entries[i])
    }

    /// Descriptors ordered by code.
    pub fn descriptors(&self) -> impl Iterator<Item = &ProtocolDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
