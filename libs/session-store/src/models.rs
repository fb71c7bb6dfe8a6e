//! Session models
//!
//! [`Session`] is the request-scoped handle an application works with;
//! [`SessionRecord`] is the row persisted by a [`crate::RecordStore`].

use std::collections::BTreeMap;

use axum_extra::extract::cookie::SameSite;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{SessionError, SessionResult};

/// Thirty days, in seconds
pub const DEFAULT_MAX_AGE: i64 = 60 * 60 * 24 * 30;

/// Session payload: arbitrary JSON values keyed by name
pub type SessionValues = BTreeMap<String, Value>;

/// Cookie scoping options carried by every session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    /// Cookie path
    pub path: String,
    /// Cookie domain, host-only when `None`
    pub domain: Option<String>,
    /// Lifetime in seconds. Zero or negative destroys the session on save.
    pub max_age: i64,
    /// Only send the cookie over HTTPS
    pub secure: bool,
    /// Hide the cookie from scripts
    pub http_only: bool,
    /// SameSite attribute, omitted when `None`
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            max_age: DEFAULT_MAX_AGE,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }
}

/// A visitor's session for the duration of one request
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    name: String,
    values: SessionValues,
    is_new: bool,
    /// Options used when the session cookie is written
    pub options: CookieOptions,
}

impl Session {
    pub(crate) fn new(id: String, name: &str, options: CookieOptions) -> Self {
        Self {
            id,
            name: name.to_string(),
            values: SessionValues::new(),
            is_new: true,
            options,
        }
    }

    pub(crate) fn loaded(
        id: String,
        name: &str,
        values: SessionValues,
        options: CookieOptions,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            values,
            is_new: false,
            options,
        }
    }

    /// Session identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the cookie this session travels in
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when no stored session was found for the request
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Read a value, returning `None` when it is missing or has another shape
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Store a value under `key`, replacing any previous one
    pub fn insert<T: Serialize>(&mut self, key: &str, value: T) -> SessionResult<()> {
        let value = serde_json::to_value(value).map_err(SessionError::Encode)?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Remove a value, returning it if it was present
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Drop every value
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Raw payload
    pub fn values(&self) -> &SessionValues {
        &self.values
    }

    /// Mutable raw payload
    pub fn values_mut(&mut self) -> &mut SessionValues {
        &mut self.values
    }
}

/// Persisted session row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: String,
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Whether the record is logically dead at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
