//! Session lifecycle management
//!
//! [`SessionStore`] ties the cookie envelope, the payload codec and a
//! [`RecordStore`] together. Cookies are read from request headers and
//! written as `Set-Cookie` headers on the response header map.
//!
//! A sweep can delete a record between a `get` and the following `save`. The
//! upsert in `save` then inserts the row again; last write wins.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, header::SET_COOKIE};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{Duration, Utc};
use sqlx::{MySqlPool, PgPool, SqlitePool};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::codec::PayloadCodec;
use crate::envelope::{CookieEnvelope, generate_id};
use crate::error::{SessionError, SessionResult};
use crate::models::{CookieOptions, Session, SessionRecord};
use crate::repositories::{
    DEFAULT_TABLE_NAME, MySqlRecordStore, PgRecordStore, RecordStore, SqliteRecordStore,
};

/// Store configuration
#[derive(Clone)]
pub struct StoreOptions {
    /// Table holding the session records
    pub table_name: String,
    /// Do not create the table at construction
    pub skip_create_table: bool,
    /// Maximum encoded payload size in bytes, unbounded when `None`
    pub max_length: Option<usize>,
    /// Options given to every new or loaded session
    pub session: CookieOptions,
    /// Cookie encryption keys, current first; empty leaves cookies signed only
    pub encryption_keys: Vec<Vec<u8>>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            skip_create_table: false,
            max_length: None,
            session: CookieOptions::default(),
            encryption_keys: Vec::new(),
        }
    }
}

impl std::fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreOptions")
            .field("table_name", &self.table_name)
            .field("skip_create_table", &self.skip_create_table)
            .field("max_length", &self.max_length)
            .field("session", &self.session)
            .field("encryption_keys", &self.encryption_keys.len())
            .finish()
    }
}

struct Inner {
    envelope: CookieEnvelope,
    codec: PayloadCodec,
    defaults: CookieOptions,
}

/// Cookie-addressed session store backed by a relational table
///
/// Cloning is cheap: clones share the pool and the configuration.
#[derive(Clone)]
pub struct SessionStore<R: RecordStore> {
    records: R,
    inner: Arc<Inner>,
}

impl SessionStore<PgRecordStore> {
    /// Open a store over a PostgreSQL pool
    pub async fn postgres<I, K>(pool: PgPool, options: StoreOptions, keys: I) -> SessionResult<Self>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let records = PgRecordStore::new(pool, &options.table_name)?;
        Self::open(records, options, keys).await
    }
}

impl SessionStore<MySqlRecordStore> {
    /// Open a store over a MySQL pool
    pub async fn mysql<I, K>(pool: MySqlPool, options: StoreOptions, keys: I) -> SessionResult<Self>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let records = MySqlRecordStore::new(pool, &options.table_name)?;
        Self::open(records, options, keys).await
    }
}

impl SessionStore<SqliteRecordStore> {
    /// Open a store over a SQLite pool
    pub async fn sqlite<I, K>(
        pool: SqlitePool,
        options: StoreOptions,
        keys: I,
    ) -> SessionResult<Self>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let records = SqliteRecordStore::new(pool, &options.table_name)?;
        Self::open(records, options, keys).await
    }
}

impl<R: RecordStore> SessionStore<R> {
    /// Open a store over an existing record store
    ///
    /// The first key signs cookies; any key verifies them. The cookie age
    /// check uses the default max age from `options.session`, so a session
    /// saved with a longer max age still loses its cookie at the default age.
    /// Unless
    /// `skip_create_table` is set the table is provisioned here, and a failure
    /// to do so is returned instead of a store.
    pub async fn open<I, K>(records: R, options: StoreOptions, keys: I) -> SessionResult<Self>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let envelope = CookieEnvelope::new(keys)?
            .with_encryption_keys(&options.encryption_keys)?
            .with_max_age(Some(options.session.max_age));
        let codec = PayloadCodec::new(options.max_length);

        if options.skip_create_table {
            debug!("Skipping creation of session table {}", records.table_name());
        } else {
            records.create_table().await?;
        }

        info!("Session store ready on table {}", records.table_name());

        Ok(Self {
            records,
            inner: Arc::new(Inner {
                envelope,
                codec,
                defaults: options.session,
            }),
        })
    }

    /// Underlying record store
    pub fn records(&self) -> &R {
        &self.records
    }

    /// Default cookie options for new sessions
    pub fn default_options(&self) -> &CookieOptions {
        &self.inner.defaults
    }

    /// Load the session named `name` for a request, or start a new one
    ///
    /// A missing, forged or expired cookie, an unknown or expired record, and
    /// an undecodable payload all yield a fresh session. Only backend
    /// failures are returned as errors.
    pub async fn get(&self, headers: &HeaderMap, name: &str) -> SessionResult<Session> {
        let jar = CookieJar::from_headers(headers);
        let Some(cookie) = jar.get(name) else {
            return Ok(self.fresh(name));
        };

        let id = match self.inner.envelope.open(name, cookie.value()) {
            Ok(id) => id,
            Err(e) => {
                debug!("Ignoring session cookie {}: {}", name, e);
                return Ok(self.fresh(name));
            }
        };

        let Some(record) = self.records.find(&id).await? else {
            debug!("No stored session for cookie {}", name);
            return Ok(self.fresh(name));
        };

        if record.is_expired(Utc::now()) {
            debug!("Stored session for cookie {} has expired", name);
            return Ok(self.fresh(name));
        }

        match self.inner.codec.decode(&record.data) {
            Ok(values) => Ok(Session::loaded(
                id,
                name,
                values,
                self.inner.defaults.clone(),
            )),
            Err(e) => {
                warn!("Discarding stored session for cookie {}: {}", name, e);
                Ok(self.fresh(name))
            }
        }
    }

    /// Persist a session and write its cookie to the response headers
    ///
    /// A max age of zero or less deletes the record and tells the client to
    /// drop the cookie. Nothing is written to the backend or the headers when
    /// the payload is too large, and no cookie is written when the backend
    /// rejects the update.
    pub async fn save(&self, headers: &mut HeaderMap, session: &Session) -> SessionResult<()> {
        if session.options.max_age <= 0 {
            self.records.delete(session.id()).await?;
            let cookie = removal_cookie(session);
            headers.append(SET_COOKIE, HeaderValue::from_str(&cookie.to_string())?);
            debug!("Destroyed session for cookie {}", session.name());
            return Ok(());
        }

        let data = self.inner.codec.encode(session.values())?;

        let now = Utc::now();
        let max_age = Duration::try_seconds(session.options.max_age).ok_or_else(|| {
            SessionError::Configuration(format!(
                "max age out of range: {}",
                session.options.max_age
            ))
        })?;
        let expires_at = now.checked_add_signed(max_age).ok_or_else(|| {
            SessionError::Configuration("session expiry out of range".to_string())
        })?;

        let record = SessionRecord {
            id: session.id().to_string(),
            data,
            created_at: now,
            updated_at: now,
            expires_at,
        };
        self.records.upsert(&record).await?;

        let value = self.inner.envelope.seal(session.name(), session.id())?;
        let cookie = session_cookie(session, value);
        headers.append(SET_COOKIE, HeaderValue::from_str(&cookie.to_string())?);

        Ok(())
    }

    /// Delete every expired record once
    pub async fn cleanup(&self) -> SessionResult<u64> {
        let deleted = self.records.delete_expired(Utc::now()).await?;
        if deleted > 0 {
            info!(
                "Deleted {} expired sessions from {}",
                deleted,
                self.records.table_name()
            );
        }
        Ok(deleted)
    }

    /// Check that the backend is reachable
    pub async fn health_check(&self) -> SessionResult<bool> {
        Ok(self.records.health_check().await?)
    }

    fn fresh(&self, name: &str) -> Session {
        Session::new(generate_id(), name, self.inner.defaults.clone())
    }
}

fn session_cookie(session: &Session, value: String) -> Cookie<'static> {
    let options = &session.options;
    let max_age = time::Duration::seconds(options.max_age);

    let mut cookie = Cookie::build((session.name().to_string(), value))
        .path(options.path.clone())
        .max_age(max_age)
        .secure(options.secure)
        .http_only(options.http_only);
    if let Some(expires) = OffsetDateTime::now_utc().checked_add(max_age) {
        cookie = cookie.expires(expires);
    }
    if let Some(domain) = &options.domain {
        cookie = cookie.domain(domain.clone());
    }
    if let Some(same_site) = options.same_site {
        cookie = cookie.same_site(same_site);
    }

    cookie.build()
}

fn removal_cookie(session: &Session) -> Cookie<'static> {
    let mut cookie = session_cookie(session, String::new());
    cookie.make_removal();
    cookie
}
