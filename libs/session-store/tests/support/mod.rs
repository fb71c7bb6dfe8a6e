//! Request/response helpers shared by the server-backed test suites

#![allow(dead_code)]

use axum::http::{HeaderMap, HeaderValue, header};
use axum_extra::extract::cookie::Cookie;
use chrono::Utc;
use common::database::DatabaseConfig;
use session_store::{RecordStore, SessionRecord, SessionStore};

pub struct Response {
    pub headers: HeaderMap,
    pub body: String,
    pub session_id: String,
}

impl Response {
    pub fn cookie(&self, name: &str) -> Option<Cookie<'static>> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| Cookie::parse(value.to_string()).ok())
            .find(|cookie| cookie.name() == name)
    }

    /// Request headers replaying the named cookie
    pub fn replay(&self, name: &str) -> HeaderMap {
        let cookie = self.cookie(name).expect("response sets the session cookie");
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{}={}", cookie.name(), cookie.value())).unwrap(),
        );
        headers
    }
}

/// Database configuration for a server-backed suite, if `DATABASE_URL`
/// selects that backend
pub fn config_for(matches: fn(&DatabaseConfig) -> bool) -> Option<DatabaseConfig> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL is not set, skipping");
        return None;
    }

    let config = DatabaseConfig::from_env().expect("Failed to create database config");
    if !matches(&config) {
        eprintln!("DATABASE_URL selects another backend, skipping");
        return None;
    }
    Some(config)
}

/// A table name no other test run uses
pub fn unique_table_name() -> String {
    format!("sessions_{}", rand::random::<u32>())
}

/// Increment the `count` value of the named session
pub async fn count<R: RecordStore>(
    store: &SessionStore<R>,
    name: &str,
    request: &HeaderMap,
) -> Response {
    let mut session = store.get(request, name).await.expect("get failed");
    let count = session.get::<i64>("count").unwrap_or(0) + 1;
    session.insert("count", count).unwrap();

    let mut headers = HeaderMap::new();
    store.save(&mut headers, &session).await.expect("save failed");

    Response {
        headers,
        body: count.to_string(),
        session_id: session.id().to_string(),
    }
}

pub async fn find<R: RecordStore>(store: &SessionStore<R>, id: &str) -> Option<SessionRecord> {
    store.records().find(id).await.expect("find failed")
}

pub async fn expire<R: RecordStore>(store: &SessionStore<R>, id: &str) {
    let mut record = find(store, id).await.expect("record exists");
    record.expires_at = Utc::now() - chrono::Duration::days(40);
    store.records().upsert(&record).await.unwrap();
}
