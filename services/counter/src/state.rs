//! Application state shared across handlers

use session_store::{RecordStore, SessionStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState<R: RecordStore> {
    pub sessions: SessionStore<R>,
}
