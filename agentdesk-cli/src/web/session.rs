//! Per-browser session state
//!
//! A `desk_session` cookie carries a random id. The id keys the session's
//! history and last upload in memory; nothing is persisted. Sessions idle
//! longer than the store's TTL are dropped on the next access.

use super::page::UploadView;
use agentdesk_core::history::{HistoryEntry, HistoryLog};
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

/// Idle time after which a session is forgotten
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Cookie naming the session
pub const SESSION_COOKIE: &str = "desk_session";

/// Session id taken from the request, or a freshly issued one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    /// True when the response must set the cookie
    pub is_new: bool,
}

impl Session {
    /// Read the session cookie, issuing a new id when absent or malformed
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match cookie_value(headers, SESSION_COOKIE).and_then(|v| Uuid::parse_str(&v).ok()) {
            Some(id) => Self {
                id: id.to_string(),
                is_new: false,
            },
            None => Self {
                id: Uuid::new_v4().to_string(),
                is_new: true,
            },
        }
    }

    /// `Set-Cookie` value for a new session
    pub fn set_cookie(&self) -> Option<String> {
        self.is_new.then(|| {
            format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax",
                SESSION_COOKIE, self.id
            )
        })
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
}

/// What a session has accumulated
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    pub history: HistoryLog,
    pub upload: Option<UploadView>,
}

#[derive(Debug)]
struct Slot {
    data: SessionData,
    last_seen: Instant,
}

/// State of every live session
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Slot>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Copy of a session's state
    pub async fn snapshot(&self, session_id: &str) -> SessionData {
        let mut sessions = self.live_sessions().await;
        match sessions.get_mut(session_id) {
            Some(slot) => {
                slot.last_seen = Instant::now();
                slot.data.clone()
            }
            None => SessionData::default(),
        }
    }

    /// Append to a session's history and return the updated copy
    pub async fn record(&self, session_id: &str, entry: HistoryEntry) -> SessionData {
        self.update(session_id, |data| {
            data.history.push(entry);
        }).await
    }

    /// Replace a session's last upload and return the updated copy
    pub async fn set_upload(&self, session_id: &str, upload: UploadView) -> SessionData {
        self.update(session_id, |data| data.upload = Some(upload)).await
    }

    /// Number of sessions not yet expired
    #[cfg(test)]
    pub async fn live_count(&self) -> usize {
        self.live_sessions().await.len()
    }

    async fn update(&self, session_id: &str, apply: impl FnOnce(&mut SessionData)) -> SessionData {
        let mut sessions = self.live_sessions().await;
        let slot = sessions.entry(session_id.to_string()).or_insert_with(|| Slot {
            data: SessionData::default(),
            last_seen: Instant::now(),
        });
        apply(&mut slot.data);
        slot.last_seen = Instant::now();
        slot.data.clone()
    }

    /// Lock the map after dropping sessions idle past the TTL
    async fn live_sessions(&self) -> tokio::sync::MutexGuard<'_, HashMap<String, Slot>> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, slot| slot.last_seen.elapsed() < self.ttl);
        let expired = before - sessions.len();
        if expired > 0 {
            tracing::debug!(expired, live = sessions.len(), "Expired idle sessions");
        }
        sessions
    }
}
