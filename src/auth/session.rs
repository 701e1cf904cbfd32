//! Server-side session store.
//!
//! Sessions live in process memory keyed by a random id. The browser only
//! ever holds a signed reference to that id (see [`super::cookie`]). Expired
//! entries are invisible to readers and removed by [`SessionStore::purge_expired`],
//! which [`SessionStore::spawn_sweeper`] runs on an interval.

use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration};

use rand::{distributions::Alphanumeric, Rng};
use time::{Duration, OffsetDateTime};
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, info};
use uuid::Uuid;

const SESSION_ID_LENGTH: usize = 48;
const MIN_SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: Uuid,
    pub refresh_token: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    /// Lifetime granted at creation and again on every touch.
    pub ttl: Duration,
}

impl Session {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    /// Whole seconds left before expiry, zero once expired.
    pub fn remaining_secs(&self, now: OffsetDateTime) -> i64 {
        (self.expires_at - now).whole_seconds().max(0)
    }
}

/// Everything needed to open a session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub refresh_token: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub ttl: Duration,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, new: NewSession) -> Session {
        let now = OffsetDateTime::now_utc();
        let session = Session {
            id: generate_session_id(),
            user_id: new.user_id,
            refresh_token: new.refresh_token,
            user_agent: new.user_agent,
            ip_address: new.ip_address,
            created_at: now,
            expires_at: now + new.ttl,
            ttl: new.ttl,
        };
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        debug!(user_id = %session.user_id, expires_at = %session.expires_at, "session created");
        session
    }

    /// Live session by id. An expired entry is dropped and reported as absent.
    pub async fn get(&self, id: &str) -> Option<Session> {
        let now = OffsetDateTime::now_utc();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                Some(s) if !s.is_expired_at(now) => return Some(s.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.sessions.write().await.remove(id);
        debug!("expired session dropped on read");
        None
    }

    /// Pushes a live session's expiry to a full lifetime from now.
    pub async fn touch(&self, id: &str) -> Option<Session> {
        self.touch_at(id, OffsetDateTime::now_utc()).await
    }

    async fn touch_at(&self, id: &str, now: OffsetDateTime) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(s) if !s.is_expired_at(now) => {
                s.expires_at = now + s.ttl;
                Some(s.clone())
            }
            Some(_) => {
                sessions.remove(id);
                None
            }
            None => None,
        }
    }

    /// Removes the session. Returns whether a live session was destroyed.
    pub async fn destroy(&self, id: &str) -> bool {
        let now = OffsetDateTime::now_utc();
        match self.sessions.write().await.remove(id) {
            Some(session) => !session.is_expired_at(now),
            None => false,
        }
    }

    pub async fn destroy_for_user(&self, user_id: Uuid) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        before - sessions.len()
    }

    pub async fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        before - sessions.len()
    }

    pub async fn active_count(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| !s.is_expired_at(now))
            .count()
    }

    /// Purges on a fixed period; a zero period is raised to one second.
    pub fn spawn_sweeper(&self, every: StdDuration) -> JoinHandle<()> {
        let store = self.clone();
        let every = every.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.purge_expired().await;
                if removed > 0 {
                    info!(removed, "expired sessions purged");
                }
            }
        })
    }
}

fn generate_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LENGTH)
        .map(char::from)
        .collect()
}

pub fn generate_refresh_token() -> String {
    Uuid::new_v4().to_string()
}
