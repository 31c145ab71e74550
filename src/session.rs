//! Per-browser session state and the expiring store that holds it.

use base64::Engine;
use rand::RngCore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::chat::{ChatPage, ChatState};
use crate::forms::{FeedingForm, NutritionForm};
use crate::infection::InfectionState;
use crate::translation::Language;
use crate::umbilical::UmbilicalState;

pub const SESSION_COOKIE: &str = "incubate_session";

pub type SessionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Error,
    Warning,
    Info,
}

/// A message shown once on the next page render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Everything one caregiver has entered or received. Handlers take the
/// session lock for a whole action, so actions within one session run one
/// at a time.
#[derive(Debug, Clone)]
pub struct Session {
    pub language: Language,
    pub feeding: ChatState<FeedingForm>,
    pub nutrition: ChatState<NutritionForm>,
    pub infection: InfectionState,
    pub umbilical: UmbilicalState,
    notices: Vec<Notice>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            language: Language::default(),
            feeding: ChatState::new(ChatPage::Feeding),
            nutrition: ChatState::new(ChatPage::Nutrition),
            infection: InfectionState::default(),
            umbilical: UmbilicalState::default(),
            notices: Vec::new(),
        }
    }
}

impl Session {
    pub fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.notices.push(Notice {
            kind,
            message: message.into(),
        });
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.notify(NoticeKind::Error, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.notify(NoticeKind::Warning, message);
    }

    /// Returns pending notices and clears them.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

pub struct Entry {
    pub expires: time::Instant,
    pub session: Arc<Mutex<Session>>,
}

/// Result of looking up the caller's session.
pub struct SessionHandle {
    pub id: SessionId,
    pub session: Arc<Mutex<Session>>,
    /// True when no live session matched and a new one was started.
    pub created: bool,
}

/// In-memory sessions that expire after `ttl` without use.
pub struct SessionStore {
    entries: RwLock<HashMap<SessionId, Entry>>,
    ttl: time::Duration,
}

pub fn new_session_id() -> SessionId {
    let mut bytes = [0u8; 24];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

impl SessionStore {
    pub fn new(ttl: time::Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Finds the live session for `id` and extends its lifetime, or starts
    /// a new one under a fresh id.
    pub async fn get_or_create(&self, id: Option<&str>) -> SessionHandle {
        if let Some(id) = id {
            if let Some(session) = self.get(id).await {
                return SessionHandle {
                    id: id.to_string(),
                    session,
                    created: false,
                };
            }
        }

        let id = new_session_id();
        let session = Arc::new(Mutex::new(Session::default()));
        let mut entries = self.entries.write().await;
        entries.insert(
            id.clone(),
            Entry {
                expires: time::Instant::now() + self.ttl,
                session: session.clone(),
            },
        );
        debug!("Started session, {} live", entries.len());
        SessionHandle {
            id,
            session,
            created: true,
        }
    }

    /// Live session for `id`; a hit extends its lifetime.
    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        let now = time::Instant::now();
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(id).filter(|entry| entry.expires > now)?;
        entry.expires = now + self.ttl;
        Some(entry.session.clone())
    }

    /// Get the number of sessions in the store.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

/// Garbage collect expired sessions.
    /// Returns the number of sessions removed.
    pub async fn garbage_collect(&self) -> usize {
        let now = time::Instant::now();
        let mut entries = self.entries.write().await;
        let initial_count = entries.len();
        entries.retain(|_, entry| entry.expires > now);
        initial_count - entries.len()
    }
}

/// Periodically drops expired sessions until `shutdown` is cancelled.
#[instrument(skip(store, shutdown))]
pub async fn collect_expired_sessions(
    store: Arc<SessionStore>,
    interval: time::Duration,
    shutdown: CancellationToken,
) {
    info!(
        "Starting session cleanup loop with {}s interval",
        interval.as_secs()
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutting down session cleanup task");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                let removed = store.garbage_collect().await;
                if removed > 0 {
                    info!("Removed {} expired sessions", removed);
                }
            }
        }
    }

    info!("Session cleanup task terminated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = SessionStore::new(time::Duration::from_secs(60));
        assert_eq!(store.len().await, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_cookie_creates_session() {
        let store = SessionStore::new(time::Duration::from_secs(60));

        let handle = store.get_or_create(None).await;

        assert!(handle.created);
        assert_eq!(store.len().await, 1);
        let session = handle.session.lock().await;
        assert_eq!(session.language, Language::English);
        assert_eq!(session.feeding.conversation.len(), 1);
        assert_eq!(
            session.feeding.conversation.messages()[0].role,
            Role::Assistant
        );
    }

    #[tokio::test]
    async fn test_known_id_returns_same_session() {
        let store = SessionStore::new(time::Duration::from_secs(60));
        let first = store.get_or_create(None).await;
        first.session.lock().await.language = Language::Hindi;

        let second = store.get_or_create(Some(&first.id)).await;

        assert!(!second.created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.session.lock().await.language, Language::Hindi);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_id_gets_fresh_session() {
        let store = SessionStore::new(time::Duration::from_secs(60));

        let handle = store.get_or_create(Some("forged")).await;

        assert!(handle.created);
        assert_ne!(handle.id, "forged");
    }

    #[tokio::test]
    async fn test_garbage_collect() {
        let store = SessionStore::new(time::Duration::from_millis(10));
        let stale = store.get_or_create(None).await;

        tokio::time::sleep(time::Duration::from_millis(30)).await;
        assert!(store.get(&stale.id).await.is_none());

        let removed = store.garbage_collect().await;
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 0);

        let revived = store.get_or_create(Some(&stale.id)).await;
        assert!(revived.created);
    }

    #[tokio::test]
    async fn test_lookup_extends_lifetime() {
        let store = SessionStore::new(time::Duration::from_millis(200));
        let handle = store.get_or_create(None).await;

        tokio::time::sleep(time::Duration::from_millis(120)).await;
        assert!(store.get(&handle.id).await.is_some());
        tokio::time::sleep(time::Duration::from_millis(120)).await;

        let again = store.get_or_create(Some(&handle.id)).await;
        assert!(!again.created);
        assert_eq!(again.id, handle.id);
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_on_shutdown() {
        let store = Arc::new(SessionStore::new(time::Duration::from_secs(60)));
        let token = CancellationToken::new();
        let task = tokio::spawn(collect_expired_sessions(
            store,
            time::Duration::from_secs(3600),
            token.clone(),
        ));

        token.cancel();

        tokio::time::timeout(time::Duration::from_secs(1), task)
            .await
            .expect("cleanup task did not stop")
            .unwrap();
    }

    #[test]
    fn notices_are_taken_once() {
        let mut session = Session::default();
        session.error("boom");
        session.warning("careful");
        let notices = session.take_notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].kind, NoticeKind::Error);
        assert_eq!(notices[1].message, "careful");
        assert!(session.take_notices().is_empty());
    }

    #[test]
    fn session_ids_are_unique_and_url_safe() {
        let a = new_session_id();
        let b = new_session_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
