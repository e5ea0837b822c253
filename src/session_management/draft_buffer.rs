//! Debounced text drafts.
//!
//! Typing into a memo, note or chat box edits a local buffer. Each edit
//! cancels the pending flush and schedules a new one `delay` later, so a burst
//! of keystrokes becomes one store write. A failed write keeps the draft dirty
//! so nothing typed is lost; the next edit or a forced flush retries it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::error_handling::types::{SessionError, StorageError};
use crate::session_management::session::Session;
use crate::session_management::session_manager::SessionManager;

/// Where a draft is written when it is flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftTarget {
    TeamMemo { team_number: u32 },
    PersonalNote { participant_id: String },
    LiveChat { participant_id: String },
}

#[derive(Default)]
struct DraftState {
    text: String,
    revision: u64,
    saved_revision: u64,
    pending: Option<CancellationToken>,
}

struct Inner {
    manager: Arc<SessionManager>,
    code: String,
    target: DraftTarget,
    delay: Duration,
    state: Mutex<DraftState>,
}

pub struct DraftBuffer {
    inner: Arc<Inner>,
}

impl DraftBuffer {
    pub fn new(
        manager: Arc<SessionManager>,
        code: impl Into<String>,
        target: DraftTarget,
        delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                manager,
                code: code.into(),
                target,
                delay,
                state: Mutex::new(DraftState::default()),
            }),
        }
    }

    /// Replaces the draft and (re)starts the flush countdown.
    ///
    /// Must be called from within a tokio runtime.
    pub fn edit(&self, text: impl Into<String>) {
        let token = CancellationToken::new();
        {
            let mut state = self.inner.lock();
            state.text = text.into();
            state.revision += 1;
            if let Some(previous) = state.pending.replace(token.clone()) {
                previous.cancel();
            }
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    debug!("Draft flush for {:?} rescheduled", inner.target);
                }
                () = tokio::time::sleep(inner.delay) => {
                    // failures are already logged and leave the draft dirty
                    let _ = inner.flush().await;
                }
            }
        });
    }

    /// Writes the draft now, cancelling any scheduled flush.
    pub async fn flush(&self) -> Result<(), SessionError> {
        if let Some(token) = self.inner.lock().pending.take() {
            token.cancel();
        }
        self.inner.flush().await
    }

    pub fn draft(&self) -> String {
        self.inner.lock().text.clone()
    }

    /// True while the latest edit has not reached the store.
    pub fn is_dirty(&self) -> bool {
        let state = self.inner.lock();
        state.revision != state.saved_revision
    }
}

impl SessionManager {
    /// Draft buffer for one memo, note or chat box, flushed after the configured quiet period.
    pub fn draft_buffer(
        self: &Arc<Self>,
        code: impl Into<String>,
        target: DraftTarget,
    ) -> DraftBuffer {
        DraftBuffer::new(Arc::clone(self), code, target, self.draft_delay())
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, DraftState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn flush(self: &Arc<Self>) -> Result<(), SessionError> {
        let (text, revision) = {
            let state = self.lock();
            if state.revision == state.saved_revision {
                return Ok(());
            }
            (state.text.clone(), state.revision)
        };

        let inner = Arc::clone(self);
        let result = tokio::task::spawn_blocking(move || inner.persist(&text))
            .await
            .map_err(|e| {
                warn!("Draft flush task failed: {}", e);
                SessionError::StorageError(StorageError::WriteFailed)
            })?;

        match result {
            Ok(_) => {
                let mut state = self.lock();
                if revision > state.saved_revision {
                    state.saved_revision = revision;
                }
                debug!("Flushed draft revision {} to {:?} in {}", revision, self.target, self.code);
                Ok(())
            }
            Err(e) => {
                warn!("Draft for {:?} in session {} not saved: {}", self.target, self.code, e);
                Err(e)
            }
        }
    }

    fn persist(&self, text: &str) -> Result<Session, SessionError> {
        match &self.target {
            DraftTarget::TeamMemo { team_number } => {
                self.manager.post_team_memo(&self.code, *team_number, text)
            }
            DraftTarget::PersonalNote { participant_id } => {
                self.manager.post_personal_note(&self.code, participant_id, text)
            }
            DraftTarget::LiveChat { participant_id } => {
                self.manager.post_chat(&self.code, participant_id, text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_management::clock::ManualClock;
    use crate::session_management::session::MissionConfig;
    use crate::storage::memory_storage::MemoryStorage;
    use crate::storage::storage_trait::Storage;
    use chrono::Utc;
    use tokio::time::Instant;

    const DELAY: Duration = Duration::from_millis(300);

    fn setup() -> (Arc<SessionManager>, String) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut session = Session::new(
            "DRAFT1".into(),
            "Team A".into(),
            2,
            MissionConfig::default(),
            Utc::now(),
        );
        session.is_open = true;
        storage.create_session(&session).unwrap();
        let manager = SessionManager::with_clock(storage, Arc::new(ManualClock::new(Utc::now())));
        (Arc::new(manager), session.id)
    }

    fn memo(manager: &SessionManager, code: &str) -> Option<String> {
        manager.get_session(code).unwrap().memos.get(&1).cloned()
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_are_coalesced_into_one_write() {
        let (manager, code) = setup();
        let mut rx = manager.subscribe(&code).unwrap();
        let buffer = DraftBuffer::new(
            manager.clone(),
            code.clone(),
            DraftTarget::TeamMemo { team_number: 1 },
            DELAY,
        );

        let start = Instant::now();
        buffer.edit("m");
        tokio::time::sleep(Duration::from_millis(100)).await;
        buffer.edit("me");
        tokio::time::sleep(Duration::from_millis(100)).await;
        buffer.edit("meet");
        assert!(buffer.is_dirty());
        assert_eq!(memo(&manager, &code), None);

        rx.changed().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
        let written = rx.borrow().as_ref().and_then(|s| s.memos.get(&1).cloned());
        assert_eq!(written.as_deref(), Some("meet"));
    }

    #[tokio::test(start_paused = true)]
    async fn forced_flush_writes_immediately() {
        let (manager, code) = setup();
        let buffer = DraftBuffer::new(
            manager.clone(),
            code.clone(),
            DraftTarget::TeamMemo { team_number: 1 },
            DELAY,
        );
        buffer.edit("north gate");
        buffer.flush().await.unwrap();
        assert!(!buffer.is_dirty());
        assert_eq!(memo(&manager, &code).as_deref(), Some("north gate"));

        // a cancelled timer must not write again later
        manager.post_team_memo(&code, 1, "edited elsewhere").unwrap();
        tokio::time::sleep(DELAY * 3).await;
        assert_eq!(memo(&manager, &code).as_deref(), Some("edited elsewhere"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_flush_keeps_the_draft() {
        let (manager, code) = setup();
        let buffer = DraftBuffer::new(
            manager.clone(),
            code.clone(),
            DraftTarget::TeamMemo { team_number: 1 },
            DELAY,
        );
        manager.storage().delete_session(&code).unwrap();
        buffer.edit("keep me");
        assert_eq!(
            buffer.flush().await,
            Err(SessionError::NotFound(code.clone()))
        );
        assert!(buffer.is_dirty());
        assert_eq!(buffer.draft(), "keep me");
    }

    #[tokio::test(start_paused = true)]
    async fn manager_buffers_use_the_configured_delay() {
        let (manager, code) = setup();
        let manager = Arc::new(
            SessionManager::new(manager.storage().clone())
                .draft_flush_delay(Duration::from_secs(2)),
        );
        let mut rx = manager.subscribe(&code).unwrap();
        let buffer = manager.draft_buffer(code.clone(), DraftTarget::TeamMemo { team_number: 1 });

        let start = Instant::now();
        buffer.edit("under the bridge");
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(memo(&manager, &code), None);

        rx.changed().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(memo(&manager, &code).as_deref(), Some("under the bridge"));
    }

    #[tokio::test(start_paused = true)]
    async fn personal_note_target_writes_under_participant() {
        let (manager, code) = setup();
        let id = manager.register_participant(&code, "Alice", 2).unwrap();
        let buffer = DraftBuffer::new(
            manager.clone(),
            code.clone(),
            DraftTarget::PersonalNote {
                participant_id: id.clone(),
            },
            DELAY,
        );
        buffer.edit("the clock tower");
        buffer.flush().await.unwrap();
        let session = manager.get_session(&code).unwrap();
        assert_eq!(session.personal_notes[&id].text, "the clock tower");
        assert_eq!(session.personal_notes[&id].team_number, 2);
    }
}
