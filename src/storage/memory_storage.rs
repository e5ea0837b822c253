use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::error_handling::types::StorageError;
use crate::session_management::session::Session;
use crate::storage::storage_trait::Storage;
use crate::storage::subscription::{SessionWatch, SubscriptionHub};
use crate::storage::types::{apply_patch, PatchOp, SessionFilter};

/// Process-local backend. Documents vanish with the process.
#[derive(Default)]
pub struct MemoryStorage {
    sessions: Mutex<HashMap<String, Session>>,
    hub: SubscriptionHub,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> Result<MutexGuard<'_, HashMap<String, Session>>, StorageError> {
        self.sessions.lock().map_err(|_| StorageError::ConnectionFailed)
    }
}

impl Storage for MemoryStorage {
    fn create_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut sessions = self.sessions()?;
        if sessions.contains_key(&session.id) {
            return Err(StorageError::AlreadyExists(session.id.clone()));
        }
        sessions.insert(session.id.clone(), session.clone());
        self.hub.publish(&session.id, Some(session.clone()));
        info!("Created session {} in memory", session.id);
        Ok(())
    }

    fn get_session(&self, code: &str) -> Result<Option<Session>, StorageError> {
        Ok(self.sessions()?.get(code).cloned())
    }

    fn get_sessions(&self, filter: Option<SessionFilter>) -> Result<Vec<Session>, StorageError> {
        let sessions = self.sessions()?;
        let mut out: Vec<Session> = sessions
            .values()
            .filter(|s| filter.as_ref().map_or(true, |f| f.matches(s)))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!("Listed {} of {} session(s)", out.len(), sessions.len());
        Ok(out)
    }

    fn patch_session(&self, code: &str, ops: &[PatchOp]) -> Result<Session, StorageError> {
        let mut sessions = self.sessions()?;
        let session = sessions
            .get_mut(code)
            .ok_or_else(|| StorageError::NotFound(code.to_string()))?;
        apply_patch(session, ops);
        let updated = session.clone();
        self.hub.publish(code, Some(updated.clone()));
        debug!("Patched session {} with {} op(s)", code, ops.len());
        Ok(updated)
    }

    fn delete_session(&self, code: &str) -> Result<bool, StorageError> {
        let existed = self.sessions()?.remove(code).is_some();
        if existed {
            self.hub.publish(code, None);
            info!("Deleted session {} from memory", code);
        }
        Ok(existed)
    }

    fn subscribe(&self, code: &str) -> Result<SessionWatch, StorageError> {
        let sessions = self.sessions()?;
        Ok(self.hub.subscribe(code, sessions.get(code).cloned()))
    }

    fn cleanup_old_sessions(&self, older_than: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut sessions = self.sessions()?;
        let stale: Vec<String> = sessions
            .values()
            .filter(|s| s.created_at < older_than)
            .map(|s| s.id.clone())
            .collect();
        for code in &stale {
            sessions.remove(code);
            self.hub.publish(code, None);
        }
        info!("Removed {} old session(s) (cutoff: {})", stale.len(), older_than.to_rfc3339());
        Ok(stale.len())
    }
}
