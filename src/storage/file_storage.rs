use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use crate::error_handling::types::StorageError;
use crate::session_management::session::Session;
use crate::storage::storage_trait::Storage;
use crate::storage::subscription::{SessionWatch, SubscriptionHub};
use crate::storage::types::{apply_patch, PatchOp, SessionFilter};

/// Filesystem backend: one pretty-printed JSON document per session under
/// `<base>/sessions/<CODE>.json`.
pub struct FileStorage {
    base_path: PathBuf,
    // serialises read-modify-write cycles
    write_lock: Mutex<()>,
    hub: SubscriptionHub,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        let sessions_dir = base_path.join("sessions");
        fs::create_dir_all(&sessions_dir).map_err(|e| {
            error!("Failed to create sessions dir {}: {}", sessions_dir.display(), e);
            StorageError::WriteFailed
        })?;
        info!("FileStorage initialized at {}", base_path.display());

        Ok(Self {
            base_path,
            write_lock: Mutex::new(()),
            hub: SubscriptionHub::new(),
        })
    }

    /// Construct FileStorage using env var CLUEHUNT_FILE_STORAGE_DIR if set,
    /// otherwise the current directory.
    pub fn new_default() -> Result<Self, StorageError> {
        if let Ok(dir) = std::env::var("CLUEHUNT_FILE_STORAGE_DIR") {
            info!("Using FileStorage from CLUEHUNT_FILE_STORAGE_DIR: {}", dir);
            return Self::new(PathBuf::from(dir));
        }
        let cwd = std::env::current_dir().map_err(|e| {
            error!("Failed to get current dir: {}", e);
            StorageError::ReadFailed
        })?;
        info!("Using FileStorage at current directory: {}", cwd.display());
        Self::new(cwd)
    }

    fn sessions_dir(&self) -> PathBuf {
        self.base_path.join("sessions")
    }

    fn session_file_path(&self, code: &str) -> PathBuf {
        self.sessions_dir().join(format!("{}.json", code))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        self.write_lock.lock().map_err(|_| {
            error!("FileStorage write lock poisoned");
            StorageError::ConnectionFailed
        })
    }

    fn write_session_file(&self, session: &Session) -> Result<(), StorageError> {
        let path = self.session_file_path(&session.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(session).map_err(|e| {
            error!("Failed to serialize session {}: {}", session.id, e);
            StorageError::WriteFailed
        })?;
        let mut f = File::create(&tmp).map_err(|e| {
            error!("Failed to create session file {}: {}", tmp.display(), e);
            StorageError::WriteFailed
        })?;
        f.write_all(&json).map_err(|e| {
            error!("Failed to write session file {}: {}", tmp.display(), e);
            StorageError::WriteFailed
        })?;
        fs::rename(&tmp, &path).map_err(|e| {
            error!("Failed to move {} into place: {}", tmp.display(), e);
            StorageError::WriteFailed
        })?;
        debug!("Saved session {} to {}", session.id, path.display());
        Ok(())
    }

    fn read_session_file(&self, path: &Path) -> Result<Session, StorageError> {
        let mut content = String::new();
        File::open(path)
            .and_then(|mut f| f.read_to_string(&mut content))
            .map_err(|e| {
                error!("Failed to read session file {}: {}", path.display(), e);
                StorageError::ReadFailed
            })?;
        let session: Session = serde_json::from_str(&content).map_err(|e| {
            error!("Invalid session document {}: {}", path.display(), e);
            StorageError::ReadFailed
        })?;
        if let Err(violation) = session.check_invariants() {
            warn!("Session {} loaded with invariant violation: {}", session.id, violation);
        }
        Ok(session)
    }

    /// Deletes each session file. A session whose file stays on disk is
    /// neither counted nor announced as deleted.
    fn remove_stale(&self, stale: &[Session]) -> usize {
        let mut removed = 0usize;
        for sess in stale {
            let path = self.session_file_path(&sess.id);
            if let Err(e) = fs::remove_file(&path) {
                error!("Failed to remove old session file {}: {}", path.display(), e);
                continue;
            }
            self.hub.publish(&sess.id, None);
            removed += 1;
        }
        removed
    }

    fn load(&self, code: &str) -> Result<Option<Session>, StorageError> {
        let path = self.session_file_path(code);
        if !path.exists() {
            return Ok(None);
        }
        self.read_session_file(&path).map(Some)
    }

    fn load_all(&self) -> Result<Vec<Session>, StorageError> {
        let dir = self.sessions_dir();
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| {
            error!("Failed to read sessions dir {}: {}", dir.display(), e);
            StorageError::ReadFailed
        })? {
            let entry = entry.map_err(|e| {
                error!("Dir entry error: {}", e);
                StorageError::ReadFailed
            })?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Ok(sess) = self.read_session_file(&path) {
                    sessions.push(sess);
                }
            }
        }
        Ok(sessions)
    }
}

impl Storage for FileStorage {
    fn create_session(&self, session: &Session) -> Result<(), StorageError> {
        let _guard = self.lock()?;
        if self.session_file_path(&session.id).exists() {
            return Err(StorageError::AlreadyExists(session.id.clone()));
        }
        self.write_session_file(session)?;
        self.hub.publish(&session.id, Some(session.clone()));
        info!("Created session {} on disk", session.id);
        Ok(())
    }

    fn get_session(&self, code: &str) -> Result<Option<Session>, StorageError> {
        self.load(code)
    }

    fn get_sessions(&self, filter: Option<SessionFilter>) -> Result<Vec<Session>, StorageError> {
        let mut sessions = self.load_all()?;
        let original_len = sessions.len();
        if let Some(f) = filter {
            sessions.retain(|s| f.matches(s));
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!("Loaded {} session(s), {} after filter", original_len, sessions.len());
        Ok(sessions)
    }

    fn patch_session(&self, code: &str, ops: &[PatchOp]) -> Result<Session, StorageError> {
        let _guard = self.lock()?;
        let mut session = self
            .load(code)?
            .ok_or_else(|| StorageError::NotFound(code.to_string()))?;
        apply_patch(&mut session, ops);
        self.write_session_file(&session)?;
        self.hub.publish(code, Some(session.clone()));
        Ok(session)
    }

    fn delete_session(&self, code: &str) -> Result<bool, StorageError> {
        let _guard = self.lock()?;
        let path = self.session_file_path(code);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| {
            error!("Failed to remove session file {}: {}", path.display(), e);
            StorageError::WriteFailed
        })?;
        self.hub.publish(code, None);
        info!("Deleted session {} from {}", code, path.display());
        Ok(true)
    }

    fn subscribe(&self, code: &str) -> Result<SessionWatch, StorageError> {
        let _guard = self.lock()?;
        let current = self.load(code)?;
        Ok(self.hub.subscribe(code, current))
    }

    fn cleanup_old_sessions(&self, older_than: DateTime<Utc>) -> Result<usize, StorageError> {
        let _guard = self.lock()?;
        let stale: Vec<Session> = self
            .load_all()?
            .into_iter()
            .filter(|sess| sess.created_at < older_than)
            .collect();
        let removed = self.remove_stale(&stale);
        info!("Removed {} old session(s) (cutoff: {})", removed, older_than.to_rfc3339());
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_management::session::MissionConfig;
    use crate::storage::session_filter::by_group_name;
    use serial_test::serial;
    use tempfile::TempDir;

    fn session(code: &str, group: &str) -> Session {
        Session::new(code.into(), group.into(), 4, MissionConfig::default(), Utc::now())
    }

    #[test]
    fn test_save_and_get_session() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        let s = session("ABC123", "Team A");
        storage.create_session(&s).unwrap();
        assert_eq!(storage.get_session("ABC123").unwrap(), Some(s.clone()));

        let filtered = storage.get_sessions(Some(by_group_name("Team A"))).unwrap();
        assert!(filtered.iter().any(|x| x.id == s.id));

        let none = storage.get_sessions(Some(by_group_name("Team B"))).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_patch_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        {
            let storage = FileStorage::new(dir.path()).unwrap();
            storage.create_session(&session("ABC123", "Team A")).unwrap();
            let ops = [
                PatchOp::SetOpen(true),
                PatchOp::PutMemo {
                    team_number: 2,
                    text: "north gate".into(),
                },
            ];
            storage.patch_session("ABC123", &ops).unwrap();
        }
        let reopened = FileStorage::new(dir.path()).unwrap();
        let s = reopened.get_session("ABC123").unwrap().unwrap();
        assert!(s.is_open);
        assert_eq!(s.memos.get(&2).map(String::as_str), Some("north gate"));
    }

    #[test]
    fn test_delete_removes_document() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        storage.create_session(&session("ABC123", "Team A")).unwrap();
        assert!(storage.delete_session("ABC123").unwrap());
        assert!(storage.get_session("ABC123").unwrap().is_none());
        assert_eq!(
            storage.patch_session("ABC123", &[PatchOp::SetOpen(true)]),
            Err(StorageError::NotFound("ABC123".into()))
        );
    }

    #[test]
    fn test_cleanup_removes_only_old_sessions() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        let mut old = session("OLD001", "Team A");
        old.created_at = Utc::now() - chrono::Duration::days(3);
        storage.create_session(&old).unwrap();
        storage.create_session(&session("NEW001", "Team A")).unwrap();

        let rx = storage.subscribe("OLD001").unwrap();
        let removed = storage
            .cleanup_old_sessions(Utc::now() - chrono::Duration::days(1))
            .unwrap();
        assert_eq!(removed, 1);
        assert!(rx.borrow().is_none());
        assert!(storage.get_session("OLD001").unwrap().is_none());
        assert!(storage.get_session("NEW001").unwrap().is_some());
    }

    #[test]
    fn test_undeletable_file_is_not_reported_removed() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        let s = session("ABC123", "Team A");
        // a directory in place of the document makes remove_file fail
        let blocked = storage.session_file_path("ABC123");
        fs::create_dir_all(&blocked).unwrap();
        fs::write(blocked.join("keep"), b"x").unwrap();
        let rx = storage.hub.subscribe("ABC123", Some(s.clone()));

        assert_eq!(storage.remove_stale(&[s.clone()]), 0);
        assert_eq!(rx.borrow().as_ref(), Some(&s));
        assert!(blocked.exists());
    }

    #[test]
    #[serial]
    fn test_new_default_honours_env_dir() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("CLUEHUNT_FILE_STORAGE_DIR", dir.path());
        let storage = FileStorage::new_default().unwrap();
        std::env::remove_var("CLUEHUNT_FILE_STORAGE_DIR");
        storage.create_session(&session("ENV001", "Team A")).unwrap();
        assert!(dir.path().join("sessions").join("ENV001.json").exists());
    }
}
