//! Storage Trait
//!
//! This module defines the `Storage` trait, the document store the control
//! surfaces read and write sessions through.
//!
//! Implementors of this trait are responsible for:
//! - Write-if-absent creation of session documents
//! - Merge-patching documents one field (or keyed entry) at a time
//! - Pushing the full document to subscribers after every change
//! - Removing a session together with all of its nested data
//!
//! All methods return a `Result` to handle potential storage errors.

use crate::error_handling::types::StorageError;
use crate::session_management::session::Session;
use crate::storage::subscription::SessionWatch;
use crate::storage::types::{PatchOp, SessionFilter};
use chrono::{DateTime, Utc};

/// The `Storage` trait defines the interface for session document backends.
///
/// Writes to one session are totally ordered; no ordering is promised across
/// sessions. A failed write leaves the stored document unchanged.
pub trait Storage: Send + Sync {
    /// Persists a new session. Fails with `AlreadyExists` if the code is taken.
    fn create_session(&self, session: &Session) -> Result<(), StorageError>;

    /// Reads one session, `None` if it does not exist.
    fn get_session(&self, code: &str) -> Result<Option<Session>, StorageError>;

    /// Retrieves sessions, optionally filtered.
    fn get_sessions(&self, filter: Option<SessionFilter>) -> Result<Vec<Session>, StorageError>;

    /// Applies `ops` as one merge and returns the resulting document.
    ///
    /// Fails with `NotFound` if the session no longer exists.
    fn patch_session(&self, code: &str, ops: &[PatchOp]) -> Result<Session, StorageError>;

    /// Removes a session and everything nested under it. Returns whether it existed.
    fn delete_session(&self, code: &str) -> Result<bool, StorageError>;

    /// Watches one session; the receiver holds the current document right away.
    fn subscribe(&self, code: &str) -> Result<SessionWatch, StorageError>;

    /// Deletes sessions created before the given date and time.
    fn cleanup_old_sessions(&self, older_than: DateTime<Utc>) -> Result<usize, StorageError>;
}
