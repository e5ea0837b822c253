use crate::clues::ClueCatalog;
use crate::error_handling::types::SessionError;
use crate::session_management::clock::{Clock, SystemClock};
use crate::session_management::session::{validate_session_code, MissionConfig, Session};
use crate::storage::session_filter::created_before;
use crate::storage::storage_trait::Storage;
use crate::storage::types::PatchOp;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// Which ordering rules are checked before a write.
///
/// With `enforce` off, a failed check is only logged and the write goes
/// through; the client is then trusted to sequence operations itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePolicy {
    pub enforce: bool,
    /// Reaching the SUBMIT phase unlocks submission without the facilitator toggle.
    pub submit_opens_with_phase: bool,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            enforce: true,
            submit_opens_with_phase: true,
        }
    }
}

/// Hosts the facilitator and participant control surfaces.
///
/// # Fields Overview
///
/// - `storage`: document store every transition reads and patches
/// - `clock`: source of every timestamp written
/// - `policy`: server-side gate enforcement
/// - `max_team_count`: upper bound for `teamCount` at creation
/// - `mission_defaults`: round counts and durations stamped on new sessions
/// - `catalog`: clue list handed out to teams
/// - `draft_delay`: quiet period before a draft buffer writes
pub struct SessionManager {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    policy: GatePolicy,
    max_team_count: u32,
    mission_defaults: MissionConfig,
    catalog: ClueCatalog,
    draft_delay: StdDuration,
}

impl SessionManager {
    pub const DEFAULT_MAX_TEAM_COUNT: u32 = 12;
    pub const DEFAULT_DRAFT_FLUSH: StdDuration = StdDuration::from_millis(300);

    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_clock(storage, Arc::new(SystemClock))
    }

    pub fn with_clock(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            policy: GatePolicy::default(),
            max_team_count: Self::DEFAULT_MAX_TEAM_COUNT,
            mission_defaults: MissionConfig::default(),
            catalog: ClueCatalog::default(),
            draft_delay: Self::DEFAULT_DRAFT_FLUSH,
        }
    }

    pub fn policy(mut self, policy: GatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_team_count(mut self, max: u32) -> Self {
        self.max_team_count = max;
        self
    }

    pub fn mission_defaults(mut self, defaults: MissionConfig) -> Self {
        self.mission_defaults = defaults;
        self
    }

    pub fn catalog(mut self, catalog: ClueCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn draft_flush_delay(mut self, delay: StdDuration) -> Self {
        self.draft_delay = delay;
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn clues(&self) -> &ClueCatalog {
        &self.catalog
    }

    pub fn draft_delay(&self) -> StdDuration {
        self.draft_delay
    }

    pub(crate) fn team_limit(&self) -> u32 {
        self.max_team_count
    }

    pub(crate) fn defaults(&self) -> MissionConfig {
        self.mission_defaults
    }

    pub(crate) fn gates(&self) -> GatePolicy {
        self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Reads a session, mapping absence to `NotFound`.
    pub(crate) fn load(&self, code: &str) -> Result<Session, SessionError> {
        validate_session_code(code)?;
        match self.storage.get_session(code)? {
            Some(session) => {
                debug!("Loaded session {}", code);
                Ok(session)
            }
            None => Err(SessionError::NotFound(code.to_string())),
        }
    }

    pub(crate) fn write(&self, code: &str, ops: &[PatchOp]) -> Result<Session, SessionError> {
        Ok(self.storage.patch_session(code, ops)?)
    }

    /// Checks an ordering rule. Refusals are logged either way; they only fail when enforced.
    pub(crate) fn gate(&self, ok: bool, code: &str, rule: &str) -> Result<(), SessionError> {
        if ok {
            return Ok(());
        }
        if self.policy.enforce {
            warn!("Refused on session {}: {}", code, rule);
            Err(SessionError::InvalidTransition(rule.to_string()))
        } else {
            warn!("Gate not enforced on session {}: {}", code, rule);
            Ok(())
        }
    }

    /// Purges sessions created more than `retention` ago.
    pub fn cleanup_old_sessions(&self, retention: Duration) -> Result<usize, SessionError> {
        let cutoff = self.now() - retention;
        let stale = self.storage.get_sessions(Some(created_before(cutoff)))?;
        if stale.is_empty() {
            debug!("No sessions older than {}", cutoff.to_rfc3339());
            return Ok(0);
        }
        let removed = self.storage.cleanup_old_sessions(cutoff)?;
        info!("Retention sweep removed {} session(s)", removed);
        Ok(removed)
    }
}
