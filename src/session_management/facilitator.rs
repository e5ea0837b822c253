//! Facilitator control surface.
//!
//! Every operation takes a [`Facilitator`] proof, which only
//! [`Authenticator::verify`] hands out. Transitions are single patches against
//! the stored document; ordering rules go through the manager's gate policy.

use chrono::Duration;
use log::{debug, info, warn};

use crate::error_handling::types::{SessionError, StorageError, ValidationError};
use crate::evaluation::{rank_successful_teams, team_statuses, LeaderboardEntry, TeamStatus};
use crate::session_management::phase_clock::{
    mission_elapsed_seconds, phase_at, phase_elapsed_seconds,
};
use crate::session_management::session::{
    generate_session_code, validate_session_code, MissionConfig, Session, SessionSummary,
};
use crate::session_management::session_manager::SessionManager;
use crate::storage::types::{PatchOp, SessionFilter};

/// Attempts at finding an unused join code before giving up.
const MAX_CODE_ATTEMPTS: usize = 8;

/// Proof that the caller presented the facilitator credential.
#[derive(Debug)]
pub struct Facilitator {
    _private: (),
}

/// Checks presented credentials against the configured facilitator token.
///
/// Without a configured token every request is refused.
pub struct Authenticator {
    token: Option<String>,
}

impl Authenticator {
    pub fn new(token: Option<String>) -> Self {
        let token = token.filter(|t| !t.is_empty());
        if token.is_none() {
            warn!("No facilitator token configured; facilitator operations are disabled");
        }
        Self { token }
    }

    pub fn verify(&self, presented: Option<&str>) -> Result<Facilitator, SessionError> {
        match (&self.token, presented) {
            (Some(expected), Some(given))
                if constant_time_eq(expected.as_bytes(), given.as_bytes()) =>
            {
                Ok(Facilitator { _private: () })
            }
            _ => {
                warn!("Rejected facilitator credential");
                Err(SessionError::Unauthorized)
            }
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl SessionManager {
    /// Allocates a session under a fresh join code.
    pub fn create_session(
        &self,
        _auth: &Facilitator,
        group_name: &str,
        team_count: u32,
    ) -> Result<Session, SessionError> {
        let group_name = group_name.trim();
        if group_name.is_empty() {
            return Err(ValidationError::EmptyGroupName.into());
        }
        let max = self.team_limit();
        if team_count == 0 || team_count > max {
            return Err(ValidationError::TeamCountOutOfRange { team_count, max }.into());
        }

        for _ in 0..MAX_CODE_ATTEMPTS {
            let session = Session::new(
                generate_session_code(),
                group_name.to_string(),
                team_count,
                self.defaults(),
                self.now(),
            );
            match self.storage().create_session(&session) {
                Ok(()) => {
                    info!(
                        "Created session {} ({}, {} teams)",
                        session.id, session.group_name, team_count
                    );
                    return Ok(session);
                }
                Err(StorageError::AlreadyExists(code)) => {
                    debug!("Join code {} already taken, retrying", code);
                }
                Err(e) => return Err(e.into()),
            }
        }
        warn!("Gave up allocating a join code after {} attempts", MAX_CODE_ATTEMPTS);
        Err(SessionError::CreationFailed)
    }

    /// Facilitator dashboard listing, newest first.
    pub fn list_sessions(
        &self,
        _auth: &Facilitator,
        filter: Option<SessionFilter>,
    ) -> Result<Vec<SessionSummary>, SessionError> {
        let sessions = self.storage().get_sessions(filter)?;
        Ok(sessions.iter().map(Session::summary).collect())
    }

    pub fn toggle_open(&self, _auth: &Facilitator, code: &str) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        let updated = self.write(code, &[PatchOp::SetOpen(!session.is_open)])?;
        info!("Session {} is now {}", code, if updated.is_open { "open" } else { "closed" });
        Ok(updated)
    }

    /// Starts the mission clock. `config` of `None` keeps the session's current settings.
    pub fn start_mission(
        &self,
        _auth: &Facilitator,
        code: &str,
        config: Option<MissionConfig>,
    ) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        let config = config.unwrap_or_else(|| session.mission_config());
        config.validate()?;
        self.gate(!session.is_mission_started, code, "mission already started")?;
        let updated = self.write(
            code,
            &[PatchOp::StartMission {
                config,
                started_at: self.now(),
            }],
        )?;
        info!(
            "Mission started on session {} ({} internal / {} cross rounds, {}m rounds, {}m submit)",
            code,
            config.internal_rounds,
            config.cross_rounds,
            config.round_duration,
            config.submit_duration
        );
        Ok(updated)
    }

    pub fn start_phase(
        &self,
        _auth: &Facilitator,
        code: &str,
        index: i32,
    ) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        self.move_phase_cursor(&session, index)
    }

    /// Starts the phase after the current one.
    pub fn advance_phase(&self, _auth: &Facilitator, code: &str) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        self.move_phase_cursor(&session, session.current_phase_index + 1)
    }

    fn move_phase_cursor(&self, session: &Session, index: i32) -> Result<Session, SessionError> {
        let total_phases = session.total_phases();
        if index < 0 || index >= total_phases as i32 {
            return Err(ValidationError::PhaseIndexOutOfRange { index, total_phases }.into());
        }
        self.gate(session.is_mission_started, &session.id, "mission not started")?;
        self.gate(
            index == session.current_phase_index + 1,
            &session.id,
            "phases advance one step at a time",
        )?;
        let updated = self.write(
            &session.id,
            &[PatchOp::SetPhaseCursor {
                index,
                started_at: self.now(),
            }],
        )?;
        let (kind, round) = phase_at(index as u32, session.total_comm_phases());
        info!(
            "Session {} entered phase {}/{} ({:?} round {})",
            session.id,
            index + 1,
            total_phases,
            kind,
            round
        );
        Ok(updated)
    }

    /// Freezes the active phase, banking its elapsed seconds.
    pub fn pause_phase(&self, _auth: &Facilitator, code: &str) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        if session.current_phase_index < 0 || session.is_phase_paused {
            warn!(
                "Pause ignored on session {}: phase {} paused={}",
                code, session.current_phase_index, session.is_phase_paused
            );
            return Ok(session);
        }
        let elapsed = phase_elapsed_seconds(&session, self.now());
        let updated = self.write(code, &[PatchOp::PausePhase { elapsed }])?;
        info!("Paused phase {} of session {} at {}s", session.current_phase_index, code, elapsed);
        Ok(updated)
    }

    /// Continues a paused phase from its banked elapsed time.
    pub fn resume_phase(&self, _auth: &Facilitator, code: &str) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        if !session.is_phase_paused {
            warn!("Resume ignored on session {}: phase is not paused", code);
            return Ok(session);
        }
        let banked = session.phase_paused_elapsed;
        let started_at = self.now() - Duration::seconds(banked as i64);
        let updated = self.write(code, &[PatchOp::ResumePhase { started_at }])?;
        info!("Resumed phase {} of session {} at {}s", session.current_phase_index, code, banked);
        Ok(updated)
    }

    /// Pauses the whole-mission timer shown on the overall progress bar.
    pub fn pause_mission(&self, _auth: &Facilitator, code: &str) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        if !session.is_mission_started || session.is_paused {
            warn!("Mission pause ignored on session {}", code);
            return Ok(session);
        }
        let now = self.now();
        let elapsed = mission_elapsed_seconds(&session, now);
        let updated = self.write(code, &[PatchOp::PauseMission { at: now, elapsed }])?;
        info!("Paused mission timer of session {} at {}s", code, elapsed);
        Ok(updated)
    }

    pub fn resume_mission(&self, _auth: &Facilitator, code: &str) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        if !session.is_paused {
            warn!("Mission resume ignored on session {}: timer is not paused", code);
            return Ok(session);
        }
        let started_at = self.now() - Duration::seconds(session.paused_elapsed as i64);
        let updated = self.write(code, &[PatchOp::ResumeMission { started_at }])?;
        info!("Resumed mission timer of session {}", code);
        Ok(updated)
    }

    pub fn toggle_submit_enabled(
        &self,
        _auth: &Facilitator,
        code: &str,
    ) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        let updated = self.write(code, &[PatchOp::SetSubmitEnabled(!session.is_submit_enabled)])?;
        let state = if updated.is_submit_enabled { "enabled" } else { "disabled" };
        info!("Submission on session {} is now {}", code, state);
        Ok(updated)
    }

    pub fn reveal_answers(&self, _auth: &Facilitator, code: &str) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        self.gate(!session.submissions.is_empty(), code, "no submissions to reveal")?;
        let updated = self.write(code, &[PatchOp::SetAnswerRevealed(true)])?;
        info!("Answers revealed on session {}", code);
        Ok(updated)
    }

    /// Reveals which teams succeeded. Answers are revealed along with it if they were not yet.
    pub fn reveal_success(&self, _auth: &Facilitator, code: &str) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        self.gate(session.is_answer_revealed, code, "answers not revealed yet")?;
        let updated = self.write(
            code,
            &[PatchOp::SetAnswerRevealed(true), PatchOp::SetSuccessRevealed(true)],
        )?;
        info!("Success revealed on session {}", code);
        Ok(updated)
    }

    pub fn release_results(
        &self,
        _auth: &Facilitator,
        code: &str,
    ) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        self.gate(session.is_success_revealed, code, "success not revealed yet")?;
        let updated = self.write(code, &[PatchOp::SetResultReleased(true)])?;
        info!("Results released on session {}", code);
        Ok(updated)
    }

    /// Wipes the run back to the lobby. Configuration and `isOpen` survive.
    pub fn reset_session(&self, _auth: &Facilitator, code: &str) -> Result<Session, SessionError> {
        self.load(code)?;
        let updated = self.write(code, &[PatchOp::Reset])?;
        info!("Reset session {}", code);
        Ok(updated)
    }

    pub fn delete_session(&self, _auth: &Facilitator, code: &str) -> Result<(), SessionError> {
        validate_session_code(code)?;
        if !self.storage().delete_session(code)? {
            return Err(SessionError::NotFound(code.to_string()));
        }
        info!("Deleted session {}", code);
        Ok(())
    }

    pub fn leaderboard(
        &self,
        _auth: &Facilitator,
        code: &str,
    ) -> Result<Vec<LeaderboardEntry>, SessionError> {
        Ok(rank_successful_teams(&self.load(code)?))
    }

    pub fn team_roster(
        &self,
        _auth: &Facilitator,
        code: &str,
    ) -> Result<Vec<TeamStatus>, SessionError> {
        Ok(team_statuses(&self.load(code)?))
    }
}
