//! Participant control surface.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clues::Clue;
use crate::error_handling::types::{SessionError, ValidationError};
use crate::evaluation::{visible_result, AnswerForm, ResultStatus};
use crate::session_management::phase_clock::{snapshot, ClockSnapshot};
use crate::session_management::session::{
    validate_session_code, ChatEntry, Participant, PersonalNote, Session, SessionSummary,
    SubmissionData,
};
use crate::session_management::session_manager::SessionManager;
use crate::storage::session_filter::open_sessions;
use crate::storage::subscription::SessionWatch;
use crate::storage::types::PatchOp;

/// A session document together with its phase clock, computed when it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session: Session,
    pub clock: ClockSnapshot,
}

fn participant<'a>(
    session: &'a Session,
    participant_id: &str,
) -> Result<&'a Participant, SessionError> {
    session
        .participants
        .get(participant_id)
        .ok_or_else(|| SessionError::ParticipantNotFound(participant_id.to_string()))
}

impl SessionManager {
    /// Sessions offered on the join screen.
    pub fn list_open_sessions(&self) -> Result<Vec<SessionSummary>, SessionError> {
        let sessions = self.storage().get_sessions(Some(open_sessions()))?;
        Ok(sessions.iter().map(Session::summary).collect())
    }

    pub fn get_session(&self, code: &str) -> Result<Session, SessionError> {
        self.load(code)
    }

    pub fn session_view(&self, code: &str) -> Result<SessionView, SessionError> {
        let session = self.load(code)?;
        let clock = snapshot(&session, self.now());
        Ok(SessionView { session, clock })
    }

    /// Live feed of one session. The receiver holds `None` once the session is gone.
    pub fn subscribe(&self, code: &str) -> Result<SessionWatch, SessionError> {
        validate_session_code(code)?;
        Ok(self.storage().subscribe(code)?)
    }

    /// Joins a team, returning the participant id.
    ///
    /// Registering the same (name, team) pair again returns the existing id.
    pub fn register_participant(
        &self,
        code: &str,
        name: &str,
        team_number: u32,
    ) -> Result<String, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let session = self.load(code)?;
        session.check_team_number(team_number)?;
        self.gate(session.is_open, code, "session is not accepting participants")?;

        if let Some(existing) = session.find_participant(name, team_number) {
            debug!("{} already registered in team {} of {}", name, team_number, code);
            return Ok(existing.to_string());
        }
        let id = Uuid::new_v4().to_string();
        self.write(
            code,
            &[PatchOp::PutParticipant {
                id: id.clone(),
                participant: Participant {
                    name: name.to_string(),
                    team_number,
                    joined_at: self.now(),
                },
            }],
        )?;
        info!("{} joined team {} of session {}", name, team_number, code);
        Ok(id)
    }

    /// Replaces the participant's one live chat message.
    pub fn post_chat(
        &self,
        code: &str,
        participant_id: &str,
        message: &str,
    ) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        let p = participant(&session, participant_id)?;
        let entry = ChatEntry {
            name: p.name.clone(),
            team_number: p.team_number,
            message: message.to_string(),
        };
        let updated = self.write(
            code,
            &[PatchOp::PutChat {
                participant_id: participant_id.to_string(),
                entry,
            }],
        )?;
        debug!("Chat updated by {} in session {}", participant_id, code);
        Ok(updated)
    }

    pub fn post_personal_note(
        &self,
        code: &str,
        participant_id: &str,
        text: &str,
    ) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        let p = participant(&session, participant_id)?;
        let note = PersonalNote {
            name: p.name.clone(),
            team_number: p.team_number,
            text: text.to_string(),
        };
        let updated = self.write(
            code,
            &[PatchOp::PutPersonalNote {
                participant_id: participant_id.to_string(),
                note,
            }],
        )?;
        debug!("Note updated by {} in session {}", participant_id, code);
        Ok(updated)
    }

    pub fn post_team_memo(
        &self,
        code: &str,
        team_number: u32,
        text: &str,
    ) -> Result<Session, SessionError> {
        let session = self.load(code)?;
        session.check_team_number(team_number)?;
        let updated = self.write(
            code,
            &[PatchOp::PutMemo {
                team_number,
                text: text.to_string(),
            }],
        )?;
        debug!("Memo of team {} updated in session {}", team_number, code);
        Ok(updated)
    }

    /// Whether a team may submit right now.
    pub fn submission_open(&self, session: &Session) -> bool {
        if session.is_submit_enabled {
            return true;
        }
        self.gates().submit_opens_with_phase
            && session.is_mission_started
            && session.current_phase_index >= session.total_comm_phases() as i32
    }

    /// Records the team's answer, replacing any earlier one.
    pub fn submit_final_answer(
        &self,
        code: &str,
        team_number: u32,
        user_name: &str,
        answer: &AnswerForm,
    ) -> Result<Session, SessionError> {
        answer.validate()?;
        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let session = self.load(code)?;
        session.check_team_number(team_number)?;
        self.gate(self.submission_open(&session), code, "submission is not open")?;

        let replacing = session.has_submitted(team_number);
        let submission = SubmissionData {
            day: answer.day.clone(),
            ampm: answer.ampm.clone(),
            hour: answer.hour.clone(),
            minute: answer.minute.clone(),
            user_name: user_name.to_string(),
            submitted_at: self.now(),
        };
        let updated = self.write(
            code,
            &[PatchOp::PutSubmission {
                team_number,
                submission,
            }],
        )?;
        info!(
            "Team {} of session {} {} its answer (by {})",
            team_number,
            code,
            if replacing { "replaced" } else { "submitted" },
            user_name
        );
        Ok(updated)
    }

    /// Clues visible to a team, or the whole catalog in view-all mode.
    pub fn clues_for_team(
        &self,
        code: &str,
        team_number: u32,
        view_all: bool,
    ) -> Result<Vec<Clue>, SessionError> {
        let session = self.load(code)?;
        session.check_team_number(team_number)?;
        Ok(self
            .clues()
            .for_team(session.team_count, team_number, view_all)
            .to_vec())
    }

    /// The team's shared memo board: every member's personal note.
    pub fn team_memo_board(
        &self,
        code: &str,
        team_number: u32,
    ) -> Result<Vec<PersonalNote>, SessionError> {
        let session = self.load(code)?;
        session.check_team_number(team_number)?;
        Ok(session.team_notes(team_number).into_iter().cloned().collect())
    }

    pub fn team_result(&self, code: &str, team_number: u32) -> Result<ResultStatus, SessionError> {
        let session = self.load(code)?;
        session.check_team_number(team_number)?;
        Ok(visible_result(&session, team_number))
    }
}
