use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session_management::session::{
    ChatEntry, MissionConfig, Participant, PersonalNote, Session, SubmissionData,
};

/// A single field-level write against a session document.
///
/// A patch is a list of these applied in order as one merge; fields not named
/// by any operation are left untouched, and keyed entries (`submissions/{team}`,
/// `liveChat/{id}` ...) only replace their own key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatchOp {
    SetOpen(bool),
    StartMission {
        config: MissionConfig,
        started_at: DateTime<Utc>,
    },
    SetPhaseCursor {
        index: i32,
        started_at: DateTime<Utc>,
    },
    PausePhase {
        elapsed: u64,
    },
    ResumePhase {
        started_at: DateTime<Utc>,
    },
    PauseMission {
        at: DateTime<Utc>,
        elapsed: u64,
    },
    ResumeMission {
        started_at: DateTime<Utc>,
    },
    SetSubmitEnabled(bool),
    SetAnswerRevealed(bool),
    SetSuccessRevealed(bool),
    SetResultReleased(bool),
    PutParticipant {
        id: String,
        participant: Participant,
    },
    PutChat {
        participant_id: String,
        entry: ChatEntry,
    },
    PutPersonalNote {
        participant_id: String,
        note: PersonalNote,
    },
    PutMemo {
        team_number: u32,
        text: String,
    },
    PutSubmission {
        team_number: u32,
        submission: SubmissionData,
    },
    /// Clears all run state while keeping identity, configuration and `isOpen`.
    Reset,
}

/// Applies `ops` to `session` in order. Shared by every storage backend.
pub fn apply_patch(session: &mut Session, ops: &[PatchOp]) {
    for op in ops {
        match op {
            PatchOp::SetOpen(v) => session.is_open = *v,
            PatchOp::StartMission { config, started_at } => {
                session.is_mission_started = true;
                session.mission_started_at = Some(*started_at);
                session.team_internal_rounds = config.internal_rounds;
                session.team_cross_rounds = config.cross_rounds;
                session.round_duration = config.round_duration;
                session.submit_duration = config.submit_duration;
                session.mission_duration = config.mission_duration();
                session.is_paused = false;
                session.paused_at = None;
                session.paused_elapsed = 0;
                session.current_phase_index = -1;
                session.phase_started_at = None;
                session.is_phase_paused = false;
                session.phase_paused_elapsed = 0;
                session.is_submit_enabled = false;
            }
            PatchOp::SetPhaseCursor { index, started_at } => {
                session.current_phase_index = *index;
                session.phase_started_at = Some(*started_at);
                session.is_phase_paused = false;
                session.phase_paused_elapsed = 0;
            }
            PatchOp::PausePhase { elapsed } => {
                session.is_phase_paused = true;
                session.phase_paused_elapsed = *elapsed;
            }
            PatchOp::ResumePhase { started_at } => {
                session.is_phase_paused = false;
                session.phase_started_at = Some(*started_at);
            }
            PatchOp::PauseMission { at, elapsed } => {
                session.is_paused = true;
                session.paused_at = Some(*at);
                session.paused_elapsed = *elapsed;
            }
            PatchOp::ResumeMission { started_at } => {
                session.is_paused = false;
                session.paused_at = None;
                session.mission_started_at = Some(*started_at);
            }
            PatchOp::SetSubmitEnabled(v) => session.is_submit_enabled = *v,
            PatchOp::SetAnswerRevealed(v) => session.is_answer_revealed = *v,
            PatchOp::SetSuccessRevealed(v) => session.is_success_revealed = *v,
            PatchOp::SetResultReleased(v) => session.is_result_released = *v,
            PatchOp::PutParticipant { id, participant } => {
                session.participants.insert(id.clone(), participant.clone());
            }
            PatchOp::PutChat {
                participant_id,
                entry,
            } => {
                session.live_chat.insert(participant_id.clone(), entry.clone());
            }
            PatchOp::PutPersonalNote {
                participant_id,
                note,
            } => {
                session
                    .personal_notes
                    .insert(participant_id.clone(), note.clone());
            }
            PatchOp::PutMemo { team_number, text } => {
                session.memos.insert(*team_number, text.clone());
            }
            PatchOp::PutSubmission {
                team_number,
                submission,
            } => {
                session.submissions.insert(*team_number, submission.clone());
            }
            PatchOp::Reset => {
                session.is_mission_started = false;
                session.is_submit_enabled = false;
                session.is_answer_revealed = false;
                session.is_success_revealed = false;
                session.is_result_released = false;
                session.current_phase_index = -1;
                session.phase_started_at = None;
                session.is_phase_paused = false;
                session.phase_paused_elapsed = 0;
                session.mission_started_at = None;
                session.is_paused = false;
                session.paused_at = None;
                session.paused_elapsed = 0;
                session.participants.clear();
                session.submissions.clear();
                session.live_chat.clear();
                session.personal_notes.clear();
                session.memos.clear();
            }
        }
    }
}

/// Criteria for listing sessions. Empty criteria match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFilter {
    pub open_only: bool,
    pub group_name: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl SessionFilter {
    pub fn matches(&self, session: &Session) -> bool {
        if self.open_only && !session.is_open {
            return false;
        }
        if let Some(ref name) = self.group_name {
            if &session.group_name != name {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if session.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if session.created_at >= before {
                return false;
            }
        }
        true
    }
}
