use crate::error_handling::types::ValidationError;
use crate::SessionStage;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use uuid::Uuid;

/// Length of the join code shown to participants.
pub const SESSION_CODE_LEN: usize = 6;

const CODE_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Round counts and durations that shape the phase sequence of a mission.
///
/// Durations are expressed in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionConfig {
    pub internal_rounds: u32,
    pub cross_rounds: u32,
    pub round_duration: u32,
    pub submit_duration: u32,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            internal_rounds: 3,
            cross_rounds: 3,
            round_duration: 5,
            submit_duration: 10,
        }
    }
}

impl MissionConfig {
    pub fn total_comm_phases(&self) -> u32 {
        self.internal_rounds + self.cross_rounds
    }

    /// Whole-mission length in minutes, used by the overall progress bar.
    pub fn mission_duration(&self) -> u32 {
        self.total_comm_phases() * self.round_duration + self.submit_duration
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.total_comm_phases() > 0 && self.round_duration == 0 {
            return Err(ValidationError::InvalidMissionConfig(
                "round duration must be at least one minute".into(),
            ));
        }
        if self.submit_duration == 0 {
            return Err(ValidationError::InvalidMissionConfig(
                "submit duration must be at least one minute".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub name: String,
    pub team_number: u32,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionData {
    pub day: String,
    pub ampm: String,
    pub hour: String,
    pub minute: String,
    pub user_name: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub name: String,
    pub team_number: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalNote {
    pub name: String,
    pub team_number: u32,
    pub text: String,
}

/// One run of the exercise, keyed by its join code.
///
/// This is the document shape exchanged with [`crate::storage::storage_trait::Storage`];
/// nested collections live and die with the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub group_name: String,
    pub team_count: u32,
    pub team_internal_rounds: u32,
    pub team_cross_rounds: u32,
    pub round_duration: u32,
    pub submit_duration: u32,

    pub is_open: bool,
    pub is_mission_started: bool,
    pub is_submit_enabled: bool,
    pub is_answer_revealed: bool,
    pub is_success_revealed: bool,
    pub is_result_released: bool,

    /// -1 while waiting for the facilitator, otherwise an index into the phase sequence.
    pub current_phase_index: i32,
    pub phase_started_at: Option<DateTime<Utc>>,
    pub is_phase_paused: bool,
    pub phase_paused_elapsed: u64,

    // Overall mission timer, independent of the phase cursor.
    pub mission_started_at: Option<DateTime<Utc>>,
    pub mission_duration: u32,
    pub is_paused: bool,
    pub paused_at: Option<DateTime<Utc>>,
    pub paused_elapsed: u64,

    #[serde(default)]
    pub participants: BTreeMap<String, Participant>,
    #[serde(default)]
    pub submissions: BTreeMap<u32, SubmissionData>,
    #[serde(default)]
    pub live_chat: BTreeMap<String, ChatEntry>,
    #[serde(default)]
    pub personal_notes: BTreeMap<String, PersonalNote>,
    #[serde(default)]
    pub memos: BTreeMap<u32, String>,

    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Builds a fresh session with every flag cleared and the cursor at -1.
    pub fn new(
        id: String,
        group_name: String,
        team_count: u32,
        defaults: MissionConfig,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            group_name,
            team_count,
            team_internal_rounds: defaults.internal_rounds,
            team_cross_rounds: defaults.cross_rounds,
            round_duration: defaults.round_duration,
            submit_duration: defaults.submit_duration,
            is_open: false,
            is_mission_started: false,
            is_submit_enabled: false,
            is_answer_revealed: false,
            is_success_revealed: false,
            is_result_released: false,
            current_phase_index: -1,
            phase_started_at: None,
            is_phase_paused: false,
            phase_paused_elapsed: 0,
            mission_started_at: None,
            mission_duration: defaults.mission_duration(),
            is_paused: false,
            paused_at: None,
            paused_elapsed: 0,
            participants: BTreeMap::new(),
            submissions: BTreeMap::new(),
            live_chat: BTreeMap::new(),
            personal_notes: BTreeMap::new(),
            memos: BTreeMap::new(),
            created_at,
        }
    }

    pub fn mission_config(&self) -> MissionConfig {
        MissionConfig {
            internal_rounds: self.team_internal_rounds,
            cross_rounds: self.team_cross_rounds,
            round_duration: self.round_duration,
            submit_duration: self.submit_duration,
        }
    }

    pub fn total_comm_phases(&self) -> u32 {
        self.team_internal_rounds + self.team_cross_rounds
    }

    /// Communication rounds plus the final submission phase.
    pub fn total_phases(&self) -> u32 {
        self.total_comm_phases() + 1
    }

    pub fn check_team_number(&self, team_number: u32) -> Result<(), ValidationError> {
        if team_number == 0 || team_number > self.team_count {
            return Err(ValidationError::TeamNumberOutOfRange {
                team_number,
                team_count: self.team_count,
            });
        }
        Ok(())
    }

    /// Id of the participant registered under `(name, team_number)`, if any.
    pub fn find_participant(&self, name: &str, team_number: u32) -> Option<&str> {
        self.participants
            .iter()
            .find(|(_, p)| p.name == name && p.team_number == team_number)
            .map(|(id, _)| id.as_str())
    }

    pub fn team_members(&self, team_number: u32) -> Vec<&Participant> {
        let mut members: Vec<&Participant> = self
            .participants
            .values()
            .filter(|p| p.team_number == team_number)
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.name.cmp(&b.name)));
        members
    }

    /// Personal notes of one team, the shared "memo board" view.
    pub fn team_notes(&self, team_number: u32) -> Vec<&PersonalNote> {
        let mut notes: Vec<&PersonalNote> = self
            .personal_notes
            .values()
            .filter(|n| n.team_number == team_number)
            .collect();
        notes.sort_by(|a, b| a.name.cmp(&b.name));
        notes
    }

    pub fn has_submitted(&self, team_number: u32) -> bool {
        self.submissions.contains_key(&team_number)
    }

    /// Checks the structural invariants every writer must uphold.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.team_count == 0 {
            return Err("teamCount must be at least 1".into());
        }
        let total = self.total_phases() as i32;
        if self.current_phase_index < -1 || self.current_phase_index >= total {
            return Err(format!(
                "currentPhaseIndex {} outside [-1, {}]",
                self.current_phase_index,
                total - 1
            ));
        }
        if self.is_success_revealed && !self.is_answer_revealed {
            return Err("success revealed before answers".into());
        }
        let in_range = |t: u32| t >= 1 && t <= self.team_count;
        if let Some(p) = self.participants.values().find(|p| !in_range(p.team_number)) {
            return Err(format!("participant {} in team {}", p.name, p.team_number));
        }
        if let Some(t) = self.submissions.keys().find(|t| !in_range(**t)) {
            return Err(format!("submission for team {}", t));
        }
        if let Some(t) = self.memos.keys().find(|t| !in_range(**t)) {
            return Err(format!("memo for team {}", t));
        }
        Ok(())
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            group_name: self.group_name.clone(),
            team_count: self.team_count,
            is_open: self.is_open,
            participant_count: self.participants.len(),
            submission_count: self.submissions.len(),
            stage: SessionStage::of(self),
            created_at: self.created_at,
        }
    }
}

/// Lightweight listing entry for session pickers and dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub group_name: String,
    pub team_count: u32,
    pub is_open: bool,
    pub participant_count: usize,
    pub submission_count: usize,
    pub stage: SessionStage,
    pub created_at: DateTime<Utc>,
}

/// Generates a six character join code from `[A-Z0-9]`.
pub fn generate_session_code() -> String {
    let mut n = Uuid::new_v4().as_u128();
    let mut code = String::with_capacity(SESSION_CODE_LEN);
    for _ in 0..SESSION_CODE_LEN {
        code.push(CODE_ALPHABET[(n % 36) as usize] as char);
        n /= 36;
    }
    code
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9]{6}$").expect("static join code pattern"))
}

pub fn validate_session_code(code: &str) -> Result<(), ValidationError> {
    if code_pattern().is_match(code) {
        Ok(())
    } else {
        Err(ValidationError::InvalidSessionCode(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Session {
        Session::new(
            "ABC123".into(),
            "Team A".into(),
            4,
            MissionConfig::default(),
            Utc::now(),
        )
    }

    #[test]
    fn new_session_starts_with_flags_cleared() {
        let s = sample();
        assert_eq!(s.current_phase_index, -1);
        assert!(!s.is_open && !s.is_mission_started && !s.is_submit_enabled);
        assert!(!s.is_answer_revealed && !s.is_success_revealed && !s.is_result_released);
        assert_eq!(s.total_phases(), 7);
        assert_eq!(s.mission_duration, 6 * 5 + 10);
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn team_number_must_be_within_team_count() {
        let s = sample();
        assert!(s.check_team_number(1).is_ok());
        assert!(s.check_team_number(4).is_ok());
        assert_eq!(
            s.check_team_number(0),
            Err(ValidationError::TeamNumberOutOfRange {
                team_number: 0,
                team_count: 4
            })
        );
        assert!(s.check_team_number(5).is_err());
    }

    #[test]
    fn invariants_catch_success_before_answers() {
        let mut s = sample();
        s.is_success_revealed = true;
        assert!(s.check_invariants().is_err());
        s.is_answer_revealed = true;
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn invariants_catch_cursor_past_submit_phase() {
        let mut s = sample();
        s.current_phase_index = 6;
        assert!(s.check_invariants().is_ok());
        s.current_phase_index = 7;
        assert!(s.check_invariants().is_err());
    }

    #[test]
    fn team_notes_filter_by_team_and_sort_by_author() {
        let mut s = sample();
        for (id, name, team) in [("p1", "Zed", 2), ("p2", "Amy", 2), ("p3", "Bob", 1)] {
            s.personal_notes.insert(
                id.into(),
                PersonalNote {
                    name: name.into(),
                    team_number: team,
                    text: format!("{} note", name),
                },
            );
        }
        let names: Vec<&str> = s.team_notes(2).iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Amy", "Zed"]);
    }

    #[test]
    fn generated_codes_match_join_code_format() {
        for _ in 0..50 {
            let code = generate_session_code();
            assert_eq!(code.len(), SESSION_CODE_LEN);
            assert!(validate_session_code(&code).is_ok(), "{}", code);
        }
        assert!(validate_session_code("abc123").is_err());
        assert!(validate_session_code("ABC12").is_err());
        assert!(validate_session_code("ABC12!").is_err());
    }

    #[test]
    fn document_round_trips_through_json_with_team_keyed_maps() {
        let mut s = sample();
        s.memos.insert(3, "meet at the bridge".into());
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"currentPhaseIndex\":-1"));
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
