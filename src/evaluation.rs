//! Correctness evaluation of team submissions.
//!
//! The answer is a day of the week plus a clock time picked from fixed option
//! lists. Evaluation is exact field-wise equality against [`ANSWER_KEY`]; there
//! is no partial credit.

use serde::{Deserialize, Serialize};

use crate::error_handling::types::ValidationError;
use crate::session_management::session::{Session, SubmissionData};

pub const DAYS: [&str; 7] = ["월요일", "화요일", "수요일", "목요일", "금요일", "토요일", "일요일"];
pub const AMPM: [&str; 2] = ["오전", "오후"];
pub const HOURS: [&str; 13] = [
    "00", "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12",
];
pub const MINUTES: [&str; 6] = ["00", "10", "20", "30", "40", "50"];

/// The four answer fields a team picks on the submit screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerForm {
    pub day: String,
    pub ampm: String,
    pub hour: String,
    pub minute: String,
}

pub const ANSWER_KEY: AnswerKey = AnswerKey {
    day: "일요일",
    ampm: "오전",
    hour: "09",
    minute: "30",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerKey {
    pub day: &'static str,
    pub ampm: &'static str,
    pub hour: &'static str,
    pub minute: &'static str,
}

impl AnswerForm {
    /// Rejects values that none of the option lists offer.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let checks: [(&str, &str, &[&str]); 4] = [
            ("day", &self.day, &DAYS),
            ("ampm", &self.ampm, &AMPM),
            ("hour", &self.hour, &HOURS),
            ("minute", &self.minute, &MINUTES),
        ];
        for (field, value, options) in checks {
            if !options.contains(&value) {
                return Err(ValidationError::InvalidAnswer(format!(
                    "{} '{}' is not one of the offered options",
                    field, value
                )));
            }
        }
        Ok(())
    }
}

pub fn is_correct(sub: &SubmissionData) -> bool {
    sub.day == ANSWER_KEY.day
        && sub.ampm == ANSWER_KEY.ampm
        && sub.hour == ANSWER_KEY.hour
        && sub.minute == ANSWER_KEY.minute
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Pending,
    Success,
    Failure,
}

/// Outcome of one team as the facilitator sees it.
pub fn team_result(session: &Session, team_number: u32) -> ResultStatus {
    match session.submissions.get(&team_number) {
        None => ResultStatus::Pending,
        Some(sub) if is_correct(sub) => ResultStatus::Success,
        Some(_) => ResultStatus::Failure,
    }
}

/// Outcome as a participant may see it: pending until results are released.
pub fn visible_result(session: &Session, team_number: u32) -> ResultStatus {
    if !session.is_result_released {
        return ResultStatus::Pending;
    }
    team_result(session, team_number)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub team_number: u32,
    pub submission: SubmissionData,
}

/// Correct submissions, earliest first.
pub fn rank_successful_teams(session: &Session) -> Vec<LeaderboardEntry> {
    let mut correct: Vec<(u32, &SubmissionData)> = session
        .submissions
        .iter()
        .filter(|(_, sub)| is_correct(sub))
        .map(|(team, sub)| (*team, sub))
        .collect();
    correct.sort_by(|a, b| a.1.submitted_at.cmp(&b.1.submitted_at).then(a.0.cmp(&b.0)));
    correct
        .into_iter()
        .enumerate()
        .map(|(i, (team_number, sub))| LeaderboardEntry {
            rank: i + 1,
            team_number,
            submission: sub.clone(),
        })
        .collect()
}

/// One row of the facilitator's roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStatus {
    pub team_number: u32,
    pub members: Vec<String>,
    pub has_submitted: bool,
    pub result: ResultStatus,
}

pub fn team_statuses(session: &Session) -> Vec<TeamStatus> {
    (1..=session.team_count)
        .map(|team_number| TeamStatus {
            team_number,
            members: session
                .team_members(team_number)
                .into_iter()
                .map(|p| p.name.clone())
                .collect(),
            has_submitted: session.has_submitted(team_number),
            result: team_result(session, team_number),
        })
        .collect()
}
