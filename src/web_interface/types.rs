use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warp::http::StatusCode;

use crate::error_handling::types::{SessionError, StorageError};
use crate::evaluation::AnswerForm;
use crate::session_management::session::MissionConfig;
use crate::storage::types::SessionFilter;

/// API error payload
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub group_name: String,
    pub team_count: u32,
}

/// Mission settings to start with. Omitted fields keep the session's current value;
/// an empty object starts with the settings as they are.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartMissionRequest {
    pub internal_rounds: Option<u32>,
    pub cross_rounds: Option<u32>,
    pub round_duration: Option<u32>,
    pub submit_duration: Option<u32>,
}

impl StartMissionRequest {
    pub fn is_empty(&self) -> bool {
        self.internal_rounds.is_none()
            && self.cross_rounds.is_none()
            && self.round_duration.is_none()
            && self.submit_duration.is_none()
    }

    pub fn over(&self, base: MissionConfig) -> MissionConfig {
        MissionConfig {
            internal_rounds: self.internal_rounds.unwrap_or(base.internal_rounds),
            cross_rounds: self.cross_rounds.unwrap_or(base.cross_rounds),
            round_duration: self.round_duration.unwrap_or(base.round_duration),
            submit_duration: self.submit_duration.unwrap_or(base.submit_duration),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub team_number: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub participant_id: String,
}

/// Body of chat, note and memo writes.
#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub user_name: String,
    #[serde(flatten)]
    pub answer: AnswerForm,
}

/// `GET /sessions` query, e.g.
/// `?groupName=Team%20A&openOnly=true&createdAfter=2026-01-01T00:00:00Z`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub group_name: Option<String>,
    #[serde(default)]
    pub open_only: bool,
    pub created_after: Option<DateTime<Utc>>,
}

impl ListQuery {
    pub fn filter(self) -> SessionFilter {
        SessionFilter {
            open_only: self.open_only,
            group_name: self.group_name,
            created_after: self.created_after,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CluesQuery {
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: String,
}

/// HTTP status a control-surface failure is reported with.
pub fn status_for(err: &SessionError) -> StatusCode {
    match err {
        SessionError::Validation(_) => StatusCode::BAD_REQUEST,
        SessionError::NotFound(_) | SessionError::ParticipantNotFound(_) => StatusCode::NOT_FOUND,
        SessionError::Unauthorized => StatusCode::UNAUTHORIZED,
        SessionError::InvalidTransition(_) => StatusCode::CONFLICT,
        SessionError::StorageError(StorageError::AlreadyExists(_)) => StatusCode::CONFLICT,
        SessionError::StorageError(_) | SessionError::CreationFailed => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::types::ValidationError;
    use crate::session_management::session::Session;
    use crate::storage::session_filter::created_after;

    #[test]
    fn errors_map_to_distinct_statuses() {
        assert_eq!(
            status_for(&SessionError::Validation(ValidationError::EmptyName)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&SessionError::NotFound("X".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&SessionError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(&SessionError::InvalidTransition("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&SessionError::StorageError(StorageError::WriteFailed)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn submit_request_flattens_answer_fields() {
        let body = r#"{"userName":"Ann","day":"일요일","ampm":"오전","hour":"09","minute":"30"}"#;
        let req: SubmitRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.user_name, "Ann");
        assert_eq!(req.answer.hour, "09");
    }

    #[test]
    fn list_query_carries_creation_cutoff() {
        let body = r#"{"openOnly":true,"createdAfter":"2026-01-01T00:00:00Z"}"#;
        let query: ListQuery = serde_json::from_str(body).unwrap();
        let filter = query.filter();
        let cutoff: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        assert!(filter.open_only);
        assert_eq!(filter.group_name, None);
        assert_eq!(filter.created_after, Some(cutoff));

        let mut session = Session::new(
            "ABC123".into(),
            "Team A".into(),
            2,
            MissionConfig::default(),
            cutoff - chrono::Duration::hours(1),
        );
        session.is_open = true;
        assert!(!filter.matches(&session));
        session.created_at = cutoff;
        assert!(filter.matches(&session));
        assert_eq!(created_after(cutoff).created_after, filter.created_after);
    }

    #[test]
    fn list_query_defaults_to_no_criteria() {
        let query: ListQuery = serde_json::from_str("{}").unwrap();
        let filter = query.filter();
        assert!(!filter.open_only);
        assert!(filter.created_after.is_none());
    }

    #[test]
    fn mission_request_overrides_only_given_fields() {
        let empty: StartMissionRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
        let partial: StartMissionRequest =
            serde_json::from_str(r#"{"internalRounds":1,"crossRounds":1}"#).unwrap();
        let config = partial.over(MissionConfig::default());
        assert_eq!(config.total_comm_phases(), 2);
        assert_eq!(config.round_duration, 5);
        assert_eq!(config.submit_duration, 10);
    }
}
