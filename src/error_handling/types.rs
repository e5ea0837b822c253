use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    NotInRange(String),
    BadAddress(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::BadAddress(e) => write!(f, "Address formatting error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Caller supplied an out-of-range or malformed value. Raised before any write.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyName,
    EmptyGroupName,
    TeamCountOutOfRange { team_count: u32, max: u32 },
    TeamNumberOutOfRange { team_number: u32, team_count: u32 },
    PhaseIndexOutOfRange { index: i32, total_phases: u32 },
    InvalidAnswer(String),
    InvalidSessionCode(String),
    InvalidMissionConfig(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyName => write!(f, "Participant name must not be empty"),
            ValidationError::EmptyGroupName => write!(f, "Group name must not be empty"),
            ValidationError::TeamCountOutOfRange { team_count, max } => {
                write!(f, "Team count {} is outside 1..={}", team_count, max)
            }
            ValidationError::TeamNumberOutOfRange {
                team_number,
                team_count,
            } => write!(f, "Team {} is outside 1..={}", team_number, team_count),
            ValidationError::PhaseIndexOutOfRange {
                index,
                total_phases,
            } => write!(
                f,
                "Phase index {} is outside 0..{}",
                index, total_phases
            ),
            ValidationError::InvalidAnswer(e) => write!(f, "Invalid answer: {}", e),
            ValidationError::InvalidSessionCode(e) => write!(f, "Invalid session code: {}", e),
            ValidationError::InvalidMissionConfig(e) => {
                write!(f, "Invalid mission configuration: {}", e)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    ConnectionFailed,
    WriteFailed,
    ReadFailed,
    AlreadyExists(String),
    NotFound(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed => write!(f, "Storage connection failed"),
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::ReadFailed => write!(f, "Storage read failed"),
            StorageError::AlreadyExists(code) => write!(f, "Session {} already exists", code),
            StorageError::NotFound(code) => write!(f, "Session {} not found in storage", code),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    Validation(ValidationError),
    NotFound(String),
    ParticipantNotFound(String),
    StorageError(StorageError),
    Unauthorized,
    InvalidTransition(String),
    CreationFailed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Validation(e) => write!(f, "Validation error: {}", e),
            SessionError::NotFound(code) => write!(f, "Session {} not found", code),
            SessionError::ParticipantNotFound(id) => write!(f, "Participant {} not found", id),
            SessionError::StorageError(e) => write!(f, "Storage error: {}", e),
            SessionError::Unauthorized => write!(f, "Facilitator credentials required"),
            SessionError::InvalidTransition(e) => write!(f, "Transition refused: {}", e),
            SessionError::CreationFailed => write!(f, "Session creation failed"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ValidationError> for SessionError {
    fn from(err: ValidationError) -> Self {
        SessionError::Validation(err)
    }
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(code) => SessionError::NotFound(code),
            other => SessionError::StorageError(other),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
    ServerFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
            WebError::ServerFailed(e) => write!(f, "Web server failed: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    StorageError(StorageError),
    WebError(WebError),
    InitializationFailed(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::WebError(e) => write!(f, "Web error: {}", e),
            ControllerError::InitializationFailed(e) => write!(f, "Initialization failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_not_found_maps_to_session_not_found() {
        let err: SessionError = StorageError::NotFound("ABC123".into()).into();
        assert_eq!(err, SessionError::NotFound("ABC123".into()));

        let err: SessionError = StorageError::WriteFailed.into();
        assert_eq!(err, SessionError::StorageError(StorageError::WriteFailed));
    }

    #[test]
    fn validation_messages_name_the_offending_value() {
        let err = ValidationError::TeamNumberOutOfRange {
            team_number: 5,
            team_count: 4,
        };
        assert_eq!(err.to_string(), "Team 5 is outside 1..=4");
    }
}
