//! Participant screen flow.
//!
//! Client-local state layered over the session flags; nothing here is stored.
//! `apply` handles the participant's own actions, `reconcile` re-derives the
//! screen whenever a new session document arrives.

use serde::{Deserialize, Serialize};

use crate::session_management::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Screen {
    Intro,
    Story,
    MainGame,
    Submit,
    Checking,
    Result,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenAction {
    /// Registration succeeded.
    Join,
    EnterMission,
    OpenSubmitForm,
    CancelSubmit,
    SubmitAccepted,
    Exit,
}

/// Next screen after a participant action. Actions that do not apply are ignored.
pub fn apply(current: Screen, action: ScreenAction) -> Screen {
    match (current, action) {
        (Screen::Intro, ScreenAction::Join) => Screen::Story,
        (Screen::Story, ScreenAction::EnterMission) => Screen::MainGame,
        (Screen::MainGame, ScreenAction::OpenSubmitForm) => Screen::Submit,
        (Screen::Submit, ScreenAction::CancelSubmit) => Screen::MainGame,
        (Screen::Submit, ScreenAction::SubmitAccepted) => Screen::Checking,
        (Screen::Result, ScreenAction::Exit) => Screen::Intro,
        (screen, _) => screen,
    }
}

/// Forced transitions driven by the latest document for the participant's team.
///
/// A vanished session sends the client back to the intro screen.
pub fn reconcile(current: Screen, session: Option<&Session>, team_number: u32) -> Screen {
    let Some(session) = session else {
        return Screen::Intro;
    };
    if session.is_result_released {
        return Screen::Result;
    }
    match current {
        Screen::Story | Screen::MainGame | Screen::Submit if session.has_submitted(team_number) => {
            Screen::Checking
        }
        screen => screen,
    }
}
