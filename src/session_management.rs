//! Session management core module.
//!
//! This module provides the session document, the phase clock derived from
//! it, and the two control surfaces (facilitator and participant) that move a
//! session through its lifecycle.

use serde::{Deserialize, Serialize};

/// Wall-clock abstraction, swappable for a manual clock in tests.
pub mod clock;
/// Pending edit buffers flushed after a quiet period.
pub mod draft_buffer;
/// Facilitator control surface and its credential check.
pub mod facilitator;
/// Participant control surface.
pub mod participant;
/// Phase sequence and timing arithmetic.
pub mod phase_clock;
/// Client screen state machine derived from session flags.
pub mod screen_flow;
/// Session data structures and utilities.
pub mod session;
/// Host of both control surfaces over an injected store.
pub mod session_manager;

#[cfg(test)]
mod integration_tests;

/// Coarse lifecycle position of a session, derived from its flags.
///
/// Variants:
/// - `Lobby`: participants may be joining; the mission has not started.
/// - `InMission`: the phase clock is running.
/// - `Revealing`: answers (and possibly success) have been revealed.
/// - `Released`: results have been released to participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStage {
    Lobby,
    InMission,
    Revealing,
    Released,
}

impl SessionStage {
    pub fn of(session: &session::Session) -> Self {
        if session.is_result_released {
            SessionStage::Released
        } else if session.is_answer_revealed || session.is_success_revealed {
            SessionStage::Revealing
        } else if session.is_mission_started {
            SessionStage::InMission
        } else {
            SessionStage::Lobby
        }
    }
}
