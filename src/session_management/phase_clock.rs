//! Phase clock.
//!
//! Derives the live phase, its remaining time and the overall mission
//! progress from a session snapshot and a wall-clock instant. Everything here
//! is synchronous arithmetic; clients recompute it on every display tick.
//!
//! Phase sequence for `N = teamInternalRounds + teamCrossRounds`:
//!
//! ```text
//! index:  0         1       2         3      ...  N
//! kind:   INTERNAL  CROSS   INTERNAL  CROSS  ...  SUBMIT
//! round:  1         1       2         2      ...  1
//! ```

use crate::session_management::session::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseKind {
    TeamInternal,
    TeamCross,
    Submit,
}

/// Timing of the phase the cursor currently points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseInfo {
    pub kind: PhaseKind,
    pub index: u32,
    pub round_number: u32,
    pub total_phases: u32,
    pub duration_secs: u64,
    pub elapsed_secs: u64,
    pub phase_remaining: u64,
    pub phase_progress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionProgress {
    pub progress: f64,
    /// Estimate only: derived from the fixed mission duration, not a live timer.
    pub remaining_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockSnapshot {
    pub phase: Option<PhaseInfo>,
    pub mission: MissionProgress,
    pub mission_elapsed_secs: u64,
}

/// Kind and in-kind round number of the phase at `index`.
pub fn phase_at(index: u32, total_comm_phases: u32) -> (PhaseKind, u32) {
    if index >= total_comm_phases {
        return (PhaseKind::Submit, 1);
    }
    let kind = if index % 2 == 0 {
        PhaseKind::TeamInternal
    } else {
        PhaseKind::TeamCross
    };
    (kind, index / 2 + 1)
}

/// Seconds spent in the active phase. While paused the banked value is authoritative.
pub fn phase_elapsed_seconds(session: &Session, now: DateTime<Utc>) -> u64 {
    if session.is_phase_paused {
        return session.phase_paused_elapsed;
    }
    match session.phase_started_at {
        Some(started) => (now - started).num_seconds().max(0) as u64,
        None => 0,
    }
}

/// Seconds on the legacy whole-mission timer.
pub fn mission_elapsed_seconds(session: &Session, now: DateTime<Utc>) -> u64 {
    if !session.is_mission_started {
        return 0;
    }
    if session.is_paused {
        return session.paused_elapsed;
    }
    match session.mission_started_at {
        Some(started) => (now - started).num_seconds().max(0) as u64,
        None => 0,
    }
}

pub fn compute_phase(session: &Session, phase_elapsed: u64) -> Option<PhaseInfo> {
    if session.current_phase_index < 0 {
        return None;
    }
    let index = session.current_phase_index as u32;
    let total_comm = session.total_comm_phases();
    let (kind, round_number) = phase_at(index, total_comm);
    let minutes = match kind {
        PhaseKind::Submit => session.submit_duration,
        _ => session.round_duration,
    };
    let duration_secs = u64::from(minutes) * 60;
    let (phase_remaining, phase_progress) = if duration_secs == 0 {
        (0, 1.0)
    } else {
        (
            duration_secs.saturating_sub(phase_elapsed),
            (phase_elapsed as f64 / duration_secs as f64).min(1.0),
        )
    };
    Some(PhaseInfo {
        kind,
        index,
        round_number,
        total_phases: total_comm + 1,
        duration_secs,
        elapsed_secs: phase_elapsed,
        phase_remaining,
        phase_progress,
    })
}

pub fn mission_progress(session: &Session, current_phase_progress: f64) -> MissionProgress {
    let completed_whole = session.current_phase_index.max(0) as f64;
    let total = f64::from(session.total_phases());
    let progress = ((completed_whole + current_phase_progress) / total).min(1.0);
    let mission_secs = f64::from(session.mission_duration) * 60.0;
    MissionProgress {
        progress,
        remaining_secs: ((1.0 - progress) * mission_secs).round().max(0.0) as u64,
    }
}

/// Everything a display tick needs, computed at `now`.
pub fn snapshot(session: &Session, now: DateTime<Utc>) -> ClockSnapshot {
    let phase = compute_phase(session, phase_elapsed_seconds(session, now));
    let current = phase.as_ref().map_or(0.0, |p| p.phase_progress);
    ClockSnapshot {
        mission: mission_progress(session, current),
        phase,
        mission_elapsed_secs: mission_elapsed_seconds(session, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_management::session::MissionConfig;
    use chrono::Duration;

    fn session(internal: u32, cross: u32) -> Session {
        let config = MissionConfig {
            internal_rounds: internal,
            cross_rounds: cross,
            round_duration: 5,
            submit_duration: 10,
        };
        Session::new("ABC123".into(), "Team A".into(), 4, config, Utc::now())
    }

    #[test]
    fn three_by_three_sequence_alternates_and_ends_in_submit() {
        let s = session(3, 3);
        assert_eq!(s.total_phases(), 7);
        for (index, round) in [(0, 1), (2, 2), (4, 3)] {
            assert_eq!(phase_at(index, 6), (PhaseKind::TeamInternal, round));
        }
        for (index, round) in [(1, 1), (3, 2), (5, 3)] {
            assert_eq!(phase_at(index, 6), (PhaseKind::TeamCross, round));
        }
        assert_eq!(phase_at(6, 6).0, PhaseKind::Submit);
    }

    #[test]
    fn no_phase_before_facilitator_starts_one() {
        let s = session(3, 3);
        assert!(compute_phase(&s, 0).is_none());
        let snap = snapshot(&s, Utc::now());
        assert!(snap.phase.is_none());
        assert_eq!(snap.mission.progress, 0.0);
    }

    #[test]
    fn submit_phase_uses_submit_duration() {
        let mut s = session(1, 1);
        s.current_phase_index = 2;
        let info = compute_phase(&s, 120).unwrap();
        assert_eq!(info.kind, PhaseKind::Submit);
        assert_eq!(info.duration_secs, 600);
        assert_eq!(info.phase_remaining, 480);
        assert!((info.phase_progress - 0.2).abs() < 1e-9);
    }

    #[test]
    fn progress_is_monotonic_and_saturates() {
        let mut s = session(3, 3);
        s.current_phase_index = 1;
        let mut last = 0.0;
        for elapsed in (0..=900).step_by(15) {
            let info = compute_phase(&s, elapsed).unwrap();
            assert!(info.phase_progress >= last);
            assert!(info.phase_progress <= 1.0);
            if elapsed >= 300 {
                assert_eq!(info.phase_progress, 1.0);
                assert_eq!(info.phase_remaining, 0);
            }
            last = info.phase_progress;
        }
    }

    #[test]
    fn zero_length_phase_counts_as_complete() {
        let mut s = session(0, 0);
        s.submit_duration = 0;
        s.current_phase_index = 0;
        let info = compute_phase(&s, 0).unwrap();
        assert_eq!(info.phase_remaining, 0);
        assert_eq!(info.phase_progress, 1.0);
    }

    #[test]
    fn paused_phase_reports_banked_elapsed() {
        let now = Utc::now();
        let mut s = session(3, 3);
        s.current_phase_index = 0;
        s.phase_started_at = Some(now - Duration::seconds(500));
        s.is_phase_paused = true;
        s.phase_paused_elapsed = 60;
        assert_eq!(phase_elapsed_seconds(&s, now), 60);
        s.is_phase_paused = false;
        assert_eq!(phase_elapsed_seconds(&s, now), 500);
    }

    #[test]
    fn mission_progress_counts_completed_phases() {
        let mut s = session(3, 3);
        s.current_phase_index = 3;
        let m = mission_progress(&s, 0.5);
        assert!((m.progress - 3.5 / 7.0).abs() < 1e-9);
        let expected = ((1.0 - 3.5 / 7.0) * 40.0 * 60.0_f64).round() as u64;
        assert_eq!(m.remaining_secs, expected);

        s.current_phase_index = 6;
        assert_eq!(mission_progress(&s, 1.0).progress, 1.0);
        assert_eq!(mission_progress(&s, 1.0).remaining_secs, 0);
    }

    #[test]
    fn legacy_mission_timer_honours_pause() {
        let now = Utc::now();
        let mut s = session(3, 3);
        assert_eq!(mission_elapsed_seconds(&s, now), 0);
        s.is_mission_started = true;
        s.mission_started_at = Some(now - Duration::seconds(200));
        assert_eq!(mission_elapsed_seconds(&s, now), 200);
        s.is_paused = true;
        s.paused_elapsed = 150;
        assert_eq!(mission_elapsed_seconds(&s, now), 150);
    }
}
