//! Scenario tests driving both control surfaces against the in-memory store.

use std::sync::Arc;

use chrono::Utc;

use crate::evaluation::{visible_result, AnswerForm, ResultStatus};
use crate::session_management::clock::{Clock, ManualClock};
use crate::session_management::facilitator::{Authenticator, Facilitator};
use crate::session_management::phase_clock::{snapshot, PhaseKind};
use crate::session_management::screen_flow::{apply, reconcile, Screen, ScreenAction};
use crate::session_management::session::MissionConfig;
use crate::session_management::session_manager::SessionManager;
use crate::session_management::SessionStage;
use crate::storage::memory_storage::MemoryStorage;
use crate::storage::storage_trait::Storage;

fn setup() -> (Arc<ManualClock>, SessionManager, Facilitator) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let manager = SessionManager::with_clock(storage, clock.clone());
    let auth = Authenticator::new(Some("facilitator".into()))
        .verify(Some("facilitator"))
        .unwrap();
    (clock, manager, auth)
}

fn answer(day: &str, hour: &str) -> AnswerForm {
    AnswerForm {
        day: day.into(),
        ampm: "오전".into(),
        hour: hour.into(),
        minute: "30".into(),
    }
}

#[test]
fn pause_resume_keeps_phase_elapsed_continuous() {
    let (clock, manager, auth) = setup();
    let s = manager.create_session(&auth, "Team A", 2).unwrap();
    manager
        .start_mission(
            &auth,
            &s.id,
            Some(MissionConfig {
                internal_rounds: 3,
                cross_rounds: 3,
                round_duration: 5,
                submit_duration: 10,
            }),
        )
        .unwrap();
    manager.start_phase(&auth, &s.id, 0).unwrap();

    clock.advance_secs(60);
    manager.pause_phase(&auth, &s.id).unwrap();
    clock.advance_secs(30);
    let view = manager.session_view(&s.id).unwrap();
    let phase = view.clock.phase.unwrap();
    assert_eq!(phase.elapsed_secs, 60);
    assert_eq!(phase.phase_remaining, 240);

    manager.resume_phase(&auth, &s.id).unwrap();
    let after_resume = manager.session_view(&s.id).unwrap().clock.phase.unwrap();
    assert_eq!(after_resume.elapsed_secs, 60);

    clock.advance_secs(10);
    let later = manager.session_view(&s.id).unwrap().clock.phase.unwrap();
    assert_eq!(later.elapsed_secs, 70);
    assert!(later.phase_progress > after_resume.phase_progress);
}

#[test]
fn resubmitting_overwrites_the_team_entry() {
    let (_, manager, auth) = setup();
    let s = manager.create_session(&auth, "Team A", 3).unwrap();
    manager.toggle_submit_enabled(&auth, &s.id).unwrap();
    manager.submit_final_answer(&s.id, 2, "Alice", &answer("월요일", "09")).unwrap();
    manager.submit_final_answer(&s.id, 2, "Bob", &answer("일요일", "09")).unwrap();
    manager.submit_final_answer(&s.id, 1, "Cy", &answer("일요일", "10")).unwrap();

    let session = manager.get_session(&s.id).unwrap();
    assert_eq!(session.submissions.len(), 2);
    assert_eq!(session.submissions[&2].user_name, "Bob");
}

#[test]
fn registration_dedups_on_name_and_team() {
    let (_, manager, auth) = setup();
    let s = manager.create_session(&auth, "Team A", 4).unwrap();
    manager.toggle_open(&auth, &s.id).unwrap();
    manager.register_participant(&s.id, "Alice", 2).unwrap();
    manager.register_participant(&s.id, "Alice", 2).unwrap();
    let session = manager.get_session(&s.id).unwrap();
    assert_eq!(session.participants.len(), 1);

    manager.register_participant(&s.id, "Alice", 3).unwrap();
    let session = manager.get_session(&s.id).unwrap();
    assert_eq!(session.participants.len(), 2);
    assert!(session.find_participant("Alice", 2).is_some());
    assert!(session.find_participant("Alice", 3).is_some());
}

#[test]
fn reset_clears_run_state_and_keeps_configuration() {
    let (clock, manager, auth) = setup();
    let s = manager.create_session(&auth, "Team A", 4).unwrap();
    manager.toggle_open(&auth, &s.id).unwrap();
    let config = MissionConfig {
        internal_rounds: 2,
        cross_rounds: 1,
        round_duration: 4,
        submit_duration: 6,
    };
    manager.start_mission(&auth, &s.id, Some(config)).unwrap();
    manager.start_phase(&auth, &s.id, 0).unwrap();
    let pid = manager.register_participant(&s.id, "Alice", 1).unwrap();
    manager.post_chat(&s.id, &pid, "hi").unwrap();
    manager.post_personal_note(&s.id, &pid, "note").unwrap();
    manager.post_team_memo(&s.id, 1, "memo").unwrap();
    manager.toggle_submit_enabled(&auth, &s.id).unwrap();
    manager.submit_final_answer(&s.id, 1, "Alice", &answer("일요일", "09")).unwrap();
    manager.reveal_answers(&auth, &s.id).unwrap();
    manager.reveal_success(&auth, &s.id).unwrap();
    manager.release_results(&auth, &s.id).unwrap();
    clock.advance_secs(30);
    manager.pause_phase(&auth, &s.id).unwrap();

    let reset = manager.reset_session(&auth, &s.id).unwrap();
    assert!(reset.submissions.is_empty());
    assert!(reset.participants.is_empty());
    assert!(reset.live_chat.is_empty());
    assert!(reset.personal_notes.is_empty());
    assert!(reset.memos.is_empty());
    assert!(!reset.is_mission_started && !reset.is_submit_enabled);
    assert!(!reset.is_answer_revealed && !reset.is_success_revealed && !reset.is_result_released);
    assert!(!reset.is_phase_paused);
    assert_eq!(reset.current_phase_index, -1);
    assert_eq!(reset.team_count, 4);
    assert_eq!(reset.group_name, "Team A");
    assert_eq!(reset.mission_config(), config);
    assert!(reset.is_open);
    assert_eq!(SessionStage::of(&reset), SessionStage::Lobby);
}

#[test]
fn full_exercise_from_creation_to_released_results() {
    let (clock, manager, auth) = setup();
    let s = manager.create_session(&auth, "Team A", 4).unwrap();
    let code = s.id.clone();
    manager.toggle_open(&auth, &code).unwrap();
    assert_eq!(manager.list_open_sessions().unwrap().len(), 1);

    let mut screens = Vec::new();
    for (team, name) in [(1, "Ann"), (2, "Ben"), (3, "Cat"), (4, "Dan")] {
        manager.register_participant(&code, name, team).unwrap();
        let screen = apply(Screen::Intro, ScreenAction::Join);
        screens.push((team, apply(screen, ScreenAction::EnterMission)));
    }

    let config = MissionConfig {
        internal_rounds: 1,
        cross_rounds: 1,
        round_duration: 5,
        submit_duration: 10,
    };
    let started = manager.start_mission(&auth, &code, Some(config)).unwrap();
    assert_eq!(started.total_phases(), 3);
    assert_eq!(SessionStage::of(&started), SessionStage::InMission);

    let expected = [PhaseKind::TeamInternal, PhaseKind::TeamCross, PhaseKind::Submit];
    for kind in expected {
        let session = manager.advance_phase(&auth, &code).unwrap();
        let phase = snapshot(&session, clock.now()).phase.unwrap();
        assert_eq!(phase.kind, kind);
        assert_eq!(phase.round_number, 1);
        clock.advance_secs(300);
    }
    assert!(manager.advance_phase(&auth, &code).is_err());

    manager.toggle_submit_enabled(&auth, &code).unwrap();
    manager.submit_final_answer(&code, 3, "Cat", &answer("일요일", "09")).unwrap();
    manager.submit_final_answer(&code, 1, "Ann", &answer("토요일", "09")).unwrap();

    let session = manager.get_session(&code).unwrap();
    for (team, screen) in screens.iter_mut() {
        *screen = reconcile(*screen, Some(&session), *team);
    }
    assert_eq!(screens[0].1, Screen::Checking);
    assert_eq!(screens[1].1, Screen::MainGame);
    assert_eq!(screens[2].1, Screen::Checking);
    assert_eq!(visible_result(&session, 3), ResultStatus::Pending);

    manager.reveal_answers(&auth, &code).unwrap();
    manager.reveal_success(&auth, &code).unwrap();
    let leaderboard = manager.leaderboard(&auth, &code).unwrap();
    assert_eq!(leaderboard.len(), 1);
    assert_eq!(leaderboard[0].team_number, 3);

    let released = manager.release_results(&auth, &code).unwrap();
    assert_eq!(SessionStage::of(&released), SessionStage::Released);
    for (team, screen) in screens.iter_mut() {
        *screen = reconcile(*screen, Some(&released), *team);
        assert_eq!(*screen, Screen::Result);
    }
    assert_eq!(manager.team_result(&code, 3).unwrap(), ResultStatus::Success);
    assert_eq!(manager.team_result(&code, 1).unwrap(), ResultStatus::Failure);
    assert_eq!(manager.team_result(&code, 2).unwrap(), ResultStatus::Pending);
    assert_eq!(manager.team_result(&code, 4).unwrap(), ResultStatus::Pending);

    let roster = manager.team_roster(&auth, &code).unwrap();
    assert_eq!(roster[2].members, vec!["Cat".to_string()]);
    assert!(released.check_invariants().is_ok());
}

#[test]
fn deleted_session_fails_gracefully_for_everyone() {
    let (_, manager, auth) = setup();
    let s = manager.create_session(&auth, "Team A", 2).unwrap();
    manager.toggle_open(&auth, &s.id).unwrap();
    let pid = manager.register_participant(&s.id, "Alice", 1).unwrap();
    let rx = manager.subscribe(&s.id).unwrap();

    manager.delete_session(&auth, &s.id).unwrap();
    assert!(rx.borrow().is_none());
    assert_eq!(reconcile(Screen::MainGame, rx.borrow().as_ref(), 1), Screen::Intro);
    assert!(matches!(
        manager.post_chat(&s.id, &pid, "anyone?"),
        Err(crate::error_handling::types::SessionError::NotFound(_))
    ));
}
