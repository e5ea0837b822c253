use env_logger::Env;
use log::{info, warn};
use cluehunt::evaluation::AnswerForm;
use cluehunt::session_management::facilitator::Authenticator;
use cluehunt::session_management::session_manager::SessionManager;
use cluehunt::storage::database_storage::DatabaseStorage;
use cluehunt::storage::file_storage::FileStorage;
use cluehunt::storage::storage_trait::Storage;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Plays one short hunt against a storage backend and returns the session JSON.
fn play(label: &str, storage: Arc<dyn Storage>) -> String {
    let manager = SessionManager::new(storage);
    let auth = Authenticator::new(Some("demo".into()))
        .verify(Some("demo"))
        .expect("demo credential");

    let session = manager.create_session(&auth, "Demo group", 2).expect("create session");
    let code = session.id.clone();
    manager.toggle_open(&auth, &code).expect("open session");
    manager.register_participant(&code, "Ann", 1).expect("register Ann");
    manager.register_participant(&code, "Bo", 2).expect("register Bo");
    manager.start_mission(&auth, &code, None).expect("start mission");
    manager.advance_phase(&auth, &code).expect("first phase");
    manager.post_team_memo(&code, 1, "the clock tower rings at half past").expect("memo");
    manager.toggle_submit_enabled(&auth, &code).expect("enable submit");

    let right = AnswerForm {
        day: "일요일".into(),
        ampm: "오전".into(),
        hour: "09".into(),
        minute: "30".into(),
    };
    let wrong = AnswerForm { minute: "45".into(), ..right.clone() };
    manager.submit_final_answer(&code, 1, "Ann", &right).expect("submit team 1");
    manager.submit_final_answer(&code, 2, "Bo", &wrong).expect("submit team 2");

    manager.reveal_answers(&auth, &code).expect("reveal answers");
    manager.reveal_success(&auth, &code).expect("reveal success");
    let released = manager.release_results(&auth, &code).expect("release");

    for entry in manager.leaderboard(&auth, &code).expect("leaderboard") {
        info!("[{}] rank {} -> team {}", label, entry.rank, entry.team_number);
    }
    for team in 1..=released.team_count {
        info!(
            "[{}] team {} sees {:?}",
            label,
            team,
            manager.team_result(&code, team).expect("result")
        );
    }
    serde_json::to_string_pretty(&released).expect("serialize session")
}

fn main() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();

    let out_dir: PathBuf = env::var("STORAGE_DEMO_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            env::current_dir()
                .expect("cwd")
                .join("target")
                .join("storage_demo")
        });
    fs::create_dir_all(&out_dir).expect("create output dir");

    let db: Arc<dyn Storage> = if env::var("CLUEHUNT_DB_PATH").is_ok() {
        info!("Using DatabaseStorage::new() with CLUEHUNT_DB_PATH");
        Arc::new(DatabaseStorage::new().expect("create db (env)"))
    } else {
        let db_path = out_dir.join("storage_demo.sqlite3");
        info!("Using DatabaseStorage at {}", db_path.display());
        Arc::new(DatabaseStorage::new_file(&db_path).expect("create db (file)"))
    };
    let files: Arc<dyn Storage> = if env::var("CLUEHUNT_FILE_STORAGE_DIR").is_ok() {
        info!("Using FileStorage::new_default() with CLUEHUNT_FILE_STORAGE_DIR");
        Arc::new(FileStorage::new_default().expect("create file storage (env)"))
    } else {
        info!("Using FileStorage rooted at {}", out_dir.display());
        Arc::new(FileStorage::new(&out_dir).expect("create file storage (dir)"))
    };

    let from_db = play("db", db.clone());
    let from_fs = play("fs", files.clone());

    let json_path = out_dir.join("released_session.json");
    fs::write(&json_path, &from_db).expect("write session json");
    info!("Released session written to {}", json_path.display());
    if from_db.len() != from_fs.len() {
        warn!(
            "DB and FS documents differ in size (DB={}, FS={})",
            from_db.len(),
            from_fs.len()
        );
    }

    info!(
        "Total sessions -> DB: {}, FS: {}",
        db.get_sessions(None).expect("list db").len(),
        files.get_sessions(None).expect("list fs").len()
    );
}
