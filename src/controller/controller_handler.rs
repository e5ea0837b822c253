use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::configuration::config::Config;
use crate::configuration::types::StorageBackend;
use crate::error_handling::types::*;
use crate::session_management::facilitator::Authenticator;
use crate::session_management::session_manager::SessionManager;
use crate::storage::database_storage::DatabaseStorage;
use crate::storage::file_storage::FileStorage;
use crate::storage::memory_storage::MemoryStorage;
use crate::storage::storage_trait::Storage;
use crate::web_interface::WebServer;

/// File name used when the database path names a directory.
const DEFAULT_DB_FILE: &str = "cluehunt.sqlite3";

/// How often the retention sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Wires configuration, storage, the session manager and the HTTP surface.
pub struct Controller {
    pub config: Config,
    manager: Arc<SessionManager>,
    auth: Arc<Authenticator>,
    shutdown: CancellationToken,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate().map_err(ControllerError::ConfigurationError)?;
        let storage = open_storage(&config)?;

        let manager = SessionManager::new(storage)
            .policy(config.gate_policy())
            .max_team_count(config.max_team_count)
            .mission_defaults(config.mission_defaults())
            .catalog(config.clue_catalog())
            .draft_flush_delay(config.draft_flush_delay());
        let auth = Authenticator::new(config.facilitator_token.clone());
        info!(
            "Controller ready: {} clue(s), up to {} teams, gates {}",
            manager.clues().len(),
            config.max_team_count,
            if config.gates.enforce { "enforced" } else { "advisory" }
        );

        Ok(Self {
            config,
            manager: Arc::new(manager),
            auth: Arc::new(auth),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn manager(&self) -> Arc<SessionManager> {
        self.manager.clone()
    }

    /// Runs the HTTP surface and the retention sweep until Ctrl-C or [`Controller::shutdown`].
    pub async fn run(&self) -> Result<(), ControllerError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(ControllerError::ConfigurationError)?;

        let sweeper = self.config.retention().map(|retention| {
            let manager = self.manager.clone();
            let token = self.shutdown.clone();
            tokio::spawn(retention_sweep(manager, retention, token))
        });

        let signal_token = self.shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received");
                    signal_token.cancel();
                }
                Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
            }
        });

        let web = WebServer::new(self.manager.clone(), self.auth.clone());
        let result = web.serve(addr, self.shutdown.clone()).await;
        self.shutdown.cancel();
        if let Some(handle) = sweeper {
            if let Err(e) = handle.await {
                error!("Retention sweep task failed: {}", e);
            }
        }
        result.map_err(ControllerError::WebError)
    }

    pub fn shutdown(&self) {
        info!("Shutting down");
        self.shutdown.cancel();
    }
}

fn open_storage(config: &Config) -> Result<Arc<dyn Storage>, ControllerError> {
    let path = &config.storage.path;
    let storage: Arc<dyn Storage> = match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage; sessions are lost on exit");
            Arc::new(MemoryStorage::new())
        }
        StorageBackend::File => {
            info!("Using file storage at {}", path.display());
            Arc::new(FileStorage::new(path).map_err(ControllerError::StorageError)?)
        }
        StorageBackend::Database => {
            let file = database_file(path);
            info!("Using SQLite storage at {}", file.display());
            Arc::new(DatabaseStorage::new_file(&file).map_err(ControllerError::StorageError)?)
        }
    };
    Ok(storage)
}

fn database_file(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.join(DEFAULT_DB_FILE)
    }
}

async fn retention_sweep(
    manager: Arc<SessionManager>,
    retention: chrono::Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Retention sweep stopped");
                return;
            }
            _ = ticker.tick() => {
                let manager = manager.clone();
                let sweep = move || manager.cleanup_old_sessions(retention);
                match tokio::task::spawn_blocking(sweep).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!("Retention sweep failed: {}", e),
                    Err(e) => error!("Retention sweep panicked: {}", e),
                }
            }
        }
    }
}
