use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, error, info};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database,
    DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set, TransactionTrait,
};

use crate::error_handling::types::StorageError;
use crate::session_management::session::Session;
use crate::storage::db_entities as sessions;
use crate::storage::storage_trait::Storage;
use crate::storage::subscription::{SessionWatch, SubscriptionHub};
use crate::storage::types::{apply_patch, PatchOp, SessionFilter};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS sessions (
    code TEXT PRIMARY KEY NOT NULL,
    group_name TEXT NOT NULL,
    is_open INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    document TEXT NOT NULL
);";

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn read_err(context: &str, e: DbErr) -> StorageError {
    error!("{}: {}", context, e);
    StorageError::ReadFailed
}

fn write_err(context: &str, e: DbErr) -> StorageError {
    error!("{}: {}", context, e);
    StorageError::WriteFailed
}

fn decode(model: &sessions::Model) -> Result<Session, StorageError> {
    serde_json::from_str(&model.document).map_err(|e| {
        error!("Invalid session document for {}: {}", model.code, e);
        StorageError::ReadFailed
    })
}

fn encode(session: &Session) -> Result<String, StorageError> {
    serde_json::to_string(session).map_err(|e| {
        error!("Failed to serialize session {}: {}", session.id, e);
        StorageError::WriteFailed
    })
}

/// SQLite backend through SeaORM.
///
/// Owns a private current-thread runtime and blocks on it, so it must be
/// called from synchronous code or from `spawn_blocking`, never directly
/// from an async task.
pub struct DatabaseStorage {
    rt: tokio::runtime::Runtime,
    db: DatabaseConnection,
    // serialises read-modify-write cycles
    write_lock: Mutex<()>,
    hub: SubscriptionHub,
}

impl DatabaseStorage {
    /// Default database filename used in the application's working directory
    const DEFAULT_DB_FILE: &'static str = "cluehunt.sqlite3";

    /// Open the database at CLUEHUNT_DB_PATH, or the default file in the working directory
    pub fn new() -> Result<Self, StorageError> {
        let path = match env::var("CLUEHUNT_DB_PATH") {
            Ok(p) => PathBuf::from(p),
            Err(_) => env::current_dir()
                .map_err(|_| StorageError::ConnectionFailed)?
                .join(Self::DEFAULT_DB_FILE),
        };
        Self::new_file(path)
    }

    pub fn new_file<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|_| StorageError::ConnectionFailed)?;
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            std::fs::create_dir_all(parent).map_err(|_| StorageError::WriteFailed)?;
        }
        let url = format!("sqlite://{}?mode=rwc", path_ref.display());
        let db = rt.block_on(async {
            let mut opts = ConnectOptions::new(url);
            opts.max_connections(5).sqlx_logging(false);
            let db = Database::connect(opts).await.map_err(|e| {
                error!("Failed to open database {}: {}", path_ref.display(), e);
                StorageError::ConnectionFailed
            })?;
            db.execute_unprepared(SCHEMA)
                .await
                .map_err(|e| write_err("Failed to create schema", e))?;
            Ok::<_, StorageError>(db)
        })?;
        info!("DatabaseStorage initialized at {}", path_ref.display());
        Ok(Self {
            rt,
            db,
            write_lock: Mutex::new(()),
            hub: SubscriptionHub::new(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        self.write_lock.lock().map_err(|_| {
            error!("DatabaseStorage write lock poisoned");
            StorageError::ConnectionFailed
        })
    }

    async fn find(
        conn: &impl ConnectionTrait,
        code: &str,
    ) -> Result<Option<sessions::Model>, StorageError> {
        sessions::Entity::find_by_id(code.to_string())
            .one(conn)
            .await
            .map_err(|e| read_err("Failed to load session", e))
    }
}

impl Storage for DatabaseStorage {
    fn create_session(&self, session: &Session) -> Result<(), StorageError> {
        let document = encode(session)?;
        let _guard = self.lock()?;
        self.rt.block_on(async {
            let txn = self
                .db
                .begin()
                .await
                .map_err(|e| write_err("Failed to begin transaction", e))?;
            if Self::find(&txn, &session.id).await?.is_some() {
                return Err(StorageError::AlreadyExists(session.id.clone()));
            }
            let row = sessions::ActiveModel {
                code: Set(session.id.clone()),
                group_name: Set(session.group_name.clone()),
                is_open: Set(session.is_open),
                created_at: Set(timestamp(session.created_at)),
                document: Set(document),
            };
            sessions::Entity::insert(row)
                .exec_without_returning(&txn)
                .await
                .map_err(|e| write_err("Failed to insert session", e))?;
            txn.commit()
                .await
                .map_err(|e| write_err("Failed to commit session insert", e))
        })?;
        self.hub.publish(&session.id, Some(session.clone()));
        info!("Created session {} in database", session.id);
        Ok(())
    }

    fn get_session(&self, code: &str) -> Result<Option<Session>, StorageError> {
        self.rt.block_on(async {
            match Self::find(&self.db, code).await? {
                Some(model) => decode(&model).map(Some),
                None => Ok(None),
            }
        })
    }

    fn get_sessions(&self, filter: Option<SessionFilter>) -> Result<Vec<Session>, StorageError> {
        let rows = self.rt.block_on(async {
            let mut query = sessions::Entity::find();
            if let Some(ref f) = filter {
                if f.open_only {
                    query = query.filter(sessions::Column::IsOpen.eq(true));
                }
                if let Some(ref name) = f.group_name {
                    query = query.filter(sessions::Column::GroupName.eq(name.clone()));
                }
            }
            query
                .all(&self.db)
                .await
                .map_err(|e| read_err("Failed to list sessions", e))
        })?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let session = decode(row)?;
            if filter.as_ref().map_or(true, |f| f.matches(&session)) {
                out.push(session);
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!("Loaded {} session row(s), {} after filter", rows.len(), out.len());
        Ok(out)
    }

    fn patch_session(&self, code: &str, ops: &[PatchOp]) -> Result<Session, StorageError> {
        let _guard = self.lock()?;
        let session = self.rt.block_on(async {
            let txn = self
                .db
                .begin()
                .await
                .map_err(|e| write_err("Failed to begin transaction", e))?;
            let model = Self::find(&txn, code)
                .await?
                .ok_or_else(|| StorageError::NotFound(code.to_string()))?;
            let mut session = decode(&model)?;
            apply_patch(&mut session, ops);
            let mut row: sessions::ActiveModel = model.into();
            row.is_open = Set(session.is_open);
            row.document = Set(encode(&session)?);
            row.update(&txn)
                .await
                .map_err(|e| write_err("Failed to update session", e))?;
            txn.commit()
                .await
                .map_err(|e| write_err("Failed to commit session update", e))?;
            Ok::<_, StorageError>(session)
        })?;
        self.hub.publish(code, Some(session.clone()));
        debug!("Patched session {} with {} op(s)", code, ops.len());
        Ok(session)
    }

    fn delete_session(&self, code: &str) -> Result<bool, StorageError> {
        let _guard = self.lock()?;
        let res = self.rt.block_on(async {
            sessions::Entity::delete_by_id(code.to_string())
                .exec(&self.db)
                .await
                .map_err(|e| write_err("Failed to delete session", e))
        })?;
        let existed = res.rows_affected > 0;
        if existed {
            self.hub.publish(code, None);
            info!("Deleted session {} from database", code);
        }
        Ok(existed)
    }

    fn subscribe(&self, code: &str) -> Result<SessionWatch, StorageError> {
        let current = self.get_session(code)?;
        Ok(self.hub.subscribe(code, current))
    }

    fn cleanup_old_sessions(&self, older_than: DateTime<Utc>) -> Result<usize, StorageError> {
        let cutoff = timestamp(older_than);
        let _guard = self.lock()?;
        let stale = self.rt.block_on(async {
            let rows = sessions::Entity::find()
                .filter(sessions::Column::CreatedAt.lt(cutoff.clone()))
                .all(&self.db)
                .await
                .map_err(|e| read_err("Failed to select old sessions", e))?;
            sessions::Entity::delete_many()
                .filter(sessions::Column::CreatedAt.lt(cutoff.clone()))
                .exec(&self.db)
                .await
                .map_err(|e| write_err("Failed to delete old sessions", e))?;
            Ok::<_, StorageError>(rows)
        })?;
        for row in &stale {
            self.hub.publish(&row.code, None);
        }
        info!("Removed {} old session(s) (cutoff: {})", stale.len(), cutoff);
        Ok(stale.len())
    }
}
