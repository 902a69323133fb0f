use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fcommon::BoxFuture;
use rusqlite::{Connection, params};

use crate::backend::{HistoryStore, token_cost, validate_owner};
use crate::error::MemoryError;
use crate::tokenizer::Tokenizer;
use crate::types::{HistoryRole, PersistedMessage};

pub struct SqliteHistoryStore {
    connection: Mutex<Connection>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl SqliteHistoryStore {
    pub fn new(path: impl AsRef<Path>, tokenizer: Arc<dyn Tokenizer>) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|error| {
                MemoryError::storage(format!(
                    "failed to create sqlite parent directory: {error}"
                ))
            })?;
        }

        let connection = Connection::open(path).map_err(|error| {
            MemoryError::storage(format!("failed to open sqlite database: {error}"))
        })?;
        Self::with_connection(connection, tokenizer)
    }

    pub fn new_in_memory(tokenizer: Arc<dyn Tokenizer>) -> Result<Self, MemoryError> {
        let connection = Connection::open_in_memory().map_err(|error| {
            MemoryError::storage(format!("failed to open in-memory sqlite database: {error}"))
        })?;
        Self::with_connection(connection, tokenizer)
    }

    fn with_connection(
        connection: Connection,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self, MemoryError> {
        connection
            .busy_timeout(Duration::from_secs(5))
            .map_err(|error| {
                MemoryError::storage(format!("failed to configure sqlite busy timeout: {error}"))
            })?;
        let store = Self {
            connection: Mutex::new(connection),
            tokenizer,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>, MemoryError> {
        self.connection
            .lock()
            .map_err(|_| MemoryError::storage("sqlite history store lock poisoned"))
    }

    fn initialize_schema(&self) -> Result<(), MemoryError> {
        let conn = self.connection()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS history_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                token_cost INTEGER NOT NULL,
                created_at_secs INTEGER NOT NULL,
                created_at_nanos INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_owner_created
            ON history_messages(owner, created_at_secs, created_at_nanos, id);
            ",
        )
        .map_err(|error| MemoryError::storage(format!("failed to initialize schema: {error}")))
    }
}

impl std::fmt::Debug for SqliteHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteHistoryStore").finish_non_exhaustive()
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn load_messages<'a>(
        &'a self,
        owner: &'a str,
    ) -> BoxFuture<'a, Result<Vec<PersistedMessage>, MemoryError>> {
        Box::pin(async move {
            validate_owner(owner)?;
            let conn = self.connection()?;
            let mut stmt = conn
                .prepare(
                    "
                    SELECT id, role, content, token_cost, created_at_secs, created_at_nanos
                    FROM history_messages
                    WHERE owner = ?1
                    ORDER BY created_at_secs ASC, created_at_nanos ASC, id ASC
                    ",
                )
                .map_err(|error| {
                    MemoryError::storage(format!("failed to prepare history query: {error}"))
                })?;
            let rows = stmt
                .query_map(params![owner], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                })
                .map_err(|error| {
                    MemoryError::storage(format!("failed to query history rows: {error}"))
                })?;

            let mut messages = Vec::new();
            for row in rows {
                let (id, role, content, token_cost, secs, nanos) = row.map_err(|error| {
                    MemoryError::storage(format!("failed to read history row: {error}"))
                })?;
                messages.push(PersistedMessage {
                    role: HistoryRole::parse(&role)?,
                    content,
                    token_cost,
                    created_at: decode_system_time(secs, nanos)?,
                    sequence: decode_sequence(id)?,
                });
            }
            Ok(messages)
        })
    }

    fn append_message<'a>(
        &'a self,
        owner: &'a str,
        role: HistoryRole,
        content: String,
    ) -> BoxFuture<'a, Result<PersistedMessage, MemoryError>> {
        Box::pin(async move {
            validate_owner(owner)?;
            let token_cost = token_cost(self.tokenizer.as_ref(), &content);
            let created_at = SystemTime::now();
            let (secs, nanos) = encode_system_time(created_at)?;

            let conn = self.connection()?;
            conn.execute(
                "
                INSERT INTO history_messages
                    (owner, role, content, token_cost, created_at_secs, created_at_nanos)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
                params![owner, role.as_str(), content, token_cost, secs, nanos],
            )
            .map_err(|error| {
                MemoryError::storage(format!("failed to append history message: {error}"))
            })?;

            Ok(PersistedMessage {
                role,
                content,
                token_cost,
                created_at,
                sequence: decode_sequence(conn.last_insert_rowid())?,
            })
        })
    }
}

fn encode_system_time(value: SystemTime) -> Result<(i64, i64), MemoryError> {
    let duration = value.duration_since(UNIX_EPOCH).map_err(|error| {
        MemoryError::invalid_request(format!("timestamp predates unix epoch: {error}"))
    })?;
    Ok((
        duration.as_secs() as i64,
        i64::from(duration.subsec_nanos()),
    ))
}

fn decode_system_time(seconds: i64, nanos: i64) -> Result<SystemTime, MemoryError> {
    if seconds < 0 {
        return Err(MemoryError::storage(format!(
            "timestamp seconds must be non-negative, got {seconds}"
        )));
    }
    if !(0..1_000_000_000).contains(&nanos) {
        return Err(MemoryError::storage(format!(
            "timestamp nanos must be in [0, 1_000_000_000), got {nanos}"
        )));
    }
    Ok(UNIX_EPOCH + Duration::new(seconds as u64, nanos as u32))
}

fn decode_sequence(id: i64) -> Result<u64, MemoryError> {
    u64::try_from(id)
        .map_err(|_| MemoryError::storage(format!("history row id must be positive, got {id}")))
}

pub(crate) fn default_sqlite_path() -> PathBuf {
    if let Some(explicit) = std::env::var_os("FMEMORY_SQLITE_PATH") {
        return PathBuf::from(explicit);
    }

    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        return PathBuf::from(home).join(".fconverse").join("history.sqlite3");
    }

    PathBuf::from("history.sqlite3")
}
