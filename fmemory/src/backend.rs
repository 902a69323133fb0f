//! History store trait and in-memory store implementation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use fcommon::BoxFuture;

use crate::backends::sqlite::default_sqlite_path;
use crate::error::MemoryError;
use crate::tokenizer::{TiktokenTokenizer, Tokenizer};
use crate::types::{HistoryRole, PersistedMessage};

pub use crate::backends::sqlite::SqliteHistoryStore;

/// Durable per-owner message log. Owners are opaque keys chosen by the host
/// application (a user id, a ticket number, ...).
pub trait HistoryStore: Send + Sync {
    /// Every message for `owner`, ordered by `(created_at, sequence)`.
    fn load_messages<'a>(
        &'a self,
        owner: &'a str,
    ) -> BoxFuture<'a, Result<Vec<PersistedMessage>, MemoryError>>;

    /// Appends one message, computing and recording its token cost.
    fn append_message<'a>(
        &'a self,
        owner: &'a str,
        role: HistoryRole,
        content: String,
    ) -> BoxFuture<'a, Result<PersistedMessage, MemoryError>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryStoreConfig {
    Sqlite { path: PathBuf },
    InMemory,
}

impl Default for HistoryStoreConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

pub fn create_history_store(
    config: HistoryStoreConfig,
    tokenizer: Arc<dyn Tokenizer>,
) -> Result<Arc<dyn HistoryStore>, MemoryError> {
    match config {
        HistoryStoreConfig::Sqlite { path } => {
            Ok(Arc::new(SqliteHistoryStore::new(path, tokenizer)?))
        }
        HistoryStoreConfig::InMemory => Ok(Arc::new(InMemoryHistoryStore::new(tokenizer))),
    }
}

/// Default sqlite store with `cl100k_base` token costs.
pub fn create_default_history_store() -> Result<Arc<dyn HistoryStore>, MemoryError> {
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(TiktokenTokenizer::cl100k()?);
    create_history_store(HistoryStoreConfig::default(), tokenizer)
}

pub(crate) fn validate_owner(owner: &str) -> Result<(), MemoryError> {
    if owner.trim().is_empty() {
        return Err(MemoryError::invalid_request("history owner must not be empty"));
    }
    Ok(())
}

pub(crate) fn token_cost(tokenizer: &dyn Tokenizer, content: &str) -> i64 {
    i64::try_from(tokenizer.count_tokens(content)).unwrap_or(i64::MAX)
}

pub struct InMemoryHistoryStore {
    tokenizer: Arc<dyn Tokenizer>,
    owners: Mutex<OwnerLogs>,
}

#[derive(Debug, Default)]
struct OwnerLogs {
    messages: HashMap<String, Vec<PersistedMessage>>,
    next_sequence: u64,
}

impl InMemoryHistoryStore {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer,
            owners: Mutex::new(OwnerLogs::default()),
        }
    }
}

impl std::fmt::Debug for InMemoryHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryHistoryStore").finish_non_exhaustive()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn load_messages<'a>(
        &'a self,
        owner: &'a str,
    ) -> BoxFuture<'a, Result<Vec<PersistedMessage>, MemoryError>> {
        Box::pin(async move {
            validate_owner(owner)?;
            let owners = self
                .owners
                .lock()
                .map_err(|_| MemoryError::storage("history store lock poisoned"))?;

            let mut messages = owners.messages.get(owner).cloned().unwrap_or_default();
            messages.sort_by(|left, right| {
                left.created_at
                    .cmp(&right.created_at)
                    .then(left.sequence.cmp(&right.sequence))
            });
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
            let mut owners = self
                .owners
                .lock()
                .map_err(|_| MemoryError::storage("history store lock poisoned"))?;

            owners.next_sequence += 1;
            let message = PersistedMessage::new(
                role,
                content,
                token_cost,
                SystemTime::now(),
                owners.next_sequence,
            );
            owners
                .messages
                .entry(owner.to_string())
                .or_default()
                .push(message.clone());
            Ok(message)
        })
    }
}
