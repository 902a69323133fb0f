//! Persisted conversation history: token-costed message stores, budgeted
//! window selection, and session seeding/persistence for fchat.
//!
//! ```rust
//! use std::time::UNIX_EPOCH;
//! use fmemory::prelude::*;
//!
//! let history = vec![
//!     PersistedMessage::new(HistoryRole::User, "hello", 3, UNIX_EPOCH, 1),
//!     PersistedMessage::new(HistoryRole::Assistant, "hi there", 5, UNIX_EPOCH, 2),
//! ];
//! let turns = HistoryWindow::new().with_max_tokens(5).select(&history, &Default::default());
//! assert_eq!(turns.len(), 1);
//! ```

mod backend;
mod backends;
mod error;
mod history;
mod tokenizer;
mod types;
mod window;

pub mod prelude {
    pub use crate::{
        HistoryRole, HistoryStore, HistoryStoreConfig, HistoryWindow, InMemoryHistoryStore,
        MemoryError, MemoryErrorKind, PersistHistory, PersistedMessage, SeedFromHistory,
        SqliteHistoryStore, TiktokenTokenizer, Tokenizer, create_default_history_store,
        create_history_store, select_window,
    };
}

pub use backend::{
    HistoryStore, HistoryStoreConfig, InMemoryHistoryStore, SqliteHistoryStore,
    create_default_history_store, create_history_store,
};
pub use error::{MemoryError, MemoryErrorKind};
pub use history::{PersistHistory, SeedFromHistory};
pub use tokenizer::{TiktokenTokenizer, Tokenizer};
pub use types::{HistoryRole, PersistedMessage};
pub use window::{HistoryWindow, select_window};
