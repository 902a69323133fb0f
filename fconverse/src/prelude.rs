//! Common imports for most fconverse applications.

pub use crate::{
    RuntimeBundle, Settings, SetupError, build_provider, build_provider_registry, build_runtime,
    build_runtime_with, function_runtime, observed_dispatcher, parse_provider_id,
};
pub use crate::{fc_transcript, fc_turn};
pub use fchat::prelude::*;
pub use fmemory::{
    HistoryRole, HistoryStore, HistoryWindow, InMemoryHistoryStore, PersistHistory,
    SeedFromHistory, SqliteHistoryStore,
};
pub use fprovider::{ModelProvider, ProviderId, ProviderRegistry};
