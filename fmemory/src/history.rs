//! Seeding chat sessions from persisted history and writing new turns back.

use fchat::{ChatError, ChatSession, ChatSessionBuilder, Transcript};
use fcommon::BoxFuture;
use tracing::debug;

use crate::backend::HistoryStore;
use crate::types::HistoryRole;
use crate::window::HistoryWindow;

/// Seeds a session's transcript with the windowed tail of an owner's history.
pub trait SeedFromHistory: Sized {
    fn from_history<'a>(
        self,
        store: &'a dyn HistoryStore,
        owner: &'a str,
        window: HistoryWindow,
    ) -> BoxFuture<'a, Result<Self, ChatError>>
    where
        Self: 'a;
}

impl SeedFromHistory for ChatSessionBuilder {
    fn from_history<'a>(
        self,
        store: &'a dyn HistoryStore,
        owner: &'a str,
        window: HistoryWindow,
    ) -> BoxFuture<'a, Result<Self, ChatError>>
    where
        Self: 'a,
    {
        Box::pin(async move {
            let messages = store.load_messages(owner).await?;
            let budget = window.budget(self.chat_defaults());
            let turns = window.select(&messages, self.chat_defaults());
            debug!(
                owner,
                budget,
                available = messages.len(),
                selected = turns.len(),
                "seeding transcript from history"
            );

            Ok(self.transcript(Transcript::from_turns(turns)?))
        })
    }
}

/// Writes text turns appended since the session was seeded (or last
/// persisted). Function-call turns are not stored. Each successful write
/// advances the session's watermark, so a retry after a failed write
/// resumes where the failure happened.
pub trait PersistHistory {
    fn persist_new_turns<'a>(
        &'a mut self,
        store: &'a dyn HistoryStore,
        owner: &'a str,
    ) -> BoxFuture<'a, Result<usize, ChatError>>;
}

impl PersistHistory for ChatSession {
    fn persist_new_turns<'a>(
        &'a mut self,
        store: &'a dyn HistoryStore,
        owner: &'a str,
    ) -> BoxFuture<'a, Result<usize, ChatError>> {
        Box::pin(async move {
            let start = self.transcript().len() - self.unpersisted_turns().len();
            let pending = self
                .unpersisted_turns()
                .iter()
                .enumerate()
                .filter_map(|(offset, turn)| {
                    let role = HistoryRole::of_turn(turn)?;
                    let content = turn.content()?;
                    Some((start + offset + 1, role, content.to_string()))
                })
                .collect::<Vec<_>>();

            let mut written = 0;
            for (through, role, content) in pending {
                store.append_message(owner, role, content).await?;
                self.mark_persisted_through(through);
                written += 1;
            }
            self.mark_persisted();
            debug!(session_id = %self.id(), owner, written, "persisted new turns");

            Ok(written)
        })
    }
}
