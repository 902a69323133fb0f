//! Token-budgeted selection of the most recent persisted messages.

use fchat::{ChatDefaults, Turn};

use crate::types::PersistedMessage;

/// Returns the longest run of most-recent messages whose summed token cost
/// fits in `budget_tokens`, in chronological order.
///
/// The scan stops at the first message that would overflow the budget, so
/// the result is always a contiguous tail of the history.
///
/// ```rust
/// use std::time::UNIX_EPOCH;
/// use fmemory::{HistoryRole, PersistedMessage, select_window};
///
/// let history = vec![
///     PersistedMessage::new(HistoryRole::User, "a", 1, UNIX_EPOCH, 1),
///     PersistedMessage::new(HistoryRole::Assistant, "b", 2, UNIX_EPOCH, 2),
///     PersistedMessage::new(HistoryRole::User, "c", 4, UNIX_EPOCH, 3),
/// ];
/// assert_eq!(select_window(&history, 6).len(), 2);
/// ```
pub fn select_window(messages: &[PersistedMessage], budget_tokens: i64) -> Vec<Turn> {
    if budget_tokens <= 0 || messages.is_empty() {
        return Vec::new();
    }

    let mut ordered = messages.iter().collect::<Vec<_>>();
    ordered.sort_by(|left, right| {
        left.created_at
            .cmp(&right.created_at)
            .then(left.sequence.cmp(&right.sequence))
    });

    let mut total = 0_i64;
    let mut start = ordered.len();
    for (index, message) in ordered.iter().enumerate().rev() {
        let next = total.saturating_add(message.token_cost);
        if next > budget_tokens {
            break;
        }
        total = next;
        start = index;
    }

    ordered[start..]
        .iter()
        .map(|message| message.to_turn())
        .collect()
}

/// History budget declared for one kind of conversation. Unset budgets fall
/// back to [`ChatDefaults::history_max_tokens`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryWindow {
    max_tokens: Option<i64>,
}

impl HistoryWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: i64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn max_tokens(&self) -> Option<i64> {
        self.max_tokens
    }

    pub fn budget(&self, defaults: &ChatDefaults) -> i64 {
        self.max_tokens.unwrap_or(defaults.history_max_tokens)
    }

    pub fn select(&self, messages: &[PersistedMessage], defaults: &ChatDefaults) -> Vec<Turn> {
        select_window(messages, self.budget(defaults))
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use fchat::DEFAULT_HISTORY_MAX_TOKENS;

    use super::*;
    use crate::types::HistoryRole;

    fn message(content: &str, cost: i64, sequence: u64) -> PersistedMessage {
        PersistedMessage::new(HistoryRole::User, content, cost, UNIX_EPOCH, sequence)
    }

    fn contents(turns: &[Turn]) -> Vec<&str> {
        turns.iter().filter_map(Turn::content).collect()
    }

    fn history() -> Vec<PersistedMessage> {
        vec![message("m1", 1, 1), message("m2", 2, 2), message("m3", 4, 3)]
    }

    #[test]
    fn keeps_the_trailing_run_that_fits() {
        assert_eq!(contents(&select_window(&history(), 6)), vec!["m2", "m3"]);
        assert_eq!(
            contents(&select_window(&history(), 30)),
            vec!["m1", "m2", "m3"]
        );
    }

    #[test]
    fn non_positive_budgets_select_nothing() {
        assert!(select_window(&history(), 0).is_empty());
        assert!(select_window(&history(), -5).is_empty());
    }

    #[test]
    fn stops_at_first_overflow_instead_of_skipping() {
        let messages = vec![message("small", 1, 1), message("huge", 50, 2), message("last", 3, 3)];

        assert_eq!(contents(&select_window(&messages, 10)), vec!["last"]);
    }

    #[test]
    fn oversized_latest_message_empties_the_window() {
        let messages = vec![message("a", 1, 1), message("b", 9, 2)];

        assert!(select_window(&messages, 5).is_empty());
    }

    #[test]
    fn input_is_reordered_by_creation_then_sequence() {
        let later = UNIX_EPOCH + Duration::from_secs(10);
        let messages = vec![
            PersistedMessage::new(HistoryRole::Assistant, "newest", 1, later, 1),
            message("tie-second", 1, 3),
            message("tie-first", 1, 2),
        ];

        assert_eq!(
            contents(&select_window(&messages, 100)),
            vec!["tie-first", "tie-second", "newest"]
        );
        assert_eq!(select_window(&messages, 100)[2], Turn::assistant("newest"));
    }

    #[test]
    fn window_budget_falls_back_to_defaults() {
        let defaults = ChatDefaults::default();

        assert_eq!(HistoryWindow::new().budget(&defaults), DEFAULT_HISTORY_MAX_TOKENS);
        assert_eq!(
            HistoryWindow::new()
                .with_max_tokens(6)
                .select(&history(), &defaults)
                .len(),
            2
        );
        assert_eq!(
            HistoryWindow::new().budget(&defaults.with_history_max_tokens(42)),
            42
        );
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        fn tail_cost(costs: &[i64], len: usize) -> i64 {
            costs[costs.len() - len..].iter().sum()
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            #[test]
            fn window_is_the_longest_fitting_tail(
                costs in prop::collection::vec(1_i64..=20, 0..30),
                budget in 1_i64..200,
            ) {
                let history = costs
                    .iter()
                    .enumerate()
                    .map(|(index, cost)| message(&format!("m{index}"), *cost, index as u64))
                    .collect::<Vec<_>>();

                let selected = select_window(&history, budget);
                let len = selected.len();
                let expected = (costs.len() - len..costs.len())
                    .map(|index| format!("m{index}"))
                    .collect::<Vec<_>>();

                prop_assert_eq!(contents(&selected), expected);
                prop_assert!(tail_cost(&costs, len) <= budget);
                if len < costs.len() {
                    prop_assert!(tail_cost(&costs, len + 1) > budget);
                }
            }

            #[test]
            fn non_positive_budget_selects_nothing(
                costs in prop::collection::vec(0_i64..=20, 0..10),
                budget in -50_i64..=0,
            ) {
                let history = costs
                    .iter()
                    .enumerate()
                    .map(|(index, cost)| message("m", *cost, index as u64))
                    .collect::<Vec<_>>();

                prop_assert!(select_window(&history, budget).is_empty());
            }
        }
    }
}
