//! Token counting for persisted history.

use std::sync::{Arc, OnceLock};

use tiktoken_rs::CoreBPE;

use crate::error::MemoryError;

/// Counts tokens in message content. Costs are computed once, when a message
/// is written, and stored alongside it.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

static CL100K_BASE: OnceLock<Arc<CoreBPE>> = OnceLock::new();

/// `cl100k_base` byte-pair encoding, shared across instances.
#[derive(Clone)]
pub struct TiktokenTokenizer {
    bpe: Arc<CoreBPE>,
}

impl TiktokenTokenizer {
    pub fn cl100k() -> Result<Self, MemoryError> {
        if let Some(bpe) = CL100K_BASE.get() {
            return Ok(Self {
                bpe: Arc::clone(bpe),
            });
        }

        let bpe = tiktoken_rs::cl100k_base().map_err(|error| {
            MemoryError::tokenizer(format!("failed to load cl100k_base encoding: {error}"))
        })?;
        let bpe = CL100K_BASE.get_or_init(|| Arc::new(bpe));
        Ok(Self {
            bpe: Arc::clone(bpe),
        })
    }
}

impl std::fmt::Debug for TiktokenTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenTokenizer")
            .field("encoding", &"cl100k_base")
            .finish()
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_with_special_tokens(text).len()
    }
}
