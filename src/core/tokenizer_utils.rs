/*
 * This module provides the token-counting collaborator used to annotate a
 * packed document with an approximate token budget.
 * `TokenCounterOperations` abstracts the tokenizer; `CoreTikTokenCounter` uses
 * `tiktoken-rs` with the `cl100k_base` encoding, `SimpleWhitespaceTokenCounter`
 * gives a rough word count, and `DisabledTokenCounter` reports no count at all.
 * A count of `None` means the tokenizer is unavailable; callers omit the count
 * rather than fail.
 */
use serde::{Deserialize, Serialize};
use tiktoken_rs::{CoreBPE, cl100k_base};

pub trait TokenCounterOperations: Send + Sync {
    /*
     * Counts the tokens in `text`, or returns `None` if the tokenizer cannot be
     * used. The definition of a "token" depends on the implementation.
     */
    fn count_tokens(&self, text: &str) -> Option<usize>;
}

/// Which tokenizer a session should use; persisted in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    #[default]
    Cl100k,
    Whitespace,
    Disabled,
}

pub fn create_token_counter(kind: TokenizerKind) -> Box<dyn TokenCounterOperations> {
    match kind {
        TokenizerKind::Cl100k => Box::new(CoreTikTokenCounter::new()),
        TokenizerKind::Whitespace => Box::new(SimpleWhitespaceTokenCounter::new()),
        TokenizerKind::Disabled => Box::new(DisabledTokenCounter),
    }
}

/*
 * Counts tokens with the `cl100k_base` BPE model, as used by GPT-3.5 and GPT-4.
 * The model is built once, when the counter is created. If it cannot be
 * initialized the failure is logged and every count is reported as
 * unavailable.
 */
pub struct CoreTikTokenCounter {
    bpe: Option<CoreBPE>,
}

impl CoreTikTokenCounter {
    pub fn new() -> Self {
        let bpe = match cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                log::error!("TokenCounter: Failed to initialize cl100k_base BPE: {e:?}");
                None
            }
        };
        CoreTikTokenCounter { bpe }
    }
}

impl Default for CoreTikTokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounterOperations for CoreTikTokenCounter {
    fn count_tokens(&self, text: &str) -> Option<usize> {
        self.bpe
            .as_ref()
            .map(|bpe| bpe.encode_with_special_tokens(text).len())
    }
}

/// Estimates tokens as whitespace-separated words.
pub struct SimpleWhitespaceTokenCounter;

impl SimpleWhitespaceTokenCounter {
    pub fn new() -> Self {
        SimpleWhitespaceTokenCounter
    }
}

impl Default for SimpleWhitespaceTokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounterOperations for SimpleWhitespaceTokenCounter {
    fn count_tokens(&self, text: &str) -> Option<usize> {
        Some(text.split_whitespace().count())
    }
}

pub struct DisabledTokenCounter;

impl TokenCounterOperations for DisabledTokenCounter {
    fn count_tokens(&self, _text: &str) -> Option<usize> {
        None
    }
}
