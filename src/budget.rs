//! Context budget control
//!
//! A coarse guard against submitting a prompt that likely exceeds a model's
//! usable context window. This is an approximation, not a tokenizer.

use std::collections::HashMap;

/// Model id -> maximum context window in tokens. Static configuration;
/// models absent from the table are treated as unbounded.
#[derive(Debug, Clone, Default)]
pub struct ContextWindowTable {
    windows: HashMap<String, usize>,
}

impl ContextWindowTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_window(mut self, model: impl Into<String>, tokens: usize) -> Self {
        self.windows.insert(model.into(), tokens);
        self
    }

    pub fn get(&self, model: &str) -> Option<usize> {
        self.windows.get(model).copied()
    }
}

/// Approximate token count: one token per four characters, rounded down.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// True iff the prompt's estimated size exceeds 80% of the model's declared
/// window. The margin leaves room for the model's own reply. Models absent
/// from the table are never over budget.
pub fn exceeds_budget(prompt: &str, model: &str, table: &ContextWindowTable) -> bool {
    match table.get(model) {
        // tokens > 0.8 * window, kept exact in integers: 5*tokens > 4*window
        Some(window) => 5 * estimate_tokens(prompt) > 4 * window,
        None => false,
    }
}
