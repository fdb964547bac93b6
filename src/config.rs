//! Load-time configuration
//!
//! All knobs come from the environment, with defaults suited to a local
//! Ollama install. Nothing here is runtime-mutable.

use crate::budget::ContextWindowTable;
use crate::state_machine::AgentRoster;

pub struct Config {
    pub db_path: String,
    pub ollama_url: String,
    pub roster: AgentRoster,
    pub windows: ContextWindowTable,
}

impl Config {
    pub fn from_env() -> Self {
        let db_path = std::env::var("CODECOLLAB_DB_PATH").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            format!("{home}/.codecollab/conversations.db")
        });

        let ollama_url =
            std::env::var("OLLAMA_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());

        let models = available_models();
        let roster = AgentRoster::new(
            std::env::var("CODECOLLAB_MAIN_MODEL").unwrap_or_else(|_| models[0].to_string()),
            std::env::var("CODECOLLAB_HELPER1_MODEL").unwrap_or_else(|_| models[1].to_string()),
            std::env::var("CODECOLLAB_HELPER2_MODEL").unwrap_or_else(|_| models[2].to_string()),
        );

        Self {
            db_path,
            ollama_url,
            roster,
            windows: default_context_windows(),
        }
    }
}

/// Models selectable for the roster.
pub fn available_models() -> &'static [&'static str] {
    &["qwen2.5-coder:latest", "qwen3:4b", "gemma3:4b"]
}

/// Context windows for the models we ship defaults for. Models absent from
/// this table are treated as unbounded by the budget controller.
pub fn default_context_windows() -> ContextWindowTable {
    ContextWindowTable::new()
        .with_window("qwen3:4b", 40_000)
        .with_window("qwen2.5-coder:latest", 32_000)
        .with_window("gemma3:4b", 128_000)
}
