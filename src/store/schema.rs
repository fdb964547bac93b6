//! Transcript schema and turn types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL schema for initialization
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    name TEXT PRIMARY KEY,
    state TEXT NOT NULL DEFAULT '{"type":"initial"}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS turns (
    conversation TEXT NOT NULL,
    seq INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,

    PRIMARY KEY (conversation, seq),
    FOREIGN KEY (conversation) REFERENCES conversations(name) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_turns_conversation ON turns(conversation, seq);
"#;

/// Speaker of a recorded turn (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Programmer,
    MainAgent,
    Helper1,
    Helper2,
    System,
}

impl Role {
    /// Stable identifier used in the turns table.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Programmer => "programmer",
            Role::MainAgent => "main_agent",
            Role::Helper1 => "helper1",
            Role::Helper2 => "helper2",
            Role::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "programmer" => Some(Role::Programmer),
            "main_agent" => Some(Role::MainAgent),
            "helper1" => Some(Role::Helper1),
            "helper2" => Some(Role::Helper2),
            "system" => Some(Role::System),
            _ => None,
        }
    }

    /// Name shown in rendered history and exports.
    pub fn display_name(self) -> &'static str {
        match self {
            Role::Programmer => "Programmer",
            Role::MainAgent => "Main Developer",
            Role::Helper1 => "Helper 1",
            Role::Helper2 => "Helper 2",
            Role::System => "System",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One immutable message in a conversation.
///
/// History is append-only; a turn is never edited after it is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
