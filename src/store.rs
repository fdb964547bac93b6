//! Durable transcript storage
//!
//! Conversations are keyed by a user-chosen name; saving under an existing
//! name overwrites the previous record.

mod schema;

pub use schema::{Role, Turn, SCHEMA};

use crate::state_machine::SessionState;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("conversation not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Thread-safe handle to the transcript database
#[derive(Clone)]
pub struct TranscriptDb {
    conn: Arc<Mutex<Connection>>,
}

impl TranscriptDb {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Replace the persisted record for `name` with the given turns and state.
    pub fn save_transcript(
        &self,
        name: &str,
        turns: &[Turn],
        state: &SessionState,
    ) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let state_json = serde_json::to_string(state).unwrap();

        tx.execute(
            "INSERT INTO conversations (name, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(name) DO UPDATE SET state = ?2, updated_at = ?3",
            params![name, state_json, now],
        )?;
        tx.execute("DELETE FROM turns WHERE conversation = ?1", params![name])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO turns (conversation, seq, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (seq, turn) in turns.iter().enumerate() {
                #[allow(clippy::cast_possible_wrap)]
                let seq = seq as i64;
                stmt.execute(params![
                    name,
                    seq,
                    turn.role.as_str(),
                    turn.content,
                    turn.created_at.to_rfc3339()
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Load all turns for `name`, oldest first. An unknown name yields an
    /// empty history.
    pub fn load_turns(&self, name: &str) -> StoreResult<Vec<Turn>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT role, content, created_at FROM turns
             WHERE conversation = ?1 ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![name], |row| {
            let role_s: String = row.get(0)?;
            let role = Role::parse(&role_s).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("unknown role: {role_s}").into(),
                )
            })?;
            Ok(Turn {
                role,
                content: row.get(1)?,
                created_at: parse_datetime(&row.get::<_, String>(2)?),
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    /// Read the persisted session state, if a record exists. A state column
    /// that fails to parse is treated as absent so the caller can fall back
    /// to marker-based derivation.
    pub fn stored_state(&self, name: &str) -> StoreResult<Option<SessionState>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT state FROM conversations WHERE name = ?1")?;
        let state_json: Option<String> = stmt
            .query_row(params![name], |row| row.get(0))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        Ok(state_json.and_then(|json| serde_json::from_str(&json).ok()))
    }

    /// Delete a conversation and all its turns
    pub fn delete_conversation(&self, name: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM turns WHERE conversation = ?1", params![name])?;
        let deleted = conn.execute("DELETE FROM conversations WHERE name = ?1", params![name])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(())
    }

    /// Names of all persisted conversations, most recently updated first
    pub fn list_conversations(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT name FROM conversations ORDER BY updated_at DESC, name ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
