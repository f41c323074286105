use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use speakflow_schema::{Conversation, ConversationDefaults, ConversationMessage, Language};
use tokio::task;

use crate::migrations::run_migrations;

/// Append-only per-session message log.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Conversation>>;

    /// Creates the conversation from `defaults` when absent, then appends
    /// `messages` in order and bumps `updated_at`. Atomic per session id:
    /// concurrent calls never create duplicates or interleave a batch.
    async fn upsert_append(
        &self,
        session_id: &str,
        defaults: ConversationDefaults,
        messages: Vec<ConversationMessage>,
    ) -> Result<Conversation>;
}

#[derive(Clone)]
pub struct SqliteConversationStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteConversationStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open conversation store at {path}"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Conversation>> {
        let db = Arc::clone(&self.db);
        let session_id = session_id.to_owned();
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            load_conversation(&conn, &session_id)
        })
        .await?
    }

    async fn upsert_append(
        &self,
        session_id: &str,
        defaults: ConversationDefaults,
        messages: Vec<ConversationMessage>,
    ) -> Result<Conversation> {
        let db = Arc::clone(&self.db);
        let session_id = session_id.to_owned();
        let appended = messages.len();
        let conversation = task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let now = Utc::now().to_rfc3339();

            tx.execute(
                r#"
                INSERT INTO conversations (session_id, language, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(session_id) DO UPDATE SET updated_at = excluded.updated_at
                "#,
                params![
                    session_id,
                    defaults.language.tag(),
                    defaults.created_at.to_rfc3339(),
                    now,
                ],
            )?;

            let mut next_seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            for message in &messages {
                let body = serde_json::to_string(message)?;
                tx.execute(
                    "INSERT INTO messages (session_id, seq, role, body, ts) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        session_id,
                        next_seq,
                        message.role.as_str(),
                        body,
                        message.timestamp.to_rfc3339(),
                    ],
                )?;
                next_seq += 1;
            }

            let conversation = load_conversation(&tx, &session_id)?
                .ok_or_else(|| anyhow!("conversation {session_id} missing after upsert"))?;
            tx.commit()?;
            Ok::<Conversation, anyhow::Error>(conversation)
        })
        .await??;

        tracing::debug!(
            session_id = %conversation.session_id,
            appended,
            total = conversation.messages.len(),
            "appended conversation messages"
        );
        Ok(conversation)
    }
}

fn load_conversation(conn: &Connection, session_id: &str) -> Result<Option<Conversation>> {
    let header = conn
        .query_row(
            "SELECT language, created_at, updated_at FROM conversations WHERE session_id = ?1",
            params![session_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;
    let Some((language, created_at, updated_at)) = header else {
        return Ok(None);
    };

    let mut stmt =
        conn.prepare("SELECT body FROM messages WHERE session_id = ?1 ORDER BY seq ASC")?;
    let rows = stmt.query_map(params![session_id], |row| row.get::<_, String>(0))?;
    let mut messages = Vec::new();
    for row in rows {
        let body = row?;
        let message: ConversationMessage = serde_json::from_str(&body)
            .with_context(|| format!("corrupt message body in session {session_id}"))?;
        messages.push(message);
    }

    Ok(Some(Conversation {
        session_id: session_id.to_owned(),
        language: Language::from(language),
        messages,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    }))
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp in conversation store: {raw}"))
}
