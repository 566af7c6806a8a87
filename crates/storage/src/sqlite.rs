//! SQLite backend.
//!
//! One database file holds the engine's view of the platform schema:
//! agents, conversations, messages, contacts, knowledge, usage logs, and
//! credit balances. Migrations are idempotent `CREATE TABLE IF NOT EXISTS`
//! statements run at pool creation.
//!
//! The billing invariant lives here: `record_usage` inserts the usage log
//! and applies the balance delta inside a single transaction, and the delta
//! itself is a relative `UPDATE balance = balance - ?` — never a
//! read-modify-write in application code.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use konsul_core::agent::AgentProfile;
use konsul_core::billing::{CreditBalance, UsageLog};
use konsul_core::contact::{Contact, ContactId};
use konsul_core::conversation::{
    AttachmentMeta, Conversation, ConversationId, ConversationStatus, Message, MessageRole,
};
use konsul_core::error::StoreError;
use konsul_core::knowledge::{DocumentChunk, KnowledgeBase, KnowledgeSource};
use konsul_core::store::{AgentStore, ContactStore, ConversationStore, KnowledgeStore, UsageStore};

/// A production SQLite store implementing every storage trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables are created automatically. Pass
    /// `"sqlite::memory:"` for an in-process ephemeral database (tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // In-memory databases are per-connection; keep a single connection
        // so every query sees the migrated schema.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                id           TEXT PRIMARY KEY,
                workspace_id TEXT NOT NULL,
                profile      TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id              TEXT PRIMARY KEY,
                agent_id        TEXT NOT NULL,
                workspace_id    TEXT NOT NULL,
                channel_id      TEXT,
                external_id     TEXT NOT NULL,
                contact_name    TEXT,
                contact_email   TEXT,
                contact_id      TEXT,
                status          TEXT NOT NULL DEFAULT 'open',
                last_message_at TEXT,
                created_at      TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id              TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                role            TEXT NOT NULL,
                content         TEXT NOT NULL,
                metadata        TEXT,
                created_at      TEXT NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, created_at)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS contacts (
                id           TEXT PRIMARY KEY,
                workspace_id TEXT NOT NULL,
                name         TEXT,
                email        TEXT,
                external_id  TEXT,
                custom_data  TEXT NOT NULL DEFAULT '{}',
                created_at   TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS knowledge_bases (
                id       TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                name     TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS knowledge_sources (
                id      TEXT PRIMARY KEY,
                base_id TEXT NOT NULL,
                name    TEXT NOT NULL,
                kind    TEXT NOT NULL,
                status  TEXT NOT NULL DEFAULT 'pending'
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS document_chunks (
                id        TEXT PRIMARY KEY,
                source_id TEXT NOT NULL,
                position  INTEGER NOT NULL DEFAULT 0,
                content   TEXT NOT NULL,
                embedding BLOB
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS usage_logs (
                id              TEXT PRIMARY KEY,
                workspace_id    TEXT NOT NULL,
                agent_id        TEXT NOT NULL,
                conversation_id TEXT NOT NULL,
                tokens_used     INTEGER NOT NULL,
                credits_used    INTEGER NOT NULL,
                model           TEXT NOT NULL,
                channel_id      TEXT,
                created_at      TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS credit_balances (
                workspace_id TEXT PRIMARY KEY,
                balance      INTEGER NOT NULL DEFAULT 0,
                total_used   INTEGER NOT NULL DEFAULT 0
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    // ── Seeding (used by the ingestion/admin layers and tests) ────────

    pub async fn insert_agent(&self, agent: &AgentProfile) -> Result<(), StoreError> {
        let profile = serde_json::to_string(agent)
            .map_err(|e| StoreError::Storage(format!("Profile serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO agents (id, workspace_id, profile)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                workspace_id = excluded.workspace_id,
                profile = excluded.profile
            "#,
        )
        .bind(&agent.id)
        .bind(&agent.workspace_id)
        .bind(&profile)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT agent: {e}")))?;
        Ok(())
    }

    pub async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO conversations
                (id, agent_id, workspace_id, channel_id, external_id,
                 contact_name, contact_email, contact_id, status,
                 last_message_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&conversation.id.0)
        .bind(&conversation.agent_id)
        .bind(&conversation.workspace_id)
        .bind(&conversation.channel_id)
        .bind(&conversation.external_id)
        .bind(&conversation.contact_name)
        .bind(&conversation.contact_email)
        .bind(conversation.contact_id.as_ref().map(|c| c.0.clone()))
        .bind(conversation.status.as_str())
        .bind(conversation.last_message_at.map(|t| t.to_rfc3339()))
        .bind(conversation.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT conversation: {e}")))?;
        Ok(())
    }

    pub async fn insert_knowledge_base(&self, base: &KnowledgeBase) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO knowledge_bases (id, agent_id, name) VALUES (?1, ?2, ?3)")
            .bind(&base.id)
            .bind(&base.agent_id)
            .bind(&base.name)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT knowledge base: {e}")))?;
        Ok(())
    }

    pub async fn insert_knowledge_source(
        &self,
        source: &KnowledgeSource,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO knowledge_sources (id, base_id, name, kind, status) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&source.id)
        .bind(&source.base_id)
        .bind(&source.name)
        .bind(source.kind.as_str())
        .bind(source.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT knowledge source: {e}")))?;
        Ok(())
    }

    pub async fn insert_chunk(&self, chunk: &DocumentChunk) -> Result<(), StoreError> {
        let embedding_blob: Option<Vec<u8>> = chunk.embedding.as_deref().map(embedding_to_blob);

        sqlx::query(
            "INSERT INTO document_chunks (id, source_id, position, content, embedding) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&chunk.id)
        .bind(&chunk.source_id)
        .bind(chunk.position as i64)
        .bind(&chunk.content)
        .bind(embedding_blob.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT chunk: {e}")))?;
        Ok(())
    }

    pub async fn set_balance(&self, workspace_id: &str, balance: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO credit_balances (workspace_id, balance, total_used)
            VALUES (?1, ?2, 0)
            ON CONFLICT(workspace_id) DO UPDATE SET balance = excluded.balance
            "#,
        )
        .bind(workspace_id)
        .bind(balance)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("SET balance: {e}")))?;
        Ok(())
    }

    // ── Row mapping ───────────────────────────────────────────────────

    fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, StoreError> {
        let id: String = get(row, "id")?;
        let status_str: String = get(row, "status")?;
        let status = match status_str.as_str() {
            "closed" => ConversationStatus::Closed,
            _ => ConversationStatus::Open,
        };
        let contact_id: Option<String> = get(row, "contact_id")?;
        let last_message_at: Option<String> = get(row, "last_message_at")?;
        let created_at: String = get(row, "created_at")?;

        Ok(Conversation {
            id: ConversationId(id),
            agent_id: get(row, "agent_id")?,
            workspace_id: get(row, "workspace_id")?,
            channel_id: get(row, "channel_id")?,
            external_id: get(row, "external_id")?,
            contact_name: get(row, "contact_name")?,
            contact_email: get(row, "contact_email")?,
            contact_id: contact_id.map(ContactId),
            status,
            last_message_at: last_message_at.and_then(|t| parse_timestamp(&t)),
            created_at: parse_timestamp(&created_at).unwrap_or_else(Utc::now),
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, StoreError> {
        let role_str: String = get(row, "role")?;
        let role: MessageRole = role_str
            .parse()
            .map_err(|e: String| StoreError::QueryFailed(e))?;
        let metadata_json: Option<String> = get(row, "metadata")?;
        let metadata: Option<AttachmentMeta> =
            metadata_json.and_then(|json| serde_json::from_str(&json).ok());
        let conversation_id: String = get(row, "conversation_id")?;
        let created_at: String = get(row, "created_at")?;

        Ok(Message {
            id: get(row, "id")?,
            conversation_id: ConversationId(conversation_id),
            role,
            content: get(row, "content")?,
            metadata,
            created_at: parse_timestamp(&created_at).unwrap_or_else(Utc::now),
        })
    }

    fn row_to_contact(row: &sqlx::sqlite::SqliteRow) -> Result<Contact, StoreError> {
        let id: String = get(row, "id")?;
        let custom_data_json: String = get(row, "custom_data")?;
        let custom_data: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&custom_data_json).unwrap_or_default();
        let created_at: String = get(row, "created_at")?;

        Ok(Contact {
            id: ContactId(id),
            workspace_id: get(row, "workspace_id")?,
            name: get(row, "name")?,
            email: get(row, "email")?,
            external_id: get(row, "external_id")?,
            custom_data,
            created_at: parse_timestamp(&created_at).unwrap_or_else(Utc::now),
        })
    }
}

fn get<'r, T>(row: &'r sqlx::sqlite::SqliteRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(|e| StoreError::QueryFailed(format!("{column} column: {e}")))
}

fn parse_timestamp(s: &str) -> Option<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[async_trait]
impl AgentStore for SqliteStore {
    async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentProfile>, StoreError> {
        let row = sqlx::query("SELECT profile FROM agents WHERE id = ?1")
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT agent: {e}")))?;

        match row {
            Some(row) => {
                let profile: String = get(&row, "profile")?;
                let agent = serde_json::from_str(&profile)
                    .map_err(|e| StoreError::QueryFailed(format!("Profile parse: {e}")))?;
                Ok(Some(agent))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT conversation: {e}")))?;

        match row {
            Some(ref row) => Ok(Some(Self::row_to_conversation(row)?)),
            None => Ok(None),
        }
    }

    async fn link_contact(
        &self,
        id: &ConversationId,
        contact_id: &ContactId,
    ) -> Result<ContactId, StoreError> {
        // Compare-and-swap: only the first linker wins.
        let result = sqlx::query(
            "UPDATE conversations SET contact_id = ?2 WHERE id = ?1 AND contact_id IS NULL",
        )
        .bind(&id.0)
        .bind(&contact_id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("LINK contact: {e}")))?;

        if result.rows_affected() == 1 {
            return Ok(contact_id.clone());
        }

        // Lost the race (or already linked) — read back the winner.
        let row = sqlx::query("SELECT contact_id FROM conversations WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT contact_id: {e}")))?
            .ok_or_else(|| StoreError::QueryFailed(format!("conversation {id} not found")))?;

        let existing: Option<String> = get(&row, "contact_id")?;
        existing.map(ContactId).ok_or_else(|| {
            StoreError::Storage(format!("conversation {id} lost its contact link"))
        })
    }

    async fn create_message(&self, message: Message) -> Result<(), StoreError> {
        let metadata_json = message
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Storage(format!("Metadata serialization: {e}")))?;
        let created_at = message.created_at.to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, role, content, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&message.id)
        .bind(&message.conversation_id.0)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&metadata_json)
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT message: {e}")))?;

        sqlx::query("UPDATE conversations SET last_message_at = ?2 WHERE id = ?1")
            .bind(&message.conversation_id.0)
            .bind(&created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE last_message_at: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT: {e}")))?;
        Ok(())
    }

    async fn last_messages(
        &self,
        id: &ConversationId,
        n: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(&id.0)
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("SELECT messages: {e}")))?;

        let mut messages: Vec<Message> = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<Result<_, _>>()?;
        messages.reverse(); // oldest first
        Ok(messages)
    }
}

#[async_trait]
impl ContactStore for SqliteStore {
    async fn create_contact(&self, contact: Contact) -> Result<ContactId, StoreError> {
        let custom_data = serde_json::to_string(&contact.custom_data)
            .map_err(|e| StoreError::Storage(format!("Custom data serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO contacts (id, workspace_id, name, email, external_id, custom_data, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&contact.id.0)
        .bind(&contact.workspace_id)
        .bind(&contact.name)
        .bind(&contact.email)
        .bind(&contact.external_id)
        .bind(&custom_data)
        .bind(contact.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT contact: {e}")))?;

        Ok(contact.id)
    }

    async fn get_contact(&self, id: &ContactId) -> Result<Option<Contact>, StoreError> {
        let row = sqlx::query("SELECT * FROM contacts WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT contact: {e}")))?;

        match row {
            Some(ref row) => Ok(Some(Self::row_to_contact(row)?)),
            None => Ok(None),
        }
    }

    async fn update_custom_data(
        &self,
        id: &ContactId,
        workspace_id: &str,
        updates: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StoreError> {
        // Merge under a transaction so concurrent writers don't drop keys.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN: {e}")))?;

        let row = sqlx::query(
            "SELECT custom_data FROM contacts WHERE id = ?1 AND workspace_id = ?2",
        )
        .bind(&id.0)
        .bind(workspace_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("SELECT custom_data: {e}")))?
        .ok_or_else(|| StoreError::QueryFailed(format!("contact {id} not found")))?;

        let current_json: String = get(&row, "custom_data")?;
        let mut current: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&current_json).unwrap_or_default();
        for (key, value) in updates {
            current.insert(key, value);
        }

        let merged = serde_json::to_string(&current)
            .map_err(|e| StoreError::Storage(format!("Custom data serialization: {e}")))?;

        sqlx::query("UPDATE contacts SET custom_data = ?2 WHERE id = ?1")
            .bind(&id.0)
            .bind(&merged)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE custom_data: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn ready_chunks(&self, agent_id: &str) -> Result<Vec<DocumentChunk>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.source_id, c.position, c.content, c.embedding
            FROM document_chunks c
            JOIN knowledge_sources s ON s.id = c.source_id
            JOIN knowledge_bases b ON b.id = s.base_id
            WHERE b.agent_id = ?1 AND s.status = 'ready'
            ORDER BY b.id, s.id, c.position
            "#,
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("SELECT chunks: {e}")))?;

        rows.iter()
            .map(|row| {
                let embedding: Option<Vec<u8>> = get(row, "embedding")?;
                let position: i64 = get(row, "position")?;
                Ok(DocumentChunk {
                    id: get(row, "id")?,
                    source_id: get(row, "source_id")?,
                    position: position as u32,
                    content: get(row, "content")?,
                    embedding: embedding.as_deref().map(blob_to_embedding),
                })
            })
            .collect()
    }
}

#[async_trait]
impl UsageStore for SqliteStore {
    async fn record_usage(&self, log: UsageLog) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO usage_logs
                (id, workspace_id, agent_id, conversation_id,
                 tokens_used, credits_used, model, channel_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&log.id)
        .bind(&log.workspace_id)
        .bind(&log.agent_id)
        .bind(&log.conversation_id.0)
        .bind(log.tokens_used as i64)
        .bind(log.credits_used as i64)
        .bind(&log.model)
        .bind(&log.channel_id)
        .bind(log.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT usage log: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO credit_balances (workspace_id, balance, total_used)
            VALUES (?1, 0, 0)
            ON CONFLICT(workspace_id) DO NOTHING
            "#,
        )
        .bind(&log.workspace_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("ENSURE balance row: {e}")))?;

        // Relative update — safe under concurrent turns for one workspace.
        sqlx::query(
            r#"
            UPDATE credit_balances
            SET balance = balance - ?2, total_used = total_used + ?2
            WHERE workspace_id = ?1
            "#,
        )
        .bind(&log.workspace_id)
        .bind(log.credits_used as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE balance: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT: {e}")))?;
        Ok(())
    }

    async fn credit_balance(
        &self,
        workspace_id: &str,
    ) -> Result<Option<CreditBalance>, StoreError> {
        let row = sqlx::query("SELECT * FROM credit_balances WHERE workspace_id = ?1")
            .bind(workspace_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT balance: {e}")))?;

        match row {
            Some(row) => {
                let balance: i64 = get(&row, "balance")?;
                let total_used: i64 = get(&row, "total_used")?;
                Ok(Some(CreditBalance {
                    workspace_id: workspace_id.to_string(),
                    balance,
                    total_used,
                }))
            }
            None => Ok(None),
        }
    }
}
