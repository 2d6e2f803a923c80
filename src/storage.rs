use crate::models::{ChatConfig, Conversation};
use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqlitePool};
use std::path::Path;

pub const DATABASE_FILE: &str = "routerchat.sqlite";
pub const CONVERSATIONS_KEY: &str = "conversations";
pub const CONFIG_KEY: &str = "config";

// Key-value table holding whole JSON snapshots.
const MIGRATIONS_SQL: &str = "
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
";

/// Mirrors in-memory state to two independent JSON blobs, one for the
/// conversation list and one for the configuration. Writes overwrite the
/// whole value; nothing is versioned.
#[derive(Debug, Clone)]
pub struct StorageManager {
    pool: SqlitePool,
}

impl StorageManager {
    /// Opens (creating if needed) the database in `data_dir` and runs migrations.
    pub async fn new(data_dir: &Path) -> Result<Self, anyhow::Error> {
        // Ensure the parent directory exists
        tokio::fs::create_dir_all(data_dir)
            .await
            .context("Failed to create data directory")?;

        let db_path = data_dir.join(DATABASE_FILE);
        let db_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        log::info!("Connecting to database: {}", db_url);

        // Create the database file if it doesn't exist
        if !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            log::info!("Database file not found, creating...");
            Sqlite::create_database(&db_url)
                .await
                .context("Failed to create database")?;
        }

        let pool = SqlitePoolOptions::new()
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// A private in-memory database, gone when the manager is dropped.
    pub async fn in_memory() -> Result<Self, anyhow::Error> {
        // A single connection, since every in-memory connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), anyhow::Error> {
        log::info!("Running database migrations...");
        sqlx::query(MIGRATIONS_SQL)
            .execute(pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    pub async fn get_value(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read '{}' from database", key))
    }

    pub async fn set_value(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write '{}' to database", key))?;
        log::debug!("Saved '{}' ({} bytes)", key, value.len());
        Ok(())
    }

    async fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, anyhow::Error> {
        let Some(raw) = self.get_value(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // Snapshots are best-effort state; start fresh rather than refuse to open.
                log::warn!("Ignoring unreadable '{}' snapshot: {}", key, e);
                Ok(None)
            }
        }
    }

    async fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), anyhow::Error> {
        let raw = serde_json::to_string(value).with_context(|| format!("Failed to serialize '{}'", key))?;
        self.set_value(key, &raw).await
    }

    pub async fn load_conversations(&self) -> Result<Vec<Conversation>, anyhow::Error> {
        let conversations: Vec<Conversation> =
            self.load_json(CONVERSATIONS_KEY).await?.unwrap_or_default();
        log::info!("Loaded {} conversations", conversations.len());
        Ok(conversations)
    }

    pub async fn save_conversations(&self, conversations: &[Conversation]) -> Result<(), anyhow::Error> {
        self.save_json(CONVERSATIONS_KEY, conversations).await
    }

    pub async fn load_config(&self) -> Result<ChatConfig, anyhow::Error> {
        Ok(self.load_json(CONFIG_KEY).await?.unwrap_or_default())
    }

    pub async fn save_config(&self, config: &ChatConfig) -> Result<(), anyhow::Error> {
        self.save_json(CONFIG_KEY, config).await
    }

    /// Fire-and-forget variant used after every conversation mutation.
    pub async fn persist_conversations(&self, conversations: &[Conversation]) {
        if let Err(e) = self.save_conversations(conversations).await {
            log::error!("Failed to persist conversations: {:?}", e);
        }
    }

    /// Fire-and-forget variant used after every settings change.
    pub async fn persist_config(&self, config: &ChatConfig) {
        if let Err(e) = self.save_config(config).await {
            log::error!("Failed to persist configuration: {:?}", e);
        }
    }
}
