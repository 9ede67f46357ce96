//! SQLite storage for watch slots.

use pricewatch_core::{ComparisonType, CoreError, Slot, Watch};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Invalid row: {0}")]
    Core(#[from] CoreError),
}

type WatchRow = (i64, i64, f64, String);

/// Database connection for watches.
///
/// The pool holds a single connection, so every statement is serialized.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                user_id INTEGER,
                slot INTEGER,
                threshold REAL DEFAULT 0,
                notif_type TEXT DEFAULT 'none',
                PRIMARY KEY (user_id, slot)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Migration: rows written by the old bot carry Russian type tokens
        for (legacy, kind) in [
            ("выше", ComparisonType::Above),
            ("равно", ComparisonType::Equal),
            ("ниже", ComparisonType::Below),
        ] {
            sqlx::query("UPDATE notifications SET notif_type = ? WHERE notif_type = ?")
                .bind(kind.as_str())
                .bind(legacy)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    fn row_to_watch((user_id, slot, threshold, kind): WatchRow) -> Result<Watch, DbError> {
        Ok(Watch {
            user_id,
            slot: Slot::new(slot)?,
            threshold,
            kind: ComparisonType::from_stored(&kind)?,
        })
    }

    /// Create the missing slots for a user. Safe to call any number of times.
    pub async fn ensure_user(&self, user_id: i64) -> Result<(), DbError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        if count >= Slot::COUNT as i64 {
            return Ok(());
        }

        for slot in Slot::ALL {
            sqlx::query("INSERT OR IGNORE INTO notifications (user_id, slot) VALUES (?, ?)")
                .bind(user_id)
                .bind(slot.get() as i64)
                .execute(&self.pool)
                .await?;
        }
        debug!(user_id, existing = count, "Initialized watch slots");

        Ok(())
    }

    /// All watches of a user, ordered by slot.
    pub async fn list_watches(&self, user_id: i64) -> Result<Vec<Watch>, DbError> {
        let rows = sqlx::query_as::<_, WatchRow>(
            "SELECT user_id, slot, threshold, notif_type FROM notifications WHERE user_id = ? ORDER BY slot",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_watch).collect()
    }

    /// Get a single watch.
    pub async fn get_watch(&self, user_id: i64, slot: Slot) -> Result<Option<Watch>, DbError> {
        let row = sqlx::query_as::<_, WatchRow>(
            "SELECT user_id, slot, threshold, notif_type FROM notifications WHERE user_id = ? AND slot = ?",
        )
        .bind(user_id)
        .bind(slot.get() as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_watch).transpose()
    }

    /// Insert or update a watch.
    pub async fn set_watch(
        &self,
        user_id: i64,
        slot: Slot,
        kind: ComparisonType,
        threshold: f64,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (user_id, slot, threshold, notif_type)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, slot)
            DO UPDATE SET threshold = excluded.threshold, notif_type = excluded.notif_type
            "#,
        )
        .bind(user_id)
        .bind(slot.get() as i64)
        .bind(threshold)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Disable a watch. Returns true if the slot was armed before.
    pub async fn clear_watch(&self, user_id: i64, slot: Slot) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET notif_type = 'none', threshold = 0
            WHERE user_id = ? AND slot = ? AND (notif_type != 'none' OR threshold != 0)
            "#,
        )
        .bind(user_id)
        .bind(slot.get() as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Every watch with a type other than `none`.
    /// Rows with an unrecognized type are skipped, so they never fire.
    pub async fn armed_watches(&self) -> Result<Vec<Watch>, DbError> {
        let rows = sqlx::query_as::<_, WatchRow>(
            "SELECT user_id, slot, threshold, notif_type FROM notifications WHERE notif_type != 'none' ORDER BY user_id, slot",
        )
        .fetch_all(&self.pool)
        .await?;

        let watches = rows
            .into_iter()
            .filter_map(|row| {
                let (user_id, slot) = (row.0, row.1);
                match Self::row_to_watch(row) {
                    Ok(watch) => Some(watch),
                    Err(e) => {
                        warn!(user_id, slot, error = %e, "Skipping unreadable watch");
                        None
                    }
                }
            })
            .collect();

        Ok(watches)
    }

    /// Reset a watch that fired, but only if the row still holds the values
    /// that were read. Returns true if the row was reset.
    pub async fn reset_fired(&self, watch: &Watch) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET notif_type = 'none', threshold = 0
            WHERE user_id = ? AND slot = ? AND notif_type = ? AND threshold = ?
            "#,
        )
        .bind(watch.user_id)
        .bind(watch.slot.get() as i64)
        .bind(watch.kind.as_str())
        .bind(watch.threshold)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
