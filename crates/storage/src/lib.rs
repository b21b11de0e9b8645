use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{EventId, EventTypeId, UserId};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub event_id: EventId,
    pub name: String,
    pub description: String,
    pub created_on: NaiveDateTime,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub organiser_id: UserId,
    pub type_id: EventTypeId,
}

/// Listing row with organiser and type names already joined in.
#[derive(Debug, Clone)]
pub struct EventListRow {
    pub event_id: EventId,
    pub name: String,
    pub start_at: NaiveDateTime,
    pub type_name: String,
    pub organiser_name: String,
}

#[derive(Debug, Clone)]
pub struct EventDetailsRow {
    pub event_id: EventId,
    pub name: String,
    pub description: String,
    pub created_on: NaiveDateTime,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub organiser_name: String,
    pub type_name: String,
}

#[derive(Debug, Clone)]
pub struct NewEvent<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub created_on: NaiveDateTime,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub organiser_id: UserId,
    pub type_id: EventTypeId,
}

/// Fields overwritten by an edit. Organiser and created_on never change
/// after creation.
#[derive(Debug, Clone)]
pub struct EventPatch<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub type_id: EventTypeId,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_user(&self, display_name: &str) -> Result<UserId> {
        let rec = sqlx::query(
            "INSERT INTO users (display_name) VALUES (?)
             ON CONFLICT(display_name) DO UPDATE SET display_name=excluded.display_name
             RETURNING id",
        )
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn display_name_for_user(&self, user_id: UserId) -> Result<Option<String>> {
        let row = sqlx::query("SELECT display_name FROM users WHERE id = ?")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    pub async fn create_event_type(&self, name: &str) -> Result<EventTypeId> {
        let rec = sqlx::query(
            "INSERT INTO event_types (name) VALUES (?)
             ON CONFLICT(name) DO UPDATE SET name=excluded.name
             RETURNING id",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(EventTypeId(rec.get::<i64, _>(0)))
    }

    pub async fn list_event_types(&self) -> Result<Vec<(EventTypeId, String)>> {
        let rows = sqlx::query("SELECT id, name FROM event_types ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (EventTypeId(r.get::<i64, _>(0)), r.get::<String, _>(1)))
            .collect())
    }

    pub async fn event_type_exists(&self, type_id: EventTypeId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM event_types WHERE id = ?")
            .bind(type_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn insert_event(&self, event: NewEvent<'_>) -> Result<EventId> {
        let rec = sqlx::query(
            "INSERT INTO events (name, description, created_on, start_at, end_at, organiser_id, type_id)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(event.name)
        .bind(event.description)
        .bind(event.created_on)
        .bind(event.start_at)
        .bind(event.end_at)
        .bind(event.organiser_id.0)
        .bind(event.type_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(EventId(rec.get::<i64, _>(0)))
    }

    pub async fn update_event(&self, event_id: EventId, patch: EventPatch<'_>) -> Result<()> {
        sqlx::query(
            "UPDATE events
             SET name = ?, description = ?, start_at = ?, end_at = ?, type_id = ?
             WHERE id = ?",
        )
        .bind(patch.name)
        .bind(patch.description)
        .bind(patch.start_at)
        .bind(patch.end_at)
        .bind(patch.type_id.0)
        .bind(event_id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_event(&self, event_id: EventId) -> Result<Option<StoredEvent>> {
        let row = sqlx::query(
            "SELECT id, name, description, created_on, start_at, end_at, organiser_id, type_id
             FROM events
             WHERE id = ?",
        )
        .bind(event_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| StoredEvent {
            event_id: EventId(r.get::<i64, _>(0)),
            name: r.get::<String, _>(1),
            description: r.get::<String, _>(2),
            created_on: r.get::<NaiveDateTime, _>(3),
            start_at: r.get::<NaiveDateTime, _>(4),
            end_at: r.get::<NaiveDateTime, _>(5),
            organiser_id: UserId(r.get::<i64, _>(6)),
            type_id: EventTypeId(r.get::<i64, _>(7)),
        }))
    }

    pub async fn list_events(&self) -> Result<Vec<EventListRow>> {
        let rows = sqlx::query(
            "SELECT e.id, e.name, e.start_at, t.name, u.display_name
             FROM events e
             INNER JOIN event_types t ON t.id = e.type_id
             INNER JOIN users u ON u.id = e.organiser_id
             ORDER BY e.id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(event_list_row).collect())
    }

    pub async fn list_events_joined_by(&self, user_id: UserId) -> Result<Vec<EventListRow>> {
        let rows = sqlx::query(
            "SELECT e.id, e.name, e.start_at, t.name, u.display_name
             FROM event_participants ep
             INNER JOIN events e ON e.id = ep.event_id
             INNER JOIN event_types t ON t.id = e.type_id
             INNER JOIN users u ON u.id = e.organiser_id
             WHERE ep.user_id = ?
             ORDER BY e.id ASC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(event_list_row).collect())
    }

    pub async fn load_event_details(&self, event_id: EventId) -> Result<Option<EventDetailsRow>> {
        let row = sqlx::query(
            "SELECT e.id, e.name, e.description, e.created_on, e.start_at, e.end_at,
                    u.display_name, t.name
             FROM events e
             INNER JOIN users u ON u.id = e.organiser_id
             INNER JOIN event_types t ON t.id = e.type_id
             WHERE e.id = ?",
        )
        .bind(event_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| EventDetailsRow {
            event_id: EventId(r.get::<i64, _>(0)),
            name: r.get::<String, _>(1),
            description: r.get::<String, _>(2),
            created_on: r.get::<NaiveDateTime, _>(3),
            start_at: r.get::<NaiveDateTime, _>(4),
            end_at: r.get::<NaiveDateTime, _>(5),
            organiser_name: r.get::<String, _>(6),
            type_name: r.get::<String, _>(7),
        }))
    }

    /// Inserts a participation row unless one already exists. Returns whether
    /// a row was actually inserted; the conflict path makes repeat joins
    /// no-ops rather than errors.
    pub async fn add_participant(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let inserted = sqlx::query(
            "INSERT INTO event_participants (event_id, user_id) VALUES (?, ?)
             ON CONFLICT(event_id, user_id) DO NOTHING",
        )
        .bind(event_id.0)
        .bind(user_id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(inserted > 0)
    }

    pub async fn remove_participant(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let removed =
            sqlx::query("DELETE FROM event_participants WHERE event_id = ? AND user_id = ?")
                .bind(event_id.0)
                .bind(user_id.0)
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(removed > 0)
    }

    pub async fn is_participant(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        let row =
            sqlx::query("SELECT 1 FROM event_participants WHERE event_id = ? AND user_id = ?")
                .bind(event_id.0)
                .bind(user_id.0)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    pub async fn count_participants(&self, event_id: EventId) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM event_participants WHERE event_id = ?")
                .bind(event_id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

fn event_list_row(r: sqlx::sqlite::SqliteRow) -> EventListRow {
    EventListRow {
        event_id: EventId(r.get::<i64, _>(0)),
        name: r.get::<String, _>(1),
        start_at: r.get::<NaiveDateTime, _>(2),
        type_name: r.get::<String, _>(3),
        organiser_name: r.get::<String, _>(4),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
