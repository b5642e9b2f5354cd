//! SQLite implementation of ActivityStore.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use mcp_compose_core::{ActivityEvent, ActivityStats, ActivityStore, RepoResult, Severity};
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;

use crate::Database;

/// SQLite-backed append-only activity log.
pub struct SqliteActivityStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteActivityStore {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }
}

/// Fixed-width RFC 3339 so TEXT comparison matches chronological order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActivityEvent> {
    let timestamp: String = row.get(1)?;
    let severity: String = row.get(2)?;
    let details: Option<String> = row.get(7)?;
    Ok(ActivityEvent {
        id: row.get(0)?,
        timestamp: parse_datetime(&timestamp),
        severity: Severity::parse(&severity).unwrap_or_default(),
        kind: row.get(3)?,
        server: row.get(4)?,
        client: row.get(5)?,
        message: row.get(6)?,
        details: details.and_then(|d| serde_json::from_str(&d).ok()),
    })
}

#[async_trait]
impl ActivityStore for SqliteActivityStore {
    async fn insert(&self, event: &ActivityEvent) -> RepoResult<()> {
        let details = match &event.details {
            Some(map) => Some(serde_json::to_string(map)?),
            None => None,
        };
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT OR IGNORE INTO activity_log
                    (event_id, timestamp, severity, kind, server, client, message, details, inserted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    event.id,
                    format_datetime(&event.timestamp),
                    event.severity.as_str(),
                    event.kind,
                    event.server,
                    event.client,
                    event.message,
                    details,
                    format_datetime(&Utc::now()),
                ],
            )
            .context("Failed to insert activity event")?;
        Ok(())
    }

    async fn recent(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> RepoResult<Vec<ActivityEvent>> {
        let since = since.map(|s| format_datetime(&s));
        let db = self.db.lock().await;
        let mut stmt = db.connection().prepare(
            "SELECT event_id, timestamp, severity, kind, server, client, message, details
             FROM activity_log
             WHERE (?1 IS NULL OR timestamp > ?1)
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let events = stmt
            .query_map(params![since, limit as i64], row_to_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    async fn stats(&self) -> RepoResult<ActivityStats> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let (total, oldest, newest): (i64, Option<String>, Option<String>) = conn.query_row(
            "SELECT count(*), MIN(timestamp), MAX(timestamp) FROM activity_log",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let group = |column: &str| -> RepoResult<BTreeMap<String, u64>> {
            let sql = format!(
                "SELECT {column}, count(*) FROM activity_log GROUP BY {column}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(|(k, v)| (k, v as u64)).collect())
        };

        Ok(ActivityStats {
            total: total as u64,
            by_severity: group("severity")?,
            by_kind: group("kind")?,
            oldest: oldest.as_deref().map(parse_datetime),
            newest: newest.as_deref().map(parse_datetime),
        })
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> RepoResult<usize> {
        let db = self.db.lock().await;
        let removed = db.connection().execute(
            "DELETE FROM activity_log WHERE inserted_at < ?1",
            params![format_datetime(&cutoff)],
        )?;
        Ok(removed)
    }
}

impl SqliteActivityStore {
    /// Look up a single event by id.
    pub async fn get(&self, event_id: &str) -> RepoResult<Option<ActivityEvent>> {
        let db = self.db.lock().await;
        let event = db
            .connection()
            .query_row(
                "SELECT event_id, timestamp, severity, kind, server, client, message, details
                 FROM activity_log WHERE event_id = ?1",
                params![event_id],
                row_to_event,
            )
            .optional()?;
        Ok(event)
    }
}
