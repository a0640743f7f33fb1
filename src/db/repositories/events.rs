use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_sql_datetime},
};
use crate::models::{event_type_from_str, Event};

/// Placeholder id the producers send before the user is known.
pub const UNKNOWN_USER: &str = "unknown_user";

fn row_to_event(row: &Row) -> Result<Event> {
    let event_type: String = row.get("event_type")?;
    let timestamp: String = row.get("timestamp")?;

    Ok(Event {
        event_type: event_type_from_str(&event_type)?,
        user_id: row.get("user_id")?,
        action: row.get("action")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        target: row.get("target")?,
        selector: row.get("selector")?,
        scroll_position: row.get("scroll_position")?,
        estimated_tweets_scrolled: row.get("estimated_tweets_scrolled")?,
    })
}

impl Database {
    pub async fn insert_event(&self, event: &Event) -> Result<()> {
        self.insert_events(std::slice::from_ref(event)).await?;
        Ok(())
    }

    /// Batch upsert. Events are keyed by user and timestamp; a later event
    /// with the same key replaces the stored one.
    pub async fn insert_events(&self, events: &[Event]) -> Result<usize> {
        let events = events.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            for event in &events {
                tx.execute(
                    "INSERT INTO events (
                        user_id,
                        event_type,
                        action,
                        timestamp,
                        target,
                        selector,
                        scroll_position,
                        estimated_tweets_scrolled
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT (user_id, timestamp) DO UPDATE SET
                        event_type = excluded.event_type,
                        action = excluded.action,
                        target = excluded.target,
                        selector = excluded.selector,
                        scroll_position = excluded.scroll_position,
                        estimated_tweets_scrolled = excluded.estimated_tweets_scrolled",
                    params![
                        event.user_id,
                        event.event_type.as_str(),
                        event.action,
                        to_sql_datetime(&event.timestamp),
                        event.target,
                        event.selector,
                        event.scroll_position,
                        event.estimated_tweets_scrolled,
                    ],
                )
                .with_context(|| {
                    format!(
                        "failed to store event '{}' of user {}",
                        event.action, event.user_id
                    )
                })?;
            }

            tx.commit()?;
            Ok(events.len())
        })
        .await
    }

    /// One user's stream, ascending by timestamp: the segmenter's input.
    pub async fn get_events_for_user(&self, user_id: &str) -> Result<Vec<Event>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT
                    user_id,
                    event_type,
                    action,
                    timestamp,
                    target,
                    selector,
                    scroll_position,
                    estimated_tweets_scrolled
                FROM events
                WHERE user_id = ?1
                ORDER BY timestamp ASC, id ASC",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(row_to_event(row)?);
            }

            Ok(events)
        })
        .await
    }

    /// Known users, most active first, without the unknown-user placeholder.
    pub async fn list_user_ids(&self) -> Result<Vec<String>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, COUNT(*) AS event_count
                 FROM events
                 WHERE user_id != ?1
                 GROUP BY user_id
                 ORDER BY event_count DESC, user_id ASC",
            )?;

            let user_ids = stmt
                .query_map(params![UNKNOWN_USER], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(user_ids)
        })
        .await
    }

    pub async fn count_events_for_user(&self, user_id: &str) -> Result<i64> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM events WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }

    pub async fn delete_events_for_user(&self, user_id: &str) -> Result<usize> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let deleted = conn.execute("DELETE FROM events WHERE user_id = ?1", params![user_id])?;
            Ok(deleted)
        })
        .await
    }
}
