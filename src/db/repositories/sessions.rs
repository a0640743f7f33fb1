//! Cache of segmentation output, so analytics can skip re-segmenting.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Transaction};
use serde_json::{from_str, to_string};

use crate::db::{
    connection::Database,
    helpers::{to_i64, to_sql_datetime, to_u64},
};
use crate::models::Session;

fn write_user_sessions(
    tx: &Transaction<'_>,
    user_id: &str,
    sessions: &[Session],
    cached_at: &str,
) -> Result<()> {
    tx.execute(
        "DELETE FROM cached_sessions WHERE user_id = ?1",
        params![user_id],
    )?;
    tx.execute(
        "INSERT INTO cached_users (user_id, cached_at) VALUES (?1, ?2)
         ON CONFLICT (user_id) DO UPDATE SET cached_at = excluded.cached_at",
        params![user_id, cached_at],
    )?;

    for (position, session) in sessions.iter().enumerate() {
        let session_json = to_string(session).context("failed to serialize cached session")?;
        tx.execute(
            "INSERT INTO cached_sessions (
                user_id,
                position,
                started_at,
                ended_at,
                event_count,
                session_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                to_i64(position)?,
                to_sql_datetime(&session.start_event.timestamp),
                to_sql_datetime(&session.end_event.timestamp),
                to_i64(session.events.len())?,
                session_json,
            ],
        )
        .with_context(|| format!("failed to cache session {position} of user {user_id}"))?;
    }

    Ok(())
}

impl Database {
    /// Replace the cached sessions of one user.
    pub async fn store_sessions(&self, user_id: &str, sessions: &[Session]) -> Result<()> {
        let user_id = user_id.to_string();
        let sessions = sessions.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            write_user_sessions(&tx, &user_id, &sessions, &to_sql_datetime(&Utc::now()))?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Swap the whole cache for `sessions_per_user` in one transaction.
    ///
    /// Users missing from the map are evicted. On failure the previous cache
    /// is left untouched.
    pub async fn replace_session_cache(
        &self,
        sessions_per_user: &BTreeMap<String, Vec<Session>>,
    ) -> Result<()> {
        let sessions_per_user = sessions_per_user.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM cached_sessions", [])?;
            tx.execute("DELETE FROM cached_users", [])?;

            let cached_at = to_sql_datetime(&Utc::now());
            for (user_id, sessions) in &sessions_per_user {
                write_user_sessions(&tx, user_id, sessions, &cached_at)?;
            }

            tx.commit().context("failed to commit session cache")?;
            Ok(())
        })
        .await
    }

    /// Cached sessions of one user in their original order, or `None` when
    /// the user was never cached.
    pub async fn get_sessions_for_user(&self, user_id: &str) -> Result<Option<Vec<Session>>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let cached = conn
                .query_row(
                    "SELECT 1 FROM cached_users WHERE user_id = ?1",
                    params![user_id],
                    |_| Ok(()),
                )
                .optional()?;
            if cached.is_none() {
                return Ok(None);
            }

            let mut stmt = conn.prepare(
                "SELECT session_json, event_count
                 FROM cached_sessions
                 WHERE user_id = ?1
                 ORDER BY position ASC",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                let session_json: String = row.get(0)?;
                let event_count = to_u64(row.get(1)?, "event_count")?;
                let session: Session = from_str(&session_json)
                    .with_context(|| format!("corrupt cached session for user {user_id}"))?;
                if session.events.len() as u64 != event_count {
                    anyhow::bail!("cached session for user {user_id} lost events");
                }
                sessions.push(session);
            }

            Ok(Some(sessions))
        })
        .await
    }

    pub async fn cached_user_ids(&self) -> Result<Vec<String>> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT user_id FROM cached_users ORDER BY user_id ASC")?;
            let user_ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(user_ids)
        })
        .await
    }

    pub async fn has_cached_sessions(&self) -> Result<bool> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM cached_users", [], |row| row.get(0))?;
            Ok(count > 0)
        })
        .await
    }

    /// Drop the whole cache; returns how many users were cached.
    pub async fn clear_session_cache(&self) -> Result<usize> {
        self.execute(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM cached_sessions", [])?;
            let users = tx.execute("DELETE FROM cached_users", [])?;
            tx.commit()?;
            Ok(users)
        })
        .await
    }
}
