use std::collections::BTreeMap;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    db::Database,
    models::{Event, Session},
    segmentation::{segment_events, segment_users, SegmentationConfig, SegmentationResult},
    settings::SettingsStore,
};

/// Ties the event log, the session cache and the segmenter together.
#[derive(Clone)]
pub struct AnalysisController {
    db: Database,
    config: SegmentationConfig,
}

impl AnalysisController {
    pub fn new(db: Database, config: SegmentationConfig) -> Self {
        Self { db, config }
    }

    pub fn from_settings(db: Database, settings: &SettingsStore) -> Self {
        Self::new(db, settings.segmentation_config())
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Store one event as posted by a producer.
    pub async fn ingest_json(&self, payload: &str) -> Result<Event> {
        let event: Event =
            serde_json::from_str(payload).context("failed to parse tracking event")?;
        debug!("ingesting {:?}", event);
        self.db.insert_event(&event).await?;
        Ok(event)
    }

    pub async fn ingest(&self, events: &[Event]) -> Result<usize> {
        self.db.insert_events(events).await
    }

    /// Segment one user's stored stream, including the ignored events.
    pub async fn segment_user(&self, user_id: &str) -> Result<SegmentationResult> {
        let events = self.db.get_events_for_user(user_id).await?;
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || segment_events(events, &config))
            .await
            .with_context(|| format!("segmentation task for user {user_id} failed"))
    }

    /// Sessions of every known user, served from the cache unless `refresh`
    /// is set or nothing is cached yet.
    pub async fn sessions_per_user(&self, refresh: bool) -> Result<BTreeMap<String, Vec<Session>>> {
        if !refresh && self.db.has_cached_sessions().await? {
            return self.cached_sessions().await;
        }

        let user_ids = self.db.list_user_ids().await?;
        debug!("user ids: {}", user_ids.join(", "));

        let mut events = Vec::new();
        for user_id in &user_ids {
            events.extend(self.db.get_events_for_user(user_id).await?);
        }

        let results = segment_users(events, &self.config).await?;

        let sessions_per_user: BTreeMap<String, Vec<Session>> = results
            .into_iter()
            .map(|(user_id, result)| (user_id, result.sessions))
            .collect();
        self.db
            .replace_session_cache(&sessions_per_user)
            .await
            .context("failed to refresh the session cache")?;

        info!(
            "segmented {} users from {} and refreshed the session cache",
            sessions_per_user.len(),
            self.db.path().display()
        );
        Ok(sessions_per_user)
    }

    async fn cached_sessions(&self) -> Result<BTreeMap<String, Vec<Session>>> {
        let mut sessions_per_user = BTreeMap::new();
        for user_id in self.db.cached_user_ids().await? {
            let sessions = self
                .db
                .get_sessions_for_user(&user_id)
                .await?
                .unwrap_or_default();
            sessions_per_user.insert(user_id, sessions);
        }
        debug!("served {} users from the session cache", sessions_per_user.len());
        Ok(sessions_per_user)
    }
}
