//! Fire-and-forget usage analytics
//!
//! Events are sent from a detached task. Nothing awaits it, nothing observes
//! its result, and a failed post is only visible at debug log level.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One usage event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsEvent {
    pub category: String,
    pub action: String,
}

impl AnalyticsEvent {
    pub fn new(category: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            action: action.into(),
        }
    }
}

/// Destination for analytics events
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn post(&self, event: AnalyticsEvent) -> Result<()>;
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAnalytics;

#[async_trait]
impl AnalyticsSink for DisabledAnalytics {
    async fn post(&self, _event: AnalyticsEvent) -> Result<()> {
        Ok(())
    }
}

/// Posts events as JSON to an HTTP endpoint
pub struct HttpAnalytics {
    client: reqwest::Client,
    endpoint: String,
    tracking_id: String,
}

#[derive(Serialize)]
struct EventPayload<'a> {
    tracking_id: &'a str,
    #[serde(flatten)]
    event: &'a AnalyticsEvent,
}

impl HttpAnalytics {
    pub fn new(endpoint: impl Into<String>, tracking_id: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("krsign/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(5))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            tracking_id: tracking_id.into(),
        })
    }
}

#[async_trait]
impl AnalyticsSink for HttpAnalytics {
    async fn post(&self, event: AnalyticsEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EventPayload {
                tracking_id: &self.tracking_id,
                event: &event,
            })
            .send()
            .await
            .with_context(|| format!("Failed to send analytics event to {}", self.endpoint))?;

        if !response.status().is_success() {
            return Err(anyhow!("analytics endpoint returned {}", response.status()));
        }
        Ok(())
    }
}

/// Send an event without waiting for it
///
/// The task is detached; its outcome is never observed. Outside a tokio
/// runtime the event is dropped.
pub fn emit_detached(sink: Arc<dyn AnalyticsSink>, event: AnalyticsEvent) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        debug!("No async runtime; dropping analytics event");
        return;
    };
    drop(handle.spawn(async move {
        if let Err(e) = sink.post(event).await {
            debug!("Analytics event not delivered: {:#}", e);
        }
    }));
}

/// Location of the persisted tracking id
pub fn default_tracking_id_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "krsign").map(|dirs| dirs.data_dir().join("tracking_id"))
}

/// Read the persisted tracking id, creating one on first use
pub fn load_or_create_tracking_id(path: &Path) -> Result<String> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, &id)
        .with_context(|| format!("Failed to persist tracking id to {}", path.display()))?;
    Ok(id)
}

/// Sink for the configured endpoint, or [`DisabledAnalytics`]
pub fn sink_for(endpoint: Option<&str>) -> Arc<dyn AnalyticsSink> {
    let Some(endpoint) = endpoint else {
        return Arc::new(DisabledAnalytics);
    };
    let tracking_id = default_tracking_id_path()
        .and_then(|path| load_or_create_tracking_id(&path).ok())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    match HttpAnalytics::new(endpoint, tracking_id) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            debug!("Analytics disabled: {:#}", e);
            Arc::new(DisabledAnalytics)
        }
    }
}
