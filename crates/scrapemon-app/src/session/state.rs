//! Session data types: status, counters, result items and the media snapshot

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Identifier of a result item, assigned locally on insertion
///
/// Monotonic within one `ScrapeSession` instance. The worker does not send
/// stable ids, so these are not comparable across reconnects or reloads.
pub type ResultId = u64;

/// Lifecycle of a scrape run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Stopping,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Idle => "idle",
            ScrapeStatus::Running => "running",
            ScrapeStatus::Paused => "paused",
            ScrapeStatus::Stopping => "stopping",
        }
    }

    /// A run is in flight (including while it winds down)
    pub fn is_active(&self) -> bool {
        !matches!(self, ScrapeStatus::Idle)
    }
}

impl std::fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress and outcome counters
///
/// `succeeded`/`failed` are always the lengths of the result lists; they are
/// derived when the snapshot is taken, never stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Counters {
    pub processed: u64,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub percent: u32,
}

/// One finished work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultItem {
    pub id: ResultId,
    pub source_path: String,
    pub label: String,
    pub error_text: Option<String>,
    pub received_at: DateTime<Local>,
}

/// Detail of the media item currently being scraped
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MediaSnapshot {
    pub number: String,
    pub title: String,
    pub actors: Vec<String>,
    pub release: String,
    pub runtime: String,
    pub outline: String,
    pub tags: Vec<String>,
    pub director: String,
    pub studio: String,
    pub series: String,
    pub publisher: String,
    /// Site the metadata came from
    pub source: String,
    pub poster_url: Option<String>,
    pub thumb_url: Option<String>,
    pub file_path: Option<String>,
    pub nfo_path: Option<String>,
}

/// Read-only copy of the whole session state
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SessionSnapshot {
    pub status: ScrapeStatus,
    pub counters: Counters,
    pub success_results: Vec<ResultItem>,
    pub failure_results: Vec<ResultItem>,
    pub selected_result: Option<ResultItem>,
    pub current_media: Option<MediaSnapshot>,
    pub status_text: String,
}

/// Worker-reported status, as returned by the status query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteScrapeStatus {
    #[default]
    Idle,
    Scraping,
    Stopping,
}

/// Worker status response
///
/// `success`/`failed` are informational; local counters always follow the
/// local result lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct RemoteStatus {
    pub status: RemoteScrapeStatus,
    #[serde(default)]
    pub current: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub success: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub progress: u32,
}
