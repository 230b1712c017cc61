//! Watch/progress records for timed resources.

use crate::identity::RecordId;
use serde::{Deserialize, Serialize};

/// Resources longer than three hours are never tracked.
pub const MAX_TRACKED_DURATION_SECS: f64 = 10_800.0;

/// Server-side watch state of one resource.
///
/// `last_position` is elapsed display time in seconds, not a scrub position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchRecord {
    pub resource_id: RecordId,
    #[serde(default)]
    pub last_position: Option<u64>,
    #[serde(default)]
    pub last_location: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    /// Percentage at which the resource counts as passed.
    #[serde(default)]
    pub cutoff_progress: f64,
}

impl WatchRecord {
    pub fn new(resource_id: impl Into<RecordId>, duration: Option<f64>, cutoff_progress: f64) -> Self {
        Self {
            resource_id: resource_id.into(),
            last_position: None,
            last_location: None,
            duration,
            cutoff_progress,
        }
    }

    pub fn with_position(mut self, last_position: u64) -> Self {
        self.last_position = Some(last_position);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.last_location = Some(location.into());
        self
    }

    /// Progress percentage at a given position, clamped to 100.
    pub fn progress_at(&self, position: u64) -> f64 {
        match self.duration {
            Some(duration) if duration > 0.0 => (position as f64 / duration * 100.0).min(100.0),
            _ => 0.0,
        }
    }

    pub fn passed_at(&self, position: u64) -> bool {
        self.progress_at(position) >= self.cutoff_progress
    }

    pub fn progress(&self) -> f64 {
        self.progress_at(self.last_position.unwrap_or(0))
    }

    pub fn passed(&self) -> bool {
        self.passed_at(self.last_position.unwrap_or(0))
    }

    /// Whether the resource qualifies for tracking at all.
    pub fn is_trackable(&self, max_duration_secs: f64) -> bool {
        matches!(self.duration, Some(d) if d > 0.0 && d <= max_duration_secs)
    }
}

/// Payload persisted to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub resource_id: RecordId,
    pub last_position: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_location: Option<String>,
    /// Hex-encoded bitmap, one bit per second of duration.
    pub watched: String,
}
