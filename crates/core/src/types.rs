use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle stage of a conversion job.
///
/// `Converting` is transient: it is held only while the transcoder process
/// runs and never appears in a stored flag, but it participates in the
/// ordering so precondition checks can reason about progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    VideoSaved,
    Converting,
    StreamReady,
    Published,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::VideoSaved => "video_saved",
            Self::Converting => "converting",
            Self::StreamReady => "stream_ready",
            Self::Published => "published",
        }
    }

    fn ordinal(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::VideoSaved => 1,
            Self::Converting => 2,
            Self::StreamReady => 3,
            Self::Published => 4,
        }
    }

    /// Check if this stage is at least as far along as `min`.
    pub fn is_at_least(self, min: JobState) -> bool {
        self.ordinal() >= min.ordinal()
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one job as exposed over the API.
///
/// Each completion flag carries the timestamp of the transition that set it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub video_saved: bool,
    pub video_saved_at: Option<DateTime<Utc>>,
    pub stream_ready: bool,
    pub stream_ready_at: Option<DateTime<Utc>>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub segments: Vec<String>,
}

impl JobSummary {
    /// Last fully completed lifecycle stage.
    pub fn state(&self) -> JobState {
        if self.published {
            JobState::Published
        } else if self.stream_ready {
            JobState::StreamReady
        } else if self.video_saved {
            JobState::VideoSaved
        } else {
            JobState::Created
        }
    }
}
