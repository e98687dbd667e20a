use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DEFAULT_POLLING_INTERVAL;

/// Kind of artifact a generation job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    MindMap,
    StudyGuide,
    Flashcards,
    Questionnaire,
}

impl JobType {
    pub const ALL: [JobType; 4] = [
        JobType::MindMap,
        JobType::StudyGuide,
        JobType::Flashcards,
        JobType::Questionnaire,
    ];

    /// Wire name, as used in paths and request bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::MindMap => "MIND_MAP",
            JobType::StudyGuide => "STUDY_GUIDE",
            JobType::Flashcards => "FLASHCARDS",
            JobType::Questionnaire => "QUESTIONNAIRE",
        }
    }

    /// Accepts the wire name or its lowercase/kebab form (`mind-map`, `study_guide`).
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Server-side job record. Each poll replaces the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub id: String,
    pub notebook_id: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl GenerationJob {
    /// Local stand-in for a job the server just accepted.
    pub fn pending(id: impl Into<String>, notebook_id: impl Into<String>, job_type: JobType) -> Self {
        Self {
            id: id.into(),
            notebook_id: notebook_id.into(),
            job_type,
            status: JobStatus::Pending,
            result: None,
            error_message: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            completed_at: None,
        }
    }

    /// Decode the artifact JSON carried in `result`.
    pub fn parse_result<T: DeserializeOwned>(&self) -> Result<T> {
        let raw = self
            .result
            .as_deref()
            .ok_or_else(|| Error::job(format!("job {} has no result", self.id)))?;
        Ok(serde_json::from_str(raw)?)
    }

    /// Failure text for a FAILED job.
    pub fn failure_message(&self) -> String {
        match self.error_message.as_deref() {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => "Generation failed".to_string(),
        }
    }
}

/// Response of the generate endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStarted {
    pub job_id: String,
    #[serde(default)]
    pub message: String,
}

pub type JobCallback = Arc<dyn Fn(&GenerationJob) + Send + Sync>;

#[derive(Clone)]
pub struct JobOptions {
    pub polling_interval: Duration,
    pub on_completed: Option<JobCallback>,
    pub on_failed: Option<JobCallback>,
}

impl JobOptions {
    pub fn new() -> Self {
        Self {
            polling_interval: DEFAULT_POLLING_INTERVAL,
            on_completed: None,
            on_failed: None,
        }
    }

    pub fn polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    pub fn on_completed(mut self, f: impl Fn(&GenerationJob) + Send + Sync + 'static) -> Self {
        self.on_completed = Some(Arc::new(f));
        self
    }

    pub fn on_failed(mut self, f: impl Fn(&GenerationJob) + Send + Sync + 'static) -> Self {
        self.on_failed = Some(Arc::new(f));
        self
    }
}

impl Default for JobOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for JobOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobOptions")
            .field("polling_interval", &self.polling_interval)
            .field("on_completed", &self.on_completed.is_some())
            .field("on_failed", &self.on_failed.is_some())
            .finish()
    }
}

/// Observable poller state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobState {
    pub job: Option<GenerationJob>,
    pub is_starting: bool,
    pub error: Option<String>,
}

impl JobState {
    /// Starting, or a known job that has not finished.
    pub fn is_loading(&self) -> bool {
        self.is_starting || self.job.as_ref().is_some_and(|j| !j.status.is_terminal())
    }

    pub fn is_completed(&self) -> bool {
        self.status() == Some(JobStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        self.status() == Some(JobStatus::Failed)
    }

    pub fn result(&self) -> Option<&str> {
        self.job.as_ref().and_then(|j| j.result.as_deref())
    }

    fn status(&self) -> Option<JobStatus> {
        self.job.as_ref().map(|j| j.status)
    }
}
