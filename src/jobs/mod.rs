//! 生成任务模块：启动服务端生成任务并轮询其状态。
//!
//! Server-side generation jobs (mind maps, study guides, flashcards, questionnaires).
//!
//! ```text
//! start_generation ──▶ PENDING ──poll──▶ PROCESSING ──poll──▶ COMPLETED │ FAILED
//!                                         (repeats)               (polling stops)
//! ```
//!
//! ```rust,no_run
//! use escruta_client::jobs::{GenerationJobPoller, JobOptions, JobType};
//! use escruta_client::models::MindMapResponse;
//! use escruta_client::FetchClient;
//!
//! # async fn run() -> escruta_client::Result<()> {
//! let client = FetchClient::new()?;
//! let poller = GenerationJobPoller::new(client, "nb1", JobType::MindMap, JobOptions::default());
//! poller.start_generation().await?;
//! let job = poller.wait_until_finished().await?;
//! let map: MindMapResponse = job.parse_result()?;
//! println!("{}", map.central);
//! # Ok(())
//! # }
//! ```

mod poller;
mod types;

pub use poller::GenerationJobPoller;
pub use types::{
    GenerationJob, JobCallback, JobOptions, JobStarted, JobState, JobStatus, JobType,
};
