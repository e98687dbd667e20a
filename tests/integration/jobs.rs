//! Generation job polling against a mock backend.

use crate::mock_server::{wait_for, MockServerFixture};
use escruta_client::jobs::{GenerationJobPoller, JobOptions, JobStatus, JobType};
use escruta_client::models::FlashcardsResponse;
use escruta_client::Error;
use mockito::Matcher;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const LATEST_FLASHCARDS: &str = "/notebooks/nb1/tools/jobs/latest/FLASHCARDS";
const GENERATE: &str = "/notebooks/nb1/tools/generate";
const JOB_ABC: &str = "/notebooks/nb1/tools/jobs/abc";

fn job_json(id: &str, status: &str, result: Option<&str>, error: Option<&str>) -> String {
    json!({
        "id": id,
        "notebookId": "nb1",
        "type": "FLASHCARDS",
        "status": status,
        "result": result,
        "errorMessage": error,
        "createdAt": "2024-05-01T10:00:00Z",
        "completedAt": null,
    })
    .to_string()
}

fn fast_options() -> JobOptions {
    JobOptions::default().polling_interval(Duration::from_millis(20))
}

async fn mock_generate(fixture: &MockServerFixture) -> mockito::Mock {
    let mut server = fixture.server.lock().await;
    server
        .mock("POST", GENERATE)
        .match_body(Matcher::Json(json!({ "type": "FLASHCARDS" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jobId":"abc","message":"started"}"#)
        .expect(1)
        .create_async()
        .await
}

#[tokio::test]
async fn test_generation_polls_until_completed() {
    let fixture = MockServerFixture::new().await;
    let _latest = fixture.mock_json("GET", LATEST_FLASHCARDS, 404, "", 1).await;
    let generate = mock_generate(&fixture).await;
    let result = r#"{"flashcards":[{"front":"Q","back":"A"}]}"#;
    let polls = fixture
        .mock_json_sequence(
            "GET",
            JOB_ABC,
            vec![
                job_json("abc", "PROCESSING", None, None),
                job_json("abc", "COMPLETED", Some(result), None),
            ],
            2,
        )
        .await;

    let completed = Arc::new(AtomicUsize::new(0));
    let seen = completed.clone();
    let options = fast_options().on_completed(move |job| {
        assert_eq!(job.status, JobStatus::Completed);
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let poller = GenerationJobPoller::new(fixture.client(), "nb1", JobType::Flashcards, options);

    let started = poller.start_generation().await.unwrap();
    assert_eq!(started.job_id, "abc");
    assert_eq!(started.message, "started");

    let state = poller.state();
    assert_eq!(state.job.as_ref().map(|j| j.status), Some(JobStatus::Pending));
    assert!(state.is_loading());
    assert!(!state.is_starting);

    let job = tokio::time::timeout(Duration::from_secs(5), poller.wait_until_finished())
        .await
        .expect("job never finished")
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    // no further polls once the job is terminal
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(completed.load(Ordering::SeqCst), 1);
    assert!(!poller.is_polling());
    polls.assert_async().await;
    generate.assert_async().await;

    let state = poller.state();
    assert!(state.is_completed());
    assert!(!state.is_loading());
    assert!(state.error.is_none());
    let cards: FlashcardsResponse = state.job.unwrap().parse_result().unwrap();
    assert_eq!(cards.flashcards[0].front, "Q");
}

#[tokio::test]
async fn test_failed_job_stops_polling_with_error() {
    let fixture = MockServerFixture::new().await;
    let _latest = fixture.mock_json("GET", LATEST_FLASHCARDS, 404, "", 1).await;
    let _generate = mock_generate(&fixture).await;
    let poll = fixture
        .mock_json("GET", JOB_ABC, 200, &job_json("abc", "FAILED", None, Some("boom")), 1)
        .await;

    let failed = Arc::new(AtomicUsize::new(0));
    let seen = failed.clone();
    let poller = GenerationJobPoller::new(
        fixture.client(),
        "nb1",
        JobType::Flashcards,
        fast_options().on_failed(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }),
    );
    poller.start_generation().await.unwrap();

    let mut rx = poller.subscribe();
    let state = wait_for(&mut rx, |s| s.is_failed()).await;
    assert_eq!(state.error.as_deref(), Some("boom"));
    assert!(!state.is_loading());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(failed.load(Ordering::SeqCst), 1);
    assert!(!poller.is_polling());
    poll.assert_async().await;
}

#[tokio::test]
async fn test_unfinished_latest_job_is_resumed() {
    let fixture = MockServerFixture::new().await;
    let latest = fixture
        .mock_json("GET", LATEST_FLASHCARDS, 200, &job_json("abc", "PROCESSING", None, None), 1)
        .await;
    let _poll = fixture
        .mock_json("GET", JOB_ABC, 200, &job_json("abc", "COMPLETED", Some("{}"), None), 1)
        .await;

    let poller = GenerationJobPoller::new(fixture.client(), "nb1", JobType::Flashcards, fast_options());
    let mut rx = poller.subscribe();
    let state = wait_for(&mut rx, |s| s.is_completed()).await;

    assert_eq!(state.result(), Some("{}"));
    latest.assert_async().await;
}

#[tokio::test]
async fn test_finished_latest_job_is_not_polled() {
    let fixture = MockServerFixture::new().await;
    let _latest = fixture
        .mock_json("GET", LATEST_FLASHCARDS, 200, &job_json("old", "COMPLETED", Some("{}"), None), 1)
        .await;
    let poll = fixture
        .mock_json("GET", "/notebooks/nb1/tools/jobs/old", 200, "{}", 0)
        .await;

    let poller = GenerationJobPoller::new(fixture.client(), "nb1", JobType::Flashcards, fast_options());
    let mut rx = poller.subscribe();
    wait_for(&mut rx, |s| s.job.is_some()).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!poller.is_polling());
    poll.assert_async().await;
}

#[tokio::test]
async fn test_poll_errors_do_not_stop_polling() {
    let fixture = MockServerFixture::new().await;
    let _latest = fixture.mock_json("GET", LATEST_FLASHCARDS, 404, "", 1).await;
    let _generate = mock_generate(&fixture).await;
    let polls = fixture
        .mock_json_sequence(
            "GET",
            JOB_ABC,
            vec![
                "{not json".to_string(),
                job_json("abc", "COMPLETED", Some("{}"), None),
            ],
            2,
        )
        .await;

    let poller = GenerationJobPoller::new(fixture.client(), "nb1", JobType::Flashcards, fast_options());
    poller.start_generation().await.unwrap();

    let mut rx = poller.subscribe();
    let state = wait_for(&mut rx, |s| s.is_completed()).await;
    assert!(state.error.is_none());
    polls.assert_async().await;
}

#[tokio::test]
async fn test_rejected_start_reports_server_message() {
    let fixture = MockServerFixture::new().await;
    let _latest = fixture.mock_json("GET", LATEST_FLASHCARDS, 404, "", 1).await;
    let _generate = fixture
        .mock_json("POST", GENERATE, 409, r#"{"message":"A job is already running"}"#, 1)
        .await;

    let poller = GenerationJobPoller::new(fixture.client(), "nb1", JobType::Flashcards, fast_options());
    let err = poller.start_generation().await.unwrap_err();
    assert_eq!(err.as_fetch().map(|e| e.status), Some(409));

    let state = poller.state();
    assert_eq!(state.error.as_deref(), Some("A job is already running"));
    assert!(!state.is_starting);
    assert!(state.job.is_none());
    assert!(!poller.is_polling());
}

#[tokio::test]
async fn test_signed_out_start_sends_nothing() {
    let fixture = MockServerFixture::signed_out().await;
    let _latest = fixture.mock_json("GET", LATEST_FLASHCARDS, 404, "", 1).await;
    let generate = fixture.mock_json("POST", GENERATE, 200, "{}", 0).await;

    let poller = GenerationJobPoller::new(fixture.client(), "nb1", JobType::Flashcards, fast_options());
    let err = poller.start_generation().await.unwrap_err();
    assert!(matches!(err, Error::Auth { .. }));
    assert_eq!(poller.state().error.as_deref(), Some("Not authenticated"));
    generate.assert_async().await;
}

#[tokio::test]
async fn test_reset_stops_polling() {
    let fixture = MockServerFixture::new().await;
    let _latest = fixture.mock_json("GET", LATEST_FLASHCARDS, 404, "", 1).await;
    let _generate = mock_generate(&fixture).await;
    let _polls = fixture
        .mock_json("GET", JOB_ABC, 200, &job_json("abc", "PROCESSING", None, None), 1)
        .await;

    let poller = GenerationJobPoller::new(
        fixture.client(),
        "nb1",
        JobType::Flashcards,
        JobOptions::default().polling_interval(Duration::from_secs(60)),
    );
    poller.start_generation().await.unwrap();
    assert!(poller.is_polling());

    poller.reset();
    assert!(!poller.is_polling());
    let state = poller.state();
    assert!(state.job.is_none());
    assert!(state.error.is_none());
    assert!(!state.is_loading());
}

#[tokio::test]
async fn test_dropped_poller_stops_polling() {
    let fixture = MockServerFixture::new().await;
    let _latest = fixture
        .mock_json("GET", LATEST_FLASHCARDS, 200, &job_json("abc", "PROCESSING", None, None), 1)
        .await;
    let poll = fixture
        .mock_json("GET", JOB_ABC, 200, &job_json("abc", "COMPLETED", Some("{}"), None), 0)
        .await;

    let completed = Arc::new(AtomicUsize::new(0));
    let seen = completed.clone();
    let options = JobOptions::default()
        .polling_interval(Duration::from_millis(100))
        .on_completed(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
    let poller = GenerationJobPoller::new(fixture.client(), "nb1", JobType::Flashcards, options);
    let mut rx = poller.subscribe();
    wait_for(&mut rx, |s| s.job.is_some()).await;
    assert!(poller.is_polling());

    drop(poller);
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(completed.load(Ordering::SeqCst), 0);
    assert_eq!(rx.borrow().job.as_ref().map(|j| j.status), Some(JobStatus::Processing));
    poll.assert_async().await;
}
