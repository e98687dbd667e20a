//! Fetch orchestration against a mock backend: cache, retry, abort, callbacks.

use crate::mock_server::{slow_server, wait_for, MockServerFixture, TEST_TOKEN};
use escruta_client::models::Notebook;
use escruta_client::{Error, FetchErrorKind, FetchMode, FetchOptions};
use mockito::Matcher;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const NOTEBOOKS: &str = r#"[{"id":"1","title":"Foo","createdAt":"2024-01-01"}]"#;

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let c = Arc::new(AtomicUsize::new(0));
    (c.clone(), c)
}

#[tokio::test]
async fn test_notebooks_fetch_publishes_data_and_calls_on_success_once() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/notebooks")
            .match_header("authorization", format!("Bearer {}", TEST_TOKEN).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(NOTEBOOKS)
            .expect(1)
            .create_async()
            .await
    };

    let (calls, seen) = counter();
    let options = FetchOptions::<Vec<Notebook>>::get().on_success(move |list| {
        assert_eq!(list.len(), 1);
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let fetcher = fixture.client().fetcher("/notebooks", options, true);
    assert!(fetcher.state().loading);

    let mut rx = fetcher.subscribe();
    let state = wait_for(&mut rx, |s| !s.loading).await;

    let data = state.data.expect("data");
    assert_eq!(data[0].id, "1");
    assert_eq!(data[0].title, "Foo");
    assert_eq!(data[0].created_at.as_deref(), Some("2024-01-01"));
    assert!(state.error.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fresh_cache_entry_avoids_network() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture.mock_json("GET", "/notebooks", 200, NOTEBOOKS, 1).await;
    let client = fixture.client();

    let first: Vec<Notebook> = client.request("notebooks", &FetchOptions::get()).await.unwrap();
    // a leading slash does not change the key
    let fetcher = client.fetcher("/notebooks", FetchOptions::<Vec<Notebook>>::get(), false);
    let second = fetcher.fetch().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(client.cache().stats().hits, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_skip_cache_and_zero_ttl_always_hit_network() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture.mock_json("GET", "/notebooks", 200, NOTEBOOKS, 3).await;
    let client = fixture.client();

    let _: Vec<Notebook> = client.request("notebooks", &FetchOptions::get()).await.unwrap();
    let _: Vec<Notebook> = client
        .request("notebooks", &FetchOptions::get().skip_cache(true))
        .await
        .unwrap();
    let _: Vec<Notebook> = client
        .request("notebooks", &FetchOptions::get().cache_time(Duration::ZERO))
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_retried_then_reported() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_json("GET", "/notebooks", 500, r#"{"message":"Internal failure"}"#, 3)
        .await;

    let (errors, seen) = counter();
    let options = FetchOptions::<Vec<Notebook>>::get()
        .retry(2)
        .retry_delay(Duration::from_millis(10))
        .on_error(move |e| {
            assert_eq!(e.status, 500);
            seen.fetch_add(1, Ordering::SeqCst);
        });
    let fetcher = fixture.client().fetcher("notebooks", options, false);

    let err = fetcher.fetch().await.unwrap_err();
    let fetch_err = err.as_fetch().expect("fetch error");
    assert_eq!(fetch_err.status, 500);
    assert_eq!(fetch_err.message, "Internal failure");
    assert_eq!(fetch_err.kind, FetchErrorKind::Http);

    let state = fetcher.state();
    assert!(!state.loading);
    assert!(state.data.is_none());
    assert_eq!(state.error.as_ref().map(|e| e.status), Some(500));
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_detail_field_becomes_message() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_json("GET", "/notebooks/42", 404, r#"{"detail":"Notebook not found"}"#, 1)
        .await;

    let err = fixture
        .client()
        .request::<Notebook>("notebooks/42", &FetchOptions::get())
        .await
        .unwrap_err();
    let fetch_err = err.as_fetch().unwrap();
    assert_eq!(fetch_err.status, 404);
    assert_eq!(fetch_err.message, "Notebook not found");
}

#[tokio::test]
async fn test_second_fetch_aborts_first() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_json("GET", "/notebooks", 200, r#"[{"id":"2","title":"Second"}]"#, 1)
        .await;
    // answers after the second request has already committed
    let slow = slow_server(Duration::from_millis(300), r#"[{"id":"1","title":"First"}]"#).await;

    let (successes, seen) = counter();
    let client = fixture.client();
    let slow_options = FetchOptions::<Vec<Notebook>>::get()
        .base_url(Url::parse(&slow).unwrap())
        .on_success(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
    let fetcher = client.fetcher("notebooks", slow_options, false);

    let first = fetcher.start(FetchMode::forced());
    tokio::time::sleep(Duration::from_millis(50)).await;

    fetcher.set_request("notebooks", FetchOptions::get());
    let second = fetcher.refetch(true).await.unwrap();
    assert_eq!(second[0].title, "Second");

    assert!(matches!(first.join().await, Err(Error::Cancelled)));
    tokio::time::sleep(Duration::from_millis(400)).await;

    let state = fetcher.state();
    assert_eq!(state.data.unwrap()[0].title, "Second");
    assert!(!state.loading);
    assert_eq!(successes.load(Ordering::SeqCst), 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_closed_fetcher_never_commits() {
    let slow = slow_server(Duration::from_millis(100), "[]").await;
    let fixture = MockServerFixture::new().await;
    let options = FetchOptions::<Vec<Notebook>>::get().base_url(Url::parse(&slow).unwrap());
    let fetcher = fixture.client().fetcher("notebooks", options, false);

    let task = fetcher.start(FetchMode::silent());
    tokio::time::sleep(Duration::from_millis(20)).await;
    fetcher.close();

    assert!(matches!(task.join().await, Err(Error::Cancelled)));
    assert!(fetcher.is_closed());
    assert_eq!(fetcher.state().data, None);
}

#[tokio::test]
async fn test_post_sends_json_and_is_not_cached() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("POST", "/notebooks")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({ "title": "New" })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"9","title":"New"}"#)
            .expect(2)
            .create_async()
            .await
    };
    let client = fixture.client();
    let options = FetchOptions::<Notebook>::post().json(json!({ "title": "New" }));

    let created = client.request("notebooks", &options).await.unwrap();
    assert_eq!(created.id, "9");
    let _ = client.request("notebooks", &options).await.unwrap();

    assert!(client.cache().is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_query_params_are_sent() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/notebooks/1/conversations")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("size".into(), "20".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"conversations":[],"total":0,"hasMore":false}"#)
            .expect(1)
            .create_async()
            .await
    };

    let page: escruta_client::models::ConversationsPage = fixture
        .client()
        .request(
            "notebooks/1/conversations",
            &FetchOptions::get().param("size", 20).param("page", 2),
        )
        .await
        .unwrap();
    assert!(!page.has_more);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_text_response_decodes_as_string() {
    let fixture = MockServerFixture::new().await;
    let _mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/notebooks/1/summary")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("A short summary")
            .create_async()
            .await
    };

    let summary: String = fixture
        .client()
        .request("notebooks/1/summary", &FetchOptions::get())
        .await
        .unwrap();
    assert_eq!(summary, "A short summary");
}

#[tokio::test]
async fn test_clear_cache_by_endpoint_prefix() {
    let fixture = MockServerFixture::new().await;
    let list = fixture.mock_json("GET", "/notebooks", 200, NOTEBOOKS, 2).await;
    let _one = fixture
        .mock_json("GET", "/notebooks/1", 200, r#"{"id":"1","title":"Foo"}"#, 1)
        .await;
    let client = fixture.client();

    let _: Vec<Notebook> = client.request("notebooks", &FetchOptions::get()).await.unwrap();
    let _: Notebook = client.request("notebooks/1", &FetchOptions::get()).await.unwrap();
    assert_eq!(client.cache().len(), 2);

    client.clear_cache(Some("/notebooks"));
    assert!(client.cache().is_empty());

    let _: Vec<Notebook> = client.request("notebooks", &FetchOptions::get()).await.unwrap();
    list.assert_async().await;
}

#[tokio::test]
async fn test_changed_request_refetches_immediate_fetcher() {
    let fixture = MockServerFixture::new().await;
    let _a = fixture
        .mock_json("GET", "/notebooks/a", 200, r#"{"id":"a","title":"A"}"#, 1)
        .await;
    let _b = fixture
        .mock_json("GET", "/notebooks/b", 200, r#"{"id":"b","title":"B"}"#, 1)
        .await;

    let fetcher = fixture
        .client()
        .fetcher("notebooks/a", FetchOptions::<Notebook>::get(), true);
    let mut rx = fetcher.subscribe();
    wait_for(&mut rx, |s| s.data.as_ref().is_some_and(|n| n.id == "a")).await;

    fetcher.set_request("notebooks/b", FetchOptions::get());
    let state = wait_for(&mut rx, |s| s.data.as_ref().is_some_and(|n| n.id == "b")).await;
    assert!(!state.loading);
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let fixture = MockServerFixture::new().await;
    let options = FetchOptions::<Vec<Notebook>>::get()
        .base_url(Url::parse("http://127.0.0.1:9/").unwrap())
        .retry(1)
        .retry_delay(Duration::from_millis(5));

    let err = fixture.client().request("notebooks", &options).await.unwrap_err();
    let fetch_err = err.as_fetch().unwrap();
    assert_eq!(fetch_err.status, 0);
    assert_eq!(fetch_err.kind, FetchErrorKind::Network);
}

#[tokio::test]
async fn test_retry_delays_grow_per_attempt() {
    let fixture = MockServerFixture::new().await;
    let arrivals = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = arrivals.clone();
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/notebooks")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |_| {
                seen.lock().unwrap().push(std::time::Instant::now());
                br#"{"message":"down"}"#.to_vec()
            })
            .expect(3)
            .create_async()
            .await
    };

    let delay = Duration::from_millis(60);
    let options = FetchOptions::<Vec<Notebook>>::get().retry(2).retry_delay(delay);
    let started = std::time::Instant::now();
    let err = fixture.client().request("notebooks", &options).await.unwrap_err();
    assert_eq!(err.as_fetch().map(|e| e.status), Some(500));
    assert!(started.elapsed() >= delay * 3);

    let arrivals = arrivals.lock().unwrap().clone();
    assert_eq!(arrivals.len(), 3);
    let first_gap = arrivals[1] - arrivals[0];
    let second_gap = arrivals[2] - arrivals[1];
    assert!(first_gap >= delay);
    assert!(second_gap >= delay * 2);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_signed_out_request_is_sent_without_authorization() {
    let fixture = MockServerFixture::signed_out().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/notebooks")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(NOTEBOOKS)
            .expect(1)
            .create_async()
            .await
    };

    let list: Vec<Notebook> = fixture
        .client()
        .request("notebooks", &FetchOptions::get())
        .await
        .unwrap();
    assert_eq!(list.len(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetchers_do_not_cancel_each_other() {
    let slow = slow_server(Duration::from_millis(100), r#"[{"id":"1","title":"Foo"}]"#).await;
    let fixture = MockServerFixture::new().await;
    let client = fixture.client();
    let (successes, seen) = counter();
    let options = FetchOptions::<Vec<Notebook>>::get()
        .base_url(Url::parse(&slow).unwrap())
        .on_success(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

    let a = client.fetcher("notebooks", options.clone(), false);
    let b = client.fetcher("notebooks", options, false);
    let first = a.start(FetchMode::forced());
    let second = b.start(FetchMode::forced());

    assert_eq!(first.join().await.unwrap()[0].id, "1");
    assert_eq!(second.join().await.unwrap()[0].id, "1");
    assert_eq!(successes.load(Ordering::SeqCst), 2);
    assert!(a.state().data.is_some());
    assert!(b.state().data.is_some());
}

#[tokio::test]
async fn test_dropped_fetcher_never_commits() {
    let slow = slow_server(Duration::from_millis(150), "[]").await;
    let fixture = MockServerFixture::new().await;
    let (successes, seen) = counter();
    let options = FetchOptions::<Vec<Notebook>>::get()
        .base_url(Url::parse(&slow).unwrap())
        .on_success(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

    let fetcher = fixture.client().fetcher("notebooks", options, true);
    let rx = fetcher.subscribe();
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(fetcher);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(successes.load(Ordering::SeqCst), 0);
    let state = rx.borrow().clone();
    assert!(state.data.is_none());
    assert!(state.loading);
}
