//! Wire-level behavior of the HTTP fetcher.

use snapvault_core::Fetcher;
use snapvault_fetch::HttpFetcher;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetches_payload_and_media_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/etfs/IE00B4L5Y983"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("{\"ter\":0.2}", "application/json"),
        )
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(format!("{}/etfs/{{resource}}", server.uri())).unwrap();
    let payload = fetcher.fetch("IE00B4L5Y983").await.unwrap();

    assert_eq!(&payload.body[..], b"{\"ter\":0.2}");
    assert_eq!(payload.media_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn identifies_itself_with_a_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("user-agent", concat!("snapvault-fetch/", env!("CARGO_PKG_VERSION"))))
        .respond_with(ResponseTemplate::new(200).set_body_raw("ok", "text/plain"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(format!("{}/data?id={{resource}}", server.uri())).unwrap();
    fetcher.fetch("x").await.unwrap();
}

#[tokio::test]
async fn transient_failure_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("recovered", "text/plain"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(format!("{}/flaky?r={{resource}}", server.uri()))
        .unwrap()
        .with_max_retries(2);
    let payload = fetcher.fetch("x").await.unwrap();
    assert_eq!(&payload.body[..], b"recovered");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(format!("{}/missing?r={{resource}}", server.uri()))
        .unwrap()
        .with_max_retries(3);
    let err = fetcher.fetch("x").await.unwrap_err();

    assert_eq!(err.status, Some(404));
    assert!(!err.retryable);
}

#[tokio::test]
async fn retry_budget_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2) // initial attempt + one retry
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(format!("{}/down?r={{resource}}", server.uri()))
        .unwrap()
        .with_max_retries(1);
    let err = fetcher.fetch("x").await.unwrap_err();

    assert_eq!(err.status, Some(500));
    assert!(err.retryable);
}
