//! Client handle behaviour against a live mock server

use std::time::Duration;

use fanout_providers::{ClientError, HandleState};
use fanout_types::NonEmptyString;
use wiremock::MockServer;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{TEST_MODEL, completion_body, handle_for, mount_reply};

#[tokio::test]
async fn configured_handle_yields_a_working_client() {
    let server = MockServer::start().await;
    mount_reply(&server, "hello", "hi", Duration::ZERO).await;

    let handle = handle_for(&server, Some("sk-test"));
    let client = handle.get().unwrap();
    assert_eq!(client.model(), TEST_MODEL);
    assert_eq!(client.base_url().host_str(), Some("127.0.0.1"));

    let completion = client
        .prompt(&NonEmptyString::new("hello").unwrap())
        .await
        .unwrap();
    assert_eq!(completion.content, "hi");
    assert_eq!(completion.usage.unwrap().total_tokens, 6);
}

#[tokio::test]
async fn requests_carry_bearer_auth_and_retry_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-secret"))
        .and(header("x-retry-count", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let handle = handle_for(&server, Some("sk-secret"));
    let completion = handle
        .get()
        .unwrap()
        .prompt(&NonEmptyString::new("anything").unwrap())
        .await
        .unwrap();
    assert_eq!(completion.content, "ok");

    let requests = server.received_requests().await.unwrap();
    let key = requests[0]
        .headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(key.starts_with("fanout-retry-"));
}

#[tokio::test]
async fn transient_failures_are_retried_before_surfacing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(2)
        .mount(&server)
        .await;

    let handle = handle_for(&server, Some("sk-test"));
    let err = handle
        .get()
        .unwrap()
        .prompt(&NonEmptyString::new("retry me").unwrap())
        .await
        .unwrap_err();

    match err {
        ClientError::Status {
            status, attempts, ..
        } => {
            assert_eq!(status, 503);
            assert_eq!(attempts, 2);
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn second_get_reuses_the_client() {
    let server = MockServer::start().await;
    let handle = handle_for(&server, Some("sk-test"));

    assert_eq!(handle.state(), HandleState::Uninitialized);
    let first = handle.get().unwrap();
    let second = handle.get().unwrap();

    assert!(std::ptr::eq(first, second));
    assert_eq!(handle.init_attempts(), 1);
}
