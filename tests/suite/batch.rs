//! End-to-end batches through the executor and a mocked completion service

use std::num::NonZeroUsize;
use std::time::Duration;

use fanout::{parse_prompts, render_line, run_prompts};
use fanout_executor::{BoundedExecutor, ItemFailure};
use fanout_providers::{ClientError, ConfigError, HandleState};
use wiremock::MockServer;

use crate::common::{handle_for, mount_rejection, mount_reply};

#[tokio::test]
async fn mixed_batch_keeps_input_order() {
    let server = MockServer::start().await;
    // Earlier prompts answer later, so completion order is reversed.
    mount_reply(&server, "first", "one", Duration::from_millis(120)).await;
    mount_reply(&server, "second", "two", Duration::from_millis(60)).await;
    mount_rejection(&server, "third", 400, "bad request").await;
    mount_reply(&server, "fourth", "four", Duration::ZERO).await;

    let handle = handle_for(&server, Some("sk-test"));
    let executor = BoundedExecutor::try_new(4).unwrap();
    let prompts = parse_prompts("first\nsecond\n\nthird\nfourth\n");

    let results = run_prompts(&executor, &handle, prompts).await;

    assert_eq!(results.len(), 4);
    assert_eq!(results.success_count(), 3);
    assert_eq!(results[0].success().unwrap().content, "one");
    assert_eq!(results[1].success().unwrap().content, "two");
    assert_eq!(results[3].success().unwrap().content, "four");

    match results[2].failure() {
        Some(ItemFailure::Failed(ClientError::Status { status, attempts, .. })) => {
            assert_eq!(*status, 400);
            assert_eq!(*attempts, 1);
        }
        other => panic!("expected a status failure, got {other:?}"),
    }

    assert_eq!(handle.state(), HandleState::Ready);
    assert_eq!(handle.init_attempts(), 1);
}

#[tokio::test]
async fn rendered_lines_follow_input_positions() {
    let server = MockServer::start().await;
    mount_reply(&server, "ping", "pong", Duration::ZERO).await;
    mount_rejection(&server, "nope", 422, "unprocessable").await;

    let handle = handle_for(&server, Some("sk-test"));
    let executor = BoundedExecutor::new(NonZeroUsize::MIN);
    let results = run_prompts(&executor, &handle, parse_prompts("ping\nnope")).await;

    let lines: Vec<serde_json::Value> = results
        .iter()
        .enumerate()
        .map(|(index, outcome)| serde_json::from_str(&render_line(index, outcome)).unwrap())
        .collect();

    assert_eq!(
        lines[0],
        serde_json::json!({"index": 0, "status": "ok", "content": "pong"})
    );
    assert_eq!(lines[1]["index"], 1);
    assert_eq!(lines[1]["status"], "error");
    assert!(lines[1]["error"].as_str().unwrap().contains("422"));
}

#[tokio::test]
async fn missing_credential_fails_every_item_without_aborting() {
    let server = MockServer::start().await;
    let handle = handle_for(&server, None);
    let executor = BoundedExecutor::try_new(2).unwrap();

    let results = run_prompts(&executor, &handle, parse_prompts("a\nb\nc")).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results.failure_count(), 3);
    for outcome in &results {
        match outcome.failure() {
            Some(ItemFailure::Failed(err)) => {
                assert!(err.is_config());
                assert!(matches!(
                    err,
                    ClientError::Config(ConfigError::MissingCredential { .. })
                ));
            }
            other => panic!("expected a configuration failure, got {other:?}"),
        }
    }

    // Each item retried construction; nothing was cached.
    assert_eq!(handle.init_attempts(), 3);
    assert_eq!(handle.state(), HandleState::Uninitialized);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_input_makes_no_requests() {
    let server = MockServer::start().await;
    let handle = handle_for(&server, Some("sk-test"));
    let executor = BoundedExecutor::try_new(3).unwrap();

    let results = run_prompts(&executor, &handle, parse_prompts("\n  \n")).await;

    assert!(results.is_empty());
    assert_eq!(handle.state(), HandleState::Uninitialized);
    assert!(server.received_requests().await.unwrap().is_empty());
}
