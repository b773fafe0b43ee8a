//! Batch prompt runner.
//!
//! Glue between [`fanout_executor`] (bounded fan-out) and
//! [`fanout_providers`] (lazily built completion client). The binary in
//! `main.rs` only handles process concerns: tracing, config, stdin/stdout.

use fanout_executor::{BoundedExecutor, ItemFailure, Outcome, ResultSet};
use fanout_providers::{AiClient, ClientError, ClientHandle, Completion};
use fanout_types::NonEmptyString;
use serde::Serialize;

/// One prompt per line. Blank lines are skipped.
#[must_use]
pub fn parse_prompts(input: &str) -> Vec<NonEmptyString> {
    input
        .lines()
        .filter_map(|line| NonEmptyString::new(line.trim()).ok())
        .collect()
}

/// Send every prompt through `handle` with at most `executor.limit()` calls
/// in flight. Outcome `i` belongs to `prompts[i]`.
pub async fn run_prompts(
    executor: &BoundedExecutor,
    handle: &ClientHandle<AiClient>,
    prompts: Vec<NonEmptyString>,
) -> ResultSet<Completion, ClientError> {
    executor
        .run(prompts, move |prompt, index| async move {
            let client = handle.get()?;
            tracing::debug!(index, "Dispatching prompt");
            client.prompt(&prompt).await
        })
        .await
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Line<'a> {
    Ok { index: usize, content: &'a str },
    Error { index: usize, error: String },
}

/// JSON line for the outcome at `index`.
#[must_use]
pub fn render_line(index: usize, outcome: &Outcome<Completion, ClientError>) -> String {
    let line = match outcome {
        Outcome::Success(completion) => Line::Ok {
            index,
            content: &completion.content,
        },
        Outcome::Failure(reason) => Line::Error {
            index,
            error: describe_failure(reason),
        },
    };
    serde_json::to_string(&line).unwrap_or_else(|e| {
        format!(r#"{{"index":{index},"status":"error","error":"unserializable outcome: {e}"}}"#)
    })
}

fn describe_failure(reason: &ItemFailure<ClientError>) -> String {
    match reason {
        ItemFailure::Failed(err) => err.to_string(),
        ItemFailure::Panicked(msg) => format!("internal error: {msg}"),
    }
}
