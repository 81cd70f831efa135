//! Given/when steps for event stream scenarios.

use std::io;
use std::time::Duration;

use dockhand::engine::RequestScope;
use dockhand::error::{DockhandError, StreamError};
use dockhand::stream::ndjson::decode_events;
use dockhand::stream::{EventStream, PullEvent, drain};
use futures_util::stream;
use rstest_bdd_macros::{given, when};

use super::StepResult;
use super::state::{DrainOutcome, EventStreamState, status_for};

fn append(state: &EventStreamState, text: &str) -> StepResult<()> {
    let mut body = state
        .body
        .get()
        .ok_or_else(|| String::from("body should be initialised"))?;
    body.push_str(text);
    state.body.set(body);
    Ok(())
}

#[given("a pull stream of {count} progress events")]
fn a_pull_stream_of_events(event_stream_state: &EventStreamState, count: usize) -> StepResult<()> {
    let body: String = (1..=count)
        .map(|n| {
            format!(
                "{{\"status\":\"{}\",\"progressDetail\":{{\"current\":{n},\"total\":{count}}}}}\r\n",
                status_for(n)
            )
        })
        .collect();
    append(event_stream_state, &body)
}

#[given("the stream arrives in chunks of {size} bytes")]
fn the_stream_arrives_in_chunks(
    event_stream_state: &EventStreamState,
    size: usize,
) -> StepResult<()> {
    if size == 0 {
        return Err(String::from("chunk size must be positive"));
    }
    event_stream_state.chunk_size.set(size);
    Ok(())
}

#[given("a malformed event follows")]
fn a_malformed_event_follows(event_stream_state: &EventStreamState) -> StepResult<()> {
    append(event_stream_state, "{\"status\": Downloading}\r\n")
}

#[given("the stream is cut off inside the last event")]
fn the_stream_is_cut_off(event_stream_state: &EventStreamState) -> StepResult<()> {
    let body = event_stream_state
        .body
        .get()
        .ok_or_else(|| String::from("body should be initialised"))?;
    let cut = body
        .len()
        .checked_sub(12)
        .ok_or_else(|| String::from("body is too short to cut"))?;
    event_stream_state
        .body
        .set(body.get(..cut).unwrap_or_default().to_owned());
    Ok(())
}

#[given("the callback aborts after {count} events")]
#[expect(
    clippy::unnecessary_wraps,
    reason = "rstest-bdd step functions must return StepResult for consistency"
)]
fn the_callback_aborts_after(
    event_stream_state: &EventStreamState,
    count: usize,
) -> StepResult<()> {
    event_stream_state.abort_after.set(Some(count));
    Ok(())
}

#[given("a stream that never produces an event")]
#[expect(
    clippy::unnecessary_wraps,
    reason = "rstest-bdd step functions must return StepResult for consistency"
)]
fn a_stalled_stream(event_stream_state: &EventStreamState) -> StepResult<()> {
    event_stream_state.stalled.set(true);
    Ok(())
}

#[given("the request scope allows {millis} milliseconds")]
#[expect(
    clippy::unnecessary_wraps,
    reason = "rstest-bdd step functions must return StepResult for consistency"
)]
fn the_request_scope_allows(event_stream_state: &EventStreamState, millis: u64) -> StepResult<()> {
    event_stream_state.timeout_ms.set(millis);
    Ok(())
}

/// Split `body` into transport chunks of at most `size` bytes.
fn chunks_of(body: &str, size: usize) -> Vec<Result<Vec<u8>, io::Error>> {
    body.as_bytes()
        .chunks(size)
        .map(|chunk| Ok(chunk.to_vec()))
        .collect()
}

fn open_stream(state: &EventStreamState) -> StepResult<EventStream<'static, PullEvent>> {
    if state.stalled.get().unwrap_or(false) {
        return Ok(decode_events(
            stream::pending::<Result<Vec<u8>, io::Error>>(),
        ));
    }
    let body = state
        .body
        .get()
        .ok_or_else(|| String::from("body should be initialised"))?;
    let size = state.chunk_size.get().unwrap_or(64);
    Ok(decode_events(stream::iter(chunks_of(&body, size))))
}

#[when("the stream is drained")]
fn the_stream_is_drained(event_stream_state: &EventStreamState) -> StepResult<()> {
    let events = open_stream(event_stream_state)?;
    let timeout = Duration::from_millis(event_stream_state.timeout_ms.get().unwrap_or(30_000));
    let abort_after = event_stream_state.abort_after.get().flatten();

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| format!("failed to create tokio runtime: {e}"))?;
    let mut delivered = Vec::new();
    let result = rt.block_on(drain(Ok(events), RequestScope::new(timeout), |event| {
        if abort_after.is_some_and(|limit| delivered.len() >= limit) {
            return Err(StreamError::Aborted {
                message: String::from("seen enough"),
            }
            .into());
        }
        delivered.push(event.status.clone());
        Ok(())
    }));

    let outcome = match result {
        Ok(()) => DrainOutcome::Completed,
        Err(DockhandError::Stream(StreamError::Decode { message })) => {
            DrainOutcome::DecodeFailed(message)
        }
        Err(DockhandError::Stream(StreamError::Aborted { message })) => {
            DrainOutcome::Aborted(message)
        }
        Err(DockhandError::Stream(StreamError::TimedOut { .. })) => DrainOutcome::TimedOut,
        Err(other) => DrainOutcome::Other(other.to_string()),
    };
    event_stream_state.delivered.set(delivered);
    event_stream_state.outcome.set(outcome);
    Ok(())
}
