//! Assertion helpers for event stream behavioural tests.

use rstest_bdd_macros::then;

use super::StepResult;
use super::state::{DrainOutcome, EventStreamState, status_for};

fn outcome(state: &EventStreamState) -> StepResult<DrainOutcome> {
    state
        .outcome
        .get()
        .ok_or_else(|| String::from("outcome should be set"))
}

#[then("{count} events are delivered in order")]
fn events_are_delivered_in_order(
    event_stream_state: &EventStreamState,
    count: usize,
) -> StepResult<()> {
    let delivered = event_stream_state
        .delivered
        .get()
        .ok_or_else(|| String::from("delivered events should be set"))?;
    let expected: Vec<String> = (1..=count).map(status_for).collect();
    if delivered == expected {
        Ok(())
    } else {
        Err(format!("expected {expected:?}, got {delivered:?}"))
    }
}

#[then("draining succeeds")]
fn draining_succeeds(event_stream_state: &EventStreamState) -> StepResult<()> {
    match outcome(event_stream_state)? {
        DrainOutcome::Completed => Ok(()),
        other => Err(format!("expected success, got {}", other.describe())),
    }
}

#[then("draining fails with a decode error")]
fn draining_fails_with_decode_error(event_stream_state: &EventStreamState) -> StepResult<()> {
    match outcome(event_stream_state)? {
        DrainOutcome::DecodeFailed(_) => Ok(()),
        other => Err(format!("expected a decode error, got {}", other.describe())),
    }
}

#[then("draining fails with the callback error")]
fn draining_fails_with_callback_error(event_stream_state: &EventStreamState) -> StepResult<()> {
    match outcome(event_stream_state)? {
        DrainOutcome::Aborted(message) if message == "seen enough" => Ok(()),
        other => Err(format!("expected the callback error, got {}", other.describe())),
    }
}

#[then("draining fails with a timeout")]
fn draining_fails_with_timeout(event_stream_state: &EventStreamState) -> StepResult<()> {
    match outcome(event_stream_state)? {
        DrainOutcome::TimedOut => Ok(()),
        other => Err(format!("expected a timeout, got {}", other.describe())),
    }
}
