//! Scenario state for event stream behavioural tests.

use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

/// How a drain ended.
#[derive(Clone)]
pub(crate) enum DrainOutcome {
    /// Every event was delivered and the stream ended cleanly.
    Completed,
    /// A JSON object could not be decoded.
    DecodeFailed(String),
    /// The callback stopped the drain.
    Aborted(String),
    /// The request scope expired first.
    TimedOut,
    /// Any other error.
    Other(String),
}

impl DrainOutcome {
    /// Short description for assertion failures.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Completed => String::from("success"),
            Self::DecodeFailed(message) => format!("decode error: {message}"),
            Self::Aborted(message) => format!("callback error: {message}"),
            Self::TimedOut => String::from("timeout"),
            Self::Other(message) => format!("error: {message}"),
        }
    }
}

#[derive(Default, ScenarioState)]
pub(crate) struct EventStreamState {
    /// Raw bytes the engine sends.
    pub(crate) body: Slot<String>,
    /// Bytes per transport chunk.
    pub(crate) chunk_size: Slot<usize>,
    /// Whether the stream stalls without producing anything.
    pub(crate) stalled: Slot<bool>,
    /// Number of events after which the callback aborts.
    pub(crate) abort_after: Slot<Option<usize>>,
    /// Request scope timeout in milliseconds.
    pub(crate) timeout_ms: Slot<u64>,
    /// Statuses seen by the callback, in order.
    pub(crate) delivered: Slot<Vec<String>>,
    pub(crate) outcome: Slot<DrainOutcome>,
}

#[fixture]
pub(crate) fn event_stream_state() -> EventStreamState {
    let state = EventStreamState::default();
    state.body.set(String::new());
    state.chunk_size.set(64);
    state.stalled.set(false);
    state.abort_after.set(None);
    state.timeout_ms.set(30_000);
    state
}

/// The status carried by the `n`th generated progress event.
pub(crate) fn status_for(n: usize) -> String {
    format!("step {n}")
}
