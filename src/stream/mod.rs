//! Consuming engine progress streams.
//!
//! Pulls and builds answer with a long-lived stream of JSON objects. The
//! [`ndjson`] decoder turns the raw bytes into typed events, and [`drain`]
//! feeds those events to a callback one at a time while a
//! [`RequestScope`] bounds how long the whole operation may take.

mod events;
pub mod ndjson;

use std::pin::Pin;

use futures_util::stream::{Stream, StreamExt};

pub use events::{BuildEvent, ProgressDetail, PullEvent, log_build_event, log_pull_event};

use crate::engine::RequestScope;
use crate::error::{Result, StreamError};

/// A boxed stream of decoded events.
pub type EventStream<'a, E> = Pin<Box<dyn Stream<Item = std::result::Result<E, StreamError>> + Send + 'a>>;

/// Feed every event of an opened stream to `on_event`.
///
/// `opened` is the outcome of starting the operation and `scope` is the
/// request scope it was started under. Both are owned here and released
/// when this function returns, on every path: the stream first, then the
/// scope.
///
/// Decoding stops at the end of the stream. Each event is borrowed by the
/// callback only for the duration of the call.
///
/// # Errors
///
/// Returns the error from `opened` if the operation could not be started,
/// `StreamError::Cancelled` or `StreamError::TimedOut` if the scope ends
/// first, any decode or transport error from the stream, and the callback's
/// own error unchanged if it returns one.
pub async fn drain<E, F>(
    opened: Result<EventStream<'_, E>>,
    scope: RequestScope,
    mut on_event: F,
) -> Result<()>
where
    F: FnMut(&E) -> Result<()>,
{
    let mut events = opened?;
    while let Some(item) = scope.guard(events.next()).await? {
        let event = item?;
        on_event(&event)?;
    }
    Ok(())
}
