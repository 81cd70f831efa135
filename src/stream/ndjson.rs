//! Incremental decoding of concatenated JSON objects.
//!
//! The engine writes progress as a sequence of JSON objects, usually one per
//! line, but chunk boundaries from the transport fall anywhere. The decoder
//! buffers bytes until a whole object is available, yields it, and keeps the
//! remainder for the next object. An incomplete buffer is parsed again only
//! once a closing brace arrives, so a large event costs one parse per brace
//! rather than one per chunk.

use std::fmt;
use std::pin::Pin;

use futures_util::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;

use super::EventStream;
use crate::error::StreamError;

/// Largest single event the decoder will buffer before giving up.
pub const MAX_EVENT_BYTES: usize = 8 * 1024 * 1024;

/// Decode a chunked byte stream into typed events.
///
/// Whitespace between objects is ignored. The returned stream ends after the
/// first error: a malformed object, a truncated trailing object, an object
/// larger than [`MAX_EVENT_BYTES`], or a failure of the byte stream itself.
pub fn decode_events<'a, E, S, B, X>(chunks: S) -> EventStream<'a, E>
where
    E: DeserializeOwned + Send + 'a,
    S: Stream<Item = Result<B, X>> + Send + 'a,
    B: AsRef<[u8]> + Send,
    X: fmt::Display + Send,
{
    decode_events_with_limit(chunks, MAX_EVENT_BYTES)
}

/// Decode a chunked byte stream with an explicit per-event byte limit.
pub fn decode_events_with_limit<'a, E, S, B, X>(chunks: S, limit: usize) -> EventStream<'a, E>
where
    E: DeserializeOwned + Send + 'a,
    S: Stream<Item = Result<B, X>> + Send + 'a,
    B: AsRef<[u8]> + Send,
    X: fmt::Display + Send,
{
    let decoder = Decoder {
        chunks: Box::pin(chunks),
        buffer: Vec::new(),
        scanned: 0,
        limit,
        finished: false,
    };
    Box::pin(stream::unfold(decoder, |mut decoder| async move {
        let item = decoder.next_event::<E>().await?;
        Some((item, decoder))
    }))
}

struct Decoder<S> {
    chunks: Pin<Box<S>>,
    buffer: Vec<u8>,
    /// Length of the buffer prefix already known not to end an object.
    scanned: usize,
    limit: usize,
    finished: bool,
}

enum Attempt<E> {
    Event(E),
    NeedMore,
    Malformed(StreamError),
}

impl<S, B, X> Decoder<S>
where
    S: Stream<Item = Result<B, X>>,
    B: AsRef<[u8]>,
    X: fmt::Display,
{
    async fn next_event<E: DeserializeOwned>(&mut self) -> Option<Result<E, StreamError>> {
        if self.finished {
            return None;
        }
        loop {
            if self.may_complete() {
                match self.try_decode::<E>() {
                    Attempt::Event(event) => return Some(Ok(event)),
                    Attempt::Malformed(error) => return Some(Err(self.finish(error))),
                    Attempt::NeedMore => {}
                }
            }

            if self.buffer.len() > self.limit {
                let error = StreamError::EventTooLarge { limit: self.limit };
                return Some(Err(self.finish(error)));
            }

            match self.chunks.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    let error = StreamError::Transport {
                        message: e.to_string(),
                    };
                    return Some(Err(self.finish(error)));
                }
                None => {
                    self.finished = true;
                    if self.buffer.iter().all(u8::is_ascii_whitespace) {
                        return None;
                    }
                    return Some(Err(StreamError::Decode {
                        message: String::from("stream ended inside a JSON object"),
                    }));
                }
            }
        }
    }

    /// Whether bytes arrived since the last incomplete parse that could
    /// close an object.
    fn may_complete(&self) -> bool {
        self.buffer
            .get(self.scanned..)
            .is_some_and(|fresh| fresh.contains(&b'}'))
    }

    fn try_decode<E: DeserializeOwned>(&mut self) -> Attempt<E> {
        let mut objects = serde_json::Deserializer::from_slice(&self.buffer).into_iter::<E>();
        match objects.next() {
            None => {
                self.buffer.clear();
                self.scanned = 0;
                Attempt::NeedMore
            }
            Some(Ok(event)) => {
                let consumed = objects.byte_offset();
                self.buffer.drain(..consumed);
                self.scanned = 0;
                Attempt::Event(event)
            }
            Some(Err(e)) if e.is_eof() => {
                self.scanned = self.buffer.len();
                Attempt::NeedMore
            }
            Some(Err(e)) => Attempt::Malformed(StreamError::Decode {
                message: e.to_string(),
            }),
        }
    }

    fn finish(&mut self, error: StreamError) -> StreamError {
        self.finished = true;
        self.buffer.clear();
        self.scanned = 0;
        error
    }
}
