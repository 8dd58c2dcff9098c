//! Bounded streaming of a request body into memory.
//!
//! # States
//! ```text
//! start ──declared > limit──▶ LimitExceeded
//!   │
//!   ▼
//! Streaming ──received > limit──▶ LimitExceeded
//!           ──stream error──────▶ StreamError
//!           ──end, received ≠ declared──▶ LengthMismatch
//!           ──end, 0 bytes, reject_empty──▶ EmptyBody
//!           ──end──▶ Success
//! ```
//!
//! # Design Decisions
//! - The limit is checked before a chunk is kept, so memory stays under
//!   `limit + one chunk`
//! - Every terminal transition happens once; events after it are ignored
//! - Buffer mode keeps chunks and concatenates once at the end
//! - The stream is dropped before the outcome is handed back

use axum::body::Bytes;
use axum::BoxError;
use futures_util::StreamExt;

use crate::body::error::BodyError;
use crate::body::parser::{ParseAs, RawBody};
use crate::body::stream::BodyStream;

/// Upper bound on the up-front text buffer; `Content-Length` is only a hint.
const MAX_PREALLOCATION: usize = 8 * 1024;

/// Where an ingestion stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Streaming,
    Success,
    LimitExceeded,
    LengthMismatch,
    EmptyBody,
    StreamError,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        self != Phase::Streaming
    }
}

/// One event from the body stream.
#[derive(Debug)]
pub enum BodyEvent {
    Data(Bytes),
    Error(BoxError),
    End,
}

#[derive(Debug)]
enum Accumulator {
    Text(Vec<u8>),
    Buffer(Vec<Bytes>),
}

impl Accumulator {
    fn push(&mut self, chunk: Bytes) {
        match self {
            Accumulator::Text(bytes) => bytes.extend_from_slice(&chunk),
            Accumulator::Buffer(chunks) => chunks.push(chunk),
        }
    }

    fn finish(self, received: usize) -> RawBody {
        match self {
            Accumulator::Text(bytes) => RawBody::Text(match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(invalid) => String::from_utf8_lossy(invalid.as_bytes()).into_owned(),
            }),
            Accumulator::Buffer(mut chunks) => {
                if chunks.len() == 1 {
                    return RawBody::Buffer(chunks.remove(0));
                }
                let mut joined = Vec::with_capacity(received);
                for chunk in &chunks {
                    joined.extend_from_slice(chunk);
                }
                RawBody::Buffer(Bytes::from(joined))
            }
        }
    }
}

/// Per-request ingestion accounting.
#[derive(Debug)]
pub struct Ingestion {
    phase: Phase,
    received: usize,
    declared: Option<usize>,
    limit: usize,
    reject_empty: bool,
    content_type: String,
    accumulator: Option<Accumulator>,
}

impl Ingestion {
    /// Start an ingestion, failing at once if the declared length is over the limit.
    pub fn start(
        parse_as: ParseAs,
        declared: Option<usize>,
        limit: usize,
        reject_empty: bool,
        content_type: &str,
    ) -> Result<Self, BodyError> {
        if let Some(size) = declared {
            if size > limit {
                tracing::warn!(declared = size, limit, "Declared body length exceeds limit");
                return Err(BodyError::TooLarge { size, limit });
            }
        }

        let accumulator = match parse_as {
            ParseAs::String => Accumulator::Text(Vec::with_capacity(
                declared.unwrap_or(0).min(MAX_PREALLOCATION),
            )),
            ParseAs::Buffer => Accumulator::Buffer(Vec::new()),
        };

        Ok(Self {
            phase: Phase::Streaming,
            received: 0,
            declared,
            limit,
            reject_empty,
            content_type: content_type.to_string(),
            accumulator: Some(accumulator),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn received(&self) -> usize {
        self.received
    }

    /// Feed one stream event. Returns the outcome on the terminal transition only.
    pub fn feed(&mut self, event: BodyEvent) -> Option<Result<RawBody, BodyError>> {
        if self.phase.is_terminal() {
            tracing::trace!(phase = ?self.phase, "Ignoring body event after completion");
            return None;
        }

        match event {
            BodyEvent::Data(chunk) => {
                self.received = self.received.saturating_add(chunk.len());
                if self.received > self.limit {
                    let error = BodyError::TooLarge {
                        size: self.received,
                        limit: self.limit,
                    };
                    return Some(Err(self.fail(Phase::LimitExceeded, error)));
                }
                if let Some(accumulator) = self.accumulator.as_mut() {
                    accumulator.push(chunk);
                }
                None
            }
            BodyEvent::Error(source) => Some(Err(self.fail(Phase::StreamError, BodyError::Stream(source)))),
            BodyEvent::End => Some(self.end()),
        }
    }

    fn end(&mut self) -> Result<RawBody, BodyError> {
        if let Some(declared) = self.declared {
            if declared != self.received {
                let error = BodyError::LengthMismatch {
                    declared,
                    received: self.received,
                };
                return Err(self.fail(Phase::LengthMismatch, error));
            }
        }

        if self.received == 0 && self.reject_empty {
            let error = BodyError::EmptyBody {
                content_type: self.content_type.clone(),
            };
            return Err(self.fail(Phase::EmptyBody, error));
        }

        self.phase = Phase::Success;
        let body = match self.accumulator.take() {
            Some(accumulator) => accumulator.finish(self.received),
            None => RawBody::Buffer(Bytes::new()),
        };
        Ok(body)
    }

    fn fail(&mut self, phase: Phase, error: BodyError) -> BodyError {
        self.phase = phase;
        self.accumulator = None;
        tracing::warn!(
            phase = ?phase,
            received = self.received,
            limit = self.limit,
            error = %error,
            "Body ingestion failed"
        );
        error
    }

    /// Drive the ingestion from `stream` to a terminal state.
    pub async fn read(&mut self, mut stream: BodyStream) -> Result<RawBody, BodyError> {
        loop {
            let event = match stream.next().await {
                Some(Ok(chunk)) => BodyEvent::Data(chunk),
                Some(Err(error)) => BodyEvent::Error(error),
                None => BodyEvent::End,
            };

            if let Some(outcome) = self.feed(event) {
                drop(stream);
                return outcome;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(s: &'static str) -> BodyEvent {
        BodyEvent::Data(Bytes::from_static(s.as_bytes()))
    }

    #[test]
    fn test_declared_length_over_limit() {
        let err = Ingestion::start(ParseAs::String, Some(2000), 1000, false, "text/plain").unwrap_err();
        assert!(matches!(err, BodyError::TooLarge { size: 2000, limit: 1000 }));
    }

    #[test]
    fn test_declared_length_does_not_preallocate() {
        let limit = 64 * 1024 * 1024;
        let mut ingestion = Ingestion::start(ParseAs::String, Some(limit), limit, false, "text/plain").unwrap();
        match &ingestion.accumulator {
            Some(Accumulator::Text(bytes)) => assert!(bytes.capacity() <= MAX_PREALLOCATION),
            other => panic!("unexpected accumulator: {other:?}"),
        }

        assert!(matches!(
            ingestion.feed(BodyEvent::End),
            Some(Err(BodyError::LengthMismatch { declared, received: 0 })) if declared == limit
        ));
    }

    #[test]
    fn test_string_success() {
        let mut ingestion = Ingestion::start(ParseAs::String, Some(11), 100, true, "application/json").unwrap();
        assert!(ingestion.feed(chunk("hello ")).is_none());
        assert!(ingestion.feed(chunk("world")).is_none());
        match ingestion.feed(BodyEvent::End) {
            Some(Ok(RawBody::Text(text))) => assert_eq!(text, "hello world"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(ingestion.phase(), Phase::Success);
    }

    #[test]
    fn test_buffer_concatenated_at_end() {
        let mut ingestion = Ingestion::start(ParseAs::Buffer, None, 100, false, "application/octet-stream").unwrap();
        ingestion.feed(chunk("ab"));
        ingestion.feed(chunk("cd"));
        ingestion.feed(chunk("e"));
        match ingestion.feed(BodyEvent::End) {
            Some(Ok(RawBody::Buffer(bytes))) => assert_eq!(&bytes[..], b"abcde"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_limit_exceeded_then_late_events_ignored() {
        let mut ingestion = Ingestion::start(ParseAs::String, None, 5, false, "text/plain").unwrap();
        assert!(ingestion.feed(chunk("abc")).is_none());
        assert!(matches!(
            ingestion.feed(chunk("def")),
            Some(Err(BodyError::TooLarge { size: 6, limit: 5 }))
        ));
        assert_eq!(ingestion.phase(), Phase::LimitExceeded);

        assert!(ingestion.feed(chunk("late")).is_none());
        assert!(ingestion.feed(BodyEvent::End).is_none());
        assert!(ingestion.feed(BodyEvent::Error("late error".into())).is_none());
        assert_eq!(ingestion.received(), 6);
    }

    #[test]
    fn test_length_mismatch() {
        let mut ingestion = Ingestion::start(ParseAs::String, Some(10), 100, false, "text/plain").unwrap();
        ingestion.feed(chunk("1234567"));
        assert!(matches!(
            ingestion.feed(BodyEvent::End),
            Some(Err(BodyError::LengthMismatch { declared: 10, received: 7 }))
        ));
        assert_eq!(ingestion.phase(), Phase::LengthMismatch);
    }

    #[test]
    fn test_empty_body_only_when_rejected() {
        let mut strict = Ingestion::start(ParseAs::String, None, 100, true, "application/json").unwrap();
        assert!(matches!(
            strict.feed(BodyEvent::End),
            Some(Err(BodyError::EmptyBody { .. }))
        ));
        assert_eq!(strict.phase(), Phase::EmptyBody);

        let mut lenient = Ingestion::start(ParseAs::String, Some(0), 100, false, "text/plain").unwrap();
        match lenient.feed(BodyEvent::End) {
            Some(Ok(RawBody::Text(text))) => assert!(text.is_empty()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_stream_error() {
        let mut ingestion = Ingestion::start(ParseAs::Buffer, None, 100, false, "x/y").unwrap();
        ingestion.feed(chunk("partial"));
        assert!(matches!(
            ingestion.feed(BodyEvent::Error("connection reset".into())),
            Some(Err(BodyError::Stream(_)))
        ));
        assert_eq!(ingestion.phase(), Phase::StreamError);
        assert!(ingestion.feed(BodyEvent::End).is_none());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut ingestion = Ingestion::start(ParseAs::String, None, 100, false, "text/plain").unwrap();
        ingestion.feed(BodyEvent::Data(Bytes::from_static(&[b'o', b'k', 0xff])));
        match ingestion.feed(BodyEvent::End) {
            Some(Ok(RawBody::Text(text))) => assert_eq!(text, "ok\u{fffd}"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_stops_on_endless_stream() {
        let endless = futures_util::stream::repeat_with(|| Ok::<_, BoxError>(Bytes::from_static(&[0u8; 64])));
        let mut ingestion = Ingestion::start(ParseAs::Buffer, None, 1000, false, "x/y").unwrap();
        let err = ingestion.read(BodyStream::new(endless)).await.unwrap_err();
        assert!(matches!(err, BodyError::TooLarge { size: 1024, limit: 1000 }));
    }
}
