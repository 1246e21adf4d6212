//! Event stream adapter
//!
//! Decodes the runner's newline-delimited JSON stream into typed
//! [`RunEvent`] values. Each line is one object:
//!
//! ```json
//! {"type": "fail", "payload": {"duration": 12, "error": {"stack": "..."}}}
//! ```
//!
//! Unknown event types decode to [`RunEvent::Unknown`]; a known type with a
//! malformed payload is an error and nothing is applied for that line.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::BufRead;

use crate::constants::{
    EVENT_END, EVENT_FAIL, EVENT_HOOK, EVENT_HOOK_END, EVENT_PASS, EVENT_PENDING, EVENT_START,
    EVENT_SUITE, EVENT_SUITE_END, EVENT_TEST, EVENT_TEST_END,
};
use crate::models::{RunEvent, TestError};

/// Errors decoding a single event
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid event JSON")]
    Json(#[from] serde_json::Error),

    #[error("Malformed '{event}' payload")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors reading an event stream
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Failed to read event stream")]
    Io(#[from] std::io::Error),

    #[error("Invalid event at line {line}")]
    Decode {
        line: usize,
        #[source]
        source: DecodeError,
    },
}

/// Envelope of one wire event
#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct TitlePayload {
    title: String,
}

#[derive(Deserialize, Default)]
struct SuiteEndPayload {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
struct PassPayload {
    duration: u64,
}

#[derive(Deserialize)]
struct FailPayload {
    duration: u64,
    error: TestError,
}

#[derive(Deserialize, Default)]
struct PendingPayload {
    #[serde(default)]
    duration: Option<u64>,
}

/// Decode one line. Blank lines yield `None`.
pub fn decode_line(line: &str) -> Result<Option<RunEvent>, DecodeError> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let value: serde_json::Value = serde_json::from_str(line)?;
    decode_value(value).map(Some)
}

/// Decode one already-parsed JSON event
pub fn decode_value(value: serde_json::Value) -> Result<RunEvent, DecodeError> {
    let wire: WireEvent = serde_json::from_value(value)?;
    let kind = wire.kind.as_str();

    let event = match kind {
        EVENT_START => RunEvent::Start,
        EVENT_END => RunEvent::End,
        EVENT_TEST_END => RunEvent::TestEnd,
        EVENT_HOOK => RunEvent::Hook,
        EVENT_HOOK_END => RunEvent::HookEnd,
        EVENT_SUITE => {
            let p: TitlePayload = payload(kind, wire.payload)?;
            RunEvent::Suite { title: p.title }
        }
        EVENT_SUITE_END => {
            let p: SuiteEndPayload = optional_payload(kind, wire.payload)?;
            RunEvent::SuiteEnd { title: p.title }
        }
        EVENT_TEST => {
            let p: TitlePayload = payload(kind, wire.payload)?;
            RunEvent::Test { title: p.title }
        }
        EVENT_PASS => {
            let p: PassPayload = payload(kind, wire.payload)?;
            RunEvent::Pass { duration: p.duration }
        }
        EVENT_FAIL => {
            let p: FailPayload = payload(kind, wire.payload)?;
            RunEvent::Fail {
                duration: p.duration,
                error: p.error,
            }
        }
        EVENT_PENDING => {
            let p: PendingPayload = optional_payload(kind, wire.payload)?;
            RunEvent::Pending { duration: p.duration }
        }
        _ => RunEvent::Unknown { kind: kind.to_string() },
    };

    Ok(event)
}

fn payload<T: DeserializeOwned>(kind: &str, value: serde_json::Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::Payload {
        event: kind.to_string(),
        source,
    })
}

/// Like [`payload`] but an absent payload means all defaults
fn optional_payload<T: DeserializeOwned + Default>(
    kind: &str,
    value: serde_json::Value,
) -> Result<T, DecodeError> {
    if value.is_null() {
        return Ok(T::default());
    }
    payload(kind, value)
}

/// Iterator over the events of a line-delimited stream
pub struct EventStream<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> EventStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    /// 1-based number of the last line read
    pub fn line(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> Iterator for EventStream<R> {
    type Item = Result<RunEvent, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(StreamError::Io(e))),
            }
            self.line += 1;

            match decode_line(&self.buf) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => continue,
                Err(source) => {
                    return Some(Err(StreamError::Decode {
                        line: self.line,
                        source,
                    }))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io::Cursor;

    /// Full message including every source
    fn chain(err: &dyn Error) -> String {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }

    #[test]
    fn test_decode_lifecycle_events() {
        assert_eq!(decode_line(r#"{"type":"start"}"#).unwrap(), Some(RunEvent::Start));
        assert_eq!(
            decode_line(r#"{"type":"suite","payload":{"title":"Math"}}"#).unwrap(),
            Some(RunEvent::Suite { title: "Math".to_string() })
        );
        assert_eq!(
            decode_line(r#"{"type":"suite end"}"#).unwrap(),
            Some(RunEvent::SuiteEnd { title: None })
        );
        assert_eq!(
            decode_line(r#"{"type":"pass","payload":{"duration":5}}"#).unwrap(),
            Some(RunEvent::Pass { duration: 5 })
        );
        assert_eq!(
            decode_line(r#"{"type":"pending"}"#).unwrap(),
            Some(RunEvent::Pending { duration: None })
        );
    }

    #[test]
    fn test_decode_fail_keeps_error() {
        let line = r#"{"type":"fail","payload":{"duration":3,"error":{"stack":"Error: x\n  at y","showDiff":true}}}"#;
        match decode_line(line).unwrap() {
            Some(RunEvent::Fail { duration, error }) => {
                assert_eq!(duration, 3);
                assert_eq!(error.stack, "Error: x\n  at y");
                assert_eq!(error.extra.get("showDiff"), Some(&serde_json::json!(true)));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        assert_eq!(
            decode_line(r#"{"type":"retry","payload":{"attempt":2}}"#).unwrap(),
            Some(RunEvent::Unknown { kind: "retry".to_string() })
        );
    }

    #[test]
    fn test_blank_line_is_skipped() {
        assert_eq!(decode_line("   \n").unwrap(), None);
    }

    #[test]
    fn test_malformed_payloads() {
        let err = decode_line(r#"{"type":"pass","payload":{}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Payload { ref event, .. } if event == "pass"));
        assert!(chain(&err).contains("duration"));

        let err = decode_line(r#"{"type":"pass","payload":{"duration":-1}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Payload { .. }));

        let err = decode_line(r#"{"type":"fail","payload":{"duration":1}}"#).unwrap_err();
        assert!(chain(&err).contains("error"));

        let err = decode_line(r#"{"type":"test"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Payload { .. }));
    }

    #[test]
    fn test_invalid_json_and_missing_type() {
        assert!(matches!(decode_line("{not json").unwrap_err(), DecodeError::Json(_)));
        assert!(matches!(
            decode_line(r#"{"payload":{}}"#).unwrap_err(),
            DecodeError::Json(_)
        ));
    }

    #[test]
    fn test_stream_reports_line_numbers() {
        let input = "{\"type\":\"start\"}\n\n{\"type\":\"pass\"}\n";
        let mut stream = EventStream::new(Cursor::new(input));

        assert_eq!(stream.next().unwrap().unwrap(), RunEvent::Start);
        match stream.next().unwrap() {
            Err(StreamError::Decode { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected decode error, got {:?}", other),
        }
        assert!(stream.next().is_none());
    }
}
