//! Wire framing between raw transport frames and typed messages.
//!
//! Inbound events arrive as text frames: CRLF-separated header lines, a
//! blank line, then a JSON body. The `Path` header selects the event kind;
//! `X-RequestId` and `Content-Type` are carried but not needed for routing.
//!
//! Outbound audio is a binary frame: a big-endian `u16` header length, the
//! header text, then the raw chunk bytes. A frame with an empty payload is
//! the end-of-audio marker and must reach the service, never be dropped.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::messages::{EventKind, UspMessage};

/// Header separating metadata from the JSON body of a text frame.
const HEADER_TERMINATOR: &str = "\r\n\r\n";

/// Wire path of outbound audio frames.
const AUDIO_PATH: &str = "audio";

/// Content type announced for outbound audio chunks.
const AUDIO_CONTENT_TYPE: &str = "audio/x-wav";

/// Failures while decoding an inbound frame.
///
/// These are recoverable: the session reports them through the error
/// callback as invalid data and keeps running.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame has no blank line separating headers from the body.
    #[error("frame has no header terminator")]
    MissingTerminator,

    /// The frame carries no `Path` header.
    #[error("frame has no Path header")]
    MissingPath,

    /// The JSON body of a known event kind failed to parse.
    #[error("malformed {path} body: {source}")]
    MalformedBody {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parsed headers of an inbound text frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameHeaders {
    pub path: String,
    pub request_id: Option<String>,
    pub content_type: Option<String>,
}

/// Split a text frame into headers and body.
pub fn parse_frame(text: &str) -> Result<(FrameHeaders, &str), CodecError> {
    let (header_block, body) = text
        .split_once(HEADER_TERMINATOR)
        .ok_or(CodecError::MissingTerminator)?;

    let mut headers = FrameHeaders::default();
    for line in header_block.split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("path") {
            headers.path = value.to_string();
        } else if name.eq_ignore_ascii_case("x-requestid") {
            headers.request_id = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-type") {
            headers.content_type = Some(value.to_string());
        }
    }

    if headers.path.is_empty() {
        return Err(CodecError::MissingPath);
    }

    Ok((headers, body))
}

/// Decode an inbound text frame into a typed message.
///
/// Unknown paths decode to [`UspMessage::Unknown`] rather than an error so
/// future server message types pass through without failing the session.
pub fn decode_event(text: &str) -> Result<UspMessage, CodecError> {
    let (headers, body) = parse_frame(text)?;

    let Some(kind) = EventKind::from_path(&headers.path) else {
        return Ok(UspMessage::Unknown { path: headers.path });
    };

    // turn.end arrives with an empty body from some service versions.
    let body = if body.trim().is_empty() { "{}" } else { body };

    let malformed = |source| CodecError::MalformedBody {
        path: headers.path.clone(),
        source,
    };

    let message = match kind {
        EventKind::SpeechStartDetected => {
            UspMessage::SpeechStartDetected(serde_json::from_str(body).map_err(malformed)?)
        }
        EventKind::SpeechEndDetected => {
            UspMessage::SpeechEndDetected(serde_json::from_str(body).map_err(malformed)?)
        }
        EventKind::SpeechHypothesis => {
            UspMessage::SpeechHypothesis(serde_json::from_str(body).map_err(malformed)?)
        }
        EventKind::SpeechPhrase => {
            UspMessage::SpeechPhrase(serde_json::from_str(body).map_err(malformed)?)
        }
        EventKind::TurnStart => {
            UspMessage::TurnStart(serde_json::from_str(body).map_err(malformed)?)
        }
        EventKind::TurnEnd => UspMessage::TurnEnd(serde_json::from_str(body).map_err(malformed)?),
    };

    Ok(message)
}

/// Encode one audio chunk as a binary frame.
///
/// An empty chunk produces a header-only frame, which the service reads as
/// the end of the audio stream.
pub fn encode_audio_frame(request_id: &str, chunk: &[u8]) -> Bytes {
    let header = format!(
        "Path: {AUDIO_PATH}\r\nX-RequestId: {request_id}\r\nContent-Type: {AUDIO_CONTENT_TYPE}\r\n"
    );

    let mut frame = BytesMut::with_capacity(2 + header.len() + chunk.len());
    frame.put_u16(header.len() as u16);
    frame.put_slice(header.as_bytes());
    frame.put_slice(chunk);
    frame.freeze()
}

/// Decode a binary audio frame back into its headers and payload.
///
/// The engine never receives audio frames; this exists for transport-level
/// tooling and tests that assert on what was sent.
pub fn decode_audio_frame(frame: &[u8]) -> Option<(String, &[u8])> {
    if frame.len() < 2 {
        return None;
    }
    let header_len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    if frame.len() < 2 + header_len {
        return None;
    }
    let header = std::str::from_utf8(&frame[2..2 + header_len]).ok()?;
    Some((header.to_string(), &frame[2 + header_len..]))
}
