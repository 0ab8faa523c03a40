//! Typed inbound recognition events.
//!
//! The service multiplexes six event kinds down one connection, each
//! identified by a `Path` header on the wire:
//!
//! - `turn.start` / `turn.end`: bound one recognition turn
//! - `speech.startDetected` / `speech.endDetected`: speech boundaries
//! - `speech.hypothesis`: interim, possibly-revised recognition text
//! - `speech.phrase`: a finalized recognition result
//!
//! Unknown paths decode to [`UspMessage::Unknown`] so future server message
//! types pass through without failing the session.

use serde::Deserialize;

// =============================================================================
// Event Kinds
// =============================================================================

/// Event kinds the dispatcher can route, one per wire path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SpeechStartDetected,
    SpeechEndDetected,
    SpeechHypothesis,
    SpeechPhrase,
    TurnStart,
    TurnEnd,
}

impl EventKind {
    /// The wire `Path` value for this event kind.
    pub fn path(&self) -> &'static str {
        match self {
            EventKind::SpeechStartDetected => "speech.startDetected",
            EventKind::SpeechEndDetected => "speech.endDetected",
            EventKind::SpeechHypothesis => "speech.hypothesis",
            EventKind::SpeechPhrase => "speech.phrase",
            EventKind::TurnStart => "turn.start",
            EventKind::TurnEnd => "turn.end",
        }
    }

    /// Resolve a wire `Path` value to an event kind.
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "speech.startDetected" => Some(EventKind::SpeechStartDetected),
            "speech.endDetected" => Some(EventKind::SpeechEndDetected),
            "speech.hypothesis" => Some(EventKind::SpeechHypothesis),
            "speech.phrase" => Some(EventKind::SpeechPhrase),
            "turn.start" => Some(EventKind::TurnStart),
            "turn.end" => Some(EventKind::TurnEnd),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

// =============================================================================
// Event Payloads
// =============================================================================

/// Speech start boundary. Offset is in 100-nanosecond ticks from the start
/// of the audio stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpeechStartDetected {
    /// Position of the detected speech start within the stream.
    #[serde(default)]
    pub offset: u64,
}

/// Speech end boundary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpeechEndDetected {
    /// Position of the detected speech end within the stream.
    #[serde(default)]
    pub offset: u64,
}

/// Interim recognition result. The text may be revised by later
/// hypotheses until a phrase finalizes the segment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpeechHypothesis {
    /// Current best transcription of the in-flight segment.
    pub text: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub duration: u64,
}

/// Outcome of a finalized recognition segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RecognitionStatus {
    /// The segment was recognized successfully.
    Success,
    /// Speech was detected but nothing could be recognized.
    NoMatch,
    /// The stream started with more silence than the service allows.
    InitialSilenceTimeout,
    /// The stream contained only noise.
    BabbleTimeout,
    /// The service failed to process the segment.
    Error,
    /// End of a dictation session.
    EndOfDictation,
    /// A status this client version does not know.
    #[serde(other)]
    Unknown,
}

/// Finalized recognition result for a turn segment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpeechPhrase {
    pub recognition_status: RecognitionStatus,
    /// Final display-formatted text. Absent when the status is not
    /// `Success`.
    #[serde(default)]
    pub display_text: Option<String>,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub duration: u64,
}

impl SpeechPhrase {
    /// The recognized text, or an empty string when the service produced
    /// none.
    pub fn text(&self) -> &str {
        self.display_text.as_deref().unwrap_or("")
    }
}

/// Service-side context delivered with `turn.start`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TurnContext {
    /// Service correlation tag for this turn, useful in support requests.
    #[serde(rename = "serviceTag", default)]
    pub service_tag: Option<String>,
}

/// Start of a recognition turn.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TurnStart {
    #[serde(default)]
    pub context: TurnContext,
}

/// End of a recognition turn. Carries no fields.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TurnEnd {}

// =============================================================================
// Message Enum
// =============================================================================

/// A decoded inbound message, one variant per event kind plus a
/// forward-compatibility fallback for paths this client does not know.
#[derive(Debug, Clone, PartialEq)]
pub enum UspMessage {
    SpeechStartDetected(SpeechStartDetected),
    SpeechEndDetected(SpeechEndDetected),
    SpeechHypothesis(SpeechHypothesis),
    SpeechPhrase(SpeechPhrase),
    TurnStart(TurnStart),
    TurnEnd(TurnEnd),
    Unknown { path: String },
}

impl UspMessage {
    /// The event kind of this message, or `None` for unknown paths.
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            UspMessage::SpeechStartDetected(_) => Some(EventKind::SpeechStartDetected),
            UspMessage::SpeechEndDetected(_) => Some(EventKind::SpeechEndDetected),
            UspMessage::SpeechHypothesis(_) => Some(EventKind::SpeechHypothesis),
            UspMessage::SpeechPhrase(_) => Some(EventKind::SpeechPhrase),
            UspMessage::TurnStart(_) => Some(EventKind::TurnStart),
            UspMessage::TurnEnd(_) => Some(EventKind::TurnEnd),
            UspMessage::Unknown { .. } => None,
        }
    }

    /// Check if this message finalizes a recognition segment.
    #[inline]
    pub fn is_phrase(&self) -> bool {
        matches!(self, UspMessage::SpeechPhrase(_))
    }

    /// Check if this message ends a turn.
    #[inline]
    pub fn is_turn_end(&self) -> bool {
        matches!(self, UspMessage::TurnEnd(_))
    }
}
