//! The caller-supplied callback table.
//!
//! Every slot is independently optional: an empty slot means "no dispatch
//! for that event kind" and the dispatcher skips it silently. The table is
//! registered once at `initialize` and never mutated afterwards, so the
//! dispatcher reads it without locking.
//!
//! The `size` and `version` fields support forward-compatible partial
//! registration: a caller built against an older table layout passes its
//! own version and the engine accepts it, while an implausible size or a
//! version from the future is rejected as an invalid parameter.

use std::sync::Arc;

use crate::error::UspError;
use crate::messages::{
    SpeechEndDetected, SpeechHypothesis, SpeechPhrase, SpeechStartDetected, TurnEnd, TurnStart,
};
use crate::session::Handle;

/// Current callback-table layout version.
pub const CALLBACKS_VERSION: u16 = 1;

/// Handler for one event kind. Invoked on the run-loop task; must not
/// block.
pub type EventFn<C, M> = Arc<dyn Fn(Handle, &C, &M) + Send + Sync>;

/// Handler for asynchronously discovered errors.
pub type ErrorFn<C> = Arc<dyn Fn(Handle, &C, UspError) + Send + Sync>;

/// Caller-supplied callback table, immutable after registration.
pub struct UspCallbacks<C> {
    /// Size of the table the caller was built against.
    pub size: u16,
    /// Table layout version the caller was built against.
    pub version: u16,
    pub on_speech_start_detected: Option<EventFn<C, SpeechStartDetected>>,
    pub on_speech_end_detected: Option<EventFn<C, SpeechEndDetected>>,
    pub on_speech_hypothesis: Option<EventFn<C, SpeechHypothesis>>,
    pub on_speech_phrase: Option<EventFn<C, SpeechPhrase>>,
    pub on_turn_start: Option<EventFn<C, TurnStart>>,
    pub on_turn_end: Option<EventFn<C, TurnEnd>>,
    pub on_error: Option<ErrorFn<C>>,
}

impl<C> Default for UspCallbacks<C> {
    fn default() -> Self {
        Self {
            size: std::mem::size_of::<Self>() as u16,
            version: CALLBACKS_VERSION,
            on_speech_start_detected: None,
            on_speech_end_detected: None,
            on_speech_hypothesis: None,
            on_speech_phrase: None,
            on_turn_start: None,
            on_turn_end: None,
            on_error: None,
        }
    }
}

impl<C> Clone for UspCallbacks<C> {
    fn clone(&self) -> Self {
        Self {
            size: self.size,
            version: self.version,
            on_speech_start_detected: self.on_speech_start_detected.clone(),
            on_speech_end_detected: self.on_speech_end_detected.clone(),
            on_speech_hypothesis: self.on_speech_hypothesis.clone(),
            on_speech_phrase: self.on_speech_phrase.clone(),
            on_turn_start: self.on_turn_start.clone(),
            on_turn_end: self.on_turn_end.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<C> UspCallbacks<C> {
    /// An empty table with the current size and version.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the size/version fields at registration time.
    pub(crate) fn validate(&self) -> Result<(), UspError> {
        if self.size == 0 {
            return Err(UspError::InvalidParameter(
                "callback table size must be nonzero".to_string(),
            ));
        }
        if self.version == 0 || self.version > CALLBACKS_VERSION {
            return Err(UspError::InvalidParameter(format!(
                "unsupported callback table version {} (supported: 1..={CALLBACKS_VERSION})",
                self.version
            )));
        }
        Ok(())
    }
}
