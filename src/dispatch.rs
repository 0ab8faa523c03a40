//! Routing of decoded messages to the registered callback table.
//!
//! The dispatcher owns the immutable callback table and the caller
//! context. Messages are dispatched synchronously on the run-loop task in
//! exactly the order they were decoded; a kind without a registered slot
//! is skipped silently, and unknown kinds are discarded.

use tracing::debug;

use crate::callbacks::UspCallbacks;
use crate::error::UspError;
use crate::messages::UspMessage;
use crate::session::Handle;

pub(crate) struct EventDispatcher<C> {
    handle: Handle,
    callbacks: UspCallbacks<C>,
    context: C,
}

impl<C> EventDispatcher<C> {
    pub(crate) fn new(handle: Handle, callbacks: UspCallbacks<C>, context: C) -> Self {
        Self {
            handle,
            callbacks,
            context,
        }
    }

    /// Invoke the callback registered for the message's kind, if any.
    pub(crate) fn dispatch(&self, message: UspMessage) {
        match message {
            UspMessage::SpeechStartDetected(m) => {
                if let Some(cb) = &self.callbacks.on_speech_start_detected {
                    cb(self.handle, &self.context, &m);
                } else {
                    debug!("no callback for speech.startDetected, skipping");
                }
            }
            UspMessage::SpeechEndDetected(m) => {
                if let Some(cb) = &self.callbacks.on_speech_end_detected {
                    cb(self.handle, &self.context, &m);
                } else {
                    debug!("no callback for speech.endDetected, skipping");
                }
            }
            UspMessage::SpeechHypothesis(m) => {
                if let Some(cb) = &self.callbacks.on_speech_hypothesis {
                    cb(self.handle, &self.context, &m);
                } else {
                    debug!("no callback for speech.hypothesis, skipping");
                }
            }
            UspMessage::SpeechPhrase(m) => {
                if let Some(cb) = &self.callbacks.on_speech_phrase {
                    cb(self.handle, &self.context, &m);
                } else {
                    debug!("no callback for speech.phrase, skipping");
                }
            }
            UspMessage::TurnStart(m) => {
                if let Some(cb) = &self.callbacks.on_turn_start {
                    cb(self.handle, &self.context, &m);
                } else {
                    debug!("no callback for turn.start, skipping");
                }
            }
            UspMessage::TurnEnd(m) => {
                if let Some(cb) = &self.callbacks.on_turn_end {
                    cb(self.handle, &self.context, &m);
                } else {
                    debug!("no callback for turn.end, skipping");
                }
            }
            UspMessage::Unknown { path } => {
                debug!("discarding message with unknown path {path:?}");
            }
        }
    }

    /// Report an asynchronously discovered error, if a slot is registered.
    pub(crate) fn dispatch_error(&self, error: UspError) {
        if let Some(cb) = &self.callbacks.on_error {
            cb(self.handle, &self.context, error);
        } else {
            debug!("no error callback registered, dropping: {error}");
        }
    }
}
