//! Streaming speech-protocol client.
//!
//! One WebSocket session per handle: audio streams upward as binary
//! frames while typed recognition events are decoded off the same
//! connection and dispatched to caller-registered callbacks in receipt
//! order. See [`UspClient`] for the session lifecycle contract.

mod audio;
pub mod callbacks;
pub mod client;
pub mod codec;
pub mod config;
mod dispatch;
pub mod error;
pub mod messages;
pub mod session;
pub mod transport;

// Re-export commonly used items for convenience
pub use callbacks::{CALLBACKS_VERSION, ErrorFn, EventFn, UspCallbacks};
pub use client::UspClient;
pub use config::{Auth, OutputFormat, RecognitionMode, UspConfig};
pub use error::{ErrorCategory, USP_SUCCESS, UspError, UspResult};
pub use messages::{
    EventKind, RecognitionStatus, SpeechEndDetected, SpeechHypothesis, SpeechPhrase,
    SpeechStartDetected, TurnContext, TurnEnd, TurnStart, UspMessage,
};
pub use session::{Handle, SessionState};
pub use transport::{Transport, TransportFrame, TransportSink, TransportStream, WsTransport};
