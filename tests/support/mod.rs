//! Shared test infrastructure: an in-memory mock transport, wire-frame
//! builders, and generated audio fixtures.
//!
//! Using generated audio keeps test inputs reproducible with no external
//! file dependencies.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;
use usp_client::{Transport, TransportFrame, TransportSink, TransportStream, UspError};

// =============================================================================
// Mock Transport
// =============================================================================

/// The service side of a mock connection.
pub struct MockRemote {
    /// Frames the client sent toward the service.
    pub sent_rx: mpsc::UnboundedReceiver<TransportFrame>,
    /// True once the client closed its sink.
    pub closed: Arc<AtomicBool>,
    inbound_tx: Option<mpsc::UnboundedSender<Result<TransportFrame, UspError>>>,
}

impl MockRemote {
    /// Deliver an event frame to the client.
    pub fn push_event(&self, path: &str, body: &str) {
        self.push_text(&event_frame(path, body));
    }

    /// Deliver a raw text frame to the client.
    pub fn push_text(&self, text: &str) {
        self.inbound_tx
            .as_ref()
            .expect("connection already dropped")
            .send(Ok(TransportFrame::Text(text.to_string())))
            .expect("client stream gone");
    }

    /// Deliver a transport-level failure to the client.
    pub fn push_error(&self, error: UspError) {
        self.inbound_tx
            .as_ref()
            .expect("connection already dropped")
            .send(Err(error))
            .expect("client stream gone");
    }

    /// Simulate an abrupt connection loss: the client's next receive
    /// observes end-of-stream.
    pub fn disconnect(&mut self) {
        self.inbound_tx.take();
    }

    /// Collect the next `n` binary frames the client sent, panicking if
    /// they do not arrive in time.
    pub async fn collect_binary_frames(&mut self, n: usize) -> Vec<Bytes> {
        let mut frames = Vec::with_capacity(n);
        while frames.len() < n {
            let frame = tokio::time::timeout(std::time::Duration::from_secs(2), self.sent_rx.recv())
                .await
                .expect("timed out waiting for a sent frame")
                .expect("client sink gone");
            if let TransportFrame::Binary(bytes) = frame {
                frames.push(bytes);
            }
        }
        frames
    }
}

struct MockSink {
    sent_tx: mpsc::UnboundedSender<TransportFrame>,
    closed: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl TransportSink for MockSink {
    async fn send(&mut self, frame: TransportFrame) -> Result<(), UspError> {
        self.sent_tx
            .send(frame)
            .map_err(|_| UspError::WriteError("mock remote gone".to_string()))
    }

    async fn close(&mut self) -> Result<(), UspError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MockStream {
    inbound_rx: mpsc::UnboundedReceiver<Result<TransportFrame, UspError>>,
}

#[async_trait::async_trait]
impl TransportStream for MockStream {
    async fn recv(&mut self) -> Option<Result<TransportFrame, UspError>> {
        self.inbound_rx.recv().await
    }
}

struct MockTransport {
    sink: MockSink,
    stream: MockStream,
}

impl Transport for MockTransport {
    fn split(self: Box<Self>) -> (Box<dyn TransportSink>, Box<dyn TransportStream>) {
        (Box::new(self.sink), Box::new(self.stream))
    }
}

/// An in-memory connection: the boxed transport goes to the client, the
/// remote stays with the test.
pub fn mock_transport() -> (Box<dyn Transport>, MockRemote) {
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));

    let transport = MockTransport {
        sink: MockSink {
            sent_tx,
            closed: closed.clone(),
        },
        stream: MockStream { inbound_rx },
    };
    let remote = MockRemote {
        sent_rx,
        closed,
        inbound_tx: Some(inbound_tx),
    };
    (Box::new(transport), remote)
}

// =============================================================================
// Wire Frames
// =============================================================================

/// Build an inbound event frame the way the service does.
pub fn event_frame(path: &str, body: &str) -> String {
    format!(
        "Path: {path}\r\nContent-Type: application/json; charset=utf-8\r\nX-RequestId: E2E6F1C347D04F0B\r\n\r\n{body}"
    )
}

/// A `speech.phrase` body with the given display text.
pub fn phrase_body(text: &str) -> String {
    format!(r#"{{"RecognitionStatus":"Success","DisplayText":"{text}","Offset":0,"Duration":0}}"#)
}

// =============================================================================
// Audio Fixtures
// =============================================================================

/// 100ms of 16kHz mono 16-bit PCM silence.
pub fn pcm_silence_100ms() -> Vec<u8> {
    vec![0u8; 3200]
}

/// A deterministic byte ramp, useful for asserting content survives
/// chunking intact.
pub fn byte_ramp(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

// =============================================================================
// Logging
// =============================================================================

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
