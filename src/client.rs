//! The client engine: session slot, audio path, run loop, and shutdown.
//!
//! One [`UspClient`] owns one session. `initialize` is valid exactly once;
//! `write` and `shutdown` are safe to call from tasks other than the one
//! parked in [`UspClient::run`]. The run loop pumps both directions of the
//! transport until shutdown or a fatal failure:
//!
//! ```text
//! ┌────────────┐    ┌───────────────────┐    ┌──────────────────┐
//! │  write()   │───▶│ audio queue (mpsc)│───▶│                  │
//! └────────────┘    └───────────────────┘    │    run() loop    │──▶ transport
//!                                            │  tokio::select!  │◀── transport
//! ┌────────────┐    ┌───────────────────┐    │                  │
//! │ callbacks  │◀───│  event dispatcher │◀───│                  │
//! └────────────┘    └───────────────────┘    └──────────────────┘
//! ```
//!
//! Callbacks are invoked synchronously on the run-loop task, in receipt
//! order, and never after `shutdown` has returned.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audio::AudioPipeline;
use crate::callbacks::UspCallbacks;
use crate::codec;
use crate::config::UspConfig;
use crate::dispatch::EventDispatcher;
use crate::error::UspError;
use crate::session::{Handle, Lifecycle, SessionState};
use crate::transport::{Transport, TransportFrame, TransportSink, TransportStream, WsTransport};

/// Per-message idle timeout for inbound reception. Resets after each
/// received frame. Catches stuck/dead connections.
const RECV_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// How long `shutdown` waits for the run loop to observe the cancellation
/// before forcing the terminal state.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The transport halves and audio receiver the run loop consumes. Present
/// between `initialize` and the single `run` call that takes them.
struct PumpParts {
    sink: Box<dyn TransportSink>,
    stream: Box<dyn TransportStream>,
    audio_rx: mpsc::Receiver<Bytes>,
}

struct Inner<C> {
    handle: Handle,
    config: UspConfig,
    /// Request id stamped on every outbound audio frame of this session.
    request_id: String,
    lifecycle: Lifecycle,
    /// Set once at initialize, read lock-free by the run loop.
    dispatcher: OnceCell<EventDispatcher<C>>,
    audio: OnceCell<AudioPipeline>,
    pump: Mutex<Option<PumpParts>>,
    cancel: CancellationToken,
    /// True while a `run` call is driving the loop.
    run_active: AtomicBool,
}

impl<C> Drop for Inner<C> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A streaming speech-protocol session.
///
/// Cheap to clone; all clones share the same session. See the crate docs
/// for the lifecycle contract.
pub struct UspClient<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for UspClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Send + Sync + 'static> UspClient<C> {
    /// Create an uninitialized session slot.
    pub fn new(config: UspConfig) -> Result<Self, UspError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                handle: Handle::next(),
                config,
                request_id: Uuid::new_v4().simple().to_string(),
                lifecycle: Lifecycle::new(),
                dispatcher: OnceCell::new(),
                audio: OnceCell::new(),
                pump: Mutex::new(None),
                cancel: CancellationToken::new(),
                run_active: AtomicBool::new(false),
            }),
        })
    }

    /// The session handle. Issued at construction, valid until `shutdown`
    /// completes.
    pub fn handle(&self) -> Handle {
        self.inner.handle
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.inner.lifecycle.current()
    }

    /// True while audio writes and the run loop are valid.
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Register the callback table and connect to the service.
    ///
    /// Valid exactly once per client; concurrent calls are resolved
    /// deterministically: one connects, every other observes
    /// `AlreadyInitialized`. The table is immutable afterwards.
    pub async fn initialize(
        &self,
        callbacks: UspCallbacks<C>,
        context: C,
    ) -> Result<Handle, UspError> {
        callbacks.validate()?;
        self.begin_initialize()?;

        let transport = match WsTransport::connect(&self.inner.config).await {
            Ok(transport) => Box::new(transport) as Box<dyn Transport>,
            Err(e) => return Err(self.fail_initialize(e)),
        };

        self.finish_initialize(callbacks, context, transport).await
    }

    /// Like [`initialize`](Self::initialize), but over a caller-supplied,
    /// already-connected transport.
    pub async fn initialize_with_transport(
        &self,
        callbacks: UspCallbacks<C>,
        context: C,
        transport: Box<dyn Transport>,
    ) -> Result<Handle, UspError> {
        callbacks.validate()?;
        self.begin_initialize()?;
        self.finish_initialize(callbacks, context, transport).await
    }

    fn begin_initialize(&self) -> Result<(), UspError> {
        match self
            .inner
            .lifecycle
            .advance(&[SessionState::Uninitialized], SessionState::Initializing)
        {
            Ok(_) => Ok(()),
            Err(SessionState::Terminated) => Err(UspError::InvalidHandle),
            Err(_) => Err(UspError::AlreadyInitialized),
        }
    }

    /// Record a connect failure, honoring a shutdown that raced the
    /// in-flight initialize.
    fn fail_initialize(&self, error: UspError) -> UspError {
        if self
            .inner
            .lifecycle
            .advance(&[SessionState::Initializing], SessionState::Failed)
            .is_err()
        {
            let _ = self
                .inner
                .lifecycle
                .advance(&[SessionState::ShuttingDown], SessionState::Terminated);
            return UspError::InitializationFailure(
                "initialization cancelled by shutdown".to_string(),
            );
        }
        error
    }

    async fn finish_initialize(
        &self,
        callbacks: UspCallbacks<C>,
        context: C,
        transport: Box<dyn Transport>,
    ) -> Result<Handle, UspError> {
        let dispatcher = EventDispatcher::new(self.inner.handle, callbacks, context);
        let _ = self.inner.dispatcher.set(dispatcher);

        let (pipeline, audio_rx) = AudioPipeline::new(
            self.inner.config.audio_chunk_size,
            self.inner.config.audio_queue_depth,
            self.inner.config.write_timeout,
        );
        let _ = self.inner.audio.set(pipeline);

        let (sink, stream) = transport.split();
        *self.inner.pump.lock() = Some(PumpParts {
            sink,
            stream,
            audio_rx,
        });

        if self
            .inner
            .lifecycle
            .advance(&[SessionState::Initializing], SessionState::Active)
            .is_err()
        {
            // A concurrent shutdown cancelled the in-flight initialize.
            let parts = self.inner.pump.lock().take();
            if let Some(mut parts) = parts {
                let _ = parts.sink.close().await;
            }
            let _ = self
                .inner
                .lifecycle
                .advance(&[SessionState::ShuttingDown], SessionState::Terminated);
            return Err(UspError::InitializationFailure(
                "initialization cancelled by shutdown".to_string(),
            ));
        }

        info!(handle = %self.inner.handle, "session initialized");
        Ok(self.inner.handle)
    }

    /// Stream a buffer of audio toward the service.
    ///
    /// The buffer is copied before this returns; the caller may reuse it
    /// immediately. Submission order is preserved across calls, including
    /// from multiple tasks. A zero-length buffer is the end-of-audio
    /// marker and is forwarded, not dropped.
    pub async fn write(&self, buf: &[u8]) -> Result<(), UspError> {
        match self.inner.lifecycle.current() {
            SessionState::Uninitialized | SessionState::Initializing => {
                Err(UspError::Uninitialized)
            }
            SessionState::ShuttingDown | SessionState::Terminated => Err(UspError::InvalidHandle),
            SessionState::Failed => Err(UspError::NoConnection),
            SessionState::Active => {
                let Some(audio) = self.inner.audio.get() else {
                    return Err(UspError::Uninitialized);
                };
                audio.submit(buf).await
            }
        }
    }

    /// Drive the session until shutdown or a fatal failure.
    ///
    /// Blocks (in the async sense) pumping transport I/O, the audio queue,
    /// and event dispatch. Exactly one task may drive a session; a
    /// concurrent second call logs a warning and returns immediately.
    /// Errors discovered here go to the error callback, never out of this
    /// function.
    pub async fn run(&self) {
        let parts = self.inner.pump.lock().take();
        let Some(PumpParts {
            mut sink,
            mut stream,
            mut audio_rx,
        }) = parts
        else {
            warn!(
                handle = %self.inner.handle,
                state = %self.state(),
                "run called without a startable session"
            );
            return;
        };
        let Some(dispatcher) = self.inner.dispatcher.get() else {
            return;
        };
        self.inner.run_active.store(true, Ordering::SeqCst);

        info!(handle = %self.inner.handle, "run loop started");
        let cancel = self.inner.cancel.clone();
        let mut failed = false;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("shutdown signal received");
                    break;
                }

                maybe_chunk = audio_rx.recv() => {
                    let Some(chunk) = maybe_chunk else { break };
                    let len = chunk.len();
                    let frame = codec::encode_audio_frame(&self.inner.request_id, &chunk);
                    if let Err(e) = sink.send(TransportFrame::Binary(frame)).await {
                        error!("failed to send audio: {e}");
                        if !self.shutting_down() {
                            dispatcher.dispatch_error(e);
                            failed = true;
                        }
                        break;
                    }
                    debug!("sent {len} bytes of audio");
                }

                inbound = timeout(RECV_IDLE_TIMEOUT, stream.recv()) => match inbound {
                    Ok(Some(Ok(TransportFrame::Text(text)))) => {
                        match codec::decode_event(&text) {
                            Ok(message) => dispatcher.dispatch(message),
                            Err(e) => {
                                warn!("undecodable frame: {e}");
                                dispatcher.dispatch_error(UspError::InvalidData(e.to_string()));
                            }
                        }
                    }
                    Ok(Some(Ok(TransportFrame::Binary(_)))) => {
                        debug!("ignoring inbound binary frame");
                    }
                    Ok(Some(Err(e))) => {
                        error!("transport failure: {e}");
                        if !self.shutting_down() {
                            dispatcher.dispatch_error(e);
                            failed = true;
                        }
                        break;
                    }
                    Ok(None) => {
                        if !self.shutting_down() {
                            info!("connection closed by the service");
                            dispatcher.dispatch_error(UspError::NoConnection);
                            failed = true;
                        }
                        break;
                    }
                    Err(_elapsed) => {
                        error!("no inbound traffic for {RECV_IDLE_TIMEOUT:?}");
                        if !self.shutting_down() {
                            dispatcher.dispatch_error(UspError::ConnectionTimeout);
                            failed = true;
                        }
                        break;
                    }
                }
            }
        }

        let _ = sink.close().await;

        if failed {
            let _ = self
                .inner
                .lifecycle
                .advance(&[SessionState::Active], SessionState::Failed);
        }
        let _ = self
            .inner
            .lifecycle
            .advance(&[SessionState::ShuttingDown], SessionState::Terminated);
        self.inner.run_active.store(false, Ordering::SeqCst);
        info!(handle = %self.inner.handle, state = %self.state(), "run loop finished");
    }

    /// Shut the session down.
    ///
    /// Valid from `Initializing` (cancels the in-flight initialize),
    /// `Active`, and `Failed`. Unblocks a task parked in `run`, fails
    /// in-flight writes fast, and returns only once the session is
    /// `Terminated`; no callback is invoked after that. A call on an
    /// already-terminated handle fails with `InvalidHandle`.
    pub async fn shutdown(&self) -> Result<(), UspError> {
        let prev = match self.inner.lifecycle.advance(
            &[
                SessionState::Initializing,
                SessionState::Active,
                SessionState::Failed,
            ],
            SessionState::ShuttingDown,
        ) {
            Ok(prev) => prev,
            Err(SessionState::ShuttingDown) => {
                // Another shutdown is in flight; wait for it to finish.
                self.wait_terminated().await;
                return Ok(());
            }
            Err(SessionState::Terminated) => return Err(UspError::InvalidHandle),
            Err(SessionState::Uninitialized) => return Err(UspError::Uninitialized),
            Err(_) => return Err(UspError::InvalidHandle),
        };

        info!(handle = %self.inner.handle, "shutting down session");
        self.inner.cancel.cancel();

        let parts = self.inner.pump.lock().take();
        if let Some(mut parts) = parts {
            // The run loop never started; tear down inline.
            let _ = parts.sink.close().await;
            let _ = self
                .inner
                .lifecycle
                .advance(&[SessionState::ShuttingDown], SessionState::Terminated);
            return Ok(());
        }

        if prev == SessionState::Failed && !self.inner.run_active.load(Ordering::SeqCst) {
            // The run loop already exited on its failure path.
            let _ = self
                .inner
                .lifecycle
                .advance(&[SessionState::ShuttingDown], SessionState::Terminated);
            return Ok(());
        }

        self.wait_terminated().await;
        Ok(())
    }

    async fn wait_terminated(&self) {
        let mut rx = self.inner.lifecycle.subscribe();
        let wait = rx.wait_for(|s| *s == SessionState::Terminated);
        if timeout(SHUTDOWN_GRACE, wait).await.is_err() {
            error!(
                handle = %self.inner.handle,
                "run loop did not observe shutdown in time; forcing termination"
            );
            let _ = self
                .inner
                .lifecycle
                .advance(&[SessionState::ShuttingDown], SessionState::Terminated);
        }
    }

    fn shutting_down(&self) -> bool {
        matches!(
            self.inner.lifecycle.current(),
            SessionState::ShuttingDown | SessionState::Terminated
        )
    }
}
