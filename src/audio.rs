//! The audio write pipeline between `write` callers and the run loop.
//!
//! Caller buffers are copied into [`Bytes`] chunks before `write` returns,
//! so the caller may free or reuse its buffer immediately. A bounded
//! channel applies backpressure toward the run loop; a write gate
//! serializes concurrent writers so multi-chunk submissions never
//! interleave. A zero-length submission enqueues one empty chunk, the
//! end-of-audio marker, rather than being dropped.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;
use tracing::debug;

use crate::error::UspError;

pub(crate) struct AudioPipeline {
    tx: mpsc::Sender<Bytes>,
    /// Serializes concurrent writers on the same handle.
    gate: Mutex<()>,
    chunk_size: usize,
    write_timeout: Duration,
}

impl AudioPipeline {
    /// Create the pipeline and the receiver the run loop drains.
    pub(crate) fn new(
        chunk_size: usize,
        queue_depth: usize,
        write_timeout: Duration,
    ) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(queue_depth);
        (
            Self {
                tx,
                gate: Mutex::new(()),
                chunk_size,
                write_timeout,
            },
            rx,
        )
    }

    /// Copy and enqueue a caller buffer, preserving submission order.
    pub(crate) async fn submit(&self, buf: &[u8]) -> Result<(), UspError> {
        let _writer = self.gate.lock().await;

        if buf.is_empty() {
            debug!("queueing end-of-audio marker");
            return self.enqueue(Bytes::new()).await;
        }

        for chunk in buf.chunks(self.chunk_size) {
            self.enqueue(Bytes::copy_from_slice(chunk)).await?;
        }
        debug!("queued {} bytes of audio", buf.len());
        Ok(())
    }

    async fn enqueue(&self, chunk: Bytes) -> Result<(), UspError> {
        match timeout(self.write_timeout, self.tx.send(chunk)).await {
            // Queue stayed full past the deadline: the transport is not
            // draining, surface a timeout instead of hanging the caller.
            Err(_) => Err(UspError::ConnectionTimeout),
            // Receiver gone: the run loop has shut down.
            Ok(Err(_)) => Err(UspError::InvalidHandle),
            Ok(Ok(())) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(depth: usize) -> (AudioPipeline, mpsc::Receiver<Bytes>) {
        AudioPipeline::new(4, depth, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_submit_copies_before_return() {
        let (pipeline, mut rx) = pipeline(8);
        let mut buf = vec![1u8, 2, 3];
        pipeline.submit(&buf).await.unwrap();

        // Caller reuses the buffer immediately; the queued chunk must be
        // unaffected.
        buf.fill(0);

        let chunk = rx.recv().await.unwrap();
        assert_eq!(&chunk[..], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_large_buffer_is_chunked_in_order() {
        let (pipeline, mut rx) = pipeline(8);
        let buf: Vec<u8> = (0u8..10).collect();
        pipeline.submit(&buf).await.unwrap();

        let mut collected = Vec::new();
        let mut sizes = Vec::new();
        for _ in 0..3 {
            let chunk = rx.recv().await.unwrap();
            sizes.push(chunk.len());
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(collected, buf);
    }

    #[tokio::test]
    async fn test_zero_length_submission_is_forwarded() {
        let (pipeline, mut rx) = pipeline(8);
        pipeline.submit(&[]).await.unwrap();
        let chunk = rx.recv().await.unwrap();
        assert!(chunk.is_empty());
    }

    #[tokio::test]
    async fn test_sequential_submissions_preserve_order() {
        let (pipeline, mut rx) = pipeline(16);
        pipeline.submit(&[1, 1]).await.unwrap();
        pipeline.submit(&[2, 2]).await.unwrap();
        pipeline.submit(&[]).await.unwrap();

        assert_eq!(&rx.recv().await.unwrap()[..], &[1, 1]);
        assert_eq!(&rx.recv().await.unwrap()[..], &[2, 2]);
        assert!(rx.recv().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_queue_fails_with_invalid_handle() {
        let (pipeline, rx) = pipeline(8);
        drop(rx);
        let err = pipeline.submit(&[1]).await.unwrap_err();
        assert_eq!(err, UspError::InvalidHandle);
    }

    #[tokio::test]
    async fn test_full_queue_times_out_instead_of_hanging() {
        let (pipeline, _rx) = pipeline(1);
        pipeline.submit(&[1]).await.unwrap();
        // Queue is full and nobody drains it.
        let err = pipeline.submit(&[2]).await.unwrap_err();
        assert_eq!(err, UspError::ConnectionTimeout);
    }
}
