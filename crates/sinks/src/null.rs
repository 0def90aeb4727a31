//! Null sink
//!
//! Discards every frame. Backs `--format none`, where a session records
//! nothing locally but may still push events to the remote service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use evrcap_protocol::Frame;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::common::{SinkMetrics, DEFAULT_QUEUE_SIZE};
use crate::handle::{SinkHandle, SinkKind};

/// Discard sink task.
pub struct NullSink {
    rx: mpsc::Receiver<Arc<Frame>>,
    cancel: CancellationToken,
    stopped: Arc<AtomicBool>,
    metrics: Arc<SinkMetrics>,
}

impl NullSink {
    /// Start the discard task and return its handle.
    pub fn spawn(parent: &CancellationToken) -> SinkHandle {
        let (tx, rx) = mpsc::channel(DEFAULT_QUEUE_SIZE);
        let stopped = Arc::new(AtomicBool::new(false));
        let cancel = parent.child_token();
        let metrics = Arc::new(SinkMetrics::new());

        let handle = SinkHandle::new(
            SinkKind::Null,
            "null",
            tx,
            Arc::clone(&stopped),
            cancel.clone(),
            Arc::clone(&metrics),
        );

        let sink = Self {
            rx,
            cancel,
            stopped,
            metrics,
        };
        tokio::spawn(sink.run());

        handle
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                frame = self.rx.recv() => match frame {
                    None => break,
                    Some(_) => self.metrics.record_written(0),
                }
            }
        }
        self.rx.close();
        self.stopped.store(true, Ordering::Release);

        tracing::debug!(
            discarded = self.metrics.snapshot().frames_written,
            "null sink stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;

    #[tokio::test]
    async fn test_discards_and_stops() {
        let cancel = CancellationToken::new();
        let handle = NullSink::spawn(&cancel);

        let frame = Arc::new(Frame::capture(
            Bytes::from_static(b"{\"sessionid\":\"A\"}"),
            Bytes::new(),
        ));
        handle.write(frame).unwrap();

        handle.close();
        for _ in 0..50 {
            if handle.is_stopped() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("null sink did not stop");
    }
}
