use super::*;
use bytes::Bytes;
use evrcap_protocol::Frame;
use tokio::sync::mpsc;

fn test_frame() -> Arc<Frame> {
    Arc::new(Frame::capture(
        Bytes::from_static(b"{\"sessionid\":\"A\"}"),
        Bytes::from_static(b"{}"),
    ))
}

struct Parts {
    handle: SinkHandle,
    rx: mpsc::Receiver<Arc<Frame>>,
    stopped: Arc<AtomicBool>,
}

fn handle_with_capacity(capacity: usize) -> Parts {
    let (tx, rx) = mpsc::channel(capacity);
    let stopped = Arc::new(AtomicBool::new(false));
    let handle = SinkHandle::new(
        SinkKind::Null,
        "test",
        tx,
        Arc::clone(&stopped),
        CancellationToken::new(),
        Arc::new(SinkMetrics::new()),
    );
    Parts {
        handle,
        rx,
        stopped,
    }
}

#[tokio::test]
async fn test_write_delivers_frame() {
    let mut parts = handle_with_capacity(4);
    parts.handle.write(test_frame()).unwrap();

    let frame = parts.rx.recv().await.unwrap();
    assert_eq!(frame.session_uuid(), Some("A"));
    assert_eq!(parts.handle.metrics_snapshot().frames_received, 1);
}

#[tokio::test]
async fn test_write_overflow_drops_newest() {
    let parts = handle_with_capacity(1);
    parts.handle.write(test_frame()).unwrap();

    let err = parts.handle.write(test_frame()).unwrap_err();
    assert!(matches!(err, SinkError::QueueFull));
    assert_eq!(parts.handle.metrics_snapshot().frames_dropped, 1);
}

#[tokio::test]
async fn test_closing_handle_still_accepts_until_stopped() {
    // A close signals the drain task; writes keep landing on the queue so
    // the session can flush its backlog during shutdown
    let mut parts = handle_with_capacity(4);
    parts.handle.close();
    parts.handle.write(test_frame()).unwrap();
    assert!(parts.rx.try_recv().is_ok());

    // Once the drain task reports stopped, writes are rejected
    parts.stopped.store(true, Ordering::Release);
    let err = parts.handle.write(test_frame()).unwrap_err();
    assert!(matches!(err, SinkError::Stopped));
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let parts = handle_with_capacity(4);
    parts.handle.close();
    parts.handle.close();
    assert!(parts.handle.cancel_token().is_cancelled());
}

#[tokio::test]
async fn test_stopped_flag_reported() {
    let parts = handle_with_capacity(4);
    assert!(!parts.handle.is_stopped());
    parts.stopped.store(true, Ordering::Release);
    assert!(parts.handle.is_stopped());
}

#[tokio::test]
async fn test_write_to_dropped_receiver_is_stopped() {
    let parts = handle_with_capacity(4);
    drop(parts.rx);

    let err = parts.handle.write(test_frame()).unwrap_err();
    assert!(matches!(err, SinkError::Stopped));
}

#[tokio::test]
async fn test_fanout_partial_failure_survivable() {
    let full = handle_with_capacity(1);
    full.handle.write(test_frame()).unwrap(); // saturate

    let live = handle_with_capacity(4);
    let fanout = FanOutSink::new(vec![full.handle.into(), live.handle.into()]);

    // One child overflows, the other accepts: overall success
    fanout.write(test_frame()).unwrap();
}

#[tokio::test]
async fn test_fanout_total_failure_surfaces() {
    let a = handle_with_capacity(1);
    let b = handle_with_capacity(1);
    a.handle.write(test_frame()).unwrap();
    b.handle.write(test_frame()).unwrap();

    let fanout = FanOutSink::new(vec![a.handle.into(), b.handle.into()]);
    let err = fanout.write(test_frame()).unwrap_err();
    assert!(matches!(err, SinkError::FanOutExhausted));
}

#[tokio::test]
async fn test_fanout_skips_stopped_children() {
    let dead = handle_with_capacity(4);
    dead.stopped.store(true, Ordering::Release);

    let mut live = handle_with_capacity(4);
    let fanout = FanOutSink::new(vec![dead.handle.into(), live.handle.into()]);

    fanout.write(test_frame()).unwrap();
    assert!(live.rx.try_recv().is_ok());
}

#[tokio::test]
async fn test_fanout_close_closes_children_and_rejects_writes() {
    let a = handle_with_capacity(4);
    let b = handle_with_capacity(4);
    let a_token = a.handle.cancel_token().clone();
    let fanout = FanOutSink::new(vec![a.handle.into(), b.handle.into()]);

    fanout.close();
    fanout.close(); // idempotent

    assert!(a_token.is_cancelled());
    assert!(matches!(
        fanout.write(test_frame()),
        Err(SinkError::Stopped)
    ));
}

#[tokio::test]
async fn test_fanout_stopped_when_all_children_stopped() {
    let a = handle_with_capacity(4);
    let b = handle_with_capacity(4);
    let fanout = FanOutSink::new(vec![a.handle.into(), b.handle.into()]);

    assert!(!fanout.is_stopped());
    a.stopped.store(true, Ordering::Release);
    assert!(!fanout.is_stopped());
    b.stopped.store(true, Ordering::Release);
    assert!(fanout.is_stopped());
}
