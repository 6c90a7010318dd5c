use async_trait::async_trait;
use domain::{Direction, ProtocolFamily, RawSourceEvent, SourceDescriptor};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tap_capture::{CaptureConfig, TapFilter};
use tap_decode::{DecodeConfig, FixedDirection};
use tap_ingest::{
    ArrivalSource, IngestError, PushHandle, RunState, SessionConfig, TapSession, TcpFrameConfig,
    TcpFrameSource, push_channel,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

fn open_session(protocol: ProtocolFamily, capacity: usize) -> (TapSession, PushHandle) {
    let (handle, source) = push_channel(64);
    let session = TapSession::open(
        SourceDescriptor::new("test-source", protocol),
        SessionConfig {
            capture: CaptureConfig { capacity },
            decode: DecodeConfig::default(),
            stall_after_ms: 60_000,
        },
        Box::new(source),
        Arc::new(FixedDirection(Direction::In)),
    );
    (session, handle)
}

fn publish(topic: &str) -> RawSourceEvent {
    RawSourceEvent::structured(1, json!({"topic": topic, "qos": 0, "value": "21.5"}))
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn pushed_events_are_captured_in_order() {
    let (session, handle) = open_session(ProtocolFamily::Mqtt, 10);
    for topic in ["a/b", "a/b", "c/d"] {
        handle.push(publish(topic)).await.expect("push");
    }
    wait_until(|| session.stats().captured == 3).await;

    let summaries: Vec<String> = session
        .snapshot()
        .iter()
        .map(|event| event.summary.clone())
        .collect();
    assert_eq!(
        summaries,
        vec![
            "PUBLISH [a/b] (4 bytes)",
            "PUBLISH [a/b] (4 bytes)",
            "PUBLISH [c/d] (4 bytes)"
        ]
    );
    let ids: Vec<u64> = session.snapshot().iter().map(|event| event.sequence_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(session.filter(&TapFilter::new("C/D")).len(), 1);
    session.close().await;
}

#[tokio::test]
async fn paused_arrivals_are_dropped_not_replayed() {
    let (session, handle) = open_session(ProtocolFamily::Mqtt, 10);
    handle.push(publish("a/b")).await.expect("push");
    wait_until(|| session.stats().captured == 1).await;

    session.pause().expect("pause");
    assert_eq!(session.state(), RunState::Paused);
    for _ in 0..3 {
        handle.push(publish("paused/topic")).await.expect("push");
    }
    wait_until(|| session.stats().dropped_while_paused == 3).await;
    assert_eq!(session.snapshot().len(), 1);

    session.resume().expect("resume");
    handle.push(publish("c/d")).await.expect("push");
    wait_until(|| session.stats().captured == 2).await;
    let last = session.snapshot().last().cloned().expect("event");
    assert_eq!(last.sequence_id, 2);
    assert!(session.filter(&TapFilter::new("paused/topic")).is_empty());
    session.close().await;
}

#[tokio::test]
async fn stop_freezes_buffer_and_rejects_transitions() {
    let (session, handle) = open_session(ProtocolFamily::Kafka, 10);
    handle
        .push(RawSourceEvent::structured(
            1,
            json!({"partition": 0, "offset": 7, "key": null, "value": "x"}),
        ))
        .await
        .expect("push");
    wait_until(|| session.stats().captured == 1).await;

    session.stop().expect("stop");
    let frozen = session.snapshot();
    let _ = handle.try_push(publish("late"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(session.snapshot(), frozen);
    assert!(matches!(
        session.resume(),
        Err(IngestError::InvalidTransition {
            from: RunState::Stopped,
            ..
        })
    ));
    assert_eq!(frozen[0].summary, "Message: Partition 0, Offset 7");
    session.close().await;
    session.close().await;
}

#[tokio::test]
async fn eviction_clears_selection() {
    let (session, handle) = open_session(ProtocolFamily::Mqtt, 3);
    for _ in 0..3 {
        handle.push(publish("a/b")).await.expect("push");
    }
    wait_until(|| session.stats().captured == 3).await;

    let inspection = session.select(1).expect("select");
    assert_eq!(inspection.metadata.sequence_id, 1);

    handle.push(publish("c/d")).await.expect("push");
    wait_until(|| session.stats().captured == 4).await;
    assert!(session.selected().is_none());
    assert!(session.inspect(1).is_err());
    assert_eq!(session.stats().evicted, 1);
    session.close().await;
}

#[tokio::test]
async fn clear_empties_buffer_and_selection() {
    let (session, handle) = open_session(ProtocolFamily::Http, 5);
    handle
        .push(RawSourceEvent::structured(
            1,
            json!({"method": "get", "path": "/health", "headers": {}, "body": null}),
        ))
        .await
        .expect("push");
    wait_until(|| session.stats().captured == 1).await;
    session.select(1).expect("select");

    assert_eq!(session.clear(), 1);
    assert!(session.snapshot().is_empty());
    assert!(session.selected().is_none());

    handle
        .push(RawSourceEvent::structured(
            1,
            json!({"method": "post", "path": "/x", "headers": {}, "body": "b"}),
        ))
        .await
        .expect("push");
    wait_until(|| session.stats().captured == 2).await;
    assert_eq!(session.snapshot()[0].sequence_id, 2);
    assert_eq!(session.snapshot()[0].summary, "POST /x 200 OK");
    session.close().await;
}

#[tokio::test]
async fn closed_push_source_leaves_session_idle() {
    let (session, handle) = open_session(ProtocolFamily::Mqtt, 5);
    handle.push(publish("a/b")).await.expect("push");
    wait_until(|| session.stats().captured == 1).await;
    drop(handle);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(session.state(), RunState::Running);
    assert!(session.is_stalled(i64::MAX));
    session.close().await;
    assert_eq!(session.state(), RunState::Stopped);
    assert!(!session.is_stalled(i64::MAX));
}

#[tokio::test]
async fn tcp_frames_are_captured_as_generic_tcp() {
    let source = TcpFrameSource::bind(TcpFrameConfig::new(
        "127.0.0.1:0".parse().expect("addr"),
    ))
    .await
    .expect("bind");
    let addr = source.local_addr();
    let session = TapSession::open(
        SourceDescriptor::new("tcp", ProtocolFamily::GenericTcp),
        SessionConfig::default(),
        Box::new(source),
        Arc::new(FixedDirection::default()),
    );

    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(b"hello\nworld\n").await.expect("write");
    wait_until(|| session.stats().captured == 2).await;

    let events = session.snapshot();
    assert_eq!(events[0].protocol, ProtocolFamily::GenericTcp);
    assert_eq!(events[0].payload.get("raw"), Some(&json!("hello")));
    assert_eq!(events[1].summary, "Len: 5");
    session.close().await;
}

/// 奇数次拉取失败、偶数次产出一条 MQTT 事件。
struct FlakySource {
    pulls: u64,
}

#[async_trait]
impl ArrivalSource for FlakySource {
    async fn next_arrival(&mut self) -> Result<RawSourceEvent, IngestError> {
        self.pulls += 1;
        tokio::time::sleep(Duration::from_millis(1)).await;
        if self.pulls % 2 == 1 {
            return Err(IngestError::Source(format!("broker hiccup #{}", self.pulls)));
        }
        Ok(publish("flaky/topic"))
    }
}

#[tokio::test]
async fn source_errors_are_counted_and_loop_keeps_running() {
    let session = TapSession::open(
        SourceDescriptor::new("flaky", ProtocolFamily::Mqtt),
        SessionConfig::default(),
        Box::new(FlakySource { pulls: 0 }),
        Arc::new(FixedDirection::default()),
    );
    wait_until(|| session.stats().captured >= 5).await;

    let stats = session.stats();
    assert_eq!(stats.state, RunState::Running);
    assert!(stats.adapter_errors >= 5);
    let ids: Vec<u64> = session.snapshot().iter().map(|event| event.sequence_id).collect();
    assert_eq!(ids[..5], [1, 2, 3, 4, 5]);
    session.close().await;
}

#[tokio::test]
async fn oversized_tcp_frames_are_discarded() {
    let mut config = TcpFrameConfig::new("127.0.0.1:0".parse().expect("addr"));
    config.max_frame_bytes = 8;
    let source = TcpFrameSource::bind(config).await.expect("bind");
    let addr = source.local_addr();
    let session = TapSession::open(
        SourceDescriptor::new("tcp", ProtocolFamily::GenericTcp),
        SessionConfig::default(),
        Box::new(source),
        Arc::new(FixedDirection::default()),
    );

    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream
        .write_all(b"0123456789ABCDEFGHIJ\nok\n")
        .await
        .expect("write");
    wait_until(|| session.stats().captured == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let events = session.snapshot();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload.get("raw"), Some(&json!("ok")));
    session.close().await;
}
