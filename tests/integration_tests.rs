//! End-to-end scenario tests (spec §8 S1-S6), driven directly against the
//! actor fleet rather than a live WebSocket client — per DESIGN.md, the
//! concurrency contract under test is actor-mailbox FIFO ordering, which is
//! directly observable by sending messages in the documented order and
//! asserting on the resulting store/snapshot/analysis state.

use std::sync::Arc;
use std::time::Duration;

use actix::Actor;
use memhub::analysis::{
    AlwaysFailAnalyzer, AnalysisCoordinatorActor, CompareSync, ComparisonReady, HeuristicAnalyzer,
    ListSessions, SessionStatus,
};
use memhub::publisher::PublisherActor;
use memhub::snapshot::{
    AnnounceSnapshot, CompleteSnapshot, GetSnapshot, Phase, ReceiveChunk, SnapshotStatus,
    SnapshotStoreActor,
};
use memhub::store::{
    ConnectionHandle, GetAlerts, IngestMetric, ListConnectedServices, MetricSample,
    RegisterService, Severity, SessionStoreActor,
};

fn metric(ts: i64, leak: bool, growth: f64) -> MetricSample {
    MetricSample {
        timestamp: ts,
        heap_used_mb: 120.0,
        heap_total_mb: 200.0,
        rss_mb: 300.0,
        external_mb: 5.0,
        event_loop_delay_ms: 2.0,
        memory_growth_mb: growth,
        leak_detected: leak,
    }
}

fn temp_dir(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("memhub-it-{tag}-{}", uuid::Uuid::new_v4()))
}

/// S1: registration + single metric shows up on the service and its ring.
#[actix::test]
async fn s1_registration_and_single_metric() {
    let publisher = PublisherActor::new().start();
    let store = SessionStoreActor::new(1000, 100, 10, 50.0, publisher).start();
    let conn = ConnectionHandle(uuid::Uuid::new_v4());

    store
        .send(RegisterService { name: "svc-a".into(), timestamp_ms: 1_000_000, conn })
        .await
        .unwrap();
    store
        .send(IngestMetric { service: "svc-a".into(), sample: metric(1_000_100, false, 1.0) })
        .await
        .unwrap();

    let services = store.send(ListConnectedServices).await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].name, "svc-a");
    let last = services[0].last_metric.as_ref().unwrap();
    assert_eq!(last.heap_used_mb, 120.0);
}

/// S2: a leak-flagged metric raises a critical alert and bumps the service's
/// alert counter.
#[actix::test]
async fn s2_leak_detection_raises_critical_alert() {
    let publisher = PublisherActor::new().start();
    let store = SessionStoreActor::new(1000, 100, 10, 50.0, publisher).start();
    let conn = ConnectionHandle(uuid::Uuid::new_v4());

    store
        .send(RegisterService { name: "svc-a".into(), timestamp_ms: 1, conn })
        .await
        .unwrap();
    store
        .send(IngestMetric { service: "svc-a".into(), sample: metric(2, true, 50.0) })
        .await
        .unwrap();

    let alerts = store
        .send(GetAlerts { limit: None, service: None, severity: Some(Severity::Critical) })
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);

    let services = store.send(ListConnectedServices).await.unwrap();
    assert_eq!(services[0].alert_count, 1);
}

/// S3: chunks delivered out of order assemble to the in-order concatenation.
#[actix::test]
async fn s3_chunked_snapshot_out_of_order_assembles_correctly() {
    let dir = temp_dir("s3");
    let publisher = PublisherActor::new().start();
    let store = SnapshotStoreActor::new(dir.clone(), publisher).start();

    store
        .send(AnnounceSnapshot {
            id: "before_svc-a_1".into(),
            service: "svc-a".into(),
            container_id: "c1".into(),
            phase: Phase::Before,
            declared_size: 9,
            filename: "b.heapsnapshot".into(),
            total_chunks: 3,
            target_subdir: None,
        })
        .await
        .unwrap();

    for (idx, data) in [(0u32, "abc"), (2, "ghi"), (1, "def")] {
        store
            .send(ReceiveChunk {
                snapshot_id: "before_svc-a_1".into(),
                chunk_index: idx,
                total_chunks: 3,
                data: data.as_bytes().to_vec(),
            })
            .await
            .unwrap();
    }
    store
        .send(CompleteSnapshot { snapshot_id: "before_svc-a_1".into() })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let summary = store.send(GetSnapshot { id: "before_svc-a_1".into() }).await.unwrap().unwrap();
    assert_eq!(summary.status, SnapshotStatus::Complete);
    let bytes = tokio::fs::read(dir.join("b.heapsnapshot")).await.unwrap();
    assert_eq!(bytes, b"abcdefghi".to_vec());

    let _ = tokio::fs::remove_dir_all(dir).await;
}

async fn complete_snapshot(store: &actix::Addr<SnapshotStoreActor>, id: &str, bytes: &[u8]) {
    store
        .send(AnnounceSnapshot {
            id: id.to_string(),
            service: "svc-a".into(),
            container_id: "c1".into(),
            phase: Phase::Before,
            declared_size: bytes.len() as u64,
            filename: format!("{id}.bin"),
            total_chunks: 1,
            target_subdir: None,
        })
        .await
        .unwrap();
    store
        .send(ReceiveChunk { snapshot_id: id.to_string(), chunk_index: 0, total_chunks: 1, data: bytes.to_vec() })
        .await
        .unwrap();
    store.send(CompleteSnapshot { snapshot_id: id.to_string() }).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// S4: comparison happy path, with severity driven by the growth threshold.
#[actix::test]
async fn s4_comparison_happy_path_severity_by_growth() {
    let dir = temp_dir("s4");
    let publisher = PublisherActor::new().start();
    let snapshot_store = SnapshotStoreActor::new(dir.clone(), publisher.clone()).start();
    let session_store = SessionStoreActor::new(1000, 100, 10, 50.0, publisher.clone()).start();
    let coordinator = AnalysisCoordinatorActor::new(
        snapshot_store.clone(),
        session_store.clone(),
        publisher,
        Arc::new(HeuristicAnalyzer),
        Arc::new(AlwaysFailAnalyzer),
        1,
        50.0,
    )
    .start();

    complete_snapshot(&snapshot_store, "before_svc-a_1", b"aaaa").await;
    complete_snapshot(&snapshot_store, "after_svc-a_2", &vec![b'a'; 200]).await;

    let session = coordinator
        .send(CompareSync {
            service: "svc-a".into(),
            container_id: "c1".into(),
            before_id: "before_svc-a_1".into(),
            after_id: "after_svc-a_2".into(),
        })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.result.as_ref().unwrap().summary.suspicious_growth);

    let alerts = session_store
        .send(GetAlerts { limit: None, service: None, severity: Some(Severity::Warning) })
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);

    let _ = tokio::fs::remove_dir_all(dir).await;
}

/// S5: a comparison triggered before the "after" snapshot is complete stays
/// `waiting` and never reaches the analyzer.
#[actix::test]
async fn s5_comparison_pending_when_snapshot_incomplete() {
    let dir = temp_dir("s5");
    let publisher = PublisherActor::new().start();
    let snapshot_store = SnapshotStoreActor::new(dir.clone(), publisher.clone()).start();
    let session_store = SessionStoreActor::new(1000, 100, 10, 50.0, publisher.clone()).start();
    let coordinator = AnalysisCoordinatorActor::new(
        snapshot_store.clone(),
        session_store,
        publisher,
        Arc::new(HeuristicAnalyzer),
        Arc::new(AlwaysFailAnalyzer),
        1024,
        50.0,
    )
    .start();

    complete_snapshot(&snapshot_store, "before_svc-a_1", b"aaaa").await;

    coordinator.do_send(ComparisonReady {
        service: "svc-a".into(),
        container_id: "c1".into(),
        before_id: "before_svc-a_1".into(),
        after_id: "after_svc-a_2".into(),
        timeframe: None,
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let sessions = coordinator.send(ListSessions).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, SessionStatus::Waiting);
    assert!(sessions[0].result.is_none());

    let _ = tokio::fs::remove_dir_all(dir).await;
}

/// S6: a service that stops sending but never closes its socket is reaped by
/// the liveness sweep, not by connection close.
#[actix::test]
async fn s6_liveness_timeout_disconnects_idle_service() {
    use memhub::liveness::LivenessMonitorActor;

    let publisher = PublisherActor::new().start();
    let store = SessionStoreActor::new(1000, 100, 10, 50.0, publisher).start();
    let conn = ConnectionHandle(uuid::Uuid::new_v4());

    store
        .send(RegisterService { name: "svc-b".into(), timestamp_ms: 1, conn })
        .await
        .unwrap();

    let _monitor = LivenessMonitorActor::new(store.clone(), Duration::from_millis(20), Duration::from_millis(0)).start();
    tokio::time::sleep(Duration::from_millis(60)).await;

    let services = store.send(ListConnectedServices).await.unwrap();
    assert!(services.iter().all(|s| s.name != "svc-b"));
}
