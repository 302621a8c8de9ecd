//! `SessionStoreActor` — the canonical in-memory store, realized as a single
//! actix actor so every mutation runs to completion without yielding (spec §5).
//! Handlers are synchronous; the only suspending work (publishing a frame to a
//! subscriber's socket) is delegated to [`crate::publisher::PublisherActor`] via
//! `do_send`, which never blocks the mailbox.

use std::collections::HashMap;
use std::time::Duration;

use actix::prelude::*;
use chrono::Utc;
use tracing::{info, warn};

use crate::codec::ServerEvent;
use crate::publisher::{Publish, PublisherActor};
use crate::store::model::{
    Alert, AlertKind, ConnectionHandle, ConnectionStatus, MetricSample, Ring, Service,
    ServiceSummary, Severity,
};

pub struct SessionStoreActor {
    services: HashMap<String, Service>,
    alerts: Ring<Alert>,
    next_alert_id: u64,
    metric_ring_capacity: usize,
    initial_alert_count: usize,
    critical_growth_mb: f64,
    publisher: Addr<PublisherActor>,
}

impl SessionStoreActor {
    pub fn new(
        metric_ring_capacity: usize,
        alert_ring_capacity: usize,
        initial_alert_count: usize,
        critical_growth_mb: f64,
        publisher: Addr<PublisherActor>,
    ) -> Self {
        Self {
            services: HashMap::new(),
            alerts: Ring::new(alert_ring_capacity),
            next_alert_id: 1,
            metric_ring_capacity,
            initial_alert_count,
            critical_growth_mb,
            publisher,
        }
    }

    fn publish(&self, event: ServerEvent) {
        self.publisher.do_send(Publish(event));
    }

    fn push_alert(
        &mut self,
        service: String,
        kind: AlertKind,
        severity: Severity,
        message: String,
        details: serde_json::Value,
    ) -> Alert {
        let alert = Alert {
            id: self.next_alert_id,
            service: service.clone(),
            kind,
            severity,
            message,
            timestamp: Utc::now().timestamp_millis(),
            details,
        };
        self.next_alert_id += 1;
        self.alerts.push(alert.clone());
        if let Some(svc) = self.services.get_mut(&service) {
            svc.alert_count += 1;
        }
        alert
    }

    /// Current `initial` snapshot for a newly-subscribing dashboard connection
    /// (spec §4.E `subscribe`).
    pub fn initial_snapshot(&self) -> ServerEvent {
        let services = self
            .services
            .values()
            .filter(|s| s.status == ConnectionStatus::Connected)
            .map(Service::summary)
            .collect();
        let alerts = self
            .alerts
            .iter()
            .rev()
            .take(self.initial_alert_count)
            .rev()
            .cloned()
            .collect();
        ServerEvent::Initial { services, alerts }
    }
}

impl Actor for SessionStoreActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("session store actor started");
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct RegisterService {
    pub name: String,
    pub timestamp_ms: i64,
    pub conn: ConnectionHandle,
}

impl Handler<RegisterService> for SessionStoreActor {
    type Result = ();

    fn handle(&mut self, msg: RegisterService, _ctx: &mut Self::Context) {
        let now = Utc::now();
        let entry = self.services.entry(msg.name.clone());
        let service = entry.or_insert_with(|| Service::new(msg.name.clone(), now, msg.conn, self.metric_ring_capacity));
        service.status = ConnectionStatus::Connected;
        service.last_seen = now;
        service.producer = Some(msg.conn);
        let summary = service.summary();
        self.publish(ServerEvent::ServiceRegistered { service: summary });
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct RegisterCaptureAgent {
    pub service_name: String,
    pub container_id: String,
    pub conn: ConnectionHandle,
}

impl Handler<RegisterCaptureAgent> for SessionStoreActor {
    type Result = ();

    fn handle(&mut self, msg: RegisterCaptureAgent, _ctx: &mut Self::Context) {
        let name = format!("capture-{}", msg.service_name);
        let now = Utc::now();
        let entry = self.services.entry(name.clone());
        let service = entry.or_insert_with(|| Service::new(name.clone(), now, msg.conn, self.metric_ring_capacity));
        service.status = ConnectionStatus::Connected;
        service.last_seen = now;
        service.producer = Some(msg.conn);
        self.publish(ServerEvent::CaptureAgentRegistered {
            service_name: msg.service_name,
            container_id: msg.container_id,
        });
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct IngestMetric {
    pub service: String,
    pub sample: MetricSample,
}

impl Handler<IngestMetric> for SessionStoreActor {
    type Result = ();

    fn handle(&mut self, msg: IngestMetric, _ctx: &mut Self::Context) {
        let Some(service) = self.services.get_mut(&msg.service) else {
            warn!(service = %msg.service, "metrics for unregistered service, dropping");
            return;
        };
        service.last_seen = Utc::now();
        service.status = ConnectionStatus::Connected;
        let leak_detected = msg.sample.leak_detected;
        let growth = msg.sample.memory_growth_mb;
        service.push_metric(msg.sample.clone());

        self.publish(ServerEvent::MetricsUpdate {
            service: msg.service.clone(),
            sample: msg.sample,
        });

        if leak_detected {
            let severity = if growth >= self.critical_growth_mb { Severity::Critical } else { Severity::Warning };
            let alert = self.push_alert(
                msg.service.clone(),
                AlertKind::Leak,
                severity,
                format!("leak detected in {} (growth {:.1}MB)", msg.service, growth),
                serde_json::json!({ "memoryGrowthMB": growth, "source": "metrics" }),
            );
            self.publish(ServerEvent::LeakAlert { alert });
        }
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct RecordSnapshotAlert {
    pub service: String,
    pub filename: String,
    pub filepath: String,
}

impl Handler<RecordSnapshotAlert> for SessionStoreActor {
    type Result = ();

    fn handle(&mut self, msg: RecordSnapshotAlert, _ctx: &mut Self::Context) {
        let alert = self.push_alert(
            msg.service.clone(),
            AlertKind::Snapshot,
            Severity::Info,
            format!("snapshot notification for {}: {}", msg.service, msg.filename),
            serde_json::json!({ "filename": msg.filename, "filepath": msg.filepath }),
        );
        self.publish(ServerEvent::SnapshotAlert { alert });
    }
}

/// Raised from [`crate::analysis`] when an analyzer reports suspicious growth
/// (spec §4.G step 3).
#[derive(Message)]
#[rtype(result = "()")]
pub struct RecordLeakAlert {
    pub service: String,
    pub severity: Severity,
    pub message: String,
    pub total_growth_mb: f64,
}

impl Handler<RecordLeakAlert> for SessionStoreActor {
    type Result = ();

    fn handle(&mut self, msg: RecordLeakAlert, _ctx: &mut Self::Context) {
        let alert = self.push_alert(
            msg.service,
            AlertKind::Leak,
            msg.severity,
            msg.message,
            serde_json::json!({ "totalGrowthMB": msg.total_growth_mb, "source": "analysis" }),
        );
        self.publish(ServerEvent::LeakAlert { alert });
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct SweepLiveness {
    pub timeout: Duration,
}

impl Handler<SweepLiveness> for SessionStoreActor {
    type Result = ();

    fn handle(&mut self, msg: SweepLiveness, _ctx: &mut Self::Context) {
        let now = Utc::now();
        let mut transitioned = Vec::new();
        for service in self.services.values_mut() {
            if service.status == ConnectionStatus::Connected {
                let idle = now.signed_duration_since(service.last_seen);
                if idle.to_std().unwrap_or(Duration::ZERO) > msg.timeout {
                    service.status = ConnectionStatus::Disconnected;
                    service.producer = None;
                    transitioned.push(service.name.clone());
                }
            }
        }
        for name in transitioned {
            info!(service = %name, "liveness sweep marked service disconnected");
            self.publish(ServerEvent::ServiceUpdate { service: name, status: "disconnected" });
        }
    }
}

/// Fired when a connection closes (spec §4.F "On close"): any service whose
/// producer matches is reconciled to disconnected.
#[derive(Message)]
#[rtype(result = "()")]
pub struct ReconcileConnectionClosed {
    pub conn: ConnectionHandle,
}

impl Handler<ReconcileConnectionClosed> for SessionStoreActor {
    type Result = ();

    fn handle(&mut self, msg: ReconcileConnectionClosed, _ctx: &mut Self::Context) {
        let mut transitioned = Vec::new();
        for service in self.services.values_mut() {
            if service.producer == Some(msg.conn) {
                service.status = ConnectionStatus::Disconnected;
                service.producer = None;
                transitioned.push(service.name.clone());
            }
        }
        for name in transitioned {
            self.publish(ServerEvent::ServiceUpdate { service: name, status: "disconnected" });
        }
    }
}

#[derive(Message)]
#[rtype(result = "Vec<ServiceSummary>")]
pub struct ListConnectedServices;

impl Handler<ListConnectedServices> for SessionStoreActor {
    type Result = Vec<ServiceSummary>;

    fn handle(&mut self, _msg: ListConnectedServices, _ctx: &mut Self::Context) -> Vec<ServiceSummary> {
        self.services
            .values()
            .filter(|s| s.status == ConnectionStatus::Connected)
            .map(Service::summary)
            .collect()
    }
}

#[derive(Message)]
#[rtype(result = "Option<(Vec<MetricSample>, usize)>")]
pub struct GetMetricsWindow {
    pub service: String,
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub limit: Option<usize>,
}

impl Handler<GetMetricsWindow> for SessionStoreActor {
    type Result = Option<(Vec<MetricSample>, usize)>;

    fn handle(&mut self, msg: GetMetricsWindow, _ctx: &mut Self::Context) -> Option<(Vec<MetricSample>, usize)> {
        let service = self.services.get(&msg.service)?;
        let mut window: Vec<MetricSample> = service
            .metrics
            .iter()
            .filter(|m| msg.from.map_or(true, |f| m.timestamp >= f))
            .filter(|m| msg.to.map_or(true, |t| m.timestamp <= t))
            .cloned()
            .collect();
        let total = window.len();
        if let Some(limit) = msg.limit {
            if window.len() > limit {
                window = window.split_off(window.len() - limit);
            }
        }
        Some((window, total))
    }
}

#[derive(Message)]
#[rtype(result = "Vec<Alert>")]
pub struct GetAlerts {
    pub limit: Option<usize>,
    pub service: Option<String>,
    pub severity: Option<Severity>,
}

impl Handler<GetAlerts> for SessionStoreActor {
    type Result = Vec<Alert>;

    fn handle(&mut self, msg: GetAlerts, _ctx: &mut Self::Context) -> Vec<Alert> {
        let mut matched: Vec<Alert> = self
            .alerts
            .iter()
            .rev()
            .filter(|a| msg.service.as_deref().map_or(true, |s| a.service == s))
            .filter(|a| msg.severity.map_or(true, |s| a.severity == s))
            .cloned()
            .collect();
        if let Some(limit) = msg.limit {
            matched.truncate(limit);
        }
        matched
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceStats {
    pub total_services: usize,
    pub connected_services: usize,
    pub total_alerts: usize,
}

#[derive(Message)]
#[rtype(result = "ServiceStats")]
pub struct GetStats;

impl Handler<GetStats> for SessionStoreActor {
    type Result = ServiceStats;

    fn handle(&mut self, _msg: GetStats, _ctx: &mut Self::Context) -> ServiceStats {
        ServiceStats {
            total_services: self.services.len(),
            connected_services: self
                .services
                .values()
                .filter(|s| s.status == ConnectionStatus::Connected)
                .count(),
            total_alerts: self.alerts.len(),
        }
    }
}

#[derive(Message)]
#[rtype(result = "ServerEvent")]
pub struct GetInitialSnapshot;

impl Handler<GetInitialSnapshot> for SessionStoreActor {
    type Result = ServerEvent;

    fn handle(&mut self, _msg: GetInitialSnapshot, _ctx: &mut Self::Context) -> ServerEvent {
        self.initial_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::PublisherActor;

    fn sample(ts: i64, leak: bool, growth: f64) -> MetricSample {
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

    #[actix::test]
    async fn register_then_ingest_updates_service_and_publishes() {
        let publisher = PublisherActor::new().start();
        let store = SessionStoreActor::new(1000, 100, 10, 50.0, publisher).start();
        let conn = ConnectionHandle(uuid::Uuid::new_v4());

        store
            .send(RegisterService { name: "svc-a".into(), timestamp_ms: 1, conn })
            .await
            .unwrap();
        store
            .send(IngestMetric { service: "svc-a".into(), sample: sample(100, false, 1.0) })
            .await
            .unwrap();

        let services = store.send(ListConnectedServices).await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "svc-a");
        assert_eq!(services[0].last_metric.as_ref().unwrap().heap_used_mb, 120.0);
    }

    #[actix::test]
    async fn leak_detected_raises_alert_and_increments_counter() {
        let publisher = PublisherActor::new().start();
        let store = SessionStoreActor::new(1000, 100, 10, 50.0, publisher).start();
        let conn = ConnectionHandle(uuid::Uuid::new_v4());
        store
            .send(RegisterService { name: "svc-a".into(), timestamp_ms: 1, conn })
            .await
            .unwrap();
        store
            .send(IngestMetric { service: "svc-a".into(), sample: sample(100, true, 50.0) })
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

    #[actix::test]
    async fn reconcile_closed_connection_marks_service_disconnected() {
        let publisher = PublisherActor::new().start();
        let store = SessionStoreActor::new(1000, 100, 10, 50.0, publisher).start();
        let conn = ConnectionHandle(uuid::Uuid::new_v4());
        store
            .send(RegisterService { name: "svc-b".into(), timestamp_ms: 1, conn })
            .await
            .unwrap();
        store.send(ReconcileConnectionClosed { conn }).await.unwrap();

        let services = store.send(ListConnectedServices).await.unwrap();
        assert!(services.is_empty());
    }

    #[actix::test]
    async fn sweep_liveness_disconnects_stale_service() {
        let publisher = PublisherActor::new().start();
        let store = SessionStoreActor::new(1000, 100, 10, 50.0, publisher).start();
        let conn = ConnectionHandle(uuid::Uuid::new_v4());
        store
            .send(RegisterService { name: "svc-c".into(), timestamp_ms: 1, conn })
            .await
            .unwrap();
        store
            .send(SweepLiveness { timeout: Duration::from_secs(0) })
            .await
            .unwrap();

        let services = store.send(ListConnectedServices).await.unwrap();
        assert!(services.is_empty());
    }

    #[actix::test]
    async fn metrics_ring_caps_at_1000_and_1001st_evicts_oldest() {
        let publisher = PublisherActor::new().start();
        let store = SessionStoreActor::new(1000, 100, 10, 50.0, publisher).start();
        let conn = ConnectionHandle(uuid::Uuid::new_v4());
        store
            .send(RegisterService { name: "svc-d".into(), timestamp_ms: 1, conn })
            .await
            .unwrap();
        for i in 0..1001 {
            store
                .send(IngestMetric { service: "svc-d".into(), sample: sample(i, false, 0.0) })
                .await
                .unwrap();
        }
        let (window, total) = store
            .send(GetMetricsWindow { service: "svc-d".into(), from: None, to: None, limit: None })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(total, 1000);
        assert_eq!(window.first().unwrap().timestamp, 1);
        assert_eq!(window.last().unwrap().timestamp, 1000);
    }
}
