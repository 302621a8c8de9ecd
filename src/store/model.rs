//! Session store data model (spec §3 "Service", "Metric sample", "Alert").

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

/// A non-owning handle to a connection, used to detect whether a given service's
/// producer connection is still the one currently registered (spec §3 "weak
/// reference from service to connection", §9). Equality is by connection id only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionHandle(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub registered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub status: ConnectionStatus,
    pub alert_count: u64,
    pub producer: Option<ConnectionHandle>,
    pub metrics: VecDeque<MetricSample>,
    pub metric_ring_capacity: usize,
}

impl Service {
    pub fn new(name: String, now: DateTime<Utc>, conn: ConnectionHandle, ring_capacity: usize) -> Self {
        Self {
            name,
            registered_at: now,
            last_seen: now,
            status: ConnectionStatus::Connected,
            alert_count: 0,
            producer: Some(conn),
            metrics: VecDeque::new(),
            metric_ring_capacity: ring_capacity,
        }
    }

    /// Push a sample onto the per-service ring, evicting the oldest when at
    /// capacity (spec §3 invariant, §8 property 1 & 12).
    pub fn push_metric(&mut self, sample: MetricSample) {
        if self.metrics.len() >= self.metric_ring_capacity {
            self.metrics.pop_front();
        }
        self.metrics.push_back(sample);
    }

    pub fn summary(&self) -> ServiceSummary {
        ServiceSummary {
            name: self.name.clone(),
            status: self.status,
            registered_at: self.registered_at,
            last_seen: self.last_seen,
            alert_count: self.alert_count,
            last_metric: self.metrics.back().cloned(),
        }
    }
}

/// Read-only projection of [`Service`] used on the wire and in query responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub name: String,
    pub status: ConnectionStatus,
    pub registered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub alert_count: u64,
    pub last_metric: Option<MetricSample>,
}

/// Immutable metric sample, keyed implicitly by the service whose ring it lives
/// in plus `timestamp_ms` (spec §3 "Metric sample").
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub timestamp: i64,
    #[serde(rename = "heapUsedMB")]
    pub heap_used_mb: f64,
    #[serde(rename = "heapTotalMB")]
    pub heap_total_mb: f64,
    #[serde(rename = "rssMB")]
    pub rss_mb: f64,
    #[serde(rename = "externalMB")]
    pub external_mb: f64,
    pub event_loop_delay_ms: f64,
    #[serde(rename = "memoryGrowthMB")]
    pub memory_growth_mb: f64,
    pub leak_detected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Leak,
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Immutable alert record (spec §3 "Alert"), stored in a single global bounded
/// sequence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: u64,
    pub service: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub timestamp: i64,
    /// Kind-specific extra fields (e.g. `totalGrowthMB`, `filename`), kept as a
    /// loosely-typed bag since spec §3 only requires they travel with the alert.
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

/// Append-only, oldest-evicted bounded sequence (spec GLOSSARY "Ring").
#[derive(Debug)]
pub struct Ring<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> Ring<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
