//! Session store (spec §4.B): the single source of truth for services, metric
//! rings, and the global alert ring.

pub mod actor;
pub mod model;

pub use actor::{
    GetAlerts, GetInitialSnapshot, GetMetricsWindow, GetStats, IngestMetric, ListConnectedServices,
    ReconcileConnectionClosed, RecordLeakAlert, RecordSnapshotAlert, RegisterCaptureAgent,
    RegisterService, ServiceStats, SessionStoreActor, SweepLiveness,
};
pub use model::{Alert, AlertKind, ConnectionHandle, ConnectionStatus, MetricSample, Service, ServiceSummary, Severity};
