//! Request/response DTOs for the query surface (spec §4.H, §6). Typed structs
//! throughout, rather than the teacher's inline `serde_json::json!` mix, since
//! this surface needs a stable wire contract for dashboard and CLI clients.

use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisResult, ComparisonSession};
use crate::store::{Alert, MetricSample, ServiceSummary, Severity};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: i64,
    pub services: usize,
    pub alerts: usize,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub limit: Option<usize>,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub service: String,
    pub total: usize,
    pub samples: Vec<MetricSample>,
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<usize>,
    pub service: Option<String>,
    pub severity: Option<String>,
}

impl AlertsQuery {
    pub fn parsed_severity(&self) -> Result<Option<Severity>, String> {
        match self.severity.as_deref() {
            None => Ok(None),
            Some("info") => Ok(Some(Severity::Info)),
            Some("warning") => Ok(Some(Severity::Warning)),
            Some("critical") => Ok(Some(Severity::Critical)),
            Some(other) => Err(format!("unknown severity: {other}")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_services: usize,
    pub connected_services: usize,
    pub total_alerts: usize,
    pub process_memory_mb: f64,
}

#[derive(Debug, Serialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub service_name: String,
    pub container_id: String,
    pub phase: String,
    pub snapshot_data: String,
    pub filename: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: String,
    pub phase: String,
    pub size: u64,
    pub filename: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    pub service_name: String,
    pub container_id: String,
    pub before_snapshot_id: String,
    pub after_snapshot_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResponse {
    pub session_id: String,
    pub status: &'static str,
    pub analysis: Option<AnalysisResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotGroup {
    pub session_id: String,
    pub complete: bool,
    pub snapshots: Vec<crate::snapshot::SnapshotSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotsResponse {
    pub snapshots: Vec<crate::snapshot::SnapshotSummary>,
    pub sessions: Vec<SnapshotGroup>,
}

#[derive(Debug, Serialize)]
pub struct ComparisonsResponse {
    pub comparisons: Vec<ComparisonSession>,
}
