//! Comparison session data model (spec §3 "Comparison session").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Analyzing,
    Completed,
    Failed,
}

/// The analyzer interface's report shape (spec §6 "Analyzer interface"). The
/// core only ever reads `summary`; `leaks`/`offenders`/`recommendations` pass
/// through opaquely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub summary: AnalysisSummary,
    #[serde(default)]
    pub leaks: Vec<serde_json::Value>,
    #[serde(default)]
    pub offenders: Vec<serde_json::Value>,
    #[serde(default)]
    pub recommendations: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub total_leaks_mb: f64,
    pub total_growth_mb: f64,
    pub suspicious_growth: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSession {
    pub id: String,
    pub service: String,
    pub container_id: String,
    pub before_id: String,
    pub after_id: String,
    pub created_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub error: Option<String>,
    pub result: Option<AnalysisResult>,
}

impl ComparisonSession {
    pub fn new(id: String, service: String, container_id: String, before_id: String, after_id: String) -> Self {
        Self {
            id,
            service,
            container_id,
            before_id,
            after_id,
            created_at: Utc::now(),
            status: SessionStatus::Waiting,
            error: None,
            result: None,
        }
    }
}
