//! Wire codec — frame <-> tagged-message decode/encode for the agent/subscriber
//! protocol (spec §4.A, §6). Mirrors the teacher's tagged-enum convention
//! (`actor.rs::WsMessage`, `actors/messages.rs::ClientMessage`/`ServerMessage`)
//! but keyed by a bare `type` discriminator (no `content` wrapper), per the wire
//! shapes spec §6 documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound agent frames. Unknown or malformed tags never fail to parse — they
/// fall through to [`AgentMessage::Unknown`] so the frame boundary is never
/// crossed by a decode error (spec §4.A, §7 "Protocol errors").
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "camelCase")]
pub enum AgentMessage {
    #[serde(rename = "registration")]
    Registration { service: String, timestamp: i64 },

    #[serde(rename = "metrics")]
    Metrics {
        service: String,
        #[serde(rename = "heapUsedMB")]
        heap_used_mb: f64,
        #[serde(rename = "heapTotalMB")]
        heap_total_mb: f64,
        #[serde(rename = "rssMB")]
        rss_mb: f64,
        #[serde(rename = "externalMB")]
        external_mb: f64,
        #[serde(rename = "eventLoopDelayMs")]
        event_loop_delay_ms: f64,
        timestamp: i64,
        #[serde(rename = "leakDetected")]
        leak_detected: bool,
        #[serde(rename = "memoryGrowthMB")]
        memory_growth_mb: f64,
    },

    #[serde(rename = "snapshot")]
    SnapshotNotification {
        service: String,
        filename: String,
        filepath: String,
        timestamp: i64,
    },

    #[serde(rename = "capture-agent-registration")]
    CaptureAgentRegistration {
        #[serde(rename = "serviceName")]
        service_name: String,
        #[serde(rename = "containerId")]
        container_id: String,
        timestamp: i64,
    },

    #[serde(rename = "snapshot-metadata")]
    SnapshotMetadata { snapshot: SnapshotMetadataPayload },

    #[serde(rename = "snapshot-chunk")]
    SnapshotChunk {
        #[serde(rename = "snapshotId")]
        snapshot_id: String,
        #[serde(rename = "chunkIndex")]
        chunk_index: u32,
        #[serde(rename = "totalChunks")]
        total_chunks: u32,
        data: String,
    },

    #[serde(rename = "snapshot-complete")]
    SnapshotComplete {
        #[serde(rename = "snapshotId")]
        snapshot_id: String,
    },

    #[serde(rename = "comparison-ready")]
    ComparisonReady {
        #[serde(rename = "serviceName")]
        service_name: String,
        #[serde(rename = "containerId")]
        container_id: String,
        #[serde(rename = "beforeSnapshotId")]
        before_snapshot_id: String,
        #[serde(rename = "afterSnapshotId")]
        after_snapshot_id: String,
        timeframe: Option<Value>,
        timestamp: i64,
    },

    /// Catch-all for any tag not named above. Logged and ignored (spec §4.F).
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadataPayload {
    pub id: String,
    pub service_name: String,
    pub container_id: String,
    pub phase: String,
    pub timestamp: i64,
    pub size: u64,
    pub filename: String,
    #[serde(default)]
    pub total_chunks: Option<u32>,
}

/// Parse a raw text frame into an [`AgentMessage`], or `None` if the frame is
/// not even valid JSON / lacks a recognizable discriminator — the caller
/// replies with the protocol error frame in that case (spec §4.A).
pub fn decode_agent_message(text: &str) -> Option<AgentMessage> {
    serde_json::from_str(text).ok()
}

/// Outbound subscriber events (spec §6 "Server -> subscriber events").
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename = "initial")]
    Initial {
        services: Vec<crate::store::model::ServiceSummary>,
        alerts: Vec<crate::store::model::Alert>,
    },
    #[serde(rename = "serviceRegistered")]
    ServiceRegistered { service: crate::store::model::ServiceSummary },
    #[serde(rename = "serviceUpdate")]
    ServiceUpdate { service: String, status: &'static str },
    #[serde(rename = "metricsUpdate")]
    MetricsUpdate {
        service: String,
        #[serde(flatten)]
        sample: crate::store::model::MetricSample,
    },
    #[serde(rename = "leakAlert")]
    LeakAlert { alert: crate::store::model::Alert },
    #[serde(rename = "snapshotAlert")]
    SnapshotAlert { alert: crate::store::model::Alert },
    #[serde(rename = "captureAgentRegistered")]
    CaptureAgentRegistered {
        #[serde(rename = "serviceName")]
        service_name: String,
        #[serde(rename = "containerId")]
        container_id: String,
    },
    #[serde(rename = "snapshotStarted")]
    SnapshotStarted {
        #[serde(rename = "snapshotId")]
        snapshot_id: String,
    },
    #[serde(rename = "snapshotProgress")]
    SnapshotProgress {
        #[serde(rename = "snapshotId")]
        snapshot_id: String,
        #[serde(rename = "receivedChunks")]
        received_chunks: u32,
        #[serde(rename = "totalChunks")]
        total_chunks: u32,
    },
    #[serde(rename = "snapshotCompleted")]
    SnapshotCompleted {
        #[serde(rename = "snapshotId")]
        snapshot_id: String,
        filename: String,
    },
    #[serde(rename = "comparisonStarted")]
    ComparisonStarted {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    #[serde(rename = "comparisonCompleted")]
    ComparisonCompleted {
        #[serde(rename = "sessionId")]
        session_id: String,
        result: crate::analysis::model::AnalysisResult,
    },
    #[serde(rename = "comparisonFailed")]
    ComparisonFailed {
        #[serde(rename = "sessionId")]
        session_id: String,
        error: String,
    },
    #[serde(rename = "comparisonPending")]
    ComparisonPending {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "missingSnapshots")]
        missing_snapshots: MissingSnapshots,
    },
    #[serde(rename = "error")]
    Error { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct MissingSnapshots {
    pub before: bool,
    pub after: bool,
}

pub fn protocol_error_frame() -> String {
    serde_json::to_string(&ServerEvent::Error {
        error: "Invalid JSON message".to_string(),
    })
    .expect("ServerEvent::Error always serializes")
}
