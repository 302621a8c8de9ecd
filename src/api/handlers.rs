//! Query surface handlers (spec §4.H), mounted under `/api/*` plus `/health`
//! and the two WebSocket upgrade paths, matching the teacher's
//! `server.rs`/`api.rs` route-table convention.

use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use base64::Engine;
use chrono::Utc;

use crate::analysis::CompareSync;
use crate::api::dto::{
    AlertsQuery, AlertsResponse, CompareRequest, CompareResponse, HealthResponse, MetricsQuery,
    MetricsResponse, ServicesResponse, SnapshotGroup, SnapshotsResponse, StatsResponse,
    UploadRequest, UploadResponse,
};
use crate::error::ApiError;
use crate::server::AppState;
use crate::snapshot::{AnnounceSnapshot, CompleteSnapshot, GetSnapshot, ListSnapshots, Phase, ReceiveChunk, SnapshotStatus};
use crate::store::{GetAlerts, GetMetricsWindow, GetStats, ListConnectedServices};

pub async fn health(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let stats = state.session_store.send(GetStats).await.map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp_millis(),
        services: stats.connected_services,
        alerts: stats.total_alerts,
    }))
}

pub async fn list_services(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let services = state
        .session_store
        .send(ListConnectedServices)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(HttpResponse::Ok().json(ServicesResponse { services }))
}

pub async fn service_metrics(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<MetricsQuery>,
) -> Result<HttpResponse, ApiError> {
    let service = path.into_inner();
    let window = state
        .session_store
        .send(GetMetricsWindow { service: service.clone(), from: query.from, to: query.to, limit: query.limit })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let Some((samples, total)) = window else {
        return Err(ApiError::NotFound(format!("unknown service: {service}")));
    };
    Ok(HttpResponse::Ok().json(MetricsResponse { service, total, samples }))
}

pub async fn list_alerts(state: web::Data<AppState>, query: web::Query<AlertsQuery>) -> Result<HttpResponse, ApiError> {
    let severity = query.parsed_severity().map_err(ApiError::BadRequest)?;
    let alerts = state
        .session_store
        .send(GetAlerts { limit: query.limit, service: query.service.clone(), severity })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(HttpResponse::Ok().json(AlertsResponse { alerts }))
}

pub async fn stats(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let stats = state.session_store.send(GetStats).await.map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(HttpResponse::Ok().json(StatsResponse {
        total_services: stats.total_services,
        connected_services: stats.connected_services,
        total_alerts: stats.total_alerts,
        process_memory_mb: current_process_memory_mb(),
    }))
}

fn current_process_memory_mb() -> f64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(contents) = std::fs::read_to_string("/proc/self/statm") {
            if let Some(pages) = contents.split_whitespace().nth(1) {
                if let Ok(pages) = pages.parse::<f64>() {
                    let page_size = 4096.0;
                    return pages * page_size / (1024.0 * 1024.0);
                }
            }
        }
        0.0
    }
    #[cfg(not(target_os = "linux"))]
    {
        0.0
    }
}

/// Polls the snapshot store until `id` reaches `Complete` or the attempt
/// budget is exhausted. The reassembler persists off the actor's mailbox
/// (spec §4.C), so a synchronous caller that needs the final status — the
/// upload endpoint — waits for it here instead of guessing a sleep duration.
async fn wait_for_snapshot_complete(state: &AppState, id: &str) -> Option<crate::snapshot::SnapshotSummary> {
    for _ in 0..200 {
        if let Ok(Some(summary)) = state.snapshot_store.send(GetSnapshot { id: id.to_string() }).await {
            if summary.status == SnapshotStatus::Complete {
                return Some(summary);
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}

pub async fn upload_snapshot(state: web::Data<AppState>, body: web::Json<UploadRequest>) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    let phase = Phase::parse(&req.phase).ok_or_else(|| ApiError::BadRequest(format!("unknown phase: {}", req.phase)))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(req.snapshot_data.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 snapshot data: {e}")))?;

    let id = format!("{}_{}_{}", phase.as_str(), req.service_name, Utc::now().timestamp_millis());
    let size = bytes.len() as u64;

    state
        .snapshot_store
        .send(AnnounceSnapshot {
            id: id.clone(),
            service: req.service_name.clone(),
            container_id: req.container_id,
            phase,
            declared_size: size,
            filename: req.filename.clone(),
            total_chunks: 1,
            target_subdir: Some(req.service_name),
        })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    state
        .snapshot_store
        .send(ReceiveChunk { snapshot_id: id.clone(), chunk_index: 0, total_chunks: 1, data: bytes })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    state
        .snapshot_store
        .send(CompleteSnapshot { snapshot_id: id.clone() })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let summary = wait_for_snapshot_complete(&state, &id)
        .await
        .ok_or_else(|| ApiError::Internal("snapshot did not persist in time".to_string()))?;

    Ok(HttpResponse::Ok().json(UploadResponse {
        id: summary.id,
        phase: summary.phase.as_str().to_string(),
        size: summary.declared_size,
        filename: summary.filename,
    }))
}

pub async fn compare_snapshots(state: web::Data<AppState>, body: web::Json<CompareRequest>) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    let session = state
        .analysis
        .send(CompareSync {
            service: req.service_name,
            container_id: req.container_id,
            before_id: req.before_snapshot_id,
            after_id: req.after_snapshot_id,
        })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)?;

    let status = match session.status {
        crate::analysis::SessionStatus::Completed => "completed",
        crate::analysis::SessionStatus::Failed => "failed",
        crate::analysis::SessionStatus::Analyzing => "analyzing",
        crate::analysis::SessionStatus::Waiting => "waiting",
    };

    Ok(HttpResponse::Ok().json(CompareResponse { session_id: session.id, status, analysis: session.result }))
}

fn snapshot_group_key(filename: &str) -> String {
    let stem = filename.rsplit_once('.').map(|(s, _)| s).unwrap_or(filename);
    stem.split('_')
        .filter(|part| !part.eq_ignore_ascii_case("before") && !part.eq_ignore_ascii_case("after"))
        .collect::<Vec<_>>()
        .join("_")
}

pub async fn list_snapshots(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let snapshots = state.snapshot_store.send(ListSnapshots).await.map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut groups: std::collections::HashMap<String, Vec<crate::snapshot::SnapshotSummary>> = std::collections::HashMap::new();
    for snap in &snapshots {
        groups.entry(snapshot_group_key(&snap.filename)).or_default().push(snap.clone());
    }
    let sessions = groups
        .into_iter()
        .map(|(key, members)| {
            let has_before = members.iter().any(|m| m.phase == Phase::Before);
            let has_after = members.iter().any(|m| m.phase == Phase::After);
            SnapshotGroup { session_id: key, complete: has_before && has_after, snapshots: members }
        })
        .collect();

    Ok(HttpResponse::Ok().json(SnapshotsResponse { snapshots, sessions }))
}

pub async fn list_comparisons(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let comparisons = state
        .analysis
        .send(crate::analysis::ListSessions)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(HttpResponse::Ok().json(crate::api::dto::ComparisonsResponse { comparisons }))
}

pub async fn get_comparison(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    let session = state
        .analysis
        .send(crate::analysis::GetSession { id: session_id.clone() })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("unknown comparison session: {session_id}")))?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn ws_agent(req: HttpRequest, stream: web::Payload, state: web::Data<AppState>) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;
    let ctx = state.connection_context();
    actix::spawn(crate::connection::run_agent(session, msg_stream, ctx));
    Ok(response)
}

pub async fn ws_dashboard(req: HttpRequest, stream: web::Payload, state: web::Data<AppState>) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;
    let ctx = state.connection_context();
    actix::spawn(crate::connection::run_subscriber(session, msg_stream, ctx));
    Ok(response)
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "error": "not found" }))
}
