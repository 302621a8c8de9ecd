//! Application wiring: the actor fleet, `AppState`, and the `actix-web` route
//! table (spec §4.H, §6), following the teacher's `server.rs` convention of a
//! single state struct shared across handlers via `web::Data`.

use std::sync::Arc;

use actix::{Actor, Addr};
use actix_web::{web, App, HttpServer};

use crate::analysis::{AlwaysFailAnalyzer, AnalysisCoordinatorActor, HeuristicAnalyzer, SnapshotAnalyzer};
use crate::api::handlers;
use crate::config::ServerConfig;
use crate::connection::ConnectionContext;
use crate::liveness::LivenessMonitorActor;
use crate::publisher::PublisherActor;
use crate::snapshot::SnapshotStoreActor;
use crate::store::SessionStoreActor;

#[derive(Clone)]
pub struct AppState {
    pub session_store: Addr<SessionStoreActor>,
    pub snapshot_store: Addr<SnapshotStoreActor>,
    pub publisher: Addr<PublisherActor>,
    pub analysis: Addr<AnalysisCoordinatorActor>,
}

impl AppState {
    pub fn connection_context(&self) -> ConnectionContext {
        ConnectionContext {
            session_store: self.session_store.clone(),
            snapshot_store: self.snapshot_store.clone(),
            publisher: self.publisher.clone(),
            analysis: self.analysis.clone(),
        }
    }
}

/// Starts the actor fleet described in spec §5: every long-lived mutable
/// structure gets exactly one owning actor.
pub fn start_actors(config: &ServerConfig) -> AppState {
    let publisher = PublisherActor::new().start();
    let session_store = SessionStoreActor::new(
        config.metric_ring_capacity,
        config.alert_ring_capacity,
        config.initial_alert_count,
        config.critical_growth_mb,
        publisher.clone(),
    )
    .start();
    let snapshot_store = SnapshotStoreActor::new(config.snapshot_dir.clone(), publisher.clone()).start();

    let primary: Arc<dyn SnapshotAnalyzer> = Arc::new(HeuristicAnalyzer);
    let fallback: Arc<dyn SnapshotAnalyzer> = Arc::new(AlwaysFailAnalyzer);
    let analysis = AnalysisCoordinatorActor::new(
        snapshot_store.clone(),
        session_store.clone(),
        publisher.clone(),
        primary,
        fallback,
        config.analysis_threshold_bytes,
        config.critical_growth_mb,
    )
    .start();

    LivenessMonitorActor::new(session_store.clone(), config.sweep_period, config.inactivity_timeout).start();

    AppState { session_store, snapshot_store, publisher, analysis }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health))
        .route("/ws/dashboard", web::get().to(handlers::ws_dashboard))
        .route("/ws", web::get().to(handlers::ws_agent))
        .service(
            web::scope("/api")
                .route("/services", web::get().to(handlers::list_services))
                .route("/services/{name}/metrics", web::get().to(handlers::service_metrics))
                .route("/alerts", web::get().to(handlers::list_alerts))
                .route("/stats", web::get().to(handlers::stats))
                .route("/snapshots/upload", web::post().to(handlers::upload_snapshot))
                .route("/snapshots/compare", web::post().to(handlers::compare_snapshots))
                .route("/snapshots/comparisons", web::get().to(handlers::list_comparisons))
                .route("/snapshots/comparisons/{sessionId}", web::get().to(handlers::get_comparison))
                .route("/snapshots", web::get().to(handlers::list_snapshots)),
        )
        .default_service(web::route().to(handlers::not_found));
}

pub async fn run(config: ServerConfig) -> std::io::Result<()> {
    let bind_host = config.host.clone();
    let bind_port = config.port;
    let max_frame_size = config.max_frame_size;
    let state = start_actors(&config);

    tracing::info!(host = %bind_host, port = bind_port, "starting memhub server");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(web::PayloadConfig::new(max_frame_size))
            .configure(configure_routes)
    })
    .bind((bind_host.as_str(), bind_port))?
    .run()
    .await
}
