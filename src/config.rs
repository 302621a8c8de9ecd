//! Server configuration, loaded from the environment with documented defaults
//! (spec §6 "Configuration"), following the teacher's `env::var(...).unwrap_or_else(...)`
//! convention.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// CORS origin for the dashboard subscriber endpoint. The core only records
    /// the value; actually wiring CORS middleware is out of scope (spec §1).
    pub subscriber_cors_origin: String,
    /// T: inactivity deadline after which a connected service is reaped.
    pub inactivity_timeout: Duration,
    /// P: liveness sweep period.
    pub sweep_period: Duration,
    /// Per-service metric ring capacity.
    pub metric_ring_capacity: usize,
    /// Global alert ring capacity.
    pub alert_ring_capacity: usize,
    /// Maximum accepted WebSocket frame/payload size.
    pub max_frame_size: usize,
    /// Directory completed chunked snapshots and single-shot uploads are written to.
    pub snapshot_dir: String,
    /// Number of most-recent alerts sent in a subscriber's `initial` event.
    pub initial_alert_count: usize,
    /// Growth (MB) threshold above which a leak alert from analysis is `critical`
    /// rather than `warning`.
    pub critical_growth_mb: f64,
    /// Byte-growth threshold passed to the analyzer interface to decide
    /// `suspiciousGrowth` (spec §6 "given ... a threshold (bytes)").
    pub analysis_threshold_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            subscriber_cors_origin: "*".to_string(),
            inactivity_timeout: Duration::from_secs(60),
            sweep_period: Duration::from_secs(30),
            metric_ring_capacity: 1000,
            alert_ring_capacity: 100,
            max_frame_size: 16 * 1024 * 1024,
            snapshot_dir: "./dashboard-snapshots".to_string(),
            initial_alert_count: 10,
            critical_growth_mb: 50.0,
            analysis_threshold_bytes: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let default = Self::default();

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(default.port);

        let inactivity_timeout = env::var("INACTIVITY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(default.inactivity_timeout);

        let sweep_period = env::var("SWEEP_PERIOD_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(default.sweep_period);

        let metric_ring_capacity = env::var("METRIC_RING_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(default.metric_ring_capacity);

        let alert_ring_capacity = env::var("ALERT_RING_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(default.alert_ring_capacity);

        Self {
            host: env::var("HOST").unwrap_or(default.host),
            port,
            subscriber_cors_origin: env::var("SUBSCRIBER_CORS_ORIGIN")
                .unwrap_or(default.subscriber_cors_origin),
            inactivity_timeout,
            sweep_period,
            metric_ring_capacity,
            alert_ring_capacity,
            max_frame_size: env::var("MAX_FRAME_SIZE")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(default.max_frame_size),
            snapshot_dir: env::var("SNAPSHOT_DIR").unwrap_or(default.snapshot_dir),
            initial_alert_count: default.initial_alert_count,
            critical_growth_mb: env::var("CRITICAL_GROWTH_MB")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(default.critical_growth_mb),
            analysis_threshold_bytes: env::var("ANALYSIS_THRESHOLD_BYTES")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default.analysis_threshold_bytes),
        }
    }
}
