//! `AnalysisCoordinatorActor` — owns comparison sessions (spec §4.G). The
//! analyzer invocation is async and potentially slow, so `comparison-ready`
//! handling spawns a detached task (teacher pattern: `SessionManagerActor`'s
//! Redis calls spawned via `actix::spawn`) and reports back to the actor via
//! follow-up messages, so the terminal state is recorded exactly once and the
//! mailbox is never blocked on the analyzer call.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use actix::prelude::*;
use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use crate::analysis::model::{AnalysisResult, ComparisonSession, SessionStatus};
use crate::analysis::scratch::ScratchGuard;
use crate::analysis::analyzer::SnapshotAnalyzer;
use crate::codec::{MissingSnapshots, ServerEvent};
use crate::error::AnalysisError;
use crate::publisher::{Publish, PublisherActor};
use crate::snapshot::{GetSnapshot, SnapshotStatus, SnapshotStoreActor};
use crate::store::{RecordLeakAlert, SessionStoreActor, Severity};

pub struct AnalysisCoordinatorActor {
    sessions: HashMap<String, ComparisonSession>,
    snapshot_store: Addr<SnapshotStoreActor>,
    session_store: Addr<SessionStoreActor>,
    publisher: Addr<PublisherActor>,
    primary: Arc<dyn SnapshotAnalyzer>,
    fallback: Arc<dyn SnapshotAnalyzer>,
    threshold_bytes: u64,
    critical_growth_mb: f64,
}

impl AnalysisCoordinatorActor {
    pub fn new(
        snapshot_store: Addr<SnapshotStoreActor>,
        session_store: Addr<SessionStoreActor>,
        publisher: Addr<PublisherActor>,
        primary: Arc<dyn SnapshotAnalyzer>,
        fallback: Arc<dyn SnapshotAnalyzer>,
        threshold_bytes: u64,
        critical_growth_mb: f64,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            snapshot_store,
            session_store,
            publisher,
            primary,
            fallback,
            threshold_bytes,
            critical_growth_mb,
        }
    }

    fn publish(&self, event: ServerEvent) {
        self.publisher.do_send(Publish(event));
    }
}

impl Actor for AnalysisCoordinatorActor {
    type Context = Context<Self>;
}

/// Incoming trigger, matching the agent `comparison-ready` frame (spec §4.G).
#[derive(Message)]
#[rtype(result = "()")]
pub struct ComparisonReady {
    pub service: String,
    pub container_id: String,
    pub before_id: String,
    pub after_id: String,
    #[allow(dead_code)]
    pub timeframe: Option<Value>,
}

impl Handler<ComparisonReady> for AnalysisCoordinatorActor {
    type Result = ();

    fn handle(&mut self, msg: ComparisonReady, ctx: &mut Self::Context) {
        let session_id = format!("comparison_{}_{}", msg.service, Utc::now().timestamp_millis());
        let session = ComparisonSession::new(
            session_id.clone(),
            msg.service,
            msg.container_id,
            msg.before_id.clone(),
            msg.after_id.clone(),
        );
        self.sessions.insert(session_id.clone(), session);

        let snapshot_store = self.snapshot_store.clone();
        let addr = ctx.address();
        actix::spawn(async move {
            let before = snapshot_store.send(GetSnapshot { id: msg.before_id.clone() }).await.ok().flatten();
            let after = snapshot_store.send(GetSnapshot { id: msg.after_id.clone() }).await.ok().flatten();

            let before_path = before
                .filter(|s| s.status == SnapshotStatus::Complete)
                .and_then(|s| s.persisted_path);
            let after_path = after
                .filter(|s| s.status == SnapshotStatus::Complete)
                .and_then(|s| s.persisted_path);

            let (Some(before_path), Some(after_path)) = (before_path.clone(), after_path.clone()) else {
                addr.do_send(SnapshotsMissing {
                    session_id,
                    before_missing: before_path.is_none(),
                    after_missing: after_path.is_none(),
                });
                return;
            };

            addr.do_send(BeginAnalysis {
                session_id,
                before_path: PathBuf::from(before_path),
                after_path: PathBuf::from(after_path),
            });
        });
    }
}

/// Emitted when one or both referenced snapshots are not yet complete. The
/// session stays `waiting`; it is not automatically resumed (spec §9 Open
/// questions — resolved in DESIGN.md).
#[derive(Message)]
#[rtype(result = "()")]
struct SnapshotsMissing {
    session_id: String,
    before_missing: bool,
    after_missing: bool,
}

impl Handler<SnapshotsMissing> for AnalysisCoordinatorActor {
    type Result = ();

    fn handle(&mut self, msg: SnapshotsMissing, _ctx: &mut Self::Context) {
        self.publish(ServerEvent::ComparisonPending {
            session_id: msg.session_id,
            missing_snapshots: MissingSnapshots { before: msg.before_missing, after: msg.after_missing },
        });
    }
}

#[derive(Message)]
#[rtype(result = "()")]
struct BeginAnalysis {
    session_id: String,
    before_path: PathBuf,
    after_path: PathBuf,
}

impl Handler<BeginAnalysis> for AnalysisCoordinatorActor {
    type Result = ();

    fn handle(&mut self, msg: BeginAnalysis, ctx: &mut Self::Context) {
        let Some(session) = self.sessions.get_mut(&msg.session_id) else { return };
        if session.status != SessionStatus::Waiting {
            return;
        }
        session.status = SessionStatus::Analyzing;
        self.publish(ServerEvent::ComparisonStarted { session_id: msg.session_id.clone() });

        let primary = self.primary.clone();
        let fallback = self.fallback.clone();
        let threshold = self.threshold_bytes;
        let addr = ctx.address();
        let session_id = msg.session_id;

        actix::spawn(async move {
            let scratch_before = std::env::temp_dir().join(format!("memhub-{session_id}-before.blob"));
            let scratch_after = std::env::temp_dir().join(format!("memhub-{session_id}-after.blob"));
            let _guard = ScratchGuard::new(vec![scratch_before.clone(), scratch_after.clone()]);

            if let Err(e) = tokio::fs::copy(&msg.before_path, &scratch_before).await {
                addr.do_send(AnalysisFailed { session_id, error: format!("failed to stage before snapshot: {e}") });
                return;
            }
            if let Err(e) = tokio::fs::copy(&msg.after_path, &scratch_after).await {
                addr.do_send(AnalysisFailed { session_id, error: format!("failed to stage after snapshot: {e}") });
                return;
            }

            match primary.analyze(&scratch_before, &scratch_after, threshold).await {
                Ok(result) => addr.do_send(AnalysisFinished { session_id, result }),
                Err(primary_err) => {
                    warn!(session_id = %session_id, error = %primary_err, "primary analyzer failed, trying fallback");
                    match fallback.analyze(&scratch_before, &scratch_after, threshold).await {
                        Ok(result) => addr.do_send(AnalysisFinished { session_id, result }),
                        Err(fallback_err) => addr.do_send(AnalysisFailed { session_id, error: fallback_err }),
                    }
                }
            }
        });
    }
}

#[derive(Message)]
#[rtype(result = "()")]
struct AnalysisFinished {
    session_id: String,
    result: AnalysisResult,
}

impl Handler<AnalysisFinished> for AnalysisCoordinatorActor {
    type Result = ();

    fn handle(&mut self, msg: AnalysisFinished, _ctx: &mut Self::Context) {
        let Some(session) = self.sessions.get_mut(&msg.session_id) else { return };
        session.status = SessionStatus::Completed;
        session.result = Some(msg.result.clone());
        let service = session.service.clone();

        self.publish(ServerEvent::ComparisonCompleted { session_id: msg.session_id.clone(), result: msg.result.clone() });

        if msg.result.summary.suspicious_growth {
            let growth = msg.result.summary.total_growth_mb;
            let severity = if growth > self.critical_growth_mb { Severity::Critical } else { Severity::Warning };
            self.session_store.do_send(RecordLeakAlert {
                service: service.clone(),
                severity,
                message: format!("leak analysis flagged {} (growth {:.1}MB)", service, growth),
                total_growth_mb: growth,
            });
        }
    }
}

#[derive(Message)]
#[rtype(result = "()")]
struct AnalysisFailed {
    session_id: String,
    error: String,
}

impl Handler<AnalysisFailed> for AnalysisCoordinatorActor {
    type Result = ();

    fn handle(&mut self, msg: AnalysisFailed, _ctx: &mut Self::Context) {
        let Some(session) = self.sessions.get_mut(&msg.session_id) else { return };
        session.status = SessionStatus::Failed;
        session.error = Some(msg.error.clone());
        self.publish(ServerEvent::ComparisonFailed { session_id: msg.session_id, error: msg.error });
    }
}

#[derive(Message)]
#[rtype(result = "Option<ComparisonSession>")]
pub struct GetSession {
    pub id: String,
}

impl Handler<GetSession> for AnalysisCoordinatorActor {
    type Result = Option<ComparisonSession>;

    fn handle(&mut self, msg: GetSession, _ctx: &mut Self::Context) -> Option<ComparisonSession> {
        self.sessions.get(&msg.id).cloned()
    }
}

#[derive(Message)]
#[rtype(result = "Vec<ComparisonSession>")]
pub struct ListSessions;

impl Handler<ListSessions> for AnalysisCoordinatorActor {
    type Result = Vec<ComparisonSession>;

    fn handle(&mut self, _msg: ListSessions, _ctx: &mut Self::Context) -> Vec<ComparisonSession> {
        self.sessions.values().cloned().collect()
    }
}

/// Synchronous counterpart to [`ComparisonReady`] for `POST
/// /api/snapshots/compare` (spec §4.H): behaves identically but the HTTP
/// handler awaits the terminal result instead of polling for events. Unlike
/// the fire-and-forget path, a caller here needs a structured reason when the
/// request can't proceed, so the error type is [`AnalysisError`] rather than a
/// bare string.
#[derive(Message)]
#[rtype(result = "Result<ComparisonSession, AnalysisError>")]
pub struct CompareSync {
    pub service: String,
    pub container_id: String,
    pub before_id: String,
    pub after_id: String,
}

impl Handler<CompareSync> for AnalysisCoordinatorActor {
    type Result = ResponseFuture<Result<ComparisonSession, AnalysisError>>;

    fn handle(&mut self, msg: CompareSync, _ctx: &mut Self::Context) -> Self::Result {
        let session_id = format!("comparison_{}_{}", msg.service, Utc::now().timestamp_millis());
        let mut session = ComparisonSession::new(
            session_id.clone(),
            msg.service,
            msg.container_id,
            msg.before_id.clone(),
            msg.after_id.clone(),
        );

        let snapshot_store = self.snapshot_store.clone();
        let session_store = self.session_store.clone();
        let primary = self.primary.clone();
        let fallback = self.fallback.clone();
        let threshold = self.threshold_bytes;
        let critical_growth_mb = self.critical_growth_mb;

        Box::pin(async move {
            let before = snapshot_store.send(GetSnapshot { id: msg.before_id.clone() }).await?;
            let after = snapshot_store.send(GetSnapshot { id: msg.after_id.clone() }).await?;

            let before_path = before
                .filter(|s| s.status == SnapshotStatus::Complete)
                .and_then(|s| s.persisted_path);
            let after_path = after
                .filter(|s| s.status == SnapshotStatus::Complete)
                .and_then(|s| s.persisted_path);
            let (Some(before_path), Some(after_path)) = (before_path.clone(), after_path.clone()) else {
                return Err(AnalysisError::MissingSnapshot {
                    before_complete: before_path.is_some(),
                    after_complete: after_path.is_some(),
                });
            };

            session.status = SessionStatus::Analyzing;

            let scratch_before = std::env::temp_dir().join(format!("memhub-{session_id}-before.blob"));
            let scratch_after = std::env::temp_dir().join(format!("memhub-{session_id}-after.blob"));
            let _guard = ScratchGuard::new(vec![scratch_before.clone(), scratch_after.clone()]);

            tokio::fs::copy(before_path, &scratch_before).await?;
            tokio::fs::copy(after_path, &scratch_after).await?;

            let result = match primary.analyze(&scratch_before, &scratch_after, threshold).await {
                Ok(r) => r,
                Err(primary_err) => {
                    warn!(error = %primary_err, "primary analyzer failed, trying fallback");
                    match fallback.analyze(&scratch_before, &scratch_after, threshold).await {
                        Ok(r) => r,
                        Err(fallback_err) => {
                            session.status = SessionStatus::Failed;
                            session.error = Some(fallback_err);
                            return Ok(session);
                        }
                    }
                }
            };

            if result.summary.suspicious_growth {
                let growth = result.summary.total_growth_mb;
                let severity = if growth > critical_growth_mb { Severity::Critical } else { Severity::Warning };
                session_store.do_send(RecordLeakAlert {
                    service: session.service.clone(),
                    severity,
                    message: format!("leak analysis flagged {} (growth {:.1}MB)", session.service, growth),
                    total_growth_mb: growth,
                });
            }

            session.status = SessionStatus::Completed;
            session.result = Some(result);
            Ok(session)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::{AlwaysFailAnalyzer, HeuristicAnalyzer};
    use crate::publisher::PublisherActor;
    use crate::snapshot::{AnnounceSnapshot, CompleteSnapshot, ReceiveChunk};
    use crate::snapshot::Phase;

    async fn complete_snapshot(store: &Addr<SnapshotStoreActor>, id: &str, bytes: &[u8]) {
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
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    #[actix::test]
    async fn comparison_ready_with_missing_snapshot_publishes_pending_and_stays_waiting() {
        let dir = std::env::temp_dir().join(format!("memhub-coord-test-{}", uuid::Uuid::new_v4()));
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

        coordinator
            .do_send(ComparisonReady {
                service: "svc-a".into(),
                container_id: "c1".into(),
                before_id: "before_svc-a_1".into(),
                after_id: "after_svc-a_2".into(),
                timeframe: None,
            });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let sessions = coordinator.send(ListSessions).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].status, SessionStatus::Waiting);

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[actix::test]
    async fn comparison_ready_happy_path_completes() {
        let dir = std::env::temp_dir().join(format!("memhub-coord-test-{}", uuid::Uuid::new_v4()));
        let publisher = PublisherActor::new().start();
        let snapshot_store = SnapshotStoreActor::new(dir.clone(), publisher.clone()).start();
        let session_store = SessionStoreActor::new(1000, 100, 10, 50.0, publisher.clone()).start();
        let coordinator = AnalysisCoordinatorActor::new(
            snapshot_store.clone(),
            session_store,
            publisher,
            Arc::new(HeuristicAnalyzer),
            Arc::new(AlwaysFailAnalyzer),
            1,
            50.0,
        )
        .start();

        complete_snapshot(&snapshot_store, "before_svc-a_1", b"aaaa").await;
        complete_snapshot(&snapshot_store, "after_svc-a_2", b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").await;

        coordinator
            .do_send(ComparisonReady {
                service: "svc-a".into(),
                container_id: "c1".into(),
                before_id: "before_svc-a_1".into(),
                after_id: "after_svc-a_2".into(),
                timeframe: None,
            });
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let sessions = coordinator.send(ListSessions).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].status, SessionStatus::Completed);
        assert!(sessions[0].result.as_ref().unwrap().summary.suspicious_growth);

        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
