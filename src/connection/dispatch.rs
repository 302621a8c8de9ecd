//! Per-connection read loop (spec §4.F). Owns the `actix_ws::MessageStream`
//! directly rather than wrapping it in its own actor, mirroring the teacher's
//! `WebSocketActor::run`/message-loop shape — the stream itself can't cross an
//! actor mailbox, so the loop lives in a plain spawned task that talks to the
//! actors purely through message sends.

use actix::Addr;
use actix_ws::{Message, MessageStream, Session};
use base64::Engine;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analysis::{AnalysisCoordinatorActor, ComparisonReady};
use crate::codec::{decode_agent_message, protocol_error_frame, AgentMessage};
use crate::publisher::{PublisherActor, RemoveSubscriber, Subscribe, Subscriber};
use crate::snapshot::{AnnounceSnapshot, CompleteSnapshot, Phase, ReceiveChunk, SnapshotStoreActor};
use crate::store::{
    ConnectionHandle, GetInitialSnapshot, IngestMetric, MetricSample, ReconcileConnectionClosed,
    RecordSnapshotAlert, RegisterCaptureAgent, RegisterService, SessionStoreActor,
};

#[derive(Clone)]
pub struct ConnectionContext {
    pub session_store: Addr<SessionStoreActor>,
    pub snapshot_store: Addr<SnapshotStoreActor>,
    pub publisher: Addr<PublisherActor>,
    pub analysis: Addr<AnalysisCoordinatorActor>,
}

/// Runs a dashboard-subscriber connection to completion (spec §4.F "a path
/// matching dashboard marks the connection as a subscriber"). Owns a small
/// outbound channel + drain task so frames the `PublisherActor` enqueues are
/// written to the socket strictly in publish order (spec §5), independent of
/// this function's own read loop.
pub async fn run_subscriber(session: Session, mut stream: MessageStream, ctx: ConnectionContext) {
    use futures_util::StreamExt;

    let id = Uuid::new_v4();
    let initial = match ctx.session_store.send(GetInitialSnapshot).await {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "failed to build initial snapshot for subscriber");
            return;
        }
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let writer_publisher = ctx.publisher.clone();
    let mut writer_session = session.clone();
    actix::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if writer_session.text(frame).await.is_err() {
                writer_publisher.do_send(RemoveSubscriber { id });
                break;
            }
        }
    });

    ctx.publisher.do_send(Subscribe { subscriber: Subscriber { id, tx }, initial });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Close(_) => break,
            Message::Ping(bytes) => {
                let mut s = session.clone();
                let _ = s.pong(&bytes).await;
            }
            _ => {
                // Subscribers never produce (spec §3); any frame they send is ignored.
            }
        }
    }
    ctx.publisher.do_send(RemoveSubscriber { id });
}

/// Runs an agent-producer connection to completion (spec §4.F dispatch table).
pub async fn run_agent(session: Session, mut stream: MessageStream, ctx: ConnectionContext) {
    use futures_util::StreamExt;

    let conn = ConnectionHandle(Uuid::new_v4());

    while let Some(frame) = stream.next().await {
        let Ok(msg) = frame else { break };
        match msg {
            Message::Text(text) => handle_frame(&text, conn, &ctx, &session).await,
            Message::Close(_) => break,
            Message::Ping(bytes) => {
                let mut s = session.clone();
                let _ = s.pong(&bytes).await;
            }
            _ => {}
        }
    }

    ctx.session_store.do_send(ReconcileConnectionClosed { conn });
}

async fn handle_frame(text: &str, conn: ConnectionHandle, ctx: &ConnectionContext, session: &Session) {
    let Some(message) = decode_agent_message(text) else {
        let mut s = session.clone();
        let _ = s.text(protocol_error_frame()).await;
        return;
    };

    match message {
        AgentMessage::Registration { service, timestamp } => {
            ctx.session_store.do_send(RegisterService { name: service, timestamp_ms: timestamp, conn });
        }
        AgentMessage::Metrics {
            service,
            heap_used_mb,
            heap_total_mb,
            rss_mb,
            external_mb,
            event_loop_delay_ms,
            timestamp,
            leak_detected,
            memory_growth_mb,
        } => {
            ctx.session_store.do_send(IngestMetric {
                service,
                sample: MetricSample {
                    timestamp,
                    heap_used_mb,
                    heap_total_mb,
                    rss_mb,
                    external_mb,
                    event_loop_delay_ms,
                    memory_growth_mb,
                    leak_detected,
                },
            });
        }
        AgentMessage::SnapshotNotification { service, filename, filepath, .. } => {
            ctx.session_store.do_send(RecordSnapshotAlert { service, filename, filepath });
        }
        AgentMessage::CaptureAgentRegistration { service_name, container_id, .. } => {
            ctx.session_store.do_send(RegisterCaptureAgent { service_name, container_id, conn });
        }
        AgentMessage::SnapshotMetadata { snapshot } => {
            let Some(phase) = Phase::parse(&snapshot.phase) else {
                warn!(phase = %snapshot.phase, "unknown snapshot phase, dropping metadata");
                return;
            };
            ctx.snapshot_store.do_send(AnnounceSnapshot {
                id: snapshot.id,
                service: snapshot.service_name,
                container_id: snapshot.container_id,
                phase,
                declared_size: snapshot.size,
                filename: snapshot.filename,
                total_chunks: snapshot.total_chunks.unwrap_or(0),
                target_subdir: None,
            });
        }
        AgentMessage::SnapshotChunk { snapshot_id, chunk_index, total_chunks, data } => {
            match base64::engine::general_purpose::STANDARD.decode(data.as_bytes()) {
                Ok(bytes) => {
                    ctx.snapshot_store.do_send(ReceiveChunk { snapshot_id, chunk_index, total_chunks, data: bytes });
                }
                Err(e) => warn!(snapshot_id = %snapshot_id, error = %e, "invalid base64 chunk payload, dropping"),
            }
        }
        AgentMessage::SnapshotComplete { snapshot_id } => {
            ctx.snapshot_store.do_send(CompleteSnapshot { snapshot_id });
        }
        AgentMessage::ComparisonReady {
            service_name,
            container_id,
            before_snapshot_id,
            after_snapshot_id,
            timeframe,
            ..
        } => {
            ctx.analysis.do_send(ComparisonReady {
                service: service_name,
                container_id,
                before_id: before_snapshot_id,
                after_id: after_snapshot_id,
                timeframe,
            });
        }
        AgentMessage::Unknown => {
            debug!("ignoring unrecognized agent message tag");
        }
    }
}
