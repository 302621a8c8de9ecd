//! `SnapshotStoreActor` — chunk reassembly state machine (spec §4.C). Kept
//! separate from [`crate::store::SessionStoreActor`] because its state (chunk
//! tables) and failure modes (duplicate/unknown ids) are distinct from
//! service/metric/alert bookkeeping — mirrors the teacher's separation of
//! `ConnectionManager` from the session-owning actors.

use std::collections::HashMap;
use std::path::PathBuf;

use actix::prelude::*;
use tokio::io::AsyncWriteExt;
use tracing::{error, warn};

use crate::codec::ServerEvent;
use crate::publisher::{Publish, PublisherActor};
use crate::snapshot::model::{Phase, Snapshot, SnapshotStatus, SnapshotSummary};

pub struct SnapshotStoreActor {
    snapshots: HashMap<String, Snapshot>,
    snapshot_dir: PathBuf,
    publisher: Addr<PublisherActor>,
}

impl SnapshotStoreActor {
    pub fn new(snapshot_dir: impl Into<PathBuf>, publisher: Addr<PublisherActor>) -> Self {
        Self { snapshots: HashMap::new(), snapshot_dir: snapshot_dir.into(), publisher }
    }

    fn publish(&self, event: ServerEvent) {
        self.publisher.do_send(Publish(event));
    }

    fn target_path(&self, snap: &Snapshot) -> PathBuf {
        match &snap.target_subdir {
            Some(sub) => self.snapshot_dir.join(sub).join(&snap.filename),
            None => self.snapshot_dir.join(&snap.filename),
        }
    }

    /// If `id` is fully received and a completion has been observed, spawn the
    /// (suspending) file write and return without mutating status yet — the
    /// actor learns the outcome via [`PersistFinished`] (spec §4.C, §5).
    fn maybe_finalize(&mut self, id: &str, ctx: &mut Context<Self>) {
        let Some(snap) = self.snapshots.get(id) else { return };
        if snap.status == SnapshotStatus::Complete {
            return;
        }
        if !(snap.completion_requested && snap.is_fully_received()) {
            return;
        }
        let bytes = snap.assemble();
        let path = self.target_path(snap);
        let id = id.to_string();
        let addr = ctx.address();
        actix::spawn(async move {
            let result = async {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let mut file = tokio::fs::File::create(&path).await?;
                file.write_all(&bytes).await?;
                Ok::<(), std::io::Error>(())
            }
            .await;
            addr.do_send(PersistFinished { id, path: path.to_string_lossy().to_string(), result: result.map_err(|e| e.to_string()) });
        });
    }
}

impl Actor for SnapshotStoreActor {
    type Context = Context<Self>;
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct AnnounceSnapshot {
    pub id: String,
    pub service: String,
    pub container_id: String,
    pub phase: Phase,
    pub declared_size: u64,
    pub filename: String,
    pub total_chunks: u32,
    pub target_subdir: Option<String>,
}

impl Handler<AnnounceSnapshot> for SnapshotStoreActor {
    type Result = ();

    fn handle(&mut self, msg: AnnounceSnapshot, _ctx: &mut Self::Context) {
        // Re-announcement replaces the chunk table outright; no merge attempt
        // (spec §4.C "Failure modes").
        let snapshot = Snapshot::new(
            msg.id.clone(),
            msg.service,
            msg.container_id,
            msg.phase,
            msg.declared_size,
            msg.filename,
            msg.total_chunks,
            msg.target_subdir,
        );
        self.snapshots.insert(msg.id.clone(), snapshot);
        self.publish(ServerEvent::SnapshotStarted { snapshot_id: msg.id });
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct ReceiveChunk {
    pub snapshot_id: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub data: Vec<u8>,
}

impl Handler<ReceiveChunk> for SnapshotStoreActor {
    type Result = ();

    fn handle(&mut self, msg: ReceiveChunk, ctx: &mut Self::Context) {
        let Some(snap) = self.snapshots.get_mut(&msg.snapshot_id) else {
            warn!(snapshot_id = %msg.snapshot_id, "chunk for unknown snapshot id, dropping");
            return;
        };
        snap.chunks.insert(msg.chunk_index, msg.data);
        snap.status = SnapshotStatus::Receiving;
        snap.total_chunks = snap.total_chunks.max(msg.total_chunks);
        let received = snap.received_chunks();
        let total = snap.total_chunks;

        self.publish(ServerEvent::SnapshotProgress {
            snapshot_id: msg.snapshot_id.clone(),
            received_chunks: received,
            total_chunks: total,
        });

        self.maybe_finalize(&msg.snapshot_id, ctx);
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct CompleteSnapshot {
    pub snapshot_id: String,
}

impl Handler<CompleteSnapshot> for SnapshotStoreActor {
    type Result = ();

    fn handle(&mut self, msg: CompleteSnapshot, ctx: &mut Self::Context) {
        let Some(snap) = self.snapshots.get_mut(&msg.snapshot_id) else {
            warn!(snapshot_id = %msg.snapshot_id, "completion of unknown snapshot id, dropping");
            return;
        };
        snap.completion_requested = true;
        self.maybe_finalize(&msg.snapshot_id, ctx);
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct PersistFinished {
    pub id: String,
    pub path: String,
    pub result: Result<(), String>,
}

impl Handler<PersistFinished> for SnapshotStoreActor {
    type Result = ();

    fn handle(&mut self, msg: PersistFinished, _ctx: &mut Self::Context) {
        let Some(snap) = self.snapshots.get_mut(&msg.id) else { return };
        match msg.result {
            Ok(()) => {
                snap.status = SnapshotStatus::Complete;
                snap.persisted_path = Some(msg.path);
                snap.chunks.clear();
                self.publish(ServerEvent::SnapshotCompleted {
                    snapshot_id: msg.id,
                    filename: snap.filename.clone(),
                });
            }
            Err(e) => {
                error!(snapshot_id = %msg.id, error = %e, "failed to persist snapshot");
            }
        }
    }
}

#[derive(Message)]
#[rtype(result = "Option<SnapshotSummary>")]
pub struct GetSnapshot {
    pub id: String,
}

impl Handler<GetSnapshot> for SnapshotStoreActor {
    type Result = Option<SnapshotSummary>;

    fn handle(&mut self, msg: GetSnapshot, _ctx: &mut Self::Context) -> Option<SnapshotSummary> {
        self.snapshots.get(&msg.id).map(Snapshot::summary)
    }
}

#[derive(Message)]
#[rtype(result = "Vec<SnapshotSummary>")]
pub struct ListSnapshots;

impl Handler<ListSnapshots> for SnapshotStoreActor {
    type Result = Vec<SnapshotSummary>;

    fn handle(&mut self, _msg: ListSnapshots, _ctx: &mut Self::Context) -> Vec<SnapshotSummary> {
        self.snapshots.values().map(Snapshot::summary).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::PublisherActor;

    #[actix::test]
    async fn announce_chunks_out_of_order_then_complete_persists_bytes() {
        let dir = std::env::temp_dir().join(format!("memhub-test-{}", uuid::Uuid::new_v4()));
        let publisher = PublisherActor::new().start();
        let store = SnapshotStoreActor::new(dir.clone(), publisher).start();

        store
            .send(AnnounceSnapshot {
                id: "before_svc-a_1".into(),
                service: "svc-a".into(),
                container_id: "c1".into(),
                phase: Phase::Before,
                declared_size: 9,
                filename: "b.heapsnapshot".into(),
                total_chunks: 3,
                target_subdir: None,
            })
            .await
            .unwrap();

        for (idx, data) in [(0u32, "abc"), (2, "ghi"), (1, "def")] {
            store
                .send(ReceiveChunk {
                    snapshot_id: "before_svc-a_1".into(),
                    chunk_index: idx,
                    total_chunks: 3,
                    data: data.as_bytes().to_vec(),
                })
                .await
                .unwrap();
        }
        store
            .send(CompleteSnapshot { snapshot_id: "before_svc-a_1".into() })
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let summary = store.send(GetSnapshot { id: "before_svc-a_1".into() }).await.unwrap().unwrap();
        assert_eq!(summary.status, SnapshotStatus::Complete);
        let bytes = tokio::fs::read(dir.join("b.heapsnapshot")).await.unwrap();
        assert_eq!(bytes, b"abcdefghi".to_vec());

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[actix::test]
    async fn completion_before_last_chunk_reconciles_on_last_chunk() {
        let dir = std::env::temp_dir().join(format!("memhub-test-{}", uuid::Uuid::new_v4()));
        let publisher = PublisherActor::new().start();
        let store = SnapshotStoreActor::new(dir.clone(), publisher).start();

        store
            .send(AnnounceSnapshot {
                id: "s1".into(),
                service: "svc-a".into(),
                container_id: "c1".into(),
                phase: Phase::After,
                declared_size: 4,
                filename: "a.heapsnapshot".into(),
                total_chunks: 2,
                target_subdir: None,
            })
            .await
            .unwrap();
        store.send(ReceiveChunk { snapshot_id: "s1".into(), chunk_index: 0, total_chunks: 2, data: b"aa".to_vec() }).await.unwrap();
        store.send(CompleteSnapshot { snapshot_id: "s1".into() }).await.unwrap();

        let summary = store.send(GetSnapshot { id: "s1".into() }).await.unwrap().unwrap();
        assert_eq!(summary.status, SnapshotStatus::Receiving);

        store.send(ReceiveChunk { snapshot_id: "s1".into(), chunk_index: 1, total_chunks: 2, data: b"bb".to_vec() }).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let summary = store.send(GetSnapshot { id: "s1".into() }).await.unwrap().unwrap();
        assert_eq!(summary.status, SnapshotStatus::Complete);

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    /// Spec §6's `snapshot-metadata` payload carries no `totalChunks` field —
    /// only `snapshot-chunk` does. `ReceiveChunk` must learn the chunk count
    /// from the first chunk rather than leaving `total_chunks` at the
    /// announced 0 forever.
    #[actix::test]
    async fn total_chunks_learned_from_chunk_when_metadata_omits_it() {
        let dir = std::env::temp_dir().join(format!("memhub-test-{}", uuid::Uuid::new_v4()));
        let publisher = PublisherActor::new().start();
        let store = SnapshotStoreActor::new(dir.clone(), publisher).start();

        store
            .send(AnnounceSnapshot {
                id: "s2".into(),
                service: "svc-a".into(),
                container_id: "c1".into(),
                phase: Phase::After,
                declared_size: 6,
                filename: "a2.heapsnapshot".into(),
                total_chunks: 0,
                target_subdir: None,
            })
            .await
            .unwrap();

        for (idx, data) in [(0u32, "aa"), (1, "bb"), (2, "cc")] {
            store
                .send(ReceiveChunk {
                    snapshot_id: "s2".into(),
                    chunk_index: idx,
                    total_chunks: 3,
                    data: data.as_bytes().to_vec(),
                })
                .await
                .unwrap();
        }
        store.send(CompleteSnapshot { snapshot_id: "s2".into() }).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let summary = store.send(GetSnapshot { id: "s2".into() }).await.unwrap().unwrap();
        assert_eq!(summary.status, SnapshotStatus::Complete);
        assert_eq!(summary.total_chunks, 3);
        let bytes = tokio::fs::read(dir.join("a2.heapsnapshot")).await.unwrap();
        assert_eq!(bytes, b"aabbcc".to_vec());

        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
