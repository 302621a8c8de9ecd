//! Snapshot reassembler (spec §4.C): chunked-upload state machine, separate
//! from the session store.

pub mod actor;
pub mod model;

pub use actor::{AnnounceSnapshot, CompleteSnapshot, GetSnapshot, ListSnapshots, PersistFinished, ReceiveChunk, SnapshotStoreActor};
pub use model::{Phase, Snapshot, SnapshotStatus, SnapshotSummary};
