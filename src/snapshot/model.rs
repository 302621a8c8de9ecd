//! Snapshot reassembly data model (spec §3 "Snapshot", §4.C).

use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Before,
    After,
}

impl Phase {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "before" => Some(Phase::Before),
            "after" => Some(Phase::After),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::After => "after",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Announced,
    Receiving,
    Complete,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: String,
    pub service: String,
    pub container_id: String,
    pub phase: Phase,
    pub declared_size: u64,
    pub filename: String,
    pub total_chunks: u32,
    pub chunks: HashMap<u32, Vec<u8>>,
    pub status: SnapshotStatus,
    pub completion_requested: bool,
    /// Subdirectory under the snapshot root this blob persists to, per the two
    /// distinct layouts spec §6 documents (chunked vs. single-shot upload).
    pub target_subdir: Option<String>,
    pub persisted_path: Option<String>,
}

impl Snapshot {
    pub fn new(
        id: String,
        service: String,
        container_id: String,
        phase: Phase,
        declared_size: u64,
        filename: String,
        total_chunks: u32,
        target_subdir: Option<String>,
    ) -> Self {
        Self {
            id,
            service,
            container_id,
            phase,
            declared_size,
            filename,
            total_chunks,
            chunks: HashMap::new(),
            status: SnapshotStatus::Announced,
            completion_requested: false,
            target_subdir,
            persisted_path: None,
        }
    }

    pub fn received_chunks(&self) -> u32 {
        self.chunks.len() as u32
    }

    pub fn is_fully_received(&self) -> bool {
        self.total_chunks > 0 && self.received_chunks() == self.total_chunks
    }

    /// Concatenate chunk payloads in index order (spec §4.C "performed in index
    /// order"). Caller guarantees `is_fully_received()`.
    pub fn assemble(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.declared_size as usize);
        for idx in 0..self.total_chunks {
            if let Some(chunk) = self.chunks.get(&idx) {
                out.extend_from_slice(chunk);
            }
        }
        out
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            id: self.id.clone(),
            service: self.service.clone(),
            container_id: self.container_id.clone(),
            phase: self.phase,
            declared_size: self.declared_size,
            filename: self.filename.clone(),
            total_chunks: self.total_chunks,
            received_chunks: self.received_chunks(),
            status: self.status,
            persisted_path: self.persisted_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub id: String,
    pub service: String,
    pub container_id: String,
    pub phase: Phase,
    pub declared_size: u64,
    pub filename: String,
    pub total_chunks: u32,
    pub received_chunks: u32,
    pub status: SnapshotStatus,
    pub persisted_path: Option<String>,
}
