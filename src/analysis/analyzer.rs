//! The pluggable analyzer interface (spec §6 "Analyzer interface"). The core
//! never parses heap-snapshot internals — it only invokes this trait with two
//! on-disk blob paths and reads back the `summary` fields.

use std::path::Path;

use async_trait::async_trait;

use crate::analysis::model::{AnalysisResult, AnalysisSummary};

#[async_trait]
pub trait SnapshotAnalyzer: Send + Sync {
    async fn analyze(&self, before_path: &Path, after_path: &Path, threshold_bytes: u64) -> Result<AnalysisResult, String>;
}

/// A reference analyzer used so the crate is runnable/testable standalone: it
/// compares raw blob sizes as a stand-in for real heap-diffing. Production
/// deployments swap in a real analyzer behind the same trait.
pub struct HeuristicAnalyzer;

#[async_trait]
impl SnapshotAnalyzer for HeuristicAnalyzer {
    async fn analyze(&self, before_path: &Path, after_path: &Path, threshold_bytes: u64) -> Result<AnalysisResult, String> {
        let before = tokio::fs::metadata(before_path)
            .await
            .map_err(|e| format!("failed to read before snapshot: {e}"))?
            .len();
        let after = tokio::fs::metadata(after_path)
            .await
            .map_err(|e| format!("failed to read after snapshot: {e}"))?
            .len();

        let growth_bytes = after.saturating_sub(before);
        let total_growth_mb = growth_bytes as f64 / (1024.0 * 1024.0);
        let suspicious_growth = growth_bytes > threshold_bytes;

        Ok(AnalysisResult {
            summary: AnalysisSummary {
                total_leaks_mb: if suspicious_growth { total_growth_mb } else { 0.0 },
                total_growth_mb,
                suspicious_growth,
                confidence: if suspicious_growth { 0.6 } else { 0.1 },
            },
            leaks: Vec::new(),
            offenders: Vec::new(),
            recommendations: Vec::new(),
        })
    }
}

/// Demonstrates the "fallback also fails" path (spec §7, §9) in tests.
pub struct AlwaysFailAnalyzer;

#[async_trait]
impl SnapshotAnalyzer for AlwaysFailAnalyzer {
    async fn analyze(&self, _before_path: &Path, _after_path: &Path, _threshold_bytes: u64) -> Result<AnalysisResult, String> {
        Err("analyzer unavailable".to_string())
    }
}
