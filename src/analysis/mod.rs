//! Analysis coordinator (spec §4.G): comparison sessions, the pluggable
//! analyzer interface, and scratch-file lifecycle management.

pub mod actor;
pub mod analyzer;
pub mod model;
pub mod scratch;

pub use actor::{AnalysisCoordinatorActor, CompareSync, ComparisonReady, GetSession, ListSessions};
pub use analyzer::{AlwaysFailAnalyzer, HeuristicAnalyzer, SnapshotAnalyzer};
pub use model::{AnalysisResult, AnalysisSummary, ComparisonSession, SessionStatus};
