// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod classify;
pub mod coverage;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod orchestrator;
pub mod source_weights;
pub mod throttle;

// ---- Re-exports for stable public API ----
pub use crate::coverage::{
    AnalysisConfidence, CategoryMatcher, CoverageScorer, GapAnalyzer, Recommendation,
    SubstringMatcher,
};
pub use crate::error::{OrchestratorError, SourceError};
pub use crate::ingest::checkpoint::{Checkpoint, CheckpointStore};
pub use crate::ingest::config::AggregatorConfig;
pub use crate::ingest::{
    Deduplicator, Fact, FactSet, FactValue, FetchParams, RawFact, SourceConnector,
};
pub use crate::orchestrator::{
    ExtractionPhase, ExtractionReport, Orchestrator, OrchestratorSettings, SourceDescriptor,
};
pub use crate::throttle::{Backoff, RateLimiter};
