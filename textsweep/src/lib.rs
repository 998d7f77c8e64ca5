pub mod classify;
pub mod config;
pub mod errors;
pub mod events;
pub mod filters;
pub mod metrics;
pub mod mutate;
pub mod occurrence;
pub mod orchestrator;
pub mod report;
pub mod results;
pub mod walk;

pub use classify::{classify_bytes, classify_path, is_text_file, Classification, DecisionStage};
pub use config::{CliOverrides, SweepConfig};
pub use errors::{FileFailure, IoStage, SweepError, SweepResult};
pub use events::{EventSink, NoopEvents, TracingEvents};
pub use metrics::{SweepMetrics, SweepStats};
pub use mutate::{default_buffer_size, replace_in_file, ChunkBoundary, ChunkedMutator, ReplaceReport};
pub use occurrence::{find_in_line, OccurrenceIndexer};
pub use orchestrator::{default_pool_size, FailurePolicy, Orchestrator};
pub use report::SearchReport;
pub use results::{
    Aggregate, FileMatches, MutationOutcome, MutationState, MutationSummary, Occurrence,
    SearchSummary, SkipReason,
};
pub use walk::{collect_candidates, FileCandidate, WalkOptions};
