use std::path::Path;
use tracing::{debug, trace, warn};

use crate::classify::Classification;
use crate::errors::SweepError;
use crate::results::SkipReason;

/// Receives per-file events from the mutator and the orchestrator.
///
/// Components take an `Arc<dyn EventSink>` instead of logging directly, so
/// callers decide where events go (tracing, counters, a test recorder).
/// Every method defaults to a no-op. Implementations are called from worker
/// threads and must be cheap and thread-safe.
pub trait EventSink: Send + Sync {
    fn classified(&self, _path: &Path, _classification: &Classification) {}

    fn skipped(&self, _path: &Path, _reason: SkipReason) {}

    fn replaced(&self, _path: &Path, _substitutions: usize) {}

    fn matched(&self, _path: &Path, _occurrences: usize) {}

    fn failed(&self, _path: &Path, _error: &SweepError) {}
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEvents;

impl EventSink for NoopEvents {}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn classified(&self, path: &Path, classification: &Classification) {
        trace!(
            "Classified {} as {} by {} ({} bytes sampled)",
            path.display(),
            if classification.is_text { "text" } else { "binary" },
            classification.stage.as_str(),
            classification.sampled_bytes
        );
    }

    fn skipped(&self, path: &Path, reason: SkipReason) {
        debug!("Skipped {}: {}", path.display(), reason);
    }

    fn replaced(&self, path: &Path, substitutions: usize) {
        debug!("Replaced {} occurrence(s) in {}", substitutions, path.display());
    }

    fn matched(&self, path: &Path, occurrences: usize) {
        debug!("Found {} occurrence(s) in {}", occurrences, path.display());
    }

    fn failed(&self, path: &Path, error: &SweepError) {
        warn!("Failed to process {}: {}", path.display(), error);
    }
}
