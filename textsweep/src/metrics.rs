use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classify::Classification;
use crate::errors::SweepError;
use crate::events::EventSink;
use crate::results::SkipReason;

/// Counts what a sweep did. Clones share the same counters, so one instance
/// can be handed to the orchestrator and read back afterwards.
#[derive(Debug, Clone)]
pub struct SweepMetrics {
    // Classification
    files_classified: Arc<AtomicU64>,
    text_files: Arc<AtomicU64>,
    bytes_sampled: Arc<AtomicU64>,

    // Outcomes
    files_replaced: Arc<AtomicU64>,
    substitutions: Arc<AtomicU64>,
    files_with_matches: Arc<AtomicU64>,
    occurrences: Arc<AtomicU64>,
    files_skipped: Arc<AtomicU64>,
    files_failed: Arc<AtomicU64>,
}

impl SweepMetrics {
    /// Creates a new SweepMetrics instance
    pub fn new() -> Self {
        Self {
            files_classified: Arc::new(AtomicU64::new(0)),
            text_files: Arc::new(AtomicU64::new(0)),
            bytes_sampled: Arc::new(AtomicU64::new(0)),
            files_replaced: Arc::new(AtomicU64::new(0)),
            substitutions: Arc::new(AtomicU64::new(0)),
            files_with_matches: Arc::new(AtomicU64::new(0)),
            occurrences: Arc::new(AtomicU64::new(0)),
            files_skipped: Arc::new(AtomicU64::new(0)),
            files_failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Gets a snapshot of the counters
    pub fn get_stats(&self) -> SweepStats {
        let files_classified = self.files_classified.load(Ordering::Relaxed);
        let text_files = self.text_files.load(Ordering::Relaxed);
        SweepStats {
            files_classified,
            text_files,
            binary_files: files_classified - text_files,
            bytes_sampled: self.bytes_sampled.load(Ordering::Relaxed),
            files_replaced: self.files_replaced.load(Ordering::Relaxed),
            substitutions: self.substitutions.load(Ordering::Relaxed),
            files_with_matches: self.files_with_matches.load(Ordering::Relaxed),
            occurrences: self.occurrences.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
        }
    }

    /// Logs the current counters
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Sweep stats:\n\
             Files classified (text/binary): {} ({}/{})\n\
             Bytes sampled: {}\n\
             Files replaced: {} ({} substitutions)\n\
             Files with matches: {} ({} occurrences)\n\
             Skipped/failed: {}/{}",
            stats.files_classified,
            stats.text_files,
            stats.binary_files,
            stats.bytes_sampled,
            stats.files_replaced,
            stats.substitutions,
            stats.files_with_matches,
            stats.occurrences,
            stats.files_skipped,
            stats.files_failed
        );
    }
}

impl Default for SweepMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for SweepMetrics {
    fn classified(&self, _path: &Path, classification: &Classification) {
        self.files_classified.fetch_add(1, Ordering::Relaxed);
        self.bytes_sampled
            .fetch_add(classification.sampled_bytes as u64, Ordering::Relaxed);
        if classification.is_text {
            self.text_files.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn skipped(&self, path: &Path, reason: SkipReason) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
        debug!("Skipped {}: {}", path.display(), reason);
    }

    fn replaced(&self, path: &Path, substitutions: usize) {
        self.files_replaced.fetch_add(1, Ordering::Relaxed);
        self.substitutions
            .fetch_add(substitutions as u64, Ordering::Relaxed);
        debug!("Replaced {} occurrence(s) in {}", substitutions, path.display());
    }

    fn matched(&self, path: &Path, occurrences: usize) {
        self.files_with_matches.fetch_add(1, Ordering::Relaxed);
        self.occurrences
            .fetch_add(occurrences as u64, Ordering::Relaxed);
        debug!("Found {} occurrence(s) in {}", occurrences, path.display());
    }

    fn failed(&self, path: &Path, error: &SweepError) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
        warn!("Failed to process {}: {}", path.display(), error);
    }
}

/// Snapshot of [`SweepMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub files_classified: u64,
    pub text_files: u64,
    pub binary_files: u64,
    pub bytes_sampled: u64,
    pub files_replaced: u64,
    pub substitutions: u64,
    pub files_with_matches: u64,
    pub occurrences: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_bytes;
    use std::path::PathBuf;

    #[test]
    fn test_classification_tracking() {
        let metrics = SweepMetrics::new();
        let path = PathBuf::from("a.txt");

        metrics.classified(&path, &classify_bytes(b"hello world\n"));
        metrics.classified(&path, &classify_bytes(&[0, 1, 2, 3]));

        let stats = metrics.get_stats();
        assert_eq!(stats.files_classified, 2);
        assert_eq!(stats.text_files, 1);
        assert_eq!(stats.binary_files, 1);
        assert_eq!(stats.bytes_sampled, 16);
    }

    #[test]
    fn test_outcome_tracking() {
        let metrics = SweepMetrics::new();
        let path = PathBuf::from("a.txt");

        metrics.replaced(&path, 3);
        metrics.replaced(&path, 0);
        metrics.matched(&path, 5);
        metrics.skipped(&path, SkipReason::NotText);
        metrics.failed(&path, &SweepError::not_found(&path));

        let stats = metrics.get_stats();
        assert_eq!(stats.files_replaced, 2);
        assert_eq!(stats.substitutions, 3);
        assert_eq!(stats.files_with_matches, 1);
        assert_eq!(stats.occurrences, 5);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.files_failed, 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = SweepMetrics::new();
        let clone = metrics.clone();
        clone.replaced(&PathBuf::from("a.txt"), 2);
        assert_eq!(metrics.get_stats().substitutions, 2);
    }
}
