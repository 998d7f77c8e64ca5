//! Fan-out of per-file work over a bounded worker pool.
//!
//! Every call builds its own rayon pool, runs one task per file and blocks
//! until all of them have finished. Results come back through rayon's
//! indexed collect, so they are in input order no matter which worker ran
//! which file. A task that fails, or panics, only affects its own file; the
//! [`FailurePolicy`] decides afterwards whether the batch as a whole failed.
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classify::{classify_path, DecisionStage};
use crate::errors::{FileFailure, SweepError, SweepResult};
use crate::events::{EventSink, TracingEvents};
use crate::mutate::ChunkedMutator;
use crate::occurrence::OccurrenceIndexer;
use crate::results::{
    Aggregate, FileMatches, MutationOutcome, MutationState, MutationSummary, SearchSummary,
    SkipReason,
};
use crate::walk::FileCandidate;

/// When recorded per-file failures turn into a failed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail only when every file that was attempted failed
    #[default]
    CollectAndReport,
    /// Fail when any file failed
    Strict,
}

/// `max(2, 5 * available cores)`; the work is mostly waiting on I/O
pub fn default_pool_size() -> usize {
    num_cpus::get().saturating_mul(5).max(2)
}

/// Per-file result of a search task
enum SearchState {
    Matched(FileMatches),
    Empty,
    Skipped,
}

/// Runs replace and search batches across a worker pool
#[derive(Clone)]
pub struct Orchestrator {
    pool_size: usize,
    policy: FailurePolicy,
    events: Arc<dyn EventSink>,
    progress: bool,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pool_size", &self.pool_size)
            .field("policy", &self.policy)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            pool_size: default_pool_size(),
            policy: FailurePolicy::default(),
            events: Arc::new(TracingEvents),
            progress: false,
        }
    }

    /// Number of worker threads; `None` keeps the default
    pub fn with_pool_size(mut self, pool_size: Option<usize>) -> Self {
        self.pool_size = pool_size.unwrap_or_else(default_pool_size).max(1);
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Draw a progress bar on stderr while a batch runs
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Runs `op` once per file and returns every result in input order.
    ///
    /// A panicking task is reported as [`SweepError::Interrupted`] for its
    /// file. Only failing to start the pool is an error of the call itself.
    pub fn run<T, F>(
        &self,
        files: &[FileCandidate],
        op: F,
    ) -> SweepResult<Vec<(PathBuf, SweepResult<T>)>>
    where
        T: Send,
        F: Fn(&FileCandidate) -> SweepResult<T> + Sync,
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.pool_size)
            .thread_name(|i| format!("textsweep-worker-{}", i))
            .build()
            .map_err(|e| SweepError::invalid_input(format!("cannot start worker pool: {}", e)))?;

        debug!(
            "Processing {} files on {} workers",
            files.len(),
            self.pool_size
        );

        let progress = self.progress_bar(files.len());
        let results = pool.install(|| {
            files
                .par_iter()
                .map(|candidate| {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| op(candidate)))
                        .unwrap_or_else(|payload| {
                            let err = SweepError::interrupted(
                                &candidate.path,
                                panic_message(payload.as_ref()),
                            );
                            self.events.failed(&candidate.path, &err);
                            Err(err)
                        });
                    progress.inc(1);
                    (candidate.path.clone(), result)
                })
                .collect::<Vec<_>>()
        });
        progress.finish();

        Ok(results)
    }

    /// Replaces across every file. Each file ends in exactly one
    /// [`MutationState`]; `NoResults` means no file changed and none failed.
    pub fn replace_all(
        &self,
        files: &[FileCandidate],
        mutator: &ChunkedMutator,
    ) -> SweepResult<Aggregate<MutationSummary>> {
        info!(
            "Replacing '{}' with '{}' in {} files",
            mutator.old_pattern(),
            mutator.new_pattern(),
            files.len()
        );

        let events = self.events.as_ref();
        let results = self.run(files, |candidate| {
            mutator.replace_observed(&candidate.path, events)
        })?;

        let outcomes = results
            .into_iter()
            .map(|(path, result)| {
                let state = match result {
                    Ok(report) => MutationState::Succeeded {
                        substitutions: report.substitutions,
                    },
                    Err(e) => match e.skip_reason() {
                        Some(SkipReason::NotText) => MutationState::SkippedNotText,
                        Some(SkipReason::Invalid) => MutationState::SkippedInvalid,
                        None => MutationState::Failed(e.to_string()),
                    },
                };
                MutationOutcome { path, state }
            })
            .collect();
        let summary = MutationSummary { outcomes };

        self.check_policy(files.len(), summary.files_skipped(), &summary.failures())?;

        info!(
            "Replace complete. {} substitutions in {} files",
            summary.total_substitutions(),
            summary.files_changed()
        );

        if summary.files_changed() == 0 && summary.failures().is_empty() {
            Ok(Aggregate::NoResults)
        } else {
            Ok(Aggregate::Found(summary))
        }
    }

    /// Classifies then indexes every file. Matches are grouped per file in
    /// input order; `NoResults` means nothing matched and nothing failed.
    pub fn search_all(
        &self,
        files: &[FileCandidate],
        indexer: &OccurrenceIndexer,
    ) -> SweepResult<Aggregate<SearchSummary>> {
        info!("Searching for '{}' in {} files", indexer.pattern(), files.len());

        let results = self.run(files, |candidate| self.search_file(candidate, indexer))?;

        let mut summary = SearchSummary {
            files_searched: files.len(),
            ..Default::default()
        };
        for (path, result) in results {
            match result {
                Ok(SearchState::Matched(matches)) => summary.results.push(matches),
                Ok(SearchState::Empty) => {}
                Ok(SearchState::Skipped) => summary.files_skipped += 1,
                Err(e) => summary.failures.push(FileFailure {
                    path,
                    reason: e.to_string(),
                }),
            }
        }

        self.check_policy(files.len(), summary.files_skipped, &summary.failures)?;

        info!(
            "Search complete. Found {} matches in {} files",
            summary.total_matches(),
            summary.files_with_matches()
        );

        if summary.results.is_empty() && summary.failures.is_empty() {
            Ok(Aggregate::NoResults)
        } else {
            Ok(Aggregate::Found(summary))
        }
    }

    fn search_file(
        &self,
        candidate: &FileCandidate,
        indexer: &OccurrenceIndexer,
    ) -> SweepResult<SearchState> {
        let path = candidate.path.as_path();
        let classification = classify_path(path);
        self.events.classified(path, &classification);

        if !classification.is_text {
            let reason = match classification.stage {
                DecisionStage::Guard => SkipReason::Invalid,
                _ => SkipReason::NotText,
            };
            self.events.skipped(path, reason);
            return Ok(SearchState::Skipped);
        }

        match indexer.index_file(path) {
            Ok(Some(matches)) => {
                self.events.matched(path, matches.occurrences.len());
                Ok(SearchState::Matched(matches))
            }
            Ok(None) => Ok(SearchState::Empty),
            Err(SweepError::NotFound(_)) => {
                self.events.skipped(path, SkipReason::Invalid);
                Ok(SearchState::Skipped)
            }
            Err(e) => {
                self.events.failed(path, &e);
                Err(e)
            }
        }
    }

    fn check_policy(
        &self,
        total: usize,
        skipped: usize,
        failures: &[FileFailure],
    ) -> SweepResult<()> {
        if failures.is_empty() {
            return Ok(());
        }

        let attempted = total.saturating_sub(skipped);
        let fatal = match self.policy {
            FailurePolicy::Strict => true,
            FailurePolicy::CollectAndReport => failures.len() >= attempted,
        };

        if fatal {
            return Err(SweepError::BatchFailed {
                total,
                failures: failures.to_vec(),
            });
        }

        warn!("{} of {} files failed", failures.len(), total);
        Ok(())
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files")
        {
            progress.set_style(style.progress_chars("=>-"));
        }
        progress
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", message)
    } else {
        "worker panicked".to_string()
    }
}
