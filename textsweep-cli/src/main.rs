use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use textsweep::{
    classify_path, collect_candidates, Aggregate, ChunkBoundary, ChunkedMutator, CliOverrides,
    FailurePolicy, MutationState, MutationSummary, OccurrenceIndexer, Orchestrator, SearchReport,
    SearchSummary, SweepConfig, SweepError, SweepMetrics,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, SweepError>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file layered over the global and local ones
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WalkArgs {
    /// Root directory to process
    #[arg(short = 'd', long)]
    root: Option<PathBuf>,

    /// File extensions to include (e.g. rs,md,txt)
    #[arg(short = 'e', long)]
    extensions: Option<String>,

    /// File extensions to skip, replacing the default font/image list
    #[arg(long = "skip-ext")]
    skip_extensions: Option<String>,

    /// Patterns to ignore (glob format)
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Include hidden files and directories
    #[arg(long)]
    hidden: bool,

    /// Number of worker threads
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Fail the whole run if any file fails
    #[arg(long)]
    strict: bool,

    /// Show a progress bar
    #[arg(long)]
    progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace a literal string in every text file under a directory
    Replace {
        #[command(flatten)]
        walk: WalkArgs,

        /// Text to replace
        #[arg(short = 'p', long)]
        pattern: String,

        /// Replacement text
        #[arg(short = 'r', long)]
        replacement: String,

        /// Read window in bytes
        #[arg(long)]
        buffer_size: Option<usize>,

        /// Replace each read window on its own, leaving occurrences that
        /// straddle two windows untouched
        #[arg(long)]
        per_chunk: bool,
    },

    /// Find every occurrence of a literal phrase
    Search {
        #[command(flatten)]
        walk: WalkArgs,

        /// Phrase to search for
        #[arg(short = 'p', long)]
        pattern: String,

        /// Include the full line text with each match
        #[arg(long)]
        with_lines: bool,

        /// Write the results as JSON to this file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report whether files are text or binary
    Classify {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let file_config = SweepConfig::load_from(cli.config.as_deref())?;

    match cli.command {
        Commands::Replace {
            walk,
            pattern,
            replacement,
            buffer_size,
            per_chunk,
        } => {
            let mut overrides = walk_overrides(&walk, cli.log_level);
            overrides.buffer_size = buffer_size;
            if per_chunk {
                overrides.chunk_boundary = Some(ChunkBoundary::PerChunk);
            }
            let config = file_config.merge_with_cli(overrides);
            init_tracing(&config.log_level);

            let mutator = ChunkedMutator::new(pattern, replacement)?
                .with_buffer_size(config.buffer_size)
                .with_boundary(config.chunk_boundary)
                .preserve_permissions(config.preserve_permissions);

            let metrics = SweepMetrics::new();
            let files = collect_candidates(&config.root_path, &config.walk_options())?;
            debug!("{} candidate files under {}", files.len(), config.root_path.display());
            let result = orchestrator(&config, &metrics, walk.progress).replace_all(&files, &mutator);
            metrics.log_stats();

            match result? {
                Aggregate::Found(summary) => print_replace_summary(&summary),
                Aggregate::NoResults => println!(
                    "No occurrences of '{}' found in {} files",
                    mutator.old_pattern(),
                    files.len()
                ),
            }
            Ok(())
        }
        Commands::Search {
            walk,
            pattern,
            with_lines,
            save,
            json,
        } => {
            let mut overrides = walk_overrides(&walk, cli.log_level);
            overrides.include_line_content = with_lines;
            let config = file_config.merge_with_cli(overrides);
            init_tracing(&config.log_level);

            let indexer =
                OccurrenceIndexer::new(pattern.as_str()).with_line_content(config.include_line_content);

            let metrics = SweepMetrics::new();
            let files = collect_candidates(&config.root_path, &config.walk_options())?;
            debug!("{} candidate files under {}", files.len(), config.root_path.display());
            let result = orchestrator(&config, &metrics, walk.progress).search_all(&files, &indexer);
            metrics.log_stats();

            let summary = match result? {
                Aggregate::Found(summary) => summary,
                Aggregate::NoResults => SearchSummary {
                    files_searched: files.len(),
                    ..Default::default()
                },
            };

            if json {
                let report = SearchReport::new(&config.root_path, &pattern, summary.results.clone());
                println!("{}", report.to_json_pretty()?);
            } else {
                print_search_results(&summary);
            }

            if let Some(path) = save {
                save_report(&path, &config.root_path, &pattern, summary)?;
            }
            Ok(())
        }
        Commands::Classify { paths } => {
            let config = file_config.merge_with_cli(CliOverrides {
                log_level: cli.log_level,
                ..Default::default()
            });
            init_tracing(&config.log_level);

            for path in &paths {
                let classification = classify_path(path);
                let verdict = if classification.is_text {
                    "text".green()
                } else {
                    "binary".red()
                };
                println!(
                    "{}: {} (decided by {}, {} bytes sampled)",
                    path.display(),
                    verdict,
                    classification.stage.as_str(),
                    classification.sampled_bytes
                );
            }
            Ok(())
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("textsweep={},textsweep_cli={}", level, level))
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn split_list(value: &Option<String>) -> Option<Vec<String>> {
    value.as_ref().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn walk_overrides(walk: &WalkArgs, log_level: Option<String>) -> CliOverrides {
    CliOverrides {
        root_path: walk.root.clone(),
        only_extensions: split_list(&walk.extensions),
        skip_extensions: split_list(&walk.skip_extensions),
        ignore_patterns: walk.ignore.clone(),
        include_hidden: walk.hidden,
        thread_count: walk.threads,
        failure_policy: walk.strict.then_some(FailurePolicy::Strict),
        log_level,
        ..Default::default()
    }
}

fn orchestrator(config: &SweepConfig, metrics: &SweepMetrics, progress: bool) -> Orchestrator {
    Orchestrator::new()
        .with_pool_size(config.thread_count)
        .with_policy(config.failure_policy)
        .with_events(Arc::new(metrics.clone()))
        .with_progress(progress)
}

fn print_replace_summary(summary: &MutationSummary) {
    for outcome in &summary.outcomes {
        let path = outcome.path.display().to_string();
        match &outcome.state {
            MutationState::Succeeded { substitutions } if *substitutions > 0 => {
                println!("{}: {} replaced", path.blue(), substitutions.to_string().green())
            }
            MutationState::Succeeded { .. } => println!("{}: unchanged", path.dimmed()),
            MutationState::SkippedNotText => println!("{}: skipped (not text)", path.dimmed()),
            MutationState::SkippedInvalid => println!("{}: skipped (invalid)", path.dimmed()),
            MutationState::Failed(reason) => println!("{}: {}", path.red(), reason),
        }
    }

    println!(
        "\nReplaced {} occurrences in {} of {} files",
        summary.total_substitutions(),
        summary.files_changed(),
        summary.files_processed()
    );
    let failures = summary.failures();
    if !failures.is_empty() {
        println!("{} files failed", failures.len().to_string().red());
    }
}

fn print_search_results(summary: &SearchSummary) {
    for file_matches in &summary.results {
        println!("\n{}", file_matches.path.display().to_string().blue());
        for o in &file_matches.occurrences {
            let position = format!("{}:{}-{}", o.line_number, o.start_index, o.end_index);
            if o.line_content.is_empty() {
                println!("{}", position.green());
            } else {
                println!("{}: {}", position.green(), o.line_content);
            }
        }
    }

    for failure in &summary.failures {
        eprintln!("{} {}", "failed:".red(), failure);
    }

    println!(
        "\nFound {} matches in {} files",
        summary.total_matches(),
        summary.files_with_matches()
    );
}

fn save_report(path: &Path, root: &Path, pattern: &str, summary: SearchSummary) -> Result<()> {
    if summary.results.is_empty() {
        println!("Nothing to save");
        return Ok(());
    }

    SearchReport::from_summary(root, pattern, summary).save_to(path)?;
    println!("Results saved to {}", path.display());
    Ok(())
}
