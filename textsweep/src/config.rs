use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{SweepError, SweepResult};
use crate::filters::default_skip_extensions;
use crate::mutate::ChunkBoundary;
use crate::orchestrator::FailurePolicy;
use crate::walk::WalkOptions;

/// Settings shared by every subcommand.
///
/// # Configuration Locations
///
/// Files are layered, later ones overriding earlier ones:
/// 1. Global `$CONFIG_DIR/textsweep/config.yaml`
/// 2. Local `.textsweep.yaml` in the current directory
/// 3. A file given with `--config`
///
/// Command-line values override all of them (see [`SweepConfig::merge_with_cli`]).
///
/// # Configuration Format
///
/// ```yaml
/// root_path: "."
/// only_extensions: ["rs", "md"]
/// skip_extensions: ["png", "woff"]
/// ignore_patterns: ["target/**"]
/// skip_dirs: ["node_modules"]
/// include_hidden: false
/// thread_count: 16
/// buffer_size: 8192
/// chunk_boundary: carry        # or per_chunk
/// include_line_content: true
/// failure_policy: strict       # or collect_and_report
/// preserve_permissions: true
/// log_level: "info"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Root directory to walk
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,

    /// Only these extensions are processed; `None` allows all
    #[serde(default)]
    pub only_extensions: Option<Vec<String>>,

    /// Extensions never processed. Defaults to common font and image formats.
    #[serde(default = "default_skip_extensions")]
    pub skip_extensions: Vec<String>,

    /// Glob patterns relative to the root
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Directory names never descended into
    #[serde(default)]
    pub skip_dirs: Vec<String>,

    /// Walk hidden files and directories; VCS directories stay skipped
    #[serde(default)]
    pub include_hidden: bool,

    /// Worker count; defaults to `max(2, 5 * cores)`
    #[serde(default)]
    pub thread_count: Option<usize>,

    /// Replace window in bytes; defaults to `max(2 * len(old), 1024)`
    #[serde(default)]
    pub buffer_size: Option<usize>,

    #[serde(default)]
    pub chunk_boundary: ChunkBoundary,

    /// Attach the full line text to each search occurrence
    #[serde(default)]
    pub include_line_content: bool,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Re-apply the original file's permissions after a replace
    #[serde(default = "default_true")]
    pub preserve_permissions: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_root_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            only_extensions: None,
            skip_extensions: default_skip_extensions(),
            ignore_patterns: Vec::new(),
            skip_dirs: Vec::new(),
            include_hidden: false,
            thread_count: None,
            buffer_size: None,
            chunk_boundary: ChunkBoundary::default(),
            include_line_content: false,
            failure_policy: FailurePolicy::default(),
            preserve_permissions: true,
            log_level: default_log_level(),
        }
    }
}

/// Command-line overrides. `None`/empty means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_path: Option<PathBuf>,
    pub only_extensions: Option<Vec<String>>,
    pub skip_extensions: Option<Vec<String>>,
    pub ignore_patterns: Vec<String>,
    pub include_hidden: bool,
    pub thread_count: Option<usize>,
    pub buffer_size: Option<usize>,
    pub chunk_boundary: Option<ChunkBoundary>,
    pub include_line_content: bool,
    pub failure_policy: Option<FailurePolicy>,
    pub log_level: Option<String>,
}

impl SweepConfig {
    /// Loads configuration from the default locations
    pub fn load() -> SweepResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus `config_path`.
    /// An explicit path that does not exist is an error; the default
    /// locations are optional.
    pub fn load_from(config_path: Option<&Path>) -> SweepResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let default_files = [
            dirs::config_dir().map(|p| p.join("textsweep").join("config.yaml")),
            Some(PathBuf::from(".textsweep.yaml")),
        ];
        for path in default_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| SweepError::config_error(e.to_string()))
    }

    /// Merges command-line values over configuration file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(root_path) = cli.root_path {
            self.root_path = root_path;
        }
        if cli.only_extensions.is_some() {
            self.only_extensions = cli.only_extensions;
        }
        if let Some(skip_extensions) = cli.skip_extensions {
            self.skip_extensions = skip_extensions;
        }
        if !cli.ignore_patterns.is_empty() {
            self.ignore_patterns = cli.ignore_patterns;
        }
        if cli.include_hidden {
            self.include_hidden = true;
        }
        if cli.thread_count.is_some() {
            self.thread_count = cli.thread_count;
        }
        if cli.buffer_size.is_some() {
            self.buffer_size = cli.buffer_size;
        }
        if let Some(boundary) = cli.chunk_boundary {
            self.chunk_boundary = boundary;
        }
        if cli.include_line_content {
            self.include_line_content = true;
        }
        if let Some(policy) = cli.failure_policy {
            self.failure_policy = policy;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// Enumeration settings for the walker
    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            only_extensions: self.only_extensions.clone(),
            skip_extensions: self.skip_extensions.clone(),
            ignore_patterns: self.ignore_patterns.clone(),
            skip_dirs: self.skip_dirs.clone(),
            include_hidden: self.include_hidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
root_path: "src"
only_extensions: ["rs", "toml"]
skip_extensions: ["lock"]
ignore_patterns: ["target/*"]
skip_dirs: ["node_modules"]
include_hidden: true
thread_count: 4
buffer_size: 4096
chunk_boundary: per_chunk
include_line_content: true
failure_policy: strict
preserve_permissions: false
log_level: "debug"
"#,
        )
        .unwrap();

        let config = SweepConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.root_path, PathBuf::from("src"));
        assert_eq!(
            config.only_extensions,
            Some(vec!["rs".to_string(), "toml".to_string()])
        );
        assert_eq!(config.skip_extensions, vec!["lock".to_string()]);
        assert_eq!(config.ignore_patterns, vec!["target/*".to_string()]);
        assert_eq!(config.skip_dirs, vec!["node_modules".to_string()]);
        assert!(config.include_hidden);
        assert!(config.walk_options().include_hidden);
        assert_eq!(config.thread_count, Some(4));
        assert_eq!(config.buffer_size, Some(4096));
        assert_eq!(config.chunk_boundary, ChunkBoundary::PerChunk);
        assert!(config.include_line_content);
        assert_eq!(config.failure_policy, FailurePolicy::Strict);
        assert!(!config.preserve_permissions);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(&config_path, "root_path: \".\"\n").unwrap();

        let config = SweepConfig::load_from(Some(&config_path)).unwrap();
        let defaults = SweepConfig::default();
        assert_eq!(config.root_path, PathBuf::from("."));
        assert_eq!(config.only_extensions, None);
        assert_eq!(config.skip_extensions, defaults.skip_extensions);
        assert_eq!(config.thread_count, None);
        assert!(!config.include_hidden);
        assert_eq!(config.chunk_boundary, ChunkBoundary::Carry);
        assert_eq!(config.failure_policy, FailurePolicy::CollectAndReport);
        assert!(config.preserve_permissions);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_merge_with_cli() {
        let file_config = SweepConfig {
            root_path: PathBuf::from("src"),
            only_extensions: Some(vec!["rs".to_string()]),
            ignore_patterns: vec!["target/*".to_string()],
            thread_count: Some(4),
            ..Default::default()
        };

        let merged = file_config.merge_with_cli(CliOverrides {
            root_path: Some(PathBuf::from("tests")),
            ignore_patterns: vec!["*.tmp".to_string()],
            include_hidden: true,
            thread_count: Some(8),
            chunk_boundary: Some(ChunkBoundary::PerChunk),
            failure_policy: Some(FailurePolicy::Strict),
            log_level: Some("debug".to_string()),
            ..Default::default()
        });

        assert_eq!(merged.root_path, PathBuf::from("tests"));
        assert_eq!(merged.only_extensions, Some(vec!["rs".to_string()])); // kept
        assert_eq!(merged.ignore_patterns, vec!["*.tmp".to_string()]);
        assert_eq!(merged.thread_count, Some(8));
        assert!(merged.walk_options().include_hidden);
        assert_eq!(merged.chunk_boundary, ChunkBoundary::PerChunk);
        assert_eq!(merged.failure_policy, FailurePolicy::Strict);
        assert_eq!(merged.log_level, "debug");
        assert_eq!(merged.skip_extensions, default_skip_extensions()); // kept
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(
            &config_path,
            "thread_count: \"invalid\"\nchunk_boundary: sideways\n",
        )
        .unwrap();

        let err = SweepConfig::load_from(Some(&config_path)).unwrap_err();
        assert!(matches!(err, SweepError::ConfigError(_)));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = SweepConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(result.is_err());
    }
}
