//! Chunked, streaming in-place replacement.
//!
//! A file is never loaded whole. It is read through a fixed-size window,
//! every literal occurrence of the old pattern is replaced, and the output is
//! written to a sibling temporary file. Only after the whole source has been
//! consumed and flushed is the original deleted and the temporary file
//! renamed over it, so a reader never sees a half-rewritten file.
//!
//! # Chunk boundaries
//!
//! Replacing each window independently misses any occurrence that straddles
//! two windows. With [`ChunkBoundary::Carry`] (the default) the last
//! `len(old) - 1` bytes of each window are held back and scanned again
//! together with the next window, so the output is identical to replacing
//! over the whole file at once. [`ChunkBoundary::PerChunk`] keeps the older
//! window-by-window behavior for callers that depend on its exact output.
//!
//! Windows are measured in bytes and matching is done on bytes, so a window
//! edge that splits a multi-byte character cannot corrupt it.
use memchr::memmem;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::classify::classify_path;
use crate::errors::{IoStage, SweepError, SweepResult};
use crate::events::{EventSink, NoopEvents};

/// Smallest window used when the caller does not pick one
pub const MIN_BUFFER_SIZE: usize = 1024;

const TEMP_SUFFIX_LEN: usize = 10;
/// Bytes of the original name kept in the temporary file's name
const TEMP_NAME_LEN: usize = 100;

/// How occurrences spanning two read windows are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkBoundary {
    /// Carry a `len(old) - 1` byte tail into the next window
    #[default]
    Carry,
    /// Replace each window on its own; straddling occurrences are left as is
    PerChunk,
}

/// `max(2 * pattern_len, 1024)`
pub fn default_buffer_size(pattern_len: usize) -> usize {
    pattern_len.saturating_mul(2).max(MIN_BUFFER_SIZE)
}

/// What a successful replace pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceReport {
    pub path: PathBuf,
    pub substitutions: usize,
}

/// Replaces every occurrence of one literal with another, file by file
#[derive(Clone)]
pub struct ChunkedMutator {
    old: String,
    new: String,
    buffer_size: Option<usize>,
    boundary: ChunkBoundary,
    preserve_permissions: bool,
    events: Arc<dyn EventSink>,
}

impl fmt::Debug for ChunkedMutator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedMutator")
            .field("old", &self.old)
            .field("new", &self.new)
            .field("buffer_size", &self.buffer_size)
            .field("boundary", &self.boundary)
            .field("preserve_permissions", &self.preserve_permissions)
            .finish_non_exhaustive()
    }
}

impl ChunkedMutator {
    /// Fails with `InvalidInput` when `old` is empty.
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> SweepResult<Self> {
        let old = old.into();
        if old.is_empty() {
            return Err(SweepError::invalid_input("pattern to replace cannot be empty"));
        }

        Ok(Self {
            old,
            new: new.into(),
            buffer_size: None,
            boundary: ChunkBoundary::default(),
            preserve_permissions: true,
            events: Arc::new(NoopEvents),
        })
    }

    /// Window size in bytes; `None` picks [`default_buffer_size`]
    pub fn with_buffer_size(mut self, buffer_size: Option<usize>) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_boundary(mut self, boundary: ChunkBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn old_pattern(&self) -> &str {
        &self.old
    }

    pub fn new_pattern(&self) -> &str {
        &self.new
    }

    /// The window actually used: never smaller than the old pattern
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size
            .unwrap_or_else(|| default_buffer_size(self.old.len()))
            .max(self.old.len())
    }

    /// Replaces every occurrence in `path`, reporting to this mutator's sink
    pub fn replace(&self, path: &Path) -> SweepResult<ReplaceReport> {
        self.replace_observed(path, self.events.as_ref())
    }

    /// Replaces every occurrence in `path`, reporting to `events`
    pub fn replace_observed(
        &self,
        path: &Path,
        events: &dyn EventSink,
    ) -> SweepResult<ReplaceReport> {
        let result = self.replace_file(path, events);
        match &result {
            Ok(report) => events.replaced(path, report.substitutions),
            Err(e) => match e.skip_reason() {
                Some(reason) => events.skipped(path, reason),
                None => events.failed(path, e),
            },
        }
        result
    }

    fn replace_file(&self, path: &Path, events: &dyn EventSink) -> SweepResult<ReplaceReport> {
        if path.as_os_str().is_empty() {
            return Err(SweepError::invalid_input("file path cannot be empty"));
        }

        let metadata = fs::metadata(path).map_err(|e| SweepError::from_open(path, e))?;
        if !metadata.is_file() {
            return Err(SweepError::invalid_input(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        if metadata.len() == 0 {
            return Err(SweepError::invalid_input(format!(
                "empty file: {}",
                path.display()
            )));
        }

        let classification = classify_path(path);
        events.classified(path, &classification);
        if !classification.is_text {
            return Err(SweepError::not_text(path));
        }

        let source = File::open(path).map_err(|e| SweepError::from_open(path, e))?;
        self.rewrite(path, &metadata.permissions(), source)
    }

    /// Streams `source` into a sibling temporary file and swaps it in for
    /// `path`. The original is untouched unless every byte was written.
    fn rewrite<R: Read>(
        &self,
        path: &Path,
        permissions: &fs::Permissions,
        mut source: R,
    ) -> SweepResult<ReplaceReport> {
        let file_name = path
            .file_name()
            .ok_or_else(|| SweepError::invalid_input(format!("no file name: {}", path.display())))?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let prefix = temp_prefix(file_name);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).rand_bytes(TEMP_SUFFIX_LEN);
        #[cfg(unix)]
        {
            if !self.preserve_permissions {
                use std::os::unix::fs::PermissionsExt;
                // filtered by the umask, like any newly created file
                builder.permissions(fs::Permissions::from_mode(0o666));
            }
        }
        let mut temp = builder
            .tempfile_in(parent)
            .map_err(|e| SweepError::io(path, IoStage::CreateTemp, e))?;
        trace!(
            "Rewriting {} through {}",
            path.display(),
            temp.path().display()
        );

        let buffer_size = self.effective_buffer_size();
        let substitutions = {
            let mut writer = BufWriter::new(temp.as_file_mut());
            let substitutions =
                self.stream(&mut source, &mut writer, buffer_size)
                    .map_err(|e| match e {
                        StreamError::Read(e) => SweepError::io(path, IoStage::Read, e),
                        StreamError::Write(e) => SweepError::io(path, IoStage::Write, e),
                    })?;
            writer
                .flush()
                .map_err(|e| SweepError::io(path, IoStage::Write, e))?;
            substitutions
        };

        if substitutions == 0 {
            // Nothing changed: leave the original in place, the temp file is
            // removed on drop
            debug!("No occurrences in {}", path.display());
            return Ok(ReplaceReport {
                path: path.to_path_buf(),
                substitutions,
            });
        }

        if self.preserve_permissions {
            fs::set_permissions(temp.path(), permissions.clone())
                .map_err(|e| SweepError::io(path, IoStage::Permissions, e))?;
        }

        let temp_path = temp.into_temp_path();
        fs::remove_file(path).map_err(|e| SweepError::io(path, IoStage::Delete, e))?;
        if let Err(e) = temp_path.persist(path) {
            // The original is gone; keep the rewritten copy on disk
            match e.path.keep() {
                Ok(kept) => warn!(
                    "Could not move {} into place, rewritten content left at {}",
                    path.display(),
                    kept.display()
                ),
                Err(keep_err) => warn!(
                    "Could not move {} into place or keep its replacement: {}",
                    path.display(),
                    keep_err
                ),
            }
            return Err(SweepError::io(path, IoStage::Rename, e.error));
        }

        debug!(
            "Replaced {} occurrence(s) of '{}' in {}",
            substitutions,
            self.old,
            path.display()
        );
        Ok(ReplaceReport {
            path: path.to_path_buf(),
            substitutions,
        })
    }

    fn stream<R: Read, W: Write>(
        &self,
        source: &mut R,
        sink: &mut W,
        buffer_size: usize,
    ) -> Result<usize, StreamError> {
        let mut replacer = ChunkReplacer::new(self.old.as_bytes(), self.new.as_bytes(), self.boundary);
        let mut chunk = vec![0u8; buffer_size];

        loop {
            let read = fill_chunk(source, &mut chunk).map_err(StreamError::Read)?;
            if read == 0 {
                break;
            }
            replacer
                .feed(&chunk[..read], sink)
                .map_err(StreamError::Write)?;
        }

        replacer.finish(sink).map_err(StreamError::Write)
    }
}

/// Replaces `old` with `new` in the file at `path` using the default
/// settings. Returns the path of the rewritten file.
pub fn replace_in_file(
    path: &Path,
    old: &str,
    new: &str,
    buffer_size: Option<usize>,
) -> SweepResult<PathBuf> {
    ChunkedMutator::new(old, new)?
        .with_buffer_size(buffer_size)
        .replace(path)
        .map(|report| report.path)
}

/// `.<name>.`, with the name cut to [`TEMP_NAME_LEN`] bytes so the temporary
/// file stays within file-name limits however long the original is
fn temp_prefix(file_name: &OsStr) -> String {
    let name = file_name.to_string_lossy();
    let mut end = name.len().min(TEMP_NAME_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    format!(".{}.", &name[..end])
}

enum StreamError {
    Read(io::Error),
    Write(io::Error),
}

/// Reads until `chunk` is full or the source is exhausted
fn fill_chunk<R: Read>(source: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < chunk.len() {
        match source.read(&mut chunk[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Streaming literal replacement over a sequence of windows
struct ChunkReplacer<'a> {
    finder: memmem::Finder<'a>,
    replacement: &'a [u8],
    boundary: ChunkBoundary,
    carry: Vec<u8>,
    substitutions: usize,
}

impl<'a> ChunkReplacer<'a> {
    fn new(pattern: &'a [u8], replacement: &'a [u8], boundary: ChunkBoundary) -> Self {
        Self {
            finder: memmem::Finder::new(pattern),
            replacement,
            boundary,
            carry: Vec::with_capacity(pattern.len()),
            substitutions: 0,
        }
    }

    fn feed<W: Write>(&mut self, chunk: &[u8], out: &mut W) -> io::Result<()> {
        match self.boundary {
            ChunkBoundary::PerChunk => {
                self.write_replaced(chunk, chunk.len(), out)?;
            }
            ChunkBoundary::Carry => {
                let mut window = std::mem::take(&mut self.carry);
                window.extend_from_slice(chunk);
                let hold_back = self.finder.needle().len() - 1;
                let safe_end = window.len().saturating_sub(hold_back);
                let consumed = self.write_replaced(&window, safe_end, out)?;
                window.drain(..consumed);
                self.carry = window;
            }
        }
        Ok(())
    }

    /// Flushes the carried tail. Returns the total number of substitutions.
    fn finish<W: Write>(mut self, out: &mut W) -> io::Result<usize> {
        let tail = std::mem::take(&mut self.carry);
        self.write_replaced(&tail, tail.len(), out)?;
        Ok(self.substitutions)
    }

    /// Writes `window` with every occurrence replaced, stopping at `safe_end`
    /// or at the end of the last occurrence, whichever is later. Returns the
    /// number of window bytes consumed.
    fn write_replaced<W: Write>(
        &mut self,
        window: &[u8],
        safe_end: usize,
        out: &mut W,
    ) -> io::Result<usize> {
        let needle_len = self.finder.needle().len();
        let mut pos = 0;

        for start in self.finder.find_iter(window) {
            out.write_all(&window[pos..start])?;
            out.write_all(self.replacement)?;
            pos = start + needle_len;
            self.substitutions += 1;
        }

        let cut = pos.max(safe_end);
        out.write_all(&window[pos..cut])?;
        Ok(cut)
    }
}
