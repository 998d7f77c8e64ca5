use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::trace;

use crate::errors::{IoStage, SweepError, SweepResult};
use crate::results::{FileMatches, Occurrence};

const BUFFER_CAPACITY: usize = 64 * 1024;

/// Finds every non-overlapping occurrence of `pattern` in `line`, scanning
/// left to right. Indices are character positions; `end_index` is inclusive.
/// An empty pattern matches nothing.
pub fn find_in_line(
    line: &str,
    pattern: &str,
    line_number: usize,
    include_line_content: bool,
) -> Vec<Occurrence> {
    if pattern.is_empty() {
        return Vec::new();
    }

    let pattern_chars = pattern.chars().count();
    let mut occurrences = Vec::new();
    let mut last_byte = 0;
    let mut last_char = 0;

    for (byte_start, _) in line.match_indices(pattern) {
        let char_start = last_char + line[last_byte..byte_start].chars().count();
        last_byte = byte_start;
        last_char = char_start;

        occurrences.push(Occurrence {
            line_number,
            line_content: if include_line_content {
                line.to_string()
            } else {
                String::new()
            },
            start_index: char_start,
            end_index: char_start + pattern_chars - 1,
        });
    }

    occurrences
}

/// Indexes occurrences of a literal phrase line by line
#[derive(Debug, Clone)]
pub struct OccurrenceIndexer {
    pattern: String,
    include_line_content: bool,
}

impl OccurrenceIndexer {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            include_line_content: false,
        }
    }

    /// Whether each occurrence carries the full text of its line
    pub fn with_line_content(mut self, include: bool) -> Self {
        self.include_line_content = include;
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn find_in_line(&self, line: &str, line_number: usize) -> Vec<Occurrence> {
        find_in_line(line, &self.pattern, line_number, self.include_line_content)
    }

    /// Indexes an in-memory string split on newlines. `None` when nothing
    /// matched.
    pub fn index_str(&self, text: &str) -> Option<Vec<Occurrence>> {
        let occurrences: Vec<Occurrence> = text
            .lines()
            .enumerate()
            .flat_map(|(i, line)| self.find_in_line(line, i + 1))
            .collect();

        if occurrences.is_empty() {
            None
        } else {
            Some(occurrences)
        }
    }

    /// Indexes a line stream. Lines that are not valid UTF-8 are decoded
    /// lossily; a trailing `\r` is dropped from each line.
    pub fn index_reader<R: BufRead>(&self, mut reader: R) -> std::io::Result<Option<Vec<Occurrence>>> {
        if self.pattern.is_empty() {
            return Ok(None);
        }

        let mut occurrences = Vec::new();
        let mut buf = Vec::with_capacity(256);
        let mut line_number = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_number += 1;

            let mut line = buf.as_slice();
            if let Some(stripped) = line.strip_suffix(b"\n") {
                line = stripped;
            }
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }

            let text = String::from_utf8_lossy(line);
            occurrences.extend(self.find_in_line(&text, line_number));
        }

        if occurrences.is_empty() {
            Ok(None)
        } else {
            Ok(Some(occurrences))
        }
    }

    /// Indexes the file at `path`. `Ok(None)` when the file has no occurrence.
    pub fn index_file(&self, path: &Path) -> SweepResult<Option<FileMatches>> {
        trace!("Indexing file: {}", path.display());

        let file = File::open(path).map_err(|e| SweepError::from_open(path, e))?;
        let reader = BufReader::with_capacity(BUFFER_CAPACITY, file);

        let occurrences = self
            .index_reader(reader)
            .map_err(|e| SweepError::io(path, IoStage::Read, e))?;

        Ok(occurrences.map(|occurrences| FileMatches {
            path: path.to_path_buf(),
            occurrences,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn ranges(occurrences: &[Occurrence]) -> Vec<(usize, usize)> {
        occurrences
            .iter()
            .map(|o| (o.start_index, o.end_index))
            .collect()
    }

    #[test]
    fn test_three_occurrences_in_line() {
        let found = find_in_line("  test me test again test", "test", 1, false);
        assert_eq!(ranges(&found), vec![(2, 5), (11, 14), (20, 23)]);
        assert!(found.iter().all(|o| o.line_number == 1));
        assert!(found.iter().all(|o| o.line_content.is_empty()));
    }

    #[test]
    fn test_line_content_is_opt_in() {
        let line = "a test line";
        let found = find_in_line(line, "test", 7, true);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line_content, line);
        assert_eq!(found[0].line_number, 7);
    }

    #[test]
    fn test_non_overlapping() {
        let found = find_in_line("aaaa", "aa", 1, false);
        assert_eq!(ranges(&found), vec![(0, 1), (2, 3)]);

        let found = find_in_line("aaa", "aa", 1, false);
        assert_eq!(ranges(&found), vec![(0, 1)]);
    }

    #[test]
    fn test_empty_pattern_and_no_match() {
        assert!(find_in_line("anything", "", 1, true).is_empty());
        assert!(find_in_line("anything", "nothing", 1, true).is_empty());
        assert!(find_in_line("", "x", 1, true).is_empty());
    }

    #[test]
    fn test_indices_count_characters() {
        let found = find_in_line("héllo wörld wörld", "wörld", 1, false);
        assert_eq!(ranges(&found), vec![(6, 10), (12, 16)]);
    }

    #[test]
    fn test_index_str_line_order() {
        let text = "one\ntwo\nthe test\ntest and test\ntest, test\n";
        let indexer = OccurrenceIndexer::new("test");
        let found = indexer.index_str(text).unwrap();
        let lines: Vec<usize> = found.iter().map(|o| o.line_number).collect();
        assert_eq!(lines, vec![3, 4, 4, 5, 5]);
        assert_eq!(ranges(&found), vec![(4, 7), (0, 3), (9, 12), (0, 3), (6, 9)]);
    }

    #[test]
    fn test_index_str_no_result() {
        let indexer = OccurrenceIndexer::new("test");
        assert!(indexer.index_str("").is_none());
        assert!(indexer.index_str("nothing here\n").is_none());
        assert!(OccurrenceIndexer::new("").index_str("test").is_none());
    }

    #[test]
    fn test_index_reader_strips_crlf_and_decodes_lossily() {
        let indexer = OccurrenceIndexer::new("end").with_line_content(true);
        let input: &[u8] = b"the end\r\n\xff end\nno";
        let found = indexer.index_reader(Cursor::new(input)).unwrap().unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].line_content, "the end");
        assert_eq!(found[1].line_number, 2);
        assert_eq!(found[1].line_content, "\u{FFFD} end");
        assert_eq!((found[1].start_index, found[1].end_index), (2, 4));
    }

    #[test]
    fn test_index_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("five.txt");
        fs::write(
            &path,
            "line one\nline two\na test\ntest test\ntest and test\n",
        )
        .unwrap();

        let result = OccurrenceIndexer::new("test")
            .index_file(&path)
            .unwrap()
            .unwrap();
        assert_eq!(result.path, path);
        assert_eq!(result.line_numbers(), vec![3, 4, 4, 5, 5]);
    }

    #[test]
    fn test_index_file_empty_and_missing() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty.txt");
        fs::write(&empty, "").unwrap();

        let indexer = OccurrenceIndexer::new("test");
        assert!(indexer.index_file(&empty).unwrap().is_none());

        let err = indexer
            .index_file(&dir.path().join("missing.txt"))
            .unwrap_err();
        assert!(matches!(err, SweepError::NotFound(_)));
    }
}
