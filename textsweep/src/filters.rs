/// Path filters applied while enumerating candidate files.
///
/// Filters only look at names. Whether a file is text is decided later from
/// its content by [`crate::classify`], so nothing here guesses "binary" from
/// an extension; the deny list only exists to skip formats the caller never
/// wants touched (fonts, images).
///
/// All functions are free functions over plain slices so the walker can call
/// them from its filter closures without building intermediate objects.
use glob::Pattern;
use std::path::Path;

/// Version-control directories that are never descended into
pub const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// Extensions skipped unless the caller supplies its own deny list
pub const DEFAULT_SKIP_EXTENSIONS: &[&str] = &[
    "woff", "woff2", "ttf", "eot", "svg", "png", "jpg", "jpeg", "gif", "ico", "otf", "webp",
];

fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

fn same_extension(wanted: &str, actual: &str) -> bool {
    wanted.trim_start_matches('.').eq_ignore_ascii_case(actual)
}

/// Checks if a file passes the extension allow list. `None` allows everything.
pub fn has_valid_extension(path: &Path, extensions: &Option<Vec<String>>) -> bool {
    match extensions {
        None => true,
        Some(exts) => match extension_of(path) {
            Some(ext) => exts.iter().any(|e| same_extension(e, ext)),
            None => false,
        },
    }
}

/// Checks if a file's extension is on the deny list
pub fn is_denied_extension(path: &Path, skip_extensions: &[String]) -> bool {
    match extension_of(path) {
        Some(ext) => skip_extensions.iter().any(|e| same_extension(e, ext)),
        None => false,
    }
}

/// Checks if a path matches any of the glob ignore patterns. Invalid patterns
/// never match.
pub fn should_ignore(path: &Path, ignore_patterns: &[String]) -> bool {
    if ignore_patterns.is_empty() {
        return false;
    }

    // Patterns are written with forward slashes
    let normalized_path = path.to_string_lossy().replace('\\', "/");
    ignore_patterns.iter().any(|pattern| {
        Pattern::new(pattern)
            .map(|p| p.matches(&normalized_path))
            .unwrap_or(false)
    })
}

/// Checks if a directory name is one that is never walked
pub fn is_skipped_dir(name: &str, skip_dirs: &[String]) -> bool {
    VCS_DIRS.contains(&name) || skip_dirs.iter().any(|d| d == name)
}

/// Determines if a file should be handed to the pipeline
pub fn should_include_file(
    path: &Path,
    only_extensions: &Option<Vec<String>>,
    skip_extensions: &[String],
    ignore_patterns: &[String],
) -> bool {
    has_valid_extension(path, only_extensions)
        && !is_denied_extension(path, skip_extensions)
        && !should_ignore(path, ignore_patterns)
}

/// Owned copy of [`DEFAULT_SKIP_EXTENSIONS`]
pub fn default_skip_extensions() -> Vec<String> {
    DEFAULT_SKIP_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_valid_extension() {
        let path = Path::new("test.rs");
        let extensions = Some(vec!["rs".to_string()]);
        assert!(has_valid_extension(path, &extensions));

        let path = Path::new("test.py");
        assert!(!has_valid_extension(path, &extensions));

        let path = Path::new("test.RS"); // case insensitive
        assert!(has_valid_extension(path, &extensions));

        let path = Path::new("test"); // no extension
        assert!(!has_valid_extension(path, &extensions));

        let dotted = Some(vec![".rs".to_string()]);
        assert!(has_valid_extension(Path::new("lib.rs"), &dotted));

        assert!(has_valid_extension(Path::new("test.rs"), &None));
    }

    #[test]
    fn test_is_denied_extension() {
        let skip = default_skip_extensions();
        assert!(is_denied_extension(Path::new("font.woff2"), &skip));
        assert!(is_denied_extension(Path::new("logo.PNG"), &skip));
        assert!(!is_denied_extension(Path::new("main.rs"), &skip));
        assert!(!is_denied_extension(Path::new("Makefile"), &skip));
        assert!(!is_denied_extension(Path::new("logo.png"), &[]));
    }

    #[test]
    fn test_should_ignore() {
        let ignore_patterns = vec![
            "**/test_[0-4].txt".to_string(),
            "target/**/*.rs".to_string(),
            "**/*.tmp".to_string(),
        ];

        assert!(should_ignore(Path::new("test_0.txt"), &ignore_patterns));
        assert!(should_ignore(Path::new("dir/test_2.txt"), &ignore_patterns));
        assert!(should_ignore(
            Path::new("target/debug/main.rs"),
            &ignore_patterns
        ));
        assert!(should_ignore(Path::new("src/temp.tmp"), &ignore_patterns));

        assert!(!should_ignore(Path::new("test_5.txt"), &ignore_patterns));
        assert!(!should_ignore(Path::new("src/main.rs"), &ignore_patterns));
        assert!(!should_ignore(Path::new("anything"), &[]));
        assert!(!should_ignore(Path::new("a.txt"), &["[".to_string()]));
    }

    #[test]
    fn test_is_skipped_dir() {
        assert!(is_skipped_dir(".git", &[]));
        assert!(is_skipped_dir(".svn", &[]));
        assert!(is_skipped_dir("node_modules", &["node_modules".to_string()]));
        assert!(!is_skipped_dir(".github", &[]));
        assert!(!is_skipped_dir("src", &["node_modules".to_string()]));
    }

    #[test]
    fn test_should_include_file() {
        let only = Some(vec!["rs".to_string(), "svg".to_string()]);
        let skip = default_skip_extensions();
        let ignore = vec!["target/**".to_string()];

        assert!(should_include_file(Path::new("src/main.rs"), &only, &skip, &ignore));
        assert!(!should_include_file(Path::new("src/main.py"), &only, &skip, &ignore));
        assert!(!should_include_file(Path::new("target/debug/x.rs"), &only, &skip, &ignore));
        // the deny list wins over the allow list
        assert!(!should_include_file(Path::new("icon.svg"), &only, &skip, &ignore));
        assert!(should_include_file(Path::new("notes.md"), &None, &[], &[]));
    }
}
