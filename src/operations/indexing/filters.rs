//! Which files the pipeline and watcher care about: markdown/text content
//! outside Obsidian's own bookkeeping directories, minus whatever a
//! collection's own `ignore_patterns` glob away.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

const EXCLUDED_DIRS: &[&str] = &[".obsidian", ".trash", "templates"];
const WATCHED_EXTENSIONS: &[&str] = &["md", "txt"];

pub fn is_relevant_file(relative_path: &Path) -> bool {
    if relative_path
        .components()
        .any(|c| EXCLUDED_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
    {
        return false;
    }
    matches!(
        relative_path.extension().and_then(|e| e.to_str()),
        Some(ext) if WATCHED_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    )
}

/// Compile a collection's `ignore_patterns` into a matchable set. Invalid
/// globs are dropped rather than failing the whole collection.
pub fn build_ignore_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => tracing::warn!(pattern, error = %e, "skipping invalid ignore pattern"),
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().expect("empty globset"))
}

/// A file is indexable when it passes the fixed extension/bookkeeping rule
/// and matches none of the collection's own ignore globs.
pub fn is_indexable(relative_path: &Path, ignore: &GlobSet) -> bool {
    is_relevant_file(relative_path) && !ignore.is_match(relative_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn accepts_markdown_and_text() {
        assert!(is_relevant_file(&PathBuf::from("notes/today.md")));
        assert!(is_relevant_file(&PathBuf::from("inbox.txt")));
    }

    #[test]
    fn rejects_obsidian_bookkeeping() {
        assert!(!is_relevant_file(&PathBuf::from(".obsidian/workspace.json")));
        assert!(!is_relevant_file(&PathBuf::from(".trash/deleted.md")));
        assert!(!is_relevant_file(&PathBuf::from("templates/daily.md")));
    }

    #[test]
    fn rejects_other_extensions() {
        assert!(!is_relevant_file(&PathBuf::from("image.png")));
        assert!(!is_relevant_file(&PathBuf::from("README")));
    }

    #[test]
    fn ignore_patterns_exclude_matching_files() {
        let set = build_ignore_set(&["drafts/**".to_string(), "*.private.md".to_string()]);
        assert!(!is_indexable(&PathBuf::from("drafts/idea.md"), &set));
        assert!(!is_indexable(&PathBuf::from("journal.private.md"), &set));
        assert!(is_indexable(&PathBuf::from("notes/today.md"), &set));
    }

    #[test]
    fn invalid_glob_is_skipped_not_fatal() {
        let set = build_ignore_set(&["[".to_string()]);
        assert!(is_indexable(&PathBuf::from("notes/today.md"), &set));
    }
}
