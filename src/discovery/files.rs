//! Git-aware file discovery with parallel traversal.
//!
//! - Respects .gitignore automatically via the `ignore` crate
//! - Applies repoatlas.toml include/exclude patterns
//! - Filters out binary files, images, archives, etc.
//! - Returns deterministic (sorted) results
//!
//! Sorting matters: the same directory must yield the same ordering
//! across runs, both for reproducible maps and for stable cache keys.

use std::path::{Path, PathBuf};

use anyhow::Result;
use ignore::WalkBuilder;

use crate::config::Config;

/// File extensions excluded from discovery.
///
/// Binary and generated files would waste parsing cycles and pollute the
/// relevance graph with noise. Lock files are excluded because they
/// contain thousands of dependency entries with no structural signal.
const EXCLUDED_EXTENSIONS: &[&str] = &[
    // Images
    "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "bmp", "tiff",
    // Fonts
    "woff", "woff2", "ttf", "eot", "otf",
    // Media
    "mp3", "mp4", "wav", "ogg", "webm", "avi", "mov", "flac",
    // Archives
    "zip", "tar", "gz", "rar", "7z", "bz2", "xz", "tgz",
    // Documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    // Compiled/Binary
    "pyc", "pyo", "so", "dylib", "dll", "exe", "o", "a", "lib",
    "class", "jar", "war", "ear",
    // Lock files
    "lock", "sum",
    // Database files
    "db", "sqlite", "sqlite3", "redb",
    // Misc binary
    "wasm", "bin", "dat",
];

/// Find source files under a directory, respecting .gitignore and the
/// project's include/exclude patterns.
///
/// A single-file path passes straight through (if the config admits it).
/// Results are absolute paths, sorted for determinism.
pub fn find_source_files(directory: &Path, config: &Config) -> Result<Vec<PathBuf>> {
    if directory.is_file() {
        if config.should_include(directory) {
            return Ok(vec![directory.to_path_buf()]);
        }
        return Ok(vec![]);
    }

    if !directory.is_dir() {
        anyhow::bail!("path does not exist: {}", directory.display());
    }

    // Parallel walker; threads(0) auto-detects based on CPU count
    let walker = WalkBuilder::new(directory)
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .require_git(false)
        .follow_links(false)
        .threads(0)
        .build_parallel();

    let files = std::sync::Mutex::new(Vec::new());
    let dir_path = directory.to_path_buf();

    walker.run(|| {
        Box::new(|entry_result| {
            match entry_result {
                Ok(entry) => {
                    let path = entry.path();

                    if !path.is_file() {
                        return ignore::WalkState::Continue;
                    }

                    if is_excluded_by_extension(path) {
                        return ignore::WalkState::Continue;
                    }

                    // Pattern matching runs on the path relative to the
                    // walk root
                    let rel_path = path.strip_prefix(&dir_path).unwrap_or(path);
                    if !config.should_include(rel_path) {
                        return ignore::WalkState::Continue;
                    }

                    if let Ok(mut files) = files.lock() {
                        files.push(path.to_path_buf());
                    }

                    ignore::WalkState::Continue
                }
                // Skip entries we can't read (permissions, broken symlinks)
                Err(_) => ignore::WalkState::Continue,
            }
        })
    });

    let mut files = files
        .into_inner()
        .map_err(|_| anyhow::anyhow!("failed to unwrap discovery mutex"))?;
    files.sort();
    Ok(files)
}

/// Check if a file should be excluded based on its extension.
fn is_excluded_by_extension(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        if let Some(ext_str) = ext.to_str() {
            let ext_lower = ext_str.to_ascii_lowercase();
            return EXCLUDED_EXTENSIONS.contains(&ext_lower.as_str());
        }
    }
    false
}
