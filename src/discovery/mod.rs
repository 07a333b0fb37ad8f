//! Git-aware file discovery.
//!
//! Uses the `ignore` crate to respect .gitignore and walk directories
//! efficiently. Feeds the CLI's `other_files` list; the engine itself
//! never walks directories.

mod files;

pub use files::find_source_files;
