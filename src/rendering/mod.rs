//! Output rendering - from selected tags to the final map text.
//!
//! Groups tags by file, merges nearby line spans into collapsed blocks
//! with an ellipsis marker, and emits a path header per file.

mod tree;

pub use tree::{default_text_reader, TextReader, TreeRenderer};
