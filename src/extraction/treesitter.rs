//! Tree-sitter based tag extraction with .scm query support.
//!
//! Grammar-aware extraction using tree-sitter queries. The query files
//! use a capture naming convention that encodes both the tag kind and the
//! node type:
//!
//! - `@name.definition.class` - class/struct name node
//! - `@definition.class` - entire class node (supplies the line span)
//! - `@name.definition.function` - function name node
//! - `@name.reference.call` - call-site name node
//!
//! A name used in a position the grammar does not recognize as a
//! definition surfaces as a reference, which matches the extraction
//! contract for ambiguous constructs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Parser as TsParser, Query, QueryCursor};

use crate::extraction::Extractor;
use crate::types::{Tag, TagKind};

/// Embedded query files - compiled into the binary
mod queries {
    pub const PYTHON: &str = include_str!("../../queries/python-tags.scm");
    pub const RUST: &str = include_str!("../../queries/rust-tags.scm");
    pub const JAVASCRIPT: &str = include_str!("../../queries/javascript-tags.scm");
    pub const TYPESCRIPT: &str = include_str!("../../queries/typescript-tags.scm");
    pub const GO: &str = include_str!("../../queries/go-tags.scm");
}

/// Language configuration with grammar and query
struct LangConfig {
    language: Language,
    query: Query,
}

/// Get tree-sitter language by name
fn get_language(name: &str) -> Option<Language> {
    match name {
        "python" => Some(tree_sitter_python::LANGUAGE.into()),
        "rust" => Some(tree_sitter_rust::LANGUAGE.into()),
        "javascript" | "jsx" => Some(tree_sitter_javascript::LANGUAGE.into()),
        "typescript" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "tsx" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "go" => Some(tree_sitter_go::LANGUAGE.into()),
        _ => None,
    }
}

/// Get query source for a language
fn get_query_source(name: &str) -> Option<&'static str> {
    match name {
        "python" => Some(queries::PYTHON),
        "rust" => Some(queries::RUST),
        "javascript" | "jsx" => Some(queries::JAVASCRIPT),
        "typescript" | "tsx" => Some(queries::TYPESCRIPT),
        "go" => Some(queries::GO),
        _ => None,
    }
}

/// Map file extension to language name
pub fn extension_to_language(ext: &str) -> Option<&'static str> {
    match ext {
        "py" | "pyi" | "pyw" => Some("python"),
        "rs" => Some("rust"),
        "js" | "mjs" | "cjs" | "jsx" => Some("javascript"),
        "ts" | "mts" | "cts" => Some("typescript"),
        "tsx" => Some("tsx"),
        "go" => Some("go"),
        _ => None,
    }
}

/// Cached language configurations
static LANG_CONFIGS: Lazy<HashMap<&'static str, LangConfig>> = Lazy::new(|| {
    let mut configs = HashMap::new();

    for lang_name in &["python", "rust", "javascript", "typescript", "tsx", "go"] {
        if let (Some(language), Some(query_src)) =
            (get_language(lang_name), get_query_source(lang_name))
        {
            // Skip languages whose query fails to compile (query syntax
            // might not match the grammar version)
            match Query::new(&language, query_src) {
                Ok(query) => {
                    configs.insert(*lang_name, LangConfig { language, query });
                }
                Err(e) => {
                    tracing::warn!("failed to compile tag query for {lang_name}: {e}");
                }
            }
        }
    }

    configs
});

thread_local! {
    /// Per-thread parser instance (tree-sitter parsers are not thread-safe)
    static TS_PARSER: RefCell<TsParser> = RefCell::new(TsParser::new());
}

/// Grammar-based extractor backed by tree-sitter queries.
pub struct TreeSitterExtractor;

impl TreeSitterExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Check if a language has a compiled grammar + query pair.
    pub fn supports_language(lang: &str) -> bool {
        LANG_CONFIGS.contains_key(lang)
    }

    fn language_for_path(path: &Path) -> Option<&'static str> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        extension_to_language(ext)
    }

    fn run_query(config: &LangConfig, content: &str, fname: &str, rel_fname: &str) -> Vec<Tag> {
        let parsed = TS_PARSER.with(|p| {
            let mut parser = p.borrow_mut();
            if parser.set_language(&config.language).is_err() {
                return None;
            }
            parser.parse(content, None)
        });
        let tree = match parsed {
            Some(t) => t,
            None => return Vec::new(),
        };

        let rel: Arc<str> = Arc::from(rel_fname);
        let abs: Arc<str> = Arc::from(fname);

        let mut tags = Vec::new();
        let mut cursor = QueryCursor::new();
        let capture_names = config.query.capture_names();

        let mut matches = cursor.matches(&config.query, tree.root_node(), content.as_bytes());
        while let Some(m) = matches.next() {
            let mut name: Option<String> = None;
            let mut node_type: Option<&'static str> = None;
            let mut kind: Option<TagKind> = None;
            let mut line_start: Option<u32> = None;
            let mut line_end: Option<u32> = None;

            for capture in m.captures {
                let capture_name = capture_names
                    .get(capture.index as usize)
                    .copied()
                    .unwrap_or("");
                let node = capture.node;

                if let Some(rest) = capture_name.strip_prefix("name.") {
                    name = node
                        .utf8_text(content.as_bytes())
                        .ok()
                        .map(|s| s.to_string());
                    if line_start.is_none() {
                        line_start = Some(node.start_position().row as u32 + 1);
                    }
                    if rest.starts_with("definition.") {
                        kind = Some(TagKind::Def);
                    } else if rest.starts_with("reference.") {
                        kind = Some(TagKind::Ref);
                    }
                    node_type = Some(node_type_from_capture(rest));
                } else {
                    // Enclosing @definition.* / @reference.* capture:
                    // supplies the construct's full line span
                    line_start = Some(node.start_position().row as u32 + 1);
                    line_end = Some(node.end_position().row as u32 + 1);
                }
            }

            let (Some(name), Some(node_type), Some(kind), Some(line_start)) =
                (name, node_type, kind, line_start)
            else {
                continue;
            };

            // Skip empty or non-identifier noise
            if name.is_empty() {
                continue;
            }

            let line_end = line_end.unwrap_or(line_start).max(line_start);
            // References span only their own line regardless of the
            // enclosing expression
            let (line_start, line_end) = match kind {
                TagKind::Def => (line_start, line_end),
                TagKind::Ref => (line_start, line_start),
            };

            tags.push(Tag {
                rel_fname: Arc::clone(&rel),
                fname: Arc::clone(&abs),
                name: Arc::from(name.as_str()),
                kind,
                line_start,
                line_end,
                node_type: Arc::from(node_type),
            });
        }

        tags
    }
}

impl Default for TreeSitterExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for TreeSitterExtractor {
    fn name(&self) -> &'static str {
        "tree-sitter"
    }

    fn can_handle(&self, path: &Path) -> bool {
        Self::language_for_path(path)
            .map(Self::supports_language)
            .unwrap_or(false)
    }

    fn extract(&self, text: &str, fname: &str, rel_fname: &str) -> Vec<Tag> {
        let Some(lang) = Self::language_for_path(Path::new(fname)) else {
            return Vec::new();
        };
        let Some(config) = LANG_CONFIGS.get(lang) else {
            return Vec::new();
        };
        Self::run_query(config, text, fname, rel_fname)
    }
}

/// Node type from the capture-name suffix: "definition.class" -> "class"
fn node_type_from_capture(rest: &str) -> &'static str {
    if rest.ends_with(".class") {
        "class"
    } else if rest.ends_with(".function") {
        "function"
    } else if rest.ends_with(".method") {
        "method"
    } else if rest.ends_with(".call") {
        "call"
    } else if rest.ends_with(".interface") {
        "interface"
    } else if rest.ends_with(".module") {
        "module"
    } else if rest.ends_with(".macro") {
        "macro"
    } else {
        "symbol"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_mapping() {
        assert_eq!(extension_to_language("py"), Some("python"));
        assert_eq!(extension_to_language("rs"), Some("rust"));
        assert_eq!(extension_to_language("js"), Some("javascript"));
        assert_eq!(extension_to_language("ts"), Some("typescript"));
        assert_eq!(extension_to_language("go"), Some("go"));
        assert_eq!(extension_to_language("unknown"), None);
    }

    #[test]
    fn test_python_extraction() {
        let extractor = TreeSitterExtractor::new();
        let code = r#"
class MyClass:
    def method(self):
        pass

def standalone_function():
    return 42

standalone_function()
"#;
        let tags = extractor.extract(code, "/test.py", "test.py");

        let defs: Vec<&str> = tags
            .iter()
            .filter(|t| t.is_def())
            .map(|t| t.name.as_ref())
            .collect();
        assert!(defs.contains(&"MyClass"), "should find MyClass, got {defs:?}");
        assert!(defs.contains(&"method"), "should find method, got {defs:?}");
        assert!(defs.contains(&"standalone_function"));

        let refs: Vec<&str> = tags
            .iter()
            .filter(|t| t.is_ref())
            .map(|t| t.name.as_ref())
            .collect();
        assert!(
            refs.contains(&"standalone_function"),
            "call should be a ref, got {refs:?}"
        );
    }

    #[test]
    fn test_python_definition_span() {
        let extractor = TreeSitterExtractor::new();
        let code = "def multi():\n    a = 1\n    return a\n";
        let tags = extractor.extract(code, "/test.py", "test.py");

        let def = tags
            .iter()
            .find(|t| t.is_def() && t.name.as_ref() == "multi")
            .expect("def tag");
        assert_eq!(def.line_start, 1);
        assert!(def.line_end >= 3, "span should cover the body, got {}", def.line_end);
    }

    #[test]
    fn test_rust_extraction() {
        let extractor = TreeSitterExtractor::new();
        let code = r#"
struct MyStruct {
    field: i32,
}

impl MyStruct {
    fn new() -> Self {
        Self { field: 0 }
    }
}

fn standalone() {
    helper();
}
"#;
        let tags = extractor.extract(code, "/test.rs", "test.rs");

        let names: Vec<&str> = tags.iter().map(|t| t.name.as_ref()).collect();
        assert!(names.contains(&"MyStruct"), "should find MyStruct, got {names:?}");
        assert!(names.contains(&"new"), "should find new");
        assert!(names.contains(&"standalone"), "should find standalone");
        assert!(
            tags.iter().any(|t| t.is_ref() && t.name.as_ref() == "helper"),
            "helper call should be a ref"
        );
    }

    #[test]
    fn test_typescript_extraction() {
        let extractor = TreeSitterExtractor::new();
        let code = r#"
export interface Shape {
    area(): number;
}

class Circle {
    radius: number;
    area() { return 3.14 * this.radius * this.radius; }
}

function describe(s: Shape) {
    console.log(s.area());
}
"#;
        let tags = extractor.extract(code, "/test.ts", "test.ts");

        let names: Vec<&str> = tags
            .iter()
            .filter(|t| t.is_def())
            .map(|t| t.name.as_ref())
            .collect();
        assert!(names.contains(&"Shape"), "should find Shape, got {names:?}");
        assert!(names.contains(&"Circle"));
        assert!(names.contains(&"describe"));
    }

    #[test]
    fn test_go_extraction() {
        let extractor = TreeSitterExtractor::new();
        let code = r#"
package main

type Server struct {
    addr string
}

func (s *Server) Listen() error {
    return serve(s.addr)
}

func main() {
    s := Server{}
    s.Listen()
}
"#;
        let tags = extractor.extract(code, "/test.go", "test.go");

        let names: Vec<&str> = tags.iter().map(|t| t.name.as_ref()).collect();
        assert!(names.contains(&"Server"), "should find Server, got {names:?}");
        assert!(names.contains(&"Listen"), "should find Listen");
        assert!(names.contains(&"main"), "should find main");
    }

    #[test]
    fn test_unsupported_extension() {
        let extractor = TreeSitterExtractor::new();
        assert!(!extractor.can_handle(Path::new("notes.txt")));
        assert!(extractor.extract("content", "/notes.txt", "notes.txt").is_empty());
    }
}
