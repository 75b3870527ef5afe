//! The module graph: resolves `import` statements into a dependency graph,
//! loads and parses each module exactly once, detects import cycles, and
//! produces a dependency-first compilation order.
//!
//! Traversal is a classic tri-colour DFS (White = unvisited, Grey = on the
//! current path, Black = finished). A Grey node reached again is a cycle,
//! fatal for the importing module rather than for the whole graph, so
//! traversal continues past it once reported.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use monoc_common::diagnostics::{codes, DiagnosticSink, Severity};
use monoc_common::source::SourceProvider;
use monoc_parser::ast::{Module, Stmt};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// A single parsed module, keyed by its canonical source path.
pub struct LoadedModule {
    pub path: PathBuf,
    pub module: Module,
}

/// The full set of modules reachable from an entry file, plus the order in
/// which they must be processed so that every import target is compiled
/// before the module that imports it.
pub struct ModuleGraph {
    pub modules: FxHashMap<PathBuf, LoadedModule>,
    /// Dependency-first order. A cyclic edge is omitted from `order` at the
    /// point of detection; the modules involved still appear once each.
    pub order: Vec<PathBuf>,
}

impl ModuleGraph {
    pub fn get(&self, path: &Path) -> Option<&LoadedModule> {
        self.modules.get(path)
    }
}

/// Load `entry` and everything it (transitively) imports.
pub fn load_graph(entry: &Path, provider: &mut SourceProvider, sink: &mut DiagnosticSink) -> ModuleGraph {
    let mut modules = FxHashMap::default();
    let mut color = FxHashMap::default();
    let mut order = Vec::new();
    visit(entry, None, provider, sink, &mut modules, &mut color, &mut order);
    ModuleGraph { modules, order }
}

#[allow(clippy::too_many_arguments)]
fn visit(
    path: &Path,
    importer: Option<&PathBuf>,
    provider: &mut SourceProvider,
    sink: &mut DiagnosticSink,
    modules: &mut FxHashMap<PathBuf, LoadedModule>,
    color: &mut FxHashMap<PathBuf, Color>,
    order: &mut Vec<PathBuf>,
) {
    let canonical = match provider.load(path) {
        Ok(p) => p,
        Err(err) => {
            if let Some(importer_path) = importer {
                if let Some(source) = provider.get(importer_path) {
                    let file = importer_path.display().to_string();
                    sink.push_at(
                        Severity::Error,
                        codes::T_UNDEFINED_NAME,
                        file,
                        &source.line_index,
                        monoc_common::span::Span::point(0),
                        format!("Could not load module '{}': {err}", path.display()),
                    );
                }
            }
            return;
        }
    };

    match color.get(&canonical) {
        Some(Color::Black) => return,
        Some(Color::Grey) => {
            if let Some(importer_path) = importer {
                if let Some(source) = provider.get(importer_path) {
                    let file = importer_path.display().to_string();
                    sink.push_at(
                        Severity::Error,
                        codes::T_CYCLIC_IMPORT,
                        file,
                        &source.line_index,
                        monoc_common::span::Span::point(0),
                        format!("Import cycle detected: '{}' imports back into itself", canonical.display()),
                    );
                }
            }
            return;
        }
        _ => {}
    }

    color.insert(canonical.clone(), Color::Grey);

    let text = provider.get(&canonical).expect("just loaded").text.clone();
    let file_name = canonical.display().to_string();
    let parsed = monoc_parser::parse(&text, &file_name);
    for diagnostic in parsed.diagnostics {
        sink.push(diagnostic);
    }

    for stmt in &parsed.module.stmts {
        if let Stmt::Import(import) = stmt {
            let target = SourceProvider::resolve_import(&canonical, &import.source_path);
            visit(&target, Some(&canonical), provider, sink, modules, color, order);
        }
    }

    color.insert(canonical.clone(), Color::Black);
    order.push(canonical.clone());
    modules.insert(canonical.clone(), LoadedModule { path: canonical, module: parsed.module });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_a_single_module_with_no_imports() {
        let dir = tempfile::tempdir().unwrap();
        let entry = write(dir.path(), "main.ml", "let x = 1;");
        let mut provider = SourceProvider::new();
        let mut sink = DiagnosticSink::new();
        let graph = load_graph(&entry, &mut provider, &mut sink);
        assert!(!sink.has_errors());
        assert_eq!(graph.order.len(), 1);
    }

    #[test]
    fn orders_dependencies_before_dependents() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "util.ml", "let helper = 1;");
        let entry = write(dir.path(), "main.ml", r#"import helper from "util.ml";"#);
        let mut provider = SourceProvider::new();
        let mut sink = DiagnosticSink::new();
        let graph = load_graph(&entry, &mut provider, &mut sink);
        assert!(!sink.has_errors());
        assert_eq!(graph.order.len(), 2);
        assert!(graph.order[0].ends_with("util.ml"));
        assert!(graph.order[1].ends_with("main.ml"));
    }

    #[test]
    fn detects_a_two_module_import_cycle() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.ml", r#"import b from "b.ml";"#);
        let entry = write(dir.path(), "b.ml", r#"import a from "a.ml";"#);
        let mut provider = SourceProvider::new();
        let mut sink = DiagnosticSink::new();
        let _graph = load_graph(&entry, &mut provider, &mut sink);
        assert!(sink.has_errors());
        assert!(sink.render_all().iter().any(|d| d.contains("T300")));
    }
}
