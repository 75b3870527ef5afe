//! The source provider: reads source text and owns file buffers keyed by
//! canonical path.
//!
//! Paths are canonicalized on first access so that two different spellings
//! of the same file (`./a.ml` vs `a.ml`) resolve to the same cache entry,
//! which [`crate::module_graph`]'s cycle detection and reuse logic depend on.

use std::collections::hash_map::Entry;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::span::LineIndex;

/// A single cached source file: its canonical path, text, and derived line
/// index.
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    pub line_index: LineIndex,
}

/// Owns every source buffer read during one compile.
///
/// Sources are loaded once per compile and released when the provider is
/// dropped at the end of the compile.
#[derive(Default)]
pub struct SourceProvider {
    files: FxHashMap<PathBuf, SourceFile>,
}

impl SourceProvider {
    pub fn new() -> Self {
        Self { files: FxHashMap::default() }
    }

    /// Read and cache the file at `path`, returning its canonical path.
    ///
    /// If the path was already loaded (same canonical path), the cached
    /// buffer is reused rather than re-read.
    pub fn load(&mut self, path: &Path) -> io::Result<PathBuf> {
        let canonical = fs::canonicalize(path)?;
        if let Entry::Vacant(entry) = self.files.entry(canonical.clone()) {
            let text = fs::read_to_string(&canonical)?;
            let line_index = LineIndex::new(&text);
            entry.insert(SourceFile { path: canonical.clone(), text, line_index });
        }
        Ok(canonical)
    }

    pub fn get(&self, canonical_path: &Path) -> Option<&SourceFile> {
        self.files.get(canonical_path)
    }

    /// Resolve `import_path` (as written in an `import` statement in
    /// `from_file`) relative to the importing file's directory, or verbatim
    /// if it is already absolute.
    pub fn resolve_import(from_file: &Path, import_path: &str) -> PathBuf {
        let candidate = Path::new(import_path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            let base = from_file.parent().unwrap_or_else(|| Path::new("."));
            base.join(candidate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn resolve_import_relative_to_importer() {
        let from = Path::new("/project/src/main.ml");
        let resolved = SourceProvider::resolve_import(from, "util.ml");
        assert_eq!(resolved, Path::new("/project/src/util.ml"));
    }

    #[test]
    fn resolve_import_absolute_path_is_verbatim() {
        let from = Path::new("/project/src/main.ml");
        let resolved = SourceProvider::resolve_import(from, "/lib/util.ml");
        assert_eq!(resolved, Path::new("/lib/util.ml"));
    }

    #[test]
    fn load_caches_by_canonical_path() {
        let dir = tempfile_dir();
        let file_path = dir.join("a.ml");
        File::create(&file_path).unwrap().write_all(b"let x = 1;").unwrap();

        let mut provider = SourceProvider::new();
        let canonical1 = provider.load(&file_path).unwrap();
        let canonical2 = provider.load(&file_path).unwrap();
        assert_eq!(canonical1, canonical2);
        assert_eq!(provider.get(&canonical1).unwrap().text, "let x = 1;");
    }

    fn tempfile_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "monoc-source-provider-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
