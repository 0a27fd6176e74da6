use crate::ast::Ast;
use crate::check;
use crate::error::{Error, Reporter};
use crate::errors as err;
use crate::parser;
use crate::text::{self, TextLocation, TextOffset, TextRange};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

id_impl!(FileID);

#[derive(Copy, Clone, PartialEq)]
pub enum FileKind {
    Source,
    Package,
    Unknown,
}

pub struct SourceFile {
    pub path: PathBuf,
    pub kind: FileKind,
    pub version: i32,
    pub source: String,
    pub line_ranges: Vec<TextRange>,
}

impl SourceFile {
    fn new(path: PathBuf, kind: FileKind, source: String) -> SourceFile {
        let line_ranges = text::find_line_ranges(&source);
        SourceFile { path, kind, version: 0, source, line_ranges }
    }

    pub fn set_source(&mut self, source: String) {
        self.line_ranges = text::find_line_ranges(&source);
        self.source = source;
    }

    pub fn location(&self, offset: TextOffset) -> TextLocation {
        text::find_location(offset, &self.line_ranges)
    }
    pub fn offset_at(&self, line: u32, character: u32) -> TextOffset {
        text::offset_at(&self.line_ranges, line, character)
    }
}

#[derive(Default)]
pub struct SessionStats {
    pub check_count: u32,
}

/// Compilation context. Owns the registered source set, the packages and
/// search paths, the diagnostics reporter and the tree of the last
/// analysis. The front-end is not incremental: any mutation marks the
/// context dirty and the next `check()` re-runs analysis over every
/// registered file.
pub struct Session {
    files: Vec<SourceFile>,
    paths: FxHashMap<PathBuf, FileID>,
    packages: Vec<String>,
    vapi_dirs: Vec<PathBuf>,
    c_sources: Vec<PathBuf>,
    usings: Vec<String>,
    dirty: bool,
    reporter: Reporter,
    ast: Option<Ast>,
    pub stats: SessionStats,
}

impl Session {
    pub fn new() -> Session {
        Session {
            files: Vec::with_capacity(32),
            paths: FxHashMap::default(),
            packages: Vec::new(),
            vapi_dirs: Vec::new(),
            c_sources: Vec::new(),
            usings: Vec::new(),
            dirty: true,
            reporter: Reporter::new(),
            ast: None,
            stats: SessionStats::default(),
        }
    }

    //==================== MUTATORS ====================

    /// Registers a file, or refreshes content and kind of an already
    /// registered path. Returns its id either way.
    #[must_use]
    pub fn add_source_file(&mut self, path: PathBuf, kind: FileKind, source: String) -> FileID {
        self.dirty = true;
        if let Some(&file_id) = self.paths.get(&path) {
            let file = &mut self.files[file_id.index()];
            file.kind = kind;
            file.set_source(source);
            file_id
        } else {
            let file_id = FileID::new(self.files.len());
            self.paths.insert(path.clone(), file_id);
            self.files.push(SourceFile::new(path, kind, source));
            file_id
        }
    }

    /// Resolves `<name>.vapi` against the vapi directories and registers
    /// it. Duplicate names are ignored. Returns false when no interface
    /// file was found.
    pub fn add_package(&mut self, name: &str) -> bool {
        if self.packages.iter().any(|p| p == name) {
            return true;
        }
        let found = self
            .vapi_dirs
            .iter()
            .map(|dir| dir.join(format!("{name}.vapi")))
            .find_map(|path| std::fs::read_to_string(&path).ok().map(|source| (path, source)));
        match found {
            Some((path, source)) => {
                let _ = self.add_source_file(path, FileKind::Package, source);
                self.packages.push(name.to_string());
                true
            }
            None => false,
        }
    }

    pub fn add_vapidir(&mut self, path: PathBuf) {
        if !self.vapi_dirs.contains(&path) {
            self.vapi_dirs.push(path);
            self.dirty = true;
        }
    }

    pub fn add_c_source_file(&mut self, path: PathBuf) {
        if !self.c_sources.contains(&path) {
            self.c_sources.push(path);
            self.dirty = true;
        }
    }

    /// Namespace applied as an implicit using directive to every file.
    pub fn add_using(&mut self, namespace: &str) {
        if !self.usings.iter().any(|u| u == namespace) {
            self.usings.push(namespace.to_string());
            self.dirty = true;
        }
    }

    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.paths.clear();
        self.packages.clear();
        self.vapi_dirs.clear();
        self.c_sources.clear();
        self.usings.clear();
        self.reporter.reset();
        self.ast = None;
        self.dirty = true;
    }

    /// Re-runs the front-end over the whole source set when dirty.
    /// Analysis is best-effort: parse errors are reported and recovery
    /// keeps going, so a partial tree is available even on failure.
    pub fn check(&mut self) {
        if !self.dirty && self.ast.is_some() {
            return;
        }
        self.reporter.reset();
        let mut ast = Ast::new();
        for index in 0..self.files.len() {
            let file_id = FileID::new(index);
            let source = &self.files[index].source;
            let _ = parser::parse_file(&mut ast, &mut self.reporter, file_id, source);
        }
        check::run(&mut ast, &mut self.reporter, &self.usings);
        self.ast = Some(ast);
        self.dirty = false;
        self.stats.check_count += 1;
    }

    //==================== ACCESSORS ====================

    #[inline]
    pub fn dirty(&self) -> bool {
        self.dirty
    }
    #[inline]
    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }
    #[inline]
    pub fn ast(&self) -> Option<&Ast> {
        self.ast.as_ref()
    }
    #[inline]
    pub fn file(&self, file_id: FileID) -> &SourceFile {
        &self.files[file_id.index()]
    }
    #[inline]
    pub fn file_mut(&mut self, file_id: FileID) -> &mut SourceFile {
        &mut self.files[file_id.index()]
    }
    pub fn file_by_path(&self, path: &Path) -> Option<FileID> {
        self.paths.get(path).copied()
    }
    pub fn file_ids(&self) -> impl Iterator<Item = FileID> {
        (0..self.files.len()).map(FileID::new)
    }
    pub fn files(&self) -> impl Iterator<Item = (FileID, &SourceFile)> {
        self.files.iter().enumerate().map(|(index, file)| (FileID::new(index), file))
    }
    pub fn file_paths(&self) -> Vec<&Path> {
        self.files.iter().map(|file| file.path.as_path()).collect()
    }
    pub fn packages(&self) -> &[String] {
        &self.packages
    }
    pub fn c_sources(&self) -> &[PathBuf] {
        &self.c_sources
    }
}

impl Default for Session {
    fn default() -> Session {
        Session::new()
    }
}

//==================== PROJECT MANIFEST ====================

#[derive(Deserialize)]
pub struct ProjectManifest {
    pub project: ProjectConfig, // table key [project]
}

#[derive(Default, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub vapi_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub c_sources: Vec<PathBuf>,
    #[serde(default)]
    pub usings: Vec<String>,
}

pub fn manifest_deserialize(manifest: &str, path: &Path) -> Result<ProjectManifest, Error> {
    basic_toml::from_str(manifest).map_err(|error| err::manifest_parse(error.to_string(), path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_coalesces_edits() {
        let mut session = Session::new();
        let file_id = session.add_source_file(
            PathBuf::from("/test/main.vala"),
            FileKind::Source,
            "int x = 3;\n".into(),
        );
        assert!(session.dirty());
        session.check();
        assert!(!session.dirty());
        assert_eq!(session.stats.check_count, 1);

        // a burst of edits costs a single analysis
        session.file_mut(file_id).set_source("int x = 4;\n".into());
        session.invalidate();
        session.file_mut(file_id).set_source("int x = 5;\n".into());
        session.invalidate();
        session.check();
        session.check();
        assert_eq!(session.stats.check_count, 2);
    }

    #[test]
    fn reporter_resets_per_cycle() {
        let mut session = Session::new();
        let file_id = session.add_source_file(
            PathBuf::from("/test/main.vala"),
            FileKind::Source,
            "void main () {\n    missing = 1;\n}\n".into(),
        );
        session.check();
        assert_eq!(session.reporter().errors().len(), 1);

        session.file_mut(file_id).set_source("void main () {\n}\n".into());
        session.invalidate();
        session.check();
        assert!(session.reporter().errors().is_empty());
    }

    #[test]
    fn add_source_file_refreshes_existing_path() {
        let mut session = Session::new();
        let first = session.add_source_file(
            PathBuf::from("/test/a.vala"),
            FileKind::Source,
            "int a = 1;\n".into(),
        );
        let second = session.add_source_file(
            PathBuf::from("/test/a.vala"),
            FileKind::Source,
            "int b = 2;\n".into(),
        );
        assert_eq!(first, second);
        assert_eq!(session.file(first).source, "int b = 2;\n");
    }

    #[test]
    fn manifest_parses() {
        let manifest = manifest_deserialize(
            "[project]\npackages = [\"glib-2.0\"]\nusings = [\"GLib\"]\n",
            Path::new("/test/vala-project.toml"),
        )
        .unwrap();
        assert_eq!(manifest.project.packages, vec!["glib-2.0"]);
        assert_eq!(manifest.project.usings, vec!["GLib"]);
    }

    #[test]
    fn clear_drops_all_state() {
        let mut session = Session::new();
        let _ = session.add_source_file(
            PathBuf::from("/test/main.vala"),
            FileKind::Source,
            "int x = 3;\n".into(),
        );
        session.check();
        session.clear();
        assert!(session.ast().is_none());
        assert_eq!(session.file_ids().count(), 0);
    }
}
