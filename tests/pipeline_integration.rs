//! Cross-module integration tests that don't require a spawnable language
//! server: project walking, persistence, and the documentation loop
//! exercised together against a real (temp-file) SQLite database.

use std::fs;
use std::path::{Path, PathBuf};

use codedoc_pipeline::config::PipelineConfig;
use codedoc_pipeline::llm::EchoBackend;
use codedoc_pipeline::model::{CallEdge, FileRecord, Folder, KindEnum, Position, Range, Symbol};
use codedoc_pipeline::orchestrator;
use codedoc_pipeline::store::Store;
use codedoc_pipeline::walker;

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn folder(id: u64, files: Vec<u64>) -> Folder {
    Folder {
        id,
        name: "proj".to_string(),
        abs_root: PathBuf::from("/proj"),
        subfolders: Vec::new(),
        files,
        parent: None,
        languages: Default::default(),
    }
}

fn file(id: u64, rel: &str) -> FileRecord {
    FileRecord { id, rel_path: rel.to_string(), language: "python".to_string(), project_root: PathBuf::from("/proj"), symbols: Vec::new() }
}

fn function_symbol(id: u64, name: &str, file_id: u64) -> Symbol {
    Symbol {
        id,
        name: name.to_string(),
        kind: KindEnum::Function,
        file_id,
        range: Range::new(Position::new(0, 0), Position::new(1, 0)),
        selection_range: Range::new(Position::new(0, 4), Position::new(0, 4 + name.len() as u32)),
        parent_id: None,
        children: Vec::new(),
        docstring: None,
        summary: None,
        documentation: None,
        documented: false,
    }
}

#[test]
fn walker_discovers_extractable_files_and_skips_defaults() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("pkg/a.py"), "def f():\n    pass\n");
    write(&dir.path().join("node_modules/dep/index.js"), "module.exports = {};\n");
    write(&dir.path().join("README.md"), "hello\n");

    let config = PipelineConfig::default();
    let result = walker::walk(dir.path(), &config);

    assert_eq!(result.files.len(), 1);
    assert_eq!(result.files[0].rel_path, "pkg/a.py");
    assert_eq!(result.files[0].language, "python");
    assert_eq!(result.skipped, 1);
}

#[test]
fn documentation_loop_drains_leaves_before_their_callers() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(&dir.path().join("proj.db")).unwrap();

    let folders = vec![folder(0, vec![0])];
    let files = vec![file(0, "a.py")];
    // `g` calls `f`; `f` has no outgoing calls and must be documented first.
    let symbols = vec![function_symbol(0, "g", 0), function_symbol(1, "f", 0)];
    let edges = vec![CallEdge { caller: 0, callee: 1 }];
    store.persist_run("proj", Path::new("/proj"), &folders, &files, &symbols, &edges).unwrap();

    let backend = EchoBackend;
    let documented = orchestrator::document_pending(&mut store, &backend, None).unwrap();

    assert_eq!(documented, 2);
    assert!(store.next_symbol_to_document().unwrap().is_none());
}

#[test]
fn documentation_loop_respects_a_budget() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(&dir.path().join("proj.db")).unwrap();

    let folders = vec![folder(0, vec![0])];
    let files = vec![file(0, "a.py")];
    let symbols = vec![function_symbol(0, "a", 0), function_symbol(1, "b", 0), function_symbol(2, "c", 0)];
    store.persist_run("proj", Path::new("/proj"), &folders, &files, &symbols, &[]).unwrap();

    let backend = EchoBackend;
    let documented = orchestrator::document_pending(&mut store, &backend, Some(1)).unwrap();

    assert_eq!(documented, 1);
    assert!(store.next_symbol_to_document().unwrap().is_some());
}
