//! Store Adapter (C7): persists a single run's folder/file/symbol/call-graph
//! to SQLite in one transaction, and serves the "next symbol to document"
//! view back to the LLM Driver.
//!
//! Table and column names follow the original project's schema
//! (`Language`, `Folder`, `File`, `Symbol`, `SymbolRelationship`,
//! `ProjectData`) so the persisted shape is recognizable to anyone who
//! worked with the source this pipeline was distilled from.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::StoreError;
use crate::model::{CallEdge, FileRecord, Folder, KindEnum, Symbol, SymbolId};

/// A handle on the run's SQLite database.
pub struct Store {
    conn: Connection,
}

/// Everything the LLM Driver needs to produce documentation for one symbol,
/// without it having to know the store's schema.
#[derive(Debug, Clone)]
pub struct SymbolContext {
    /// Database row id (used to write the result back).
    pub symbol_db_id: i64,
    /// Symbol name.
    pub name: String,
    /// Symbol kind, as its serde name (e.g. `"function"`).
    pub kind: String,
    /// Language of the owning file, if known.
    pub language: Option<String>,
    /// Names of symbols this symbol calls.
    pub callees: Vec<String>,
    /// Names of symbols that call this symbol.
    pub callers: Vec<String>,
}

impl Store {
    /// Opens (creating if necessary) the database file at `path` and
    /// ensures the schema exists.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the file can't be opened or the schema
    /// can't be created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Store { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS Language (
                id   INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS Folder (
                id        INTEGER PRIMARY KEY,
                name      TEXT NOT NULL,
                path      TEXT NOT NULL,
                parent_id INTEGER REFERENCES Folder(id)
            );

            CREATE TABLE IF NOT EXISTS File (
                id          INTEGER PRIMARY KEY,
                path        TEXT NOT NULL,
                documented  INTEGER NOT NULL DEFAULT 0,
                documentation TEXT,
                folder_id   INTEGER NOT NULL REFERENCES Folder(id),
                language_id INTEGER REFERENCES Language(id)
            );

            CREATE TABLE IF NOT EXISTS Symbol (
                id              INTEGER PRIMARY KEY,
                name            TEXT NOT NULL,
                kind            TEXT NOT NULL,
                detail          TEXT,
                documentation   TEXT,
                docstring       TEXT,
                summary         TEXT,
                selection_range TEXT NOT NULL,
                range           TEXT NOT NULL,
                documented      INTEGER NOT NULL DEFAULT 0,
                file_id         INTEGER NOT NULL REFERENCES File(id),
                parent_id       INTEGER REFERENCES Symbol(id)
            );

            CREATE TABLE IF NOT EXISTS SymbolRelationship (
                caller_id INTEGER NOT NULL REFERENCES Symbol(id),
                called_id INTEGER NOT NULL REFERENCES Symbol(id),
                UNIQUE(caller_id, called_id)
            );

            CREATE TABLE IF NOT EXISTS ProjectData (
                id            INTEGER PRIMARY KEY,
                scan_complete INTEGER NOT NULL DEFAULT 0,
                scan_date     TEXT,
                scan_hash     TEXT,
                project_name  TEXT NOT NULL,
                project_path  TEXT NOT NULL,
                entry_point   INTEGER REFERENCES Folder(id)
            );

            CREATE VIEW IF NOT EXISTS view_next_symbol_to_document AS
            SELECT s.*,
                   (SELECT COUNT(*) FROM SymbolRelationship r WHERE r.caller_id = s.id) AS outgoing_calls
            FROM Symbol s
            WHERE s.documented = 0
            ORDER BY outgoing_calls ASC, s.id ASC;
            ",
        )?;
        Ok(())
    }

    /// Persists one run's folder/file/symbol/call-edge set as a single
    /// transaction. Idempotent on `Language` names; everything else is a
    /// fresh insert (a run always starts from an empty or freshly-created
    /// database per the reuse/erase prompt at the CLI boundary).
    ///
    /// # Errors
    /// Returns [`StoreError::MissingProjectName`] if `project_name` is
    /// empty, or [`StoreError::Sqlite`] on any persistence failure; the
    /// transaction is rolled back in either case.
    pub fn persist_run(
        &mut self,
        project_name: &str,
        project_root: &Path,
        folders: &[Folder],
        files: &[FileRecord],
        symbols: &[Symbol],
        edges: &[CallEdge],
    ) -> Result<(), StoreError> {
        if project_name.is_empty() {
            return Err(StoreError::MissingProjectName);
        }

        let tx = self.conn.transaction()?;
        let mut language_db_id: HashMap<String, i64> = HashMap::new();
        let mut folder_db_id: HashMap<u64, i64> = HashMap::new();
        let mut file_db_id: HashMap<u64, i64> = HashMap::new();
        let mut symbol_db_id: HashMap<SymbolId, i64> = HashMap::new();

        // Folders are already ordered so a parent always precedes its
        // children (see walker::ensure_folder).
        for folder in folders {
            let parent = folder.parent.and_then(|p| folder_db_id.get(&p).copied());
            tx.execute(
                "INSERT INTO Folder (name, path, parent_id) VALUES (?1, ?2, ?3)",
                params![folder.name, folder.abs_root.to_string_lossy().into_owned(), parent],
            )?;
            folder_db_id.insert(folder.id, tx.last_insert_rowid());
        }

        for file in files {
            let language_id = insert_language(&tx, &mut language_db_id, &file.language)?;
            let Some(&folder_id) = folders
                .iter()
                .find(|f| f.files.contains(&file.id))
                .and_then(|f| folder_db_id.get(&f.id))
            else {
                continue;
            };
            tx.execute(
                "INSERT INTO File (path, documented, folder_id, language_id) VALUES (?1, 0, ?2, ?3)",
                params![file.rel_path, folder_id, language_id],
            )?;
            file_db_id.insert(file.id, tx.last_insert_rowid());
        }

        for symbol in symbols {
            let Some(&file_id) = file_db_id.get(&symbol.file_id) else { continue };
            let range_json = serde_json::to_string(&symbol.range).unwrap_or_default();
            let selection_json = serde_json::to_string(&symbol.selection_range).unwrap_or_default();
            tx.execute(
                "INSERT INTO Symbol
                    (name, kind, docstring, summary, documentation, selection_range, range, documented, file_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    symbol.name,
                    kind_name(symbol.kind),
                    symbol.docstring,
                    symbol.summary,
                    symbol.documentation.as_ref().map(ToString::to_string),
                    selection_json,
                    range_json,
                    symbol.documented as i64,
                    file_id,
                ],
            )?;
            symbol_db_id.insert(symbol.id, tx.last_insert_rowid());
        }

        for symbol in symbols {
            let (Some(&child_db), Some(parent)) = (symbol_db_id.get(&symbol.id), symbol.parent_id) else { continue };
            let Some(&parent_db) = symbol_db_id.get(&parent) else { continue };
            tx.execute("UPDATE Symbol SET parent_id = ?1 WHERE id = ?2", params![parent_db, child_db])?;
        }

        for edge in edges {
            let (Some(&caller_db), Some(&callee_db)) = (symbol_db_id.get(&edge.caller), symbol_db_id.get(&edge.callee)) else {
                continue;
            };
            tx.execute(
                "INSERT OR IGNORE INTO SymbolRelationship (caller_id, called_id) VALUES (?1, ?2)",
                params![caller_db, callee_db],
            )?;
        }

        let root_folder_db = folders.iter().find(|f| f.is_root()).and_then(|f| folder_db_id.get(&f.id));
        tx.execute(
            "INSERT INTO ProjectData (scan_complete, project_name, project_path, entry_point) VALUES (1, ?1, ?2, ?3)",
            params![project_name, project_root.to_string_lossy().into_owned(), root_folder_db],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Returns the next undocumented symbol (fewest outgoing calls first,
    /// i.e. leaves of the call graph before their callers), or `None` once
    /// every symbol is documented.
    ///
    /// # Errors
    /// Returns [`StoreError`] on any query failure.
    pub fn next_symbol_to_document(&self) -> Result<Option<SymbolContext>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, kind, (SELECT name FROM Language l
                JOIN File f ON f.language_id = l.id
                JOIN Symbol s2 ON s2.file_id = f.id
                WHERE s2.id = view_next_symbol_to_document.id)
             FROM view_next_symbol_to_document LIMIT 1",
        )?;
        let row = stmt
            .query_row([], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?, r.get::<_, Option<String>>(3)?))
            })
            .optional()?;

        let Some((id, name, kind, language)) = row else { return Ok(None) };

        let callees = self.names_by(
            "SELECT s.name FROM SymbolRelationship r JOIN Symbol s ON s.id = r.called_id WHERE r.caller_id = ?1",
            id,
        )?;
        let callers = self.names_by(
            "SELECT s.name FROM SymbolRelationship r JOIN Symbol s ON s.id = r.caller_id WHERE r.called_id = ?1",
            id,
        )?;

        Ok(Some(SymbolContext { symbol_db_id: id, name, kind, language, callees, callers }))
    }

    fn names_by(&self, sql: &str, id: i64) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![id], |r| r.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Writes a produced summary/documentation payload back onto a symbol
    /// and marks it documented.
    ///
    /// # Errors
    /// Returns [`StoreError`] on any update failure.
    pub fn update_documentation(
        &self,
        symbol_db_id: i64,
        summary: &str,
        documentation: &serde_json::Value,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE Symbol SET summary = ?1, documentation = ?2, documented = 1 WHERE id = ?3",
            params![summary, documentation.to_string(), symbol_db_id],
        )?;
        Ok(())
    }
}

fn insert_language(
    tx: &rusqlite::Transaction<'_>,
    cache: &mut HashMap<String, i64>,
    name: &str,
) -> Result<i64, StoreError> {
    if let Some(&id) = cache.get(name) {
        return Ok(id);
    }
    let existing: Option<i64> = tx.query_row("SELECT id FROM Language WHERE name = ?1", params![name], |r| r.get(0)).optional()?;
    let id = match existing {
        Some(id) => id,
        None => {
            tx.execute("INSERT INTO Language (name) VALUES (?1)", params![name])?;
            tx.last_insert_rowid()
        }
    };
    cache.insert(name.to_string(), id);
    Ok(id)
}

fn kind_name(kind: KindEnum) -> &'static str {
    match kind {
        KindEnum::File => "file",
        KindEnum::Module => "module",
        KindEnum::Namespace => "namespace",
        KindEnum::Class => "class",
        KindEnum::Method => "method",
        KindEnum::Property => "property",
        KindEnum::Field => "field",
        KindEnum::Constructor => "constructor",
        KindEnum::Enum => "enum",
        KindEnum::Interface => "interface",
        KindEnum::Function => "function",
        KindEnum::Variable => "variable",
        KindEnum::Constant => "constant",
        KindEnum::Struct => "struct",
        KindEnum::Event => "event",
        KindEnum::Operator => "operator",
        KindEnum::TypeParameter => "type_parameter",
        KindEnum::Import => "import",
        KindEnum::Other => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Position, Range};
    use std::path::PathBuf;

    fn mkdir_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn folder(id: u64, name: &str, parent: Option<u64>, files: Vec<u64>) -> Folder {
        Folder {
            id,
            name: name.to_string(),
            abs_root: PathBuf::from(format!("/proj/{name}")),
            subfolders: Vec::new(),
            files,
            parent,
            languages: Default::default(),
        }
    }

    fn file(id: u64, rel: &str, lang: &str) -> FileRecord {
        FileRecord { id, rel_path: rel.to_string(), language: lang.to_string(), project_root: PathBuf::from("/proj"), symbols: Vec::new() }
    }

    fn sym(id: SymbolId, name: &str, file_id: u64, parent: Option<SymbolId>) -> Symbol {
        Symbol {
            id,
            name: name.to_string(),
            kind: KindEnum::Function,
            file_id,
            range: Range::new(Position::new(0, 0), Position::new(5, 0)),
            selection_range: Range::new(Position::new(0, 0), Position::new(0, 3)),
            parent_id: parent,
            children: Vec::new(),
            docstring: None,
            summary: None,
            documentation: None,
            documented: false,
        }
    }

    #[test]
    fn persists_and_serves_leaf_symbol_first() {
        let (_dir, mut store) = mkdir_store();
        let folders = vec![folder(0, "proj", None, vec![0])];
        let files = vec![file(0, "a.py", "python")];
        let symbols = vec![sym(0, "caller", 0, None), sym(1, "callee", 0, None)];
        let edges = vec![CallEdge { caller: 0, callee: 1 }];

        store.persist_run("proj", Path::new("/proj"), &folders, &files, &symbols, &edges).unwrap();

        let next = store.next_symbol_to_document().unwrap().expect("some symbol pending");
        assert_eq!(next.name, "callee");
        assert_eq!(next.callers, vec!["caller".to_string()]);
    }

    #[test]
    fn update_documentation_marks_symbol_documented() {
        let (_dir, mut store) = mkdir_store();
        let folders = vec![folder(0, "proj", None, vec![0])];
        let files = vec![file(0, "a.py", "python")];
        let symbols = vec![sym(0, "only", 0, None)];
        store.persist_run("proj", Path::new("/proj"), &folders, &files, &symbols, &[]).unwrap();

        let next = store.next_symbol_to_document().unwrap().unwrap();
        store.update_documentation(next.symbol_db_id, "does a thing", &serde_json::json!({"summary": "does a thing"})).unwrap();

        assert!(store.next_symbol_to_document().unwrap().is_none());
    }

    #[test]
    fn empty_project_name_is_rejected() {
        let (_dir, mut store) = mkdir_store();
        let err = store.persist_run("", Path::new("/proj"), &[], &[], &[], &[]).unwrap_err();
        assert!(matches!(err, StoreError::MissingProjectName));
    }
}
