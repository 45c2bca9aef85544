//! Core data model shared by the extractor, orchestrator, and store adapter.
//!
//! `Position`/`Range` mirror the LSP wire shapes but live independently of
//! `lsp_types` so the rest of the pipeline does not need to know which
//! transport produced them. Symbols, files, and folders are held in flat,
//! id-indexed collections rather than an owning tree, per the arena
//! discipline for cyclic graphs (symbol <-> file <-> folder, symbol <->
//! symbol callers/callees).

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A zero-based, UTF-16-code-unit position in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Zero-based line number.
    pub line: u32,
    /// Zero-based UTF-16 code-unit offset within the line.
    pub character: u32,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A half-open span `[start, end)` of positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// Inclusive start position.
    pub start: Position,
    /// Exclusive-in-spirit end position (LSP ranges are end-inclusive by
    /// convention for the last covered character, but the subset relation
    /// below treats both bounds the same way LSP itself does).
    pub end: Position,
}

impl Range {
    /// Creates a new range.
    #[must_use]
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// `self ⊆ other` iff `other.start <= self.start && self.end <= other.end`.
    #[must_use]
    pub fn is_subrange_of(&self, other: &Range) -> bool {
        other.start <= self.start && self.end <= other.end
    }

    /// True iff the two ranges are disjoint (share no position).
    #[must_use]
    pub fn is_disjoint_from(&self, other: &Range) -> bool {
        self.end <= other.start || other.end <= self.start
    }

    /// True iff `self` contains `pos` (inclusive start, inclusive end, matching
    /// the LSP convention used throughout the extractor).
    #[must_use]
    pub fn contains_position(&self, pos: Position) -> bool {
        self.start <= pos && pos <= self.end
    }

    /// Span size as `(line_span, character_span)`, used to break ties between
    /// multiple enclosing symbols (smaller span wins).
    #[must_use]
    pub fn span(&self) -> (u32, u32) {
        (
            self.end.line.saturating_sub(self.start.line),
            self.end.character.saturating_sub(self.start.character),
        )
    }
}

/// Internal symbol-kind enumeration. A superset of `lsp_types::SymbolKind`
/// that adds `Import`, which LSP has no first-class kind for but the
/// pipeline treats as a first-class, call-graph-excluded symbol kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindEnum {
    /// A file-level pseudo-symbol.
    File,
    /// A module or package.
    Module,
    /// A namespace.
    Namespace,
    /// A class.
    Class,
    /// A method (function bound to a type).
    Method,
    /// A property.
    Property,
    /// A field.
    Field,
    /// A constructor.
    Constructor,
    /// An enum.
    Enum,
    /// An interface or trait.
    Interface,
    /// A free function.
    Function,
    /// A variable.
    Variable,
    /// A constant.
    Constant,
    /// A struct.
    Struct,
    /// An event.
    Event,
    /// An operator overload.
    Operator,
    /// A generic type parameter.
    TypeParameter,
    /// An import or use-declaration; excluded from the call graph.
    Import,
    /// Anything not covered by the above.
    Other,
}

impl KindEnum {
    /// True for the kind reserved for import/use declarations.
    #[must_use]
    pub fn is_import(self) -> bool {
        matches!(self, KindEnum::Import)
    }
}

/// Maps a raw LSP `SymbolKind` integer (as defined by the LSP spec) to the
/// internal kind enumeration. `27` (`Struct`) and the rest follow the LSP
/// 3.x numbering; unknown values map to `Other` rather than erroring, since
/// `documentSymbol` payloads come from third-party servers the pipeline
/// does not control.
#[must_use]
pub fn kind_from_lsp(raw: i32) -> KindEnum {
    match raw {
        1 => KindEnum::File,
        2 => KindEnum::Module,
        3 => KindEnum::Namespace,
        5 => KindEnum::Class,
        6 => KindEnum::Method,
        7 => KindEnum::Property,
        8 => KindEnum::Field,
        9 => KindEnum::Constructor,
        10 => KindEnum::Enum,
        11 => KindEnum::Interface,
        12 => KindEnum::Function,
        13 => KindEnum::Variable,
        14 => KindEnum::Constant,
        23 => KindEnum::Struct,
        24 => KindEnum::Event,
        25 => KindEnum::Operator,
        26 => KindEnum::TypeParameter,
        _ => KindEnum::Other,
    }
}

/// Stable identifier for a symbol within a single run.
pub type SymbolId = u64;

/// An extracted symbol, immutable except for the documentation fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    /// Stable id, unique within the run.
    pub id: SymbolId,
    /// Declared name; `"unknown"` if the server omitted one.
    pub name: String,
    /// Internal symbol kind.
    pub kind: KindEnum,
    /// Id of the owning `FileRecord`.
    pub file_id: u64,
    /// Full range covered by the symbol (e.g. the whole function body).
    pub range: Range,
    /// Range of just the symbol's name token; `selectionRange ⊆ range`.
    pub selection_range: Range,
    /// Parent symbol id, if nested.
    pub parent_id: Option<SymbolId>,
    /// Child symbol ids, in declaration order.
    pub children: Vec<SymbolId>,
    /// Docstring extracted from the source, if any.
    pub docstring: Option<String>,
    /// LLM-generated summary.
    pub summary: Option<String>,
    /// LLM-generated documentation payload (free-form JSON).
    pub documentation: Option<serde_json::Value>,
    /// Whether the documentation stage has processed this symbol.
    pub documented: bool,
}

impl Symbol {
    /// True iff `selectionRange ⊆ range`, the invariant every extracted
    /// symbol must satisfy.
    #[must_use]
    pub fn has_valid_selection(&self) -> bool {
        self.selection_range.is_subrange_of(&self.range)
    }
}

/// A directed call-graph edge: `caller` invokes `callee`. Self-edges are
/// forbidden and duplicates collapse (enforced by the extractor before the
/// edge ever reaches the store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallEdge {
    /// Id of the symbol that makes the call.
    pub caller: SymbolId,
    /// Id of the symbol being called.
    pub callee: SymbolId,
}

/// A language tag, e.g. `"python"`, `"rust"`.
pub type LanguageTag = String;

/// A single extractable source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Stable id, unique within the run.
    pub id: u64,
    /// POSIX-normalized path relative to `project_root`.
    pub rel_path: String,
    /// Detected language.
    pub language: LanguageTag,
    /// Absolute project root this file belongs to.
    pub project_root: PathBuf,
    /// Ids of symbols extracted from this file.
    pub symbols: Vec<SymbolId>,
}

impl FileRecord {
    /// Absolute host path of this file.
    #[must_use]
    pub fn abs_path(&self) -> PathBuf {
        self.project_root.join(&self.rel_path)
    }
}

/// A folder/tree node. `parent == None` iff this is the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    /// Stable id, unique within the run.
    pub id: u64,
    /// Directory name (not the full path).
    pub name: String,
    /// Absolute path of this folder on the host filesystem.
    pub abs_root: PathBuf,
    /// Ids of direct subfolders.
    pub subfolders: Vec<u64>,
    /// Ids of files directly contained in this folder.
    pub files: Vec<u64>,
    /// Id of the parent folder, if any.
    pub parent: Option<u64>,
    /// Languages observed among files in this folder or its descendants.
    pub languages: HashSet<LanguageTag>,
}

impl Folder {
    /// True iff this folder is the project root (has no parent).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Per-language session lifecycle state, driven by the Orchestrator and the
/// LSP Client together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No process has been spawned yet.
    Uninitialized,
    /// The process has been spawned; `initialize` has not yet completed.
    Starting,
    /// `initialize`/`initialized` completed successfully.
    Initialized,
    /// Files are actively being opened and queried.
    Operating,
    /// `shutdown`/`exit` have been sent; the process is being torn down.
    ShuttingDown,
    /// The process has exited and all resources are released.
    Stopped,
    /// The session failed irrecoverably; no further requests will succeed.
    Failed,
}

impl SessionState {
    /// True for `Stopped`/`Failed`, the two terminal states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Failed)
    }
}
