//! Config Tables (A1): language↔extension mapping, per-language server
//! commands, ignore defaults, and the LSP `SymbolKind` → internal
//! [`KindEnum`](crate::model::KindEnum) map. Each table has a built-in
//! default and an optional JSON override loaded from a caller-supplied
//! config directory; loading validates every entry and fails fast.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::KindEnum;

/// Per-language LSP server launch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEntry {
    /// Executable to run (host mode) or to invoke inside the container.
    pub command: String,
    /// Arguments passed to `command`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Docker image to run the server inside, for container mode.
    pub container_image: String,
    /// Server-specific `initializationOptions`, passed through verbatim.
    #[serde(default)]
    pub initialization_options: Option<serde_json::Value>,
}

/// The four config tables, loaded once at process startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// File extension (no dot) → language tag.
    pub languages: HashMap<String, String>,
    /// Language tag → server launch config.
    pub servers: HashMap<String, ServerEntry>,
    /// Directory names always excluded from the walk.
    pub ignored_dirs: Vec<String>,
    /// Glob patterns always excluded from the walk.
    pub ignored_patterns: Vec<String>,
    /// File extensions always excluded from the walk.
    pub ignored_extensions: Vec<String>,
    /// Raw LSP `SymbolKind` integer (as a string key, e.g. `"13"`), or a
    /// language-specific override name, → internal kind. Consulted by the
    /// extractor before falling back to [`crate::model::kind_from_lsp`], so
    /// a deployment can reclassify a server's quirky kind numbering (e.g.
    /// a server that reports import bindings as `SymbolKind::Variable`)
    /// without a code change.
    pub kinds: HashMap<String, KindEnum>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut languages = HashMap::new();
        for (ext, lang) in [
            ("py", "python"),
            ("rs", "rust"),
            ("js", "javascript"),
            ("jsx", "javascript"),
            ("ts", "typescript"),
            ("tsx", "typescript"),
            ("go", "go"),
            ("java", "java"),
            ("c", "c"),
            ("h", "c"),
            ("cpp", "cpp"),
            ("cc", "cpp"),
            ("cxx", "cpp"),
            ("hpp", "cpp"),
        ] {
            languages.insert(ext.to_string(), lang.to_string());
        }

        let mut servers = HashMap::new();
        servers.insert(
            "python".to_string(),
            ServerEntry {
                command: "pyright-langserver".to_string(),
                args: vec!["--stdio".to_string()],
                container_image: "kadabra/lsp-python:latest".to_string(),
                initialization_options: None,
            },
        );
        servers.insert(
            "rust".to_string(),
            ServerEntry {
                command: "rust-analyzer".to_string(),
                args: Vec::new(),
                container_image: "kadabra/lsp-rust:latest".to_string(),
                initialization_options: None,
            },
        );
        servers.insert(
            "typescript".to_string(),
            ServerEntry {
                command: "typescript-language-server".to_string(),
                args: vec!["--stdio".to_string()],
                container_image: "kadabra/lsp-typescript:latest".to_string(),
                initialization_options: None,
            },
        );
        servers.insert(
            "javascript".to_string(),
            servers.get("typescript").cloned().expect("typescript entry just inserted"),
        );
        servers.insert(
            "go".to_string(),
            ServerEntry {
                command: "gopls".to_string(),
                args: Vec::new(),
                container_image: "kadabra/lsp-go:latest".to_string(),
                initialization_options: None,
            },
        );

        let ignored_dirs = [
            ".git",
            "node_modules",
            "target",
            "__pycache__",
            ".venv",
            "venv",
            "dist",
            "build",
            ".mypy_cache",
            ".pytest_cache",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let ignored_extensions = ["so", "dylib", "dll", "exe", "pyc", "o", "a", "class"]
            .into_iter()
            .map(String::from)
            .collect();

        // Keyed by the raw LSP `SymbolKind` integer, mirroring
        // `kind_from_lsp`'s arms exactly so the default table changes
        // nothing; it exists so a `kinds.json` override can reclassify
        // specific raw codes (or add a language-specific override name)
        // without touching `kind_from_lsp` itself.
        let mut kinds = HashMap::new();
        for (raw, kind) in [
            (1, KindEnum::File),
            (2, KindEnum::Module),
            (3, KindEnum::Namespace),
            (5, KindEnum::Class),
            (6, KindEnum::Method),
            (7, KindEnum::Property),
            (8, KindEnum::Field),
            (9, KindEnum::Constructor),
            (10, KindEnum::Enum),
            (11, KindEnum::Interface),
            (12, KindEnum::Function),
            (13, KindEnum::Variable),
            (14, KindEnum::Constant),
            (23, KindEnum::Struct),
            (24, KindEnum::Event),
            (25, KindEnum::Operator),
            (26, KindEnum::TypeParameter),
        ] {
            kinds.insert(raw.to_string(), kind);
        }

        Self {
            languages,
            servers,
            ignored_dirs,
            ignored_patterns: Vec::new(),
            ignored_extensions,
            kinds,
        }
    }
}

impl PipelineConfig {
    /// Loads the built-in defaults, then overlays any of
    /// `languages.json`/`servers.json`/`ignore.json`/`kinds.json` found under
    /// `dir`. Missing files are not an error; malformed or unrecognized
    /// entries are.
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`]/[`ConfigError::Parse`] if a present file
    /// can't be read or parsed, and [`ConfigError::UnknownEntry`] if a
    /// `kinds.json` entry names a kind outside the fixed enumeration.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(overrides) = read_json::<HashMap<String, String>>(&dir.join("languages.json"))? {
            config.languages.extend(overrides);
        }
        if let Some(overrides) = read_json::<HashMap<String, ServerEntry>>(&dir.join("servers.json"))? {
            config.servers.extend(overrides);
        }
        if let Some(overrides) = read_json::<IgnoreOverrides>(&dir.join("ignore.json"))? {
            config.ignored_dirs.extend(overrides.dirs);
            config.ignored_patterns.extend(overrides.patterns);
            config.ignored_extensions.extend(overrides.extensions);
        }
        if let Some(overrides) = read_json::<HashMap<String, String>>(&dir.join("kinds.json"))? {
            for (raw_name, kind_name) in overrides {
                let kind = KIND_NAMES
                    .iter()
                    .find(|(name, _)| *name == kind_name)
                    .map(|(_, kind)| *kind)
                    .ok_or_else(|| ConfigError::UnknownEntry {
                        what: "symbol kind",
                        name: kind_name.clone(),
                    })?;
                config.kinds.insert(raw_name, kind);
            }
        }

        Ok(config)
    }

    /// Looks up the [`ServerEntry`] for `language`, if configured.
    #[must_use]
    pub fn server_for(&self, language: &str) -> Option<&ServerEntry> {
        self.servers.get(language)
    }

    /// Maps a file extension (without the leading dot) to a language tag.
    #[must_use]
    pub fn language_for_extension(&self, ext: &str) -> Option<&str> {
        self.languages.get(ext).map(String::as_str)
    }
}

const KIND_NAMES: &[(&str, KindEnum)] = &[
    ("file", KindEnum::File),
    ("module", KindEnum::Module),
    ("namespace", KindEnum::Namespace),
    ("class", KindEnum::Class),
    ("method", KindEnum::Method),
    ("property", KindEnum::Property),
    ("field", KindEnum::Field),
    ("constructor", KindEnum::Constructor),
    ("enum", KindEnum::Enum),
    ("interface", KindEnum::Interface),
    ("function", KindEnum::Function),
    ("variable", KindEnum::Variable),
    ("constant", KindEnum::Constant),
    ("struct", KindEnum::Struct),
    ("event", KindEnum::Event),
    ("operator", KindEnum::Operator),
    ("type_parameter", KindEnum::TypeParameter),
    ("import", KindEnum::Import),
    ("other", KindEnum::Other),
];

#[derive(Debug, Default, Deserialize)]
struct IgnoreOverrides {
    #[serde(default)]
    dirs: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    extensions: Vec<String>,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let parsed = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
            Ok(Some(parsed))
        }
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Read {
            path: path.display().to_string(),
            source,
        }),
    }
}
