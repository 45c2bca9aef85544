//! Project Walker (A2): builds the `Folder`/`FileRecord` tree rooted at the
//! invocation path, honoring `.gitignore` plus built-in default exclusions.
//! No network access is performed — the original project's GitHub
//! gitignore-template fetch is out of scope here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;

use crate::config::PipelineConfig;
use crate::model::{FileRecord, Folder, LanguageTag};

/// The result of walking a project: every extractable file, grouped by
/// language, plus the synthesized folder tree and a count of files that
/// were walked but skipped (unmapped extension, or excluded outright).
#[derive(Debug, Default)]
pub struct WalkResult {
    /// Folders, indexed by id. Id `0` is always the project root.
    pub folders: Vec<Folder>,
    /// Extractable files, indexed by id.
    pub files: Vec<FileRecord>,
    /// Number of files walked but not extracted (unmapped extension).
    pub skipped: u64,
}

/// Walks `project_root`, classifying files by extension via `config` and
/// synthesizing the folder tree. Directories matched by the built-in
/// default exclusions or by any `.gitignore` the walk encounters are
/// skipped entirely, so neither their files nor sub-folders appear in the
/// result.
#[must_use]
pub fn walk(project_root: &Path, config: &PipelineConfig) -> WalkResult {
    let mut folder_ids: HashMap<PathBuf, u64> = HashMap::new();
    let mut folders: Vec<Folder> = Vec::new();
    let mut files: Vec<FileRecord> = Vec::new();
    let mut skipped = 0u64;

    let root_id = ensure_folder(project_root, project_root, &mut folder_ids, &mut folders);

    let mut builder = WalkBuilder::new(project_root);
    builder.hidden(false).git_ignore(true).git_global(false).parents(false);
    let ignored_dirs = config.ignored_dirs.clone();
    builder.filter_entry(move |entry| {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        !ignored_dirs.iter().any(|d| d == name.as_ref())
    });

    let mut pattern_overrides = OverrideBuilder::new(project_root);
    for pattern in &config.ignored_patterns {
        // `!`-prefixed globs are excludes in `ignore`'s override semantics.
        if let Err(e) = pattern_overrides.add(&format!("!{pattern}")) {
            tracing::warn!(pattern, error = %e, "invalid ignore pattern in config, skipping");
        }
    }
    match pattern_overrides.build() {
        Ok(overrides) => {
            builder.overrides(overrides);
        }
        Err(e) => tracing::warn!(error = %e, "failed to build ignore pattern overrides"),
    }

    for entry in builder.build() {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if path == project_root || entry.file_type().is_some_and(|ft| ft.is_dir()) {
            continue;
        }

        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            skipped += 1;
            continue;
        };
        if config.ignored_extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            skipped += 1;
            continue;
        }
        let Some(language) = config.language_for_extension(ext) else {
            skipped += 1;
            continue;
        };

        let parent_dir = path.parent().unwrap_or(project_root);
        let folder_id = ensure_ancestors(parent_dir, project_root, &mut folder_ids, &mut folders);

        let rel_path = path
            .strip_prefix(project_root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        let file_id = files.len() as u64;
        files.push(FileRecord {
            id: file_id,
            rel_path,
            language: language.to_string(),
            project_root: project_root.to_path_buf(),
            symbols: Vec::new(),
        });
        folders[folder_id as usize].files.push(file_id);
        register_language(&mut folders, folder_id, language.to_string());
    }

    let _ = root_id;
    WalkResult { folders, files, skipped }
}

fn ensure_folder(
    path: &Path,
    project_root: &Path,
    folder_ids: &mut HashMap<PathBuf, u64>,
    folders: &mut Vec<Folder>,
) -> u64 {
    if let Some(&id) = folder_ids.get(path) {
        return id;
    }
    let parent = if path == project_root {
        None
    } else {
        path.parent().map(|p| ensure_folder(p, project_root, folder_ids, folders))
    };
    let id = folders.len() as u64;
    folders.push(Folder {
        id,
        name: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        abs_root: path.to_path_buf(),
        subfolders: Vec::new(),
        files: Vec::new(),
        parent,
        languages: std::collections::HashSet::new(),
    });
    if let Some(parent_id) = parent {
        folders[parent_id as usize].subfolders.push(id);
    }
    folder_ids.insert(path.to_path_buf(), id);
    id
}

/// Synthesizes every intermediate folder between `project_root` and `dir`,
/// preserving the root-prefix invariant: a folder exists iff it contains an
/// extractable file or a subfolder that does.
fn ensure_ancestors(
    dir: &Path,
    project_root: &Path,
    folder_ids: &mut HashMap<PathBuf, u64>,
    folders: &mut Vec<Folder>,
) -> u64 {
    ensure_folder(dir, project_root, folder_ids, folders)
}

fn register_language(folders: &mut [Folder], mut folder_id: u64, language: LanguageTag) {
    loop {
        let folder = &mut folders[folder_id as usize];
        folder.languages.insert(language.clone());
        match folder.parent {
            Some(parent_id) => folder_id = parent_id,
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn extractable_files_are_classified_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a.py"), "def f(): pass\n");
        write(&dir.path().join("pkg/b.py"), "def g(): pass\n");
        write(&dir.path().join("README.md"), "hi\n");

        let config = PipelineConfig::default();
        let result = walk(dir.path(), &config);

        assert_eq!(result.files.len(), 2);
        assert_eq!(result.skipped, 1);
        assert!(result.files.iter().all(|f| f.language == "python"));
    }

    #[test]
    fn default_excluded_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("src/a.py"), "pass\n");
        write(&dir.path().join("node_modules/dep/index.js"), "pass\n");

        let config = PipelineConfig::default();
        let result = walk(dir.path(), &config);

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].rel_path, "src/a.py");
    }

    #[test]
    fn gitignore_rules_are_honored() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join(".gitignore"), "ignored_dir/\n");
        write(&dir.path().join("ignored_dir/a.py"), "pass\n");
        write(&dir.path().join("kept/b.py"), "pass\n");

        let config = PipelineConfig::default();
        let result = walk(dir.path(), &config);

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].rel_path, "kept/b.py");
    }

    #[test]
    fn configured_glob_patterns_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a.py"), "pass\n");
        write(&dir.path().join("a.generated.py"), "pass\n");

        let mut config = PipelineConfig::default();
        config.ignored_patterns.push("*.generated.py".to_string());
        let result = walk(dir.path(), &config);

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].rel_path, "a.py");
    }

    #[test]
    fn folder_tree_preserves_root_prefix_invariant() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a/b/c.py"), "pass\n");

        let config = PipelineConfig::default();
        let result = walk(dir.path(), &config);

        for folder in &result.folders {
            assert!(folder.abs_root.starts_with(dir.path()));
        }
    }
}
