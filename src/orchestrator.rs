//! Orchestrator (C6): drives one run end to end. Groups files by language,
//! runs a fresh [`LspClient`] session per language, hands extracted symbols
//! to the [`Store`], then walks the store's undocumented-leaf view with a
//! [`DocumentationBackend`] until it's exhausted or a budget is hit.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::extractor::extract_file;
use crate::llm::DocumentationBackend;
use crate::lsp::{ClientMode, LspClient};
use crate::model::{CallEdge, FileRecord, Folder, Symbol, SymbolId};
use crate::store::Store;

/// Outcome for a single run, reported to the user on the final summary line.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Total symbols extracted across every language.
    pub total_symbols: usize,
    /// Total call-graph edges extracted.
    pub total_edges: usize,
    /// Languages whose session never started (files for them contribute
    /// zero symbols but are not otherwise an error).
    pub failed_languages: Vec<String>,
    /// Total distinct languages this run attempted.
    pub attempted_languages: usize,
    /// Number of symbols the documentation stage annotated.
    pub documented: usize,
}

impl RunSummary {
    /// False only when every attempted language failed to start — the
    /// CLI's exit-code-1 condition.
    #[must_use]
    pub fn success(&self) -> bool {
        self.attempted_languages == 0 || self.failed_languages.len() < self.attempted_languages
    }
}

/// Extracts every file, grouped by language with one session per language,
/// and persists the result. Per-language startup failure is logged and
/// skipped, not fatal; per-file extraction failure is logged and skipped.
///
/// # Errors
/// Returns [`crate::error::StoreError`] if persistence fails; that is the
/// only run-fatal error path.
pub async fn run(
    project_name: &str,
    project_root: &Path,
    folders: &[Folder],
    files: &[FileRecord],
    config: &PipelineConfig,
    mode: ClientMode,
    store: &mut Store,
) -> Result<RunSummary, crate::error::StoreError> {
    let mut by_language: BTreeMap<&str, Vec<&FileRecord>> = BTreeMap::new();
    for file in files {
        by_language.entry(file.language.as_str()).or_default().push(file);
    }

    let mut next_id: SymbolId = 0;
    let mut all_symbols: Vec<Symbol> = Vec::new();
    let mut all_edges: Vec<CallEdge> = Vec::new();
    let mut failed_languages = Vec::new();
    let attempted_languages = by_language.len();

    for (language, lang_files) in &by_language {
        let started = Instant::now();
        let Some(server) = config.server_for(language) else {
            tracing::warn!(language, "no server configured, skipping");
            failed_languages.push((*language).to_string());
            continue;
        };

        let client = LspClient::builder(*language)
            .server_command(server.command.clone())
            .server_args(server.args.clone())
            .container_image(server.container_image.clone())
            .workspace_root(project_root)
            .mode(mode)
            .build()
            .await;

        let client = match client {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(language, error = %e, "language server failed to start, skipping language");
                failed_languages.push((*language).to_string());
                continue;
            }
        };

        let mut language_symbols = 0usize;
        for &file in lang_files {
            match extract_file(&client, file, config, None, true, files, mode, &mut next_id).await {
                Ok(result) => {
                    language_symbols += result.symbols.len();
                    all_symbols.extend(result.symbols);
                    all_edges.extend(result.edges);
                }
                Err(e) => {
                    tracing::warn!(path = %file.rel_path, error = %e, "extraction failed for file, skipping");
                }
            }
        }

        client.shutdown().await;
        tracing::info!(
            language,
            files = lang_files.len(),
            symbols = language_symbols,
            elapsed_ms = started.elapsed().as_millis(),
            "language done"
        );
    }

    all_edges.sort_by_key(|e| (e.caller, e.callee));
    all_edges.dedup();

    store.persist_run(project_name, project_root, folders, files, &all_symbols, &all_edges)?;

    Ok(RunSummary {
        total_symbols: all_symbols.len(),
        total_edges: all_edges.len(),
        failed_languages,
        attempted_languages,
        documented: 0,
    })
}

/// Walks the store's "next symbol to document" view, invoking `backend` on
/// each undocumented symbol and writing the result back, until the view is
/// empty or `budget` symbols have been documented.
///
/// # Errors
/// Returns [`crate::error::StoreError`] on any store failure.
pub fn document_pending(
    store: &mut Store,
    backend: &dyn DocumentationBackend,
    budget: Option<usize>,
) -> Result<usize, crate::error::StoreError> {
    let mut documented = 0usize;
    loop {
        if budget.is_some_and(|b| documented >= b) {
            break;
        }
        let Some(context) = store.next_symbol_to_document()? else { break };
        let result = backend.document(&context);
        store.update_documentation(context.symbol_db_id, &result.summary, &result.documentation)?;
        documented += 1;
    }
    Ok(documented)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_false_only_when_every_language_failed() {
        let mut summary = RunSummary { attempted_languages: 2, failed_languages: vec!["python".to_string()], ..Default::default() };
        assert!(summary.success());
        summary.failed_languages.push("rust".to_string());
        assert!(!summary.success());
    }

    #[test]
    fn success_is_true_with_no_languages_attempted() {
        let summary = RunSummary::default();
        assert!(summary.success());
    }
}
