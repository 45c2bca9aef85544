//! Symbol Extractor (C5): per-file pipeline from raw `documentSymbol`
//! payloads to filtered, cross-linked [`Symbol`] records.
//!
//! Pure computation atop the [`LspClient`](crate::lsp::client::LspClient);
//! every error here is per-file and never aborts the run.

use std::collections::HashMap;

use lsp_types::{DocumentSymbol, SymbolKind as LspSymbolKind};

use crate::config::PipelineConfig;
use crate::error::ExtractionError;
use crate::lsp::client::LspClient;
use crate::model::{CallEdge, FileRecord, KindEnum, Position, Range, Symbol, SymbolId, kind_from_lsp};
use crate::uri::{ClientMode, from_lsp_uri};

/// Everything the extractor produced for one file.
#[derive(Debug, Default)]
pub struct ExtractionResult {
    /// Extracted, filtered symbols, in a flat arena keyed by their `id`.
    pub symbols: Vec<Symbol>,
    /// Call-graph edges discovered while resolving references.
    pub edges: Vec<CallEdge>,
}

/// Runs the full per-file pipeline: open, list symbols, filter to
/// definitions, and (if `resolve_references` is set) attach call-graph
/// edges. `next_id` supplies globally unique ids and is advanced in place.
///
/// # Errors
/// Returns [`ExtractionError`] if the file can't be opened or a required
/// query fails; callers are expected to log and continue rather than abort
/// the run.
pub async fn extract_file(
    client: &LspClient,
    file: &FileRecord,
    config: &PipelineConfig,
    kept_kinds: Option<&[i32]>,
    resolve_references: bool,
    project_files: &[FileRecord],
    mode: ClientMode,
    next_id: &mut SymbolId,
) -> Result<ExtractionResult, ExtractionError> {
    client.did_open(&file.rel_path).await.map_err(|e| ExtractionError::OpenFailed {
        path: file.rel_path.clone(),
        source: e,
    })?;

    let raw = client.document_symbols(&file.rel_path).await.map_err(|e| ExtractionError::QueryFailed {
        method: "textDocument/documentSymbol",
        path: file.rel_path.clone(),
        source: e,
    })?;

    let filtered = filter_by_kind(raw, kept_kinds);

    let mut symbols = Vec::new();
    flatten(&filtered, file.id, None, next_id, config, &mut symbols);

    let mut definitions = Vec::new();
    for symbol in symbols {
        match client.definition(&file.rel_path, to_lsp_position(symbol.selection_range.start)).await {
            Ok(Some(loc)) if ranges_match(&loc.range, &symbol.selection_range) => definitions.push(symbol),
            Ok(_) => {
                tracing::debug!(symbol = %symbol.name, path = %file.rel_path, "dropping non-definition symbol");
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol.name, path = %file.rel_path, error = %e, "definition query failed, dropping symbol");
            }
        }
    }

    reparent_after_filtering(&mut definitions);

    let mut edges = Vec::new();
    if resolve_references {
        edges = resolve_reference_edges(client, file, &definitions, project_files, mode).await;
    }

    Ok(ExtractionResult { symbols: definitions, edges })
}

fn to_lsp_position(pos: Position) -> lsp_types::Position {
    lsp_types::Position {
        line: pos.line,
        character: pos.character,
    }
}

fn from_lsp_range(range: lsp_types::Range) -> Range {
    Range::new(Position::new(range.start.line, range.start.character), Position::new(range.end.line, range.end.character))
}

fn ranges_match(a: &lsp_types::Range, b: &Range) -> bool {
    from_lsp_range(*a) == *b
}

/// Recursive, preserving kind filter: a symbol is kept if its own kind
/// matches `kept_kinds` or any descendant does; pruned descendants never
/// leak through. `None` keeps everything.
fn filter_by_kind(symbols: Vec<DocumentSymbol>, kept_kinds: Option<&[i32]>) -> Vec<DocumentSymbol> {
    symbols.into_iter().filter_map(|s| filter_one(s, kept_kinds)).collect()
}

fn filter_one(mut symbol: DocumentSymbol, kept_kinds: Option<&[i32]>) -> Option<DocumentSymbol> {
    let children = symbol.children.take().unwrap_or_default();
    let filtered_children = filter_by_kind(children, kept_kinds);

    let own_kind_matches = kept_kinds.is_none_or(|kinds| kinds.contains(&(symbol.kind.0)));
    if !own_kind_matches && filtered_children.is_empty() {
        return None;
    }

    symbol.children = if filtered_children.is_empty() { None } else { Some(filtered_children) };
    Some(symbol)
}

fn flatten(
    symbols: &[DocumentSymbol],
    file_id: u64,
    parent_id: Option<SymbolId>,
    next_id: &mut SymbolId,
    config: &PipelineConfig,
    out: &mut Vec<Symbol>,
) {
    for s in symbols {
        let id = *next_id;
        *next_id += 1;

        let range = from_lsp_range(s.range);
        let selection_range = from_lsp_range(s.selection_range);
        let name = if s.name.is_empty() { "unknown".to_string() } else { s.name.clone() };
        let kind = classify_kind(s.kind, config);

        out.push(Symbol {
            id,
            name,
            kind,
            file_id,
            range,
            selection_range,
            parent_id,
            children: Vec::new(),
            docstring: s.detail.clone(),
            summary: None,
            documentation: None,
            documented: false,
        });

        if let Some(children) = &s.children {
            flatten(children, file_id, Some(id), next_id, config, out);
        }
        if let Some(parent_id) = parent_id {
            out.iter_mut().find(|sym| sym.id == parent_id).map(|p| p.children.push(id));
        }
    }
}

/// Classifies a raw LSP `documentSymbol` kind through the config table,
/// falling back to [`kind_from_lsp`] for any raw value the table doesn't
/// override. This is the only path by which a symbol can be classified
/// [`KindEnum::Import`] — there is no standard LSP `SymbolKind` for it, so
/// a deployment's `kinds.json` must say which raw code (or codes) its
/// servers use for import bindings.
fn classify_kind(kind: LspSymbolKind, config: &PipelineConfig) -> KindEnum {
    config.kinds.get(&kind.0.to_string()).copied().unwrap_or_else(|| kind_from_lsp(kind.0))
}

/// After the definition filter drops some symbols, rebuild `children`
/// lists so they reference only surviving symbols, and clear `parent_id`
/// on any survivor whose parent did not survive.
fn reparent_after_filtering(symbols: &mut [Symbol]) {
    let surviving: std::collections::HashSet<SymbolId> = symbols.iter().map(|s| s.id).collect();
    for symbol in symbols.iter_mut() {
        symbol.children.retain(|c| surviving.contains(c));
        if symbol.parent_id.is_some_and(|p| !surviving.contains(&p)) {
            symbol.parent_id = None;
        }
    }
}

/// For every surviving, non-import symbol, queries `references` and links
/// each resolved reference to its most-specific enclosing symbol.
async fn resolve_reference_edges(
    client: &LspClient,
    file: &FileRecord,
    symbols: &[Symbol],
    project_files: &[FileRecord],
    mode: ClientMode,
) -> Vec<CallEdge> {
    let mut edges = Vec::new();
    let mut by_file: HashMap<u64, Vec<&Symbol>> = HashMap::new();
    for s in symbols {
        by_file.entry(s.file_id).or_default().push(s);
    }

    for symbol in symbols {
        if symbol.kind.is_import() {
            continue;
        }
        let locations = match client.references(&file.rel_path, to_lsp_position(symbol.selection_range.start), false).await
        {
            Ok(locs) => locs,
            Err(e) => {
                tracing::warn!(symbol = %symbol.name, error = %e, "references query failed, skipping");
                continue;
            }
        };

        for loc in locations {
            let abs_path = match from_lsp_uri(loc.uri.as_str(), &file.project_root, mode) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(uri = %loc.uri, error = %e, "reference uri lies outside the workspace, skipping");
                    continue;
                }
            };
            let Some(owning_file) = project_files.iter().find(|f| f.abs_path() == abs_path) else {
                continue;
            };
            let Some(candidates) = by_file.get(&owning_file.id) else {
                continue;
            };

            let reference_range = from_lsp_range(loc.range);
            let enclosing = candidates
                .iter()
                .filter(|s| reference_range.is_subrange_of(&s.range))
                .min_by_key(|s| s.range.span());

            if let Some(enclosing) = enclosing {
                if enclosing.id != symbol.id {
                    edges.push(CallEdge {
                        caller: enclosing.id,
                        callee: symbol.id,
                    });
                }
            }
        }
    }

    edges.sort_by_key(|e| (e.caller, e.callee));
    edges.dedup();
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::{Position as LspPos, Range as LspRange};

    fn sym(name: &str, kind: LspSymbolKind, range: (u32, u32, u32, u32), children: Option<Vec<DocumentSymbol>>) -> DocumentSymbol {
        #[allow(deprecated)]
        DocumentSymbol {
            name: name.to_string(),
            detail: None,
            kind,
            tags: None,
            deprecated: None,
            range: LspRange { start: LspPos::new(range.0, range.1), end: LspPos::new(range.2, range.3) },
            selection_range: LspRange { start: LspPos::new(range.0, range.1), end: LspPos::new(range.0, range.1 + 1) },
            children,
        }
    }

    #[test]
    fn filter_keeps_symbol_whose_descendant_matches() {
        let inner = sym("f", LspSymbolKind::FUNCTION, (1, 0, 2, 0), None);
        let outer = sym("M", LspSymbolKind::MODULE, (0, 0, 3, 0), Some(vec![inner]));
        let kept = filter_by_kind(vec![outer], Some(&[LspSymbolKind::FUNCTION.0]));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].children.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn filter_drops_symbol_with_no_matching_descendant() {
        let leaf = sym("x", LspSymbolKind::VARIABLE, (1, 0, 1, 1), None);
        let kept = filter_by_kind(vec![leaf], Some(&[LspSymbolKind::FUNCTION.0]));
        assert!(kept.is_empty());
    }

    #[test]
    fn filter_does_not_fabricate_empty_children_key() {
        let leaf = sym("f", LspSymbolKind::FUNCTION, (1, 0, 2, 0), None);
        let kept = filter_by_kind(vec![leaf], None);
        assert!(kept[0].children.is_none());
    }

    #[test]
    fn flatten_preserves_parent_child_structure() {
        let inner = sym("f", LspSymbolKind::FUNCTION, (1, 0, 2, 0), None);
        let outer = sym("M", LspSymbolKind::MODULE, (0, 0, 3, 0), Some(vec![inner]));
        let mut next_id = 0;
        let mut out = Vec::new();
        let config = PipelineConfig::default();
        flatten(&[outer], 0, None, &mut next_id, &config, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].children, vec![1]);
        assert_eq!(out[1].parent_id, Some(0));
    }

    #[test]
    fn classify_kind_falls_back_to_kind_from_lsp_when_unconfigured() {
        let config = PipelineConfig::default();
        assert_eq!(classify_kind(LspSymbolKind::FUNCTION, &config), KindEnum::Function);
    }

    #[test]
    fn classify_kind_honors_a_config_override_to_mark_imports() {
        let mut config = PipelineConfig::default();
        // A server that reports "from m import add" bindings as a plain
        // Variable (13); the deployment remaps that raw code to Import.
        config.kinds.insert("13".to_string(), KindEnum::Import);
        let kind = classify_kind(LspSymbolKind::VARIABLE, &config);
        assert_eq!(kind, KindEnum::Import);
        assert!(kind.is_import());
    }

    #[test]
    fn flatten_classifies_imports_via_config_and_excludes_them_from_call_graph() {
        let mut config = PipelineConfig::default();
        config.kinds.insert("13".to_string(), KindEnum::Import);

        let imported = sym("add", LspSymbolKind::VARIABLE, (0, 0, 0, 16), None);
        let mut next_id = 0;
        let mut out = Vec::new();
        flatten(&[imported], 0, None, &mut next_id, &config, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, KindEnum::Import);
        assert!(out[0].kind.is_import());
    }

    #[test]
    fn reparent_clears_dangling_parent_id_after_filtering() {
        let mut symbols = vec![
            Symbol {
                id: 0,
                name: "dropped_parent".to_string(),
                kind: KindEnum::Class,
                file_id: 0,
                range: Range::new(Position::new(0, 0), Position::new(10, 0)),
                selection_range: Range::new(Position::new(0, 0), Position::new(0, 1)),
                parent_id: None,
                children: vec![1],
                docstring: None,
                summary: None,
                documentation: None,
                documented: false,
            },
            Symbol {
                id: 1,
                name: "surviving_child".to_string(),
                kind: KindEnum::Function,
                file_id: 0,
                range: Range::new(Position::new(1, 0), Position::new(2, 0)),
                selection_range: Range::new(Position::new(1, 0), Position::new(1, 1)),
                parent_id: Some(0),
                children: Vec::new(),
                docstring: None,
                summary: None,
                documentation: None,
                documented: false,
            },
        ];
        // Simulate the definition filter dropping the parent (id 0).
        symbols.remove(0);
        reparent_after_filtering(&mut symbols);
        assert_eq!(symbols[0].parent_id, None);
    }
}
