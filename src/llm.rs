//! LLM Driver (A3, stub collaborator): the seam a reimplementer fills in
//! with real Ollama/OpenAI/Anthropic HTTP calls. Ships one no-network
//! implementation, [`EchoBackend`], so the pipeline runs and is testable
//! end to end without a model behind it.

use serde_json::json;

use crate::store::SymbolContext;

/// Which provider the CLI asked for. Selection is plumbed through for
/// forward compatibility; every variant currently resolves to
/// [`EchoBackend`] — provider wiring is out of scope here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Local Ollama server.
    Ollama,
    /// OpenAI API.
    OpenAi,
    /// Anthropic API.
    Anthropic,
}

impl Provider {
    /// Parses a `--provider` CLI value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ollama" => Some(Provider::Ollama),
            "openai" => Some(Provider::OpenAi),
            "anthropic" => Some(Provider::Anthropic),
            _ => None,
        }
    }
}

/// The result of documenting one symbol.
#[derive(Debug, Clone)]
pub struct DocumentationResult {
    /// One-line summary.
    pub summary: String,
    /// Free-form documentation payload, stored as JSON.
    pub documentation: serde_json::Value,
}

/// A source of generated documentation for a symbol, given its call-graph
/// neighborhood. Implementations MUST NOT mutate the store themselves —
/// the Orchestrator owns the read-document-write loop.
pub trait DocumentationBackend: Send + Sync {
    /// Produces documentation for one symbol.
    fn document(&self, symbol_context: &SymbolContext) -> DocumentationResult;
}

/// No-network backend producing a deterministic placeholder summary from
/// the symbol's name, kind, and immediate call-graph neighbors. Exists so
/// the pipeline is runnable without a model; every `--provider` value
/// currently resolves to this.
#[derive(Debug, Default)]
pub struct EchoBackend;

impl DocumentationBackend for EchoBackend {
    fn document(&self, ctx: &SymbolContext) -> DocumentationResult {
        let summary = if ctx.callees.is_empty() {
            format!("{} ({}) calls nothing else in this file.", ctx.name, ctx.kind)
        } else {
            format!("{} ({}) calls: {}.", ctx.name, ctx.kind, ctx.callees.join(", "))
        };

        let documentation = json!({
            "name": ctx.name,
            "kind": ctx.kind,
            "language": ctx.language,
            "callers": ctx.callers,
            "callees": ctx.callees,
            "summary": summary,
        });

        DocumentationResult { summary, documentation }
    }
}

/// Builds the backend for a selected provider. All providers currently
/// resolve to [`EchoBackend`]; `model` is accepted but unused, a seam for
/// future per-model prompt selection.
#[must_use]
pub fn backend_for(_provider: Provider, _model: Option<&str>) -> Box<dyn DocumentationBackend> {
    Box::new(EchoBackend)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(callees: Vec<&str>) -> SymbolContext {
        SymbolContext {
            symbol_db_id: 1,
            name: "process".to_string(),
            kind: "function".to_string(),
            language: Some("python".to_string()),
            callees: callees.into_iter().map(String::from).collect(),
            callers: Vec::new(),
        }
    }

    #[test]
    fn echo_backend_mentions_callees() {
        let result = EchoBackend.document(&ctx(vec!["helper"]));
        assert!(result.summary.contains("helper"));
        assert_eq!(result.documentation["name"], "process");
    }

    #[test]
    fn echo_backend_handles_leaf_symbol() {
        let result = EchoBackend.document(&ctx(vec![]));
        assert!(result.summary.contains("calls nothing else"));
    }

    #[test]
    fn provider_parses_known_values_only() {
        assert_eq!(Provider::parse("ollama"), Some(Provider::Ollama));
        assert_eq!(Provider::parse("bogus"), None);
    }
}
