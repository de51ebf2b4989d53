//! Completion over `flow autocomplete`.

use std::sync::Arc;

use serde_json::Value;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionParams, CompletionResponse,
};

use crate::documents::DocumentStore;
use crate::engine::EngineHandle;
use crate::providers::flow_position;

pub(crate) struct CompletionProvider {
    engine: Arc<EngineHandle>,
    documents: DocumentStore,
}

impl CompletionProvider {
    pub fn new(engine: Arc<EngineHandle>, documents: DocumentStore) -> Self {
        Self { engine, documents }
    }

    pub async fn provide(&self, params: CompletionParams) -> Option<CompletionResponse> {
        let uri = params.text_document_position.text_document.uri;
        let text = self.documents.text(&uri)?;
        let path = uri.to_file_path().ok()?;
        let (line, col) = flow_position(params.text_document_position.position);

        let value = self
            .engine
            .request(
                &["autocomplete", "--path", path.to_str()?, &line, &col],
                Some(&text),
            )
            .await
            .map_err(|e| tracing::debug!("autocomplete failed: {e:#}"))
            .ok()?;

        Some(CompletionResponse::Array(completion_items(&value)))
    }
}

fn completion_items(value: &Value) -> Vec<CompletionItem> {
    value
        .get("result")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let name = entry.get("name")?.as_str()?;
            let type_ = entry.get("type").and_then(Value::as_str).unwrap_or_default();
            Some(CompletionItem {
                label: name.to_string(),
                kind: Some(kind_of(entry, type_)),
                detail: (!type_.is_empty()).then(|| type_.to_string()),
                ..CompletionItem::default()
            })
        })
        .collect()
}

fn kind_of(entry: &Value, type_: &str) -> CompletionItemKind {
    if entry
        .get("func_details")
        .is_some_and(|details| !details.is_null())
    {
        CompletionItemKind::FUNCTION
    } else if type_.starts_with("class") {
        CompletionItemKind::CLASS
    } else {
        CompletionItemKind::VARIABLE
    }
}
