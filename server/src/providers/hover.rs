//! Hover over `flow type-at-pos`.

use std::sync::Arc;

use serde_json::Value;
use tower_lsp::lsp_types::{Hover, HoverContents, HoverParams, MarkupContent, MarkupKind};

use crate::documents::DocumentStore;
use crate::engine::EngineHandle;
use crate::providers::flow_position;

pub(crate) struct HoverProvider {
    engine: Arc<EngineHandle>,
    documents: DocumentStore,
}

impl HoverProvider {
    pub fn new(engine: Arc<EngineHandle>, documents: DocumentStore) -> Self {
        Self { engine, documents }
    }

    pub async fn provide(&self, params: HoverParams) -> Option<Hover> {
        let uri = params.text_document_position_params.text_document.uri;
        let text = self.documents.text(&uri)?;
        let path = uri.to_file_path().ok()?;
        let (line, col) = flow_position(params.text_document_position_params.position);

        let value = self
            .engine
            .request(
                &["type-at-pos", "--path", path.to_str()?, &line, &col],
                Some(&text),
            )
            .await
            .map_err(|e| tracing::debug!("type-at-pos failed: {e:#}"))
            .ok()?;

        hover_from(&value)
    }
}

fn hover_from(value: &Value) -> Option<Hover> {
    let type_ = value.get("type")?.as_str()?;
    if type_.is_empty() || type_ == "(unknown)" {
        return None;
    }
    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: format!("```flow\n{type_}\n```"),
        }),
        range: None,
    })
}
