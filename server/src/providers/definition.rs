//! Go-to-definition over `flow get-def`.

use std::sync::Arc;

use serde_json::Value;
use tower_lsp::lsp_types::{
    GotoDefinitionParams, GotoDefinitionResponse, Location, Position, Range, Url,
};

use crate::documents::DocumentStore;
use crate::engine::EngineHandle;
use crate::providers::flow_position;

pub(crate) struct DefinitionProvider {
    engine: Arc<EngineHandle>,
    documents: DocumentStore,
}

impl DefinitionProvider {
    pub fn new(engine: Arc<EngineHandle>, documents: DocumentStore) -> Self {
        Self { engine, documents }
    }

    pub async fn provide(&self, params: GotoDefinitionParams) -> Option<GotoDefinitionResponse> {
        let uri = params.text_document_position_params.text_document.uri;
        let text = self.documents.text(&uri)?;
        let path = uri.to_file_path().ok()?;
        let (line, col) = flow_position(params.text_document_position_params.position);

        let value = self
            .engine
            .request(
                &["get-def", "--path", path.to_str()?, &line, &col],
                Some(&text),
            )
            .await
            .map_err(|e| tracing::debug!("get-def failed: {e:#}"))
            .ok()?;

        location_from(&value).map(GotoDefinitionResponse::Scalar)
    }
}

/// Flow reports 1-based lines and columns with inclusive ends; LSP wants
/// 0-based positions with exclusive ends.
fn location_from(value: &Value) -> Option<Location> {
    let path = value.get("path")?.as_str()?;
    if path.is_empty() {
        return None;
    }
    let line = value.get("line")?.as_u64()?;
    let start = value.get("start")?.as_u64()?;
    let endline = value.get("endline").and_then(Value::as_u64).unwrap_or(line);
    let end = value.get("end").and_then(Value::as_u64).unwrap_or(start);

    let uri = Url::from_file_path(path).ok()?;
    Some(Location {
        uri,
        range: Range {
            start: Position::new(line.saturating_sub(1) as u32, start.saturating_sub(1) as u32),
            end: Position::new(endline.saturating_sub(1) as u32, end as u32),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_converts_coordinates() {
        let location = location_from(&serde_json::json!({
            "path": "/project/src/util.js",
            "line": 12, "endline": 12, "start": 7, "end": 13
        }))
        .unwrap();
        assert_eq!(location.uri.path(), "/project/src/util.js");
        assert_eq!(location.range.start, Position::new(11, 6));
        assert_eq!(location.range.end, Position::new(11, 13));
    }

    #[test]
    fn test_empty_path_means_no_definition() {
        assert!(location_from(&serde_json::json!({ "path": "", "line": 0, "start": 0 })).is_none());
        assert!(location_from(&serde_json::json!({})).is_none());
    }
}
