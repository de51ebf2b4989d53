//! Document symbols from a shallow walk of `flow ast` output.

use std::sync::Arc;

use serde_json::Value;
use tower_lsp::lsp_types::{
    DocumentSymbolParams, DocumentSymbolResponse, Location, Position, Range, SymbolInformation,
    SymbolKind, Url,
};

use crate::documents::DocumentStore;
use crate::engine::EngineHandle;

pub(crate) struct SymbolProvider {
    engine: Arc<EngineHandle>,
    documents: DocumentStore,
}

impl SymbolProvider {
    pub fn new(engine: Arc<EngineHandle>, documents: DocumentStore) -> Self {
        Self { engine, documents }
    }

    pub async fn provide(&self, params: DocumentSymbolParams) -> Option<DocumentSymbolResponse> {
        let uri = params.text_document.uri;
        let text = self.documents.text(&uri)?;

        let value = self
            .engine
            .request(&["ast"], Some(&text))
            .await
            .map_err(|e| tracing::debug!("ast failed: {e:#}"))
            .ok()?;

        Some(DocumentSymbolResponse::Flat(symbols_from(&value, &uri)))
    }
}

/// Collect the top-level declarations a reader would expect in an outline:
/// functions, classes with their methods, variables, type aliases and
/// interfaces, looking through export wrappers.
fn symbols_from(ast: &Value, uri: &Url) -> Vec<SymbolInformation> {
    let mut symbols = Vec::new();
    for node in ast.get("body").and_then(Value::as_array).into_iter().flatten() {
        collect(node, uri, &mut symbols);
    }
    symbols
}

fn collect(node: &Value, uri: &Url, symbols: &mut Vec<SymbolInformation>) {
    match node.get("type").and_then(Value::as_str) {
        Some("ExportNamedDeclaration" | "ExportDefaultDeclaration") => {
            if let Some(inner) = node.get("declaration") {
                collect(inner, uri, symbols);
            }
        }
        Some("FunctionDeclaration") => {
            push_named(node, uri, SymbolKind::FUNCTION, None, symbols);
        }
        Some("ClassDeclaration") => {
            let class_name = name_of(node);
            push_named(node, uri, SymbolKind::CLASS, None, symbols);
            let methods = node
                .get("body")
                .and_then(|b| b.get("body"))
                .and_then(Value::as_array);
            for method in methods.into_iter().flatten() {
                if method.get("type").and_then(Value::as_str) == Some("MethodDefinition")
                    && let Some(name) = method
                        .get("key")
                        .and_then(|k| k.get("name"))
                        .and_then(Value::as_str)
                    && let Some(range) = range_of(method)
                {
                    symbols.push(symbol(
                        name,
                        SymbolKind::METHOD,
                        uri,
                        range,
                        class_name.clone(),
                    ));
                }
            }
        }
        Some("VariableDeclaration") => {
            let kind = if node.get("kind").and_then(Value::as_str) == Some("const") {
                SymbolKind::CONSTANT
            } else {
                SymbolKind::VARIABLE
            };
            let declarations = node.get("declarations").and_then(Value::as_array);
            for declaration in declarations.into_iter().flatten() {
                if let Some(name) = declaration
                    .get("id")
                    .and_then(|id| id.get("name"))
                    .and_then(Value::as_str)
                    && let Some(range) = range_of(declaration)
                {
                    symbols.push(symbol(name, kind, uri, range, None));
                }
            }
        }
        Some("TypeAlias" | "InterfaceDeclaration") => {
            push_named(node, uri, SymbolKind::INTERFACE, None, symbols);
        }
        _ => {}
    }
}

fn push_named(
    node: &Value,
    uri: &Url,
    kind: SymbolKind,
    container: Option<String>,
    symbols: &mut Vec<SymbolInformation>,
) {
    if let Some(name) = name_of(node)
        && let Some(range) = range_of(node)
    {
        symbols.push(symbol(&name, kind, uri, range, container));
    }
}

fn name_of(node: &Value) -> Option<String> {
    node.get("id")
        .and_then(|id| id.get("name"))
        .and_then(Value::as_str)
        .map(String::from)
}

/// ESTree `loc` carries 1-based lines and 0-based columns.
fn range_of(node: &Value) -> Option<Range> {
    let loc = node.get("loc")?;
    let position = |which: &str| -> Option<Position> {
        let point = loc.get(which)?;
        Some(Position::new(
            (point.get("line")?.as_u64()?.saturating_sub(1)) as u32,
            point.get("column")?.as_u64()? as u32,
        ))
    };
    Some(Range {
        start: position("start")?,
        end: position("end")?,
    })
}

fn symbol(
    name: &str,
    kind: SymbolKind,
    uri: &Url,
    range: Range,
    container_name: Option<String>,
) -> SymbolInformation {
    #[allow(deprecated)]
    SymbolInformation {
        name: name.to_string(),
        kind,
        tags: None,
        deprecated: None,
        location: Location {
            uri: uri.clone(),
            range,
        },
        container_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Url {
        Url::parse("file:///project/src/app.js").unwrap()
    }

    fn loc(line: u64) -> Value {
        serde_json::json!({
            "start": { "line": line, "column": 0 },
            "end": { "line": line, "column": 10 }
        })
    }

    #[test]
    fn test_function_and_variable_symbols() {
        let ast = serde_json::json!({
            "type": "Program",
            "body": [
                { "type": "FunctionDeclaration", "id": { "name": "main" }, "loc": loc(1) },
                { "type": "VariableDeclaration", "kind": "const", "loc": loc(3),
                  "declarations": [
                      { "type": "VariableDeclarator", "id": { "name": "LIMIT" }, "loc": loc(3) }
                  ] }
            ]
        });
        let symbols = symbols_from(&ast, &uri());
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "main");
        assert_eq!(symbols[0].kind, SymbolKind::FUNCTION);
        assert_eq!(symbols[0].location.range.start, Position::new(0, 0));
        assert_eq!(symbols[1].name, "LIMIT");
        assert_eq!(symbols[1].kind, SymbolKind::CONSTANT);
    }

    #[test]
    fn test_class_methods_carry_container() {
        let ast = serde_json::json!({
            "body": [
                { "type": "ClassDeclaration", "id": { "name": "Server" }, "loc": loc(1),
                  "body": { "body": [
                      { "type": "MethodDefinition", "key": { "name": "listen" }, "loc": loc(2) },
                      { "type": "PropertyDefinition", "key": { "name": "port" }, "loc": loc(3) }
                  ] } }
            ]
        });
        let symbols = symbols_from(&ast, &uri());
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].kind, SymbolKind::CLASS);
        assert_eq!(symbols[1].name, "listen");
        assert_eq!(symbols[1].kind, SymbolKind::METHOD);
        assert_eq!(symbols[1].container_name.as_deref(), Some("Server"));
    }

    #[test]
    fn test_export_wrappers_are_transparent() {
        let ast = serde_json::json!({
            "body": [
                { "type": "ExportNamedDeclaration",
                  "declaration": { "type": "FunctionDeclaration",
                                   "id": { "name": "helper" }, "loc": loc(5) } }
            ]
        });
        let symbols = symbols_from(&ast, &uri());
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "helper");
    }

    #[test]
    fn test_unnamed_nodes_skipped() {
        let ast = serde_json::json!({
            "body": [
                { "type": "FunctionDeclaration", "id": null, "loc": loc(1) },
                { "type": "ExpressionStatement", "loc": loc(2) }
            ]
        });
        assert!(symbols_from(&ast, &uri()).is_empty());
    }
}
