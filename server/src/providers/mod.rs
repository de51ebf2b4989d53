//! Feature providers — thin adapters between LSP requests and the engine.
//!
//! Each provider translates one request into a flow CLI invocation and maps
//! the JSON reply back to LSP shapes. Failures degrade to empty responses;
//! a broken feature request never takes the session down.

mod completion;
mod definition;
mod diagnostics;
mod hover;
mod symbol;

pub(crate) use completion::CompletionProvider;
pub(crate) use definition::DefinitionProvider;
pub(crate) use diagnostics::DiagnosticsProvider;
pub(crate) use hover::HoverProvider;
pub(crate) use symbol::SymbolProvider;

use tower_lsp::lsp_types::Position;

/// Flow addresses positions 1-based; LSP is 0-based.
pub(crate) fn flow_position(position: Position) -> (String, String) {
    (
        (u64::from(position.line) + 1).to_string(),
        (u64::from(position.character) + 1).to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_position_is_one_based() {
        let (line, col) = flow_position(Position::new(0, 0));
        assert_eq!((line.as_str(), col.as_str()), ("1", "1"));
        let (line, col) = flow_position(Position::new(11, 4));
        assert_eq!((line.as_str(), col.as_str()), ("12", "5"));
    }
}
