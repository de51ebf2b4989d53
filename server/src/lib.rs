//! LSP server surface over the flow engine.
//!
//! The backend resolves a flow binary during the initialize handshake,
//! wraps it in an [`EngineHandle`], and serves completion, hover,
//! definition, document symbols and diagnostics through thin providers.

use tower_lsp::{LspService, Server};

use flowls_resolver::ResolverConfig;
use flowls_types::FlowOptions;

mod backend;
mod documents;
mod engine;
mod providers;
mod status;
mod teardown;

pub use backend::Backend;
pub use documents::DocumentStore;
pub use engine::EngineHandle;
pub use status::{EngineStatus, StatusBroadcaster, Subscription};
pub use teardown::Disposer;

/// Run the language server over stdio until the client disconnects.
pub async fn run_server(options: FlowOptions) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::build(move |client| {
        Backend::new(client, options.clone(), ResolverConfig::default())
    })
    .finish();
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
