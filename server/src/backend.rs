//! Server orchestrator — the tower-lsp backend.
//!
//! Owns the session state machine: `Uninitialized -> Resolving ->
//! {Ready | Failed}`, with terminal `ShutDown` reachable from every state.
//! Initialization resolves the flow binary, wires the status stream to the
//! client's informational channel, and registers the feature providers. A
//! failed resolution degrades the session to an empty capability set instead
//! of crashing it; this is the one place a typed resolution error becomes a
//! user-visible message.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::{RwLock, mpsc};
use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionOptions, CompletionParams, CompletionResponse,
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, DocumentSymbolParams, DocumentSymbolResponse, GotoDefinitionParams,
    GotoDefinitionResponse, Hover, HoverParams, HoverProviderCapability, InitializeParams,
    InitializeResult, InitializedParams, MessageType, OneOf, SaveOptions, ServerCapabilities,
    ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind, TextDocumentSyncOptions,
    TextDocumentSyncSaveOptions,
};
use tower_lsp::{Client, LanguageServer};

use flowls_resolver::{BinaryResolver, Reporter, ResolverConfig, ResolverOptions};
use flowls_types::{FlowOptions, ResolvedBinary};

use crate::documents::DocumentStore;
use crate::engine::EngineHandle;
use crate::providers::{
    CompletionProvider, DefinitionProvider, DiagnosticsProvider, HoverProvider, SymbolProvider,
};
use crate::status::EngineStatus;
use crate::teardown::Disposer;

/// Session lifecycle. One resolution attempt per session; a failed session
/// stays failed until the client starts a new one.
enum SessionState {
    Uninitialized,
    Resolving,
    Ready(Arc<Session>),
    Failed,
    ShutDown,
}

/// Everything a live session owns.
struct Session {
    engine: Arc<EngineHandle>,
    completion: CompletionProvider,
    hover: HoverProvider,
    definition: DefinitionProvider,
    symbols: SymbolProvider,
    diagnostics: Arc<DiagnosticsProvider>,
    disposer: Mutex<Disposer>,
}

impl Session {
    fn dispose(&self) {
        self.disposer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dispose();
    }
}

/// Reporter that forwards problems to the LSP client: errors become visible
/// messages, the rest goes to the client log.
struct ClientReporter {
    client: Client,
}

impl Reporter for ClientReporter {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
        let client = self.client.clone();
        let message = message.to_string();
        tokio::spawn(async move {
            client.log_message(MessageType::INFO, message).await;
        });
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
        let client = self.client.clone();
        let message = message.to_string();
        tokio::spawn(async move {
            client.log_message(MessageType::WARNING, message).await;
        });
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
        let client = self.client.clone();
        let message = message.to_string();
        tokio::spawn(async move {
            client.show_message(MessageType::ERROR, message).await;
        });
    }
}

/// The language server backend.
pub struct Backend {
    client: Client,
    cli_options: FlowOptions,
    resolver_config: ResolverConfig,
    state: RwLock<SessionState>,
    documents: DocumentStore,
}

impl Backend {
    #[must_use]
    pub fn new(client: Client, cli_options: FlowOptions, resolver_config: ResolverConfig) -> Self {
        Self {
            client,
            cli_options,
            resolver_config,
            state: RwLock::new(SessionState::Uninitialized),
            documents: DocumentStore::new(),
        }
    }

    async fn ready_session(&self) -> Option<Arc<Session>> {
        match &*self.state.read().await {
            SessionState::Ready(session) => Some(session.clone()),
            _ => None,
        }
    }

    /// Push the current findings (and clears for stale files) to the client.
    async fn run_diagnostics(&self, session: &Session) {
        for (uri, diagnostics) in session.diagnostics.check().await {
            self.client.publish_diagnostics(uri, diagnostics, None).await;
        }
    }

    /// Build the session around a resolved binary: engine handle, status
    /// forwarding, providers. Teardown for everything acquired here is
    /// registered with the session's disposer as it is acquired.
    async fn start_session(&self, binary: ResolvedBinary, project_root: PathBuf) -> Arc<Session> {
        self.client
            .log_message(
                MessageType::INFO,
                format!(
                    "using flow {} ({})",
                    binary.version(),
                    binary.origin().label()
                ),
            )
            .await;

        let engine = Arc::new(EngineHandle::new(binary, project_root));
        let mut disposer = Disposer::new();

        let stop_engine = engine.clone();
        disposer.push("engine process", move || {
            tokio::spawn(async move { stop_engine.stop().await });
        });

        // Fan the status stream out to the client's informational channel.
        // The listener is synchronous, so it hands statuses to a forwarding
        // task over a channel rather than talking to the client directly.
        let (status_tx, mut status_rx) = mpsc::unbounded_channel::<EngineStatus>();
        let subscription = engine.status().subscribe(move |status| {
            let _ = status_tx.send(status.clone());
        });
        let forward_client = self.client.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(status) = status_rx.recv().await {
                forward_client
                    .log_message(MessageType::INFO, format!("Flow status: {status}"))
                    .await;
            }
        });
        disposer.push("status forwarding task", move || forwarder.abort());
        disposer.push("status subscription", move || subscription.unsubscribe());

        let diagnostics = Arc::new(DiagnosticsProvider::new(engine.clone()));
        let clear_client = self.client.clone();
        let clear_diagnostics = diagnostics.clone();
        disposer.push("published diagnostics", move || {
            tokio::spawn(async move {
                for uri in clear_diagnostics.drain() {
                    clear_client.publish_diagnostics(uri, Vec::new(), None).await;
                }
            });
        });

        let session = Arc::new(Session {
            completion: CompletionProvider::new(engine.clone(), self.documents.clone()),
            hover: HoverProvider::new(engine.clone(), self.documents.clone()),
            definition: DefinitionProvider::new(engine.clone(), self.documents.clone()),
            symbols: SymbolProvider::new(engine.clone(), self.documents.clone()),
            diagnostics,
            engine,
            disposer: Mutex::new(disposer),
        });
        session.engine.mark_ready();
        session
    }
}

/// Options for this session: what the client sent with initialize, or the
/// CLI-provided set when it sent none (or something malformed).
fn session_options(provided: Option<Value>, fallback: &FlowOptions) -> FlowOptions {
    match provided {
        Some(value) if !value.is_null() => match serde_json::from_value(value) {
            Ok(options) => options,
            Err(e) => {
                tracing::warn!("ignoring malformed initializationOptions: {e}");
                fallback.clone()
            }
        },
        _ => fallback.clone(),
    }
}

#[allow(deprecated)]
fn project_root_from(params: &InitializeParams) -> PathBuf {
    params
        .root_uri
        .as_ref()
        .and_then(|uri| uri.to_file_path().ok())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// The feature set advertised once a binary resolved. A failed resolution
/// advertises `ServerCapabilities::default()`, which serializes to `{}`.
fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::FULL),
                save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                    include_text: Some(true),
                })),
                ..TextDocumentSyncOptions::default()
            },
        )),
        completion_provider: Some(CompletionOptions {
            resolve_provider: Some(true),
            trigger_characters: Some(vec![".".to_string()]),
            ..CompletionOptions::default()
        }),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        definition_provider: Some(OneOf::Left(true)),
        document_symbol_provider: Some(OneOf::Left(true)),
        ..ServerCapabilities::default()
    }
}

fn server_info() -> ServerInfo {
    ServerInfo {
        name: "flowls".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> jsonrpc::Result<InitializeResult> {
        {
            let mut state = self.state.write().await;
            match *state {
                SessionState::Uninitialized => *state = SessionState::Resolving,
                // The protocol forbids a second initialize on a connection.
                _ => return Err(jsonrpc::Error::invalid_request()),
            }
        }

        let project_root = project_root_from(&params);
        let options = session_options(params.initialization_options, &self.cli_options);
        tracing::debug!("resolving flow for {}", project_root.display());

        if let Some(path) = &options.path_to_flow {
            self.client
                .show_message(MessageType::INFO, format!("path to flow {}", path.display()))
                .await;
        }

        let reporter = ClientReporter {
            client: self.client.clone(),
        };
        let outcome = match BinaryResolver::new(self.resolver_config.clone()) {
            Ok(resolver) => {
                resolver
                    .resolve(&project_root, &ResolverOptions::from(&options), &reporter)
                    .await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(binary) => {
                let session = self.start_session(binary, project_root).await;
                let mut state = self.state.write().await;
                if matches!(*state, SessionState::ShutDown) {
                    // Shut down while resolving; release everything the
                    // session just acquired.
                    session.dispose();
                    return Ok(InitializeResult {
                        capabilities: ServerCapabilities::default(),
                        server_info: Some(server_info()),
                    });
                }
                *state = SessionState::Ready(session);
                Ok(InitializeResult {
                    capabilities: server_capabilities(),
                    server_info: Some(server_info()),
                })
            }
            Err(e) => {
                tracing::error!(kind = e.kind(), "flow resolution failed: {e}");
                self.client
                    .show_message(MessageType::ERROR, format!("Flow could not be started: {e}"))
                    .await;
                let mut state = self.state.write().await;
                if !matches!(*state, SessionState::ShutDown) {
                    *state = SessionState::Failed;
                }
                Ok(InitializeResult {
                    capabilities: ServerCapabilities::default(),
                    server_info: Some(server_info()),
                })
            }
        }
    }

    async fn initialized(&self, _: InitializedParams) {
        if let Some(session) = self.ready_session().await {
            tracing::info!("flow language server started");
            self.run_diagnostics(&session).await;
        } else {
            tracing::info!("flow language server started without an engine");
        }
    }

    async fn shutdown(&self) -> jsonrpc::Result<()> {
        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, SessionState::ShutDown)
        };
        if let SessionState::Ready(session) = previous {
            session.dispose();
        }
        tracing::info!("flow language server session shut down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.update(uri, params.text_document.text);
        if let Some(session) = self.ready_session().await {
            self.run_diagnostics(&session).await;
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // Full sync: the last change carries the complete text.
        if let Some(change) = params.content_changes.into_iter().next_back() {
            self.documents.update(params.text_document.uri, change.text);
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        if let Some(text) = params.text {
            self.documents.update(params.text_document.uri, text);
        }
        if let Some(session) = self.ready_session().await {
            self.run_diagnostics(&session).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.documents.close(&params.text_document.uri);
    }

    async fn completion(
        &self,
        params: CompletionParams,
    ) -> jsonrpc::Result<Option<CompletionResponse>> {
        let Some(session) = self.ready_session().await else {
            return Ok(None);
        };
        tracing::debug!(
            "completion requested for {}",
            params.text_document_position.text_document.uri
        );
        Ok(session.completion.provide(params).await)
    }

    async fn completion_resolve(&self, item: CompletionItem) -> jsonrpc::Result<CompletionItem> {
        // Nothing to add on resolve, but the request must succeed for
        // clients that always issue it.
        Ok(item)
    }

    async fn hover(&self, params: HoverParams) -> jsonrpc::Result<Option<Hover>> {
        let Some(session) = self.ready_session().await else {
            return Ok(None);
        };
        Ok(session.hover.provide(params).await)
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> jsonrpc::Result<Option<GotoDefinitionResponse>> {
        let Some(session) = self.ready_session().await else {
            return Ok(None);
        };
        tracing::debug!(
            "definition requested for {}",
            params.text_document_position_params.text_document.uri
        );
        Ok(session.definition.provide(params).await)
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> jsonrpc::Result<Option<DocumentSymbolResponse>> {
        let Some(session) = self.ready_session().await else {
            return Ok(None);
        };
        tracing::debug!("symbols requested for {}", params.text_document.uri);
        Ok(session.symbols.provide(params).await)
    }
}
