use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::compiler::{Compiler, MdxCompiler};
use crate::config::PROJECT_CONFIG_FILE;
use crate::lsp::commands::{HandleExecuteCommand, COMMANDS};
use crate::lsp::handlers::{diagnostics_for, HandleDocumentSymbol, HandleHover};
use crate::lsp::watch::{ConfigWatcher, WatcherEvent};
use crate::preview::{CompiledPreview, ContentStore, EditorSession, CONTENT_KEY};
use crate::Config;

type Documents = Arc<Mutex<HashMap<Url, EditorSession>>>;

/// The main LSP backend that holds state and implements the Language Server Protocol
pub struct Backend {
    pub client: Client,
    pub documents: Documents,
    pub config: Arc<Mutex<Config>>,
    pub store: Option<Arc<ContentStore>>,
    /// Document persisted by a previous run, read once at startup
    pub draft: Option<String>,
    previews: mpsc::UnboundedSender<CompiledPreview>,
    watcher: Mutex<Option<ConfigWatcher>>,
}

impl Backend {
    pub fn new(client: Client, config: Config) -> Self {
        let store = config
            .storage_path
            .clone()
            .map(|path| Arc::new(ContentStore::new(path)));
        let draft = store.as_ref().and_then(|store| match store.load(CONTENT_KEY) {
            Ok(draft) => draft,
            Err(e) => {
                log::warn!("Failed to load saved draft: {:#}", e);
                None
            }
        });

        let documents: Documents = Arc::new(Mutex::new(HashMap::new()));
        let (previews, rx) = mpsc::unbounded_channel();
        spawn_preview_delivery(rx, client.clone(), documents.clone());

        Self {
            client,
            documents,
            config: Arc::new(Mutex::new(config)),
            store,
            draft,
            previews,
            watcher: Mutex::new(None),
        }
    }

    async fn mount(&self, uri: Url, text: String) {
        let (settings, compiler) = {
            let config = self.config.lock().await;
            (config.session_settings(), compiler_for(&config))
        };
        let session = EditorSession::mount(
            uri.clone(),
            text,
            &settings,
            compiler,
            self.store.clone(),
            self.previews.clone(),
        );
        self.documents.lock().await.insert(uri, session);
    }

    /// Pick up a project file from the workspace root when none was given.
    async fn discover_project_config(&self, root: &Path) {
        let mut config = self.config.lock().await;
        if config.has_project_config() {
            return;
        }
        let candidate = root.join(PROJECT_CONFIG_FILE);
        if !candidate.is_file() {
            return;
        }
        match config.with_project_file(&candidate) {
            Ok(loaded) => {
                log::info!("Using project config {}", candidate.display());
                *config = loaded;
            }
            Err(e) => log::warn!("Ignoring project config: {:#}", e),
        }
    }

    async fn start_watching(&self) {
        let Some(path) = self.config.lock().await.project_config_path.clone() else {
            return;
        };

        let (watcher, mut rx) = match ConfigWatcher::start(&path) {
            Ok(started) => started,
            Err(e) => {
                self.client
                    .log_message(
                        MessageType::WARNING,
                        format!("Cannot watch {}: {:#}", path.display(), e),
                    )
                    .await;
                return;
            }
        };
        *self.watcher.lock().await = Some(watcher);

        let client = self.client.clone();
        let config = self.config.clone();
        let documents = self.documents.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    WatcherEvent::ConfigChanged(changed) => {
                        reload_config(&path, &config, &documents, &client).await;
                        log::debug!("Handled change of {}", changed.display());
                    }
                    WatcherEvent::WatcherError(e) => {
                        client
                            .log_message(
                                MessageType::ERROR,
                                format!("Config file watcher error: {}", e),
                            )
                            .await;
                    }
                }
            }
        });
    }
}

fn compiler_for(config: &Config) -> Arc<dyn Compiler> {
    Arc::new(MdxCompiler::new(config.compile.clone()))
}

/// Apply fresh compile results and publish their diagnostics.
fn spawn_preview_delivery(
    mut rx: mpsc::UnboundedReceiver<CompiledPreview>,
    client: Client,
    documents: Documents,
) {
    tokio::spawn(async move {
        while let Some(preview) = rx.recv().await {
            let uri = preview.uri.clone();
            let diagnostics = {
                let mut docs = documents.lock().await;
                let Some(session) = docs.get_mut(&uri) else {
                    continue;
                };
                if !session.apply(preview) {
                    continue;
                }
                session.result().map(diagnostics_for).unwrap_or_default()
            };
            client.publish_diagnostics(uri, diagnostics, None).await;
        }
    });
}

async fn reload_config(
    path: &Path,
    config: &Mutex<Config>,
    documents: &Mutex<HashMap<Url, EditorSession>>,
    client: &Client,
) {
    let reloaded = config.lock().await.with_project_file(path);
    let reloaded = match reloaded {
        Ok(reloaded) => reloaded,
        Err(e) => {
            client
                .show_message(
                    MessageType::WARNING,
                    format!("Keeping previous settings: {:#}", e),
                )
                .await;
            return;
        }
    };

    let compiler = compiler_for(&reloaded);
    let (theme, debounce) = (reloaded.theme, reloaded.debounce);
    *config.lock().await = reloaded;

    let mut docs = documents.lock().await;
    for session in docs.values_mut() {
        session.set_theme(theme);
        session.set_debounce(debounce);
        session.set_compiler(compiler.clone());
    }
    drop(docs);

    client
        .log_message(
            MessageType::INFO,
            format!("Reloaded project config {}", path.display()),
        )
        .await;
}

fn workspace_root(params: &InitializeParams) -> Option<PathBuf> {
    let from_folders = params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .and_then(|folder| folder.uri.to_file_path().ok());
    #[allow(deprecated)]
    let from_root = params
        .root_uri
        .as_ref()
        .and_then(|uri| uri.to_file_path().ok());
    from_folders.or(from_root)
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(
        &self,
        params: InitializeParams,
    ) -> tower_lsp::jsonrpc::Result<InitializeResult> {
        if let Some(root) = workspace_root(&params) {
            self.discover_project_config(&root).await;
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
                    work_done_progress_options: Default::default(),
                }),
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "mdx-ls".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "mdx-language-server initialized")
            .await;
        if self.draft.is_some() {
            self.client
                .log_message(
                    MessageType::INFO,
                    "A saved draft is available via mdx.restoreDraft",
                )
                .await;
        }
        self.start_watching().await;
    }

    async fn shutdown(&self) -> tower_lsp::jsonrpc::Result<()> {
        let mut docs = self.documents.lock().await;
        for session in docs.values_mut() {
            session.close();
        }
        Ok(())
    }

    async fn hover(&self, params: HoverParams) -> tower_lsp::jsonrpc::Result<Option<Hover>> {
        self.handle_hover(params).await
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> tower_lsp::jsonrpc::Result<Option<DocumentSymbolResponse>> {
        self.handle_document_symbol(params).await
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> tower_lsp::jsonrpc::Result<Option<Value>> {
        self.handle_execute_command(params).await
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        self.mount(document.uri, document.text).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };

        let mut docs = self.documents.lock().await;
        if !docs.contains_key(&uri) {
            drop(docs);
            self.mount(uri, change.text).await;
            return;
        }
        let outcome = docs
            .get_mut(&uri)
            .map(|session| session.set_content(change.text))
            .unwrap_or(Ok(()));
        drop(docs); // Release the lock before talking to the client

        if let Err(e) = outcome {
            log::warn!("Failed to persist {}: {:#}", uri, e);
            self.client
                .show_message(MessageType::WARNING, format!("Could not save draft: {}", e))
                .await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Some(mut session) = self.documents.lock().await.remove(&uri) {
            session.close();
        }
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }
}
