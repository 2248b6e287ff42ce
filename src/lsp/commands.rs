//! `workspace/executeCommand` surface.

use std::path::PathBuf;

use serde_json::{json, Value};
use tower_lsp::jsonrpc::{Error, Result as LspResult};
use tower_lsp::lsp_types::*;

use crate::compiler::CompileResult;
use crate::lsp::backend::Backend;
use crate::render::Theme;

pub const PREVIEW: &str = "mdx.preview";
pub const NORMALIZE: &str = "mdx.normalize";
pub const EXPORT: &str = "mdx.export";
pub const IMPORT: &str = "mdx.import";
pub const SET_THEME: &str = "mdx.setTheme";
pub const RESTORE_DRAFT: &str = "mdx.restoreDraft";

/// Every command the server advertises
pub const COMMANDS: &[&str] = &[PREVIEW, NORMALIZE, EXPORT, IMPORT, SET_THEME, RESTORE_DRAFT];

/// Trait for handling executeCommand requests
#[tower_lsp::async_trait]
pub trait HandleExecuteCommand {
    async fn handle_execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> LspResult<Option<Value>>;
}

#[tower_lsp::async_trait]
impl HandleExecuteCommand for Backend {
    async fn handle_execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> LspResult<Option<Value>> {
        let args = params.arguments;
        log::debug!("executeCommand {} {:?}", params.command, args);

        match params.command.as_str() {
            PREVIEW => {
                let uri = uri_argument(&args, 0)?;
                let docs = self.documents.lock().await;
                let session = docs.get(&uri).ok_or_else(|| unknown_document(&uri))?;
                let value = match session.result() {
                    Some(CompileResult::Failure(error)) => json!({
                        "error": error.message,
                        "line": error.line,
                        "column": error.column,
                    }),
                    _ => json!({
                        "html": session.preview_html(),
                        "theme": session.theme(),
                    }),
                };
                Ok(Some(value))
            }
            NORMALIZE => {
                let uri = uri_argument(&args, 0)?;
                let docs = self.documents.lock().await;
                let session = docs.get(&uri).ok_or_else(|| unknown_document(&uri))?;
                Ok(Some(Value::String(session.normalized())))
            }
            EXPORT => {
                let uri = uri_argument(&args, 0)?;
                let docs = self.documents.lock().await;
                let session = docs.get(&uri).ok_or_else(|| unknown_document(&uri))?;
                Ok(Some(Value::String(session.export().to_string())))
            }
            IMPORT => {
                let uri = uri_argument(&args, 0)?;
                let path = PathBuf::from(string_argument(&args, 1)?);
                self.import(uri, path).await
            }
            SET_THEME => {
                let theme: Theme = string_argument(&args, 0)?
                    .parse()
                    .map_err(|e: anyhow::Error| Error::invalid_params(e.to_string()))?;
                self.config.lock().await.theme = theme;
                let mut docs = self.documents.lock().await;
                for session in docs.values_mut() {
                    session.set_theme(theme);
                }
                Ok(Some(json!({ "theme": theme })))
            }
            RESTORE_DRAFT => Ok(Some(
                self.draft
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            )),
            other => Err(Error::invalid_params(format!("Unknown command: {}", other))),
        }
    }
}

impl Backend {
    async fn import(&self, uri: Url, path: PathBuf) -> LspResult<Option<Value>> {
        let (previous, outcome) = {
            let mut docs = self.documents.lock().await;
            let session = docs.get_mut(&uri).ok_or_else(|| unknown_document(&uri))?;
            let previous = session.content().to_string();
            let outcome = session
                .import_file(&path)
                .map(|()| session.content().to_string());
            (previous, outcome)
        };

        match outcome {
            Ok(text) => {
                // Keep the client buffer in step with the imported document
                let edit = WorkspaceEdit {
                    changes: Some(
                        [(uri.clone(), vec![TextEdit::new(full_range(&previous), text)])]
                            .into_iter()
                            .collect(),
                    ),
                    ..Default::default()
                };
                if let Err(e) = self.client.apply_edit(edit).await {
                    log::warn!("Client rejected import edit for {}: {}", uri, e);
                }
                Ok(Some(json!({ "imported": true })))
            }
            Err(e) => {
                let message = format!("{:#}", e);
                log::warn!("Import into {} failed: {}", uri, message);
                self.client
                    .show_message(MessageType::WARNING, format!("Import failed: {}", message))
                    .await;
                Ok(Some(json!({ "imported": false, "error": message })))
            }
        }
    }
}

/// Range covering all of `text`, in UTF-16 columns
pub fn full_range(text: &str) -> Range {
    let line = text.matches('\n').count() as u32;
    let last = text.rsplit('\n').next().unwrap_or("");
    Range::new(
        Position::new(0, 0),
        Position::new(line, last.encode_utf16().count() as u32),
    )
}

fn string_argument(args: &[Value], index: usize) -> LspResult<String> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_params(format!("Expected a string argument at {}", index)))
}

fn uri_argument(args: &[Value], index: usize) -> LspResult<Url> {
    let raw = string_argument(args, index)?;
    Url::parse(&raw).map_err(|e| Error::invalid_params(format!("Invalid URI {}: {}", raw, e)))
}

fn unknown_document(uri: &Url) -> Error {
    Error::invalid_params(format!("Document is not open: {}", uri))
}
