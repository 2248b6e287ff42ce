//! Per-document editor state and the commands that act on it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc;
use tower_lsp::lsp_types::Url;

use super::scheduler::{CompileScheduler, CompiledPreview};
use super::storage::{ContentStore, CONTENT_KEY};
use crate::compiler::{CompileResult, Compiler, RenderTree};
use crate::normalizer::normalize;
use crate::render::{render_error, render_html, Theme};

/// File extensions accepted by [`EditorSession::import_file`]
pub const IMPORT_EXTENSIONS: &[&str] = &["md", "mdx"];

/// Settings a session is mounted with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub theme: Theme,
    pub debounce: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            debounce: super::DEFAULT_DEBOUNCE,
        }
    }
}

pub struct EditorSession {
    uri: Url,
    content: String,
    theme: Theme,
    scheduler: CompileScheduler,
    result: Option<CompileResult>,
    store: Option<Arc<ContentStore>>,
}

impl EditorSession {
    /// Attach to a document and schedule its first compile.
    pub fn mount(
        uri: Url,
        text: String,
        settings: &SessionSettings,
        compiler: Arc<dyn Compiler>,
        store: Option<Arc<ContentStore>>,
        sink: mpsc::UnboundedSender<CompiledPreview>,
    ) -> Self {
        let scheduler = CompileScheduler::new(uri.clone(), settings.debounce, compiler, sink);
        let mut session = Self {
            uri,
            content: text,
            theme: settings.theme,
            scheduler,
            result: None,
            store,
        };
        session.scheduler.schedule(session.content.clone());
        session
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Latest compile result applied to this session
    pub fn result(&self) -> Option<&CompileResult> {
        self.result.as_ref()
    }

    /// Generation the session is waiting for
    pub fn generation(&self) -> u64 {
        self.scheduler.latest()
    }

    /// Replace the document and reschedule compilation.
    ///
    /// The document is replaced even when persisting it fails; the error is
    /// returned so the caller can warn about it.
    pub fn set_content(&mut self, text: String) -> Result<()> {
        self.content = text;
        self.scheduler.schedule(self.content.clone());
        self.persist()
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn set_debounce(&mut self, delay: Duration) {
        self.scheduler.set_delay(delay);
    }

    /// Swap the compiler and recompile the current document.
    pub fn set_compiler(&mut self, compiler: Arc<dyn Compiler>) {
        self.scheduler.set_compiler(compiler);
        self.scheduler.schedule(self.content.clone());
    }

    /// Load a `.md`/`.mdx` file as the new document. Nothing changes when the
    /// file is rejected or unreadable.
    pub fn import_file(&mut self, path: &Path) -> Result<()> {
        let accepted = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMPORT_EXTENSIONS
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed))
            });
        if !accepted {
            return Err(anyhow!(
                "Only .md and .mdx files can be imported: {}",
                path.display()
            ));
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        log::info!("Imported {} into {}", path.display(), self.uri);
        if let Err(e) = self.set_content(text) {
            log::warn!("Failed to persist imported document: {:#}", e);
        }
        Ok(())
    }

    /// The document verbatim, for clipboard export
    pub fn export(&self) -> &str {
        &self.content
    }

    pub fn normalized(&self) -> String {
        normalize(&self.content)
    }

    /// Accept a compile result if it belongs to the latest generation.
    pub fn apply(&mut self, preview: CompiledPreview) -> bool {
        if preview.uri != self.uri || preview.generation != self.scheduler.latest() {
            log::debug!(
                "Ignoring stale preview for {} (generation {}, latest {})",
                preview.uri,
                preview.generation,
                self.scheduler.latest()
            );
            return false;
        }
        self.result = Some(preview.result);
        true
    }

    /// Rendered preview: the compiled tree, or the error panel when the last
    /// compile failed.
    pub fn preview_html(&self) -> String {
        match &self.result {
            Some(CompileResult::Success(tree)) => render_html(tree, self.theme),
            Some(CompileResult::Failure(error)) => render_error(error, self.theme),
            None => render_html(&RenderTree::empty(), self.theme),
        }
    }

    /// Stop any pending compile.
    pub fn close(&mut self) {
        self.scheduler.cancel();
    }

    fn persist(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.save(CONTENT_KEY, &self.content),
            None => Ok(()),
        }
    }
}
