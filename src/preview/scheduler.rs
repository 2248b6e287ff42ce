//! Debounced, cancellable compilation.
//!
//! Every edit gets a generation number. Scheduling aborts the pending
//! compile, waits out the debounce delay, then normalizes and compiles on the
//! blocking pool. A result is only sent if no newer edit arrived meanwhile;
//! a session checks the generation again when it applies the result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_lsp::lsp_types::Url;

use crate::compiler::{CompileResult, Compiler, RenderTree};
use crate::normalizer::normalize;

/// A finished compilation of one generation of a document
#[derive(Debug, Clone)]
pub struct CompiledPreview {
    pub uri: Url,
    pub generation: u64,
    pub result: CompileResult,
}

pub struct CompileScheduler {
    uri: Url,
    delay: Duration,
    compiler: Arc<dyn Compiler>,
    generation: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
    sink: mpsc::UnboundedSender<CompiledPreview>,
}

impl CompileScheduler {
    pub fn new(
        uri: Url,
        delay: Duration,
        compiler: Arc<dyn Compiler>,
        sink: mpsc::UnboundedSender<CompiledPreview>,
    ) -> Self {
        Self {
            uri,
            delay,
            compiler,
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
            sink,
        }
    }

    /// Latest generation handed out
    pub fn latest(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    pub fn set_compiler(&mut self, compiler: Arc<dyn Compiler>) {
        self.compiler = compiler;
    }

    /// Schedule a compile of `text`, superseding anything pending.
    ///
    /// Empty text is delivered right away as an empty tree; the compiler is
    /// not involved.
    pub fn schedule(&mut self, text: String) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.abort_pending();

        if text.is_empty() {
            self.deliver(CompiledPreview {
                uri: self.uri.clone(),
                generation,
                result: CompileResult::Success(RenderTree::empty()),
            });
            return generation;
        }

        let uri = self.uri.clone();
        let delay = self.delay;
        let compiler = self.compiler.clone();
        let latest = self.generation.clone();
        let sink = self.sink.clone();

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if latest.load(Ordering::SeqCst) != generation {
                return;
            }

            let compiled = tokio::task::spawn_blocking(move || {
                let normalized = normalize(&text);
                compiler.compile(&normalized)
            })
            .await;
            let result = match compiled {
                Ok(result) => result,
                Err(e) => {
                    log::error!("Compile task for {} failed: {}", uri, e);
                    return;
                }
            };

            if latest.load(Ordering::SeqCst) != generation {
                log::debug!("Discarding stale compile of {} (generation {})", uri, generation);
                return;
            }
            if sink
                .send(CompiledPreview {
                    uri,
                    generation,
                    result,
                })
                .is_err()
            {
                log::debug!("Preview receiver closed");
            }
        }));

        generation
    }

    /// Cancel the pending compile; anything still in flight becomes stale.
    pub fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.abort_pending();
    }

    fn abort_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    fn deliver(&self, preview: CompiledPreview) {
        if self.sink.send(preview).is_err() {
            log::debug!("Preview receiver closed");
        }
    }
}

impl Drop for CompileScheduler {
    fn drop(&mut self) {
        self.abort_pending();
    }
}
