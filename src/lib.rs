//! MDX Language Server
//!
//! Live MDX preview for any Language Server Protocol client.
//!
//! This library provides:
//! - A normalizer that turns GitHub-style Markdown/HTML into MDX-safe text
//! - A strict MDX compiler and an HTML renderer for its output
//! - Debounced preview sessions with persisted drafts
//! - The LSP protocol implementation and configuration management

pub mod compiler;
pub mod config;
pub mod lsp;
pub mod normalizer;
pub mod preview;
pub mod render;

// Re-exports for clean public API
pub use compiler::{CompileError, CompileOptions, CompileResult, Compiler, MdxCompiler, RenderTree};
pub use config::Config;
pub use normalizer::normalize;
pub use preview::{EditorSession, SessionSettings};
pub use render::{render_html, Theme};
