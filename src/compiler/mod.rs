//! MDX Compiler
//!
//! The compile collaborator: turns normalized text into a render tree or a
//! human-readable error. Markdown parsing is delegated to `pulldown-cmark`;
//! on top of it the compiler enforces the strictness of MDX for embedded
//! component markup.

mod builder;
pub mod jsx;
pub mod languages;
pub mod outline;
pub mod position;
pub mod slug;
pub mod tree;

use pulldown_cmark::{Options, Parser};
use serde::{Deserialize, Serialize};

pub use outline::{outline, HeadingInfo};
pub use position::{LineIndex, Position};
pub use slug::{slugify, Slugger};
pub use tree::{Attribute, AttributeValue, NodeKind, RenderNode, RenderTree};

/// Fixed plugin configuration of the compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// GitHub-flavored Markdown: tables, strikethrough, task lists, footnotes
    pub gfm: bool,
    /// Anchor slugs on headings
    pub heading_slugs: bool,
    /// Unknown fence languages are left unhighlighted instead of failing
    pub ignore_missing_languages: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            gfm: true,
            heading_slugs: true,
            ignore_missing_languages: true,
        }
    }
}

/// Compile failure, surfaced verbatim to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileError {
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub fn at(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            line: Some(position.line),
            column: Some(position.column),
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CompileError {}

/// Outcome of one compilation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum CompileResult {
    Success(RenderTree),
    Failure(CompileError),
}

impl CompileResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CompileResult::Success(_))
    }

    pub fn tree(&self) -> Option<&RenderTree> {
        match self {
            CompileResult::Success(tree) => Some(tree),
            CompileResult::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&CompileError> {
        match self {
            CompileResult::Success(_) => None,
            CompileResult::Failure(error) => Some(error),
        }
    }
}

/// Anything that can compile normalized text
pub trait Compiler: Send + Sync {
    fn compile(&self, source: &str) -> CompileResult;
}

/// The built-in compiler
#[derive(Debug, Clone, Default)]
pub struct MdxCompiler {
    options: CompileOptions,
}

impl MdxCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    fn parser_options(&self) -> Options {
        let mut options = Options::empty();
        if self.options.gfm {
            options.insert(Options::ENABLE_TABLES);
            options.insert(Options::ENABLE_STRIKETHROUGH);
            options.insert(Options::ENABLE_TASKLISTS);
            options.insert(Options::ENABLE_FOOTNOTES);
        }
        options
    }
}

impl Compiler for MdxCompiler {
    fn compile(&self, source: &str) -> CompileResult {
        let mut builder = builder::TreeBuilder::new(source, &self.options);

        for (event, range) in Parser::new_ext(source, self.parser_options()).into_offset_iter() {
            if let Err(error) = builder.process(event, range) {
                log::debug!("compile failed: {}", error);
                return CompileResult::Failure(error);
            }
        }

        match builder.finish() {
            Ok(tree) => CompileResult::Success(tree),
            Err(error) => {
                log::debug!("compile failed: {}", error);
                CompileResult::Failure(error)
            }
        }
    }
}
