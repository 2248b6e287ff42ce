use tower_lsp::jsonrpc::Result as LspResult;
use tower_lsp::lsp_types::*;

use crate::compiler::{outline, CompileError, CompileResult, HeadingInfo};
use crate::lsp::backend::Backend;

/// Diagnostic source reported to the client
pub const DIAGNOSTIC_SOURCE: &str = "mdx-ls";

/// Trait for handling hover requests
#[tower_lsp::async_trait]
pub trait HandleHover {
    async fn handle_hover(&self, params: HoverParams) -> LspResult<Option<Hover>>;
}

/// Trait for handling document symbols
#[tower_lsp::async_trait]
pub trait HandleDocumentSymbol {
    async fn handle_document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> LspResult<Option<DocumentSymbolResponse>>;
}

#[tower_lsp::async_trait]
impl HandleHover for Backend {
    async fn handle_hover(&self, params: HoverParams) -> LspResult<Option<Hover>> {
        let tdpp = params.text_document_position_params;
        let uri = tdpp.text_document.uri;
        let line = tdpp.position.line + 1;

        let docs = self.documents.lock().await;
        let session = match docs.get(&uri) {
            Some(session) => session,
            None => return Ok(None),
        };

        Ok(outline(session.content())
            .into_iter()
            .find(|heading| heading.line == line)
            .map(|heading| heading_hover(&heading)))
    }
}

#[tower_lsp::async_trait]
impl HandleDocumentSymbol for Backend {
    async fn handle_document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> LspResult<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri;

        let docs = self.documents.lock().await;
        let session = match docs.get(&uri) {
            Some(session) => session,
            None => return Ok(None),
        };

        Ok(Some(DocumentSymbolResponse::Nested(heading_symbols(
            session.content(),
        ))))
    }
}

fn heading_hover(heading: &HeadingInfo) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: format!(
                "**{}**\n\nHeading level {}, anchor `#{}`",
                heading.text, heading.level, heading.slug
            ),
        }),
        range: None,
    }
}

/// Diagnostics for a compile result: none on success, one error otherwise.
pub fn diagnostics_for(result: &CompileResult) -> Vec<Diagnostic> {
    match result {
        CompileResult::Success(_) => Vec::new(),
        CompileResult::Failure(error) => vec![create_lsp_diagnostic(error)],
    }
}

/// Errors without a position are reported on the first line.
pub fn create_lsp_diagnostic(error: &CompileError) -> Diagnostic {
    let line = error.line.unwrap_or(1).saturating_sub(1);
    let column = error.column.unwrap_or(1).saturating_sub(1);

    Diagnostic::new(
        Range::new(
            Position::new(line, column),
            Position::new(line, column + 1),
        ),
        Some(DiagnosticSeverity::ERROR),
        None,
        Some(DIAGNOSTIC_SOURCE.to_string()),
        error.message.clone(),
        None,
        None,
    )
}

/// Heading outline as nested symbols: each section spans up to the next
/// heading of the same or a higher level.
pub fn heading_symbols(content: &str) -> Vec<DocumentSymbol> {
    let headings = outline(content);
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len() as u32;

    let mut roots = Vec::new();
    let mut stack: Vec<(u8, DocumentSymbol)> = Vec::new();

    for (i, heading) in headings.iter().enumerate() {
        let start = heading.line - 1;
        let end = headings[i + 1..]
            .iter()
            .find(|next| next.level <= heading.level)
            .map(|next| next.line - 1)
            .unwrap_or(total);
        let width = lines
            .get(start as usize)
            .map(|line| line.encode_utf16().count() as u32)
            .unwrap_or(0);

        let symbol = DocumentSymbol {
            name: heading.text.clone(),
            detail: Some(format!("#{}", heading.slug)),
            kind: SymbolKind::STRING,
            tags: None,
            #[allow(deprecated)]
            deprecated: Some(false), // Required by tower-lsp 0.20
            range: Range::new(Position::new(start, 0), Position::new(end.max(start), 0)),
            selection_range: Range::new(Position::new(start, 0), Position::new(start, width)),
            children: None,
        };

        while stack.last().is_some_and(|(level, _)| *level >= heading.level) {
            close_section(&mut stack, &mut roots);
        }
        stack.push((heading.level, symbol));
    }
    while !stack.is_empty() {
        close_section(&mut stack, &mut roots);
    }

    roots
}

fn close_section(stack: &mut Vec<(u8, DocumentSymbol)>, roots: &mut Vec<DocumentSymbol>) {
    if let Some((_, symbol)) = stack.pop() {
        match stack.last_mut() {
            Some((_, parent)) => parent.children.get_or_insert_with(Vec::new).push(symbol),
            None => roots.push(symbol),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RenderTree;

    #[test]
    fn test_success_clears_diagnostics() {
        assert!(diagnostics_for(&CompileResult::Success(RenderTree::empty())).is_empty());
    }

    #[test]
    fn test_failure_is_one_positioned_error() {
        let error = CompileError {
            message: "Unexpected closing tag `</div>`, expected an open tag first".to_string(),
            line: Some(3),
            column: Some(5),
        };
        let diagnostics = diagnostics_for(&CompileResult::Failure(error));

        assert_eq!(diagnostics.len(), 1);
        let diagnostic = &diagnostics[0];
        assert_eq!(diagnostic.range.start, Position::new(2, 4));
        assert_eq!(diagnostic.severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(diagnostic.source.as_deref(), Some("mdx-ls"));
        assert!(diagnostic.message.starts_with("Unexpected closing tag"));
    }

    #[test]
    fn test_unpositioned_error_goes_to_first_line() {
        let diagnostic = create_lsp_diagnostic(&CompileError::new("boom"));
        assert_eq!(diagnostic.range.start, Position::new(0, 0));
    }

    #[test]
    fn test_heading_symbols_nest_by_level() {
        let content = "# Project\n\nIntro\n\n## Install\n\ntext\n\n### From source\n\n## Usage\n\n# Appendix\n";
        let symbols = heading_symbols(content);

        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "Project");
        assert_eq!(symbols[1].name, "Appendix");

        let children = symbols[0].children.as_ref().expect("children");
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "Install");
        assert_eq!(children[0].detail.as_deref(), Some("#install"));
        assert_eq!(
            children[0].children.as_ref().expect("grandchildren")[0].name,
            "From source"
        );
        assert_eq!(children[1].name, "Usage");

        assert_eq!(symbols[0].range.start, Position::new(0, 0));
        assert_eq!(symbols[0].range.end, Position::new(12, 0));
        assert_eq!(symbols[0].selection_range.end, Position::new(0, 9));
        assert_eq!(children[0].range.end, Position::new(10, 0));
    }

    #[test]
    fn test_heading_hover() {
        let hover = heading_hover(&HeadingInfo {
            level: 2,
            text: "Install".to_string(),
            slug: "install".to_string(),
            line: 5,
        });
        match hover.contents {
            HoverContents::Markup(markup) => {
                assert!(markup.value.contains("`#install`"));
                assert!(markup.value.contains("level 2"));
            }
            other => panic!("Expected markup, got {:?}", other),
        }
    }
}
