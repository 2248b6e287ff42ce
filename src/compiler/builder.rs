//! Render tree construction from the Markdown event stream.
//!
//! Markdown constructs and embedded elements share one frame stack, so an
//! element left open when its surrounding paragraph (or list item, ...) ends
//! is reported the same way MDX reports it.

use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Tag, TagEnd};

use super::jsx::{self, JsxToken};
use super::languages;
use super::position::LineIndex;
use super::slug::Slugger;
use super::tree::{Alignment, AttributeValue, NodeKind, RenderNode, RenderTree};
use super::{CompileError, CompileOptions};

enum Origin {
    Document,
    Markdown(&'static str),
    Element { name: String, offset: usize },
}

struct Frame {
    node: RenderNode,
    origin: Origin,
    offset: usize,
}

/// Adjacent text events merged before they are attached
#[derive(Default)]
struct PendingText {
    offset: usize,
    text: String,
    /// Offsets in `text` of `<` that came from an entity or a backslash escape
    literal: Vec<usize>,
}

impl PendingText {
    fn has_tag(&self) -> bool {
        contains_tag(&self.text, &self.literal)
    }
}

pub(crate) struct TreeBuilder<'a> {
    source: &'a str,
    options: &'a CompileOptions,
    index: LineIndex<'a>,
    stack: Vec<Frame>,
    slugger: Slugger,
    /// HTML block text collected until the block ends, with its start offset
    html_block: Option<(usize, String)>,
    pending_text: Option<PendingText>,
}

impl<'a> TreeBuilder<'a> {
    pub(crate) fn new(source: &'a str, options: &'a CompileOptions) -> Self {
        Self {
            source,
            options,
            index: LineIndex::new(source),
            stack: vec![Frame {
                node: RenderNode::new(NodeKind::Document),
                origin: Origin::Document,
                offset: 0,
            }],
            slugger: Slugger::new(),
            html_block: None,
            pending_text: None,
        }
    }

    pub(crate) fn process(&mut self, event: Event, range: Range<usize>) -> Result<(), CompileError> {
        if let Event::Text(text) = &event {
            if let Some(code) = self.open_code_block() {
                code.push_str(text);
            } else {
                let literal = literal_markup(self.source, &range, text);
                let pending = self.pending_text.get_or_insert_with(|| PendingText {
                    offset: range.start,
                    ..PendingText::default()
                });
                let base = pending.text.len();
                pending.literal.extend(literal.into_iter().map(|at| base + at));
                pending.text.push_str(text);
            }
            return Ok(());
        }
        self.flush_text()?;

        match event {
            Event::Start(Tag::HtmlBlock) => {
                self.html_block = Some((range.start, String::new()));
            }
            Event::End(TagEnd::HtmlBlock) => {
                if let Some((offset, html)) = self.html_block.take() {
                    self.apply_fragment(&html, offset, true)?;
                }
            }
            Event::Html(html) => match self.html_block.as_mut() {
                Some((_, buffer)) => buffer.push_str(&html),
                None => self.apply_fragment(&html, range.start, true)?,
            },
            Event::InlineHtml(html) => self.apply_fragment(&html, range.start, false)?,
            Event::Start(tag) => self.start(tag, range.start),
            Event::End(_) => self.end()?,
            Event::Text(_) => {}
            Event::Code(code) => self.attach(RenderNode::new(NodeKind::InlineCode {
                code: code.to_string(),
            })),
            Event::InlineMath(math) => self.attach(RenderNode::new(NodeKind::InlineCode {
                code: math.to_string(),
            })),
            Event::DisplayMath(math) => self.attach(RenderNode::new(NodeKind::CodeBlock {
                language: Some("math".to_string()),
                code: math.to_string(),
            })),
            Event::SoftBreak => self.attach(RenderNode::new(NodeKind::SoftBreak)),
            Event::HardBreak => self.attach(RenderNode::new(NodeKind::HardBreak)),
            Event::Rule => self.attach(RenderNode::new(NodeKind::Rule)),
            Event::FootnoteReference(label) => {
                self.attach(RenderNode::new(NodeKind::FootnoteReference {
                    label: label.to_string(),
                }))
            }
            Event::TaskListMarker(checked) => {
                // Loose list items wrap the marker in a paragraph
                let item = self
                    .stack
                    .iter_mut()
                    .rev()
                    .find_map(|frame| match &mut frame.node.kind {
                        NodeKind::ListItem { checked: slot } => Some(slot),
                        _ => None,
                    });
                if let Some(slot) = item {
                    *slot = Some(checked);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<RenderTree, CompileError> {
        self.flush_text()?;
        if let Some((offset, html)) = self.html_block.take() {
            self.apply_fragment(&html, offset, true)?;
        }

        while let Some(frame) = self.stack.pop() {
            match frame.origin {
                Origin::Document => {
                    return Ok(RenderTree::new(frame.node.children));
                }
                Origin::Element { name, offset } => {
                    return Err(self.unclosed(&name, offset, "document"));
                }
                // Markdown frames are always closed by the event stream
                Origin::Markdown(_) => self.attach(frame.node),
            }
        }

        Ok(RenderTree::empty())
    }

    fn start(&mut self, tag: Tag, offset: usize) {
        let (kind, construct) = match tag {
            Tag::Paragraph => (NodeKind::Paragraph, "paragraph"),
            Tag::Heading { level, .. } => (
                NodeKind::Heading {
                    level: heading_level(level),
                    slug: None,
                },
                "heading",
            ),
            Tag::BlockQuote(_) => (NodeKind::BlockQuote, "blockquote"),
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => languages::fence_language(&info),
                    CodeBlockKind::Indented => None,
                };
                (
                    NodeKind::CodeBlock {
                        language,
                        code: String::new(),
                    },
                    "code",
                )
            }
            Tag::List(start) => (NodeKind::List { start }, "list"),
            Tag::Item => (NodeKind::ListItem { checked: None }, "listItem"),
            Tag::FootnoteDefinition(label) => (
                NodeKind::FootnoteDefinition {
                    label: label.to_string(),
                },
                "footnoteDefinition",
            ),
            Tag::Table(alignments) => (
                NodeKind::Table {
                    alignments: alignments.into_iter().map(alignment).collect(),
                },
                "table",
            ),
            Tag::TableHead => (NodeKind::TableHead, "tableRow"),
            Tag::TableRow => (NodeKind::TableRow, "tableRow"),
            Tag::TableCell => (NodeKind::TableCell, "tableCell"),
            Tag::Emphasis => (NodeKind::Emphasis, "emphasis"),
            Tag::Strong => (NodeKind::Strong, "strong"),
            Tag::Strikethrough => (NodeKind::Strikethrough, "delete"),
            Tag::Link {
                dest_url, title, ..
            } => (
                NodeKind::Link {
                    href: dest_url.to_string(),
                    title: title.to_string(),
                },
                "link",
            ),
            Tag::Image {
                dest_url, title, ..
            } => (
                NodeKind::Image {
                    src: dest_url.to_string(),
                    alt: String::new(),
                    title: title.to_string(),
                },
                "image",
            ),
            _ => (NodeKind::Fragment, "fragment"),
        };

        self.stack.push(Frame {
            node: RenderNode::new(kind),
            origin: Origin::Markdown(construct),
            offset,
        });
    }

    fn end(&mut self) -> Result<(), CompileError> {
        if self.stack.len() <= 1 {
            return Ok(());
        }
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };

        let construct = match frame.origin {
            Origin::Markdown(construct) => construct,
            Origin::Element { name, offset } => {
                let construct = self.innermost_construct();
                return Err(self.unclosed(&name, offset, construct));
            }
            Origin::Document => "document",
        };
        log::trace!("closing {} at offset {}", construct, frame.offset);

        let mut node = frame.node;
        let text: String = node.children.iter().map(RenderNode::text_content).collect();
        match &mut node.kind {
            NodeKind::Heading { slug, .. } if self.options.heading_slugs => {
                *slug = Some(self.slugger.slug(&text));
            }
            NodeKind::Image { alt, .. } => {
                *alt = text;
                node.children.clear();
            }
            NodeKind::CodeBlock {
                language: Some(language),
                ..
            } if !self.options.ignore_missing_languages && !languages::is_registered(language) => {
                return Err(self.error_at(
                    format!("Unknown language: `{}` is not registered", language),
                    frame.offset,
                ));
            }
            _ => {}
        }

        self.attach(node);
        Ok(())
    }

    /// Text runs are plain text unless they contain tag-like markup that the
    /// Markdown parser could not recognise as HTML (expression attributes).
    fn flush_text(&mut self) -> Result<(), CompileError> {
        let Some(pending) = self.pending_text.take() else {
            return Ok(());
        };
        if pending.has_tag() {
            self.apply_markup(&pending.text, pending.offset, false, &pending.literal)
        } else {
            self.attach(RenderNode::text(pending.text));
            Ok(())
        }
    }

    /// Apply one piece of markup; `block` fragments drop whitespace-only text.
    fn apply_fragment(&mut self, fragment: &str, base: usize, block: bool) -> Result<(), CompileError> {
        self.apply_markup(fragment, base, block, &[])
    }

    fn apply_markup(
        &mut self,
        fragment: &str,
        base: usize,
        block: bool,
        literal: &[usize],
    ) -> Result<(), CompileError> {
        let tokens = jsx::tokenize_with_literals(fragment, literal)
            .map_err(|error| self.error_at(error.message, base + error.offset))?;

        for token in tokens {
            match token {
                JsxToken::Open {
                    name,
                    attributes,
                    self_closing,
                    offset,
                } => {
                    let offset = base + offset;
                    if let Some(style) = attributes.iter().find(|attr| {
                        attr.name == "style" && matches!(attr.value, AttributeValue::String(_))
                    }) {
                        log::debug!("rejecting string style on <{}>: {:?}", name, style.value);
                        return Err(self.error_at(
                            "The `style` prop expects a mapping from style properties to values, not a string".to_string(),
                            offset,
                        ));
                    }

                    let node = RenderNode::new(NodeKind::Element {
                        name: name.clone(),
                        attributes,
                    });
                    if self_closing {
                        self.attach(node);
                    } else {
                        self.stack.push(Frame {
                            node,
                            origin: Origin::Element { name, offset },
                            offset,
                        });
                    }
                }
                JsxToken::Close { name, offset } => {
                    let offset = base + offset;
                    let open = match self.stack.last() {
                        Some(Frame {
                            origin: Origin::Element { name: open, offset: open_offset },
                            ..
                        }) => Some((open.clone(), *open_offset)),
                        _ => None,
                    };
                    match open {
                        Some((open, _)) if open == name => {
                            if let Some(frame) = self.stack.pop() {
                                self.attach(frame.node);
                            }
                        }
                        Some((open, open_offset)) => {
                            let message = format!(
                                "Unexpected closing tag `</{}>`, expected corresponding closing tag for `<{}>` ({})",
                                name,
                                open,
                                self.index.position(open_offset)
                            );
                            return Err(self.error_at(message, offset));
                        }
                        None => {
                            return Err(self.error_at(
                                format!(
                                    "Unexpected closing tag `</{}>`, expected an open tag first",
                                    name
                                ),
                                offset,
                            ));
                        }
                    }
                }
                JsxToken::Text { value, .. } => {
                    if !(block && value.trim().is_empty()) {
                        self.attach(RenderNode::text(value));
                    }
                }
            }
        }

        Ok(())
    }

    fn open_code_block(&mut self) -> Option<&mut String> {
        match self.stack.last_mut() {
            Some(Frame {
                node:
                    RenderNode {
                        kind: NodeKind::CodeBlock { code, .. },
                        ..
                    },
                ..
            }) => Some(code),
            _ => None,
        }
    }

    fn attach(&mut self, node: RenderNode) {
        if let Some(parent) = self.stack.last_mut() {
            parent.node.children.push(node);
        }
    }

    fn innermost_construct(&self) -> &'static str {
        self.stack
            .iter()
            .rev()
            .find_map(|frame| match frame.origin {
                Origin::Markdown(construct) => Some(construct),
                _ => None,
            })
            .unwrap_or("document")
    }

    fn unclosed(&self, name: &str, offset: usize, construct: &str) -> CompileError {
        let position = self.index.position(offset);
        let message = format!(
            "Expected a closing tag for `<{}>` ({}) before the end of `{}`",
            name, position, construct
        );
        CompileError::at(message, position)
    }

    fn error_at(&self, message: String, offset: usize) -> CompileError {
        CompileError::at(message, self.index.position(offset))
    }
}

/// Offsets of `<` in a text event that the source spells as `&lt;`, `&#60;`
/// or `\<`. Those are text even when a name follows them.
fn literal_markup(source: &str, range: &Range<usize>, text: &str) -> Vec<usize> {
    let raw = source.get(range.clone()).unwrap_or_default();
    let decoded = raw != text;
    let escaped = source
        .get(..range.start)
        .unwrap_or_default()
        .bytes()
        .rev()
        .take_while(|b| *b == b'\\')
        .count()
        % 2
        == 1;
    text.match_indices('<')
        .map(|(i, _)| i)
        .filter(|i| decoded || (escaped && *i == 0))
        .collect()
}

fn contains_tag(text: &str, literal: &[usize]) -> bool {
    text.match_indices('<').any(|(i, _)| {
        !literal.contains(&i)
            && text[i + 1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '/')
    })
}

pub(super) fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn alignment(alignment: pulldown_cmark::Alignment) -> Alignment {
    match alignment {
        pulldown_cmark::Alignment::None => Alignment::None,
        pulldown_cmark::Alignment::Left => Alignment::Left,
        pulldown_cmark::Alignment::Center => Alignment::Center,
        pulldown_cmark::Alignment::Right => Alignment::Right,
    }
}
