//! HTML presentation of a render tree.

use tower_lsp::lsp_types::Url;

use super::placeholder;
use super::Theme;
use crate::compiler::languages;
use crate::compiler::tree::Alignment;
use crate::compiler::{AttributeValue, CompileError, NodeKind, RenderNode, RenderTree};
use crate::normalizer::css_from_object;

const LINK_TARGET: &str = " target=\"_blank\" rel=\"noopener noreferrer\"";
const VOID_ELEMENTS: &[&str] = &["area", "br", "col", "hr", "img", "input", "source", "wbr"];
/// Dropped along with their content; the preview never runs or loads them.
const INERT_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "frame", "frameset", "object", "embed", "base", "link", "meta",
    "foreignobject",
];

/// Tag and class for the simple container kinds
fn presentation(kind: &NodeKind) -> Option<(&'static str, &'static str)> {
    let entry = match kind {
        NodeKind::Paragraph => ("p", "mdx-p"),
        NodeKind::Heading { level: 1, .. } => ("h1", "mdx-h1"),
        NodeKind::Heading { level: 2, .. } => ("h2", "mdx-h2"),
        NodeKind::Heading { level: 3, .. } => ("h3", "mdx-h3"),
        NodeKind::Heading { .. } => ("h4", "mdx-h4"),
        NodeKind::BlockQuote => ("blockquote", "mdx-blockquote"),
        NodeKind::List { start: Some(_) } => ("ol", "mdx-ol"),
        NodeKind::List { start: None } => ("ul", "mdx-ul"),
        NodeKind::ListItem { checked: None } => ("li", "mdx-li"),
        NodeKind::ListItem { checked: Some(_) } => ("li", "mdx-li task-list-item"),
        NodeKind::Emphasis => ("em", "mdx-em"),
        NodeKind::Strong => ("strong", "mdx-strong"),
        NodeKind::Strikethrough => ("del", "mdx-del"),
        NodeKind::TableRow => ("tr", "mdx-tr"),
        NodeKind::FootnoteDefinition { .. } => ("div", "mdx-footnote"),
        _ => return None,
    };
    Some(entry)
}

/// Render a compiled tree inside the themed preview container.
pub fn render_html(tree: &RenderTree, theme: Theme) -> String {
    let mut renderer = HtmlRenderer::default();
    renderer.children(&tree.root);
    wrap(&renderer.out, theme)
}

/// The panel shown in place of the preview when compilation fails.
pub fn render_error(error: &CompileError, theme: Theme) -> String {
    let location = match (error.line, error.column) {
        (Some(line), Some(column)) => {
            format!("<p class=\"mdx-error-location\">{}:{}</p>", line, column)
        }
        _ => String::new(),
    };
    let panel = format!(
        "<div class=\"mdx-error\" role=\"alert\"><p class=\"mdx-error-title\">Compile error</p>{}<pre>{}</pre></div>",
        location,
        escape(&error.message)
    );
    wrap(&panel, theme)
}

fn wrap(body: &str, theme: Theme) -> String {
    format!(
        "<article class=\"mdx-preview {}\">{}</article>",
        theme.class_name(),
        body
    )
}

#[derive(Default)]
struct HtmlRenderer {
    out: String,
    alignments: Vec<Alignment>,
    column: usize,
    in_head: bool,
}

impl HtmlRenderer {
    fn children(&mut self, node: &RenderNode) {
        for child in &node.children {
            self.node(child);
        }
    }

    fn node(&mut self, node: &RenderNode) {
        match &node.kind {
            NodeKind::Document | NodeKind::Fragment => self.children(node),
            NodeKind::Text { value } => self.out.push_str(&escape(value)),
            NodeKind::SoftBreak => self.out.push('\n'),
            NodeKind::HardBreak => self.out.push_str("<br />"),
            NodeKind::Rule => self.out.push_str("<hr class=\"mdx-hr\" />"),
            NodeKind::InlineCode { code } => {
                self.out.push_str("<code class=\"mdx-code\">");
                self.out.push_str(&escape(code));
                self.out.push_str("</code>");
            }
            NodeKind::CodeBlock { language, code } => self.code_block(language.as_deref(), code),
            NodeKind::Link { href, title } => {
                self.out.push_str("<a class=\"mdx-a\"");
                if is_safe_href(href) {
                    self.out.push_str(&format!(" href=\"{}\"", escape(href)));
                } else {
                    log::debug!("dropping unsafe link target {:?}", href);
                }
                if !title.is_empty() {
                    self.out.push_str(&format!(" title=\"{}\"", escape(title)));
                }
                self.out.push_str(LINK_TARGET);
                self.out.push('>');
                self.children(node);
                self.out.push_str("</a>");
            }
            NodeKind::Image { src, alt, title } => self.image(src, alt, title),
            NodeKind::Table { alignments } => {
                self.alignments = alignments.clone();
                self.out.push_str("<table class=\"mdx-table\">");
                let (head, body): (Vec<&RenderNode>, Vec<&RenderNode>) = node
                    .children
                    .iter()
                    .partition(|child| child.kind == NodeKind::TableHead);
                for child in head {
                    self.node(child);
                }
                if !body.is_empty() {
                    self.out.push_str("<tbody>");
                    for child in body {
                        self.node(child);
                    }
                    self.out.push_str("</tbody>");
                }
                self.out.push_str("</table>");
                self.alignments.clear();
            }
            NodeKind::TableHead => {
                self.in_head = true;
                self.column = 0;
                self.out.push_str("<thead><tr class=\"mdx-tr\">");
                self.children(node);
                self.out.push_str("</tr></thead>");
                self.in_head = false;
            }
            NodeKind::TableRow => {
                self.column = 0;
                self.container("tr", "mdx-tr", "", node);
            }
            NodeKind::TableCell => {
                let tag = if self.in_head { "th" } else { "td" };
                let extra = match self.alignments.get(self.column) {
                    Some(Alignment::Left) => " style=\"text-align: left\"",
                    Some(Alignment::Center) => " style=\"text-align: center\"",
                    Some(Alignment::Right) => " style=\"text-align: right\"",
                    _ => "",
                };
                self.column += 1;
                self.container(tag, "mdx-cell", extra, node);
            }
            NodeKind::Heading { slug, .. } => {
                let id = slug
                    .as_ref()
                    .map(|slug| format!(" id=\"{}\"", escape(slug)))
                    .unwrap_or_default();
                self.simple(node, &id);
            }
            NodeKind::List { start: Some(start) } if *start != 1 => {
                self.simple(node, &format!(" start=\"{}\"", start));
            }
            NodeKind::ListItem {
                checked: Some(checked),
            } => {
                let (tag, class) = presentation(&node.kind).unwrap_or(("li", "mdx-li"));
                self.out.push_str(&format!("<{} class=\"{}\">", tag, class));
                self.out.push_str(if *checked {
                    "<input type=\"checkbox\" disabled checked /> "
                } else {
                    "<input type=\"checkbox\" disabled /> "
                });
                self.children(node);
                self.out.push_str(&format!("</{}>", tag));
            }
            NodeKind::FootnoteDefinition { label } => {
                let attrs = format!(" id=\"fn-{}\"", escape(label));
                self.simple(node, &attrs);
            }
            NodeKind::FootnoteReference { label } => {
                let label = escape(label);
                self.out.push_str(&format!(
                    "<sup class=\"mdx-footnote-ref\"><a href=\"#fn-{}\">{}</a></sup>",
                    label, label
                ));
            }
            NodeKind::Element { name, attributes } => self.element(name, attributes, node),
            _ => self.simple(node, ""),
        }
    }

    fn simple(&mut self, node: &RenderNode, attrs: &str) {
        match presentation(&node.kind) {
            Some((tag, class)) => self.container(tag, class, attrs, node),
            None => self.children(node),
        }
    }

    fn container(&mut self, tag: &str, class: &str, attrs: &str, node: &RenderNode) {
        self.out
            .push_str(&format!("<{} class=\"{}\"{}>", tag, class, attrs));
        self.children(node);
        self.out.push_str(&format!("</{}>", tag));
    }

    fn code_block(&mut self, language: Option<&str>, code: &str) {
        self.out.push_str("<pre class=\"mdx-pre\"><code");
        if let Some(language) = language.filter(|l| languages::is_registered(l)) {
            self.out
                .push_str(&format!(" class=\"language-{}\"", escape(&language.to_ascii_lowercase())));
        }
        self.out.push('>');
        self.out.push_str(&escape(code));
        self.out.push_str("</code></pre>");
    }

    fn image(&mut self, src: &str, alt: &str, title: &str) {
        let fallback = placeholder::data_uri(alt);
        let src = if is_valid_source(src) {
            src.to_string()
        } else {
            log::debug!("invalid image source {:?}, using placeholder", src);
            fallback.clone()
        };
        self.out.push_str(&format!(
            "<img class=\"mdx-img\" src=\"{}\" alt=\"{}\"",
            escape(&src),
            escape(alt)
        ));
        if !title.is_empty() {
            self.out.push_str(&format!(" title=\"{}\"", escape(title)));
        }
        self.out.push_str(&onerror(&fallback));
        self.out.push_str(" />");
    }

    fn element(&mut self, name: &str, attributes: &[crate::compiler::Attribute], node: &RenderNode) {
        // Capitalized names are MDX components; without a component map they
        // render as plain containers.
        let component = name.chars().next().is_some_and(char::is_uppercase);
        let tag = if component {
            "div".to_string()
        } else {
            name.to_ascii_lowercase()
        };
        if INERT_ELEMENTS.contains(&tag.as_str()) {
            log::debug!("dropping <{}> element", name);
            return;
        }

        // The renderer's own class comes first, followed by the author's
        let own_class = match tag.as_str() {
            _ if component => Some("mdx-component"),
            "img" => Some("mdx-img"),
            _ => None,
        };
        let author_class = attributes.iter().find_map(|attribute| match &attribute.value {
            AttributeValue::String(value) if is_class(&attribute.name) => Some(value.as_str()),
            _ => None,
        });
        let class = match (own_class, author_class) {
            (Some(own), Some(author)) => Some(format!("{} {}", own, author)),
            (own, author) => own.or(author).map(str::to_string),
        };

        self.out.push('<');
        self.out.push_str(&tag);
        if let Some(class) = class {
            self.attribute("class", &class);
        }
        if component {
            self.out.push_str(&format!(" data-component=\"{}\"", escape(name)));
        }

        let mut alt = "";
        for attribute in attributes {
            if is_event_handler(&attribute.name) {
                log::debug!("dropping event handler {} on <{}>", attribute.name, name);
                continue;
            }
            match (&attribute.value, attribute.name.as_str()) {
                (AttributeValue::String(value), "alt") => {
                    alt = value;
                    self.attribute("alt", value);
                }
                (AttributeValue::String(value), "src" | "poster") if !is_valid_source(value) => {
                    log::debug!("invalid source {:?} on <{}>", value, name);
                }
                (AttributeValue::String(value), attr) if is_link_target(attr) && !is_safe_href(value) => {
                    log::debug!("dropping unsafe {} {:?} on <{}>", attr, value, name);
                }
                (AttributeValue::String(_), name) if is_class(name) => {}
                (AttributeValue::String(value), name) => self.attribute(name, value),
                (AttributeValue::Boolean, name) => {
                    self.out.push(' ');
                    self.out.push_str(&escape(name));
                }
                (AttributeValue::Expression(expression), "style") => {
                    let css = css_from_object(expression);
                    if !css.is_empty() {
                        self.attribute("style", &css);
                    }
                }
                (AttributeValue::Expression(expression), name) => {
                    log::trace!("dropping expression attribute {}={}", name, expression);
                }
            }
        }

        if tag == "img" {
            let fallback = placeholder::data_uri(alt);
            let has_src = attributes.iter().any(|attribute| {
                attribute.name == "src"
                    && matches!(&attribute.value, AttributeValue::String(value) if is_valid_source(value))
            });
            if !has_src {
                self.attribute("src", &fallback);
            }
            self.out.push_str(&onerror(&fallback));
        }
        if tag == "a" {
            self.out.push_str(LINK_TARGET);
        }

        if VOID_ELEMENTS.contains(&tag.as_str()) {
            self.out.push_str(" />");
            return;
        }
        self.out.push('>');
        self.children(node);
        self.out.push_str(&format!("</{}>", tag));
    }

    fn attribute(&mut self, name: &str, value: &str) {
        if name == "target" || name == "rel" {
            return;
        }
        self.out
            .push_str(&format!(" {}=\"{}\"", escape(name), escape(value)));
    }
}

/// `onclick`, `onError` and friends; only the renderer's own image fallback
/// handler reaches the output.
fn is_event_handler(name: &str) -> bool {
    name.get(..2).is_some_and(|prefix| prefix.eq_ignore_ascii_case("on"))
}

fn is_link_target(name: &str) -> bool {
    matches!(name, "href" | "action" | "formaction") || name.ends_with(":href")
}

fn is_class(name: &str) -> bool {
    name == "class" || name == "className"
}

fn onerror(fallback: &str) -> String {
    format!(" onerror=\"this.onerror=null;this.src='{}'\"", fallback)
}

/// Absolute http(s)/data URLs and plain relative paths pass; anything else
/// (empty, whitespace, script URLs) does not.
pub fn is_valid_source(src: &str) -> bool {
    let src = src.trim();
    if src.is_empty() || src.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    match Url::parse(src) {
        Ok(url) => matches!(url.scheme(), "http" | "https" | "data") && (url.has_host() || url.scheme() == "data"),
        Err(_) => !src.contains(':') || src.starts_with("./") || src.starts_with('/'),
    }
}

/// Link targets that cannot run script: http(s) and mailto URLs, fragments
/// and relative references.
pub fn is_safe_href(href: &str) -> bool {
    let href = href.trim();
    if href.chars().any(char::is_control) {
        return false;
    }
    match Url::parse(href) {
        Ok(url) => matches!(url.scheme(), "http" | "https" | "mailto"),
        Err(_) => !href
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default()
            .contains(':'),
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
