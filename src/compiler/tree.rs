//! Render tree produced by the compiler.
//!
//! Pure data, serializable so clients can render it themselves.

use serde::Serialize;

/// Column alignment of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    None,
    Left,
    Center,
    Right,
}

/// Value of an element attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum AttributeValue {
    /// Bare attribute such as `<input disabled />`
    Boolean,
    /// Quoted string
    String(String),
    /// Braced expression, kept as source text including the braces
    Expression(String),
}

/// An attribute on an embedded element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

/// What a node represents
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
    Document,
    /// Transparent grouping for constructs without their own presentation
    Fragment,
    Paragraph,
    Heading {
        level: u8,
        slug: Option<String>,
    },
    BlockQuote,
    List {
        start: Option<u64>,
    },
    ListItem {
        checked: Option<bool>,
    },
    CodeBlock {
        language: Option<String>,
        code: String,
    },
    Table {
        alignments: Vec<Alignment>,
    },
    TableHead,
    TableRow,
    TableCell,
    Emphasis,
    Strong,
    Strikethrough,
    Link {
        href: String,
        title: String,
    },
    Image {
        src: String,
        alt: String,
        title: String,
    },
    InlineCode {
        code: String,
    },
    Text {
        value: String,
    },
    SoftBreak,
    HardBreak,
    Rule,
    FootnoteDefinition {
        label: String,
    },
    FootnoteReference {
        label: String,
    },
    /// Embedded component markup (`<div>`, `<img />`, ...)
    Element {
        name: String,
        attributes: Vec<Attribute>,
    },
}

/// A node with its children
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderNode {
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderNode>,
}

impl RenderNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(NodeKind::Text {
            value: value.into(),
        })
    }

    /// Concatenated text of this node and its descendants
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, out: &mut String) {
        match &self.kind {
            NodeKind::Text { value } => out.push_str(value),
            NodeKind::InlineCode { code } => out.push_str(code),
            NodeKind::SoftBreak | NodeKind::HardBreak => out.push(' '),
            _ => {}
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }

    /// Depth-first iterator over this node and all descendants
    pub fn descendants(&self) -> Vec<&RenderNode> {
        let mut nodes = Vec::new();
        self.walk(&mut nodes);
        nodes
    }

    fn walk<'a>(&'a self, out: &mut Vec<&'a RenderNode>) {
        out.push(self);
        for child in &self.children {
            child.walk(out);
        }
    }
}

/// Compiled document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderTree {
    pub root: RenderNode,
}

impl RenderTree {
    pub fn new(children: Vec<RenderNode>) -> Self {
        Self {
            root: RenderNode {
                kind: NodeKind::Document,
                children,
            },
        }
    }

    /// Tree for an empty document
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// All nodes in document order
    pub fn nodes(&self) -> Vec<&RenderNode> {
        self.root.descendants()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_content_flattens_inline_nodes() {
        let mut strong = RenderNode::new(NodeKind::Strong);
        strong.children.push(RenderNode::text("bold"));
        let mut heading = RenderNode::new(NodeKind::Heading {
            level: 1,
            slug: None,
        });
        heading.children = vec![
            RenderNode::text("A "),
            strong,
            RenderNode::new(NodeKind::InlineCode {
                code: " code".to_string(),
            }),
        ];

        assert_eq!(heading.text_content(), "A bold code");
    }

    #[test]
    fn test_descendants_are_in_document_order() {
        let mut paragraph = RenderNode::new(NodeKind::Paragraph);
        paragraph.children.push(RenderNode::text("one"));
        let tree = RenderTree::new(vec![paragraph, RenderNode::new(NodeKind::Rule)]);

        let kinds: Vec<&NodeKind> = tree.nodes().into_iter().map(|n| &n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &NodeKind::Document,
                &NodeKind::Paragraph,
                &NodeKind::Text {
                    value: "one".to_string()
                },
                &NodeKind::Rule,
            ]
        );
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let tree = RenderTree::new(vec![RenderNode::text("hi")]);
        let json = serde_json::to_value(&tree).expect("serialize");
        assert_eq!(json["root"]["type"], "document");
        assert_eq!(json["root"]["children"][0]["type"], "text");
        assert_eq!(json["root"]["children"][0]["value"], "hi");
    }
}
