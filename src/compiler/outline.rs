//! Heading outline of a document.
//!
//! Independent of compile success: an outline is available even while the
//! document has markup errors.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use super::builder::heading_level;
use super::position::LineIndex;
use super::slug::Slugger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingInfo {
    pub level: u8,
    pub text: String,
    pub slug: String,
    /// 1-based line of the heading
    pub line: u32,
}

pub fn outline(source: &str) -> Vec<HeadingInfo> {
    let index = LineIndex::new(source);
    let mut slugger = Slugger::new();
    let mut headings = Vec::new();
    let mut current: Option<(u8, usize, String)> = None;

    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    for (event, range) in Parser::new_ext(source, options).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some((heading_level(level), range.start, String::new()));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, _, buffer)) = current.as_mut() {
                    buffer.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some((_, _, buffer)) = current.as_mut() {
                    buffer.push(' ');
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, offset, text)) = current.take() {
                    let text = text.trim().to_string();
                    headings.push(HeadingInfo {
                        level,
                        slug: slugger.slug(&text),
                        line: index.position(offset).line,
                        text,
                    });
                }
            }
            _ => {}
        }
    }

    headings
}
