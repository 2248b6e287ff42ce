//! Normalizer rules
//!
//! Every rule is a pure text rewrite. None of them can fail: text a rule does
//! not recognise passes through untouched.

use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::LazyLock;

use super::style::style_object;

static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment regex"));

static DIV_ALIGN: LazyLock<Regex> = LazyLock::new(|| align_pattern("div"));

static IMG_ALIGN: LazyLock<Regex> = LazyLock::new(|| align_pattern("img"));

static IMG_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<img((?:[\s/][^>]*)?)>").expect("img regex"));

// Tag names are matched case-sensitively: `<DIV>` is a component in MDX.
// Openers end at the first `>`, or stop short of the next `<` when unterminated.
static DIV_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<div(?:[\s/][^<>]*>?|>|$)").expect("div open regex"));

static DIV_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</div(?:\s*>|\s|$)").expect("div close regex"));

static DIV_ANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</div(?:\s*>|\s|$)|<div(?:[\s/][^<>]*>?|>|$)").expect("div regex")
});

static STYLE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\s)style\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("style regex")
});

const CLOSING_DIV: &str = "</div>";

/// `<tag ... align="X" ...>` with the attributes on either side captured.
fn align_pattern(tag: &str) -> Regex {
    Regex::new(&format!(
        r#"<{}((?:\s[^>]*?)?)\s(?i:align)\s*=\s*(?:"([^"]*)"|'([^']*)')([^>]*)>"#,
        tag
    ))
    .expect("align regex")
}

fn quoted_value<'t>(caps: &'t Captures, double: usize, single: usize) -> &'t str {
    caps.get(double)
        .or_else(|| caps.get(single))
        .map(|m| m.as_str())
        .unwrap_or("")
}

fn rewrite_align(input: &str, pattern: &Regex, tag: &str, property: &str) -> String {
    pattern
        .replace_all(input, |caps: &Captures| {
            format!(
                "<{}{} style=\"{}: {}\"{}>",
                tag,
                &caps[1],
                property,
                quoted_value(caps, 2, 3).trim(),
                &caps[4]
            )
        })
        .into_owned()
}

/// Self-closed tags (`<div />`) neither open nor close anything. An
/// unterminated `<div /` still opens a div.
fn is_self_closed(tag: &str) -> bool {
    tag.strip_suffix('>')
        .is_some_and(|tag| tag.trim_end().ends_with('/'))
}

/// Closers go on their own lines after a blank line so they form a
/// separate HTML block instead of ending the last paragraph.
fn append_closers(text: &mut String, count: usize) {
    if count == 0 {
        return;
    }
    let trailing = text.len() - text.trim_end_matches('\n').len();
    for _ in trailing..2 {
        text.push('\n');
    }
    text.push_str(&vec![CLOSING_DIV; count].join("\n"));
}

/// Rule 1: drop `<!-- ... -->` comments, including multi-line ones.
pub fn strip_comments(input: &str) -> String {
    HTML_COMMENT.replace_all(input, "").into_owned()
}

/// Rule 2: `<div align="X">` becomes `<div style="text-align: X">`.
pub fn align_divs(input: &str) -> String {
    rewrite_align(input, &DIV_ALIGN, "div", "text-align")
}

/// Rule 3: `<img align="X">` becomes `<img style="float: X">`.
pub fn float_images(input: &str) -> String {
    rewrite_align(input, &IMG_ALIGN, "img", "float")
}

/// Rule 4: every `<img>` ends with `/>`.
pub fn self_close_images(input: &str) -> String {
    IMG_TAG
        .replace_all(input, |caps: &Captures| {
            let attributes = caps[1].trim_end();
            if attributes.ends_with('/') {
                caps[0].to_string()
            } else {
                format!("<img{} />", attributes)
            }
        })
        .into_owned()
}

/// Rule 5: a `<div>` with no `</div>` anywhere after it gets a closer
/// appended at the end of the document.
///
/// This looks for *any* later closer, not the one that matches in a nesting
/// sense; rule 8 repairs whatever count mismatch is left.
pub fn close_dangling_divs(input: &str) -> String {
    let last_close = DIV_CLOSE.find_iter(input).last().map(|m| m.start());
    let dangling = DIV_OPEN
        .find_iter(input)
        .filter(|open| !is_self_closed(open.as_str()))
        .filter(|open| last_close.is_none_or(|close| close < open.end()))
        .count();

    let mut output = input.to_string();
    append_closers(&mut output, dangling);
    output
}

/// Rule 6: `&nbsp;` becomes a plain space.
pub fn replace_nbsp(input: &str) -> String {
    input.replace("&nbsp;", " ")
}

/// Rule 7: `style="a: b; c: d"` becomes `style={{ a: "b", c: "d" }}`.
pub fn style_objects(input: &str) -> String {
    STYLE_ATTR
        .replace_all(input, |caps: &Captures| {
            match style_object(quoted_value(caps, 2, 3)) {
                Some(object) => format!("{}style={}", &caps[1], object),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Rule 8: make `<div>` openers and `</div>` closers pair up.
///
/// Closers seen while no div is open are removed; opens still pending at the
/// end get closers appended. An unterminated `<div x` counts as an opener.
pub fn balance_divs(input: &str) -> String {
    let mut output = input.to_string();
    loop {
        let (strays, depth) = scan_divs(&output);
        if strays.is_empty() {
            append_closers(&mut output, depth);
            return output;
        }
        // Removing a closer can join the text around it into a new tag, so rescan
        for stray in strays.into_iter().rev() {
            output.replace_range(stray, "");
        }
    }
}

/// Spans of closers with no open div before them, and the number of divs
/// still open at the end.
fn scan_divs(input: &str) -> (Vec<Range<usize>>, usize) {
    let mut strays = Vec::new();
    let mut depth = 0usize;

    for tag in DIV_ANY.find_iter(input) {
        let text = tag.as_str();
        if text.starts_with("</") {
            if depth == 0 {
                strays.push(tag.range());
            } else {
                depth -= 1;
            }
        } else if !is_self_closed(text) {
            depth += 1;
        }
    }
    (strays, depth)
}
