//! Inline style conversion
//!
//! Converts CSS declaration strings into the object-literal form MDX expects
//! (`style={{ textAlign: "center" }}`) and back again for HTML output.

use regex::Regex;
use std::sync::LazyLock;

static OBJECT_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:"([^"]+)"|([A-Za-z_$][\w$]*))\s*:\s*"((?:[^"\\]|\\.)*)""#)
        .expect("object entry regex")
});

/// Build the object literal for a CSS declaration list.
///
/// Returns `None` when no declaration is well formed, in which case the
/// caller leaves the original attribute alone.
pub fn style_object(css: &str) -> Option<String> {
    let entries: Vec<String> = css
        .split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let key = property_key(name.trim())?;
            Some(format!("{}: \"{}\"", key, escape_value(value.trim())))
        })
        .collect();

    if entries.is_empty() {
        None
    } else {
        Some(format!("{{{{ {} }}}}", entries.join(", ")))
    }
}

/// Render an object-literal style expression back into CSS.
///
/// Only string-valued entries are understood; anything else is skipped.
pub fn css_from_object(expression: &str) -> String {
    OBJECT_ENTRY
        .captures_iter(expression)
        .map(|caps| {
            let property = match caps.get(1) {
                Some(quoted) => quoted.as_str().to_string(),
                None => kebab_case(&caps[2]),
            };
            let value = caps[3].replace("\\\"", "\"").replace("\\\\", "\\");
            format!("{}: {}", property, value)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Object key for a CSS property name, `None` if the name is not a property.
fn property_key(name: &str) -> Option<String> {
    let body = name.trim_start_matches('-');
    let valid = body.starts_with(|c: char| c.is_ascii_alphabetic())
        && body.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return None;
    }

    // Custom properties keep their exact spelling
    if name.starts_with("--") {
        return Some(format!("\"{}\"", name));
    }
    let name = name.to_ascii_lowercase();

    let mut key = String::with_capacity(name.len());
    for (i, segment) in name.split('-').enumerate() {
        if segment.is_empty() {
            continue;
        }
        // `-ms-` is the one vendor prefix that stays lowercase
        if i == 0 || (i == 1 && segment == "ms" && name.starts_with('-')) {
            key.push_str(segment);
        } else {
            let mut chars = segment.chars();
            if let Some(first) = chars.next() {
                key.push(first.to_ascii_uppercase());
                key.push_str(chars.as_str());
            }
        }
    }
    Some(key)
}

fn kebab_case(key: &str) -> String {
    let mut css = String::with_capacity(key.len() + 4);
    if key.starts_with("ms") && key[2..].starts_with(|c: char| c.is_ascii_uppercase()) {
        css.push('-');
    }
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            css.push('-');
            css.push(c.to_ascii_lowercase());
        } else {
            css.push(c);
        }
    }
    css
}

fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
