//! Generated placeholder images.

const WIDTH: u32 = 480;
const HEIGHT: u32 = 240;

/// SVG placeholder labelled with `label`, as a `data:` URI safe to embed in
/// single- or double-quoted attributes.
pub fn data_uri(label: &str) -> String {
    let label = if label.trim().is_empty() {
        "Image unavailable"
    } else {
        label.trim()
    };
    let svg = format!(
        "<svg xmlns='http://www.w3.org/2000/svg' width='{w}' height='{h}' viewBox='0 0 {w} {h}'>\
         <rect width='100%' height='100%' fill='#e2e8f0'/>\
         <text x='50%' y='50%' fill='#64748b' font-family='sans-serif' font-size='18' \
         text-anchor='middle' dominant-baseline='middle'>{label}</text></svg>",
        w = WIDTH,
        h = HEIGHT,
        label = escape_xml(&truncate(label, 48)),
    );
    format!("data:image/svg+xml;charset=utf-8,{}", percent_encode(&svg))
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max - 1).collect();
    short.push('…');
    short
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;")
}

fn percent_encode(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len() * 2);
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' | b':'
            | b'=' | b',' | b';' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_is_attribute_safe() {
        let uri = data_uri("Logo \"quoted\" <b>");
        assert!(uri.starts_with("data:image/svg+xml;charset=utf-8,%3Csvg"));
        for forbidden in ['"', '\'', '<', '>', ' ', '#'] {
            assert!(!uri.contains(forbidden), "contains {:?}", forbidden);
        }
    }

    #[test]
    fn test_default_label() {
        assert!(data_uri("  ").contains("Image%20unavailable"));
        assert!(data_uri("Logo").contains("%3ELogo%3C"));
    }

    #[test]
    fn test_long_labels_are_truncated() {
        let long = "x".repeat(100);
        assert!(!data_uri(&long).contains(&"x".repeat(60)));
    }
}
