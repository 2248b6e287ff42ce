//! Markdown Normalizer
//!
//! Rewrites GitHub-README-style Markdown/HTML into a form a strict MDX
//! compiler accepts. The rules are plain text substitutions applied in a
//! fixed order; this is a best-effort heuristic, not an HTML parser.

pub mod rules;
pub mod style;

pub use style::{css_from_object, style_object};

/// A single named rewrite step
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

/// The rule set, in application order.
///
/// `align-divs` and `float-images` must run before `style-objects` since
/// they emit plain `style="..."` attributes.
pub const RULES: [Rule; 8] = [
    Rule {
        name: "strip-comments",
        apply: rules::strip_comments,
    },
    Rule {
        name: "align-divs",
        apply: rules::align_divs,
    },
    Rule {
        name: "float-images",
        apply: rules::float_images,
    },
    Rule {
        name: "self-close-images",
        apply: rules::self_close_images,
    },
    Rule {
        name: "close-dangling-divs",
        apply: rules::close_dangling_divs,
    },
    Rule {
        name: "replace-nbsp",
        apply: rules::replace_nbsp,
    },
    Rule {
        name: "style-objects",
        apply: rules::style_objects,
    },
    Rule {
        name: "balance-divs",
        apply: rules::balance_divs,
    },
];

/// Normalize a document for the MDX compiler.
///
/// Empty input comes back unchanged; callers skip compilation for it.
pub fn normalize(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    RULES.iter().fold(input.to_string(), |text, rule| {
        let rewritten = (rule.apply)(&text);
        if rewritten != text {
            log::trace!("normalizer rule '{}' rewrote the document", rule.name);
        }
        rewritten
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_unchanged() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_centered_div() {
        let output = normalize(r#"<div align="center">hi</div>"#);
        assert!(output.contains(r#"<div style={{ textAlign: "center" }}>hi</div>"#));
    }

    #[test]
    fn test_floating_image_is_self_closed() {
        let output = normalize(r#"<img src="x.png" align="left">"#);
        assert_eq!(output, r#"<img src="x.png" style={{ float: "left" }} />"#);
    }

    #[test]
    fn test_unclosed_div_gets_one_closer() {
        let output = normalize("<div>unclosed");
        assert!(output.starts_with("<div>unclosed"));
        assert!(output.ends_with("</div>"));
        assert_eq!(output.matches("</div>").count(), 1);
    }

    #[test]
    fn test_unterminated_div_keeps_its_closer() {
        assert_eq!(normalize("<div x</div>"), "<div x</div>");

        let output = normalize("<div>a<div x");
        assert_eq!(output.matches("<div").count(), 2);
        assert_eq!(output.matches("</div>").count(), 2);
    }

    #[test]
    fn test_plain_markdown_only_loses_nbsp() {
        let input = "# Title\n\nSome *text*&nbsp;here.\n\n- a\n- b\n";
        assert_eq!(normalize(input), "# Title\n\nSome *text* here.\n\n- a\n- b\n");
    }

    #[test]
    fn test_github_readme_header() {
        let input = concat!(
            "<!-- badges -->\n",
            "<div align=\"center\">\n",
            "  <img src=\"logo.png\" width=\"120\" align=\"right\">\n",
            "  <h1>Project</h1>\n",
            "\n",
            "A short&nbsp;description.\n",
        );
        let output = normalize(input);

        assert!(!output.contains("<!--"));
        assert!(output.contains(r#"<div style={{ textAlign: "center" }}>"#));
        assert!(output.contains(r#"<img src="logo.png" width="120" style={{ float: "right" }} />"#));
        assert!(output.contains("A short description."));
        assert!(output.ends_with("\n\n</div>"));
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<&str> = RULES.iter().map(|rule| rule.name).collect();
        assert_eq!(
            names,
            [
                "strip-comments",
                "align-divs",
                "float-images",
                "self-close-images",
                "close-dangling-divs",
                "replace-nbsp",
                "style-objects",
                "balance-divs",
            ]
        );
    }

    #[test]
    fn test_normalized_output_is_a_fixed_point() {
        let once = normalize("<div align=\"left\"><img src=\"a.png\" align=\"left\">\n\ntext");
        assert_eq!(normalize(&once), once);
    }
}
