//! Tag tokenizer for embedded component markup.
//!
//! Splits an HTML fragment from the Markdown stream into open tags, closing
//! tags and text, with the strictness of MDX: no comments, quoted or braced
//! attribute values only, every `<` must start a tag.

use super::tree::{Attribute, AttributeValue};

#[derive(Debug, Clone, PartialEq)]
pub enum JsxToken {
    Open {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
        offset: usize,
    },
    Close {
        name: String,
        offset: usize,
    },
    Text {
        value: String,
        offset: usize,
    },
}

/// Syntax error at a byte offset within the fragment
#[derive(Debug, Clone, PartialEq)]
pub struct JsxSyntaxError {
    pub message: String,
    pub offset: usize,
}

const NAME_START_HINT: &str =
    "expected a character that can start a name, such as a letter, `$`, or `_`";

fn unexpected(c: char, context: &str) -> String {
    format!("Unexpected character `{}` (U+{:04X}) {}", c, c as u32, context)
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&accept) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn error(&self, message: String) -> JsxSyntaxError {
        JsxSyntaxError {
            message,
            offset: self.pos,
        }
    }

    fn eof_error(&self, context: &str) -> JsxSyntaxError {
        self.error(format!("Unexpected end of file {}", context))
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '$' || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '$' | '_' | '-' | '.' | ':')
}

/// Tokenize one fragment.
pub fn tokenize(fragment: &str) -> Result<Vec<JsxToken>, JsxSyntaxError> {
    tokenize_with_literals(fragment, &[])
}

/// Like [`tokenize`], but the `<` at each offset in `literal` is plain text.
pub fn tokenize_with_literals(
    fragment: &str,
    literal: &[usize],
) -> Result<Vec<JsxToken>, JsxSyntaxError> {
    let mut cursor = Cursor {
        src: fragment,
        pos: 0,
    };
    let mut tokens = Vec::new();

    while cursor.pos < fragment.len() {
        let rest = &fragment[cursor.pos..];
        let text_len = rest
            .match_indices('<')
            .map(|(i, _)| i)
            .find(|i| !literal.contains(&(cursor.pos + i)))
            .unwrap_or(rest.len());
        if text_len > 0 {
            tokens.push(JsxToken::Text {
                value: rest[..text_len].to_string(),
                offset: cursor.pos,
            });
            cursor.pos += text_len;
            continue;
        }

        tokens.push(read_tag(&mut cursor)?);
    }

    Ok(tokens)
}

fn read_tag(cursor: &mut Cursor) -> Result<JsxToken, JsxSyntaxError> {
    let offset = cursor.pos;
    cursor.bump(); // <

    let closing = cursor.eat('/');
    match cursor.peek() {
        Some(c) if is_name_start(c) => {}
        Some('!') if cursor.src[cursor.pos..].starts_with("!--") => {
            return Err(cursor.error(format!(
                "{} (note: to create a comment in MDX, use `{{/* text */}}`)",
                unexpected('!', &format!("before name, {}", NAME_START_HINT))
            )));
        }
        Some(c) => {
            return Err(cursor.error(unexpected(c, &format!("before name, {}", NAME_START_HINT))));
        }
        None => return Err(cursor.eof_error("before name")),
    }

    let name = cursor.take_while(is_name_char).to_string();
    cursor.skip_whitespace();

    if closing {
        return match cursor.bump() {
            Some('>') => Ok(JsxToken::Close { name, offset }),
            Some(c) => Err(JsxSyntaxError {
                message: unexpected(c, "after name, expected `>` in closing tag"),
                offset: cursor.pos - c.len_utf8(),
            }),
            None => Err(cursor.eof_error("in closing tag, expected `>`")),
        };
    }

    let mut attributes = Vec::new();
    loop {
        cursor.skip_whitespace();
        match cursor.peek() {
            Some('>') => {
                cursor.bump();
                return Ok(JsxToken::Open {
                    name,
                    attributes,
                    self_closing: false,
                    offset,
                });
            }
            Some('/') => {
                cursor.bump();
                return match cursor.bump() {
                    Some('>') => Ok(JsxToken::Open {
                        name,
                        attributes,
                        self_closing: true,
                        offset,
                    }),
                    Some(c) => Err(JsxSyntaxError {
                        message: unexpected(c, "after self-closing slash, expected `>`"),
                        offset: cursor.pos - c.len_utf8(),
                    }),
                    None => Err(cursor.eof_error("after self-closing slash, expected `>`")),
                };
            }
            Some(c) if is_name_start(c) => attributes.push(read_attribute(cursor)?),
            Some(c) => {
                return Err(cursor.error(unexpected(
                    c,
                    "before attribute name, expected a character that can start an attribute name, such as a letter, `$`, or `_`",
                )));
            }
            None => return Err(cursor.eof_error("in tag, expected `>`")),
        }
    }
}

fn read_attribute(cursor: &mut Cursor) -> Result<Attribute, JsxSyntaxError> {
    let name = cursor.take_while(is_name_char).to_string();
    cursor.skip_whitespace();
    if !cursor.eat('=') {
        return Ok(Attribute {
            name,
            value: AttributeValue::Boolean,
        });
    }
    cursor.skip_whitespace();

    let value = match cursor.peek() {
        Some(quote @ ('"' | '\'')) => {
            cursor.bump();
            let value = cursor.take_while(|c| c != quote).to_string();
            if !cursor.eat(quote) {
                return Err(cursor.eof_error("in attribute value, expected a closing quote"));
            }
            AttributeValue::String(value)
        }
        Some('{') => AttributeValue::Expression(read_expression(cursor)?),
        Some(c) => {
            return Err(cursor.error(unexpected(
                c,
                "before attribute value, expected a character that can start an attribute value, such as `\"`, `'`, or `{`",
            )));
        }
        None => return Err(cursor.eof_error("before attribute value")),
    };

    Ok(Attribute { name, value })
}

/// Braced expression with nesting; string literals may contain braces.
fn read_expression(cursor: &mut Cursor) -> Result<String, JsxSyntaxError> {
    let start = cursor.pos;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    while let Some(c) = cursor.bump() {
        match (quote, c) {
            (Some(_), '\\') => {
                cursor.bump();
            }
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'' | '`') => quote = Some(c),
            (None, '{') => depth += 1,
            (None, '}') => {
                depth -= 1;
                if depth == 0 {
                    return Ok(cursor.src[start..cursor.pos].to_string());
                }
            }
            (None, _) => {}
        }
    }

    Err(JsxSyntaxError {
        message: "Unexpected end of file in expression, expected a corresponding closing brace for `{`".to_string(),
        offset: start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_attr(name: &str, value: &str) -> Attribute {
        Attribute {
            name: name.to_string(),
            value: AttributeValue::String(value.to_string()),
        }
    }

    #[test]
    fn test_literal_angle_brackets_stay_text() {
        let tokens = tokenize_with_literals("<b> then <br/>", &[0]).expect("tokenize");
        assert_eq!(
            tokens,
            vec![
                JsxToken::Text {
                    value: "<b> then ".to_string(),
                    offset: 0,
                },
                JsxToken::Open {
                    name: "br".to_string(),
                    attributes: vec![],
                    self_closing: true,
                    offset: 9,
                },
            ]
        );
    }

    #[test]
    fn test_open_text_close() {
        let tokens = tokenize(r#"<div class="a">hi</div>"#).expect("tokenize");
        assert_eq!(
            tokens,
            vec![
                JsxToken::Open {
                    name: "div".to_string(),
                    attributes: vec![string_attr("class", "a")],
                    self_closing: false,
                    offset: 0,
                },
                JsxToken::Text {
                    value: "hi".to_string(),
                    offset: 15,
                },
                JsxToken::Close {
                    name: "div".to_string(),
                    offset: 17,
                },
            ]
        );
    }

    #[test]
    fn test_self_closing_with_expression() {
        let tokens =
            tokenize(r#"<img src='a.png' style={{ float: "left" }} hidden />"#).expect("tokenize");
        assert_eq!(tokens.len(), 1);
        match &tokens[0] {
            JsxToken::Open {
                name,
                attributes,
                self_closing,
                ..
            } => {
                assert_eq!(name, "img");
                assert!(self_closing);
                assert_eq!(attributes[0], string_attr("src", "a.png"));
                assert_eq!(
                    attributes[1].value,
                    AttributeValue::Expression(r#"{{ float: "left" }}"#.to_string())
                );
                assert_eq!(attributes[2].value, AttributeValue::Boolean);
            }
            other => panic!("Expected open tag, got {:?}", other),
        }
    }

    #[test]
    fn test_whitespace_text_is_kept() {
        let tokens = tokenize("<b>a</b> <i>b</i>").expect("tokenize");
        assert_eq!(
            tokens[3],
            JsxToken::Text {
                value: " ".to_string(),
                offset: 8,
            }
        );
        assert_eq!(tokens.len(), 7);
    }

    #[test]
    fn test_comment_is_rejected() {
        let error = tokenize("a <!-- note -->").expect_err("comment");
        assert!(error.message.starts_with("Unexpected character `!` (U+0021) before name"));
        assert!(error.message.contains("{/* text */}"));
        assert_eq!(error.offset, 3);
    }

    #[test]
    fn test_unquoted_attribute_value_is_rejected() {
        let error = tokenize("<img width=100 />").expect_err("unquoted");
        assert!(error.message.contains("before attribute value"));
        assert_eq!(error.offset, 11);
    }

    #[test]
    fn test_stray_less_than_is_rejected() {
        let error = tokenize("<div>a < b</div>").expect_err("stray <");
        assert!(error.message.starts_with("Unexpected character ` ` (U+0020) before name"));
    }

    #[test]
    fn test_unterminated_tag() {
        let error = tokenize("<img src=\"a.png\"").expect_err("eof");
        assert_eq!(error.message, "Unexpected end of file in tag, expected `>`");
    }

    #[test]
    fn test_expression_with_braces_in_strings() {
        let tokens = tokenize(r#"<x a={{ b: "}" }} />"#).expect("tokenize");
        match &tokens[0] {
            JsxToken::Open { attributes, .. } => assert_eq!(
                attributes[0].value,
                AttributeValue::Expression(r#"{{ b: "}" }}"#.to_string())
            ),
            other => panic!("Expected open tag, got {:?}", other),
        }
    }
}
