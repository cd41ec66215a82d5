//! Tokenizer for recipe programs.

use crate::error::{ExprError, ExprResult};

/// A single lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier or keyword (`true`, `false` are resolved by the parser).
    Ident(String),
    /// Integer literal.
    Int(i64),
    /// Floating literal.
    Float(f64),
    /// Quoted string literal with escapes resolved.
    Str(String),
    // Punctuation
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `?`
    Question,
    /// `:`
    Colon,
    // Arithmetic
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    // Comparison
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    // Logic
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `!`
    Bang,
    /// End of input.
    Eof,
}

/// A token with its starting byte offset.
#[derive(Debug, Clone)]
pub struct Spanned {
    /// The token.
    pub token: Token,
    /// Byte offset into the source.
    pub offset: usize,
}

/// Splits `src` into tokens, always terminated by [`Token::Eof`].
///
/// # Errors
///
/// Returns [`ExprError::Lex`] on an unexpected character, an unterminated
/// string, or a numeric literal out of range.
pub fn lex(src: &str) -> ExprResult<Vec<Spanned>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let c = bytes[pos];

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;

        if c == b'"' || c == b'\'' {
            let (s, next) = lex_string(src, pos, c)?;
            tokens.push(Spanned {
                token: Token::Str(s),
                offset: start,
            });
            pos = next;
            continue;
        }

        if c.is_ascii_digit() {
            let (tok, next) = lex_number(src, pos)?;
            tokens.push(Spanned { token: tok, offset: start });
            pos = next;
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Ident(src[start..pos].to_string()),
                offset: start,
            });
            continue;
        }

        let next = bytes.get(pos + 1).copied();
        let (token, width) = match (c, next) {
            (b'=', Some(b'=')) => (Token::EqEq, 2),
            (b'!', Some(b'=')) => (Token::NotEq, 2),
            (b'<', Some(b'=')) => (Token::Le, 2),
            (b'>', Some(b'=')) => (Token::Ge, 2),
            (b'&', Some(b'&')) => (Token::AndAnd, 2),
            (b'|', Some(b'|')) => (Token::OrOr, 2),
            (b'<', _) => (Token::Lt, 1),
            (b'>', _) => (Token::Gt, 1),
            (b'!', _) => (Token::Bang, 1),
            (b'(', _) => (Token::LParen, 1),
            (b')', _) => (Token::RParen, 1),
            (b',', _) => (Token::Comma, 1),
            (b'.', _) => (Token::Dot, 1),
            (b'?', _) => (Token::Question, 1),
            (b':', _) => (Token::Colon, 1),
            (b'+', _) => (Token::Plus, 1),
            (b'-', _) => (Token::Minus, 1),
            (b'*', _) => (Token::Star, 1),
            (b'/', _) => (Token::Slash, 1),
            (b'%', _) => (Token::Percent, 1),
            _ => {
                let ch = src[pos..].chars().next().unwrap_or('?');
                return Err(ExprError::lex(pos, format!("unexpected character '{ch}'")));
            }
        };
        tokens.push(Spanned { token, offset: start });
        pos += width;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        offset: src.len(),
    });
    Ok(tokens)
}

fn lex_string(src: &str, start: usize, quote: u8) -> ExprResult<(String, usize)> {
    let bytes = src.as_bytes();
    let mut out = String::new();
    let mut pos = start + 1;
    loop {
        let Some(&b) = bytes.get(pos) else {
            return Err(ExprError::lex(start, "unterminated string literal"));
        };
        if b == quote {
            return Ok((out, pos + 1));
        }
        if b == b'\\' {
            let esc = bytes
                .get(pos + 1)
                .copied()
                .ok_or_else(|| ExprError::lex(pos, "unterminated escape in string"))?;
            out.push(match esc {
                b'n' => '\n',
                b't' => '\t',
                b'\\' => '\\',
                b'"' => '"',
                b'\'' => '\'',
                other => {
                    return Err(ExprError::lex(
                        pos,
                        format!("unknown escape '\\{}'", char::from(other)),
                    ))
                }
            });
            pos += 2;
            continue;
        }
        // Copy a whole UTF-8 scalar, not a byte.
        let ch = src[pos..].chars().next().unwrap_or('\u{FFFD}');
        out.push(ch);
        pos += ch.len_utf8();
    }
}

fn lex_number(src: &str, start: usize) -> ExprResult<(Token, usize)> {
    let bytes = src.as_bytes();
    let mut pos = start;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }

    let mut is_float = false;
    if pos + 1 < bytes.len() && bytes[pos] == b'.' && bytes[pos + 1].is_ascii_digit() {
        is_float = true;
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut probe = pos + 1;
        if probe < bytes.len() && (bytes[probe] == b'+' || bytes[probe] == b'-') {
            probe += 1;
        }
        if probe < bytes.len() && bytes[probe].is_ascii_digit() {
            is_float = true;
            pos = probe;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }

    let text = &src[start..pos];
    let token = if is_float {
        let v: f64 = text
            .parse()
            .map_err(|_| ExprError::lex(start, format!("invalid float literal '{text}'")))?;
        if !v.is_finite() {
            return Err(ExprError::lex(start, format!("float literal out of range '{text}'")));
        }
        Token::Float(v)
    } else {
        let v: i64 = text
            .parse()
            .map_err(|_| ExprError::lex(start, format!("integer literal out of range '{text}'")))?;
        Token::Int(v)
    };
    Ok((token, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        lex(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_lex_arithmetic() {
        assert_eq!(
            kinds("500 + rand(300)"),
            vec![
                Token::Int(500),
                Token::Plus,
                Token::Ident("rand".into()),
                Token::LParen,
                Token::Int(300),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_floats_and_members() {
        assert_eq!(
            kinds("input0.attack >= 1.5e2"),
            vec![
                Token::Ident("input0".into()),
                Token::Dot,
                Token::Ident("attack".into()),
                Token::Ge,
                Token::Float(150.0),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_strings_with_escapes() {
        assert_eq!(
            kinds(r#"Name == "iron \"sword\"" || 'x'"#),
            vec![
                Token::Ident("Name".into()),
                Token::EqEq,
                Token::Str("iron \"sword\"".into()),
                Token::OrOr,
                Token::Str("x".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_rejects_garbage() {
        assert!(matches!(lex("1 # 2"), Err(ExprError::Lex { offset: 2, .. })));
        assert!(matches!(lex("\"open"), Err(ExprError::Lex { .. })));
        assert!(matches!(lex("99999999999999999999"), Err(ExprError::Lex { .. })));
    }
}
