//! Tokenizer for the expression language.

use crate::error::{ExprError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Not,
    Eof,
}

/// Token plus its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub fn tokenize(src: &str) -> Result<Vec<Spanned>> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let two = src.get(i..i + 2).unwrap_or("");
        let token = match two {
            "==" => Some(Token::Eq),
            "!=" | "<>" => Some(Token::NotEq),
            "<=" => Some(Token::LtEq),
            ">=" => Some(Token::GtEq),
            "&&" => Some(Token::And),
            "||" => Some(Token::Or),
            _ => None,
        };
        if let Some(token) = token {
            out.push(Spanned { token, pos: start });
            i += 2;
            continue;
        }

        let single = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '%' => Some(Token::Percent),
            '<' => Some(Token::Lt),
            '>' => Some(Token::Gt),
            '!' => Some(Token::Not),
            // a lone `=` reads as equality
            '=' => Some(Token::Eq),
            _ => None,
        };
        if let Some(token) = single {
            out.push(Spanned { token, pos: start });
            i += 1;
            continue;
        }

        if c == '\'' || c == '"' {
            let (s, next) = lex_string(src, i)?;
            out.push(Spanned {
                token: Token::Str(s),
                pos: start,
            });
            i = next;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            let mut j = i;
            let mut is_float = false;
            while j < bytes.len() && (bytes[j].is_ascii_digit() || bytes[j] == b'.') {
                if bytes[j] == b'.' {
                    if is_float {
                        break;
                    }
                    is_float = true;
                }
                j += 1;
            }
            let lit = &src[i..j];
            let token = if is_float {
                Token::Float(
                    lit.parse()
                        .map_err(|_| ExprError::parse(start, format!("bad number {lit}")))?,
                )
            } else {
                match lit.parse::<i64>() {
                    Ok(v) => Token::Int(v),
                    // too wide for i64; keep it as a float
                    Err(_) => Token::Float(
                        lit.parse()
                            .map_err(|_| ExprError::parse(start, format!("bad number {lit}")))?,
                    ),
                }
            };
            out.push(Spanned { token, pos: start });
            i = j;
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let mut j = i;
            while j < bytes.len()
                && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_' || bytes[j] == b'.')
            {
                j += 1;
            }
            let word = &src[i..j];
            let token = match word.to_ascii_lowercase().as_str() {
                "true" => Token::True,
                "false" => Token::False,
                "null" | "nil" => Token::Null,
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                _ => Token::Ident(word.to_string()),
            };
            out.push(Spanned { token, pos: start });
            i = j;
            continue;
        }

        return Err(ExprError::parse(start, format!("unexpected character '{c}'")));
    }

    out.push(Spanned {
        token: Token::Eof,
        pos: src.len(),
    });
    Ok(out)
}

fn lex_string(src: &str, start: usize) -> Result<(String, usize)> {
    let mut chars = src[start..].char_indices();
    let (_, quote) = chars
        .next()
        .ok_or_else(|| ExprError::parse(start, "expected string"))?;
    let mut out = String::new();
    let mut escaped = false;

    for (off, ch) in chars {
        if escaped {
            out.push(match ch {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == quote {
            return Ok((out, start + off + ch.len_utf8()));
        } else {
            out.push(ch);
        }
    }

    Err(ExprError::parse(start, "unterminated string"))
}
