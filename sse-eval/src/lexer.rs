//! Tokenizer for the closed expression subset.

use std::fmt;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal (already unescaped).
    Str(String),
    /// Identifier or keyword.
    Ident(String),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `**`
    DoubleStar,
    /// `/`
    Slash,
    /// `//`
    DoubleSlash,
    /// `%`
    Percent,
    /// `&`
    Amp,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `==`
    Eq,
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
    /// End of input.
    Eof,
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Tokenize `src`. Errors carry the offending byte offset.
pub fn lex(src: &str) -> Result<Vec<(Tok, usize)>, (String, usize)> {
    let bytes = src.as_bytes();
    let mut i = 0;
    let mut out = Vec::new();

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        match c {
            '(' => {
                out.push((Tok::LParen, start));
                i += 1;
            }
            ')' => {
                out.push((Tok::RParen, start));
                i += 1;
            }
            '[' => {
                out.push((Tok::LBracket, start));
                i += 1;
            }
            ']' => {
                out.push((Tok::RBracket, start));
                i += 1;
            }
            '{' => {
                out.push((Tok::LBrace, start));
                i += 1;
            }
            '}' => {
                out.push((Tok::RBrace, start));
                i += 1;
            }
            ',' => {
                out.push((Tok::Comma, start));
                i += 1;
            }
            ':' => {
                out.push((Tok::Colon, start));
                i += 1;
            }
            '.' => {
                out.push((Tok::Dot, start));
                i += 1;
            }
            '~' => {
                out.push((Tok::Tilde, start));
                i += 1;
            }
            '+' => {
                out.push((Tok::Plus, start));
                i += 1;
            }
            '-' => {
                out.push((Tok::Minus, start));
                i += 1;
            }
            '^' => {
                out.push((Tok::Caret, start));
                i += 1;
            }
            '*' => {
                if bytes.get(i + 1) == Some(&b'*') {
                    out.push((Tok::DoubleStar, start));
                    i += 2;
                } else {
                    out.push((Tok::Star, start));
                    i += 1;
                }
            }
            '/' => {
                if bytes.get(i + 1) == Some(&b'/') {
                    out.push((Tok::DoubleSlash, start));
                    i += 2;
                } else {
                    out.push((Tok::Slash, start));
                    i += 1;
                }
            }
            '%' => {
                out.push((Tok::Percent, start));
                i += 1;
            }
            '&' => {
                out.push((Tok::Amp, start));
                i += 1;
            }
            '|' => {
                out.push((Tok::Pipe, start));
                i += 1;
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    out.push((Tok::Eq, start));
                    i += 2;
                } else {
                    return Err(("bare '=' is not a valid expression token".into(), start));
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    out.push((Tok::NotEq, start));
                    i += 2;
                } else {
                    return Err(("unexpected '!'".into(), start));
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    out.push((Tok::Le, start));
                    i += 2;
                } else if bytes.get(i + 1) == Some(&b'<') {
                    out.push((Tok::Shl, start));
                    i += 2;
                } else {
                    out.push((Tok::Lt, start));
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    out.push((Tok::Ge, start));
                    i += 2;
                } else if bytes.get(i + 1) == Some(&b'>') {
                    out.push((Tok::Shr, start));
                    i += 2;
                } else {
                    out.push((Tok::Gt, start));
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                i += 1;
                let mut s = String::new();
                loop {
                    // Decode as a full UTF-8 scalar, not a raw byte — a
                    // string literal's body is arbitrary Unicode text, and
                    // indexing `bytes` one at a time would split multi-byte
                    // characters into garbage.
                    let Some(ch) = src[i..].chars().next() else {
                        return Err(("unterminated string literal".into(), start));
                    };
                    if ch == quote {
                        i += ch.len_utf8();
                        break;
                    }
                    if ch == '\\' {
                        i += ch.len_utf8();
                        let Some(esc) = src[i..].chars().next() else {
                            return Err(("unterminated string literal".into(), start));
                        };
                        match esc {
                            'n' => s.push('\n'),
                            't' => s.push('\t'),
                            '\\' => s.push('\\'),
                            '\'' => s.push('\''),
                            '"' => s.push('"'),
                            other => s.push(other),
                        }
                        i += esc.len_utf8();
                        continue;
                    }
                    s.push(ch);
                    i += ch.len_utf8();
                }
                out.push((Tok::Str(s), start));
            }
            c if c.is_ascii_digit() => {
                let mut j = i;
                while j < bytes.len() && (bytes[j] as char).is_ascii_digit() {
                    j += 1;
                }
                let mut is_float = false;
                if bytes.get(j) == Some(&b'.')
                    && bytes.get(j + 1).is_some_and(|b| (*b as char).is_ascii_digit())
                {
                    is_float = true;
                    j += 1;
                    while j < bytes.len() && (bytes[j] as char).is_ascii_digit() {
                        j += 1;
                    }
                }
                if matches!(bytes.get(j), Some(b'e') | Some(b'E')) {
                    is_float = true;
                    j += 1;
                    if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
                        j += 1;
                    }
                    while j < bytes.len() && (bytes[j] as char).is_ascii_digit() {
                        j += 1;
                    }
                }
                let text = &src[i..j];
                if is_float {
                    out.push((
                        Tok::Float(text.parse().map_err(|_| ("bad float literal".to_string(), start))?),
                        start,
                    ));
                } else {
                    out.push((
                        Tok::Int(text.parse().map_err(|_| ("bad int literal".to_string(), start))?),
                        start,
                    ));
                }
                i = j;
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut j = i;
                while j < bytes.len() {
                    let ch = bytes[j] as char;
                    if ch.is_alphanumeric() || ch == '_' {
                        j += 1;
                    } else {
                        break;
                    }
                }
                out.push((Tok::Ident(src[i..j].to_string()), start));
                i = j;
            }
            other => return Err((format!("unexpected character {other:?}"), start)),
        }
    }
    out.push((Tok::Eof, bytes.len()));
    Ok(out)
}
