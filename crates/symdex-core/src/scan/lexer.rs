//! Tokenizer with automatic statement terminators.
//!
//! A `;` token is inserted at a line break when the last token on the line
//! is an identifier, literal, `)`, `]`, `}`, `++`, `--` or one of the
//! keywords `break`, `continue`, `fallthrough`, `return`.

use crate::error::{SymdexError, SymdexResult};
use crate::patch::Span;
use crate::validation::is_keyword;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident,
    Keyword,
    /// Number, string, raw string or rune literal.
    Literal,
    Punct,
    /// Explicit `;` or one inserted at a line break.
    Semi,
    Eof,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub line: u32,
}

/// A comment with the line it starts and ends on.
#[derive(Debug, Clone)]
pub(crate) struct Comment {
    pub text: String,
    pub start_line: u32,
    pub end_line: u32,
}

pub(crate) struct Lexed {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
}

const PUNCT3: &[&str] = &["<<=", ">>=", "&^=", "...", "&&=", "||="];
const PUNCT2: &[&str] = &[
    ":=", "==", "!=", "<=", ">=", "&&", "||", "<-", "++", "--", "+=", "-=", "*=", "/=", "%=",
    "&=", "|=", "^=", "<<", ">>", "&^",
];

pub(crate) fn lex(file: &str, src: &str) -> SymdexResult<Lexed> {
    let bytes = src.as_bytes();
    let mut tokens: Vec<Token> = Vec::new();
    let mut comments = Vec::new();
    let mut line = 1u32;
    let mut i = 0usize;

    let error = |line: u32, message: &str| SymdexError::Parse {
        file: file.to_string(),
        line,
        message: message.to_string(),
    };

    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\n' {
            insert_semi(&mut tokens, src, i as u64, line);
            line += 1;
            i += 1;
            continue;
        }
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if src[i..].starts_with("//") {
            let end = src[i..].find('\n').map(|p| i + p).unwrap_or(bytes.len());
            comments.push(Comment {
                text: src[i + 2..end].trim().to_string(),
                start_line: line,
                end_line: line,
            });
            i = end;
            continue;
        }
        if src[i..].starts_with("/*") {
            let Some(p) = src[i + 2..].find("*/") else {
                return Err(error(line, "unterminated block comment"));
            };
            let end = i + 2 + p + 2;
            let body = &src[i + 2..end - 2];
            let newlines = body.matches('\n').count() as u32;
            comments.push(Comment {
                text: body.trim().to_string(),
                start_line: line,
                end_line: line + newlines,
            });
            if newlines > 0 {
                insert_semi(&mut tokens, src, i as u64, line);
            }
            line += newlines;
            i = end;
            continue;
        }

        let start = i;
        let kind = if c == b'_' || c.is_ascii_alphabetic() || c >= 0x80 {
            while i < bytes.len() {
                let Some(ch) = src[i..].chars().next() else {
                    break;
                };
                if ch == '_' || ch.is_alphanumeric() {
                    i += ch.len_utf8();
                } else {
                    break;
                }
            }
            if i == start {
                // A non-identifier multi-byte character: skip it.
                i += src[i..].chars().next().map(char::len_utf8).unwrap_or(1);
                continue;
            }
            if is_keyword(&src[start..i]) {
                TokenKind::Keyword
            } else {
                TokenKind::Ident
            }
        } else if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
        {
            i += 1;
            while i < bytes.len() {
                let b = bytes[i];
                let exponent_sign = (b == b'+' || b == b'-')
                    && matches!(bytes[i - 1], b'e' | b'E' | b'p' | b'P')
                    && !src[start..].starts_with("0x");
                if b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || exponent_sign {
                    i += 1;
                } else {
                    break;
                }
            }
            TokenKind::Literal
        } else if c == b'"' || c == b'\'' {
            i += 1;
            loop {
                match bytes.get(i) {
                    None | Some(b'\n') => return Err(error(line, "unterminated literal")),
                    Some(b'\\') => i += 2,
                    Some(&b) if b == c => {
                        i += 1;
                        break;
                    }
                    Some(_) => i += 1,
                }
            }
            TokenKind::Literal
        } else if c == b'`' {
            let Some(p) = src[i + 1..].find('`') else {
                return Err(error(line, "unterminated raw string"));
            };
            let end = i + 1 + p + 1;
            let newlines = src[i..end].matches('\n').count() as u32;
            tokens.push(Token {
                kind: TokenKind::Literal,
                span: Span::new(start as u64, end as u64),
                line,
            });
            line += newlines;
            i = end;
            continue;
        } else if c == b';' {
            i += 1;
            TokenKind::Semi
        } else {
            let rest = &src[i..];
            let width = PUNCT3
                .iter()
                .find(|p| rest.starts_with(**p))
                .map(|p| p.len())
                .or_else(|| PUNCT2.iter().find(|p| rest.starts_with(**p)).map(|p| p.len()))
                .unwrap_or(1);
            i += width;
            TokenKind::Punct
        };

        tokens.push(Token {
            kind,
            span: Span::new(start as u64, i as u64),
            line,
        });
    }

    insert_semi(&mut tokens, src, bytes.len() as u64, line);
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::at(bytes.len() as u64),
        line,
    });
    Ok(Lexed { tokens, comments })
}

fn insert_semi(tokens: &mut Vec<Token>, src: &str, at: u64, line: u32) {
    let Some(last) = tokens.last() else {
        return;
    };
    let text = last.span.slice(src).unwrap_or("");
    let terminates = match last.kind {
        TokenKind::Ident | TokenKind::Literal => true,
        TokenKind::Keyword => matches!(text, "break" | "continue" | "fallthrough" | "return"),
        TokenKind::Punct => matches!(text, ")" | "]" | "}" | "++" | "--"),
        TokenKind::Semi | TokenKind::Eof => false,
    };
    if terminates {
        tokens.push(Token {
            kind: TokenKind::Semi,
            span: Span::at(at),
            line,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_and_text(src: &str) -> Vec<(TokenKind, String)> {
        lex("t.go", src)
            .unwrap()
            .tokens
            .iter()
            .map(|t| (t.kind, t.span.slice(src).unwrap().to_string()))
            .collect()
    }

    #[test]
    fn inserts_semicolons_after_line_enders() {
        let toks = kinds_and_text("x := f(a)\nreturn\n");
        let semis = toks.iter().filter(|(k, _)| *k == TokenKind::Semi).count();
        assert_eq!(semis, 2);
    }

    #[test]
    fn no_semicolon_after_open_brace_or_comma() {
        let toks = kinds_and_text("f(a,\n b) {\n}\n");
        let texts: Vec<_> = toks.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["f", "(", "a", ",", "b", ")", "{", "}", "", ""]);
    }

    #[test]
    fn multi_char_punctuation() {
        let toks = kinds_and_text("a := b... &^= c");
        let texts: Vec<_> = toks.iter().map(|(_, t)| t.as_str()).collect();
        assert!(texts.contains(&":="));
        assert!(texts.contains(&"..."));
        assert!(texts.contains(&"&^="));
    }

    #[test]
    fn literals_and_keywords() {
        let toks = kinds_and_text("var s = \"a\\\"b\" + `raw\nx` + 'c' + 1.5e-3");
        assert_eq!(toks[0].0, TokenKind::Keyword);
        let literals = toks.iter().filter(|(k, _)| *k == TokenKind::Literal).count();
        assert_eq!(literals, 4);
    }

    #[test]
    fn comments_are_collected_with_lines() {
        let lexed = lex("t.go", "// Doc line\nvar x int /* a\nb */\n").unwrap();
        assert_eq!(lexed.comments.len(), 2);
        assert_eq!(lexed.comments[0].text, "Doc line");
        assert_eq!(lexed.comments[1].start_line, 2);
        assert_eq!(lexed.comments[1].end_line, 3);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(lex("t.go", "var s = \"abc\n").is_err());
    }
}
