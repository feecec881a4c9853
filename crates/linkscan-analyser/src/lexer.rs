//! A tolerant C tokenizer.
//!
//! The analyser never needs a full preprocessor or grammar, only a stream of
//! identifiers, literals and punctuators with their byte positions. Comments
//! and whitespace are dropped; each preprocessor directive becomes a single
//! [`TokenKind::Directive`] token so region markers can be recognised without
//! disturbing the positions of the surrounding tokens.
//!
//! Malformed input (unterminated comments or literals) never fails: the
//! offending construct simply runs to the end of the line or file.

use linkscan_common::{SourceFile, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Char,
    Punct,
    /// A whole `#...` line, continuation lines included.
    Directive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub span: Span,
}

impl<'src> Token<'src> {
    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == punct
    }

    pub fn is_ident(&self) -> bool {
        self.kind == TokenKind::Ident
    }
}

/// Multi-character punctuators, longest first.
const PUNCTUATORS: &[&str] = &[
    "<<=", ">>=", "...", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "*=",
    "/=", "%=", "+=", "-=", "&=", "^=", "|=", "##",
];

pub struct Lexer<'src> {
    file: &'src SourceFile,
    text: &'src str,
    cursor: usize,
    at_line_start: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(file: &'src SourceFile) -> Self {
        Self {
            file,
            text: &file.content,
            cursor: 0,
            at_line_start: true,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.cursor).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.text.as_bytes().get(self.cursor + ahead).copied()
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token<'src> {
        Token {
            kind,
            text: &self.text[start..self.cursor],
            span: Span::new(self.file.id, start as u32, self.cursor as u32),
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(byte) = self.peek() {
            match byte {
                b'\n' => {
                    self.cursor += 1;
                    self.at_line_start = true;
                }
                b' ' | b'\t' | b'\r' | b'\x0c' | b'\x0b' => self.cursor += 1,
                // Line splice outside a directive.
                b'\\' if self.peek_at(1) == Some(b'\n') => self.cursor += 2,
                b'/' if self.peek_at(1) == Some(b'/') => {
                    while let Some(byte) = self.peek() {
                        if byte == b'\n' {
                            break;
                        }
                        self.cursor += 1;
                    }
                }
                b'/' if self.peek_at(1) == Some(b'*') => {
                    self.cursor += 2;
                    while self.cursor < self.text.len() {
                        if self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/') {
                            self.cursor += 2;
                            break;
                        }
                        self.cursor += 1;
                    }
                    self.cursor = self.cursor.min(self.text.len());
                }
                _ => break,
            }
        }
    }

    fn lex_directive(&mut self, start: usize) -> Token<'src> {
        while let Some(byte) = self.peek() {
            match byte {
                b'\\' if self.peek_at(1) == Some(b'\n') => self.cursor += 2,
                b'\\' if self.peek_at(1) == Some(b'\r') && self.peek_at(2) == Some(b'\n') => {
                    self.cursor += 3
                }
                b'\n' => break,
                _ => self.cursor += 1,
            }
        }
        self.token(TokenKind::Directive, start)
    }

    fn lex_quoted(&mut self, quote: u8, kind: TokenKind, start: usize) -> Token<'src> {
        self.cursor += 1;
        while let Some(byte) = self.peek() {
            match byte {
                b'\\' => {
                    self.cursor += 1;
                    self.cursor += self.text[self.cursor..].chars().next().map_or(0, char::len_utf8);
                }
                b'\n' => break,
                _ if byte == quote => {
                    self.cursor += 1;
                    break;
                }
                _ => self.cursor += 1,
            }
        }
        self.cursor = self.cursor.min(self.text.len());
        self.token(kind, start)
    }

    fn lex_number(&mut self, start: usize) -> Token<'src> {
        while let Some(byte) = self.peek() {
            let exponent_sign = matches!(byte, b'+' | b'-')
                && matches!(
                    self.text.as_bytes()[self.cursor - 1],
                    b'e' | b'E' | b'p' | b'P'
                );
            if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'\'') || exponent_sign {
                self.cursor += 1;
            } else {
                break;
            }
        }
        self.token(TokenKind::Number, start)
    }

    fn lex_punct(&mut self, start: usize) -> Token<'src> {
        let rest = &self.text[start..];
        let len = PUNCTUATORS
            .iter()
            .find(|p| rest.starts_with(*p))
            .map(|p| p.len())
            .unwrap_or_else(|| rest.chars().next().map_or(1, char::len_utf8));
        self.cursor += len;
        self.token(TokenKind::Punct, start)
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Token<'src>> {
        self.skip_trivia();

        let start = self.cursor;
        let byte = self.peek()?;
        let line_start = std::mem::replace(&mut self.at_line_start, false);

        let token = match byte {
            b'#' if line_start => self.lex_directive(start),
            b'"' => self.lex_quoted(b'"', TokenKind::Str, start),
            b'\'' => self.lex_quoted(b'\'', TokenKind::Char, start),
            b'.' if self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) => self.lex_number(start),
            b'0'..=b'9' => self.lex_number(start),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' => {
                while self
                    .peek()
                    .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
                {
                    self.cursor += 1;
                }
                self.token(TokenKind::Ident, start)
            }
            _ => self.lex_punct(start),
        };
        Some(token)
    }
}

/// Tokenize a whole file.
pub fn tokenize(file: &SourceFile) -> Vec<Token<'_>> {
    Lexer::new(file).collect()
}
