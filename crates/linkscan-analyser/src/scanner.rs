//! Top-level statement splitting and declaration scanning.
//!
//! The scanner works on file-scope statements only. A statement ends at a `;`
//! outside any bracket, or at the `}` that closes a function body. Each
//! declarator of a declaration becomes one [`DeclarationEvent`]; nothing is
//! merged here.
//!
//! Shapes recognised:
//!
//! ```c
//! int f(void);            // Function, no body
//! int f(void) { ... }     // Function, has_body
//! static int x;           // Variable
//! extern int y = 1;       // Variable, has_initializer
//! int a, *b, c[4] = {0};  // three Variables
//! void (*handler)(int);   // Variable (function pointer)
//! ```

use crate::error::{codes, Result};
use crate::lexer::{Token, TokenKind};
use crate::linkage::StorageKeywords;
use crate::region::{Region, RegionTracker};
use linkscan_common::{Diagnostic, Span};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Variable,
    Function,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Variable => f.write_str("variable"),
            EntityKind::Function => f.write_str("function"),
        }
    }
}

/// One declarator of one top-level declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationEvent {
    pub name: SmolStr,
    pub kind: EntityKind,
    pub storage: StorageKeywords,
    /// A function declarator followed by a `{ ... }` body.
    pub has_body: bool,
    /// A variable declarator followed by `= ...`.
    pub has_initializer: bool,
    pub region: Region,
    /// Span of the declared name.
    pub span: Span,
}

impl DeclarationEvent {
    pub fn is_definition(&self) -> bool {
        self.has_body || self.has_initializer
    }
}

/// An identifier used inside a function body or an initializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: SmolStr,
    pub region: Region,
    pub span: Span,
}

/// A file-scope statement, directives removed.
#[derive(Debug, Clone)]
pub struct Statement<'src> {
    pub region: Region,
    /// Everything before the terminating `;` or the function body.
    pub head: Vec<Token<'src>>,
    /// Contents of the function body, braces excluded.
    pub body: Option<Vec<Token<'src>>>,
    /// `false` when the input ended mid-statement or hit a stray `}`.
    pub terminated: bool,
    pub span: Span,
}

/// What a single statement contributed.
#[derive(Debug, Default)]
pub struct ScannedStatement {
    pub events: Vec<DeclarationEvent>,
    pub references: Vec<Reference>,
    pub diagnostic: Option<Diagnostic>,
}

const KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "bool", "true", "false", "nullptr",
    "_Alignas", "_Alignof", "_Atomic", "_Bool", "_Complex", "_Generic", "_Imaginary",
    "_Noreturn", "_Static_assert", "_Thread_local", "alignas", "alignof", "static_assert",
    "thread_local", "typeof", "__typeof__", "__attribute__", "__declspec", "__extension__",
    "__restrict", "__restrict__", "__inline", "__inline__", "__const", "__volatile__",
    "__signed__", "__thread", "__asm__", "__asm", "asm",
];

/// Keywords that qualify a type without naming one.
const QUALIFIERS: &[&str] = &[
    "static", "extern", "const", "volatile", "restrict", "inline", "register", "auto",
    "_Noreturn", "_Thread_local", "thread_local", "__thread", "_Atomic", "__restrict",
    "__restrict__", "__inline", "__inline__", "__const", "__volatile__", "__extension__",
];

/// Keywords followed by a parenthesised argument that carries no declarator.
const NOISE: &[&str] = &[
    "__attribute__", "__declspec", "__asm__", "__asm", "asm", "_Alignas", "alignas",
];

/// Leading keywords of file-scope statements that never declare a symbol.
const NON_DECLARATIONS: &[&str] = &["typedef", "_Static_assert", "static_assert", "asm", "__asm__", "__asm"];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

fn is_tag_keyword(token: &Token<'_>) -> bool {
    matches!(token.text, "struct" | "union" | "enum")
}

fn nesting_delta(token: &Token<'_>) -> isize {
    if token.kind != TokenKind::Punct {
        return 0;
    }
    match token.text {
        "(" | "[" | "{" => 1,
        ")" | "]" | "}" => -1,
        _ => 0,
    }
}

/// Split file-scope tokens into statements while tracking regions.
pub struct StatementSplitter<'a, 'src> {
    tokens: std::vec::IntoIter<Token<'src>>,
    tracker: RegionTracker<'a>,
    /// Open `extern "C" {` blocks.
    linkage_blocks: usize,
}

impl<'a, 'src> StatementSplitter<'a, 'src> {
    pub fn new(tokens: Vec<Token<'src>>, tracker: RegionTracker<'a>) -> Self {
        Self {
            tokens: tokens.into_iter(),
            tracker,
            linkage_blocks: 0,
        }
    }

    /// The tracker, once every statement has been consumed.
    pub fn into_tracker(self) -> RegionTracker<'a> {
        self.tracker
    }

    pub fn next_statement(&mut self) -> Result<Option<Statement<'src>>> {
        let mut head: Vec<Token<'src>> = Vec::new();
        let mut body: Option<Vec<Token<'src>>> = None;
        let mut region = None;
        let mut first: Option<Span> = None;
        let mut depth = 0usize;
        let mut braces = 0usize;
        let mut assigns = false;

        while let Some(token) = self.tokens.next() {
            if token.kind == TokenKind::Directive {
                self.tracker.observe(&token)?;
                continue;
            }
            let stmt_region = *region.get_or_insert_with(|| self.tracker.current());
            let start = *first.get_or_insert(token.span);
            let finish = |head, body, terminated| Statement {
                region: stmt_region,
                head,
                body,
                terminated,
                span: start.merge(token.span),
            };

            if let Some(body_tokens) = body.as_mut() {
                if token.is_punct("{") {
                    braces += 1;
                } else if token.is_punct("}") {
                    braces -= 1;
                    if braces == 0 {
                        return Ok(Some(finish(head, body, true)));
                    }
                }
                body_tokens.push(token);
                continue;
            }

            if token.kind == TokenKind::Punct {
                match token.text {
                    "(" | "[" => depth += 1,
                    ")" | "]" => depth = depth.saturating_sub(1),
                    "{" if depth == 0 && braces == 0 && is_linkage_block(&head) => {
                        self.linkage_blocks += 1;
                        head.clear();
                        region = None;
                        first = None;
                        continue;
                    }
                    "{" if depth == 0
                        && braces == 0
                        && !assigns
                        && head.last().is_some_and(|t| t.is_punct(")")) =>
                    {
                        body = Some(Vec::new());
                        braces = 1;
                        continue;
                    }
                    "{" => braces += 1,
                    "}" if braces == 0 && self.linkage_blocks > 0 => {
                        self.linkage_blocks -= 1;
                        if head.is_empty() {
                            region = None;
                            first = None;
                            continue;
                        }
                        return Ok(Some(finish(head, None, false)));
                    }
                    "}" if braces == 0 => {
                        head.push(token);
                        return Ok(Some(finish(head, None, false)));
                    }
                    "}" => braces -= 1,
                    ";" if depth == 0 && braces == 0 => {
                        return Ok(Some(finish(head, None, true)));
                    }
                    "=" if depth == 0 && braces == 0 => assigns = true,
                    _ => {}
                }
            }
            head.push(token);
        }

        // Input ended mid-statement.
        let (Some(region), Some(start)) = (region, first) else {
            return Ok(None);
        };
        let span = body
            .as_ref()
            .and_then(|b| b.last())
            .or(head.last())
            .map_or(start, |t| start.merge(t.span));
        Ok(Some(Statement {
            region,
            head,
            body,
            terminated: false,
            span,
        }))
    }
}

fn is_linkage_block(head: &[Token<'_>]) -> bool {
    matches!(head, [ext, lang] if ext.text == "extern" && lang.kind == TokenKind::Str)
}

/// Split at top-level occurrences of `punct`.
fn split_top_level<'t, 'src>(tokens: &'t [Token<'src>], punct: &str) -> Vec<&'t [Token<'src>]> {
    let mut parts = Vec::new();
    let mut depth = 0isize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        depth += nesting_delta(token);
        if depth == 0 && token.is_punct(punct) {
            parts.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    parts.push(&tokens[start..]);
    parts
}

/// Index of the token closing the group opened at `open`.
fn matching_close(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let mut depth = 0isize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        depth += nesting_delta(token);
        if depth == 0 {
            return Some(i);
        }
    }
    None
}

/// Drop `__attribute__((...))` and similar noise.
fn strip_noise<'src>(tokens: &[Token<'src>]) -> Vec<Token<'src>> {
    let mut kept = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if token.is_ident() && NOISE.contains(&token.text) {
            i += 1;
            if tokens.get(i).is_some_and(|t| t.is_punct("(")) {
                i = matching_close(tokens, i).map_or(tokens.len(), |close| close + 1);
            }
            continue;
        }
        if token.text == "__extension__" {
            i += 1;
            continue;
        }
        kept.push(token);
        i += 1;
    }
    kept
}

enum Declarator<'src> {
    Named {
        name: Token<'src>,
        kind: EntityKind,
        prefix: Vec<Token<'src>>,
    },
    /// `struct S { ... }` with nothing declared.
    TagOnly,
}

/// Find the declared name in one declarator (initializer already removed).
fn parse_declarator<'src>(tokens: &[Token<'src>]) -> std::result::Result<Declarator<'src>, String> {
    let tokens = strip_noise(tokens);

    let mut depth = 0isize;
    let mut paren = None;
    let mut last_ident = None;
    for (i, token) in tokens.iter().enumerate() {
        if depth == 0 && token.is_punct("(") {
            paren = Some(i);
            break;
        }
        if depth == 0 && token.is_ident() && !is_keyword(token.text) {
            last_ident = Some(i);
        }
        depth += nesting_delta(token);
    }

    let (name_idx, kind, prefix_end) = match paren {
        Some(p) if p > 0 && tokens[p - 1].is_ident() && !is_keyword(tokens[p - 1].text) => {
            (p - 1, EntityKind::Function, p - 1)
        }
        Some(p) => {
            // Parenthesised declarator: `(*name)(...)`, `(name)`, `(*name(...))(...)`.
            let close = matching_close(&tokens, p).ok_or("unbalanced parentheses")?;
            let inner = &tokens[p + 1..close];
            let offset = inner
                .iter()
                .position(|t| t.is_ident() && !is_keyword(t.text))
                .ok_or("no name inside parenthesised declarator")?;
            let returns_function = inner.get(offset + 1).is_some_and(|t| t.is_punct("("));
            let named_function = !inner.iter().any(|t| t.is_punct("*"))
                && tokens.get(close + 1).is_some_and(|t| t.is_punct("("));
            let kind = if returns_function || named_function {
                EntityKind::Function
            } else {
                EntityKind::Variable
            };
            (p + 1 + offset, kind, p)
        }
        None => {
            let idx = match last_ident {
                Some(idx) => idx,
                None if tokens.iter().any(is_tag_keyword) => return Ok(Declarator::TagOnly),
                None => return Err("no declared name".to_string()),
            };
            if idx > 0 && is_tag_keyword(&tokens[idx - 1]) {
                return Ok(Declarator::TagOnly);
            }
            (idx, EntityKind::Variable, idx)
        }
    };

    Ok(Declarator::Named {
        name: tokens[name_idx],
        kind,
        prefix: tokens[..prefix_end].to_vec(),
    })
}

/// Whether a declaration prefix names a type (`int`, `struct s`, `size_t`, ...).
fn names_a_type(prefix: &[Token<'_>]) -> bool {
    prefix
        .iter()
        .any(|t| t.is_ident() && !QUALIFIERS.contains(&t.text))
}

/// Identifiers used in `tokens`, skipping keywords and member names.
fn collect_references(tokens: &[Token<'_>], region: Region) -> Vec<Reference> {
    let mut references = Vec::new();
    let mut previous: Option<&Token<'_>> = None;
    for token in tokens {
        let member = previous.is_some_and(|p| p.is_punct(".") || p.is_punct("->"));
        if token.is_ident() && !is_keyword(token.text) && !member {
            references.push(Reference {
                name: token.text.into(),
                region,
                span: token.span,
            });
        }
        previous = Some(token);
    }
    references
}

fn unparseable(statement: &Statement<'_>, reason: impl Into<String>) -> ScannedStatement {
    let reason = reason.into();
    tracing::debug!(%reason, "skipping unparseable statement");
    ScannedStatement {
        diagnostic: Some(
            Diagnostic::info(format!("skipped top-level statement: {reason}"))
                .with_code(codes::UNPARSEABLE_STATEMENT)
                .with_span(statement.span)
                .with_label(reason),
        ),
        ..ScannedStatement::default()
    }
}

/// Turn one top-level statement into declaration events and references.
pub fn scan_statement(statement: &Statement<'_>) -> ScannedStatement {
    let head = &statement.head;
    if !statement.terminated {
        return unparseable(statement, "statement is not terminated");
    }
    let Some(leader) = head.first() else {
        return ScannedStatement::default();
    };
    if NON_DECLARATIONS.contains(&leader.text) {
        return ScannedStatement::default();
    }

    let declarators = split_top_level(head, ",");
    let last = declarators.len() - 1;
    let mut storage = StorageKeywords::default();
    let mut scanned = ScannedStatement::default();

    for (i, &declarator) in declarators.iter().enumerate() {
        let mut parts = split_top_level(declarator, "=").into_iter();
        let target = parts.next().unwrap_or_default();
        let initializer = parts.next().map(|_| &declarator[target.len() + 1..]);

        let (name, kind, prefix) = match parse_declarator(target) {
            Ok(Declarator::Named { name, kind, prefix }) => (name, kind, prefix),
            Ok(Declarator::TagOnly) if declarators.len() == 1 && initializer.is_none() => {
                if statement.body.is_some() {
                    return unparseable(statement, "body after a type declaration");
                }
                return ScannedStatement::default();
            }
            Ok(Declarator::TagOnly) => return unparseable(statement, "declarator has no name"),
            Err(reason) => return unparseable(statement, reason),
        };

        if i == 0 {
            if !names_a_type(&prefix) {
                return unparseable(statement, format!("no type before `{}`", name.text));
            }
            for token in prefix.iter().filter(|t| t.is_ident()) {
                storage.add(token.text);
            }
        }

        let has_body = i == last && statement.body.is_some();
        let has_initializer = initializer.is_some();
        if has_body && kind != EntityKind::Function {
            return unparseable(statement, format!("body after variable `{}`", name.text));
        }
        if has_initializer && kind == EntityKind::Function {
            return unparseable(statement, format!("initializer on function `{}`", name.text));
        }

        if let Some(initializer) = initializer {
            scanned
                .references
                .extend(collect_references(initializer, statement.region));
        }
        scanned.events.push(DeclarationEvent {
            name: name.text.into(),
            kind,
            storage,
            has_body,
            has_initializer,
            region: statement.region,
            span: name.span,
        });
    }

    if let Some(body) = &statement.body {
        scanned
            .references
            .extend(collect_references(body, statement.region));
    }
    scanned
}
