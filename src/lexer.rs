//! Lexical analysis for Em.
//!
//! The lexer reads a source file line by line and flattens it into a
//! single token vector. `#import "path"` directives are expanded inline:
//! the named file is lexed recursively and its tokens are spliced onto the
//! current stream, each keeping the [`FileId`] of the file it came from so
//! later diagnostics point at the right place.
//!
//! Scanning is a small state machine. A run of digits (optionally with one
//! `.`) or of alphanumerics/underscores accumulates as a *partial token*
//! and is classified when the run ends: digits become a numeric literal,
//! `true`/`false` a bool literal, members of the keyword or data-type sets
//! their keyword, anything else an identifier. Symbols dispatch through a
//! maximal-munch match with up to two bytes of lookahead.
//!
//! # Example
//!
//! ```rust
//! use emc::lexer::{Lexer, TokenKind};
//! use emc::span::SourceMap;
//!
//! let mut sources = SourceMap::new();
//! let lexer = Lexer::from_source("add.em", "int add(int a, int b);", &mut sources).unwrap();
//! assert_eq!(lexer.tokens[0].kind, TokenKind::Int);
//! assert_eq!(lexer.tokens[1].kind, TokenKind::Ident);
//! assert_eq!(lexer.tokens[1].text, "add");
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::span::{display_path, FileId, SourceMap, Span};

/// Token kinds, grouped into families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Identifier: `abcd`, `sdf2324`, `dfs_23fs56df`
    Ident,

    // ============================================================
    // Keywords
    // ============================================================
    If,
    Else,
    For,
    While,
    Return,
    Break,
    Continue,

    // ============================================================
    // Data-type names
    // ============================================================
    Void,
    Bool,
    Int,
    Float,
    Char,
    Str,

    // ============================================================
    // Literals
    // ============================================================
    /// Integer or float text; the parser splits on the presence of `.`.
    NumericLit,
    CharLit,
    StringLit,
    BoolLit,

    // ============================================================
    // Separator / delimiter / brackets
    // ============================================================
    Comma,
    Semi,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,

    // ============================================================
    // Unary operators
    // ============================================================
    Not,
    BitNot,
    Increment,
    Decrement,

    // ============================================================
    // Binary operators
    // ============================================================
    Plus,
    Minus,
    Slash,
    Percent,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Assign,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    BitOr,
    Caret,
    AndAndEq,
    OrOrEq,
    BitOrEq,
    BitAndEq,
    CaretEq,
    Shl,
    Shr,
    ShlEq,
    ShrEq,
    Dot,

    // ============================================================
    // Context-dependent (resolved during parsing)
    // ============================================================
    /// `*`: multiplication vs pointer dereference.
    Star,
    /// `&`: bitwise and vs address-of.
    Amp,
}

impl TokenKind {
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::If
                | TokenKind::Else
                | TokenKind::For
                | TokenKind::While
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Continue
        )
    }

    pub fn is_data_type(&self) -> bool {
        matches!(
            self,
            TokenKind::Void
                | TokenKind::Bool
                | TokenKind::Int
                | TokenKind::Float
                | TokenKind::Char
                | TokenKind::Str
        )
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::NumericLit | TokenKind::CharLit | TokenKind::StringLit | TokenKind::BoolLit
        )
    }

    pub fn is_bracket(&self) -> bool {
        matches!(
            self,
            TokenKind::LBrace
                | TokenKind::RBrace
                | TokenKind::LParen
                | TokenKind::RParen
                | TokenKind::LBracket
                | TokenKind::RBracket
        )
    }

    pub fn is_unary_op(&self) -> bool {
        matches!(
            self,
            TokenKind::Not | TokenKind::BitNot | TokenKind::Increment | TokenKind::Decrement
        )
    }

    pub fn is_binary_op(&self) -> bool {
        matches!(
            self,
            TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::StarEq
                | TokenKind::SlashEq
                | TokenKind::PercentEq
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::LtEq
                | TokenKind::GtEq
                | TokenKind::Assign
                | TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::AndAnd
                | TokenKind::OrOr
                | TokenKind::BitOr
                | TokenKind::Caret
                | TokenKind::AndAndEq
                | TokenKind::OrOrEq
                | TokenKind::BitOrEq
                | TokenKind::BitAndEq
                | TokenKind::CaretEq
                | TokenKind::Shl
                | TokenKind::Shr
                | TokenKind::ShlEq
                | TokenKind::ShrEq
                | TokenKind::Dot
                | TokenKind::Star
                | TokenKind::Amp
        )
    }

    pub fn is_assignment_op(&self) -> bool {
        matches!(
            self,
            TokenKind::Assign
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::StarEq
                | TokenKind::SlashEq
                | TokenKind::PercentEq
                | TokenKind::AndAndEq
                | TokenKind::OrOrEq
                | TokenKind::BitAndEq
                | TokenKind::BitOrEq
                | TokenKind::CaretEq
                | TokenKind::ShlEq
                | TokenKind::ShrEq
        )
    }

    /// Human-readable description for error messages.
    pub fn description(&self) -> &'static str {
        match self {
            TokenKind::Ident => "identifier",
            TokenKind::If => "keyword `if`",
            TokenKind::Else => "keyword `else`",
            TokenKind::For => "keyword `for`",
            TokenKind::While => "keyword `while`",
            TokenKind::Return => "keyword `return`",
            TokenKind::Break => "keyword `break`",
            TokenKind::Continue => "keyword `continue`",
            TokenKind::Void => "type `void`",
            TokenKind::Bool => "type `bool`",
            TokenKind::Int => "type `int`",
            TokenKind::Float => "type `float`",
            TokenKind::Char => "type `char`",
            TokenKind::Str => "type `string`",
            TokenKind::NumericLit => "numeric literal",
            TokenKind::CharLit => "character literal",
            TokenKind::StringLit => "string literal",
            TokenKind::BoolLit => "bool literal",
            TokenKind::Comma => "`,`",
            TokenKind::Semi => "`;`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Not => "`!`",
            TokenKind::BitNot => "`~`",
            TokenKind::Increment => "`++`",
            TokenKind::Decrement => "`--`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Slash => "`/`",
            TokenKind::Percent => "`%`",
            TokenKind::PlusEq => "`+=`",
            TokenKind::MinusEq => "`-=`",
            TokenKind::StarEq => "`*=`",
            TokenKind::SlashEq => "`/=`",
            TokenKind::PercentEq => "`%=`",
            TokenKind::Lt => "`<`",
            TokenKind::Gt => "`>`",
            TokenKind::LtEq => "`<=`",
            TokenKind::GtEq => "`>=`",
            TokenKind::Assign => "`=`",
            TokenKind::EqEq => "`==`",
            TokenKind::NotEq => "`!=`",
            TokenKind::AndAnd => "`&&`",
            TokenKind::OrOr => "`||`",
            TokenKind::BitOr => "`|`",
            TokenKind::Caret => "`^`",
            TokenKind::AndAndEq => "`&&=`",
            TokenKind::OrOrEq => "`||=`",
            TokenKind::BitOrEq => "`|=`",
            TokenKind::BitAndEq => "`&=`",
            TokenKind::CaretEq => "`^=`",
            TokenKind::Shl => "`<<`",
            TokenKind::Shr => "`>>`",
            TokenKind::ShlEq => "`<<=`",
            TokenKind::ShrEq => "`>>=`",
            TokenKind::Dot => "`.`",
            TokenKind::Star => "`*`",
            TokenKind::Amp => "`&`",
        }
    }
}

/// A token: lexeme text, kind, and source coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(text: impl Into<String>, kind: TokenKind, span: Span) -> Self {
        Self {
            text: text.into(),
            kind,
            span,
        }
    }
}

/// Accumulator state for the current digit/alphanumeric run.
#[derive(Debug, Clone, Copy)]
enum Partial {
    Numeric { has_dot: bool },
    Alnum,
}

/// The Em lexer: a flat, ordered token stream with a parse cursor, plus
/// the line counters the driver aggregates.
#[derive(Debug)]
pub struct Lexer {
    pub tokens: Vec<Token>,
    /// Cumulative line count including every imported file.
    pub total_lines: u32,
    cursor: usize,
    /// Reserved for `#define`; only `#import` is handled today.
    #[allow(dead_code)]
    definitions: HashMap<String, String>,
}

impl Lexer {
    fn empty() -> Self {
        Self {
            tokens: Vec::new(),
            total_lines: 0,
            cursor: 0,
            definitions: HashMap::new(),
        }
    }

    /// Lex a file from disk, expanding `#import`s recursively.
    pub fn from_file(path: &Path, sources: &mut SourceMap) -> Result<Lexer, Diagnostic> {
        let mut lexer = Lexer::empty();
        let mut in_progress = Vec::new();
        lexer.lex_file(path, sources, &mut in_progress, None)?;
        Ok(lexer)
    }

    /// Lex source text directly (used by tests and tooling). Relative
    /// `#import` paths resolve against the working directory only.
    pub fn from_source(
        name: &str,
        text: &str,
        sources: &mut SourceMap,
    ) -> Result<Lexer, Diagnostic> {
        let mut lexer = Lexer::empty();
        let file = sources.add(name, text);
        let mut in_progress = Vec::new();
        lexer.lex_text(file, text, None, sources, &mut in_progress)?;
        Ok(lexer)
    }

    // ============================================================
    // Cursor
    // ============================================================

    /// The token `k` positions ahead of the cursor (`peek(0)` is current).
    pub fn peek(&self, k: usize) -> Option<&Token> {
        self.tokens.get(self.cursor + k)
    }

    /// The token just behind the cursor.
    pub fn peek_prev(&self) -> Option<&Token> {
        if self.cursor == 0 {
            None
        } else {
            self.tokens.get(self.cursor - 1)
        }
    }

    /// Return the current token and advance.
    pub fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.cursor).cloned();
        if tok.is_some() {
            self.cursor += 1;
        }
        tok
    }

    /// Advance without returning the token.
    pub fn advance(&mut self) {
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    // ============================================================
    // Scanning
    // ============================================================

    fn lex_file(
        &mut self,
        path: &Path,
        sources: &mut SourceMap,
        in_progress: &mut Vec<PathBuf>,
        import_site: Option<Span>,
    ) -> Result<(), Diagnostic> {
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if in_progress.contains(&canonical) {
            let message = format!("import cycle detected through '{}'", path.display());
            return Err(match import_site {
                Some(span) => Diagnostic::error(message, span),
                None => Diagnostic::bare(message),
            }
            .with_code(ErrorCode::ImportCycle));
        }

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                let message = format!("could not read '{}': {}", path.display(), err);
                return Err(match import_site {
                    Some(span) => {
                        Diagnostic::error(message, span).with_code(ErrorCode::ImportNotFound)
                    }
                    None => Diagnostic::bare(message),
                });
            }
        };

        let file = sources.add(display_path(path), text.as_str());
        in_progress.push(canonical);
        let result = self.lex_text(file, &text, path.parent(), sources, in_progress);
        in_progress.pop();
        result
    }

    fn lex_text(
        &mut self,
        file: FileId,
        text: &str,
        base_dir: Option<&Path>,
        sources: &mut SourceMap,
        in_progress: &mut Vec<PathBuf>,
    ) -> Result<(), Diagnostic> {
        let mut in_comment = false;
        let mut line_num = 0u32;
        let mut offset = 0usize;

        // A trailing newline does not open a final empty line.
        let mut lines: Vec<&str> = text.split('\n').collect();
        if lines.last() == Some(&"") {
            lines.pop();
        }

        for line in lines {
            line_num += 1;
            in_comment = self.scan_line(
                file,
                line,
                offset,
                line_num,
                in_comment,
                base_dir,
                sources,
                in_progress,
            )?;
            offset += line.len() + 1;
        }

        if in_comment {
            let end = text.len();
            return Err(Diagnostic::error(
                "multi-line comment is never closed",
                Span::new(file, end, end, line_num, 0),
            )
            .with_code(ErrorCode::UnterminatedComment));
        }

        self.total_lines += line_num;
        Ok(())
    }

    /// Scan one line, pushing tokens onto the stream. Returns whether the
    /// line ends inside a multi-line comment.
    #[allow(clippy::too_many_arguments)]
    fn scan_line(
        &mut self,
        file: FileId,
        line: &str,
        line_offset: usize,
        line_num: u32,
        mut in_comment: bool,
        base_dir: Option<&Path>,
        sources: &mut SourceMap,
        in_progress: &mut Vec<PathBuf>,
    ) -> Result<bool, Diagnostic> {
        let bytes = line.as_bytes();
        let mut pos = 0usize;
        let mut run: Option<(usize, Partial)> = None;

        let span_at = |start: usize, end: usize| {
            Span::new(
                file,
                line_offset + start,
                line_offset + end,
                line_num,
                start as u32,
            )
        };

        while pos < bytes.len() {
            if in_comment {
                match line[pos..].find("*/") {
                    Some(close) => {
                        pos += close + 2;
                        in_comment = false;
                        continue;
                    }
                    None => return Ok(true),
                }
            }

            let c = bytes[pos];

            // Continue or flush the current digit/alphanumeric run.
            if let Some((start, partial)) = run {
                match partial {
                    Partial::Numeric { has_dot } => {
                        if c.is_ascii_digit() {
                            pos += 1;
                            continue;
                        }
                        if c == b'.' {
                            if has_dot {
                                return Err(Diagnostic::error(
                                    "numeric literal has more than one decimal point",
                                    span_at(pos, pos + 1),
                                )
                                .with_code(ErrorCode::MalformedNumber));
                            }
                            run = Some((start, Partial::Numeric { has_dot: true }));
                            pos += 1;
                            continue;
                        }
                        if c.is_ascii_alphabetic() || c == b'_' {
                            return Err(Diagnostic::error(
                                "identifiers cannot begin with a digit",
                                span_at(pos, pos + 1),
                            )
                            .with_code(ErrorCode::DigitLeadingIdentifier));
                        }
                    }
                    Partial::Alnum => {
                        if c.is_ascii_alphanumeric() || c == b'_' {
                            pos += 1;
                            continue;
                        }
                    }
                }
                self.flush_run(file, line, line_offset, line_num, start, pos, partial);
                run = None;
            }

            match c {
                b' ' | b'\t' => pos += 1,
                b'0'..=b'9' => {
                    run = Some((pos, Partial::Numeric { has_dot: false }));
                    pos += 1;
                }
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                    run = Some((pos, Partial::Alnum));
                    pos += 1;
                }
                b'#' => {
                    // Preprocessor directive; the rest of the line after it
                    // is discarded.
                    self.handle_directive(
                        file,
                        line,
                        line_offset,
                        line_num,
                        pos,
                        base_dir,
                        sources,
                        in_progress,
                    )?;
                    return Ok(false);
                }
                b'\'' => {
                    let rest = &line[pos + 1..];
                    let mut chars = rest.chars();
                    let value = match chars.next() {
                        Some(ch) if ch != '\t' && ch != '\'' => ch,
                        _ => {
                            return Err(Diagnostic::error(
                                "invalid character literal",
                                span_at(pos, pos + 1),
                            )
                            .with_code(ErrorCode::InvalidCharLiteral));
                        }
                    };
                    if chars.next() != Some('\'') {
                        return Err(Diagnostic::error(
                            "character literal is missing its closing quote",
                            span_at(pos, pos + 1 + value.len_utf8()),
                        )
                        .with_code(ErrorCode::InvalidCharLiteral));
                    }
                    let len = 2 + value.len_utf8();
                    self.tokens.push(Token::new(
                        value.to_string(),
                        TokenKind::CharLit,
                        span_at(pos, pos + len),
                    ));
                    pos += len;
                }
                b'"' => {
                    let rest = &line[pos + 1..];
                    let close = match rest.find('"') {
                        Some(close) => close,
                        None => {
                            return Err(Diagnostic::error(
                                "string literal is missing its closing quote",
                                span_at(pos, line.len()),
                            )
                            .with_code(ErrorCode::InvalidStringLiteral));
                        }
                    };
                    let contents = &rest[..close];
                    if let Some(tab) = contents.find('\t') {
                        return Err(Diagnostic::error(
                            "tab characters are not allowed in string literals",
                            span_at(pos + 1 + tab, pos + 2 + tab),
                        )
                        .with_code(ErrorCode::InvalidStringLiteral));
                    }
                    self.tokens.push(Token::new(
                        contents,
                        TokenKind::StringLit,
                        span_at(pos, pos + close + 2),
                    ));
                    pos += close + 2;
                }
                b'/' => match bytes.get(pos + 1) {
                    Some(b'=') => {
                        self.push_symbol(file, line_offset, line_num, pos, "/=", TokenKind::SlashEq);
                        pos += 2;
                    }
                    // Line comment: the rest of the line is ignored.
                    Some(b'/') => return Ok(false),
                    Some(b'*') => {
                        in_comment = true;
                        pos += 2;
                    }
                    _ => {
                        self.push_symbol(file, line_offset, line_num, pos, "/", TokenKind::Slash);
                        pos += 1;
                    }
                },
                _ => {
                    let (text, kind) = self.scan_symbol(bytes, pos).ok_or_else(|| {
                        Diagnostic::error("invalid token encountered", span_at(pos, pos + 1))
                            .with_code(ErrorCode::InvalidToken)
                    })?;
                    self.push_symbol(file, line_offset, line_num, pos, text, kind);
                    pos += text.len();
                }
            }
        }

        if let Some((start, partial)) = run {
            self.flush_run(file, line, line_offset, line_num, start, bytes.len(), partial);
        }
        Ok(in_comment)
    }

    /// Maximal-munch operator dispatch over 1-3 bytes of lookahead.
    /// `/` is handled by the caller because of comments.
    fn scan_symbol(&self, bytes: &[u8], pos: usize) -> Option<(&'static str, TokenKind)> {
        let b1 = bytes.get(pos + 1).copied();
        let b2 = bytes.get(pos + 2).copied();
        let tok = match bytes[pos] {
            b'{' => ("{", TokenKind::LBrace),
            b'}' => ("}", TokenKind::RBrace),
            b'(' => ("(", TokenKind::LParen),
            b')' => (")", TokenKind::RParen),
            b'[' => ("[", TokenKind::LBracket),
            b']' => ("]", TokenKind::RBracket),
            b'~' => ("~", TokenKind::BitNot),
            b'.' => (".", TokenKind::Dot),
            b',' => (",", TokenKind::Comma),
            b';' => (";", TokenKind::Semi),
            b'!' => match b1 {
                Some(b'=') => ("!=", TokenKind::NotEq),
                _ => ("!", TokenKind::Not),
            },
            b'+' => match b1 {
                Some(b'=') => ("+=", TokenKind::PlusEq),
                Some(b'+') => ("++", TokenKind::Increment),
                _ => ("+", TokenKind::Plus),
            },
            b'-' => match b1 {
                Some(b'=') => ("-=", TokenKind::MinusEq),
                Some(b'-') => ("--", TokenKind::Decrement),
                _ => ("-", TokenKind::Minus),
            },
            b'*' => match b1 {
                Some(b'=') => ("*=", TokenKind::StarEq),
                _ => ("*", TokenKind::Star),
            },
            b'%' => match b1 {
                Some(b'=') => ("%=", TokenKind::PercentEq),
                _ => ("%", TokenKind::Percent),
            },
            b'<' => match (b1, b2) {
                (Some(b'='), _) => ("<=", TokenKind::LtEq),
                (Some(b'<'), Some(b'=')) => ("<<=", TokenKind::ShlEq),
                (Some(b'<'), _) => ("<<", TokenKind::Shl),
                _ => ("<", TokenKind::Lt),
            },
            b'>' => match (b1, b2) {
                (Some(b'='), _) => (">=", TokenKind::GtEq),
                (Some(b'>'), Some(b'=')) => (">>=", TokenKind::ShrEq),
                (Some(b'>'), _) => (">>", TokenKind::Shr),
                _ => (">", TokenKind::Gt),
            },
            b'=' => match b1 {
                Some(b'=') => ("==", TokenKind::EqEq),
                _ => ("=", TokenKind::Assign),
            },
            b'&' => match (b1, b2) {
                (Some(b'='), _) => ("&=", TokenKind::BitAndEq),
                (Some(b'&'), Some(b'=')) => ("&&=", TokenKind::AndAndEq),
                (Some(b'&'), _) => ("&&", TokenKind::AndAnd),
                _ => ("&", TokenKind::Amp),
            },
            b'|' => match (b1, b2) {
                (Some(b'='), _) => ("|=", TokenKind::BitOrEq),
                (Some(b'|'), Some(b'=')) => ("||=", TokenKind::OrOrEq),
                (Some(b'|'), _) => ("||", TokenKind::OrOr),
                _ => ("|", TokenKind::BitOr),
            },
            b'^' => match b1 {
                Some(b'=') => ("^=", TokenKind::CaretEq),
                _ => ("^", TokenKind::Caret),
            },
            _ => return None,
        };
        Some(tok)
    }

    fn push_symbol(
        &mut self,
        file: FileId,
        line_offset: usize,
        line_num: u32,
        pos: usize,
        text: &str,
        kind: TokenKind,
    ) {
        let span = Span::new(
            file,
            line_offset + pos,
            line_offset + pos + text.len(),
            line_num,
            pos as u32,
        );
        self.tokens.push(Token::new(text, kind, span));
    }

    /// Classify and push a finished digit/alphanumeric run.
    fn flush_run(
        &mut self,
        file: FileId,
        line: &str,
        line_offset: usize,
        line_num: u32,
        start: usize,
        end: usize,
        partial: Partial,
    ) {
        let text = &line[start..end];
        let kind = match partial {
            Partial::Numeric { .. } => TokenKind::NumericLit,
            Partial::Alnum => classify_word(text),
        };
        let span = Span::new(
            file,
            line_offset + start,
            line_offset + end,
            line_num,
            start as u32,
        );
        self.tokens.push(Token::new(text, kind, span));
    }

    /// Handle `#<name> ...`. Only `import` is recognised; the imported
    /// file's tokens are appended to this stream in place.
    #[allow(clippy::too_many_arguments)]
    fn handle_directive(
        &mut self,
        file: FileId,
        line: &str,
        line_offset: usize,
        line_num: u32,
        hash_pos: usize,
        base_dir: Option<&Path>,
        sources: &mut SourceMap,
        in_progress: &mut Vec<PathBuf>,
    ) -> Result<(), Diagnostic> {
        let bytes = line.as_bytes();
        let mut pos = hash_pos + 1;
        let name_start = pos;
        while pos < bytes.len() && bytes[pos] != b' ' && bytes[pos] != b'\t' {
            pos += 1;
        }
        let name = &line[name_start..pos];
        let directive_span = Span::new(
            file,
            line_offset + hash_pos,
            line_offset + pos,
            line_num,
            hash_pos as u32,
        );

        if name != "import" {
            return Err(Diagnostic::error(
                format!("invalid preprocessor directive `#{name}`"),
                directive_span,
            )
            .with_code(ErrorCode::InvalidDirective));
        }

        while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] != b'"' {
            return Err(
                Diagnostic::error("import file path not specified", directive_span)
                    .with_code(ErrorCode::MissingImportPath),
            );
        }
        let path_start = pos + 1;
        let close = match line[path_start..].find('"') {
            Some(close) => path_start + close,
            None => {
                return Err(Diagnostic::error(
                    "invalid string provided for import file path",
                    directive_span,
                )
                .with_code(ErrorCode::MissingImportPath));
            }
        };
        let raw_path = &line[path_start..close];
        let import_span = Span::new(
            file,
            line_offset + hash_pos,
            line_offset + close + 1,
            line_num,
            hash_pos as u32,
        );

        // Paths resolve as written first, then relative to the importing
        // file's directory.
        let mut target = PathBuf::from(raw_path);
        if !target.exists() {
            if let Some(base) = base_dir {
                let sibling = base.join(raw_path);
                if sibling.exists() {
                    target = sibling;
                }
            }
        }

        self.lex_file(&target, sources, in_progress, Some(import_span))
    }
}

/// Classify a finished alphanumeric run: bool literal, keyword, data type,
/// or identifier.
fn classify_word(text: &str) -> TokenKind {
    match text {
        "true" | "false" => TokenKind::BoolLit,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "for" => TokenKind::For,
        "while" => TokenKind::While,
        "return" => TokenKind::Return,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "void" => TokenKind::Void,
        "bool" => TokenKind::Bool,
        "int" => TokenKind::Int,
        "float" => TokenKind::Float,
        "char" => TokenKind::Char,
        "string" => TokenKind::Str,
        _ => TokenKind::Ident,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<TokenKind> {
        let mut sources = SourceMap::new();
        Lexer::from_source("test.em", source, &mut sources)
            .expect("lexing failed")
            .tokens
            .iter()
            .map(|t| t.kind)
            .collect()
    }

    fn lex_err(source: &str) -> Diagnostic {
        let mut sources = SourceMap::new();
        Lexer::from_source("test.em", source, &mut sources).expect_err("expected a lex error")
    }

    #[test]
    fn test_keywords_and_types() {
        assert_eq!(lex("if else for while return break continue"), vec![
            TokenKind::If,
            TokenKind::Else,
            TokenKind::For,
            TokenKind::While,
            TokenKind::Return,
            TokenKind::Break,
            TokenKind::Continue,
        ]);
        assert_eq!(lex("void bool int float char string"), vec![
            TokenKind::Void,
            TokenKind::Bool,
            TokenKind::Int,
            TokenKind::Float,
            TokenKind::Char,
            TokenKind::Str,
        ]);
    }

    #[test]
    fn test_identifiers() {
        let mut sources = SourceMap::new();
        let lexer = Lexer::from_source("t.em", "abcd sdf2324 dfs_23fs56df _x", &mut sources).unwrap();
        assert!(lexer.tokens.iter().all(|t| t.kind == TokenKind::Ident));
        assert_eq!(lexer.tokens[2].text, "dfs_23fs56df");
    }

    #[test]
    fn test_adjacent_tokens_split() {
        // Tokens written without separating whitespace.
        assert_eq!(lex("x==30"), vec![
            TokenKind::Ident,
            TokenKind::EqEq,
            TokenKind::NumericLit,
        ]);
        assert_eq!(lex("i+=1;"), vec![
            TokenKind::Ident,
            TokenKind::PlusEq,
            TokenKind::NumericLit,
            TokenKind::Semi,
        ]);
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(lex("23434"), vec![TokenKind::NumericLit]);
        assert_eq!(lex("3.14"), vec![TokenKind::NumericLit]);
        let mut sources = SourceMap::new();
        let lexer = Lexer::from_source("t.em", "1.5", &mut sources).unwrap();
        assert_eq!(lexer.tokens[0].text, "1.5");
    }

    #[test]
    fn test_second_decimal_point_is_an_error() {
        let diag = lex_err("1.2.3");
        assert_eq!(diag.code, Some(ErrorCode::MalformedNumber));
        assert_eq!(diag.span.unwrap().col, 3);
    }

    #[test]
    fn test_digit_leading_identifier_is_an_error() {
        let diag = lex_err("123abc");
        assert_eq!(diag.code, Some(ErrorCode::DigitLeadingIdentifier));
        assert_eq!(diag.span.unwrap().col, 3);
    }

    #[test]
    fn test_char_and_string_literals() {
        assert_eq!(lex("'A'"), vec![TokenKind::CharLit]);
        assert_eq!(lex("\"fds...\""), vec![TokenKind::StringLit]);

        let mut sources = SourceMap::new();
        let lexer = Lexer::from_source("t.em", "\"hello world\"", &mut sources).unwrap();
        assert_eq!(lexer.tokens[0].text, "hello world");
    }

    #[test]
    fn test_unterminated_string_is_an_error() {
        let diag = lex_err("\"no closing quote");
        assert_eq!(diag.code, Some(ErrorCode::InvalidStringLiteral));
    }

    #[test]
    fn test_char_literal_missing_close() {
        let diag = lex_err("'ab'");
        assert_eq!(diag.code, Some(ErrorCode::InvalidCharLiteral));
    }

    #[test]
    fn test_operators_maximal_munch() {
        assert_eq!(lex("< <= << <<= > >= >> >>="), vec![
            TokenKind::Lt,
            TokenKind::LtEq,
            TokenKind::Shl,
            TokenKind::ShlEq,
            TokenKind::Gt,
            TokenKind::GtEq,
            TokenKind::Shr,
            TokenKind::ShrEq,
        ]);
        assert_eq!(lex("& && &&= &= | || ||= |="), vec![
            TokenKind::Amp,
            TokenKind::AndAnd,
            TokenKind::AndAndEq,
            TokenKind::BitAndEq,
            TokenKind::BitOr,
            TokenKind::OrOr,
            TokenKind::OrOrEq,
            TokenKind::BitOrEq,
        ]);
        assert_eq!(lex("++ -- + - += -="), vec![
            TokenKind::Increment,
            TokenKind::Decrement,
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::PlusEq,
            TokenKind::MinusEq,
        ]);
    }

    #[test]
    fn test_comments() {
        assert_eq!(lex("int x; // trailing comment\nint y;"), vec![
            TokenKind::Int,
            TokenKind::Ident,
            TokenKind::Semi,
            TokenKind::Int,
            TokenKind::Ident,
            TokenKind::Semi,
        ]);
        assert_eq!(lex("int /* inline */ x;"), vec![
            TokenKind::Int,
            TokenKind::Ident,
            TokenKind::Semi,
        ]);
        // The comment flag persists across lines.
        assert_eq!(lex("int x; /* spans\nmany\nlines */ int y;"), vec![
            TokenKind::Int,
            TokenKind::Ident,
            TokenKind::Semi,
            TokenKind::Int,
            TokenKind::Ident,
            TokenKind::Semi,
        ]);
    }

    #[test]
    fn test_unterminated_comment_is_an_error() {
        let diag = lex_err("int x; /* never closed");
        assert_eq!(diag.code, Some(ErrorCode::UnterminatedComment));
    }

    #[test]
    fn test_invalid_byte_is_an_error() {
        let diag = lex_err("int x @ y;");
        assert_eq!(diag.code, Some(ErrorCode::InvalidToken));
        assert_eq!(diag.span.unwrap().col, 6);
    }

    #[test]
    fn test_unknown_directive_is_an_error() {
        let diag = lex_err("#define X 1");
        assert_eq!(diag.code, Some(ErrorCode::InvalidDirective));
    }

    #[test]
    fn test_import_without_path_is_an_error() {
        let diag = lex_err("#import");
        assert_eq!(diag.code, Some(ErrorCode::MissingImportPath));
    }

    #[test]
    fn test_token_coordinates() {
        let mut sources = SourceMap::new();
        let lexer = Lexer::from_source("t.em", "int x;\nint y;", &mut sources).unwrap();
        let y = &lexer.tokens[4];
        assert_eq!(y.text, "y");
        assert_eq!(y.span.line, 2);
        assert_eq!(y.span.col, 4);
    }

    #[test]
    fn test_cursor() {
        let mut sources = SourceMap::new();
        let mut lexer = Lexer::from_source("t.em", "int x ;", &mut sources).unwrap();
        assert_eq!(lexer.peek(0).unwrap().kind, TokenKind::Int);
        assert_eq!(lexer.peek(2).unwrap().kind, TokenKind::Semi);
        assert!(lexer.peek_prev().is_none());

        let first = lexer.bump().unwrap();
        assert_eq!(first.kind, TokenKind::Int);
        assert_eq!(lexer.peek_prev().unwrap().kind, TokenKind::Int);
        lexer.advance();
        lexer.advance();
        assert!(lexer.is_at_end());
        assert!(lexer.bump().is_none());
    }

    #[test]
    fn test_line_count() {
        let mut sources = SourceMap::new();
        let lexer = Lexer::from_source("t.em", "int x;\nint y;\nint z;", &mut sources).unwrap();
        assert_eq!(lexer.total_lines, 3);
    }

    #[test]
    fn test_import_splices_tokens() {
        let dir = std::env::temp_dir().join("emc_lexer_import_test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("lib.em"), "int helper(int a);\n").unwrap();
        std::fs::write(
            dir.join("main.em"),
            "#import \"lib.em\"\nint main() { return 0; }\n",
        )
        .unwrap();

        let mut sources = SourceMap::new();
        let lexer = Lexer::from_file(&dir.join("main.em"), &mut sources).unwrap();

        // Imported tokens come first and keep their own file id.
        assert_eq!(lexer.tokens[1].text, "helper");
        let helper_file = lexer.tokens[1].span.file;
        let main_tok = lexer.tokens.iter().find(|t| t.text == "main").unwrap();
        assert_ne!(helper_file, main_tok.span.file);
        assert!(sources.name(helper_file).ends_with("lib.em"));

        // Line counts accumulate across imports (1 in lib.em + 2 in
        // main.em).
        assert_eq!(lexer.total_lines, 3);
    }

    #[test]
    fn test_import_cycle_is_detected() {
        let dir = std::env::temp_dir().join("emc_lexer_cycle_test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.em"), "#import \"b.em\"\n").unwrap();
        std::fs::write(dir.join("b.em"), "#import \"a.em\"\n").unwrap();

        let mut sources = SourceMap::new();
        let diag = Lexer::from_file(&dir.join("a.em"), &mut sources)
            .expect_err("cycle should be reported");
        assert_eq!(diag.code, Some(ErrorCode::ImportCycle));
    }
}
