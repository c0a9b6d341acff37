//! Parser for Em.
//!
//! A hand-written recursive descent parser with an operator-precedence
//! core for expressions. The parser consumes the lexer's token stream
//! through its cursor and produces the ordered list of top-level AST
//! nodes: function definitions and prototypes, global declarations, and
//! global initialisers.
//!
//! # Organisation
//!
//! - `item` - top-level constructs and statements
//! - `expr` - the precedence-climbing expression parser
//!
//! # Error discipline
//!
//! There is no error recovery: the first contract break produces a
//! [`Diagnostic`] and parsing of the file stops. Declaration/use
//! validation runs during parsing against the scoped [`SymbolTable`].
//!
//! # Example
//!
//! ```rust
//! use emc::lexer::Lexer;
//! use emc::parser::Parser;
//! use emc::span::SourceMap;
//!
//! let mut sources = SourceMap::new();
//! let lexer = Lexer::from_source(
//!     "add.em",
//!     "int add(int a, int b) { return a + b; }",
//!     &mut sources,
//! )
//! .unwrap();
//! let mut parser = Parser::new(lexer);
//! let program = parser.parse_program().unwrap();
//! assert_eq!(program.len(), 1);
//! ```

mod expr;
mod item;


use crate::ast::Expr;
use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::span::Span;
use crate::symbol::SymbolTable;

/// The Em parser.
pub struct Parser {
    /// The token stream (cursor included).
    pub lexer: Lexer,
    /// Scope stack plus global variable/function maps.
    pub symbols: SymbolTable,
    /// Set once a function definition named `main` is accepted.
    pub entry_point_found: bool,
    /// Number of loops enclosing the current statement.
    loop_depth: u32,
}

impl Parser {
    pub fn new(lexer: Lexer) -> Self {
        Self {
            lexer,
            symbols: SymbolTable::new(),
            entry_point_found: false,
            loop_depth: 0,
        }
    }

    /// Parse every top-level construct until the token stream is
    /// exhausted.
    #[must_use = "parsing has no effect if the result is not used"]
    pub fn parse_program(&mut self) -> Result<Vec<Expr>, Diagnostic> {
        let mut program = Vec::new();
        while !self.lexer.is_at_end() {
            program.push(self.parse_top_level()?);
        }
        Ok(program)
    }

    // ============================================================
    // Token handling
    // ============================================================

    /// The current token, or an end-of-file diagnostic.
    fn current(&self) -> Result<&Token, Diagnostic> {
        self.lexer.peek(0).ok_or_else(|| {
            Diagnostic::error("unexpected end of file", self.eof_span())
                .with_code(ErrorCode::UnexpectedEof)
        })
    }

    /// Consume and return the current token.
    fn bump(&mut self) -> Result<Token, Diagnostic> {
        self.current()?;
        Ok(self.lexer.bump().expect("current() verified a token exists"))
    }

    /// Whether the current token has the given kind.
    fn check(&self, kind: TokenKind) -> bool {
        self.lexer.peek(0).map(|t| t.kind) == Some(kind)
    }

    /// Consume the current token if it has the given kind.
    fn try_consume(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.lexer.advance();
            true
        } else {
            false
        }
    }

    /// Consume a token of the expected kind, or error.
    fn expect(&mut self, kind: TokenKind) -> Result<Token, Diagnostic> {
        let tok = self.current()?;
        if tok.kind == kind {
            self.bump()
        } else {
            Err(self.error_expected(kind.description()))
        }
    }

    /// The position parse errors land on when the stream has run dry.
    fn eof_span(&self) -> Span {
        self.lexer
            .peek_prev()
            .or_else(|| self.lexer.tokens.last())
            .map(|t| t.span)
            .unwrap_or_else(Span::dummy)
    }

    // ============================================================
    // Error helpers
    // ============================================================

    fn error_expected(&self, expected: &str) -> Diagnostic {
        match self.lexer.peek(0) {
            Some(tok) => Diagnostic::error(
                format!("expected {}, found {}", expected, tok.kind.description()),
                tok.span,
            )
            .with_code(ErrorCode::UnexpectedToken),
            None => Diagnostic::error(
                format!("expected {expected}, found end of file"),
                self.eof_span(),
            )
            .with_code(ErrorCode::UnexpectedEof),
        }
    }
}
