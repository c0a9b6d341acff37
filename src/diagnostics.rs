//! Diagnostic reporting infrastructure.
//!
//! Every component of the front-end fails fast: the first contract break
//! produces a [`Diagnostic`] that bubbles up to the driver, which renders
//! it and stops that file. Rendering goes through `ariadne` so the user
//! sees the offending line with the error region marked.
//!
//! # Error Codes
//!
//! - **E0001-E0099**: lexer errors (bad tokens, unterminated literals and
//!   comments, preprocessor errors)
//! - **E0100-E0199**: parser syntax errors
//! - **E0200-E0299**: parser semantic errors (redeclaration, undeclared
//!   names, signature mismatches)
//! - **E0300-E0399**: IR-emission errors

use crate::span::{SourceMap, Span};
use ariadne::{Color, Label, Report, ReportKind};

/// Compiler error codes, grouped by pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // ============================================================
    // Lexer errors (E0001-E0099)
    // ============================================================
    /// Unrecognised byte in source.
    InvalidToken = 1,
    /// Identifier run beginning with digits.
    DigitLeadingIdentifier = 2,
    /// Numeric literal with more than one decimal point.
    MalformedNumber = 3,
    /// Character literal missing its closing quote or holding a tab.
    InvalidCharLiteral = 4,
    /// String literal unterminated on its line or holding a tab.
    InvalidStringLiteral = 5,
    /// Multi-line comment still open at end of file.
    UnterminatedComment = 6,
    /// Unknown preprocessor directive.
    InvalidDirective = 7,
    /// `#import` without a quoted file path.
    MissingImportPath = 8,
    /// `#import` chain revisits a file already being lexed.
    ImportCycle = 9,
    /// Imported file could not be read.
    ImportNotFound = 10,

    // ============================================================
    // Parser syntax errors (E0100-E0199)
    // ============================================================
    /// Unexpected token.
    UnexpectedToken = 100,
    /// Token stream ended mid-construct.
    UnexpectedEof = 101,
    /// Missing `;` at the end of a statement.
    MissingDelimiter = 102,
    /// Missing closing bracket.
    UnclosedDelimiter = 103,
    /// Expected an expression.
    ExpectedExpression = 104,
    /// Expected an identifier.
    ExpectedIdentifier = 105,
    /// Expected a data type.
    ExpectedType = 106,

    // ============================================================
    // Parser semantic errors (E0200-E0299)
    // ============================================================
    /// Name already declared in this scope.
    DuplicateDeclaration = 200,
    /// Use of a name with no visible declaration.
    UndeclaredIdentifier = 201,
    /// `break`/`continue` with no enclosing loop.
    JumpOutsideLoop = 202,
    /// Function definition disagrees with its prototype.
    SignatureMismatch = 203,
    /// Function or prototype already present.
    DuplicateFunction = 204,
    /// Call to a function with no visible declaration.
    UndeclaredFunction = 205,
    /// More than one `main`.
    DuplicateEntryPoint = 206,

    // ============================================================
    // IR-emission errors (E0300-E0399)
    // ============================================================
    /// Identifier absent from the IR symbol map.
    UndefinedIdentifier = 300,
    /// `++`/`--` applied to something other than an identifier.
    InvalidIncrementTarget = 301,
    /// Returned value disagrees with the declared return type.
    ReturnTypeMismatch = 302,
    /// Global initialiser that is not a constant.
    NonConstantInitialiser = 303,
    /// Function failed LLVM verification.
    FunctionVerification = 304,
    /// Module failed LLVM verification.
    ModuleVerification = 305,
    /// Operand kinds unsupported by the operator.
    InvalidOperands = 306,
}

impl ErrorCode {
    /// Formatted code string, e.g. `E0001`.
    pub fn as_str(&self) -> String {
        format!("E{:04}", *self as u16)
    }

    /// A fix-it hint, where one exists.
    pub fn help(&self) -> Option<&'static str> {
        match self {
            ErrorCode::InvalidCharLiteral => {
                Some("character literals are a single character between `'` quotes")
            }
            ErrorCode::InvalidStringLiteral => {
                Some("string literals must close with `\"` on the same line")
            }
            ErrorCode::UnterminatedComment => Some("add `*/` to close the comment"),
            ErrorCode::MissingImportPath => {
                Some("write the imported file as a quoted path: #import \"file.em\"")
            }
            ErrorCode::MissingDelimiter => Some("add `;` to end the statement"),
            ErrorCode::JumpOutsideLoop => {
                Some("`break` and `continue` are only valid inside `for` or `while`")
            }
            ErrorCode::NonConstantInitialiser => {
                Some("global variables may only be initialised with literal constants")
            }
            _ => None,
        }
    }
}

/// A located compiler error.
///
/// `span` is `None` only for driver-level failures (a file that could not
/// be opened, a linking error) where no source position exists.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<ErrorCode>,
    pub message: String,
    pub span: Option<Span>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            code: None,
            message: message.into(),
            span: Some(span),
            notes: Vec::new(),
        }
    }

    /// A diagnostic with no source position.
    pub fn bare(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        if let Some(help) = code.help() {
            self.notes.push(help.to_string());
        }
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Renders diagnostics to stderr against the build's source map.
pub struct DiagnosticEmitter<'a> {
    sources: &'a SourceMap,
}

impl<'a> DiagnosticEmitter<'a> {
    pub fn new(sources: &'a SourceMap) -> Self {
        Self { sources }
    }

    pub fn emit(&self, diagnostic: &Diagnostic) {
        let Some(span) = diagnostic.span else {
            eprintln!("error: {}", diagnostic.message);
            for note in &diagnostic.notes {
                eprintln!("  help: {note}");
            }
            return;
        };

        let file = self.sources.name(span.file).to_string();
        let message = match diagnostic.code {
            Some(code) => format!("[{}] {}", code.as_str(), diagnostic.message),
            None => diagnostic.message.clone(),
        };

        // Zero-width spans still need a visible label.
        let end = span.end.max(span.start + 1);

        let mut builder = Report::build(ReportKind::Error, file.clone(), span.start)
            .with_message(&message)
            .with_label(
                Label::new((file, span.start..end))
                    .with_color(Color::Red)
                    .with_message(&diagnostic.message),
            );

        if !diagnostic.notes.is_empty() {
            builder = builder.with_help(diagnostic.notes.join("\n"));
        }

        let cache = ariadne::sources(
            self.sources
                .iter()
                .map(|f| (f.name.clone(), f.text.clone())),
        );
        builder
            .finish()
            .eprint(cache)
            .expect("failed to write diagnostic");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FileId;

    #[test]
    fn test_code_formatting() {
        assert_eq!(ErrorCode::InvalidToken.as_str(), "E0001");
        assert_eq!(ErrorCode::UnexpectedToken.as_str(), "E0100");
        assert_eq!(ErrorCode::UndefinedIdentifier.as_str(), "E0300");
    }

    #[test]
    fn test_with_code_attaches_help() {
        let span = Span::new(FileId(0), 0, 1, 1, 0);
        let diag = Diagnostic::error("missing `;`", span).with_code(ErrorCode::MissingDelimiter);
        assert_eq!(diag.code, Some(ErrorCode::MissingDelimiter));
        assert!(!diag.notes.is_empty());
    }

    #[test]
    fn test_bare_diagnostic_has_no_span() {
        let diag = Diagnostic::bare("could not open file");
        assert!(diag.span.is_none());
    }
}
