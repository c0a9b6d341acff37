//! # Em Compiler Library
//!
//! The compiler core for Em, a small statically-typed C-style language
//! (`.em` files), lowered to LLVM IR through `inkwell`.
//!
//! ## Pipeline
//!
//! ```text
//! Source -> Lexer -> Parser -> AST -> IR emission -> LLVM module
//! ```
//!
//! Data flows one way: bytes become tokens, tokens become an AST, and the
//! AST is walked once to append instructions to a per-file module. The
//! driver compiles files on parallel workers and links the resulting
//! modules in a shared context before the backend runs.
//!
//! ## Quick start
//!
//! ```rust
//! use emc::lexer::Lexer;
//! use emc::parser::Parser;
//! use emc::span::SourceMap;
//!
//! let mut sources = SourceMap::new();
//! let lexer = Lexer::from_source(
//!     "demo.em",
//!     "int main() { return 0; }",
//!     &mut sources,
//! )
//! .unwrap();
//!
//! let mut parser = Parser::new(lexer);
//! let program = parser.parse_program().unwrap();
//! assert_eq!(program.len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`span`] - source files, spans, and coordinates
//! - [`diagnostics`] - located errors and their rendering
//! - [`lexer`] - tokenization and `#import` expansion
//! - [`ast`] - the syntax tree and its printers
//! - [`symbol`] - the parse-time scope stack and global maps
//! - [`parser`] - recursive descent with precedence climbing
//! - [`codegen`] - LLVM IR emission
//! - [`target`] - CPU table and backend invocation
//! - [`driver`] - the multi-file parallel build

pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod driver;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod symbol;
pub mod target;

pub use diagnostics::{Diagnostic, DiagnosticEmitter, ErrorCode};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use span::{FileId, SourceMap, Span};
