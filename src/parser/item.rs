//! Top-level constructs and statements.
//!
//! The top level of a program is a sequence of function definitions or
//! prototypes, global declarations, and global initialisers. All of them
//! open with a data-type token, so the dispatch happens on what follows
//! the declared name: `(` starts a function, `=` a global initialiser,
//! and `;` closes a bare global declaration.

use super::Parser;
use crate::ast::{BinOp, DataType, Expr, ExprKind, FunctionDef, JumpKind, Param};
use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::lexer::TokenKind;
use crate::parser::expr::Precedence;
use crate::symbol::FunctionSig;

impl Parser {
    pub(super) fn parse_top_level(&mut self) -> Result<Expr, Diagnostic> {
        let type_tok = self.bump()?;
        let Some(data_type) = DataType::from_token(type_tok.kind) else {
            return Err(Diagnostic::error(
                format!(
                    "expected a type at the top level, found {}",
                    type_tok.kind.description()
                ),
                type_tok.span,
            )
            .with_code(ErrorCode::ExpectedType));
        };

        let name_tok = self.expect(TokenKind::Ident)?;
        let name = name_tok.text.clone();
        let start = type_tok.span;

        match self.current()?.kind {
            TokenKind::LParen => self.parse_function(data_type, name, start),
            TokenKind::Assign => {
                self.declare_global(&name, data_type, name_tok.span)?;
                let decl = Expr::new(
                    ExprKind::Declaration {
                        data_type,
                        name,
                    },
                    start.merge(name_tok.span),
                );
                self.lexer.advance();
                let value = self.parse_subexpression(Precedence::Min, TokenKind::Semi)?;
                self.expect(TokenKind::Semi)?;
                let span = start.merge(value.span);
                Ok(Expr::new(
                    ExprKind::Binary {
                        op: BinOp::Assign,
                        left: Box::new(decl),
                        right: Box::new(value),
                    },
                    span,
                ))
            }
            TokenKind::Semi => {
                self.declare_global(&name, data_type, name_tok.span)?;
                self.lexer.advance();
                Ok(Expr::new(
                    ExprKind::Declaration {
                        data_type,
                        name,
                    },
                    start.merge(name_tok.span),
                ))
            }
            _ => Err(self.error_expected("`(`, `=`, or `;` after the declared name")),
        }
    }

    fn declare_global(
        &mut self,
        name: &str,
        data_type: DataType,
        span: crate::span::Span,
    ) -> Result<(), Diagnostic> {
        if !self.symbols.declare_variable(name, data_type) {
            return Err(Diagnostic::error(
                format!("global variable `{name}` is already declared"),
                span,
            )
            .with_code(ErrorCode::DuplicateDeclaration));
        }
        Ok(())
    }

    // ============================================================
    // Functions
    // ============================================================

    fn parse_function(
        &mut self,
        return_type: DataType,
        name: String,
        start: crate::span::Span,
    ) -> Result<Expr, Diagnostic> {
        self.expect(TokenKind::LParen)?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let type_tok = self.bump()?;
                let Some(data_type) = DataType::from_token(type_tok.kind) else {
                    return Err(Diagnostic::error(
                        format!(
                            "expected a parameter type, found {}",
                            type_tok.kind.description()
                        ),
                        type_tok.span,
                    )
                    .with_code(ErrorCode::ExpectedType));
                };
                let param_name = self.expect(TokenKind::Ident)?;
                params.push(Param {
                    name: param_name.text,
                    data_type,
                });
                if !self.try_consume(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        let sig = FunctionSig {
            return_type,
            params: params.iter().map(|p| p.data_type).collect(),
        };
        let name_span = start;

        // A trailing `;` marks a prototype: declaration only, no body.
        if self.try_consume(TokenKind::Semi) {
            if self.symbols.functions.contains_key(&name) {
                return Err(Diagnostic::error(
                    format!("function `{name}` is already defined"),
                    name_span,
                )
                .with_code(ErrorCode::DuplicateFunction));
            }
            if self
                .symbols
                .function_prototypes
                .insert(name.clone(), sig)
                .is_some()
            {
                return Err(Diagnostic::error(
                    format!("function `{name}` already has a prototype"),
                    name_span,
                )
                .with_code(ErrorCode::DuplicateFunction));
            }
            return Ok(Expr::new(
                ExprKind::FunctionDef(FunctionDef {
                    return_type,
                    name,
                    params,
                    is_prototype: true,
                    body: Vec::new(),
                }),
                start,
            ));
        }

        self.expect(TokenKind::LBrace)?;

        if self.symbols.functions.contains_key(&name) {
            return Err(Diagnostic::error(
                format!("function `{name}` is already defined"),
                name_span,
            )
            .with_code(ErrorCode::DuplicateFunction));
        }
        if let Some(proto) = self.symbols.function_prototypes.get(&name) {
            if *proto != sig {
                return Err(Diagnostic::error(
                    format!("definition of `{name}` does not match its prototype"),
                    name_span,
                )
                .with_code(ErrorCode::SignatureMismatch));
            }
        }
        self.symbols.functions.insert(name.clone(), sig);

        if name == "main" {
            if self.entry_point_found {
                return Err(Diagnostic::error(
                    "entry point `main` is defined more than once",
                    name_span,
                )
                .with_code(ErrorCode::DuplicateEntryPoint));
            }
            self.entry_point_found = true;
        }

        self.symbols.push_scope();
        for param in &params {
            if !self.symbols.declare_variable(&param.name, param.data_type) {
                return Err(Diagnostic::error(
                    format!("duplicate parameter name `{}`", param.name),
                    name_span,
                )
                .with_code(ErrorCode::DuplicateDeclaration));
            }
        }

        let mut body = Vec::new();
        while !self.check(TokenKind::RBrace) {
            body.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace)?;
        self.symbols.pop_scope();

        Ok(Expr::new(
            ExprKind::FunctionDef(FunctionDef {
                return_type,
                name,
                params,
                is_prototype: false,
                body,
            }),
            start,
        ))
    }

    // ============================================================
    // Statements
    // ============================================================

    pub(super) fn parse_statement(&mut self) -> Result<Expr, Diagnostic> {
        let tok = self.current()?;
        let start = tok.span;
        match tok.kind {
            TokenKind::If => self.parse_if(start),
            TokenKind::For => self.parse_for(start),
            TokenKind::While => self.parse_while(start),
            TokenKind::Return => {
                self.lexer.advance();
                let value = if self.check(TokenKind::Semi) {
                    None
                } else {
                    Some(Box::new(
                        self.parse_subexpression(Precedence::Min, TokenKind::Semi)?,
                    ))
                };
                self.expect(TokenKind::Semi)?;
                Ok(Expr::new(ExprKind::Return { value }, start))
            }
            TokenKind::Break | TokenKind::Continue => {
                let kind = if tok.kind == TokenKind::Break {
                    JumpKind::Break
                } else {
                    JumpKind::Continue
                };
                self.lexer.advance();
                self.expect(TokenKind::Semi)?;
                if self.loop_depth == 0 {
                    return Err(Diagnostic::error(
                        format!(
                            "`{}` cannot be used outside a loop",
                            match kind {
                                JumpKind::Break => "break",
                                JumpKind::Continue => "continue",
                            }
                        ),
                        start,
                    )
                    .with_code(ErrorCode::JumpOutsideLoop));
                }
                Ok(Expr::new(ExprKind::Jump { kind }, start))
            }
            TokenKind::LBrace => {
                // A free-standing brace block: new scope, no control flow.
                self.lexer.advance();
                self.symbols.push_scope();
                let mut body = Vec::new();
                while !self.check(TokenKind::RBrace) {
                    body.push(self.parse_statement()?);
                }
                self.expect(TokenKind::RBrace)?;
                self.symbols.pop_scope();
                Ok(Expr::new(ExprKind::Block { body }, start))
            }
            _ => {
                let expr = self.parse_subexpression(Precedence::Min, TokenKind::Semi)?;
                self.expect(TokenKind::Semi)?;
                Ok(expr)
            }
        }
    }

    /// A loop or branch body: one statement, or a braced statement list.
    fn parse_body(&mut self) -> Result<Vec<Expr>, Diagnostic> {
        if self.try_consume(TokenKind::LBrace) {
            let mut body = Vec::new();
            while !self.check(TokenKind::RBrace) {
                body.push(self.parse_statement()?);
            }
            self.expect(TokenKind::RBrace)?;
            Ok(body)
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    fn parse_if(&mut self, start: crate::span::Span) -> Result<Expr, Diagnostic> {
        self.lexer.advance();
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_subexpression(Precedence::Min, TokenKind::RParen)?;
        self.expect(TokenKind::RParen)?;

        let then_block = self.parse_body()?;
        let else_block = if self.try_consume(TokenKind::Else) {
            Some(self.parse_body()?)
        } else {
            None
        };

        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                then_block,
                else_block,
            },
            start,
        ))
    }

    fn parse_for(&mut self, start: crate::span::Span) -> Result<Expr, Diagnostic> {
        self.lexer.advance();
        self.expect(TokenKind::LParen)?;
        // The loop scope opens here so an init declaration is scoped to
        // the loop.
        self.symbols.push_scope();

        let init = if self.check(TokenKind::Semi) {
            None
        } else {
            Some(Box::new(
                self.parse_subexpression(Precedence::Min, TokenKind::Semi)?,
            ))
        };
        self.expect(TokenKind::Semi)?;

        let condition = if self.check(TokenKind::Semi) {
            None
        } else {
            Some(Box::new(
                self.parse_subexpression(Precedence::Min, TokenKind::Semi)?,
            ))
        };
        self.expect(TokenKind::Semi)?;

        let increment = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(Box::new(
                self.parse_subexpression(Precedence::Min, TokenKind::RParen)?,
            ))
        };
        self.expect(TokenKind::RParen)?;

        self.loop_depth += 1;
        let body = self.parse_body()?;
        self.loop_depth -= 1;
        self.symbols.pop_scope();

        Ok(Expr::new(
            ExprKind::For {
                init,
                condition,
                increment,
                body,
            },
            start,
        ))
    }

    fn parse_while(&mut self, start: crate::span::Span) -> Result<Expr, Diagnostic> {
        self.lexer.advance();
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_subexpression(Precedence::Min, TokenKind::RParen)?;
        self.expect(TokenKind::RParen)?;

        self.symbols.push_scope();
        self.loop_depth += 1;
        let body = self.parse_body()?;
        self.loop_depth -= 1;
        self.symbols.pop_scope();

        Ok(Expr::new(
            ExprKind::While {
                condition: Box::new(condition),
                body,
            },
            start,
        ))
    }
}
