//! Expression parsing: precedence climbing over the operator table.
//!
//! The subexpression parser is handed a minimum precedence and a stop
//! token (`;` in statement position, `)` inside parentheses, `,` in an
//! argument list, where `)` also ends the final argument). Meeting an
//! operator of higher precedence deepens the recursion; a strictly lower
//! one finishes the current spine and hands the built operand back to the
//! caller, which splices it into a new binary node. Ties chain
//! left-associatively except at the assignment level, which is
//! right-associative.

use super::Parser;
use crate::ast::{BinOp, DataType, Expr, ExprKind, LiteralValue, UnaryOp};
use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::lexer::TokenKind;

/// Precedence levels, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Starting floor for a fresh subexpression.
    Min = 0,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Additive,
    Multiplicative,
    Unary,
    /// Identifiers, calls, literals, parenthesised expressions.
    Primary,
}

impl Precedence {
    /// The next tighter level; used as the right-operand floor for
    /// left-associative operators.
    fn next(self) -> Self {
        match self {
            Precedence::Min => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Unary,
            Precedence::Unary => Precedence::Primary,
            Precedence::Primary => Precedence::Primary,
        }
    }
}

/// Map an operator token to its precedence level.
pub(crate) fn op_prec(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::Assign
        | TokenKind::PlusEq
        | TokenKind::MinusEq
        | TokenKind::StarEq
        | TokenKind::SlashEq
        | TokenKind::PercentEq
        | TokenKind::OrOrEq
        | TokenKind::BitOrEq
        | TokenKind::CaretEq
        | TokenKind::AndAndEq
        | TokenKind::BitAndEq
        | TokenKind::ShlEq
        | TokenKind::ShrEq => Precedence::Assignment,

        TokenKind::OrOr
        | TokenKind::BitOr
        | TokenKind::Caret
        | TokenKind::Shl
        | TokenKind::Shr => Precedence::Or,

        TokenKind::AndAnd | TokenKind::Amp => Precedence::And,

        TokenKind::EqEq | TokenKind::NotEq => Precedence::Equality,

        TokenKind::Lt | TokenKind::LtEq | TokenKind::Gt | TokenKind::GtEq => {
            Precedence::Comparison
        }

        TokenKind::Plus | TokenKind::Minus => Precedence::Additive,

        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Precedence::Multiplicative,

        TokenKind::Not | TokenKind::BitNot | TokenKind::Increment | TokenKind::Decrement => {
            Precedence::Unary
        }

        _ => Precedence::Min,
    }
}

impl Parser {
    /// Parse a subexpression at or above `min_prec`, ending at `stop`.
    pub(super) fn parse_subexpression(
        &mut self,
        min_prec: Precedence,
        stop: TokenKind,
    ) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_unary(stop)?;

        loop {
            let tok = self.current()?;
            let kind = tok.kind;

            if kind == stop || (stop == TokenKind::Comma && kind == TokenKind::RParen) {
                break;
            }

            let prec = op_prec(kind);
            if prec == Precedence::Min {
                return Err(if kind == TokenKind::Semi {
                    Diagnostic::error(
                        "`;` used in an expression that is not a statement",
                        tok.span,
                    )
                    .with_code(ErrorCode::UnexpectedToken)
                } else {
                    Diagnostic::error(
                        format!("unexpected {} in expression", kind.description()),
                        tok.span,
                    )
                    .with_code(ErrorCode::UnexpectedToken)
                });
            }
            if prec < min_prec {
                break;
            }

            let op_tok = self.bump()?;
            let Some(op) = BinOp::from_token(op_tok.kind) else {
                return Err(Diagnostic::error(
                    format!("{} is not a binary operator", op_tok.kind.description()),
                    op_tok.span,
                )
                .with_code(ErrorCode::UnexpectedToken));
            };

            // Assignment is right-associative: the right operand re-enters
            // at the same level. Everything else climbs one level.
            let rhs_floor = if prec == Precedence::Assignment {
                Precedence::Assignment
            } else {
                prec.next()
            };
            let right = self.parse_subexpression(rhs_floor, stop)?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    /// Prefix operators, then a primary, then postfix `++`/`--`.
    fn parse_unary(&mut self, stop: TokenKind) -> Result<Expr, Diagnostic> {
        let tok = self.current()?;
        if let Some(op) = UnaryOp::from_token(tok.kind) {
            let span = tok.span;
            self.lexer.advance();
            let operand = self.parse_unary(stop)?;
            let span = span.merge(operand.span);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    is_postfix: false,
                    operand: Box::new(operand),
                },
                span,
            ));
        }

        let mut expr = self.parse_primary(stop)?;
        while let Some(tok) = self.lexer.peek(0) {
            let op = match tok.kind {
                TokenKind::Increment => UnaryOp::Increment,
                TokenKind::Decrement => UnaryOp::Decrement,
                _ => break,
            };
            let span = expr.span.merge(tok.span);
            self.lexer.advance();
            expr = Expr::new(
                ExprKind::Unary {
                    op,
                    is_postfix: true,
                    operand: Box::new(expr),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn parse_primary(&mut self, _stop: TokenKind) -> Result<Expr, Diagnostic> {
        let tok = self.bump()?;
        let span = tok.span;

        match tok.kind {
            TokenKind::Ident => {
                if self.check(TokenKind::LParen) {
                    return self.parse_call(tok.text, span);
                }
                if self.symbols.lookup_variable(&tok.text).is_none() {
                    return Err(Diagnostic::error(
                        format!("use of undeclared identifier `{}`", tok.text),
                        span,
                    )
                    .with_code(ErrorCode::UndeclaredIdentifier));
                }
                Ok(Expr::new(ExprKind::Identifier { name: tok.text }, span))
            }
            TokenKind::NumericLit => {
                let value = if tok.text.contains('.') {
                    let parsed = tok.text.parse::<f32>().map_err(|_| {
                        Diagnostic::error("invalid float literal", span)
                            .with_code(ErrorCode::MalformedNumber)
                    })?;
                    LiteralValue::Float(parsed)
                } else {
                    let parsed = tok.text.parse::<i32>().map_err(|_| {
                        Diagnostic::error("integer literal out of range", span)
                            .with_code(ErrorCode::MalformedNumber)
                    })?;
                    LiteralValue::Int(parsed)
                };
                Ok(Expr::new(ExprKind::Literal { value }, span))
            }
            TokenKind::CharLit => {
                let c = tok.text.chars().next().unwrap_or('\0');
                Ok(Expr::new(
                    ExprKind::Literal {
                        value: LiteralValue::Char(c),
                    },
                    span,
                ))
            }
            TokenKind::StringLit => Ok(Expr::new(
                ExprKind::Literal {
                    value: LiteralValue::String(tok.text),
                },
                span,
            )),
            TokenKind::BoolLit => Ok(Expr::new(
                ExprKind::Literal {
                    value: LiteralValue::Bool(tok.text == "true"),
                },
                span,
            )),
            kind if kind.is_data_type() => {
                let data_type =
                    DataType::from_token(kind).expect("is_data_type implies a mapped type");
                let name_tok = self.expect(TokenKind::Ident)?;
                if !self.symbols.declare_variable(&name_tok.text, data_type) {
                    return Err(Diagnostic::error(
                        format!("`{}` is already declared in this scope", name_tok.text),
                        name_tok.span,
                    )
                    .with_code(ErrorCode::DuplicateDeclaration));
                }
                Ok(Expr::new(
                    ExprKind::Declaration {
                        data_type,
                        name: name_tok.text,
                    },
                    span.merge(name_tok.span),
                ))
            }
            TokenKind::LParen => {
                let inner = self.parse_subexpression(Precedence::Min, TokenKind::RParen)?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Semi => Err(Diagnostic::error(
                "`;` used in an expression that is not a statement",
                span,
            )
            .with_code(ErrorCode::UnexpectedToken)),
            other => Err(Diagnostic::error(
                format!("expected an expression, found {}", other.description()),
                span,
            )
            .with_code(ErrorCode::ExpectedExpression)),
        }
    }

    /// `name(arg, arg, ...)`: arguments are comma-separated
    /// subexpressions; the final one ends at `)`.
    fn parse_call(
        &mut self,
        function: String,
        span: crate::span::Span,
    ) -> Result<Expr, Diagnostic> {
        let Some(sig) = self.symbols.lookup_function(&function).cloned() else {
            return Err(Diagnostic::error(
                format!("call to undeclared function `{function}`"),
                span,
            )
            .with_code(ErrorCode::UndeclaredFunction));
        };

        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_subexpression(Precedence::Min, TokenKind::Comma)?);
                if !self.try_consume(TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.expect(TokenKind::RParen)?;

        if args.len() != sig.params.len() {
            return Err(Diagnostic::error(
                format!(
                    "`{function}` takes {} argument(s) but {} were supplied",
                    sig.params.len(),
                    args.len()
                ),
                span.merge(close.span),
            )
            .with_code(ErrorCode::SignatureMismatch));
        }

        Ok(Expr::new(
            ExprKind::Call { function, args },
            span.merge(close.span),
        ))
    }
}
