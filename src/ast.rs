//! Abstract Syntax Tree for Em.
//!
//! The tree is a tagged variant with owned children: every node is owned
//! by its parent and the top-level list owns the roots, so an AST lives
//! from parser completion until IR emission finishes for that file.
//!
//! Two renderings exist: the `Debug` derive (used by `--pout`) and a
//! source-form printer ([`print_program`]) whose output re-lexes and
//! re-parses to a structurally equal tree.

use std::fmt;

use crate::lexer::TokenKind;
use crate::span::Span;

/// The declarable data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Void,
    Bool,
    Int,
    Float,
    Char,
    String,
}

impl DataType {
    pub fn from_token(kind: TokenKind) -> Option<DataType> {
        match kind {
            TokenKind::Void => Some(DataType::Void),
            TokenKind::Bool => Some(DataType::Bool),
            TokenKind::Int => Some(DataType::Int),
            TokenKind::Float => Some(DataType::Float),
            TokenKind::Char => Some(DataType::Char),
            TokenKind::Str => Some(DataType::String),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Void => "void",
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Char => "char",
            DataType::String => "string",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `~`
    BitNot,
    /// `++`
    Increment,
    /// `--`
    Decrement,
}

impl UnaryOp {
    pub fn from_token(kind: TokenKind) -> Option<UnaryOp> {
        match kind {
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::BitNot => Some(UnaryOp::BitNot),
            TokenKind::Increment => Some(UnaryOp::Increment),
            TokenKind::Decrement => Some(UnaryOp::Decrement),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Increment => "++",
            UnaryOp::Decrement => "--",
        }
    }
}

/// Binary operators, including every assignment variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    /// `&&` (short-circuit)
    And,
    /// `||` (short-circuit)
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
    ShlAssign,
    ShrAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    /// `&&=`
    AndAssign,
    /// `||=`
    OrAssign,
}

impl BinOp {
    pub fn from_token(kind: TokenKind) -> Option<BinOp> {
        match kind {
            TokenKind::Plus => Some(BinOp::Add),
            TokenKind::Minus => Some(BinOp::Sub),
            TokenKind::Star => Some(BinOp::Mul),
            TokenKind::Slash => Some(BinOp::Div),
            TokenKind::Percent => Some(BinOp::Rem),
            TokenKind::Shl => Some(BinOp::Shl),
            TokenKind::Shr => Some(BinOp::Shr),
            TokenKind::Amp => Some(BinOp::BitAnd),
            TokenKind::BitOr => Some(BinOp::BitOr),
            TokenKind::Caret => Some(BinOp::BitXor),
            TokenKind::AndAnd => Some(BinOp::And),
            TokenKind::OrOr => Some(BinOp::Or),
            TokenKind::EqEq => Some(BinOp::Eq),
            TokenKind::NotEq => Some(BinOp::Ne),
            TokenKind::Lt => Some(BinOp::Lt),
            TokenKind::LtEq => Some(BinOp::Le),
            TokenKind::Gt => Some(BinOp::Gt),
            TokenKind::GtEq => Some(BinOp::Ge),
            TokenKind::Assign => Some(BinOp::Assign),
            TokenKind::PlusEq => Some(BinOp::AddAssign),
            TokenKind::MinusEq => Some(BinOp::SubAssign),
            TokenKind::StarEq => Some(BinOp::MulAssign),
            TokenKind::SlashEq => Some(BinOp::DivAssign),
            TokenKind::PercentEq => Some(BinOp::RemAssign),
            TokenKind::ShlEq => Some(BinOp::ShlAssign),
            TokenKind::ShrEq => Some(BinOp::ShrAssign),
            TokenKind::BitAndEq => Some(BinOp::BitAndAssign),
            TokenKind::BitOrEq => Some(BinOp::BitOrAssign),
            TokenKind::CaretEq => Some(BinOp::BitXorAssign),
            TokenKind::AndAndEq => Some(BinOp::AndAssign),
            TokenKind::OrOrEq => Some(BinOp::OrAssign),
            _ => None,
        }
    }

    /// Whether this is `=` or a compound assignment.
    pub fn is_assignment(&self) -> bool {
        self.compound_base().is_some() || matches!(self, BinOp::Assign)
    }

    /// For a compound assignment, the underlying arithmetic operator.
    pub fn compound_base(&self) -> Option<BinOp> {
        match self {
            BinOp::AddAssign => Some(BinOp::Add),
            BinOp::SubAssign => Some(BinOp::Sub),
            BinOp::MulAssign => Some(BinOp::Mul),
            BinOp::DivAssign => Some(BinOp::Div),
            BinOp::RemAssign => Some(BinOp::Rem),
            BinOp::ShlAssign => Some(BinOp::Shl),
            BinOp::ShrAssign => Some(BinOp::Shr),
            BinOp::BitAndAssign | BinOp::AndAssign => Some(BinOp::BitAnd),
            BinOp::BitOrAssign | BinOp::OrAssign => Some(BinOp::BitOr),
            BinOp::BitXorAssign => Some(BinOp::BitXor),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Assign => "=",
            BinOp::AddAssign => "+=",
            BinOp::SubAssign => "-=",
            BinOp::MulAssign => "*=",
            BinOp::DivAssign => "/=",
            BinOp::RemAssign => "%=",
            BinOp::ShlAssign => "<<=",
            BinOp::ShrAssign => ">>=",
            BinOp::BitAndAssign => "&=",
            BinOp::BitOrAssign => "|=",
            BinOp::BitXorAssign => "^=",
            BinOp::AndAssign => "&&=",
            BinOp::OrAssign => "||=",
        }
    }
}

/// `break` or `continue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Break,
    Continue,
}

/// Literal values; strings are owned by the node.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Char(char),
    String(String),
}

impl LiteralValue {
    pub fn data_type(&self) -> DataType {
        match self {
            LiteralValue::Bool(_) => DataType::Bool,
            LiteralValue::Int(_) => DataType::Int,
            LiteralValue::Float(_) => DataType::Float,
            LiteralValue::Char(_) => DataType::Char,
            LiteralValue::String(_) => DataType::String,
        }
    }
}

/// A formal function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub data_type: DataType,
}

/// A function definition or prototype.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub return_type: DataType,
    pub name: String,
    pub params: Vec<Param>,
    /// True when the header ended with `;` instead of a body.
    pub is_prototype: bool,
    pub body: Vec<Expr>,
}

/// An AST node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// One variant per construct.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Identifier {
        name: String,
    },
    Literal {
        value: LiteralValue,
    },
    Declaration {
        data_type: DataType,
        name: String,
    },
    Unary {
        op: UnaryOp,
        is_postfix: bool,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
    FunctionDef(FunctionDef),
    If {
        condition: Box<Expr>,
        then_block: Vec<Expr>,
        else_block: Option<Vec<Expr>>,
    },
    For {
        init: Option<Box<Expr>>,
        condition: Option<Box<Expr>>,
        increment: Option<Box<Expr>>,
        body: Vec<Expr>,
    },
    While {
        condition: Box<Expr>,
        body: Vec<Expr>,
    },
    Return {
        value: Option<Box<Expr>>,
    },
    Jump {
        kind: JumpKind,
    },
    /// A free-standing braced block: scoping only, no control flow.
    Block {
        body: Vec<Expr>,
    },
}

// ============================================================
// Source-form printing
// ============================================================

/// Render a parsed program back to source form. Parenthesisation is
/// explicit, so re-lexing and re-parsing the output reproduces the same
/// tree shape (modulo layout).
pub fn print_program(program: &[Expr]) -> String {
    let mut out = String::new();
    for expr in program {
        match &expr.kind {
            ExprKind::FunctionDef(_) => write_stmt(&mut out, expr, 0),
            // Top-level globals print without statement parentheses so the
            // result is valid at the top level again.
            ExprKind::Declaration { .. } | ExprKind::Binary { .. } => {
                write_expr(&mut out, expr, true);
                out.push_str(";\n");
            }
            _ => write_stmt(&mut out, expr, 0),
        }
    }
    out
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("    ");
    }
}

fn write_block(out: &mut String, body: &[Expr], level: usize) {
    out.push_str("{\n");
    for stmt in body {
        indent(out, level + 1);
        write_stmt(out, stmt, level + 1);
    }
    indent(out, level);
    out.push('}');
}

fn write_stmt(out: &mut String, expr: &Expr, level: usize) {
    match &expr.kind {
        ExprKind::FunctionDef(def) => {
            out.push_str(&format!("{} {}(", def.return_type, def.name));
            for (i, param) in def.params.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&format!("{} {}", param.data_type, param.name));
            }
            out.push(')');
            if def.is_prototype {
                out.push_str(";\n");
            } else {
                out.push(' ');
                write_block(out, &def.body, level);
                out.push('\n');
            }
        }
        ExprKind::If {
            condition,
            then_block,
            else_block,
        } => {
            out.push_str("if (");
            write_expr(out, condition, true);
            out.push_str(") ");
            write_block(out, then_block, level);
            if let Some(else_block) = else_block {
                out.push_str(" else ");
                write_block(out, else_block, level);
            }
            out.push('\n');
        }
        ExprKind::For {
            init,
            condition,
            increment,
            body,
        } => {
            out.push_str("for (");
            if let Some(init) = init {
                write_expr(out, init, true);
            }
            out.push_str("; ");
            if let Some(condition) = condition {
                write_expr(out, condition, true);
            }
            out.push_str("; ");
            if let Some(increment) = increment {
                write_expr(out, increment, true);
            }
            out.push_str(") ");
            write_block(out, body, level);
            out.push('\n');
        }
        ExprKind::While { condition, body } => {
            out.push_str("while (");
            write_expr(out, condition, true);
            out.push_str(") ");
            write_block(out, body, level);
            out.push('\n');
        }
        ExprKind::Return { value } => {
            out.push_str("return");
            if let Some(value) = value {
                out.push(' ');
                write_expr(out, value, true);
            }
            out.push_str(";\n");
        }
        ExprKind::Jump { kind } => {
            out.push_str(match kind {
                JumpKind::Break => "break;\n",
                JumpKind::Continue => "continue;\n",
            });
        }
        ExprKind::Block { body } => {
            write_block(out, body, level);
            out.push('\n');
        }
        _ => {
            write_expr(out, expr, true);
            out.push_str(";\n");
        }
    }
}

/// Write an expression. `bare` suppresses the grouping parentheses at the
/// outermost level only.
fn write_expr(out: &mut String, expr: &Expr, bare: bool) {
    match &expr.kind {
        ExprKind::Identifier { name } => out.push_str(name),
        ExprKind::Literal { value } => match value {
            LiteralValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            LiteralValue::Int(i) => out.push_str(&i.to_string()),
            LiteralValue::Float(x) => {
                let text = format!("{x:?}");
                out.push_str(&text);
                if !text.contains('.') {
                    out.push_str(".0");
                }
            }
            LiteralValue::Char(c) => out.push_str(&format!("'{c}'")),
            LiteralValue::String(s) => out.push_str(&format!("\"{s}\"")),
        },
        ExprKind::Declaration { data_type, name } => {
            out.push_str(&format!("{data_type} {name}"));
        }
        ExprKind::Unary {
            op,
            is_postfix,
            operand,
        } => {
            if !bare {
                out.push('(');
            }
            if *is_postfix {
                write_expr(out, operand, false);
                out.push_str(op.symbol());
            } else {
                out.push_str(op.symbol());
                write_expr(out, operand, false);
            }
            if !bare {
                out.push(')');
            }
        }
        ExprKind::Binary { op, left, right } => {
            if !bare {
                out.push('(');
            }
            write_expr(out, left, false);
            out.push_str(&format!(" {} ", op.symbol()));
            write_expr(out, right, false);
            if !bare {
                out.push(')');
            }
        }
        ExprKind::Call { function, args } => {
            out.push_str(function);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, arg, true);
            }
            out.push(')');
        }
        // Statement forms never appear in expression position; render them
        // through the statement printer so nothing is silently dropped.
        _ => write_stmt(out, expr, 0),
    }
}
