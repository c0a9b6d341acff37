//! Expression and statement emission.
//!
//! Identifiers resolve through the symbol map either to a loaded value
//! (r-value position) or to their storage address (l-value position,
//! used by assignments and `++`/`--`). Control flow synthesises the
//! basic-block shapes described in the module docs: `then/else/ifend`,
//! `forcond/forbody/forinc/forend`, `whilecond/whilebody/whileend`, and
//! the short-circuit `right`/`end` pair with an i1 phi merge.

use inkwell::types::BasicTypeEnum;
use inkwell::values::{BasicValueEnum, IntValue, PointerValue};
use inkwell::{FloatPredicate, IntPredicate};

use super::context::{llvm_err, IrContext, LoopTerminals};
use crate::ast::{BinOp, Expr, ExprKind, JumpKind, LiteralValue, UnaryOp};
use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::span::Span;

impl<'ctx, 'a> IrContext<'ctx, 'a> {
    /// Emit each statement of a block in order. Statements after the
    /// first `return` or `break`/`continue` are unreachable and skipped.
    /// Returns whether the block ended in a `return`.
    pub(crate) fn emit_block(&mut self, block: &[Expr]) -> Result<bool, Diagnostic> {
        for expr in block {
            self.emit_expr(expr)?;
            match expr.kind {
                ExprKind::Return { .. } => return Ok(true),
                ExprKind::Jump { .. } => return Ok(false),
                _ => {}
            }
        }
        Ok(false)
    }

    /// Emit one node. Statements yield `None`; expressions yield a value,
    /// except calls to void functions.
    pub(crate) fn emit_expr(
        &mut self,
        expr: &Expr,
    ) -> Result<Option<BasicValueEnum<'ctx>>, Diagnostic> {
        match &expr.kind {
            ExprKind::Identifier { name } => {
                let (ptr, _ty) = self.lookup(name, expr.span)?;
                let value = self.builder.build_load(ptr, name).map_err(llvm_err)?;
                Ok(Some(value))
            }
            ExprKind::Literal { value } => Ok(Some(self.emit_literal(value)?)),
            ExprKind::Declaration { data_type, name } => {
                let (ptr, _) = self.emit_declaration(*data_type, name, expr.span)?;
                Ok(Some(ptr.into()))
            }
            ExprKind::Unary {
                op,
                is_postfix,
                operand,
            } => Ok(Some(self.emit_unary(*op, *is_postfix, operand, expr.span)?)),
            ExprKind::Binary { op, left, right } => {
                Ok(Some(self.emit_binary(*op, left, right, expr.span)?))
            }
            ExprKind::Call { function, args } => self.emit_call(function, args, expr.span),
            ExprKind::If {
                condition,
                then_block,
                else_block,
            } => {
                self.emit_if(condition, then_block, else_block.as_deref())?;
                Ok(None)
            }
            ExprKind::For {
                init,
                condition,
                increment,
                body,
            } => {
                self.emit_for(
                    init.as_deref(),
                    condition.as_deref(),
                    increment.as_deref(),
                    body,
                )?;
                Ok(None)
            }
            ExprKind::While { condition, body } => {
                self.emit_while(condition, body)?;
                Ok(None)
            }
            ExprKind::Return { value } => {
                self.emit_return(value.as_deref(), expr.span)?;
                Ok(None)
            }
            ExprKind::Jump { kind } => {
                self.emit_jump(*kind, expr.span)?;
                Ok(None)
            }
            ExprKind::Block { body } => {
                // Scoping was the parser's concern; the IR shape is flat.
                self.emit_block(body)?;
                Ok(None)
            }
            ExprKind::FunctionDef(_) => Err(Diagnostic::error(
                "nested function definitions are not supported",
                expr.span,
            )
            .with_code(ErrorCode::UnexpectedToken)),
        }
    }

    /// Emit an expression that must produce a value.
    fn emit_value(&mut self, expr: &Expr) -> Result<BasicValueEnum<'ctx>, Diagnostic> {
        self.emit_expr(expr)?.ok_or_else(|| {
            Diagnostic::error("expected a value here", expr.span)
                .with_code(ErrorCode::InvalidOperands)
        })
    }

    /// Emit an operand in r-value position. A declaration resolves to an
    /// address, so its value is read back with a load.
    fn emit_operand(&mut self, expr: &Expr) -> Result<BasicValueEnum<'ctx>, Diagnostic> {
        match &expr.kind {
            ExprKind::Declaration { data_type, name } => {
                let (ptr, _ty) = self.emit_declaration(*data_type, name, expr.span)?;
                self.builder.build_load(ptr, name).map_err(llvm_err)
            }
            _ => self.emit_value(expr),
        }
    }

    /// The storage address of an l-value, with its element type.
    fn emit_lvalue(
        &mut self,
        expr: &Expr,
    ) -> Result<(PointerValue<'ctx>, BasicTypeEnum<'ctx>), Diagnostic> {
        match &expr.kind {
            ExprKind::Identifier { name } => self.lookup(name, expr.span),
            ExprKind::Declaration { data_type, name } => {
                self.emit_declaration(*data_type, name, expr.span)
            }
            _ => Err(
                Diagnostic::error("this expression is not assignable", expr.span)
                    .with_code(ErrorCode::InvalidOperands),
            ),
        }
    }

    fn lookup(
        &self,
        name: &str,
        span: Span,
    ) -> Result<(PointerValue<'ctx>, BasicTypeEnum<'ctx>), Diagnostic> {
        self.symbols.get(name).copied().ok_or_else(|| {
            Diagnostic::error(format!("undefined identifier `{name}`"), span)
                .with_code(ErrorCode::UndefinedIdentifier)
        })
    }

    /// Stack allocation for a local, placed in the function's entry block
    /// rather than at the current insertion point. Declarations never
    /// initialise; a parent `=` node carries the initial value.
    fn emit_declaration(
        &mut self,
        data_type: crate::ast::DataType,
        name: &str,
        span: Span,
    ) -> Result<(PointerValue<'ctx>, BasicTypeEnum<'ctx>), Diagnostic> {
        let ty = self.basic_type(data_type).ok_or_else(|| {
            Diagnostic::error(format!("variable `{name}` cannot have type void"), span)
                .with_code(ErrorCode::InvalidOperands)
        })?;
        let ptr = self.entry_block_alloca(name, ty)?;
        self.symbols.insert(name.to_string(), (ptr, ty));
        Ok((ptr, ty))
    }

    fn emit_literal(&mut self, value: &LiteralValue) -> Result<BasicValueEnum<'ctx>, Diagnostic> {
        Ok(match value {
            LiteralValue::Bool(b) => self
                .context
                .bool_type()
                .const_int(u64::from(*b), false)
                .into(),
            LiteralValue::Int(i) => self
                .context
                .i32_type()
                .const_int(*i as i64 as u64, true)
                .into(),
            LiteralValue::Float(x) => self.context.f32_type().const_float(f64::from(*x)).into(),
            LiteralValue::Char(c) => self
                .context
                .i8_type()
                .const_int(u64::from(*c as u8), false)
                .into(),
            LiteralValue::String(s) => self
                .builder
                .build_global_string_ptr(s, ".str")
                .map_err(llvm_err)?
                .as_pointer_value()
                .into(),
        })
    }

    // ============================================================
    // Conditions
    // ============================================================

    /// Boolean coercion for `&&`/`||` operands: i1 passes through, other
    /// integers compare against 0, floats against 0.0, pointers against
    /// null.
    fn cast_to_bool(
        &mut self,
        value: BasicValueEnum<'ctx>,
        span: Span,
    ) -> Result<IntValue<'ctx>, Diagnostic> {
        match value {
            BasicValueEnum::IntValue(iv) => {
                if iv.get_type().get_bit_width() == 1 {
                    Ok(iv)
                } else {
                    self.builder
                        .build_int_compare(
                            IntPredicate::NE,
                            iv,
                            iv.get_type().const_zero(),
                            "tobool",
                        )
                        .map_err(llvm_err)
                }
            }
            BasicValueEnum::FloatValue(fv) => self
                .builder
                .build_float_compare(
                    FloatPredicate::ONE,
                    fv,
                    fv.get_type().const_zero(),
                    "tobool",
                )
                .map_err(llvm_err),
            BasicValueEnum::PointerValue(pv) => {
                self.builder.build_is_not_null(pv, "tobool").map_err(llvm_err)
            }
            _ => Err(
                Diagnostic::error("value cannot be used in a boolean context", span)
                    .with_code(ErrorCode::InvalidOperands),
            ),
        }
    }

    /// Branch-condition normalisation for `if`/`for`/`while`: always a
    /// fresh comparison against zero, even when the value is already i1.
    fn normalize_condition(
        &mut self,
        value: BasicValueEnum<'ctx>,
        name: &str,
        span: Span,
    ) -> Result<IntValue<'ctx>, Diagnostic> {
        match value {
            BasicValueEnum::IntValue(iv) => self
                .builder
                .build_int_compare(IntPredicate::NE, iv, iv.get_type().const_zero(), name)
                .map_err(llvm_err),
            BasicValueEnum::FloatValue(fv) => self
                .builder
                .build_float_compare(FloatPredicate::ONE, fv, fv.get_type().const_zero(), name)
                .map_err(llvm_err),
            BasicValueEnum::PointerValue(pv) => {
                self.builder.build_is_not_null(pv, name).map_err(llvm_err)
            }
            _ => Err(
                Diagnostic::error("condition cannot be converted to a boolean", span)
                    .with_code(ErrorCode::InvalidOperands),
            ),
        }
    }

    /// Append a branch to `target` unless the insertion block has already
    /// terminated (through a return or jump).
    fn seal_with_branch(&mut self, target: inkwell::basic_block::BasicBlock<'ctx>) -> Result<(), Diagnostic> {
        let unterminated = self
            .builder
            .get_insert_block()
            .map(|block| block.get_terminator().is_none())
            .unwrap_or(false);
        if unterminated {
            self.builder
                .build_unconditional_branch(target)
                .map_err(llvm_err)?;
        }
        Ok(())
    }

    // ============================================================
    // Unary
    // ============================================================

    fn emit_unary(
        &mut self,
        op: UnaryOp,
        is_postfix: bool,
        operand: &Expr,
        span: Span,
    ) -> Result<BasicValueEnum<'ctx>, Diagnostic> {
        match op {
            UnaryOp::Not => {
                let value = self.emit_operand(operand)?;
                let BasicValueEnum::IntValue(iv) = value else {
                    return Err(Diagnostic::error(
                        "`!` requires an integer operand",
                        operand.span,
                    )
                    .with_code(ErrorCode::InvalidOperands));
                };
                self.builder
                    .build_int_compare(IntPredicate::EQ, iv, iv.get_type().const_zero(), "nottmp")
                    .map(Into::into)
                    .map_err(llvm_err)
            }
            UnaryOp::BitNot => {
                let value = self.emit_operand(operand)?;
                let BasicValueEnum::IntValue(iv) = value else {
                    return Err(Diagnostic::error(
                        "`~` requires an integer operand",
                        operand.span,
                    )
                    .with_code(ErrorCode::InvalidOperands));
                };
                self.builder
                    .build_xor(iv, iv.get_type().const_all_ones(), "bnottmp")
                    .map(Into::into)
                    .map_err(llvm_err)
            }
            UnaryOp::Increment | UnaryOp::Decrement => {
                // The target must be addressable, so only identifiers.
                let ExprKind::Identifier { name } = &operand.kind else {
                    return Err(Diagnostic::error(
                        "`++`/`--` can only be applied to a variable",
                        span,
                    )
                    .with_code(ErrorCode::InvalidIncrementTarget));
                };
                let (ptr, _ty) = self.lookup(name, operand.span)?;
                let old = self.builder.build_load(ptr, "oldtmp").map_err(llvm_err)?;

                let new: BasicValueEnum = match old {
                    BasicValueEnum::IntValue(iv) => {
                        let one = iv.get_type().const_int(1, false);
                        if op == UnaryOp::Increment {
                            self.builder.build_int_add(iv, one, "incdec").map_err(llvm_err)?
                        } else {
                            self.builder.build_int_sub(iv, one, "incdec").map_err(llvm_err)?
                        }
                        .into()
                    }
                    BasicValueEnum::FloatValue(fv) => {
                        let one = fv.get_type().const_float(1.0);
                        if op == UnaryOp::Increment {
                            self.builder
                                .build_float_add(fv, one, "incdec")
                                .map_err(llvm_err)?
                        } else {
                            self.builder
                                .build_float_sub(fv, one, "incdec")
                                .map_err(llvm_err)?
                        }
                        .into()
                    }
                    _ => {
                        return Err(Diagnostic::error(
                            format!("`{}` cannot be incremented", name),
                            span,
                        )
                        .with_code(ErrorCode::InvalidOperands));
                    }
                };

                self.builder.build_store(ptr, new).map_err(llvm_err)?;
                Ok(if is_postfix { old } else { new })
            }
        }
    }

    // ============================================================
    // Binary
    // ============================================================

    /// Dispatch in three phases: short-circuit logicals, plain two-operand
    /// instructions, then assignments.
    fn emit_binary(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        span: Span,
    ) -> Result<BasicValueEnum<'ctx>, Diagnostic> {
        if op == BinOp::And || op == BinOp::Or {
            return self.emit_short_circuit(left, right, op == BinOp::And);
        }

        if op == BinOp::Assign {
            let (ptr, _) = self.emit_lvalue(left)?;
            let value = self.emit_operand(right)?;
            self.builder.build_store(ptr, value).map_err(llvm_err)?;
            return Ok(value);
        }

        if let Some(base) = op.compound_base() {
            let (ptr, _ty) = self.emit_lvalue(left)?;
            let current = self.builder.build_load(ptr, "loadtmp").map_err(llvm_err)?;
            let rhs = self.emit_operand(right)?;
            let result = self.emit_arith(base, current, rhs, span)?;
            self.builder.build_store(ptr, result).map_err(llvm_err)?;
            return Ok(result);
        }

        let lhs = self.emit_operand(left)?;
        let rhs = self.emit_operand(right)?;
        self.emit_arith(op, lhs, rhs, span)
    }

    /// The plain two-operand instructions. Signed semantics throughout;
    /// float operands take the floating-point forms.
    fn emit_arith(
        &mut self,
        op: BinOp,
        lhs: BasicValueEnum<'ctx>,
        rhs: BasicValueEnum<'ctx>,
        span: Span,
    ) -> Result<BasicValueEnum<'ctx>, Diagnostic> {
        match (lhs, rhs) {
            (BasicValueEnum::IntValue(l), BasicValueEnum::IntValue(r)) => {
                let b = self.builder;
                let value: IntValue = match op {
                    BinOp::Add => b.build_int_add(l, r, "addtmp").map_err(llvm_err)?,
                    BinOp::Sub => b.build_int_sub(l, r, "subtmp").map_err(llvm_err)?,
                    BinOp::Mul => b.build_int_mul(l, r, "multmp").map_err(llvm_err)?,
                    BinOp::Div => b.build_int_signed_div(l, r, "divtmp").map_err(llvm_err)?,
                    BinOp::Rem => b.build_int_signed_rem(l, r, "modtmp").map_err(llvm_err)?,
                    BinOp::Shl => b.build_left_shift(l, r, "lshtmp").map_err(llvm_err)?,
                    BinOp::Shr => b.build_right_shift(l, r, true, "rshtmp").map_err(llvm_err)?,
                    BinOp::BitAnd => b.build_and(l, r, "andtmp").map_err(llvm_err)?,
                    BinOp::BitOr => b.build_or(l, r, "ortmp").map_err(llvm_err)?,
                    BinOp::BitXor => b.build_xor(l, r, "xortmp").map_err(llvm_err)?,
                    BinOp::Lt => b
                        .build_int_compare(IntPredicate::SLT, l, r, "cmptmp")
                        .map_err(llvm_err)?,
                    BinOp::Le => b
                        .build_int_compare(IntPredicate::SLE, l, r, "cmptmp")
                        .map_err(llvm_err)?,
                    BinOp::Gt => b
                        .build_int_compare(IntPredicate::SGT, l, r, "cmptmp")
                        .map_err(llvm_err)?,
                    BinOp::Ge => b
                        .build_int_compare(IntPredicate::SGE, l, r, "cmptmp")
                        .map_err(llvm_err)?,
                    BinOp::Eq => b
                        .build_int_compare(IntPredicate::EQ, l, r, "cmptmp")
                        .map_err(llvm_err)?,
                    BinOp::Ne => b
                        .build_int_compare(IntPredicate::NE, l, r, "cmptmp")
                        .map_err(llvm_err)?,
                    _ => {
                        return Err(Diagnostic::error(
                            format!("operator `{}` cannot be applied here", op.symbol()),
                            span,
                        )
                        .with_code(ErrorCode::InvalidOperands));
                    }
                };
                Ok(value.into())
            }
            (BasicValueEnum::FloatValue(l), BasicValueEnum::FloatValue(r)) => {
                let b = self.builder;
                let value: BasicValueEnum = match op {
                    BinOp::Add => b.build_float_add(l, r, "addtmp").map_err(llvm_err)?.into(),
                    BinOp::Sub => b.build_float_sub(l, r, "subtmp").map_err(llvm_err)?.into(),
                    BinOp::Mul => b.build_float_mul(l, r, "multmp").map_err(llvm_err)?.into(),
                    BinOp::Div => b.build_float_div(l, r, "divtmp").map_err(llvm_err)?.into(),
                    BinOp::Rem => b.build_float_rem(l, r, "modtmp").map_err(llvm_err)?.into(),
                    BinOp::Lt => b
                        .build_float_compare(FloatPredicate::OLT, l, r, "cmptmp")
                        .map_err(llvm_err)?
                        .into(),
                    BinOp::Le => b
                        .build_float_compare(FloatPredicate::OLE, l, r, "cmptmp")
                        .map_err(llvm_err)?
                        .into(),
                    BinOp::Gt => b
                        .build_float_compare(FloatPredicate::OGT, l, r, "cmptmp")
                        .map_err(llvm_err)?
                        .into(),
                    BinOp::Ge => b
                        .build_float_compare(FloatPredicate::OGE, l, r, "cmptmp")
                        .map_err(llvm_err)?
                        .into(),
                    BinOp::Eq => b
                        .build_float_compare(FloatPredicate::OEQ, l, r, "cmptmp")
                        .map_err(llvm_err)?
                        .into(),
                    BinOp::Ne => b
                        .build_float_compare(FloatPredicate::ONE, l, r, "cmptmp")
                        .map_err(llvm_err)?
                        .into(),
                    _ => {
                        return Err(Diagnostic::error(
                            format!("operator `{}` is not defined for float operands", op.symbol()),
                            span,
                        )
                        .with_code(ErrorCode::InvalidOperands));
                    }
                };
                Ok(value)
            }
            _ => Err(Diagnostic::error(
                format!("mismatched operand types for `{}`", op.symbol()),
                span,
            )
            .with_code(ErrorCode::InvalidOperands)),
        }
    }

    /// `&&` / `||` with short-circuit evaluation. The right operand only
    /// runs behind the proper edge; the merge is an i1 phi whose incoming
    /// values are the not-taken constant and the evaluated right operand.
    fn emit_short_circuit(
        &mut self,
        left: &Expr,
        right: &Expr,
        is_and: bool,
    ) -> Result<BasicValueEnum<'ctx>, Diagnostic> {
        let lhs = self.emit_operand(left)?;
        let lhs_bool = self.cast_to_bool(lhs, left.span)?;

        // The block holding the conditional branch; the left operand may
        // itself have opened blocks, so this is read after evaluation.
        let entry_block = self
            .builder
            .get_insert_block()
            .expect("builder is positioned inside a function");
        let function = self.current_function();

        let (right_name, end_name, phi_name) = if is_and {
            ("andright", "andend", "andtmp")
        } else {
            ("orright", "orend", "ortmp")
        };
        let right_bb = self.context.append_basic_block(function, right_name);
        let end_bb = self.context.append_basic_block(function, end_name);

        if is_and {
            self.builder
                .build_conditional_branch(lhs_bool, right_bb, end_bb)
                .map_err(llvm_err)?;
        } else {
            self.builder
                .build_conditional_branch(lhs_bool, end_bb, right_bb)
                .map_err(llvm_err)?;
        }

        self.builder.position_at_end(right_bb);
        let rhs = self.emit_operand(right)?;
        let rhs_bool = self.cast_to_bool(rhs, right.span)?;
        let right_exit = self
            .builder
            .get_insert_block()
            .expect("builder is positioned inside a function");
        self.builder
            .build_unconditional_branch(end_bb)
            .map_err(llvm_err)?;

        self.builder.position_at_end(end_bb);
        let phi = self
            .builder
            .build_phi(self.context.bool_type(), phi_name)
            .map_err(llvm_err)?;
        let short_value = self
            .context
            .bool_type()
            .const_int(u64::from(!is_and), false);
        phi.add_incoming(&[(&short_value, entry_block), (&rhs_bool, right_exit)]);

        Ok(phi.as_basic_value())
    }

    // ============================================================
    // Calls
    // ============================================================

    fn emit_call(
        &mut self,
        function: &str,
        args: &[Expr],
        span: Span,
    ) -> Result<Option<BasicValueEnum<'ctx>>, Diagnostic> {
        let callee = self.module.get_function(function).ok_or_else(|| {
            Diagnostic::error(format!("call to unknown function `{function}`"), span)
                .with_code(ErrorCode::UndeclaredFunction)
        })?;

        let mut call_args = Vec::with_capacity(args.len());
        for arg in args {
            call_args.push(self.emit_operand(arg)?.into());
        }

        let is_void = callee.get_type().get_return_type().is_none();
        let name = if is_void { "" } else { "calltmp" };
        let call = self
            .builder
            .build_call(callee, &call_args, name)
            .map_err(llvm_err)?;
        Ok(call.try_as_basic_value().left())
    }

    // ============================================================
    // Control flow
    // ============================================================

    /// `then`/`else`/`ifend`. An `if` without an `else` still gets an
    /// empty `else` block that falls through to `ifend`.
    fn emit_if(
        &mut self,
        condition: &Expr,
        then_block: &[Expr],
        else_block: Option<&[Expr]>,
    ) -> Result<(), Diagnostic> {
        let cond_val = self.emit_operand(condition)?;
        let cond = self.normalize_condition(cond_val, "ifcond", condition.span)?;

        let function = self.current_function();
        let then_bb = self.context.append_basic_block(function, "then");
        let else_bb = self.context.append_basic_block(function, "else");
        let end_bb = self.context.append_basic_block(function, "ifend");

        self.builder
            .build_conditional_branch(cond, then_bb, else_bb)
            .map_err(llvm_err)?;

        self.builder.position_at_end(then_bb);
        self.emit_block(then_block)?;
        self.seal_with_branch(end_bb)?;

        self.builder.position_at_end(else_bb);
        if let Some(else_block) = else_block {
            self.emit_block(else_block)?;
        }
        self.seal_with_branch(end_bb)?;

        self.builder.position_at_end(end_bb);
        Ok(())
    }

    /// `forcond`/`forbody`/`forinc`/`forend`. `continue` jumps to the
    /// condition block, so the increment is reached only by falling off
    /// the body.
    fn emit_for(
        &mut self,
        init: Option<&Expr>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &[Expr],
    ) -> Result<(), Diagnostic> {
        if let Some(init) = init {
            self.emit_expr(init)?;
        }

        let function = self.current_function();
        let cond_bb = self.context.append_basic_block(function, "forcond");
        let body_bb = self.context.append_basic_block(function, "forbody");
        let inc_bb = self.context.append_basic_block(function, "forinc");
        let end_bb = self.context.append_basic_block(function, "forend");

        self.builder
            .build_unconditional_branch(cond_bb)
            .map_err(llvm_err)?;

        self.builder.position_at_end(cond_bb);
        let cond = match condition {
            Some(condition) => {
                let value = self.emit_operand(condition)?;
                self.normalize_condition(value, "forcond", condition.span)?
            }
            // No condition reads as always true.
            None => self.context.bool_type().const_int(1, false),
        };
        self.builder
            .build_conditional_branch(cond, body_bb, end_bb)
            .map_err(llvm_err)?;

        self.loop_terminals.push(LoopTerminals {
            continue_target: cond_bb,
            break_target: end_bb,
        });

        self.builder.position_at_end(body_bb);
        self.emit_block(body)?;
        self.seal_with_branch(inc_bb)?;

        self.builder.position_at_end(inc_bb);
        if let Some(increment) = increment {
            self.emit_expr(increment)?;
        }
        self.builder
            .build_unconditional_branch(cond_bb)
            .map_err(llvm_err)?;

        self.builder.position_at_end(end_bb);
        self.loop_terminals.pop();
        Ok(())
    }

    /// `whilecond`/`whilebody`/`whileend`.
    fn emit_while(&mut self, condition: &Expr, body: &[Expr]) -> Result<(), Diagnostic> {
        let function = self.current_function();
        let cond_bb = self.context.append_basic_block(function, "whilecond");
        let body_bb = self.context.append_basic_block(function, "whilebody");
        let end_bb = self.context.append_basic_block(function, "whileend");

        self.builder
            .build_unconditional_branch(cond_bb)
            .map_err(llvm_err)?;

        self.builder.position_at_end(cond_bb);
        let value = self.emit_operand(condition)?;
        let cond = self.normalize_condition(value, "whilecond", condition.span)?;
        self.builder
            .build_conditional_branch(cond, body_bb, end_bb)
            .map_err(llvm_err)?;

        self.loop_terminals.push(LoopTerminals {
            continue_target: cond_bb,
            break_target: end_bb,
        });

        self.builder.position_at_end(body_bb);
        self.emit_block(body)?;
        self.seal_with_branch(cond_bb)?;

        self.builder.position_at_end(end_bb);
        self.loop_terminals.pop();
        Ok(())
    }

    /// `break`/`continue`: branch to the top-of-stack target, then park
    /// the builder in a fresh dead block so any unreachable statements
    /// that follow still have somewhere valid to land.
    fn emit_jump(&mut self, kind: JumpKind, span: Span) -> Result<(), Diagnostic> {
        let Some(terminals) = self.loop_terminals.last() else {
            return Err(Diagnostic::error(
                "`break`/`continue` cannot be used outside a loop",
                span,
            )
            .with_code(ErrorCode::JumpOutsideLoop));
        };
        let target = match kind {
            JumpKind::Break => terminals.break_target,
            JumpKind::Continue => terminals.continue_target,
        };
        self.builder
            .build_unconditional_branch(target)
            .map_err(llvm_err)?;

        let function = self.current_function();
        let dead = self.context.append_basic_block(function, "jumpend");
        self.builder.position_at_end(dead);
        Ok(())
    }

    fn emit_return(&mut self, value: Option<&Expr>, span: Span) -> Result<(), Diagnostic> {
        let Some(value) = value else {
            self.builder.build_return(None).map_err(llvm_err)?;
            return Ok(());
        };

        let mut val = self.emit_operand(value)?;
        let declared = self.current_return.unwrap_or(crate::ast::DataType::Void);
        let Some(want) = self.basic_type(declared) else {
            return Err(
                Diagnostic::error("void function cannot return a value", span)
                    .with_code(ErrorCode::ReturnTypeMismatch),
            );
        };

        // Integer width mismatches reconcile with a signed cast; anything
        // else is an error.
        match (val, want) {
            (BasicValueEnum::IntValue(iv), BasicTypeEnum::IntType(want_ty))
                if iv.get_type().get_bit_width() != want_ty.get_bit_width() =>
            {
                val = self
                    .builder
                    .build_int_cast_sign_flag(iv, want_ty, true, "retcast")
                    .map_err(llvm_err)?
                    .into();
            }
            _ => {
                if val.get_type() != want {
                    return Err(Diagnostic::error(
                        format!("returned value does not match the declared {declared} return type"),
                        span,
                    )
                    .with_code(ErrorCode::ReturnTypeMismatch));
                }
            }
        }

        self.builder.build_return(Some(&val)).map_err(llvm_err)?;
        Ok(())
    }
}
