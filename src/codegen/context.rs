//! IR emission context.
//!
//! [`IrContext`] bundles the per-file LLVM `(context, module, builder)`
//! triple with the state the walk needs: the flat name → (storage address,
//! element type) map and the stack of enclosing-loop jump targets. The
//! element type rides along with every address because opaque pointers do
//! not remember what they point at, and later loads need it.

use std::collections::HashMap;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::{Builder, BuilderError};
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FunctionType};
use inkwell::values::{BasicValueEnum, FunctionValue, PointerValue, UnnamedAddress};
use inkwell::AddressSpace;

use crate::ast::{BinOp, DataType, Expr, ExprKind, FunctionDef, LiteralValue};
use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::span::Span;

/// Jump targets of the innermost loops, pushed when a loop body starts
/// and popped on the way out.
pub struct LoopTerminals<'ctx> {
    pub continue_target: BasicBlock<'ctx>,
    pub break_target: BasicBlock<'ctx>,
}

/// Wrap an inkwell builder failure; these indicate a bug in the emitter
/// rather than in user code.
pub(crate) fn llvm_err(err: BuilderError) -> Diagnostic {
    Diagnostic::bare(format!("LLVM builder error: {err}"))
}

/// The per-file IR emission state.
pub struct IrContext<'ctx, 'a> {
    pub context: &'ctx Context,
    pub module: &'a Module<'ctx>,
    pub builder: &'a Builder<'ctx>,
    /// name → (storage address, element type); flat for the whole file.
    pub symbols: HashMap<String, (PointerValue<'ctx>, BasicTypeEnum<'ctx>)>,
    /// LIFO stack of `{continue_target, break_target}`.
    pub loop_terminals: Vec<LoopTerminals<'ctx>>,
    /// Declared return type of the function currently being emitted.
    pub(crate) current_return: Option<DataType>,
}

impl<'ctx, 'a> IrContext<'ctx, 'a> {
    pub fn new(context: &'ctx Context, module: &'a Module<'ctx>, builder: &'a Builder<'ctx>) -> Self {
        Self {
            context,
            module,
            builder,
            symbols: HashMap::new(),
            loop_terminals: Vec::new(),
            current_return: None,
        }
    }

    // ============================================================
    // Type lowering
    // ============================================================

    /// Lower a declared type; `None` for void.
    pub fn basic_type(&self, ty: DataType) -> Option<BasicTypeEnum<'ctx>> {
        match ty {
            DataType::Void => None,
            DataType::Bool => Some(self.context.bool_type().into()),
            DataType::Int => Some(self.context.i32_type().into()),
            DataType::Float => Some(self.context.f32_type().into()),
            DataType::Char => Some(self.context.i8_type().into()),
            DataType::String => Some(self.context.i8_type().ptr_type(AddressSpace::default()).into()),
        }
    }

    fn fn_type(
        &self,
        def: &FunctionDef,
        span: Span,
    ) -> Result<FunctionType<'ctx>, Diagnostic> {
        let mut param_types: Vec<BasicMetadataTypeEnum> = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let ty = self.basic_type(param.data_type).ok_or_else(|| {
                Diagnostic::error(
                    format!("parameter `{}` cannot have type void", param.name),
                    span,
                )
                .with_code(ErrorCode::InvalidOperands)
            })?;
            param_types.push(ty.into());
        }
        Ok(match self.basic_type(def.return_type) {
            Some(ret) => ret.fn_type(&param_types, false),
            None => self.context.void_type().fn_type(&param_types, false),
        })
    }

    /// The function the builder is currently positioned in.
    pub(crate) fn current_function(&self) -> FunctionValue<'ctx> {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_parent())
            .expect("builder is positioned inside a function")
    }

    /// Allocate a stack slot in the entry block of the current function,
    /// regardless of where the builder is currently inserting.
    pub(crate) fn entry_block_alloca(
        &self,
        name: &str,
        ty: BasicTypeEnum<'ctx>,
    ) -> Result<PointerValue<'ctx>, Diagnostic> {
        let entry = self
            .current_function()
            .get_first_basic_block()
            .expect("function has an entry block");
        let tmp = self.context.create_builder();
        match entry.get_first_instruction() {
            Some(first) => tmp.position_before(&first),
            None => tmp.position_at_end(entry),
        }
        tmp.build_alloca(ty, name).map_err(llvm_err)
    }

    // ============================================================
    // Top level
    // ============================================================

    /// Emit one top-level AST node: a function, a zero-initialised global,
    /// or a constant-initialised global.
    pub fn emit_top_level(&mut self, expr: &Expr) -> Result<(), Diagnostic> {
        match &expr.kind {
            ExprKind::FunctionDef(def) => self.emit_function(def, expr.span),
            ExprKind::Declaration { data_type, name } => {
                self.emit_global(name, *data_type, None, expr.span)
            }
            ExprKind::Binary {
                op: BinOp::Assign,
                left,
                right,
            } => {
                let ExprKind::Declaration { data_type, name } = &left.kind else {
                    return Err(Diagnostic::error(
                        "only declarations can be initialised at the top level",
                        expr.span,
                    )
                    .with_code(ErrorCode::NonConstantInitialiser));
                };
                self.emit_global(name, *data_type, Some(right), expr.span)
            }
            _ => Err(Diagnostic::error(
                "only functions and global declarations are allowed at the top level",
                expr.span,
            )
            .with_code(ErrorCode::UnexpectedToken)),
        }
    }

    fn emit_function(&mut self, def: &FunctionDef, span: Span) -> Result<(), Diagnostic> {
        let fn_type = self.fn_type(def, span)?;
        // A definition may re-use the object its prototype created.
        let function = match self.module.get_function(&def.name) {
            Some(existing) => existing,
            None => self.module.add_function(&def.name, fn_type, None),
        };

        if def.is_prototype {
            return Ok(());
        }

        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);
        self.current_return = Some(def.return_type);

        for (i, param) in def.params.iter().enumerate() {
            let value = function
                .get_nth_param(i as u32)
                .expect("parameter count matches the signature");
            value.set_name(&param.name);
            let ty = self
                .basic_type(param.data_type)
                .expect("void parameters are rejected when the type is built");
            let slot = self.builder.build_alloca(ty, &param.name).map_err(llvm_err)?;
            self.builder.build_store(slot, value).map_err(llvm_err)?;
            self.symbols.insert(param.name.clone(), (slot, ty));
        }

        self.emit_block(&def.body)?;

        // A void function may fall off the end without an explicit return.
        let unterminated = self
            .builder
            .get_insert_block()
            .map(|block| block.get_terminator().is_none())
            .unwrap_or(false);
        if unterminated && def.return_type == DataType::Void {
            self.builder.build_return(None).map_err(llvm_err)?;
        }

        if !function.verify(true) {
            eprintln!("{}", self.module.print_to_string().to_string());
            return Err(Diagnostic::error(
                format!("function `{}` failed LLVM verification", def.name),
                span,
            )
            .with_code(ErrorCode::FunctionVerification));
        }

        self.current_return = None;
        Ok(())
    }

    /// Emit a global variable: zero-initialised when bare, otherwise the
    /// initialiser must be a literal constant.
    fn emit_global(
        &mut self,
        name: &str,
        data_type: DataType,
        initialiser: Option<&Expr>,
        span: Span,
    ) -> Result<(), Diagnostic> {
        let ty = self.basic_type(data_type).ok_or_else(|| {
            Diagnostic::error(format!("global `{name}` cannot have type void"), span)
                .with_code(ErrorCode::InvalidOperands)
        })?;

        let global = self.module.add_global(ty, None, name);
        global.set_linkage(Linkage::External);

        match initialiser {
            None => {
                let zero: BasicValueEnum = match ty {
                    BasicTypeEnum::IntType(t) => t.const_zero().into(),
                    BasicTypeEnum::FloatType(t) => t.const_zero().into(),
                    BasicTypeEnum::PointerType(t) => t.const_null().into(),
                    _ => {
                        return Err(Diagnostic::error(
                            format!("global `{name}` has an unsupported type"),
                            span,
                        )
                        .with_code(ErrorCode::InvalidOperands));
                    }
                };
                global.set_initializer(&zero);
            }
            Some(value) => {
                let ExprKind::Literal { value: literal } = &value.kind else {
                    return Err(Diagnostic::error(
                        format!("initialiser of global `{name}` is not a constant"),
                        value.span,
                    )
                    .with_code(ErrorCode::NonConstantInitialiser));
                };
                if literal.data_type() != data_type {
                    return Err(Diagnostic::error(
                        format!(
                            "initialiser of global `{name}` has type {}, expected {}",
                            literal.data_type(),
                            data_type
                        ),
                        value.span,
                    )
                    .with_code(ErrorCode::InvalidOperands));
                }
                let init = self.const_literal(literal);
                global.set_initializer(&init);
            }
        }

        self.symbols
            .insert(name.to_string(), (global.as_pointer_value(), ty));
        Ok(())
    }

    /// Lower a literal to a module-level constant. Strings become a
    /// private unnamed-address null-terminated array, and the constant is
    /// a pointer to it.
    fn const_literal(&self, literal: &LiteralValue) -> BasicValueEnum<'ctx> {
        match literal {
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
            LiteralValue::String(s) => {
                let array = self.context.const_string(s.as_bytes(), true);
                let storage = self.module.add_global(array.get_type(), None, ".str");
                storage.set_initializer(&array);
                storage.set_linkage(Linkage::Private);
                storage.set_constant(true);
                storage.set_unnamed_address(UnnamedAddress::Global);
                storage.as_pointer_value().into()
            }
        }
    }
}
