//! LLVM IR emission.
//!
//! Walks the parsed top-level nodes of one file and appends instructions
//! to a per-file module through inkwell. The walk is single-threaded and
//! synchronous; the driver gives every file its own LLVM context, so a
//! finished module is serialised to bitcode before it crosses threads.
//!
//! ```text
//! AST -> IrContext walk -> LLVM module -> verify
//! ```

pub mod context;
mod expr;

#[cfg(test)]
mod tests;

pub use context::{IrContext, LoopTerminals};

use inkwell::context::Context;
use inkwell::module::Module;

use crate::ast::Expr;
use crate::diagnostics::{Diagnostic, ErrorCode};

/// Emit a whole file's AST into a fresh module and verify it.
pub fn emit_module<'ctx>(
    context: &'ctx Context,
    name: &str,
    program: &[Expr],
) -> Result<Module<'ctx>, Diagnostic> {
    let module = context.create_module(name);
    let builder = context.create_builder();

    let mut ir = IrContext::new(context, &module, &builder);
    for node in program {
        ir.emit_top_level(node)?;
    }

    module.verify().map_err(|message| {
        Diagnostic::bare(format!(
            "module `{name}` failed LLVM verification: {}",
            message.to_string()
        ))
        .with_code(ErrorCode::ModuleVerification)
    })?;

    Ok(module)
}
