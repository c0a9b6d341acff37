//! Em compiler CLI.
//!
//! ```text
//! emc FILE [FILE ...] [OPTIONS]
//!
//! Options:
//!   --pout            Print each file's AST
//!   --llout           Print each file's textual IR
//!   --ll              Write textual IR instead of an object file
//!   --asm             Write assembly instead of an object file
//!   --benchmark       Print timing and line-count metrics
//!   --cpu <NAME>      Target CPU (defaults to `generic` and the host triple)
//!   -o, --output <NAME>  Output basename [default: out]
//! ```
//!
//! Exit code 0 on success, 1 on any diagnostic.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use emc::driver::{self, CompileOptions, EmitKind};

/// The Em language compiler.
#[derive(Parser)]
#[command(name = "emc")]
#[command(version)]
#[command(about = "Compile .em sources to object, assembly, or LLVM IR", long_about = None)]
struct Cli {
    /// Source files to compile
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Print each file's AST
    #[arg(long = "pout")]
    print_ast: bool,

    /// Print each file's textual IR
    #[arg(long = "llout")]
    print_ir: bool,

    /// Write textual IR instead of an object file
    #[arg(long = "ll", conflicts_with = "asm")]
    ll: bool,

    /// Write assembly instead of an object file
    #[arg(long = "asm")]
    asm: bool,

    /// Print timing and line-count metrics
    #[arg(long)]
    benchmark: bool,

    /// Target CPU; unknown names fall back to `generic`
    #[arg(long, value_name = "NAME")]
    cpu: Option<String>,

    /// Output basename
    #[arg(short, long, value_name = "NAME", default_value = "out")]
    output: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let emit = if cli.ll {
        EmitKind::TextualIr
    } else if cli.asm {
        EmitKind::Assembly
    } else {
        EmitKind::Object
    };

    let options = CompileOptions {
        print_ast: cli.print_ast,
        print_ir: cli.print_ir,
        emit,
        benchmark: cli.benchmark,
        cpu: cli.cpu,
        output: cli.output,
    };

    match driver::compile(&cli.files, &options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
