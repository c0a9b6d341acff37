//! The multi-file compilation driver.
//!
//! Each input file is compiled on its own worker thread with its own
//! lexer, parser, emitter, and LLVM context. LLVM objects are not thread
//! safe and cannot be built directly into a shared context concurrently,
//! so every worker serialises its finished module to an in-memory bitcode
//! buffer; after the join barrier a single thread parses the buffers back
//! into one shared context, links them, and hands the result to the
//! backend. The bitcode round-trip is the canonical "move this module to
//! another context" operation.
//!
//! Shared state across workers is limited to mutex-protected aggregates:
//! line-count metrics, the entry-point record, and the collected results.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

use inkwell::context::Context;
use inkwell::memory_buffer::MemoryBuffer;
use inkwell::module::Module;
use thiserror::Error;

use crate::codegen;
use crate::diagnostics::{Diagnostic, DiagnosticEmitter};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::span::{display_path, SourceMap};
use crate::target::{self, OutputKind};

/// Source files must carry this extension.
pub const LANGUAGE_FILE_EXTENSION: &str = "em";

/// What the build produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitKind {
    Object,
    Assembly,
    TextualIr,
}

/// Options the CLI hands to the driver.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Print each file's AST (`--pout`).
    pub print_ast: bool,
    /// Print each file's textual IR (`--llout`).
    pub print_ir: bool,
    pub emit: EmitKind,
    /// Print timing and line-count metrics (`--benchmark`).
    pub benchmark: bool,
    /// Target CPU; unknown or absent degrades to `generic`.
    pub cpu: Option<String>,
    /// Output basename.
    pub output: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            print_ast: false,
            print_ir: false,
            emit: EmitKind::Object,
            benchmark: false,
            cpu: None,
            output: "out".to_string(),
        }
    }
}

/// Driver-level failures. Front-end diagnostics are printed by the worker
/// that hit them; the driver only reports that the build stopped.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid file type for '{0}': sources must have a .{LANGUAGE_FILE_EXTENSION} extension")]
    InvalidExtension(PathBuf),
    #[error("compilation failed")]
    CompilationFailed,
    #[error("no entry point: a function named `main` must be defined in exactly one file")]
    MissingEntryPoint,
    #[error("entry point `main` is defined in both '{first}' and '{second}'")]
    DuplicateEntryPoint { first: String, second: String },
    #[error("linking failed: {0}")]
    Link(String),
    #[error("backend failed: {0}")]
    Backend(String),
}

/// One worker's output: the module as bitcode plus its identity.
struct FileArtifact {
    index: usize,
    name: String,
    bitcode: Vec<u8>,
}

/// Compile every input file, link the modules, and run the backend.
pub fn compile(files: &[PathBuf], options: &CompileOptions) -> Result<(), DriverError> {
    for file in files {
        let ok = file
            .extension()
            .map(|ext| ext == LANGUAGE_FILE_EXTENSION)
            .unwrap_or(false);
        if !ok {
            return Err(DriverError::InvalidExtension(file.clone()));
        }
    }

    let frontend_start = Instant::now();

    let artifacts: Mutex<Vec<FileArtifact>> = Mutex::new(Vec::new());
    let total_lines: Mutex<u64> = Mutex::new(0);
    let entry_points: Mutex<Vec<String>> = Mutex::new(Vec::new());
    // Diagnostics from concurrent workers interleave without this.
    let stderr_gate: Mutex<()> = Mutex::new(());

    let all_ok = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let artifacts = &artifacts;
            let total_lines = &total_lines;
            let entry_points = &entry_points;
            let stderr_gate = &stderr_gate;
            handles.push(scope.spawn(move || {
                compile_file(
                    index,
                    file,
                    options,
                    artifacts,
                    total_lines,
                    entry_points,
                    stderr_gate,
                )
            }));
        }
        handles
            .into_iter()
            .all(|handle| handle.join().unwrap_or(false))
    });

    if !all_ok {
        return Err(DriverError::CompilationFailed);
    }

    // Entry-point accounting happens after the join barrier so the report
    // is deterministic even when two workers raced to set it.
    let entry_points = entry_points.into_inner().unwrap_or_default();
    match entry_points.len() {
        0 => return Err(DriverError::MissingEntryPoint),
        1 => {}
        _ => {
            let mut names = entry_points;
            names.sort();
            return Err(DriverError::DuplicateEntryPoint {
                first: names[0].clone(),
                second: names[1].clone(),
            });
        }
    }

    let frontend_end = Instant::now();

    // Single-threaded from here: pull every module into one shared
    // context and link.
    let mut artifacts = artifacts.into_inner().unwrap_or_default();
    artifacts.sort_by_key(|artifact| artifact.index);

    let shared = Context::create();
    let mut linked: Option<Module> = None;
    for artifact in &artifacts {
        let buffer =
            MemoryBuffer::create_from_memory_range_copy(&artifact.bitcode, &artifact.name);
        let module = Module::parse_bitcode_from_buffer(&buffer, &shared)
            .map_err(|e| DriverError::Link(e.to_string()))?;
        match &linked {
            None => linked = Some(module),
            Some(main_module) => main_module
                .link_in_module(module)
                .map_err(|e| DriverError::Link(e.to_string()))?,
        }
    }
    let linked = linked.ok_or(DriverError::CompilationFailed)?;

    match options.emit {
        EmitKind::TextualIr => {
            let path = format!("{}.ll", options.output);
            linked
                .print_to_file(Path::new(&path))
                .map_err(|e| DriverError::Backend(e.to_string()))?;
        }
        EmitKind::Object | EmitKind::Assembly => {
            let (kind, ext) = match options.emit {
                EmitKind::Assembly => (OutputKind::Assembly, "s"),
                _ => (OutputKind::Object, "o"),
            };
            let path = format!("{}.{ext}", options.output);
            target::run_backend(&linked, Path::new(&path), kind, options.cpu.as_deref())
                .map_err(DriverError::Backend)?;
        }
    }

    let backend_end = Instant::now();

    if options.benchmark {
        let frontend = frontend_end.duration_since(frontend_start).as_secs_f64();
        let backend = backend_end.duration_since(frontend_end).as_secs_f64();
        let lines = total_lines.into_inner().unwrap_or_default();
        println!("\n         Performance metrics");
        println!("-------------------------------------");
        println!("Frontend time elapsed: \t{frontend:.6} sec");
        println!("Backend time elapsed: \t{backend:.6} sec");
        println!("Total execution time: \t{:.6} sec", frontend + backend);
        println!("Lines compiled: \t{lines}");
    }

    Ok(())
}

/// Compile one file start to finish. Diagnostics are rendered here,
/// against this worker's own source map; the return value only says
/// whether the file succeeded.
fn compile_file(
    index: usize,
    path: &Path,
    options: &CompileOptions,
    artifacts: &Mutex<Vec<FileArtifact>>,
    total_lines: &Mutex<u64>,
    entry_points: &Mutex<Vec<String>>,
    stderr_gate: &Mutex<()>,
) -> bool {
    let mut sources = SourceMap::new();
    let name = display_path(path);

    let result = (|| -> Result<(), Diagnostic> {
        let lexer = Lexer::from_file(path, &mut sources)?;
        let lines = u64::from(lexer.total_lines);

        let mut parser = Parser::new(lexer);
        let program = parser.parse_program()?;
        let found_entry = parser.entry_point_found;

        if options.print_ast {
            println!("{program:#?}");
        }

        let context = Context::create();
        let module = codegen::emit_module(&context, &name, &program)?;

        if options.print_ir {
            println!("{}", module.print_to_string().to_string());
        }

        let bitcode = module.write_bitcode_to_memory().as_slice().to_vec();

        *total_lines.lock().expect("metrics lock poisoned") += lines;
        if found_entry {
            entry_points
                .lock()
                .expect("entry-point lock poisoned")
                .push(name.clone());
        }
        artifacts
            .lock()
            .expect("artifact lock poisoned")
            .push(FileArtifact {
                index,
                name: name.clone(),
                bitcode,
            });
        Ok(())
    })();

    match result {
        Ok(()) => true,
        Err(diagnostic) => {
            let _guard = stderr_gate.lock();
            DiagnosticEmitter::new(&sources).emit(&diagnostic);
            false
        }
    }
}
