//! Target selection and backend invocation.
//!
//! A fixed table maps user-facing CPU names to LLVM target triples. An
//! unknown or unspecified CPU degrades to `generic` on the host triple.

use std::path::Path;

use inkwell::module::Module;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine, TargetTriple,
};
use inkwell::OptimizationLevel;

/// CPU name → target triple.
pub const CPU_TARGETS: &[(&str, &str)] = &[
    // Windows/Linux x86 systems
    ("x86-64", "x86_64-unknown-linux-gnu"),
    // Embedded / microcontrollers (ARM 32-bit)
    ("cortex-m3", "armv7m-none-eabi"),
    ("cortex-m4", "armv7em-none-eabi"),
    ("cortex-m7", "armv7em-none-eabi"),
    // Raspberry Pi / ARM 64-bit
    ("cortex-a7", "armv7a-unknown-linux-gnueabihf"),
    ("cortex-a53", "aarch64-unknown-linux-gnu"),
    ("cortex-a72", "aarch64-unknown-linux-gnu"),
    // Modern phones
    ("cortex-a76", "aarch64-unknown-linux-gnu"),
    ("cortex-a78", "aarch64-unknown-linux-gnu"),
    ("cortex-x1", "aarch64-unknown-linux-gnu"),
    // Apple
    ("apple-m1", "arm64-apple-darwin"),
    ("apple-m2", "arm64-apple-darwin"),
    // Cloud ARM servers
    ("neoverse-n1", "aarch64-unknown-linux-gnu"),
    ("neoverse-v1", "aarch64-unknown-linux-gnu"),
    ("neoverse-n2", "aarch64-unknown-linux-gnu"),
];

/// Look a CPU name up in the table.
pub fn triple_for_cpu(cpu: &str) -> Option<&'static str> {
    CPU_TARGETS
        .iter()
        .find(|(name, _)| *name == cpu)
        .map(|(_, triple)| *triple)
}

/// What the backend writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Object,
    Assembly,
}

/// Run the LLVM backend over a linked module and write the output file.
pub fn run_backend(
    module: &Module,
    out_path: &Path,
    kind: OutputKind,
    cpu: Option<&str>,
) -> Result<(), String> {
    Target::initialize_all(&InitializationConfig::default());

    let (cpu_name, triple) = match cpu.and_then(triple_for_cpu) {
        Some(known) => (
            cpu.expect("triple lookup implies a cpu was given"),
            TargetTriple::create(known),
        ),
        None => ("generic", TargetMachine::get_default_triple()),
    };

    module.set_triple(&triple);
    let target = Target::from_triple(&triple).map_err(|e| e.to_string())?;
    let machine = target
        .create_target_machine(
            &triple,
            cpu_name,
            "",
            OptimizationLevel::Default,
            RelocMode::Default,
            CodeModel::Default,
        )
        .ok_or_else(|| format!("target machine unavailable for `{cpu_name}`"))?;
    module.set_data_layout(&machine.get_target_data().get_data_layout());

    let file_type = match kind {
        OutputKind::Object => FileType::Object,
        OutputKind::Assembly => FileType::Assembly,
    };
    machine
        .write_to_file(module, file_type, out_path)
        .map_err(|e| e.to_string())
}
