//! Driver-level integration tests: multiple files, `#import` expansion,
//! entry-point accounting, and output selection.

use std::fs;
use std::path::PathBuf;

use emc::driver::{self, CompileOptions, DriverError, EmitKind};

/// A fresh scratch directory per test.
fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("emc_it_{name}"));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

fn write(dir: &PathBuf, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).expect("write source");
    path
}

fn ir_options(dir: &PathBuf, basename: &str) -> CompileOptions {
    CompileOptions {
        emit: EmitKind::TextualIr,
        output: dir.join(basename).display().to_string(),
        ..CompileOptions::default()
    }
}

#[test]
fn two_files_link_into_one_module() {
    let dir = scratch("two_files");
    let lib = write(&dir, "lib.em", "int double_it(int x) { return x * 2; }\n");
    let main = write(
        &dir,
        "main.em",
        "int double_it(int x);\nint main() { return double_it(21); }\n",
    );

    let options = ir_options(&dir, "linked");
    driver::compile(&[lib, main], &options).expect("build should succeed");

    let ir = fs::read_to_string(dir.join("linked.ll")).expect("linked IR written");
    assert!(ir.contains("define i32 @double_it(i32"), "ir:\n{ir}");
    assert!(ir.contains("define i32 @main()"), "ir:\n{ir}");
    assert!(ir.contains("call i32 @double_it"), "ir:\n{ir}");
}

#[test]
fn import_pulls_in_helper_tokens() {
    let dir = scratch("import");
    write(&dir, "helpers.em", "int helper(int a) { return a + 1; }\n");
    let main = write(
        &dir,
        "main.em",
        "#import \"helpers.em\"\nint main() { return helper(1); }\n",
    );

    let options = ir_options(&dir, "imported");
    driver::compile(&[main], &options).expect("build should succeed");

    let ir = fs::read_to_string(dir.join("imported.ll")).expect("IR written");
    assert!(ir.contains("define i32 @helper(i32"), "ir:\n{ir}");
    assert!(ir.contains("define i32 @main()"), "ir:\n{ir}");
}

#[test]
fn import_cycle_fails_the_build() {
    let dir = scratch("cycle");
    write(&dir, "a.em", "#import \"b.em\"\nint main() { return 0; }\n");
    write(&dir, "b.em", "#import \"a.em\"\n");

    let options = ir_options(&dir, "cycle");
    let err = driver::compile(&[dir.join("a.em")], &options).expect_err("cycle must fail");
    assert!(matches!(err, DriverError::CompilationFailed));
}

#[test]
fn missing_entry_point_is_reported() {
    let dir = scratch("no_main");
    let lib = write(&dir, "lib.em", "int f() { return 1; }\n");

    let options = ir_options(&dir, "no_main");
    let err = driver::compile(&[lib], &options).expect_err("missing main must fail");
    assert!(matches!(err, DriverError::MissingEntryPoint));
}

#[test]
fn duplicate_entry_point_across_files_is_reported() {
    let dir = scratch("two_mains");
    let a = write(&dir, "a.em", "int main() { return 0; }\n");
    let b = write(&dir, "b.em", "int main() { return 1; }\n");

    let options = ir_options(&dir, "two_mains");
    let err = driver::compile(&[a, b], &options).expect_err("two mains must fail");
    assert!(matches!(err, DriverError::DuplicateEntryPoint { .. }));
}

#[test]
fn wrong_extension_is_rejected() {
    let dir = scratch("wrong_ext");
    let path = write(&dir, "main.c", "int main() { return 0; }\n");

    let options = ir_options(&dir, "wrong_ext");
    let err = driver::compile(&[path], &options).expect_err("extension must be checked");
    assert!(matches!(err, DriverError::InvalidExtension(_)));
}

#[test]
fn front_end_error_stops_the_build() {
    let dir = scratch("front_err");
    let bad = write(&dir, "bad.em", "int main() { return x; }\n");

    let options = ir_options(&dir, "front_err");
    let err = driver::compile(&[bad], &options).expect_err("undeclared name must fail");
    assert!(matches!(err, DriverError::CompilationFailed));
    assert!(
        !dir.join("front_err.ll").exists(),
        "no output is promised after a failure"
    );
}

#[test]
fn imported_global_is_visible_to_the_importer() {
    let dir = scratch("globals");
    write(&dir, "defs.em", "int counter = 5;\n");
    let main = write(
        &dir,
        "main.em",
        "#import \"defs.em\"\nint main() { return counter; }\n",
    );

    let options = ir_options(&dir, "globals");
    driver::compile(&[main], &options).expect("build should succeed");
    let ir = fs::read_to_string(dir.join("globals.ll")).expect("IR written");
    assert!(ir.contains("@counter = global i32 5"), "ir:\n{ir}");
    assert!(ir.contains("load i32, ptr @counter"), "ir:\n{ir}");
}
