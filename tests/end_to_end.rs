//! End-to-end pipeline tests: source text through lexer, parser, and IR
//! emission, asserting on the shape of the final module.

use inkwell::context::Context;

use emc::codegen;
use emc::lexer::Lexer;
use emc::parser::Parser;
use emc::span::SourceMap;

fn compile_to_ir(source: &str) -> String {
    let mut sources = SourceMap::new();
    let lexer = Lexer::from_source("test.em", source, &mut sources).expect("lexing failed");
    let mut parser = Parser::new(lexer);
    let program = parser.parse_program().expect("parsing failed");

    let context = Context::create();
    let module = codegen::emit_module(&context, "test", &program).expect("emission failed");
    module.print_to_string().to_string()
}

#[test]
fn scenario_add_function() {
    // One function add(i32, i32) -> i32: entry block allocates two slots,
    // stores the parameters, loads, adds, returns.
    let ir = compile_to_ir("int add(int a, int b) { return a + b; }");
    assert!(ir.contains("define i32 @add(i32"), "ir:\n{ir}");
    assert!(ir.contains("entry:"), "ir:\n{ir}");
    assert!(ir.matches("alloca i32").count() >= 2, "ir:\n{ir}");
    assert!(ir.contains("add i32"), "ir:\n{ir}");
    assert!(ir.contains("ret i32"), "ir:\n{ir}");
}

#[test]
fn scenario_global_load() {
    let ir = compile_to_ir("int g = 7;\nint main() { return g; }");
    assert!(ir.contains("@g = global i32 7"), "ir:\n{ir}");
    assert!(ir.contains("load i32, ptr @g"), "ir:\n{ir}");
}

#[test]
fn scenario_while_accumulator() {
    let ir = compile_to_ir(
        "int main() {\n\
             int i = 0;\n\
             while (i < 10) { i += 1; }\n\
             return i;\n\
         }",
    );
    for label in ["entry:", "whilecond:", "whilebody:", "whileend:"] {
        assert!(ir.contains(label), "missing {label} in:\n{ir}");
    }
    // whilecond: comparison, then the `!= 0` normalisation, then branch.
    assert!(ir.contains("icmp slt i32"), "ir:\n{ir}");
    assert!(ir.contains("icmp ne i1"), "ir:\n{ir}");
    assert!(ir.contains("br i1"), "ir:\n{ir}");
    assert!(ir.contains("br label %whilecond"), "ir:\n{ir}");
}

#[test]
fn scenario_for_with_continue_and_break() {
    let ir = compile_to_ir(
        "int main() {\n\
             int i = 0;\n\
             for (i = 0; i < 3; i += 1) {\n\
                 if (i == 1) { continue; }\n\
                 if (i == 2) { break; }\n\
             }\n\
             return 0;\n\
         }",
    );
    // break targets forend; continue targets forcond, not forinc.
    assert!(ir.contains("br label %forend"), "ir:\n{ir}");
    assert!(ir.contains("br label %forcond"), "ir:\n{ir}");
    assert!(ir.contains("forinc:"), "ir:\n{ir}");
    assert!(ir.contains("jumpend"), "ir:\n{ir}");
}

#[test]
fn scenario_short_circuit_phi() {
    let ir = compile_to_ir("bool f(int x) { return x > 0 && x < 10; }");
    assert!(ir.contains("andright:"), "ir:\n{ir}");
    assert!(ir.contains("andend:"), "ir:\n{ir}");
    assert!(ir.contains("phi i1"), "ir:\n{ir}");
    // The not-taken edge carries constant false.
    assert!(ir.contains("[ false,"), "ir:\n{ir}");
}

#[test]
fn scenario_empty_void_function() {
    let ir = compile_to_ir("void f() { }");
    assert!(ir.contains("define void @f()"), "ir:\n{ir}");
    assert!(ir.contains("ret void"), "ir:\n{ir}");
}

#[test]
fn scenario_infinite_for_loop() {
    let ir = compile_to_ir("int main() { for (;;) { break; } return 0; }");
    assert!(ir.contains("br i1 true, label %forbody"), "ir:\n{ir}");
}

#[test]
fn scenario_both_branches_reachable() {
    let ir = compile_to_ir("int main() { int a = 0; if (0) { a = 1; } else { a = 2; } return a; }");
    assert!(ir.contains("then:"), "ir:\n{ir}");
    assert!(ir.contains("else:"), "ir:\n{ir}");
    assert!(ir.contains("ifend:"), "ir:\n{ir}");
    assert!(ir.contains("br label %ifend"), "ir:\n{ir}");
}

#[test]
fn scenario_nested_calls_and_prototypes() {
    let ir = compile_to_ir(
        "int square(int x);\n\
         int square(int x) { return x * x; }\n\
         int main() { return square(square(2)); }",
    );
    assert!(ir.contains("define i32 @square(i32"), "ir:\n{ir}");
    assert!(ir.matches("call i32 @square").count() == 2, "ir:\n{ir}");
    // The prototype did not leave a duplicate function behind.
    assert!(ir.matches("@square").count() >= 3, "ir:\n{ir}");
    assert!(!ir.contains("@square.1"), "ir:\n{ir}");
}

#[test]
fn scenario_postfix_and_prefix_increment() {
    let ir = compile_to_ir(
        "int main() {\n\
             int i = 0;\n\
             int a = i++;\n\
             int b = ++i;\n\
             return a + b;\n\
         }",
    );
    assert!(ir.contains("incdec"), "ir:\n{ir}");
    assert!(ir.contains("oldtmp"), "ir:\n{ir}");
}

#[test]
fn scenario_compound_assignment_chain() {
    let ir = compile_to_ir(
        "int main() {\n\
             int x = 8;\n\
             x *= 2; x /= 4; x %= 3; x <<= 1; x >>= 1; x &= 7; x |= 2; x ^= 1;\n\
             return x;\n\
         }",
    );
    for inst in ["mul i32", "sdiv i32", "srem i32", "shl i32", "ashr i32",
                 "and i32", "or i32", "xor i32"] {
        assert!(ir.contains(inst), "missing {inst} in:\n{ir}");
    }
}
