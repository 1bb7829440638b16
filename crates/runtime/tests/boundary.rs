//! End-to-end source-to-result scenarios, each compiling a program and
//! checking the last value popped off the VM stack.

use mutant_core::lexer::Lexer;
use mutant_core::value::{Environment, Value};
use mutant_compiler::macro_engine::{define_macros, expand_macros};
use mutant_compiler::{Compiler, Parser};
use mutant_runtime::Vm;

fn run(input: &str) -> Value {
    let mut parser = Parser::new(Lexer::new(input));
    let program = parser.parse_program();
    assert!(parser.errors().is_empty(), "parser errors: {:?}", parser.errors());

    let macro_env = Environment::new();
    let program = define_macros(program, &macro_env);
    let program = expand_macros(program, &macro_env);

    let mut compiler = Compiler::new();
    compiler.compile_program(&program).expect("compile error");
    let bytecode = compiler.bytecode();

    let mut vm = Vm::new(bytecode);
    vm.run().expect("vm error");
    vm.last_popped_stack_elem().clone()
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(run("50 / 2 * 2 + 10 - 5"), Value::Integer(55));
}

#[test]
fn false_if_condition_yields_null() {
    assert_eq!(run("if (1 > 2) { 10 }"), Value::Null);
}

#[test]
fn self_recursive_function_via_function_scope() {
    let input = "let a = fn(x){ if (x==0) { 0 } else { a(x-1) + x } }; a(5)";
    assert_eq!(run(input), Value::Integer(15));
}

#[test]
fn closure_captures_one_free_variable() {
    let input = "let makeAdder = fn(x){ fn(y){ x + y } }; makeAdder(3)(4)";
    assert_eq!(run(input), Value::Integer(7));
}

#[test]
fn hash_indexing_sums_two_entries() {
    let input = r#"let h = {"a": 1, "b": 2}; h["a"] + h["b"]"#;
    assert_eq!(run(input), Value::Integer(3));
}

#[test]
fn push_is_immutable() {
    let input = "push([1,2], 3)";
    assert_eq!(
        run(input),
        Value::Array(std::rc::Rc::new(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3)
        ]))
    );
}

#[test]
fn builtin_arity_mismatch_surfaces_as_error_value() {
    let input = r#"len("one", "two")"#;
    assert_eq!(
        run(input),
        Value::Error("wrong number of arguments. got=2, want=1".to_string())
    );
}

#[test]
fn closure_arity_mismatch_is_a_vm_error() {
    let mut parser = Parser::new(Lexer::new("fn(a,b){a+b}(1)"));
    let program = parser.parse_program();
    assert!(parser.errors().is_empty());

    let mut compiler = Compiler::new();
    compiler.compile_program(&program).expect("compile error");
    let mut vm = Vm::new(compiler.bytecode());

    let err = vm.run().expect_err("expected an arity mismatch");
    assert_eq!(err.to_string(), "wrong number of arguments. want=2, got=1");
}

#[test]
fn string_concatenation() {
    assert_eq!(
        run(r#""mon" + "key""#),
        Value::String(std::rc::Rc::from("monkey"))
    );
}

#[test]
fn unless_macro_expands_before_compilation() {
    let input = r#"
        let unless = macro(c, a, b) {
            quote(if (!(unquote(c))) { unquote(a) } else { unquote(b) });
        };
        unless(10 > 5, "big", "small");
    "#;
    assert_eq!(run(input), Value::String(std::rc::Rc::from("small")));
}
