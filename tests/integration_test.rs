use std::{cell::RefCell, rc::Rc};

use pretty_assertions::assert_eq;
use quill::{
    tree_walk_interpreter::{Interpreter, RuntimeError, Value},
    type_checker::{TypeChecker, TypeError, TypeMismatch},
    InterpretError,
};

fn run_program(source: &str) -> (Result<Value, InterpretError>, String) {
    let output = Rc::new(RefCell::new(Vec::<u8>::new()));
    let result = quill::run(source, output.clone());
    let output = String::from_utf8(output.take()).expect("Output should be valid UTF-8");
    (result, output)
}

fn test_valid_program(source: &str, expected_output: &str) -> Value {
    let (result, output) = run_program(source);
    let value = result.expect("Valid program should run");
    assert_eq!(output, expected_output);
    value
}

fn runtime_error(source: &str) -> RuntimeError {
    let program = quill::parse(source).expect("Parse should work on valid program");
    let output = Rc::new(RefCell::new(Vec::<u8>::new()));
    Interpreter::new(output)
        .interpret(&program)
        .expect_err("Program should fail at runtime")
        .kind
}

#[test]
fn test_addition() {
    let value = test_valid_program("1 + 2", "");
    assert_eq!(value, Value::Int(3));
}

#[test]
fn test_loop_control() {
    let source = r#"
int i = 0
while i < 10
    if i == 3
        i = i + 1
        continue
    if i == 6
        break
    print(i)
    i = i + 1
"#;
    test_valid_program(source, "0\n1\n2\n4\n5\n");
}

#[test]
fn test_function_composition() {
    let source = r#"
int add(int a, int b)
    return a + b

int multiply(int a, int b)
    return a * b

int result = add(2, 3)
multiply(result, 2)
"#;
    let value = test_valid_program(source, "");
    assert_eq!(value, Value::Int(10));
}

#[test]
fn test_call_errors_at_runtime() {
    assert!(matches!(
        runtime_error("missing(1)"),
        RuntimeError::UndefinedFunction(name) if name == "missing"
    ));

    let source = r#"
int add(int a, int b)
    return a + b
add(1)
"#;
    assert!(matches!(
        runtime_error(source),
        RuntimeError::Arity {
            expected: 2,
            found: 1,
            ..
        }
    ));
}

#[test]
fn test_list_index_assignment() {
    let source = r#"
list<str> x = ["a", "b", "c"]
x[2] = "z"
print(x.length())
print(x)
"#;
    test_valid_program(source, "3\n[\"a\", \"b\", \"z\"]\n");
}

#[test]
fn test_interpolation() {
    let value = test_valid_program("\"Value: {1+2}\"", "");
    assert_eq!(value, Value::Str("Value: 3".to_string()));
}

#[test]
fn test_nested_comment_is_discarded() {
    let source = "int x = 0\n/* outer /* inner */ still comment */ x = 1\nprint(x)";
    test_valid_program(source, "1\n");
}

#[test]
fn test_runs_are_independent() {
    let source = r#"
int counter = 0
int bump(int n)
    return n + 1
counter = bump(counter)
print(counter)
counter
"#;
    let first = run_program(source);
    let second = run_program(source);
    assert_eq!(first.1, second.1);
    assert_eq!(
        first.0.expect("first run"),
        second.0.expect("second run")
    );
}

#[test]
fn test_type_errors_stop_before_running() {
    let (result, output) = run_program("print(1)\nint x = \"s\"");
    assert!(matches!(
        result,
        Err(InterpretError::Type(TypeError::Mismatch(
            TypeMismatch::Declaration { .. }
        )))
    ));
    assert_eq!(output, "");

    let program = quill::parse("int x = 1").expect("parse");
    assert!(TypeChecker::new().check(&program).is_ok());
}

#[test]
fn test_recursion() {
    let source = r#"
int fib(int n)
    if n <= 1
        return n
    return fib(n - 1) + fib(n - 2)

int i = 0
while i < 10
    print(fib(i))
    i = i + 1
"#;
    test_valid_program(source, "0\n1\n1\n2\n3\n5\n8\n13\n21\n34\n");
}

#[test]
fn test_lists_are_shared() {
    let source = r#"
void fill(list<int> xs, int value)
    int i = 0
    while i < xs.length()
        xs[i] = value
        i = i + 1

list<int> numbers = [1, 2, 3]
list<int> alias = numbers
fill(alias, 7)
print(numbers)
"#;
    test_valid_program(source, "[7, 7, 7]\n");
}

#[test]
fn test_functions_do_not_see_caller_variables() {
    let source = r#"
str greeting = "hello"
str greet(str name)
    str greeting = "hi"
    return "{greeting} {name}"

print(greet("quill"))
print(greeting)
"#;
    test_valid_program(source, "hi quill\nhello\n");
}

#[test]
fn test_no_forward_references() {
    let source = r#"
int early()
    return later()

int later()
    return 1
"#;
    let (result, _) = run_program(source);
    assert!(matches!(result, Err(InterpretError::Type(_))));
}

#[test]
fn test_default_initializers() {
    let source = r#"
int n
str s
bool b
list<int> xs
print(n, "[{s}]", b, xs)
"#;
    test_valid_program(source, "0 [] false []\n");
}

#[test]
fn test_else_if_and_strings() {
    let source = r#"
str classify(int n)
    if n < 1
        return "small"
    else if n < 10
        return "medium"
    else
        return "large"

print(classify(0), classify(5), classify(50))
print("tab\tand \{braces\}")
"#;
    test_valid_program(source, "small medium large\ntab\tand {braces}\n");
}

#[test]
fn test_index_out_of_range() {
    assert!(matches!(
        runtime_error("list<int> xs = [1, 2]\nprint(xs[2])"),
        RuntimeError::IndexOutOfRange {
            index: 2,
            length: 2
        }
    ));
}

#[test]
fn test_output_before_failure_is_kept() {
    let program = quill::parse("print(\"before\")\nprint(1 / 0)\nprint(\"after\")")
        .expect("parse");
    let output = Rc::new(RefCell::new(Vec::<u8>::new()));
    let err = Interpreter::new(output.clone())
        .interpret(&program)
        .expect_err("division by zero");
    assert!(matches!(err.kind, RuntimeError::DivisionByZero));
    assert_eq!(
        String::from_utf8(output.take()).expect("utf8"),
        "before\n"
    );
}

#[test]
fn test_block_body_starting_in_comment() {
    let source = "int f()\n    /* doc\n    */ return 1\nprint(f())";
    test_valid_program(source, "1\n");
}
