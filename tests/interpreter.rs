use std::io::{self, BufWriter};

use pretty_assertions::assert_eq;

use rox::error::RuntimeError;
use rox::interpreter::Interpreter;
use rox::parser::Parser;
use rox::scanner::scan_tokens;
use rox::value::Value;
use rox::Lox;

mod common;

use common::{run_err, run_ok, runtime_error, session, session_with, SharedBuffer};

#[test]
fn test_truthiness() {
    let output = run_ok("print !nil; print !false; print !0; print !\"\"; print !true;");
    assert_eq!(output, "true\ntrue\nfalse\nfalse\nfalse\n");
}

#[test]
fn test_equality_never_coerces() {
    let source = r#"
        print 1 == "1";
        print nil == nil;
        print nil == false;
        print "a" == "a";
        print 1 != 2;
        print true == !nil;
    "#;
    assert_eq!(run_ok(source), "false\ntrue\nfalse\ntrue\ntrue\ntrue\n");
}

#[test]
fn test_arithmetic_and_concatenation() {
    let source = r#"
        print 1 + 2 * 3;
        print (1 + 2) * 3;
        print 10 / 4;
        print "con" + "cat";
        print 3 >= 3;
        print 1 / 0;
    "#;
    assert_eq!(run_ok(source), "7\n9\n2.5\nconcat\ntrue\nInfinity\n");
}

#[test]
fn test_negative_zero_prints_as_zero() {
    assert_eq!(run_ok("print -0; print 0 * -1; print -0.5;"), "0\n0\n-0.5\n");
}

#[test]
fn test_type_errors_cite_operand_types() {
    let err = runtime_error("print \"a\" + 1;");
    assert_eq!(
        err.message(),
        "Operands must be two numbers or two strings, got string and number."
    );
    assert_eq!(err.line(), 1);

    let err = runtime_error("print -\"x\";");
    assert_eq!(err.message(), "Operand of '-' must be a number, got string.");

    let err = runtime_error("\n\nprint 1 < nil;");
    assert_eq!(err.message(), "Operands of '<' must be numbers, got number and nil.");
    assert_eq!(err.line(), 3);
}

#[test]
fn test_logical_operators_return_operands() {
    let source = r#"
        print nil or "fallback";
        print "first" or "second";
        print 1 and 2;
        print false and undefined();
        print true or undefined();
    "#;
    assert_eq!(run_ok(source), "fallback\nfirst\n2\nfalse\ntrue\n");
}

#[test]
fn test_block_scoping_and_shadowing() {
    let source = r#"
        var a = "global a";
        var b = "global b";
        {
            var a = "outer a";
            {
                var a = "inner a";
                print a;
                print b;
            }
            print a;
        }
        print a;
    "#;
    assert_eq!(run_ok(source), "inner a\nglobal b\nouter a\nglobal a\n");
}

#[test]
fn test_control_flow() {
    let source = r#"
        var i = 0;
        while (i < 3) {
            if (i == 1) print "one"; else print i;
            i = i + 1;
        }
        for (var j = 0; j < 2; j = j + 1) print j;
    "#;
    assert_eq!(run_ok(source), "0\none\n2\n0\n1\n");
}

#[test]
fn test_return_unwinds_loops_and_blocks() {
    let source = r#"
        fun find() {
            for (var i = 0; i < 10; i = i + 1) {
                { if (i == 3) return i; }
            }
            return -1;
        }
        print find();

        fun nothing() { return; }
        print nothing();
        fun implicit() {}
        print implicit();
    "#;
    assert_eq!(run_ok(source), "3\nnil\nnil\n");
}

#[test]
fn test_recursion() {
    let source = r#"
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        print fib(15);
    "#;
    assert_eq!(run_ok(source), "610\n");
}

#[test]
fn test_closures_have_independent_state() {
    let source = r#"
        fun makeCounter() {
            var i = 0;
            fun count() {
                i = i + 1;
                return i;
            }
            return count;
        }

        var a = makeCounter();
        var b = makeCounter();
        print a();
        print a();
        print b();
    "#;
    assert_eq!(run_ok(source), "1\n2\n1\n");
}

#[test]
fn test_closures_share_captured_frame() {
    let source = r#"
        var get;
        {
            var n = 0;
            fun inc() { n = n + 1; }
            fun read() { return n; }
            inc();
            inc();
            get = read;
        }
        print get();
    "#;
    assert_eq!(run_ok(source), "2\n");
}

#[test]
fn test_closure_binds_at_declaration() {
    let source = r#"
        var a = "global";
        {
            fun showA() { print a; }
            showA();
            var a = "block";
            showA();
            print a;
        }
    "#;
    assert_eq!(run_ok(source), "global\nglobal\nblock\n");
}

#[test]
fn test_callable_display() {
    let source = r#"
        fun f() {}
        print f;
        print clock;
        print clock() > 0;
    "#;
    assert_eq!(run_ok(source), "<fn f>\n<native fn clock>\ntrue\n");
}

#[test]
fn test_call_errors() {
    let err = runtime_error("fun f(a, b) {}\nf(1);");
    assert_eq!(err.message(), "Expected 2 arguments but got 1.");
    assert_eq!(err.line(), 2);

    let err = runtime_error("fun f(a, b) {}\nf(1, 2, 3);");
    assert_eq!(err.message(), "Expected 2 arguments but got 3.");
    assert_eq!(err.line(), 2);

    let err = runtime_error("\"str\"();");
    assert_eq!(err.message(), "Can only call functions and classes.");

    let err = runtime_error("clock(1);");
    assert_eq!(err.message(), "Expected 0 arguments but got 1.");
}

#[test]
fn test_undefined_variables() {
    let err = runtime_error("print nope;");
    assert_eq!(err.message(), "Undefined variable 'nope'.");

    let err = runtime_error("\nnope = 1;");
    assert_eq!(err.message(), "Undefined variable 'nope'.");
    assert_eq!(err.line(), 2);
}

#[test]
fn test_runtime_error_stops_at_failing_statement() {
    let (output, errors) = run_err("print 1;\nprint nope;\nprint 2;");

    assert_eq!(output, "1\n");
    assert_eq!(errors, vec!["Undefined variable 'nope'.\n[line 2]"]);
}

#[test]
fn test_runtime_error_restores_scope() {
    let (mut lox, buffer) = session();

    assert!(lox.run("var a = \"outer\"; { var a = \"inner\"; print nope; }").is_err());
    lox.run("print a;").expect("session should still be usable");

    assert_eq!(buffer.contents(), "outer\n");
}

#[test]
fn test_deep_recursion_is_a_runtime_error() {
    let (mut lox, buffer) = session_with(|interpreter| interpreter.with_max_depth(64));

    let errors = lox
        .run("fun f(n) { return f(n + 1); }\nf(0);")
        .expect_err("should overflow");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "Stack overflow.\n[line 1]");
    assert_eq!(errors[0].exit_code(), 70);

    lox.run("fun g(n) { if (n > 0) return g(n - 1); return \"done\"; } print g(32);")
        .expect("bounded recursion should succeed");
    assert_eq!(buffer.contents(), "done\n");
}

#[test]
fn test_default_depth_limit_is_reached_without_crashing() {
    let err = runtime_error("fun f() { f(); }\nf();");
    assert!(matches!(err, RuntimeError::StackOverflow { .. }));
}

#[test]
fn test_repl_session_keeps_definitions() {
    let (mut lox, buffer) = session();

    lox.run("var base = 10;").expect("line 1");
    lox.run("fun add(n) { var sum = base + n; return sum; }")
        .expect("line 2");
    assert!(lox.run("print missing;").is_err());
    lox.run("{ var local = add(5); print local; }").expect("line 4");

    assert_eq!(buffer.contents(), "15\n");
}

#[test]
fn test_execution_is_deterministic() {
    let source = r#"
        fun make(label) {
            var calls = 0;
            fun call() { calls = calls + 1; return label + ":" ; }
            return call;
        }
        var f = make("x");
        for (var i = 0; i < 3; i = i + 1) print f();
    "#;
    assert_eq!(run_ok(source), run_ok(source));
}

#[test]
fn test_evaluate_single_expression() {
    let (tokens, errors) = scan_tokens("(1 + 2) * 3 == 9 and \"yes\"");
    assert!(errors.is_empty());
    let expr = Parser::new(&tokens).parse_expression().expect("parse");

    let mut interpreter = Interpreter::with_output(Box::new(io::sink()));
    let value = interpreter.evaluate(&expr).expect("evaluate");

    assert_eq!(value, Value::from("yes"));
}

#[test]
fn test_buffered_output_is_flushed_on_runtime_error() {
    let buffer = SharedBuffer::default();
    let interpreter = Interpreter::with_output(Box::new(BufWriter::new(buffer.clone())));
    let mut lox = Lox::with_interpreter(interpreter);

    assert!(lox.run("print \"before\";\nprint nope;").is_err());
    assert_eq!(buffer.contents(), "before\n");
}

#[test]
fn test_deeply_nested_expression_evaluates() {
    let depth = 2000;
    let source = format!("print {}1{} + 1;", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(run_ok(&source), "2\n");
}
