use rox::ast::{ExprId, Stmt};
use rox::parser::Parser;
use rox::resolver::{resolve, Resolution};
use rox::scanner::scan_tokens;

mod common;

fn parse(source: &str) -> Vec<Stmt> {
    let (tokens, errors) = scan_tokens(source);
    assert!(errors.is_empty(), "lex errors: {:?}", errors);
    Parser::new(&tokens).parse().expect("parse failed")
}

fn resolve_source(source: &str) -> Resolution {
    resolve(&parse(source))
}

fn diagnostics(source: &str) -> Vec<String> {
    resolve_source(source)
        .diagnostics
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[test]
fn test_globals_are_left_out_of_the_table() {
    let resolution = resolve_source("var g = 1; print g; g = 2;");

    assert!(resolution.is_ok());
    assert!(resolution.locals.is_empty());
}

#[test]
fn test_block_distance_counts_enclosing_blocks() {
    // `a` in the print is the first variable node, id 0.
    let resolution = resolve_source("{ var a = 1; { { print a; } } }");

    assert!(resolution.is_ok());
    assert_eq!(resolution.locals.get(&ExprId(0)), Some(&2));
}

#[test]
fn test_closure_distances() {
    let source = "
        fun outer() {
            var a = 1;
            fun inner() { return a; }
            return inner;
        }
    ";
    let resolution = resolve_source(source);

    assert!(resolution.is_ok());
    // `a` inside inner: inner's scope → outer's scope.
    assert_eq!(resolution.locals.get(&ExprId(0)), Some(&1));
    // `inner` in outer's return: same scope.
    assert_eq!(resolution.locals.get(&ExprId(1)), Some(&0));
}

#[test]
fn test_this_and_super_distances() {
    let source = "
        class A { m() { return 1; } }
        class B < A { m() { return super.m() + this.n; } }
    ";
    let resolution = resolve_source(source);

    assert!(resolution.is_ok());
    // id 0: superclass `A` (global).  id 1: `super`.  id 2: `this`.
    assert_eq!(resolution.locals.get(&ExprId(0)), None);
    assert_eq!(resolution.locals.get(&ExprId(1)), Some(&2));
    assert_eq!(resolution.locals.get(&ExprId(2)), Some(&1));
}

#[test]
fn test_resolved_distance_matches_runtime_frames() {
    let source = "
        var x = \"global\";
        {
            var x = \"outer\";
            fun show() { print x; }
            {
                var x = \"inner\";
                show();
                { { print x; } }
            }
        }
    ";

    assert_eq!(common::run_ok(source), "outer\ninner\n");
}

#[test]
fn test_redeclaration_in_same_local_scope() {
    assert_eq!(
        diagnostics("{ var a = 1; var a = 2; }"),
        vec!["[line 1] Error: Already a variable with this name in this scope."]
    );

    // Globals may be redeclared.
    assert!(diagnostics("var a = 1; var a = 2;").is_empty());
}

#[test]
fn test_duplicate_parameters_are_rejected() {
    assert_eq!(
        diagnostics("fun f(a, a) {}"),
        vec!["[line 1] Error: Already a variable with this name in this scope."]
    );
}

#[test]
fn test_self_referential_initializer() {
    assert_eq!(
        diagnostics("var a = 1; { var a = a; }"),
        vec!["[line 1] Error: Can't read local variable in its own initializer."]
    );
}

#[test]
fn test_recursive_local_function_is_allowed() {
    assert!(diagnostics("{ fun f(n) { if (n > 0) f(n - 1); } f(3); }").is_empty());
}

#[test]
fn test_return_rules() {
    assert_eq!(
        diagnostics("return 1;"),
        vec!["[line 1] Error: Can't return from top-level code."]
    );
    assert_eq!(
        diagnostics("class A { init() { return 1; } }"),
        vec!["[line 1] Error: Can't return a value from an initializer."]
    );
    // A bare return in an initializer is fine.
    assert!(diagnostics("class A { init() { return; } }").is_empty());
}

#[test]
fn test_this_and_super_outside_class() {
    assert_eq!(
        diagnostics("print this;"),
        vec!["[line 1] Error: Can't use 'this' outside of a class."]
    );
    assert_eq!(
        diagnostics("fun f() { return super.x; }"),
        vec!["[line 1] Error: Can't use 'super' outside of a class."]
    );
    assert_eq!(
        diagnostics("class A { m() { return super.m(); } }"),
        vec!["[line 1] Error: Can't use 'super' in a class with no superclass."]
    );
}

#[test]
fn test_class_cannot_inherit_from_itself() {
    assert_eq!(
        diagnostics("class A < A {}"),
        vec!["[line 1] Error: A class can't inherit from itself."]
    );
}

#[test]
fn test_every_problem_is_reported_in_one_pass() {
    let source = "
        return 1;
        { var a = 1; var a = 2; }
        print this;
    ";
    let lines: Vec<Option<usize>> = resolve_source(source)
        .diagnostics
        .iter()
        .map(|d| d.line())
        .collect();

    assert_eq!(lines, vec![Some(2), Some(3), Some(4)]);
}

#[test]
fn test_diagnostics_suppress_execution() {
    let (output, errors) = common::run_err("print \"before\"; { var a = a; }");

    assert_eq!(output, "");
    assert_eq!(
        errors,
        vec!["[line 1] Error: Can't read local variable in its own initializer."]
    );
}
