use pretty_assertions::assert_eq;

use rox::ast::{Expr, ExprId, LiteralValue, Stmt};
use rox::ast_printer::AstPrinter;
use rox::parser::Parser;
use rox::scanner::scan_tokens;

fn parse(source: &str) -> Vec<Stmt> {
    let (tokens, errors) = scan_tokens(source);
    assert!(errors.is_empty(), "lex errors: {:?}", errors);
    Parser::new(&tokens).parse().expect("parse failed")
}

fn print_expr(source: &str) -> String {
    let (tokens, _) = scan_tokens(source);
    let expr = Parser::new(&tokens)
        .parse_expression()
        .expect("expression failed to parse");
    AstPrinter::print(&expr)
}

#[test]
fn test_precedence_and_grouping() {
    assert_eq!(print_expr("-123 * (45.67)"), "(* (- 123.0) (group 45.67))");
    assert_eq!(print_expr("1 + 2 * 3 - 4"), "(- (+ 1.0 (* 2.0 3.0)) 4.0)");
    assert_eq!(print_expr("!true == false"), "(== (! true) false)");
    assert_eq!(print_expr("a or b and c"), "(or a (and b c))");
}

#[test]
fn test_assignment_targets() {
    assert_eq!(print_expr("a = b = 1"), "(= a (= b 1.0))");
    assert_eq!(print_expr("obj.field = 2"), "(= (. obj field) 2.0)");
    assert_eq!(print_expr("f(1, \"x\")(2).g"), "(. (call (call f 1.0 x) 2.0) g)");
}

#[test]
fn test_invalid_assignment_target_is_reported() {
    let (tokens, _) = scan_tokens("1 + 2 = 3;");
    let errors = Parser::new(&tokens).parse().expect_err("should fail");

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "[line 1] Error: Invalid assignment target");
}

#[test]
fn test_all_syntax_errors_are_collected() {
    let (tokens, _) = scan_tokens("var = 1;\nprint 2;\nprint (3;\nvar ok = 4;");
    let errors = Parser::new(&tokens).parse().expect_err("should fail");

    let lines: Vec<Option<usize>> = errors.iter().map(|e| e.line()).collect();
    assert_eq!(lines, vec![Some(1), Some(3)]);
}

#[test]
fn test_for_loop_desugars_to_while_in_block() {
    let statements = parse("for (var i = 0; i < 3; i = i + 1) print i;");

    assert_eq!(statements.len(), 1);
    let Stmt::Block(outer) = &statements[0] else {
        panic!("expected block, got {:?}", statements[0]);
    };
    assert!(matches!(outer[0], Stmt::Var { .. }));

    let Stmt::While { body, .. } = &outer[1] else {
        panic!("expected while, got {:?}", outer[1]);
    };
    let Stmt::Block(inner) = body.as_ref() else {
        panic!("expected body block, got {:?}", body);
    };
    assert!(matches!(inner[0], Stmt::Print(_)));
    assert!(matches!(inner[1], Stmt::Expression(Expr::Assign { .. })));
}

#[test]
fn test_for_without_condition_loops_on_true() {
    let statements = parse("for (;;) print 1;");

    let Stmt::While { condition, .. } = &statements[0] else {
        panic!("expected bare while, got {:?}", statements[0]);
    };
    assert_eq!(*condition, Expr::Literal(LiteralValue::True));
}

#[test]
fn test_class_with_superclass() {
    let statements = parse("class B < A { init(x) { this.x = x; } get() { return super.get(); } }");

    let Stmt::Class {
        name,
        superclass,
        methods,
    } = &statements[0]
    else {
        panic!("expected class");
    };

    assert_eq!(name.lexeme, "B");
    assert!(matches!(superclass, Some(Expr::Variable { name, .. }) if name.lexeme == "A"));
    let names: Vec<&str> = methods.iter().map(|m| m.name.lexeme.as_str()).collect();
    assert_eq!(names, vec!["init", "get"]);
    assert_eq!(methods[0].params.len(), 1);
}

#[test]
fn test_expression_ids_are_unique_and_seedable() {
    let (tokens, _) = scan_tokens("a = b; print this;");
    let mut parser = Parser::with_first_id(&tokens, 10);
    let statements = parser.parse().expect("parse");

    let Stmt::Expression(Expr::Assign { id: assign_id, value, .. }) = &statements[0] else {
        panic!("expected assignment");
    };
    let Expr::Variable { id: read_id, .. } = value.as_ref() else {
        panic!("expected variable");
    };
    let Stmt::Print(Expr::This { id: this_id, .. }) = &statements[1] else {
        panic!("expected this");
    };

    assert_eq!(*assign_id, ExprId(10));
    assert_eq!(*read_id, ExprId(11));
    assert_eq!(*this_id, ExprId(12));
    assert_eq!(parser.next_id(), 13);
}

#[test]
fn test_too_many_arguments() {
    let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
    let source = format!("f({});", args.join(", "));
    let (tokens, _) = scan_tokens(&source);

    let errors = Parser::new(&tokens).parse().expect_err("should fail");
    assert!(errors[0].to_string().contains("Can't have more than 255 arguments"));
}

#[test]
fn test_deeply_nested_input_parses() {
    let depth = 3000;
    let source = format!("print {}1{};", "(".repeat(depth), ")".repeat(depth));
    let statements = parse(&source);

    let Stmt::Print(expr) = &statements[0] else {
        panic!("expected print");
    };
    let mut expr: &Expr = expr;
    let mut groups = 0;
    while let Expr::Grouping(inner) = expr {
        groups += 1;
        expr = inner.as_ref();
    }
    assert_eq!(groups, depth);
    assert!(matches!(expr, Expr::Literal(LiteralValue::Number(n)) if *n == 1.0));

    let negations = format!("print {}true;", "!".repeat(depth));
    assert_eq!(parse(&negations).len(), 1);

    let blocks = format!("{}print 1;{}", "{".repeat(1000), "}".repeat(1000));
    assert_eq!(parse(&blocks).len(), 1);
}
