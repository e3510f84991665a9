use crate::ast::{Expr, LiteralValue};
use crate::stack::ensure_sufficient_stack;

/// Renders an expression in parenthesised prefix form, e.g.
/// `(* (- 123.0) (group 45.67))`.  Used by the `parse` command.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(expr: &Expr) -> String {
        ensure_sufficient_stack(|| Self::render(expr))
    }

    fn render(expr: &Expr) -> String {
        match expr {
            Expr::Literal(literal) => Self::literal(literal),

            Expr::Grouping(inner) => Self::parenthesize("group", &[inner.as_ref()]),

            Expr::Unary {
                operator, right, ..
            } => Self::parenthesize(operator.symbol(), &[right.as_ref()]),

            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => Self::parenthesize(operator.symbol(), &[left.as_ref(), right.as_ref()]),

            Expr::Logical {
                left,
                operator,
                right,
            } => Self::parenthesize(operator.symbol(), &[left.as_ref(), right.as_ref()]),

            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => format!("(= {} {})", name.lexeme, Self::print(value)),

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut parts: Vec<&Expr> = Vec::with_capacity(arguments.len() + 1);
                parts.push(callee.as_ref());
                parts.extend(arguments.iter());
                Self::parenthesize("call", &parts)
            }

            Expr::Get { object, name } => format!("(. {} {})", Self::print(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                Self::print(object),
                name.lexeme,
                Self::print(value)
            ),

            Expr::This { .. } => "this".to_string(),

            Expr::Super { method, .. } => format!("(super {})", method.lexeme),
        }
    }

    fn literal(literal: &LiteralValue) -> String {
        match literal {
            LiteralValue::Number(n) if n.fract() == 0.0 => format!("{:.1}", n),
            LiteralValue::Number(n) => n.to_string(),
            LiteralValue::Str(s) => s.clone(),
            LiteralValue::True => "true".to_string(),
            LiteralValue::False => "false".to_string(),
            LiteralValue::Nil => "nil".to_string(),
        }
    }

    fn parenthesize(head: &str, parts: &[&Expr]) -> String {
        let mut out = format!("({}", head);
        for part in parts {
            out.push(' ');
            out.push_str(&Self::print(part));
        }
        out.push(')');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, UnaryOp};

    #[test]
    fn prints_nested_prefix_form() {
        let expr = Expr::Binary {
            left: Box::new(Expr::Unary {
                operator: UnaryOp::Negate,
                right: Box::new(Expr::Literal(LiteralValue::Number(123.0))),
                line: 1,
            }),
            operator: BinaryOp::Multiply,
            right: Box::new(Expr::Grouping(Box::new(Expr::Literal(
                LiteralValue::Number(45.67),
            )))),
            line: 1,
        };

        assert_eq!(AstPrinter::print(&expr), "(* (- 123.0) (group 45.67))");
    }
}
