//! Canonical text forms of expression and template trees.
//!
//! Every compound expression is printed fully parenthesized, so the output
//! shows how the parser grouped it: `1+2*3` prints as `(1 + (2 * 3))`.

use std::fmt::{self, Write};

use crate::ast::{Expr, Literal};
use crate::template::Node;

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Null => f.write_str("null"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Identifier(name) => f.write_str(name),
            Expr::Unary(op, operand) => write!(f, "({op}{operand})"),
            Expr::Binary(op, left, right) => write!(f, "({left} {op} {right})"),
            Expr::Parenthesized(inner) => {
                write!(f, "({})", remove_outer_paren(&inner.to_string()))
            }
            Expr::Conditional {
                condition,
                when_true,
                when_false,
            } => write!(f, "({condition} ? {when_true} : {when_false})"),
            Expr::Call { callee, args } => {
                write!(f, "({callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str("))")
            }
            Expr::PropertyAccess(object, name) => write!(f, "({object}.{name})"),
            Expr::ElementAccess(object, index) => write!(f, "({object}[{index}])"),
        }
    }
}

/// Strips one pair of enclosing parentheses, if present.
pub fn remove_outer_paren(repr: &str) -> &str {
    repr.strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(repr)
}

/// Renders a template tree as an indented outline, one construct per line.
pub fn print_template(node: &Node) -> String {
    let mut printer = TemplatePrinter {
        out: String::new(),
        depth: 0,
    };
    printer.node(node);
    printer.out
}

struct TemplatePrinter {
    out: String,
    depth: usize,
}

impl TemplatePrinter {
    fn line(&mut self, text: &str) {
        // Writing into a String cannot fail.
        let _ = writeln!(self.out, "{}{text}", "  ".repeat(self.depth));
    }

    fn nested(&mut self, node: &Node) {
        self.depth += 1;
        self.node(node);
        self.depth -= 1;
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Block(block) => {
                for (i, line) in block.lines.iter().enumerate() {
                    match line {
                        Node::Line(l) => self.line(&format!("Line #{} [indent={}]:", i + 1, l.indent)),
                        _ => self.line(&format!("Line #{}:", i + 1)),
                    }
                    self.nested(line);
                }
            }
            Node::Line(line) => {
                for (i, item) in line.items.iter().enumerate() {
                    match item {
                        Node::Text(text) => {
                            self.line(&format!("Item #{}: \"{}\"", i + 1, text.replace('\n', "\\n")))
                        }
                        Node::Template(expr) => self.line(&format!("Item #{}: \"{expr}\"", i + 1)),
                        other => {
                            self.line(&format!("Item #{}: ", i + 1));
                            self.nested(other);
                        }
                    }
                }
            }
            Node::Text(text) => self.line(&format!("\"{}\"", text.replace('\n', "\\n"))),
            Node::Template(expr) => self.line(&format!("\"{expr}\"")),
            Node::For(for_node) => {
                let inline = if for_node.inline { " [inline]" } else { "" };
                self.line(&format!(
                    "For {} in {}:{inline}",
                    for_node.item_name, for_node.array
                ));
                self.nested(&for_node.body);
                if let Some(else_body) = &for_node.else_body {
                    self.line("Else:");
                    self.nested(else_body);
                }
            }
            Node::If(if_node) => {
                let inline = if if_node.inline { " [inline]" } else { "" };
                for (i, branch) in if_node.branches.iter().enumerate() {
                    let keyword = if i == 0 { "If" } else { "Elif" };
                    self.line(&format!("{keyword} ({}):{inline}", branch.condition));
                    self.nested(&branch.body);
                }
                if let Some(else_body) = &if_node.else_body {
                    self.line("else:");
                    self.nested(else_body);
                }
            }
        }
    }
}
