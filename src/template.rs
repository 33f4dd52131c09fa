//! Template document tree.
//!
//! A document is a [`Block`] of lines. Control constructs (`for`, `if`)
//! either sit in a block as their own lines or, when inline, are items of
//! a [`Line`] next to text and expression tags.

use crate::ast::Expr;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Block(Block),
    Line(Line),
    Text(String),
    Template(Expr),
    For(ForNode),
    If(IfNode),
}

impl Node {
    /// True for block-level `for`/`if` constructs marked `| inline`.
    pub fn is_inline(&self) -> bool {
        match self {
            Node::For(node) => node.inline,
            Node::If(node) => node.inline,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub lines: Vec<Node>,
}

/// One output line: the indentation it starts with plus its items.
/// A line without items is a deliberately blank source line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub indent: usize,
    pub items: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForNode {
    pub item_name: String,
    pub array: Expr,
    pub inline: bool,
    pub separator: String,
    pub body: Box<Node>,
    pub else_body: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfBranch {
    pub condition: Expr,
    pub body: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    /// The `if` branch followed by every `elif`, in source order.
    pub branches: Vec<IfBranch>,
    pub else_body: Option<Box<Node>>,
    pub inline: bool,
}
