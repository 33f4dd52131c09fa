//! codetmpl: expression language and line-oriented template engine for
//! declarative code emitters.
//!
//! A code generator describes each target language as a set of templates.
//! This crate is the engine those templates run on: a small expression
//! language (tokenizer, parser, evaluator) and a document layer with
//! `for`/`if` control lines and named, callable sub-templates.
//!
//! Expressions:
//! - Numbers (`42`, `1.5`, `0xff`, `0b1010`, `1_000`), strings in single or
//!   double quotes, identifiers, `true`/`false`/`null`.
//! - Operators `** + - * / << >> >= != == <= < > ~ ! not && and || or`,
//!   ternary `c ? a : b`, calls `f(a, b)`, members `a.b` and `a[b]`.
//! - Host objects and functions plug in through [`ModelHandler`] and the
//!   [`HostObject`] trait.
//!
//! Templates:
//! - `{{expr}}` interpolates an expression; `null` produces no output.
//! - A line holding only `{{for x in xs}}`, `{{if c}}`, `{{elif c}}`,
//!   `{{else}}`, `{{/if}}` or `{{/for}}` is a control line. Bodies are
//!   indented one step (two spaces) deeper; that step is not emitted.
//! - `| inline` on a control tag splices its output into the surrounding
//!   line; `| sep=", "` sets the loop separator.
//! - Named templates ([`TemplateMethod`]) are called like functions.
//!
//! Newline semantics:
//! - Lines whose content is all absent (an unmatched `if`, an empty loop,
//!   a `null` expression) vanish, newline included.
//! - Multi-line values interpolated into an indented line keep that
//!   indentation on every line.
//! - No trailing newline is added.
//!
//! ```
//! use codetmpl::{render, VariableContext, VariableSource};
//! use serde_json::json;
//!
//! let vars = VariableContext::from(VariableSource::from_json(
//!     "model",
//!     json!({"name": "Point", "fields": ["x", "y"]}),
//! ));
//! let template = "struct {{name}} {\n{{for f in fields}}\n    {{f}}: f64,\n{{/for}}\n}";
//! assert_eq!(
//!     render(template, &vars).unwrap(),
//!     "struct Point {\n  x: f64,\n  y: f64,\n}"
//! );
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod generator;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod scope;
pub mod template;
pub mod template_parser;
pub mod value;

pub use ast::{BinaryOp, Expr, Literal, UnaryOp};
pub use error::{Error, EvalError, LexError, ParseError, Result, TemplateError};
pub use eval::{Evaluator, ModelHandler, ValueModelHandler};
pub use generator::{Generator, MethodRegistry, TemplateMethod};
pub use lexer::{tokenize, Token, TokenKind, Tokenizer, DEFAULT_OPERATORS};
pub use parser::Parser;
pub use printer::{print_template, remove_outer_paren};
pub use scope::{VariableContext, VariableSource};
pub use template::{Block, ForNode, IfBranch, IfNode, Line, Node};
pub use template_parser::TemplateParser;
pub use value::{Function, HostObject, Value};

/// Parses an expression using [`DEFAULT_OPERATORS`].
pub fn parse_expression(text: &str) -> Result<Expr> {
    let tokens = tokenize(text, DEFAULT_OPERATORS)?;
    Ok(Parser::new(text, tokens).parse()?)
}

/// Parses and evaluates an expression against plain [`Value`]s.
pub fn evaluate_expression(text: &str, vars: &VariableContext) -> Result<Value> {
    let expr = parse_expression(text)?;
    Ok(Evaluator::new(&ValueModelHandler).evaluate(&expr, vars)?)
}

pub fn parse_template(text: &str) -> Result<Block> {
    TemplateParser::new(text).parse()
}

/// Parses `template` and renders it against `vars` with no named templates.
pub fn render(template: &str, vars: &VariableContext) -> Result<String> {
    let block = parse_template(template)?;
    Generator::new(vars.clone()).generate(&block)
}
