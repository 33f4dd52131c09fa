//! Error types for every stage of the pipeline.
//!
//! Lexing and parsing failures carry the byte offset and a short slice of
//! the source that follows it, in a fixed format so that golden-output
//! comparisons stay stable.

use thiserror::Error;

use crate::ast::{BinaryOp, UnaryOp};

/// How many characters of source follow the offset in lex/parse messages.
pub const CONTEXT_LEN: usize = 30;

/// Up to [`CONTEXT_LEN`] characters of `source` starting at byte `offset`.
pub(crate) fn source_context(source: &str, offset: usize) -> String {
    source
        .get(offset..)
        .unwrap_or("")
        .chars()
        .take(CONTEXT_LEN)
        .collect()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("lex error: {message} at '{context}...' (offset: {offset})")]
pub struct LexError {
    pub message: String,
    pub offset: usize,
    pub context: String,
}

impl LexError {
    pub(crate) fn new(message: impl Into<String>, source: &str, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
            context: source_context(source, offset),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parse error: {message} at '{context}...' (offset: {offset})")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
    pub context: String,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, source: &str, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
            context: source_context(source, offset),
        }
    }
}

/// Failures raised while evaluating an expression or rendering a template.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("variable '{name}' was not found in contexts: {}", .sources.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(", "))]
    UnresolvedVariable { name: String, sources: Vec<String> },

    #[error("variable '{name}' was already set in source '{source_name}'")]
    Redeclared { name: String, source_name: String },

    #[error("tried to call a non-callable value: {value}")]
    NotCallable { value: String },

    #[error("expected object for accessing member '{member}', got {kind}")]
    NotAnObject { member: String, kind: &'static str },

    #[error("unsupported operand for unary '{op}': {kind}")]
    UnaryOperand { op: UnaryOp, kind: &'static str },

    #[error("unsupported operands for '{op}': {left} and {right}")]
    BinaryOperands {
        op: BinaryOp,
        left: &'static str,
        right: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("expected a sequence for loop over `{expr}`, got {kind}")]
    NotIterable { expr: String, kind: &'static str },

    #[error("template method '{method}' expects {expected} argument(s), got {actual}")]
    Arity {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("{0}")]
    Host(String),

    #[error("{source} (in `{expr}`)")]
    At {
        expr: String,
        #[source]
        source: Box<EvalError>,
    },

    #[error("{source} (call stack: {})", .trace.join(" > "))]
    Traced {
        trace: Vec<String>,
        #[source]
        source: Box<EvalError>,
    },
}

impl EvalError {
    /// Error raised from inside a host function.
    pub fn host(message: impl Into<String>) -> Self {
        EvalError::Host(message.into())
    }

    /// The innermost error, with `At`/`Traced` annotations peeled off.
    pub fn root_cause(&self) -> &EvalError {
        match self {
            EvalError::At { source, .. } | EvalError::Traced { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The call-stack trace attached to this error, if any.
    pub fn trace(&self) -> Option<&[String]> {
        match self {
            EvalError::Traced { trace, .. } => Some(trace),
            EvalError::At { source, .. } => source.trace(),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("{message} (line {line_idx}: '{line}')")]
    Structure {
        message: String,
        line_idx: usize,
        line: String,
    },

    #[error("invalid tag expression (line {line_idx}: '{line}'): {source}")]
    Expression {
        line_idx: usize,
        line: String,
        #[source]
        source: Box<Error>,
    },
}

impl TemplateError {
    pub fn line_idx(&self) -> usize {
        match self {
            TemplateError::Structure { line_idx, .. } | TemplateError::Expression { line_idx, .. } => {
                *line_idx
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("could not parse method signature '{signature}': {message}")]
    Signature { signature: String, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_capped_at_thirty_chars() {
        let src = "0123456789012345678901234567890123456789";
        let err = LexError::new("boom", src, 5);
        assert_eq!(err.context.chars().count(), CONTEXT_LEN);
        assert_eq!(
            err.to_string(),
            "lex error: boom at '567890123456789012345678901234...' (offset: 5)"
        );
    }

    #[test]
    fn context_at_end_of_input_is_empty() {
        let err = ParseError::new("unexpected end of expression", "a +", 3);
        assert_eq!(
            err.to_string(),
            "parse error: unexpected end of expression at '...' (offset: 3)"
        );
    }

    #[test]
    fn unresolved_variable_lists_sources() {
        let err = EvalError::UnresolvedVariable {
            name: "x".into(),
            sources: vec!["methods".into(), "model".into()],
        };
        assert_eq!(
            err.to_string(),
            "variable 'x' was not found in contexts: 'methods', 'model'"
        );
    }

    #[test]
    fn root_cause_peels_annotations() {
        let err = EvalError::Traced {
            trace: vec!["outer".into(), "inner".into()],
            source: Box::new(EvalError::At {
                expr: "a.b".into(),
                source: Box::new(EvalError::DivisionByZero),
            }),
        };
        assert!(matches!(err.root_cause(), EvalError::DivisionByZero));
        assert_eq!(err.trace().map(|t| t.len()), Some(2));
        assert_eq!(
            err.to_string(),
            "division by zero (in `a.b`) (call stack: outer > inner)"
        );
    }
}
