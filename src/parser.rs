use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};
use std::collections::VecDeque;

// Precedence levels, lowest first.
const ASSIGNMENT: u8 = 1;
const CONDITIONAL: u8 = 2;
const OR: u8 = 3;
const AND: u8 = 4;
const COMPARISON: u8 = 5;
const SHIFT: u8 = 6;
const SUM: u8 = 7;
const PRODUCT: u8 = 8;
const EXPONENT: u8 = 9;
const PREFIX: u8 = 10;
// 11 is reserved for postfix operators.
const CALL: u8 = 12;
const MEMBER: u8 = 13;

fn infix_precedence(op: &str) -> u8 {
    match op {
        "=" => ASSIGNMENT,
        "?" => CONDITIONAL,
        "||" => OR,
        "&&" => AND,
        ">=" | "!=" | "==" | "<=" | "<" | ">" => COMPARISON,
        "<<" | ">>" => SHIFT,
        "+" | "-" => SUM,
        "*" | "/" => PRODUCT,
        "**" => EXPONENT,
        "(" => CALL,
        "." | "[" => MEMBER,
        _ => 0,
    }
}

/// Keyword spellings of the logical operators.
fn canonical_operator(op: &str) -> &str {
    match op {
        "not" => "!",
        "and" => "&&",
        "or" => "||",
        other => other,
    }
}

/// Precedence-climbing parser over a token stream.
///
/// `source` is only used to render error context; pass the text the
/// tokens were produced from.
pub struct Parser<'a> {
    source: &'a str,
    buffer: VecDeque<Token>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            buffer: tokens.into(),
        }
    }

    /// Parses a complete expression; every token must be consumed.
    pub fn parse(mut self) -> Result<Expr, ParseError> {
        let expr = self.process(0)?;
        if let Some(token) = self.peek() {
            return Err(self.fail_at(
                token.offset,
                format!(
                    "not all tokens were consumed, leftover token '{}' ({})",
                    token.value,
                    token.kind.as_str()
                ),
            ));
        }
        Ok(expr)
    }

    fn fail_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.source, offset)
    }

    fn fail_on(&self, token: &Token, message: &str) -> ParseError {
        self.fail_at(
            token.offset,
            format!("{message}, got token '{}' ({})", token.value, token.kind.as_str()),
        )
    }

    fn peek(&self) -> Option<&Token> {
        self.buffer.front()
    }

    fn consume(&mut self) -> Result<Token, ParseError> {
        self.buffer
            .pop_front()
            .ok_or_else(|| self.fail_at(self.source.len(), "unexpected end of expression"))
    }

    fn expect_op(&mut self, op: &str) -> Result<(), ParseError> {
        let token = self.consume()?;
        if token.is_operator(op) {
            Ok(())
        } else {
            Err(self.fail_on(&token, &format!("expected operator '{op}'")))
        }
    }

    fn consume_op_if(&mut self, op: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_operator(op)) {
            self.buffer.pop_front();
            true
        } else {
            false
        }
    }

    fn process(&mut self, precedence: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_prefix()?;

        while let Some(next) = self.peek() {
            if next.kind != TokenKind::Operator {
                break;
            }
            let op = canonical_operator(&next.value).to_string();
            let infix = infix_precedence(&op);
            if infix <= precedence {
                break;
            }
            let token = self.consume()?;

            left = if let Some(bin) = BinaryOp::from_operator(&op) {
                let rhs_precedence = if bin.is_right_assoc() { infix - 1 } else { infix };
                let right = self.process(rhs_precedence)?;
                Expr::Binary(bin, Box::new(left), Box::new(right))
            } else {
                match op.as_str() {
                    "?" => {
                        let when_true = self.process(0)?;
                        self.expect_op(":")?;
                        let when_false = self.process(infix - 1)?;
                        Expr::Conditional {
                            condition: Box::new(left),
                            when_true: Box::new(when_true),
                            when_false: Box::new(when_false),
                        }
                    }
                    "(" => Expr::Call {
                        callee: Box::new(left),
                        args: self.parse_arguments()?,
                    },
                    "[" => {
                        let index = self.process(0)?;
                        self.expect_op("]")?;
                        Expr::ElementAccess(Box::new(left), Box::new(index))
                    }
                    "." => {
                        let mut expr = left;
                        loop {
                            let prop = self.consume()?;
                            if prop.kind != TokenKind::Identifier {
                                return Err(
                                    self.fail_on(&prop, "expected identifier as property name")
                                );
                            }
                            expr = Expr::PropertyAccess(Box::new(expr), prop.value);
                            if !self.consume_op_if(".") {
                                break expr;
                            }
                        }
                    }
                    _ => return Err(self.fail_on(&token, "could not parse infix operator")),
                }
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let token = self.consume()?;
        match token.kind {
            TokenKind::Identifier => Ok(Expr::Identifier(token.value)),
            TokenKind::String => Ok(Expr::Literal(Literal::String(token.value.replace("\\n", "\n")))),
            TokenKind::Number => match parse_number(&token.value) {
                Some(lit) => Ok(Expr::Literal(lit)),
                None => Err(self.fail_on(&token, "invalid number literal")),
            },
            TokenKind::Operator => {
                let op = canonical_operator(&token.value);
                if let Some(unary) = UnaryOp::from_operator(op) {
                    let operand = self.process(PREFIX)?;
                    Ok(Expr::Unary(unary, Box::new(operand)))
                } else if op == "(" {
                    let inner = self.process(0)?;
                    self.expect_op(")")?;
                    Ok(Expr::Parenthesized(Box::new(inner)))
                } else {
                    Err(self.fail_on(&token, "could not parse token"))
                }
            }
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.consume_op_if(")") {
            return Ok(args);
        }
        loop {
            args.push(self.process(0)?);
            if !self.consume_op_if(",") {
                break;
            }
        }
        self.expect_op(")")?;
        Ok(args)
    }
}

fn parse_number(text: &str) -> Option<Literal> {
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let digits: String = body.chars().filter(|c| *c != '_').collect();

    let magnitude = if let Some(hex) = digits.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok().map(Literal::Int)
    } else if let Some(bin) = digits.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok().map(Literal::Int)
    } else if digits.contains('.') {
        digits.parse::<f64>().ok().map(Literal::Float)
    } else {
        digits.parse::<i64>().ok().map(Literal::Int)
    }?;

    Some(match (negative, magnitude) {
        (true, Literal::Int(v)) => Literal::Int(-v),
        (true, Literal::Float(v)) => Literal::Float(-v),
        (_, lit) => lit,
    })
}
