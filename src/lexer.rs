use crate::error::LexError;

/// Operator vocabulary of the expression language.
///
/// Matching is first-match in list order, so longer operators must come
/// before any shorter operator that is a prefix of them (`>=` before `>`).
pub const DEFAULT_OPERATORS: &[&str] = &[
    "**", "+", "-", "*", "/", "<<", ">>", ">=", "!=", "==", "<=", "<", ">", "~", "(", ")", "[",
    "]", ",", ".", "?", ":", "not", "!", "or", "||", "and", "&&",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    Identifier,
    Operator,
    String,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Number => "number",
            TokenKind::Identifier => "identifier",
            TokenKind::Operator => "operator",
            TokenKind::String => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    /// Byte offset of the token in the source expression.
    pub offset: usize,
}

impl Token {
    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.value == op
    }
}

/// Splits an expression into a flat token stream.
///
/// After an optional leading number the stream strictly alternates
/// operator, literal, operator, literal... where the literal after an
/// operator may be missing (`f()`, `!x`).
#[derive(Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    cursor: usize,
    operators: &'a [&'a str],
    tokens: Vec<Token>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str, operators: &'a [&'a str]) -> Self {
        Self {
            input,
            cursor: 0,
            operators,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        if !self.try_number()? {
            self.try_operator();
            self.try_literal()?;
        }

        while self.has_more() {
            if !self.try_operator() {
                return Err(self.fail("expected operator here"));
            }
            self.try_literal()?;
        }

        Ok(self.tokens)
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn fail(&self, message: &str) -> LexError {
        LexError::new(message, self.input, self.cursor)
    }

    fn push(&mut self, kind: TokenKind, len: usize) {
        let value = self.remaining()[..len].to_string();
        self.tokens.push(Token {
            kind,
            value,
            offset: self.cursor,
        });
        self.cursor += len;
    }

    fn skip_whitespace(&mut self) {
        let rest = self.remaining();
        let trimmed = rest.trim_start_matches([' ', '\n', '\t', '\r']);
        self.cursor += rest.len() - trimmed.len();
    }

    fn has_more(&mut self) -> bool {
        self.skip_whitespace();
        self.cursor < self.input.len()
    }

    fn try_operator(&mut self) -> bool {
        self.skip_whitespace();
        let rest = self.remaining();
        let matched = self
            .operators
            .iter()
            .find(|op| !op.is_empty() && rest.starts_with(**op) && !splits_word(op, rest))
            .copied();
        match matched {
            Some(op) => {
                self.push(TokenKind::Operator, op.len());
                true
            }
            None => false,
        }
    }

    fn try_literal(&mut self) -> Result<bool, LexError> {
        Ok(self.try_identifier() || self.try_number()? || self.try_string()?)
    }

    fn try_identifier(&mut self) -> bool {
        self.skip_whitespace();
        let rest = self.remaining();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        let len = chars
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        // Word operators (`not`, `and`, `or`) are never identifiers.
        if self.operators.contains(&&rest[..len]) {
            return false;
        }

        self.push(TokenKind::Identifier, len);
        true
    }

    fn try_number(&mut self) -> Result<bool, LexError> {
        self.skip_whitespace();
        let len = scan_number(self.remaining().as_bytes());
        if len == 0 {
            return Ok(false);
        }
        self.push(TokenKind::Number, len);

        if self
            .remaining()
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric())
        {
            return Err(self.fail("invalid character in number"));
        }
        Ok(true)
    }

    fn try_string(&mut self) -> Result<bool, LexError> {
        self.skip_whitespace();
        let rest = self.remaining();
        let quote = match rest.chars().next() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Ok(false),
        };

        let mut value = String::new();
        let mut chars = rest.char_indices().skip(1);
        while let Some((idx, c)) = chars.next() {
            if c == quote {
                self.tokens.push(Token {
                    kind: TokenKind::String,
                    value,
                    offset: self.cursor,
                });
                self.cursor += idx + 1;
                return Ok(true);
            }
            if c == '\\' && rest[idx + 1..].starts_with(quote) {
                // Only the escaped quote is unescaped; other sequences pass through.
                chars.next();
                value.push(quote);
            } else {
                value.push(c);
            }
        }

        Err(self.fail("unterminated string"))
    }
}

/// A word operator must not match the start of a longer identifier.
fn splits_word(op: &str, rest: &str) -> bool {
    let ends_in_word = op.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());
    ends_in_word
        && rest[op.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Byte length of the number literal at the start of `s`, or 0.
///
/// Accepts `[+-]?` followed by a decimal (`12`, `1_000`, `1.5`, `.5`),
/// hexadecimal (`0xFF_FF`) or binary (`0b1010_0101`) literal.
fn scan_number(s: &[u8]) -> usize {
    let sign = usize::from(matches!(s.first(), Some(b'+' | b'-')));
    let body = &s[sign..];
    let count = |from: usize, pred: fn(u8) -> bool| body[from..].iter().take_while(|b| pred(**b)).count();

    if body.starts_with(b"0x") {
        let n = count(2, |b| b.is_ascii_hexdigit() || b == b'_');
        if n > 0 {
            return sign + 2 + n;
        }
    }
    if body.starts_with(b"0b") {
        let n = count(2, |b| b == b'0' || b == b'1' || b == b'_');
        if n > 0 {
            return sign + 2 + n;
        }
    }

    let int_digits = count(0, |b| b.is_ascii_digit());
    if body.get(int_digits) == Some(&b'.') {
        let frac_digits = count(int_digits + 1, |b| b.is_ascii_digit());
        if frac_digits > 0 {
            return sign + int_digits + 1 + frac_digits;
        }
    }
    if int_digits == 0 {
        return 0;
    }
    sign + count(0, |b| b.is_ascii_digit() || b == b'_')
}

/// Tokenizes `text` against the given operator vocabulary.
pub fn tokenize(text: &str, operators: &[&str]) -> Result<Vec<Token>, LexError> {
    Tokenizer::new(text, operators).tokenize()
}
