//! Line-oriented template document parser.
//!
//! A line whose only non-whitespace content is a single control tag
//! (`{{for x in xs}}`, `{{if c}}`, `{{elif c}}`, `{{else}}`, `{{/if}}`,
//! `{{/for}}`) is a control line and produces no output of its own. Body
//! lines of a control block are indented one step deeper than the block
//! they sit in; that step is removed before the line is kept. Control
//! tags marked `| inline` splice their output into the surrounding line.

use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use crate::ast::Expr;
use crate::error::{Error, TemplateError};
use crate::template::{Block, ForNode, IfBranch, IfNode, Line, Node};

pub const DEFAULT_INDENT_STEP: usize = 2;

struct Patterns {
    tag: Regex,
    for_tag: Regex,
    if_tag: Regex,
    elif_tag: Regex,
    end_tag: Regex,
    else_tag: Regex,
    param: Regex,
}

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            tag: Regex::new(r"\{\{([^{}]*?)\}\}")?,
            for_tag: Regex::new(r"^for ([A-Za-z_][A-Za-z0-9_]*) in (.*)$")?,
            if_tag: Regex::new(r"^if (.*)$")?,
            elif_tag: Regex::new(r"^elif (.*)$")?,
            end_tag: Regex::new(r"^/(for|if)$")?,
            else_tag: Regex::new(r"^else$")?,
            param: Regex::new(r#"([^\s=]+)(?:=(?:'([^']*)'|"([^"]*)"|(\S*)))?"#)?,
        })
    }

    fn parse_params(&self, text: &str) -> IndexMap<String, String> {
        self.param
            .captures_iter(text)
            .filter_map(|caps| {
                let key = caps.get(1)?.as_str().to_string();
                let value = match (2..=4).find_map(|i| caps.get(i)) {
                    Some(m) => m.as_str().replace("\\n", "\n"),
                    None => "true".to_string(),
                };
                Some((key, value))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
enum TagKind {
    Text(String),
    Template(Expr),
    For { item_name: String, array: Expr },
    If(Expr),
    Elif(Expr),
    Else,
    EndIf,
    EndFor,
}

impl TagKind {
    fn describe(&self) -> &'static str {
        match self {
            TagKind::Text(_) => "text",
            TagKind::Template(_) => "expression tag",
            TagKind::For { .. } => "{{for}}",
            TagKind::If(_) => "{{if}}",
            TagKind::Elif(_) => "{{elif}}",
            TagKind::Else => "{{else}}",
            TagKind::EndIf => "{{/if}}",
            TagKind::EndFor => "{{/for}}",
        }
    }
}

#[derive(Debug)]
struct Part {
    kind: TagKind,
    params: IndexMap<String, String>,
}

impl Part {
    fn is_whitespace(&self) -> bool {
        matches!(&self.kind, TagKind::Text(text) if text.trim().is_empty())
    }

    fn is_control(&self) -> bool {
        !matches!(self.kind, TagKind::Text(_) | TagKind::Template(_))
    }

    fn flag(&self, name: &str) -> bool {
        self.params.get(name).is_some_and(|v| v == "true")
    }

    /// Loop separator: `sep` when given, else `""` for inline loops and a
    /// newline otherwise.
    fn separator(&self, inline: bool) -> String {
        match self.params.get("sep") {
            Some(sep) => sep.clone(),
            None if inline => String::new(),
            None => "\n".to_string(),
        }
    }
}

struct SourceLine {
    idx: usize,
    raw: String,
    parts: Vec<Part>,
    control: Option<usize>,
    /// Leading spaces of the raw line.
    indent: usize,
}

impl SourceLine {
    fn control(&self) -> Option<&Part> {
        self.control.and_then(|i| self.parts.get(i))
    }

    fn fail(&self, message: impl Into<String>) -> Error {
        TemplateError::Structure {
            message: message.into(),
            line_idx: self.idx,
            line: self.raw.clone(),
        }
        .into()
    }
}

/// Parses template documents into a [`Block`].
pub struct TemplateParser<'a> {
    text: &'a str,
    indent_step: usize,
}

impl<'a> TemplateParser<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            indent_step: DEFAULT_INDENT_STEP,
        }
    }

    /// Number of spaces a control block's body is indented by.
    pub fn indent_step(mut self, step: usize) -> Self {
        self.indent_step = step;
        self
    }

    pub fn parse(self) -> Result<Block, Error> {
        let patterns = Patterns::new().map_err(|e| TemplateError::Structure {
            message: format!("invalid tag pattern: {e}"),
            line_idx: 0,
            line: String::new(),
        })?;

        let lines = self
            .text
            .split('\n')
            .enumerate()
            .map(|(idx, raw)| split_line(&patterns, idx, raw))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(lines = lines.len(), "parsing template");

        let mut reader = BlockReader {
            lines,
            pos: 0,
            step: self.indent_step,
        };
        let root = reader.read_block(0)?;
        if let Some(line) = reader.lines.get(reader.pos) {
            let tag = line.control().map_or("tag", |p| p.kind.describe());
            return Err(line.fail(format!("unexpected {tag} outside of any block")));
        }
        Ok(root)
    }
}

fn split_line(patterns: &Patterns, idx: usize, raw: &str) -> Result<SourceLine, Error> {
    let mut parts = Vec::new();
    let mut last = 0;
    for caps in patterns.tag.captures_iter(raw) {
        let (Some(whole), Some(content)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_text(&mut parts, &raw[last..whole.start()]);
        let part = parse_tag(patterns, content.as_str()).map_err(|e| TemplateError::Expression {
            line_idx: idx,
            line: raw.to_string(),
            source: Box::new(e),
        })?;
        parts.push(part);
        last = whole.end();
    }
    push_text(&mut parts, &raw[last..]);

    let mut non_ws = parts
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_whitespace());
    let control = match (non_ws.next(), non_ws.next()) {
        (Some((i, part)), None) if part.is_control() => Some(i),
        _ => None,
    };

    Ok(SourceLine {
        idx,
        raw: raw.to_string(),
        parts,
        control,
        indent: leading_spaces(raw),
    })
}

fn push_text(parts: &mut Vec<Part>, text: &str) {
    if !text.is_empty() {
        parts.push(Part {
            kind: TagKind::Text(text.to_string()),
            params: IndexMap::new(),
        });
    }
}

fn parse_tag(patterns: &Patterns, content: &str) -> Result<Part, Error> {
    let content = content.trim();
    let (body, params) = match content.rfind('|') {
        Some(pos) if !content[..pos].ends_with('|') => (
            content[..pos].trim(),
            patterns.parse_params(content[pos + 1..].trim()),
        ),
        _ => (content, IndexMap::new()),
    };

    let kind = if let Some(caps) = patterns.for_tag.captures(body) {
        TagKind::For {
            item_name: caps[1].to_string(),
            array: crate::parse_expression(&caps[2])?,
        }
    } else if let Some(caps) = patterns.if_tag.captures(body) {
        TagKind::If(crate::parse_expression(&caps[1])?)
    } else if let Some(caps) = patterns.elif_tag.captures(body) {
        TagKind::Elif(crate::parse_expression(&caps[1])?)
    } else if let Some(caps) = patterns.end_tag.captures(body) {
        if &caps[1] == "if" {
            TagKind::EndIf
        } else {
            TagKind::EndFor
        }
    } else if patterns.else_tag.is_match(body) {
        TagKind::Else
    } else {
        TagKind::Template(crate::parse_expression(body)?)
    };

    Ok(Part { kind, params })
}

fn leading_spaces(text: &str) -> usize {
    text.len() - text.trim_start_matches(' ').len()
}

#[derive(Clone, Copy)]
enum Closing {
    If,
    For,
}

impl Closing {
    fn tag(self) -> &'static str {
        match self {
            Closing::If => "{{/if}}",
            Closing::For => "{{/for}}",
        }
    }

    fn matches(self, kind: &TagKind) -> bool {
        matches!(
            (self, kind),
            (Closing::If, TagKind::EndIf) | (Closing::For, TagKind::EndFor)
        )
    }
}

struct BlockReader {
    lines: Vec<SourceLine>,
    pos: usize,
    step: usize,
}

impl BlockReader {
    fn control_at(&self, pos: usize) -> Option<TagKind> {
        self.lines
            .get(pos)
            .and_then(SourceLine::control)
            .map(|p| p.kind.clone())
    }

    /// Reads lines until a continuation tag (`elif`, `else`, `/if`,
    /// `/for`) or the end of the document.
    fn read_block(&mut self, expected_indent: usize) -> Result<Block, Error> {
        let mut nodes = Vec::new();
        while self.pos < self.lines.len() {
            let indent = {
                let line = &self.lines[self.pos];
                line.indent - line.indent.min(expected_indent)
            };
            match self.control_at(self.pos) {
                Some(TagKind::If(_)) => nodes.push((self.read_if(expected_indent)?, indent)),
                Some(TagKind::For { .. }) => nodes.push((self.read_for(expected_indent)?, indent)),
                Some(_) => break,
                None => {
                    let line = self.read_line(expected_indent)?;
                    nodes.push((Node::Line(line), 0));
                    self.pos += 1;
                }
            }
        }
        Ok(Block {
            lines: fuse(nodes),
        })
    }

    fn read_body(&mut self, expected_indent: usize, inline: bool) -> Result<Node, Error> {
        let block = self.read_block(expected_indent)?;
        Ok(if inline {
            Node::Line(flatten(block))
        } else {
            Node::Block(block)
        })
    }

    fn expect_closing(&mut self, open: usize, closing: Closing) -> Result<(), Error> {
        match self.control_at(self.pos) {
            Some(kind) if closing.matches(&kind) => {
                self.pos += 1;
                Ok(())
            }
            Some(kind) => Err(self.lines[self.pos].fail(format!(
                "expected {}, got {}",
                closing.tag(),
                kind.describe()
            ))),
            None => Err(self.missing(open, closing)),
        }
    }

    fn missing(&self, open: usize, closing: Closing) -> Error {
        self.lines[open].fail(format!("missing {} for this block", closing.tag()))
    }

    fn read_if(&mut self, expected_indent: usize) -> Result<Node, Error> {
        let open = self.pos;
        let (mut condition, inline) = {
            let line = &self.lines[open];
            match line.control() {
                Some(part @ Part {
                    kind: TagKind::If(cond),
                    ..
                }) => (cond.clone(), part.flag("inline")),
                _ => return Err(line.fail("expected {{if}}")),
            }
        };
        let body_indent = if inline {
            expected_indent
        } else {
            expected_indent + self.step
        };

        let mut branches = Vec::new();
        let mut else_body = None;
        self.pos += 1;
        loop {
            let body = self.read_body(body_indent, inline)?;
            branches.push(IfBranch { condition, body });

            match self.control_at(self.pos) {
                Some(TagKind::Elif(cond)) => {
                    condition = cond;
                    self.pos += 1;
                }
                Some(TagKind::Else) => {
                    self.pos += 1;
                    else_body = Some(Box::new(self.read_body(body_indent, inline)?));
                    self.expect_closing(open, Closing::If)?;
                    break;
                }
                Some(TagKind::EndIf) => {
                    self.pos += 1;
                    break;
                }
                Some(other) => {
                    return Err(self.lines[self.pos].fail(format!(
                        "expected {{{{elif}}}}, {{{{else}}}} or {{{{/if}}}}, got {}",
                        other.describe()
                    )))
                }
                None => return Err(self.missing(open, Closing::If)),
            }
        }

        Ok(Node::If(IfNode {
            branches,
            else_body,
            inline,
        }))
    }

    fn read_for(&mut self, expected_indent: usize) -> Result<Node, Error> {
        let open = self.pos;
        let (item_name, array, inline, separator) = {
            let line = &self.lines[open];
            match line.control() {
                Some(part @ Part {
                    kind: TagKind::For { item_name, array },
                    ..
                }) => {
                    let inline = part.flag("inline");
                    (item_name.clone(), array.clone(), inline, part.separator(inline))
                }
                _ => return Err(line.fail("expected {{for}}")),
            }
        };
        let body_indent = if inline {
            expected_indent
        } else {
            expected_indent + self.step
        };

        self.pos += 1;
        let body = self.read_body(body_indent, inline)?;
        let else_body = match self.control_at(self.pos) {
            Some(TagKind::Else) => {
                self.pos += 1;
                let else_body = self.read_body(body_indent, inline)?;
                self.expect_closing(open, Closing::For)?;
                Some(Box::new(else_body))
            }
            Some(TagKind::EndFor) => {
                self.pos += 1;
                None
            }
            Some(other) => {
                return Err(self.lines[self.pos].fail(format!(
                    "expected {{{{else}}}} or {{{{/for}}}}, got {}",
                    other.describe()
                )))
            }
            None => return Err(self.missing(open, Closing::For)),
        };

        Ok(Node::For(ForNode {
            item_name,
            array,
            inline,
            separator,
            body: Box::new(body),
            else_body,
        }))
    }

    fn read_line(&self, expected_indent: usize) -> Result<Line, Error> {
        let line = &self.lines[self.pos];
        let mut parser = LineParser {
            line,
            strip: line.indent.min(expected_indent),
            pos: 0,
        };
        let items = parser.read_items()?;
        if let Some(part) = line.parts.get(parser.pos) {
            return Err(line.fail(format!("unexpected {} in line", part.kind.describe())));
        }

        let mut node = Line { indent: 0, items };
        take_indent(&mut node);
        Ok(node)
    }
}

/// Moves the leading spaces of a line's first text item into its indent.
fn take_indent(line: &mut Line) {
    if let Some(Node::Text(text)) = line.items.first_mut() {
        line.indent = leading_spaces(text);
        text.replace_range(..line.indent, "");
        if text.is_empty() {
            line.items.remove(0);
        }
    }
}

/// Joins inline constructs with their neighbouring lines.
fn fuse(nodes: Vec<(Node, usize)>) -> Vec<Node> {
    let mut lines: Vec<Node> = Vec::new();
    let mut prev_inline = false;

    for (node, indent) in nodes {
        let inline = node.is_inline();
        let joinable = inline || (prev_inline && matches!(node, Node::Line(_)));
        prev_inline = inline;

        if joinable {
            if let Some(Node::Line(last)) = lines.last_mut() {
                match node {
                    Node::Line(line) => append(last, line),
                    other => last.items.push(other),
                }
                continue;
            }
        }

        if inline {
            lines.push(Node::Line(Line {
                indent,
                items: vec![node],
            }));
        } else {
            lines.push(node);
        }
    }
    lines
}

fn append(target: &mut Line, line: Line) {
    let mut items = line.items.into_iter();
    match items.next() {
        Some(Node::Text(text)) => {
            let text = text.trim_start();
            if !text.is_empty() {
                target.items.push(Node::Text(text.to_string()));
            }
        }
        Some(first) => target.items.push(first),
        None => {}
    }
    target.items.extend(items);
}

/// Collapses an inline construct's body into a single line.
fn flatten(block: Block) -> Line {
    let mut line = Line::default();
    for node in block.lines {
        match node {
            Node::Line(inner) => line.items.extend(inner.items),
            other => line.items.push(other),
        }
    }
    line
}

/// Parses the parts of a single non-control line, including complete
/// within-line `if` and `for` constructs.
struct LineParser<'l> {
    line: &'l SourceLine,
    strip: usize,
    pos: usize,
}

impl<'l> LineParser<'l> {
    fn read_items(&mut self) -> Result<Vec<Node>, Error> {
        let line = self.line;
        let mut items = Vec::new();
        while let Some(part) = line.parts.get(self.pos) {
            match &part.kind {
                TagKind::Text(text) => {
                    let text = if self.pos == 0 {
                        text.get(self.strip..).unwrap_or("")
                    } else {
                        text.as_str()
                    };
                    if !text.is_empty() {
                        items.push(Node::Text(text.to_string()));
                    }
                }
                TagKind::Template(expr) => items.push(Node::Template(expr.clone())),
                TagKind::If(condition) => {
                    items.push(self.read_if(condition.clone())?);
                    continue;
                }
                TagKind::For { item_name, array } => {
                    let separator = part.separator(true);
                    items.push(self.read_for(item_name.clone(), array.clone(), separator)?);
                    continue;
                }
                _ => break,
            }
            self.pos += 1;
        }
        Ok(items)
    }

    fn read_body(&mut self) -> Result<Node, Error> {
        Ok(Node::Line(Line {
            indent: 0,
            items: self.read_items()?,
        }))
    }

    fn current(&self) -> Option<&'l TagKind> {
        self.line.parts.get(self.pos).map(|p| &p.kind)
    }

    fn expect(&mut self, closing: Closing) -> Result<(), Error> {
        match self.current() {
            Some(kind) if closing.matches(kind) => {
                self.pos += 1;
                Ok(())
            }
            Some(kind) => Err(self.line.fail(format!(
                "expected {} in line, got {}",
                closing.tag(),
                kind.describe()
            ))),
            None => Err(self.line.fail(format!("missing {} in line", closing.tag()))),
        }
    }

    fn read_if(&mut self, first: Expr) -> Result<Node, Error> {
        let mut branches = Vec::new();
        let mut else_body = None;
        let mut condition = first;
        self.pos += 1;

        loop {
            let body = self.read_body()?;
            branches.push(IfBranch { condition, body });
            match self.current() {
                Some(TagKind::Elif(cond)) => {
                    condition = cond.clone();
                    self.pos += 1;
                }
                Some(TagKind::Else) => {
                    self.pos += 1;
                    else_body = Some(Box::new(self.read_body()?));
                    self.expect(Closing::If)?;
                    break;
                }
                _ => {
                    self.expect(Closing::If)?;
                    break;
                }
            }
        }

        Ok(Node::If(IfNode {
            branches,
            else_body,
            inline: true,
        }))
    }

    fn read_for(&mut self, item_name: String, array: Expr, separator: String) -> Result<Node, Error> {
        self.pos += 1;
        let body = self.read_body()?;
        let else_body = match self.current() {
            Some(TagKind::Else) => {
                self.pos += 1;
                Some(Box::new(self.read_body()?))
            }
            _ => None,
        };
        self.expect(Closing::For)?;

        Ok(Node::For(ForNode {
            item_name,
            array,
            inline: true,
            separator,
            body: Box::new(body),
            else_body,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_expression;
    use indoc::indoc;

    fn parse(text: &str) -> Block {
        TemplateParser::new(text).parse().unwrap()
    }

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    fn tmpl(s: &str) -> Node {
        Node::Template(parse_expression(s).unwrap())
    }

    fn structure_error(text: &str) -> (String, usize) {
        match TemplateParser::new(text).parse().unwrap_err() {
            Error::Template(TemplateError::Structure {
                message, line_idx, ..
            }) => (message, line_idx),
            other => panic!("expected structural error, got {other}"),
        }
    }

    #[test]
    fn plain_lines_keep_indent_separately() {
        let block = parse("class {{name}} {\n    x\n\n}");
        assert_eq!(
            block.lines,
            vec![
                Node::Line(Line {
                    indent: 0,
                    items: vec![text("class "), tmpl("name"), text(" {")]
                }),
                Node::Line(Line {
                    indent: 4,
                    items: vec![text("x")]
                }),
                Node::Line(Line::default()),
                Node::Line(Line {
                    indent: 0,
                    items: vec![text("}")]
                }),
            ]
        );
    }

    #[test]
    fn control_line_detection() {
        let block = parse("  {{if a}}  \nx\n{{/if}}");
        assert!(matches!(block.lines.as_slice(), [Node::If(_)]));

        // Two tags on one line make it an ordinary line.
        let block = parse("{{a}}{{b}}");
        assert!(matches!(block.lines.as_slice(), [Node::Line(_)]));
    }

    #[test]
    fn if_elif_else_chain() {
        let block = parse(indoc! {"
            {{if a}}
              one
            {{elif b}}
              two
            {{else}}
              three
            {{/if}}"});
        let [Node::If(node)] = block.lines.as_slice() else {
            panic!("expected a single if, got {:?}", block.lines)
        };
        assert_eq!(node.branches.len(), 2);
        assert!(!node.inline);
        assert_eq!(
            node.branches[1].body,
            Node::Block(Block {
                lines: vec![Node::Line(Line {
                    indent: 0,
                    items: vec![text("two")]
                })]
            })
        );
        assert!(node.else_body.is_some());
    }

    #[test]
    fn body_indentation_is_stripped_one_step() {
        let block = parse("{{for x in xs}}\n    deep\n{{/for}}");
        let [Node::For(node)] = block.lines.as_slice() else {
            panic!("expected a for")
        };
        assert_eq!(node.separator, "\n");
        assert_eq!(
            *node.body,
            Node::Block(Block {
                lines: vec![Node::Line(Line {
                    indent: 2,
                    items: vec![text("deep")]
                })]
            })
        );
    }

    #[test]
    fn custom_indent_step() {
        let block = TemplateParser::new("{{for x in xs}}\n    deep\n{{/for}}")
            .indent_step(4)
            .parse()
            .unwrap();
        let [Node::For(node)] = block.lines.as_slice() else {
            panic!("expected a for")
        };
        let Node::Block(body) = node.body.as_ref() else {
            panic!("expected block body")
        };
        assert_eq!(body.lines, vec![Node::Line(Line { indent: 0, items: vec![text("deep")] })]);
    }

    #[test]
    fn inline_for_is_fused_into_surrounding_line() {
        let block = parse(indoc! {r#"
            f(
            {{for p in params | inline sep=", "}}
            {{p}}
            {{/for}}
            );"#});
        let [Node::Line(line)] = block.lines.as_slice() else {
            panic!("expected one fused line, got {:?}", block.lines)
        };
        assert_eq!(line.items.len(), 3);
        assert_eq!(line.items[0], text("f("));
        assert_eq!(line.items[2], text(");"));
        let Node::For(node) = &line.items[1] else {
            panic!("expected for item")
        };
        assert!(node.inline);
        assert_eq!(node.separator, ", ");
        assert_eq!(
            *node.body,
            Node::Line(Line {
                indent: 0,
                items: vec![tmpl("p")]
            })
        );
    }

    #[test]
    fn leading_inline_construct_becomes_a_line() {
        let block = parse("  {{if a | inline}}\nyes\n{{/if}}");
        let [Node::Line(line)] = block.lines.as_slice() else {
            panic!("expected a line")
        };
        assert_eq!(line.indent, 2);
        assert!(matches!(line.items.as_slice(), [Node::If(IfNode { inline: true, .. })]));
    }

    #[test]
    fn within_line_constructs() {
        let block = parse("a{{if x}}b{{elif y}}c{{else}}d{{/if}} {{for i in xs}}{{i}}{{/for}}");
        let [Node::Line(line)] = block.lines.as_slice() else {
            panic!("expected a line")
        };
        assert_eq!(line.items.len(), 4);
        let Node::If(if_node) = &line.items[1] else {
            panic!("expected if")
        };
        assert_eq!(if_node.branches.len(), 2);
        let Node::For(for_node) = &line.items[3] else {
            panic!("expected for")
        };
        assert_eq!(for_node.separator, "");
    }

    #[test]
    fn params_parsing() {
        let patterns = Patterns::new().unwrap();
        let params = patterns.parse_params(r#"inline sep=", " join='a\nb' n=3"#);
        assert_eq!(params.get("inline").map(String::as_str), Some("true"));
        assert_eq!(params.get("sep").map(String::as_str), Some(", "));
        assert_eq!(params.get("join").map(String::as_str), Some("a\nb"));
        assert_eq!(params.get("n").map(String::as_str), Some("3"));
    }

    #[test]
    fn double_pipe_is_not_a_param_separator() {
        let block = parse("{{a || b}}");
        let [Node::Line(line)] = block.lines.as_slice() else {
            panic!("expected a line")
        };
        assert_eq!(line.items, vec![tmpl("a || b")]);
    }

    #[test]
    fn missing_endif() {
        let (message, line_idx) = structure_error("x\n{{if a}}\n  y");
        assert_eq!(message, "missing {{/if}} for this block");
        assert_eq!(line_idx, 1);
    }

    #[test]
    fn missing_endfor_after_else() {
        let (message, line_idx) = structure_error("{{for a in b}}\n  x\n{{else}}\n  y\n{{/if}}");
        assert_eq!(message, "expected {{/for}}, got {{/if}}");
        assert_eq!(line_idx, 4);
    }

    #[test]
    fn wrong_closing_tag() {
        let (message, line_idx) = structure_error("{{if a}}\n  x\n{{/for}}");
        assert!(message.starts_with("expected {{elif}}, {{else}} or {{/if}}"));
        assert_eq!(line_idx, 2);
    }

    #[test]
    fn stray_continuation_at_root() {
        let (message, line_idx) = structure_error("x\n{{else}}\ny");
        assert_eq!(message, "unexpected {{else}} outside of any block");
        assert_eq!(line_idx, 1);
    }

    #[test]
    fn unclosed_within_line_if() {
        let (message, _) = structure_error("a{{if x}}b");
        assert_eq!(message, "missing {{/if}} in line");
    }

    #[test]
    fn bad_tag_expression_names_the_line() {
        let err = TemplateParser::new("ok\n{{1 +}}").parse().unwrap_err();
        let Error::Template(err) = err else {
            panic!("expected template error")
        };
        assert_eq!(err.line_idx(), 1);
        assert!(err.to_string().contains("unexpected end of expression"));
    }
}
