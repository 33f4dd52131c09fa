//! Template generator.
//!
//! Rendering distinguishes *absent* output (`None`: nothing at all, not
//! even a line break) from empty text. An `if` with no matching branch or
//! a loop over nothing is absent, and a line made only of absent items
//! disappears from the output instead of leaving a blank line behind.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::Expr;
use crate::error::{Error, EvalError};
use crate::eval::{Evaluator, ModelHandler, ValueModelHandler};
use crate::scope::{VariableContext, VariableSource};
use crate::template::{Block, ForNode, IfNode, Line, Node};
use crate::template_parser::TemplateParser;
use crate::value::Value;

/// Rendered output: `None` is absent, otherwise a list of text fragments.
type Rendered = Option<Vec<String>>;

/// A named template callable from expressions like a function.
pub struct TemplateMethod {
    name: String,
    params: Vec<String>,
    body: Block,
}

impl TemplateMethod {
    /// Compiles `template` as the method body. `\#` in the body stands
    /// for `#`.
    pub fn new(name: impl Into<String>, params: Vec<String>, template: &str) -> Result<Self, Error> {
        let name = name.into();
        if let Some(dup) = params
            .iter()
            .enumerate()
            .find_map(|(i, p)| params[..i].contains(p).then_some(p))
        {
            return Err(Error::Signature {
                signature: format!("{name}({})", params.join(", ")),
                message: format!("duplicate parameter '{dup}'"),
            });
        }

        let body = TemplateParser::new(&template.replace("\\#", "#")).parse()?;
        Ok(Self { name, params, body })
    }

    /// Builds a method from a signature such as `greet(name, title)`; a
    /// bare identifier declares a method without parameters.
    pub fn from_signature(signature: &str, template: &str) -> Result<Self, Error> {
        let fail = |message: String| Error::Signature {
            signature: signature.to_string(),
            message,
        };

        let expr = crate::parse_expression(signature).map_err(|e| fail(e.to_string()))?;
        let (name, params) = match &expr {
            Expr::Identifier(name) => (name.clone(), Vec::new()),
            Expr::Call { callee, args } => {
                let name = callee
                    .as_identifier()
                    .ok_or_else(|| fail(format!("method name must be an identifier, got `{callee}`")))?;
                let params = args
                    .iter()
                    .map(|arg| {
                        arg.as_identifier()
                            .map(str::to_string)
                            .ok_or_else(|| fail(format!("parameter must be an identifier, got `{arg}`")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                (name.to_string(), params)
            }
            other => return Err(fail(format!("expected `name(params...)`, got `{other}`"))),
        };

        Self::new(name, params, template)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn body(&self) -> &Block {
        &self.body
    }
}

impl fmt::Debug for TemplateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TemplateMethod({}({}))", self.name, self.params.join(", "))
    }
}

/// Named templates visible to a [`Generator`].
///
/// The registry is itself a variable source, so methods are found by
/// ordinary variable lookup.
#[derive(Clone, Debug)]
pub struct MethodRegistry {
    source: Rc<VariableSource>,
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self {
            source: Rc::new(VariableSource::new("template methods")),
        }
    }

    pub fn add(&mut self, method: TemplateMethod) -> Result<(), EvalError> {
        debug!(method = %method.name, params = method.params.len(), "registering template method");
        let name = method.name.clone();
        Rc::make_mut(&mut self.source).set(name, Value::Method(Rc::new(method)))
    }

    pub fn get(&self, name: &str) -> Option<Rc<TemplateMethod>> {
        match self.source.get(name) {
            Some(Value::Method(method)) => Some(method),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

struct CallFrame {
    method_name: String,
    vars: VariableContext,
}

/// Renders template trees against a root variable context.
///
/// The generator is also the [`ModelHandler`] its expressions are
/// evaluated with: calls to template methods are rendered here, anything
/// else goes to the wrapped host handler.
pub struct Generator {
    root_vars: VariableContext,
    methods: MethodRegistry,
    handler: Box<dyn ModelHandler>,
    call_stack: RefCell<Vec<CallFrame>>,
}

impl Generator {
    pub fn new(root_vars: VariableContext) -> Self {
        Self::with_methods(root_vars, MethodRegistry::new())
    }

    pub fn with_handler(root_vars: VariableContext, handler: impl ModelHandler + 'static) -> Self {
        let mut generator = Self::new(root_vars);
        generator.handler = Box::new(handler);
        generator
    }

    pub fn with_methods(root_vars: VariableContext, methods: MethodRegistry) -> Self {
        Self {
            root_vars,
            methods,
            handler: Box::new(ValueModelHandler),
            call_stack: RefCell::new(Vec::new()),
        }
    }

    pub fn add_method(&mut self, method: TemplateMethod) -> Result<(), Error> {
        self.methods.add(method)?;
        Ok(())
    }

    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    /// Renders `template`. Absent output renders as an empty string.
    pub fn generate(&self, template: &Block) -> Result<String, Error> {
        debug!(
            lines = template.lines.len(),
            methods = self.methods.len(),
            "generating template"
        );
        let vars = self
            .root_vars
            .inherit([Rc::clone(&self.methods.source)]);
        let rendered = self.render_block(template, &vars)?;
        Ok(rendered.map(|fragments| fragments.concat()).unwrap_or_default())
    }

    fn evaluate(&self, expr: &Expr, vars: &VariableContext) -> Result<Value, EvalError> {
        Evaluator::new(self).evaluate(expr, vars)
    }

    fn render(&self, node: &Node, vars: &VariableContext) -> Result<Rendered, EvalError> {
        match node {
            Node::Block(block) => self.render_block(block, vars),
            Node::Line(line) => self.render_line(line, vars),
            Node::Text(text) => Ok(Some(vec![text.clone()])),
            Node::Template(expr) => self.render_expr(expr, vars),
            Node::For(for_node) => self.render_for(for_node, vars),
            Node::If(if_node) => self.render_if(if_node, vars),
        }
    }

    fn render_block(&self, block: &Block, vars: &VariableContext) -> Result<Rendered, EvalError> {
        let rendered = block
            .lines
            .iter()
            .map(|line| self.render(line, vars))
            .collect::<Result<Vec<_>, _>>()?;

        // A blank source line next to a vanished line goes with it; each
        // vanished line takes at most one blank line along.
        let mut vanished: Vec<bool> = rendered.iter().map(Option::is_none).collect();
        let mut lines = Vec::new();
        for (i, line) in rendered.into_iter().enumerate() {
            let Some(line) = line else {
                continue;
            };
            if matches!(&block.lines[i], Node::Line(l) if l.items.is_empty()) {
                if i > 0 && vanished[i - 1] {
                    vanished[i - 1] = false;
                    continue;
                }
                if vanished.get(i + 1) == Some(&true) {
                    vanished[i + 1] = false;
                    continue;
                }
            }
            lines.push(line);
        }

        Ok((!lines.is_empty()).then(|| join(lines, "\n")))
    }

    fn render_line(&self, line: &Line, vars: &VariableContext) -> Result<Rendered, EvalError> {
        if line.items.is_empty() {
            return Ok(Some(vec![String::new()]));
        }

        let mut present = Vec::new();
        for item in &line.items {
            if let Some(fragments) = self.render(item, vars)? {
                present.push(fragments);
            }
        }
        if present.is_empty() {
            return Ok(None);
        }
        if line.indent == 0 {
            return Ok(Some(present.concat()));
        }

        // Multi-line fragments keep the line's indentation on every line.
        let indent = " ".repeat(line.indent);
        let mut out = vec![indent.clone()];
        for fragment in present.into_iter().flatten() {
            let mut pieces = fragment.split('\n');
            if let Some(first) = pieces.next() {
                out.push(first.to_string());
            }
            for piece in pieces {
                out.push("\n".to_string());
                out.push(indent.clone());
                out.push(piece.to_string());
            }
        }
        Ok(Some(out))
    }

    fn render_for(&self, node: &ForNode, vars: &VariableContext) -> Result<Rendered, EvalError> {
        let items = match self.evaluate(&node.array, vars)? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(EvalError::NotIterable {
                    expr: node.array.to_string(),
                    kind: other.kind(),
                })
            }
        };
        trace!(item = %node.item_name, count = items.len(), "for loop");

        if items.is_empty() {
            return match &node.else_body {
                Some(body) => self.render(body, vars),
                None => Ok(None),
            };
        }

        let mut outputs = Vec::new();
        for (idx, item) in items.into_iter().enumerate() {
            let mut source = VariableSource::new(format!("for: {}", node.item_name));
            source.set(node.item_name.clone(), item)?;
            source.set(format!("{}_idx", node.item_name), idx)?;
            let child = vars.inherit([Rc::new(source)]);
            if let Some(output) = self.render(&node.body, &child)? {
                outputs.push(output);
            }
        }

        Ok((!outputs.is_empty()).then(|| join(outputs, &node.separator)))
    }

    fn render_if(&self, node: &IfNode, vars: &VariableContext) -> Result<Rendered, EvalError> {
        for branch in &node.branches {
            if self.evaluate(&branch.condition, vars)?.is_truthy() {
                return self.render(&branch.body, vars);
            }
        }
        match &node.else_body {
            Some(body) => self.render(body, vars),
            None => Ok(None),
        }
    }

    fn render_expr(&self, expr: &Expr, vars: &VariableContext) -> Result<Rendered, EvalError> {
        Ok(match self.evaluate(expr, vars)? {
            Value::Null => None,
            // Sequences (e.g. template method results) are pre-rendered fragments.
            Value::Array(items) => Some(items.iter().map(Value::to_string).collect()),
            other => Some(vec![other.to_string()]),
        })
    }

    fn invoke(
        &self,
        method: &TemplateMethod,
        args: Vec<Value>,
        vars: &VariableContext,
    ) -> Result<Value, EvalError> {
        if args.len() != method.params.len() {
            return Err(EvalError::Arity {
                method: method.name.clone(),
                expected: method.params.len(),
                actual: args.len(),
            });
        }
        trace!(method = %method.name, args = args.len(), "invoking template method");

        let mut source = VariableSource::new(format!("method: {}", method.name));
        for (param, arg) in method.params.iter().zip(args) {
            source.set(param.clone(), arg)?;
        }
        // Methods see the caller's variables, not those at registration.
        let child = vars.inherit([Rc::new(source)]);

        Ok(match self.render_block(&method.body, &child)? {
            Some(fragments) => Value::Array(fragments.into_iter().map(Value::String).collect()),
            None => Value::Null,
        })
    }

    /// Attaches the current call stack to an error, once.
    fn traced(&self, err: EvalError) -> EvalError {
        if matches!(err, EvalError::Traced { .. }) {
            return err;
        }
        let stack = self.call_stack.borrow();
        if let Some(frame) = stack.last() {
            debug!(
                method = %frame.method_name,
                vars = %frame.vars.print_all(),
                "call failed"
            );
        }
        EvalError::Traced {
            trace: stack.iter().map(|f| f.method_name.clone()).collect(),
            source: Box::new(err),
        }
    }
}

impl ModelHandler for Generator {
    fn method_call(
        &self,
        method: &Value,
        args: Vec<Value>,
        receiver: Option<Value>,
        vars: &VariableContext,
    ) -> Result<Value, EvalError> {
        let method_name = match method {
            Value::Method(m) => m.name().to_string(),
            Value::Function(f) => f.name().to_string(),
            _ => return self.handler.method_call(method, args, receiver, vars),
        };

        self.call_stack.borrow_mut().push(CallFrame {
            method_name,
            vars: vars.clone(),
        });
        let result = match method {
            Value::Method(m) => self.invoke(m, args, vars),
            _ => self.handler.method_call(method, args, receiver, vars),
        }
        .map_err(|e| self.traced(e));
        self.call_stack.borrow_mut().pop();
        result
    }

    fn member_access(
        &self,
        object: &Value,
        member: &Value,
        is_property: bool,
    ) -> Result<Option<Value>, EvalError> {
        self.handler.member_access(object, member, is_property)
    }
}

fn join(parts: Vec<Vec<String>>, separator: &str) -> Vec<String> {
    let mut out = Vec::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            out.push(separator.to_string());
        }
        out.extend(part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_template;
    use indoc::indoc;
    use serde_json::json;

    fn model(json: serde_json::Value) -> VariableContext {
        VariableContext::from(VariableSource::from_json("test model", json))
    }

    fn render_with(template: &str, generator: &Generator) -> String {
        generator.generate(&parse_template(template).unwrap()).unwrap()
    }

    fn render(template: &str, json: serde_json::Value) -> String {
        render_with(template, &Generator::new(model(json)))
    }

    #[test]
    fn nested_for_and_if() {
        let template = indoc! {"
            {{for item in items}}
            {{if item > 1}}
            big:{{item}}
            {{else}}
            small:{{item}}
            {{/if}}
            {{/for}}"};
        assert_eq!(
            render(template, json!({"items": [1, 2, 3]})),
            "small:1\nbig:2\nbig:3"
        );
    }

    #[test]
    fn separators_only_between_produced_items() {
        let template = indoc! {"
            {{for x in xs}}
              {{if x != 2}}
                {{x}}
              {{/if}}
            {{/for}}"};
        assert_eq!(render(template, json!({"xs": [1, 2, 3]})), "1\n3");
    }

    #[test]
    fn empty_loop_uses_else_or_vanishes() {
        let template = "a\n{{for x in xs}}\n  {{x}}\n{{else}}\n  none\n{{/for}}\nb";
        assert_eq!(render(template, json!({"xs": []})), "a\nnone\nb");

        let template = "a\n{{for x in xs}}\n  {{x}}\n{{/for}}\nb";
        assert_eq!(render(template, json!({"xs": []})), "a\nb");
        assert_eq!(render(template, json!({"xs": null})), "a\nb");
    }

    #[test]
    fn loop_index_is_bound() {
        let template = "{{for x in xs | sep=\", \"}}\n  {{x_idx}}={{x}}\n{{/for}}";
        assert_eq!(render(template, json!({"xs": ["a", "b"]})), "0=a, 1=b");
    }

    #[test]
    fn absent_line_leaves_no_blank() {
        let template = "a\n{{maybe}}\nb";
        assert_eq!(render(template, json!({"maybe": null})), "a\nb");

        let template = "a\n{{if false}}\n  x\n{{/if}}\nb";
        assert_eq!(render(template, json!({})), "a\nb");
    }

    #[test]
    fn blank_line_collapses_with_vanished_neighbour() {
        let template = "a\n\n{{if false}}\n  x\n{{/if}}\n\nb";
        assert_eq!(render(template, json!({})), "a\n\nb");

        let template = "a\n\n{{if true}}\n  x\n{{/if}}\n\nb";
        assert_eq!(render(template, json!({})), "a\n\nx\n\nb");
    }

    #[test]
    fn empty_text_is_not_absent() {
        assert_eq!(render("[{{s}}]", json!({"s": ""})), "[]");
        assert_eq!(render("a\n{{s}}\nb", json!({"s": ""})), "a\n\nb");
    }

    #[test]
    fn indentation_applies_to_every_fragment_line() {
        assert_eq!(render("  {{x}}", json!({"x": "a\nb"})), "  a\n  b");
    }

    #[test]
    fn inline_loop_with_separator() {
        let template = indoc! {r#"
            fn f(
            {{for p in params | inline sep=", "}}
            {{p}}: i32
            {{/for}}
            ) {}"#};
        assert_eq!(
            render(template, json!({"params": ["a", "b"]})),
            "fn f(a: i32, b: i32) {}"
        );
    }

    #[test]
    fn within_line_if() {
        let template = "x{{if flag}}!{{else}}?{{/if}}";
        assert_eq!(render(template, json!({"flag": true})), "x!");
        assert_eq!(render(template, json!({"flag": false})), "x?");
    }

    #[test]
    fn named_template_call() {
        let mut generator = Generator::new(VariableContext::default());
        generator
            .add_method(TemplateMethod::from_signature("greet(name)", "Hello, {{name}}!").unwrap())
            .unwrap();
        assert_eq!(render_with(r#"{{greet("World")}}"#, &generator), "Hello, World!");
    }

    #[test]
    fn methods_see_the_callers_scope() {
        let mut methods = MethodRegistry::new();
        methods
            .add(TemplateMethod::from_signature("stmt(s)", "{{s}}{{suffix}} // {{x_idx}}").unwrap())
            .unwrap();
        let generator = Generator::with_methods(model(json!({"xs": ["a", "b"], "suffix": ";"})), methods);
        let template = "{{for x in xs}}\n  {{stmt(x)}}\n{{/for}}";
        assert_eq!(render_with(template, &generator), "a; // 0\nb; // 1");
    }

    #[test]
    fn multi_line_method_output_is_reindented() {
        let mut generator = Generator::new(model(json!({"fields": ["x", "y"]})));
        generator
            .add_method(
                TemplateMethod::from_signature(
                    "body",
                    "{{for f in fields}}\n  int {{f}};\n{{/for}}",
                )
                .unwrap(),
            )
            .unwrap();
        let template = "struct S {\n    {{body()}}\n}";
        assert_eq!(
            render_with(template, &generator),
            "struct S {\n    int x;\n    int y;\n}"
        );
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let mut generator = Generator::new(VariableContext::default());
        generator
            .add_method(TemplateMethod::from_signature("pair(a, b)", "{{a}}{{b}}").unwrap())
            .unwrap();
        let err = generator
            .generate(&parse_template("{{pair(1)}}").unwrap())
            .unwrap_err();
        let Error::Eval(err) = err else {
            panic!("expected evaluation error")
        };
        assert!(matches!(err.root_cause(), EvalError::Arity { expected: 2, actual: 1, .. }));
        assert_eq!(err.trace(), Some(&["pair".to_string()][..]));
    }

    #[test]
    fn errors_carry_the_call_stack() {
        let mut generator = Generator::new(VariableContext::default());
        generator
            .add_method(TemplateMethod::from_signature("inner", "{{missing}}").unwrap())
            .unwrap();
        generator
            .add_method(TemplateMethod::from_signature("outer", "{{inner()}}").unwrap())
            .unwrap();
        let err = generator
            .generate(&parse_template("{{outer()}}").unwrap())
            .unwrap_err();
        let Error::Eval(err) = err else {
            panic!("expected evaluation error")
        };
        assert_eq!(err.trace(), Some(&["outer".to_string(), "inner".to_string()][..]));
        assert!(matches!(err.root_cause(), EvalError::UnresolvedVariable { .. }));
    }

    #[test]
    fn duplicate_method_is_rejected() {
        let mut generator = Generator::new(VariableContext::default());
        generator
            .add_method(TemplateMethod::from_signature("m", "a").unwrap())
            .unwrap();
        let err = generator
            .add_method(TemplateMethod::from_signature("m", "b").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::Eval(EvalError::Redeclared { .. })));
    }

    #[test]
    fn signatures() {
        let method = TemplateMethod::from_signature("field(name, ty)", "\\#{{name}}").unwrap();
        assert_eq!(method.name(), "field");
        assert_eq!(method.params(), ["name", "ty"]);

        assert!(matches!(
            TemplateMethod::from_signature("f(a, a)", ""),
            Err(Error::Signature { .. })
        ));
        assert!(matches!(
            TemplateMethod::from_signature("f(1)", ""),
            Err(Error::Signature { .. })
        ));
        assert!(matches!(
            TemplateMethod::from_signature("a.b", ""),
            Err(Error::Signature { .. })
        ));
    }

    #[test]
    fn hash_escape_in_method_body() {
        let mut generator = Generator::new(VariableContext::default());
        generator
            .add_method(TemplateMethod::from_signature("inc(h)", "\\#include {{h}}").unwrap())
            .unwrap();
        assert_eq!(
            render_with(r#"{{inc("<a.h>")}}"#, &generator),
            "#include <a.h>"
        );
    }

    #[test]
    fn looping_over_a_scalar_fails() {
        let err = Generator::new(model(json!({"n": 3})))
            .generate(&parse_template("{{for x in n}}\n  {{x}}\n{{/for}}").unwrap())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected a sequence for loop over `n`, got number"
        );
    }
}
