use codetmpl::{
    parse_template, print_template, render, Error, EvalError, Generator, HostObject, MethodRegistry,
    ModelHandler, Node, TemplateError, TemplateMethod, Value, ValueModelHandler, VariableContext,
    VariableSource,
};
use indoc::indoc;
use serde_json::json;

fn model(json: serde_json::Value) -> VariableContext {
    VariableContext::from(VariableSource::from_json("model", json))
}

fn render_json(template: &str, json: serde_json::Value) -> String {
    render(template, &model(json)).unwrap()
}

// ── Line and newline handling ──

#[test]
fn plain_text_passes_through() {
    assert_eq!(render_json("Hello, world!", json!({})), "Hello, world!");
    assert_eq!(render_json("a\n\nb", json!({})), "a\n\nb");
}

#[test]
fn trailing_newline_is_kept_not_added() {
    assert_eq!(render_json("{{x}}", json!({"x": 1})), "1");
    assert_eq!(render_json("{{x}}\n", json!({"x": 1})), "1\n");
}

#[test]
fn indented_multi_line_value() {
    assert_eq!(render_json("  {{x}}", json!({"x": "a\nb"})), "  a\n  b");
}

#[test]
fn null_expression_removes_its_line() {
    let template = "first\n{{comment}}\nlast";
    assert_eq!(render_json(template, json!({"comment": null})), "first\nlast");
    assert_eq!(
        render_json(template, json!({"comment": "// hi"})),
        "first\n// hi\nlast"
    );
}

#[test]
fn absent_items_do_not_remove_text_on_the_same_line() {
    assert_eq!(render_json("x = {{v}};", json!({"v": null})), "x = ;");
}

// ── Control flow ──

#[test]
fn nested_for_and_if() {
    let template = indoc! {"
        class {{name}} {
        {{for f in fields}}
          {{if f.public}}
              public {{f.type}} {{f.name}};
          {{else}}
              private {{f.type}} {{f.name}};
          {{/if}}
        {{/for}}
        }"};
    let output = render_json(
        template,
        json!({
            "name": "Point",
            "fields": [
                {"name": "x", "type": "int", "public": true},
                {"name": "y", "type": "int", "public": false}
            ]
        }),
    );
    assert_eq!(output, "class Point {\n  public int x;\n  private int y;\n}");
}

#[test]
fn elif_chain_picks_first_truthy_branch() {
    let template = indoc! {"
        {{if n < 0}}
          negative
        {{elif n == 0}}
          zero
        {{else}}
          positive
        {{/if}}"};
    assert_eq!(render_json(template, json!({"n": -3})), "negative");
    assert_eq!(render_json(template, json!({"n": 0})), "zero");
    assert_eq!(render_json(template, json!({"n": 7})), "positive");
}

#[test]
fn separator_appears_only_between_items() {
    let template = indoc! {r#"
        [
        {{for x in xs | inline sep=", "}}
        {{x}}
        {{/for}}
        ]"#};
    for n in 0..5 {
        let items: Vec<String> = (0..n).map(|i| format!("v{i}")).collect();
        let expected = format!("[{}]", items.join(", "));
        assert_eq!(render_json(template, json!({ "xs": items })), expected, "n = {n}");
    }
}

#[test]
fn loop_variables_shadow_the_model() {
    let template = "{{for name in names | sep=\" \"}}\n  {{name}}\n{{/for}}\n{{name}}";
    assert_eq!(
        render_json(template, json!({"names": ["a", "b"], "name": "outer"})),
        "a b\nouter"
    );
}

#[test]
fn loop_over_a_scalar_is_an_error() {
    let err = render("{{for x in n}}\n  {{x}}\n{{/for}}", &model(json!({"n": "abc"}))).unwrap_err();
    let Error::Eval(err) = err else {
        panic!("expected evaluation error, got {err}")
    };
    assert!(matches!(err.root_cause(), EvalError::NotIterable { kind: "string", .. }));
}

// ── Named templates ──

#[test]
fn greet() {
    let mut generator = Generator::new(VariableContext::default());
    generator
        .add_method(TemplateMethod::from_signature("greet(name)", "Hello, {{name}}!").unwrap())
        .unwrap();
    let block = parse_template(r#"{{greet("World")}}"#).unwrap();
    assert_eq!(generator.generate(&block).unwrap(), "Hello, World!");
}

#[test]
fn methods_call_each_other() {
    let mut methods = MethodRegistry::new();
    methods
        .add(TemplateMethod::from_signature("field(f)", "{{f.name}}: {{ty(f)}},").unwrap())
        .unwrap();
    methods
        .add(TemplateMethod::from_signature("ty(f)", "{{f.optional ? \"Option<\" + f.type + \">\" : f.type}}").unwrap())
        .unwrap();
    let generator = Generator::with_methods(
        model(json!({
            "fields": [
                {"name": "id", "type": "u64", "optional": false},
                {"name": "note", "type": "String", "optional": true}
            ]
        })),
        methods,
    );
    let template = "struct Row {\n{{for f in fields}}\n    {{field(f)}}\n{{/for}}\n}";
    assert_eq!(
        generator.generate(&parse_template(template).unwrap()).unwrap(),
        "struct Row {\n  id: u64,\n  note: Option<String>,\n}"
    );
}

#[test]
fn failing_method_reports_call_stack() {
    let mut generator = Generator::new(VariableContext::default());
    generator
        .add_method(TemplateMethod::from_signature("leaf(x)", "{{x.y.z}}").unwrap())
        .unwrap();
    generator
        .add_method(TemplateMethod::from_signature("root", "{{leaf(1)}}").unwrap())
        .unwrap();
    let err = generator
        .generate(&parse_template("{{root()}}").unwrap())
        .unwrap_err();
    let Error::Eval(err) = err else {
        panic!("expected evaluation error, got {err}")
    };
    assert_eq!(err.trace(), Some(&["root".to_string(), "leaf".to_string()][..]));
    assert!(matches!(err.root_cause(), EvalError::NotAnObject { kind: "number", .. }));
}

// ── Host model ──

#[derive(Debug)]
struct Class {
    name: &'static str,
    methods: Vec<&'static str>,
}

impl HostObject for Class {
    fn type_name(&self) -> &str {
        "Class"
    }

    fn member(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name)),
            "methods" => Some(Value::from(self.methods.clone())),
            _ => None,
        }
    }
}

#[test]
fn host_objects_expose_members() {
    let vars = VariableContext::from(VariableSource::single(
        "cls",
        Value::object(Class {
            name: "Stack",
            methods: vec!["push", "pop"],
        }),
    ));
    let template = "{{cls.name}}: {{for m in cls.methods}}{{m}}(){{/for}}";
    assert_eq!(render(template, &vars).unwrap(), "Stack: push()pop()");
}

/// Adds a `pascal` property to strings.
struct CaseHandler;

impl ModelHandler for CaseHandler {
    fn method_call(
        &self,
        method: &Value,
        args: Vec<Value>,
        receiver: Option<Value>,
        vars: &VariableContext,
    ) -> Result<Value, EvalError> {
        ValueModelHandler.method_call(method, args, receiver, vars)
    }

    fn member_access(
        &self,
        object: &Value,
        member: &Value,
        is_property: bool,
    ) -> Result<Option<Value>, EvalError> {
        match (object, member.as_str()) {
            (Value::String(s), Some("pascal")) if is_property => Ok(Some(Value::String(
                s.split('_')
                    .map(|word| {
                        let mut chars = word.chars();
                        chars
                            .next()
                            .map(|c| c.to_uppercase().chain(chars).collect::<String>())
                            .unwrap_or_default()
                    })
                    .collect(),
            ))),
            _ => ValueModelHandler.member_access(object, member, is_property),
        }
    }
}

#[test]
fn custom_model_handler() {
    let generator = Generator::with_handler(model(json!({"table": "user_account"})), CaseHandler);
    let block = parse_template("struct {{table.pascal}}; // {{table.length}}").unwrap();
    assert_eq!(generator.generate(&block).unwrap(), "struct UserAccount; // 12");
}

// ── Parse errors and tree dump ──

#[test]
fn unclosed_block_reports_its_line() {
    let err = parse_template("a\n{{for x in xs}}\n  {{x}}").unwrap_err();
    let Error::Template(err) = err else {
        panic!("expected template error, got {err}")
    };
    assert!(matches!(err, TemplateError::Structure { .. }));
    assert_eq!(err.line_idx(), 1);
    assert_eq!(
        err.to_string(),
        "missing {{/for}} for this block (line 1: '{{for x in xs}}')"
    );
}

#[test]
fn bad_tag_expression_is_reported() {
    let err = parse_template("ok\n{{1 +}}").unwrap_err();
    let Error::Template(err) = err else {
        panic!("expected template error, got {err}")
    };
    assert!(matches!(err, TemplateError::Expression { line_idx: 1, .. }));
}

#[test]
fn template_tree_dump() {
    let block = parse_template("x = {{a+1}}").unwrap();
    assert_eq!(
        print_template(&Node::Block(block)),
        "Line #1 [indent=0]:\n  Item #1: \"x = \"\n  Item #2: \"(a + 1)\"\n"
    );
}
