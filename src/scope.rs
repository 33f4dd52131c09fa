//! Variable scopes.
//!
//! A [`VariableContext`] is an ordered chain of shared [`VariableSource`]s.
//! Child contexts are built with [`VariableContext::inherit`], which puts
//! new sources in front of the parent's; the parent's sources are shared,
//! never copied.

use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

use crate::error::EvalError;
use crate::value::Value;

#[derive(Clone)]
enum Binding {
    Value(Value),
    Callback(Rc<dyn Fn() -> Value>),
}

impl Binding {
    fn get(&self) -> Value {
        match self {
            Binding::Value(v) => v.clone(),
            Binding::Callback(cb) => cb(),
        }
    }
}

/// A named set of variables. Each name can be bound once.
#[derive(Clone)]
pub struct VariableSource {
    name: String,
    vars: IndexMap<String, Binding>,
}

impl VariableSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: IndexMap::new(),
        }
    }

    /// A source holding a single variable, named `var: <name>`.
    pub fn single(var_name: &str, value: impl Into<Value>) -> Self {
        let mut source = Self::new(format!("var: {var_name}"));
        source
            .vars
            .insert(var_name.to_string(), Binding::Value(value.into()));
        source
    }

    /// Builds a source from the top-level keys of a JSON object. Any other
    /// JSON value yields an empty source.
    pub fn from_json(name: impl Into<String>, json: serde_json::Value) -> Self {
        let mut source = Self::new(name);
        if let serde_json::Value::Object(map) = json {
            for (key, value) in map {
                source.vars.insert(key, Binding::Value(value.into()));
            }
        }
        source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn check_unique(&self, var_name: &str) -> Result<(), EvalError> {
        if self.vars.contains_key(var_name) {
            return Err(EvalError::Redeclared {
                name: var_name.to_string(),
                source_name: self.name.clone(),
            });
        }
        Ok(())
    }

    pub fn set(&mut self, var_name: impl Into<String>, value: impl Into<Value>) -> Result<(), EvalError> {
        let var_name = var_name.into();
        self.check_unique(&var_name)?;
        self.vars.insert(var_name, Binding::Value(value.into()));
        Ok(())
    }

    /// Binds a variable whose value is produced on every lookup.
    pub fn add_callback<F>(&mut self, var_name: impl Into<String>, callback: F) -> Result<(), EvalError>
    where
        F: Fn() -> Value + 'static,
    {
        let var_name = var_name.into();
        self.check_unique(&var_name)?;
        self.vars.insert(var_name, Binding::Callback(Rc::new(callback)));
        Ok(())
    }

    pub fn contains(&self, var_name: &str) -> bool {
        self.vars.contains_key(var_name)
    }

    pub fn get(&self, var_name: &str) -> Option<Value> {
        self.vars.get(var_name).map(Binding::get)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// One `name: value` line per variable, callbacks evaluated.
    pub fn print_all(&self) -> String {
        self.vars
            .iter()
            .map(|(name, binding)| format!("{name}: {}\n", binding.get()))
            .collect()
    }
}

impl fmt::Debug for VariableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableSource")
            .field("name", &self.name)
            .field("vars", &self.vars.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Clone, Debug, Default)]
pub struct VariableContext {
    sources: Vec<Rc<VariableSource>>,
}

impl VariableContext {
    pub fn new(sources: Vec<VariableSource>) -> Self {
        Self {
            sources: sources.into_iter().map(Rc::new).collect(),
        }
    }

    /// A new context whose lookups try `new_sources` (in order) before
    /// this context's sources.
    pub fn inherit<I>(&self, new_sources: I) -> VariableContext
    where
        I: IntoIterator<Item = Rc<VariableSource>>,
    {
        let mut sources: Vec<_> = new_sources.into_iter().collect();
        sources.extend(self.sources.iter().cloned());
        VariableContext { sources }
    }

    pub fn sources(&self) -> &[Rc<VariableSource>] {
        &self.sources
    }

    /// Resolves `var_name` in the first source that defines it.
    pub fn get(&self, var_name: &str) -> Result<Value, EvalError> {
        self.sources
            .iter()
            .find_map(|source| source.get(var_name))
            .ok_or_else(|| EvalError::UnresolvedVariable {
                name: var_name.to_string(),
                sources: self.sources.iter().map(|s| s.name.clone()).collect(),
            })
    }

    pub fn print_all(&self) -> String {
        self.sources
            .iter()
            .map(|src| {
                format!(
                    "Source['{}']:\n  {}",
                    src.name,
                    src.print_all().replace('\n', "\n  ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<VariableSource> for VariableContext {
    fn from(source: VariableSource) -> Self {
        VariableContext::new(vec![source])
    }
}
