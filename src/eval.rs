use crate::ast::*;
use crate::error::EvalError;
use crate::scope::VariableContext;
use crate::value::Value;

/// Bridge between the evaluator and host values.
///
/// Calls and member lookups are never performed by the evaluator itself;
/// they go through this trait so hosts can expose their own object models
/// (and so the template generator can make named templates callable).
pub trait ModelHandler {
    /// Invokes `method`. `receiver` is the object the method was looked up
    /// on when the call was written as `obj.method(...)`.
    fn method_call(
        &self,
        method: &Value,
        args: Vec<Value>,
        receiver: Option<Value>,
        vars: &VariableContext,
    ) -> Result<Value, EvalError>;

    /// Looks up `member` on `object`. `is_property` is true for `obj.name`
    /// and false for `obj[expr]`. A missing member is `Ok(None)`.
    fn member_access(
        &self,
        object: &Value,
        member: &Value,
        is_property: bool,
    ) -> Result<Option<Value>, EvalError>;
}

/// Handles the built-in [`Value`] kinds.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValueModelHandler;

impl ModelHandler for ValueModelHandler {
    fn method_call(
        &self,
        method: &Value,
        args: Vec<Value>,
        receiver: Option<Value>,
        _vars: &VariableContext,
    ) -> Result<Value, EvalError> {
        match method {
            Value::Function(func) => func.call(receiver.as_ref(), &args),
            other => Err(EvalError::NotCallable {
                value: format!("{other} ({})", other.kind()),
            }),
        }
    }

    fn member_access(
        &self,
        object: &Value,
        member: &Value,
        is_property: bool,
    ) -> Result<Option<Value>, EvalError> {
        let is_length = is_property && member.as_str() == Some("length");
        Ok(match object {
            Value::Map(map) => map.get(member.to_string().as_str()).cloned(),
            Value::Array(items) if is_length => Some(Value::from(items.len())),
            Value::Array(items) => index_of(member, items.len()).and_then(|i| items.get(i)).cloned(),
            Value::String(s) if is_length => Some(Value::from(s.chars().count())),
            Value::String(s) => index_of(member, s.chars().count())
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string())),
            Value::Object(obj) => obj.member(&member.to_string()),
            other => {
                return Err(EvalError::NotAnObject {
                    member: member.to_string(),
                    kind: other.kind(),
                })
            }
        })
    }
}

fn index_of(member: &Value, len: usize) -> Option<usize> {
    match member {
        Value::Int(i) => usize::try_from(*i).ok().filter(|i| *i < len),
        _ => None,
    }
}

/// Tree-walking expression evaluator.
pub struct Evaluator<'h> {
    handler: &'h dyn ModelHandler,
}

impl<'h> Evaluator<'h> {
    pub fn new(handler: &'h dyn ModelHandler) -> Self {
        Self { handler }
    }

    pub fn evaluate(&self, expr: &Expr, vars: &VariableContext) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::String(s) => Value::String(s.clone()),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
            }),
            Expr::Identifier(name) => match name.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" => Ok(Value::Null),
                _ => vars.get(name),
            },
            Expr::Unary(op, operand) => {
                let value = self.evaluate(operand, vars)?;
                unary(*op, value)
            }
            Expr::Binary(op, left, right) => {
                // Both sides are always evaluated, including for && and ||.
                let left = self.evaluate(left, vars)?;
                let right = self.evaluate(right, vars)?;
                binary(*op, left, right)
            }
            Expr::Parenthesized(inner) => self.evaluate(inner, vars),
            Expr::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                if self.evaluate(condition, vars)?.is_truthy() {
                    self.evaluate(when_true, vars)
                } else {
                    self.evaluate(when_false, vars)
                }
            }
            Expr::Call { callee, args } => {
                let (method, receiver) = match callee.as_ref() {
                    Expr::PropertyAccess(object, name) => {
                        let receiver = self.evaluate(object, vars)?;
                        let method = self
                            .member(&receiver, &Value::String(name.clone()), true)
                            .map_err(|e| annotate(e, callee))?;
                        (method, Some(receiver))
                    }
                    other => (self.evaluate(other, vars)?, None),
                };
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg, vars))
                    .collect::<Result<Vec<_>, _>>()?;
                self.handler
                    .method_call(&method, args, receiver, vars)
                    .map_err(|e| annotate(e, expr))
            }
            Expr::PropertyAccess(object, name) => {
                let object = self.evaluate(object, vars)?;
                self.member(&object, &Value::String(name.clone()), true)
                    .map_err(|e| annotate(e, expr))
            }
            Expr::ElementAccess(object, index) => {
                let object = self.evaluate(object, vars)?;
                let index = self.evaluate(index, vars)?;
                self.member(&object, &index, false)
                    .map_err(|e| annotate(e, expr))
            }
        }
    }

    fn member(&self, object: &Value, member: &Value, is_property: bool) -> Result<Value, EvalError> {
        Ok(self
            .handler
            .member_access(object, member, is_property)?
            .unwrap_or(Value::Null))
    }
}

/// Attaches the printed expression to call/member failures raised directly
/// by the handler; everything else already carries its own context.
fn annotate(err: EvalError, expr: &Expr) -> EvalError {
    match err {
        EvalError::NotCallable { .. } | EvalError::NotAnObject { .. } => EvalError::At {
            expr: expr.to_string(),
            source: Box::new(err),
        },
        other => other,
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Plus, v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
        (UnaryOp::Minus, Value::Int(i)) => Ok(i
            .checked_neg()
            .map_or(Value::Float(-(i as f64)), Value::Int)),
        (UnaryOp::Minus, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::BitNot, Value::Int(i)) => Ok(Value::Int(!i)),
        (_, v) => Err(EvalError::UnaryOperand { op, kind: v.kind() }),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    let unsupported = || EvalError::BinaryOperands {
        op,
        left: left.kind(),
        right: right.kind(),
    };

    match op {
        BinaryOp::And => return Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => return Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
        BinaryOp::Eq => return Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => return Ok(Value::Bool(left != right)),
        BinaryOp::Add => {
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                return Ok(Value::String(format!("{left}{right}")));
            }
        }
        _ => {}
    }

    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => int_binary(op, *a, *b).ok_or_else(unsupported)?,
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return Err(unsupported());
            };
            float_binary(op, a, b).ok_or_else(unsupported)
        }
        (Value::String(a), Value::String(b)) => {
            compare(op, a.cmp(b)).map(Value::Bool).ok_or_else(unsupported)
        }
        _ => Err(unsupported()),
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> Option<Result<Value, EvalError>> {
    let (fa, fb) = (a as f64, b as f64);
    let value = match op {
        BinaryOp::Add => a.checked_add(b).map_or(Value::Float(fa + fb), Value::Int),
        BinaryOp::Sub => a.checked_sub(b).map_or(Value::Float(fa - fb), Value::Int),
        BinaryOp::Mul => a.checked_mul(b).map_or(Value::Float(fa * fb), Value::Int),
        BinaryOp::Div => {
            if b == 0 {
                return Some(Err(EvalError::DivisionByZero));
            }
            match a.checked_rem(b) {
                Some(0) => a.checked_div(b).map_or(Value::Float(fa / fb), Value::Int),
                _ => Value::Float(fa / fb),
            }
        }
        BinaryOp::Pow => match u32::try_from(b) {
            Ok(exp) => a.checked_pow(exp).map_or(Value::Float(fa.powf(fb)), Value::Int),
            Err(_) => Value::Float(fa.powf(fb)),
        },
        BinaryOp::Shl => Value::Int(a.checked_shl(u32::try_from(b).ok()?)?),
        BinaryOp::Shr => Value::Int(a.checked_shr(u32::try_from(b).ok()?)?),
        _ => Value::Bool(compare(op, a.cmp(&b))?),
    };
    Some(Ok(value))
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> Option<Value> {
    Some(match op {
        BinaryOp::Add => Value::Float(a + b),
        BinaryOp::Sub => Value::Float(a - b),
        BinaryOp::Mul => Value::Float(a * b),
        BinaryOp::Div => Value::Float(a / b),
        BinaryOp::Pow => Value::Float(a.powf(b)),
        _ => Value::Bool(compare(op, a.partial_cmp(&b)?)?),
    })
}

fn compare(op: BinaryOp, ord: std::cmp::Ordering) -> Option<bool> {
    Some(match op {
        BinaryOp::Lt => ord.is_lt(),
        BinaryOp::LtEq => ord.is_le(),
        BinaryOp::Gt => ord.is_gt(),
        BinaryOp::GtEq => ord.is_ge(),
        _ => return None,
    })
}
