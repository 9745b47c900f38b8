use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::ast::{BinaryOp, Expr, Literal, LogicOp, ObjectProperty, UnaryOp};
use crate::context::ScriptContext;
use crate::error::ScriptError;
use crate::filters::FilterInvocation;
use crate::output::stringify;
use crate::scope::ScopeChain;
use crate::value::{ScriptFunction, Value};

/// Tree-walking expression evaluator.
///
/// Holds the per-top-level-call step and depth counters; the counters use
/// interior mutability so evaluation can recurse through `&self` (filters
/// re-enter the evaluator for arrow-function arguments).
pub struct Evaluator<'c> {
    ctx: &'c ScriptContext,
    steps: Cell<usize>,
    depth: Cell<usize>,
    // mutable through &self: partial rendering swaps the directory in and
    // out around the nested render while sharing the step budget
    page_dir: RefCell<String>,
}

impl<'c> Evaluator<'c> {
    pub fn new(ctx: &'c ScriptContext) -> Self {
        Evaluator {
            ctx,
            steps: Cell::new(0),
            depth: Cell::new(0),
            page_dir: RefCell::new(String::new()),
        }
    }

    pub fn with_page_dir(self, dir: impl Into<String>) -> Self {
        *self.page_dir.borrow_mut() = dir.into();
        self
    }

    pub fn ctx(&self) -> &'c ScriptContext {
        self.ctx
    }

    pub fn page_dir(&self) -> String {
        self.page_dir.borrow().clone()
    }

    /// Swap the current page directory, returning the previous one so the
    /// caller can restore it after a nested render.
    pub(crate) fn swap_page_dir(&self, dir: String) -> String {
        self.page_dir.replace(dir)
    }

    /// Reset the step budget. Called once per top-level render/evaluate
    /// call, never per expression.
    pub fn reset_budget(&self) {
        self.steps.set(0);
    }

    fn tick(&self) -> Result<(), ScriptError> {
        let steps = self.steps.get() + 1;
        self.steps.set(steps);
        let budget = self.ctx.config().max_steps;
        if steps > budget {
            return Err(ScriptError::BudgetExceeded { steps: budget });
        }
        Ok(())
    }

    pub fn eval(&self, expr: &Expr, scope: &ScopeChain) -> Result<Value, ScriptError> {
        self.tick()?;

        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Null => Value::Null,
                Literal::Boolean(b) => Value::Bool(*b),
                Literal::Integer(n) => Value::Int(*n),
                Literal::Float(n) => Value::Float(*n),
                Literal::String(s) => Value::Str(s.clone()),
            }),

            // unknown identifiers resolve to null so templates can probe
            // optional bindings with `??` instead of faulting
            Expr::Identifier(name) => Ok(scope.lookup(name).unwrap_or(Value::Null)),

            Expr::TemplateLiteral { parts, exprs } => {
                let mut out = String::new();
                for (i, part) in parts.iter().enumerate() {
                    out.push_str(part);
                    if let Some(expr) = exprs.get(i) {
                        let value = self.eval(expr, scope)?;
                        out.push_str(&stringify(&value));
                    }
                }
                Ok(Value::Str(out))
            }

            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                binary_op(*op, &left, &right)
            }

            Expr::Logical { op, left, right } => {
                let left_val = self.eval(left, scope)?;
                match op {
                    LogicOp::And => {
                        if left_val.is_truthy() {
                            self.eval(right, scope)
                        } else {
                            Ok(left_val)
                        }
                    }
                    LogicOp::Or => {
                        if left_val.is_truthy() {
                            Ok(left_val)
                        } else {
                            self.eval(right, scope)
                        }
                    }
                    // broadened coalescing: any falsy left takes the fallback
                    LogicOp::Coalesce => {
                        if left_val.is_truthy() {
                            Ok(left_val)
                        } else {
                            self.eval(right, scope)
                        }
                    }
                }
            }

            Expr::Unary { op, expr } => {
                let value = self.eval(expr, scope)?;
                unary_op(*op, &value)
            }

            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }

            Expr::Member {
                object,
                property,
                computed,
            } => {
                let target = self.eval(object, scope)?;
                if *computed {
                    let key = self.eval(property, scope)?;
                    self.resolve_index(&target, &key)
                } else {
                    let name = property_name(property)?;
                    self.resolve_member(&target, name)
                }
            }

            Expr::Call { callee, args } => self.eval_call(callee, args, scope),

            Expr::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    match element {
                        Expr::Spread(inner) => match self.eval(inner, scope)? {
                            Value::Array(spread) => items.extend(spread),
                            other => {
                                return Err(ScriptError::Evaluation(format!(
                                    "cannot spread {} into an array",
                                    other.type_name()
                                )));
                            }
                        },
                        _ => items.push(self.eval(element, scope)?),
                    }
                }
                Ok(Value::Array(items))
            }

            Expr::Object(properties) => {
                let mut map = HashMap::new();
                for property in properties {
                    match property {
                        ObjectProperty::Pair { key, value, .. } => {
                            map.insert(key.clone(), self.eval(value, scope)?);
                        }
                        ObjectProperty::Spread(inner) => match self.eval(inner, scope)? {
                            Value::Map(spread) => map.extend(spread),
                            other => {
                                return Err(ScriptError::Evaluation(format!(
                                    "cannot spread {} into an object",
                                    other.type_name()
                                )));
                            }
                        },
                    }
                }
                Ok(Value::Map(map))
            }

            Expr::Spread(_) => Err(ScriptError::Evaluation(
                "spread is only valid inside arrays, objects and call arguments".to_string(),
            )),

            Expr::ArrowFunction { params, body } => {
                Ok(Value::Function(Arc::new(ScriptFunction {
                    params: params.clone(),
                    body: (**body).clone(),
                    env: scope.clone(),
                })))
            }

            Expr::Assignment { target, value } => {
                let value = self.eval(value, scope)?;
                self.assign(target, value.clone(), scope)?;
                Ok(value)
            }

            Expr::VariableDeclaration { declarations, .. } => {
                for (name, init) in declarations {
                    let value = match init {
                        Some(expr) => self.eval(expr, scope)?,
                        None => Value::Null,
                    };
                    scope.declare(name, value);
                }
                Ok(Value::Null)
            }
        }
    }

    /// Member/index resolution, in documented order: key-value mappings
    /// first (missing key yields null), then sequences by integral index
    /// (out of range is an error), then host-object named properties, then
    /// host-object indexers.
    pub fn resolve_member(&self, target: &Value, name: &str) -> Result<Value, ScriptError> {
        match target {
            Value::Map(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
            Value::Object(obj) => match obj.get_property(name) {
                Some(value) => Ok(value),
                None => match obj.index(&Value::str(name)) {
                    Some(value) => Ok(value),
                    None => Err(ScriptError::Evaluation(format!(
                        "'{}' not found on {}",
                        name,
                        obj.type_name()
                    ))),
                },
            },
            // nil-propagation: member access on null stays null so chained
            // probes compose with `??`
            Value::Null => Ok(Value::Null),
            other => Err(ScriptError::Evaluation(format!(
                "cannot access member '{}' on {}",
                name,
                other.type_name()
            ))),
        }
    }

    pub fn resolve_index(&self, target: &Value, key: &Value) -> Result<Value, ScriptError> {
        match (target, key) {
            (Value::Map(map), key) => {
                let name = match key {
                    Value::Str(s) => s.clone(),
                    other => stringify(other),
                };
                Ok(map.get(&name).cloned().unwrap_or(Value::Null))
            }
            (Value::Array(items), Value::Int(n)) => {
                let index = if *n < 0 {
                    let back = n.unsigned_abs() as usize;
                    if back > items.len() {
                        return Err(ScriptError::Evaluation(format!(
                            "index {} out of range for array of {}",
                            n,
                            items.len()
                        )));
                    }
                    items.len() - back
                } else {
                    *n as usize
                };
                items.get(index).cloned().ok_or_else(|| {
                    ScriptError::Evaluation(format!(
                        "index {} out of range for array of {}",
                        n,
                        items.len()
                    ))
                })
            }
            (Value::Array(_), key) => Err(ScriptError::Argument(format!(
                "array index must be an integer, found {}",
                key.type_name()
            ))),
            (Value::Object(obj), key) => {
                if let Value::Str(name) = key {
                    if let Some(value) = obj.get_property(name) {
                        return Ok(value);
                    }
                }
                obj.index(key).ok_or_else(|| {
                    ScriptError::Evaluation(format!(
                        "index {} not found on {}",
                        stringify(key),
                        obj.type_name()
                    ))
                })
            }
            (Value::Null, _) => Ok(Value::Null),
            (other, _) => Err(ScriptError::Evaluation(format!(
                "cannot index into {}",
                other.type_name()
            ))),
        }
    }

    fn eval_call(
        &self,
        callee: &Expr,
        args: &[Expr],
        scope: &ScopeChain,
    ) -> Result<Value, ScriptError> {
        match callee {
            Expr::Identifier(name) => {
                let args = self.eval_args(args, scope)?;
                match scope.lookup(name) {
                    Some(value @ Value::Function(_)) => self.call_value(&value, args),
                    Some(other) => Err(ScriptError::Evaluation(format!(
                        "'{}' is a {}, not callable",
                        name,
                        other.type_name()
                    ))),
                    None => self.apply_filter(name, args, scope),
                }
            }
            // method-call syntax: instance member first, then filter
            // fallback with the receiver prepended
            Expr::Member {
                object,
                property,
                computed: false,
            } => {
                let receiver = self.eval(object, scope)?;
                let name = property_name(property)?;
                let args = self.eval_args(args, scope)?;

                let method = match &receiver {
                    Value::Map(map) => map.get(name).cloned(),
                    Value::Object(obj) => obj.get_property(name),
                    _ => None,
                };
                if let Some(method @ Value::Function(_)) = method {
                    return self.call_value(&method, args);
                }

                let mut filter_args = Vec::with_capacity(args.len() + 1);
                filter_args.push(receiver);
                filter_args.extend(args);
                self.apply_filter(name, filter_args, scope)
            }
            _ => {
                let target = self.eval(callee, scope)?;
                let args = self.eval_args(args, scope)?;
                self.call_value(&target, args)
            }
        }
    }

    /// Evaluate call arguments, expanding `...spread` elements in place.
    pub(crate) fn eval_args(&self, args: &[Expr], scope: &ScopeChain) -> Result<Vec<Value>, ScriptError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Expr::Spread(inner) => match self.eval(inner, scope)? {
                    Value::Array(items) => values.extend(items),
                    other => {
                        return Err(ScriptError::Argument(format!(
                            "cannot spread {} into arguments",
                            other.type_name()
                        )));
                    }
                },
                _ => values.push(self.eval(arg, scope)?),
            }
        }
        Ok(values)
    }

    /// Invoke a callable value.
    pub fn call_value(&self, callee: &Value, args: Vec<Value>) -> Result<Value, ScriptError> {
        match callee {
            Value::Function(func) => self.call_function(func, args),
            other => Err(ScriptError::Evaluation(format!(
                "{} is not callable",
                other.type_name()
            ))),
        }
    }

    /// Invoke an arrow-function closure with the given arguments. Missing
    /// arguments bind to null; extras are ignored.
    pub fn call_function(
        &self,
        func: &ScriptFunction,
        args: Vec<Value>,
    ) -> Result<Value, ScriptError> {
        let depth = self.depth.get() + 1;
        let limit = self.ctx.config().max_call_depth;
        if depth > limit {
            return Err(ScriptError::StackOverflow { depth: limit });
        }
        self.depth.set(depth);

        let scope = func.env.child();
        let mut args = args.into_iter();
        for param in &func.params {
            scope.declare(param, args.next().unwrap_or(Value::Null));
        }
        let result = self.eval(&func.body, &scope);

        self.depth.set(self.depth.get() - 1);
        result
    }

    /// Dispatch a registered filter by name and argument count. The piped
    /// value, when present, is already the first argument.
    pub fn apply_filter(
        &self,
        name: &str,
        args: Vec<Value>,
        scope: &ScopeChain,
    ) -> Result<Value, ScriptError> {
        let Some((func, host)) = self.ctx.filters().resolve(name, args.len()) else {
            if self.ctx.filters().contains(name) {
                return Err(ScriptError::Argument(format!(
                    "filter '{}' does not accept {} arguments",
                    name,
                    args.len()
                )));
            }
            return Err(ScriptError::Evaluation(format!(
                "unknown filter or function '{}'",
                name
            )));
        };
        let invocation = FilterInvocation {
            evaluator: self,
            scope: scope.clone(),
            page_dir: self.page_dir(),
        };
        match func(&invocation, args) {
            Err(err) if host => Err(err.in_filter(name)),
            other => other,
        }
    }

    /// Evaluate an assignment target and store `value` into it.
    fn assign(
        &self,
        target: &Expr,
        value: Value,
        scope: &ScopeChain,
    ) -> Result<(), ScriptError> {
        match target {
            Expr::Identifier(name) => {
                scope.assign(name, value);
                Ok(())
            }
            Expr::Member { .. } => {
                let (root, path) = self.member_path(target, scope)?;
                let mut current = scope.lookup(&root).ok_or_else(|| {
                    ScriptError::Evaluation(format!("unknown binding '{}'", root))
                })?;
                write_path(&mut current, &path, value)?;
                scope.assign(&root, current);
                Ok(())
            }
            _ => Err(ScriptError::Evaluation(
                "invalid assignment target".to_string(),
            )),
        }
    }

    /// Flatten a member-expression chain into its root identifier and the
    /// ordered path of keys leading to the assigned slot.
    fn member_path(
        &self,
        expr: &Expr,
        scope: &ScopeChain,
    ) -> Result<(String, Vec<PathSegment>), ScriptError> {
        match expr {
            Expr::Identifier(name) => Ok((name.clone(), Vec::new())),
            Expr::Member {
                object,
                property,
                computed,
            } => {
                let (root, mut path) = self.member_path(object, scope)?;
                if *computed {
                    match self.eval(property, scope)? {
                        Value::Int(n) => path.push(PathSegment::Index(n)),
                        Value::Str(s) => path.push(PathSegment::Key(s)),
                        other => {
                            return Err(ScriptError::Argument(format!(
                                "invalid assignment key of type {}",
                                other.type_name()
                            )));
                        }
                    }
                } else {
                    path.push(PathSegment::Key(property_name(property)?.to_string()));
                }
                Ok((root, path))
            }
            _ => Err(ScriptError::Evaluation(
                "assignment target must be rooted in a variable".to_string(),
            )),
        }
    }
}

enum PathSegment {
    Key(String),
    Index(i64),
}

fn write_path(current: &mut Value, path: &[PathSegment], value: Value) -> Result<(), ScriptError> {
    let Some(segment) = path.first() else {
        *current = value;
        return Ok(());
    };
    let rest = &path[1..];

    match (current, segment) {
        (Value::Map(map), PathSegment::Key(key)) => {
            if rest.is_empty() {
                map.insert(key.clone(), value);
                return Ok(());
            }
            let child = map.get_mut(key).ok_or_else(|| {
                ScriptError::Evaluation(format!("key '{}' not found", key))
            })?;
            write_path(child, rest, value)
        }
        (Value::Map(map), PathSegment::Index(n)) => {
            let key = n.to_string();
            if rest.is_empty() {
                map.insert(key, value);
                return Ok(());
            }
            let child = map.get_mut(&key).ok_or_else(|| {
                ScriptError::Evaluation(format!("key '{}' not found", key))
            })?;
            write_path(child, rest, value)
        }
        (Value::Array(items), PathSegment::Index(n)) => {
            let len = items.len();
            let index = if *n < 0 {
                let back = n.unsigned_abs() as usize;
                len.checked_sub(back)
            } else {
                Some(*n as usize)
            };
            let slot = index.and_then(|i| items.get_mut(i)).ok_or_else(|| {
                ScriptError::Evaluation(format!("index {} out of range for array of {}", n, len))
            })?;
            write_path(slot, rest, value)
        }
        (other, _) => Err(ScriptError::Evaluation(format!(
            "cannot assign through {}",
            other.type_name()
        ))),
    }
}

fn property_name(property: &Expr) -> Result<&str, ScriptError> {
    match property {
        Expr::Identifier(name) => Ok(name),
        Expr::Literal(Literal::String(s)) => Ok(s),
        other => Err(ScriptError::Evaluation(format!(
            "invalid member name: {:?}",
            other
        ))),
    }
}

/// Apply an eager binary operator with numeric promotion: int∘int stays
/// int, any float operand promotes the result to float, and mixed operands
/// go through decimal arithmetic so results like `0.1 + 0.2` stay exact.
pub(crate) fn binary_op(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ScriptError> {
    use BinaryOp::*;

    match op {
        Add => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Ok(Value::Str(format!("{}{}", stringify(left), stringify(right))))
            }
            _ => numeric_op(op, left, right, |a, b| a + b),
        },
        Subtract => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
            _ => numeric_op(op, left, right, |a, b| a - b),
        },
        Multiply => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
            _ => numeric_op(op, left, right, |a, b| a * b),
        },
        Divide => match (left, right) {
            (Value::Int(_), Value::Int(0)) => {
                Err(ScriptError::Evaluation("division by zero".to_string()))
            }
            // exact integer quotient stays integral: 4/2 == 2, 1/2 == 0.5
            (Value::Int(a), Value::Int(b)) => {
                if a % b == 0 {
                    Ok(Value::Int(a / b))
                } else {
                    numeric_op(op, left, right, |a, b| a / b)
                }
            }
            _ => numeric_op(op, left, right, |a, b| a / b),
        },
        Modulo => match (left, right) {
            (Value::Int(_), Value::Int(0)) => {
                Err(ScriptError::Evaluation("modulo by zero".to_string()))
            }
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
            _ => numeric_op(op, left, right, |a, b| a % b),
        },

        BitAnd => int_op(op, left, right, |a, b| a & b),
        BitOr => int_op(op, left, right, |a, b| a | b),
        BitXor => int_op(op, left, right, |a, b| a ^ b),
        ShiftLeft => int_op(op, left, right, |a, b| a.wrapping_shl(b as u32)),
        ShiftRight => int_op(op, left, right, |a, b| a.wrapping_shr(b as u32)),

        Equal => Ok(Value::Bool(left.loose_eq(right))),
        NotEqual => Ok(Value::Bool(!left.loose_eq(right))),

        LessThan => compare(op, left, right, |ord| ord == std::cmp::Ordering::Less),
        GreaterThan => compare(op, left, right, |ord| ord == std::cmp::Ordering::Greater),
        LessEqual => compare(op, left, right, |ord| ord != std::cmp::Ordering::Greater),
        GreaterEqual => compare(op, left, right, |ord| ord != std::cmp::Ordering::Less),
    }
}

pub(crate) fn unary_op(op: UnaryOp, value: &Value) -> Result<Value, ScriptError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Minus => match value {
            Value::Int(n) => Ok(Value::Int(-n)),
            Value::Float(n) => Ok(Value::Float(-n)),
            other => Err(ScriptError::Evaluation(format!(
                "cannot negate {}",
                other.type_name()
            ))),
        },
        UnaryOp::Plus => match value {
            Value::Int(_) | Value::Float(_) => Ok(value.clone()),
            other => Err(ScriptError::Evaluation(format!(
                "cannot apply unary '+' to {}",
                other.type_name()
            ))),
        },
    }
}

/// Float-producing numeric operation. Both operands go through decimal
/// arithmetic when representable; operands outside decimal range fall back
/// to plain f64 math.
fn numeric_op(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Value, ScriptError> {
    let (Some(a), Some(b)) = (left.as_float(), right.as_float()) else {
        return Err(type_error(op, left, right));
    };

    if let (Some(ad), Some(bd)) = (Decimal::from_f64(a), Decimal::from_f64(b)) {
        let exact = match op {
            BinaryOp::Add => Some(ad + bd),
            BinaryOp::Subtract => Some(ad - bd),
            BinaryOp::Multiply => Some(ad * bd),
            BinaryOp::Divide if !bd.is_zero() => ad.checked_div(bd),
            BinaryOp::Modulo if !bd.is_zero() => Some(ad % bd),
            _ => None,
        };
        if let Some(rd) = exact
            && let Some(r) = rd.to_f64()
        {
            return Ok(Value::Float(r));
        }
    }
    Ok(Value::Float(f(a, b)))
}

fn int_op(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    f: impl Fn(i64, i64) -> i64,
) -> Result<Value, ScriptError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(f(*a, *b))),
        _ => Err(type_error(op, left, right)),
    }
}

fn compare(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    f: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Value, ScriptError> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    match ordering {
        Some(ord) => Ok(Value::Bool(f(ord))),
        None => Err(type_error(op, left, right)),
    }
}

fn type_error(op: BinaryOp, left: &Value, right: &Value) -> ScriptError {
    ScriptError::Evaluation(format!(
        "invalid operands for {:?}: {} and {}",
        op,
        left.type_name(),
        right.type_name()
    ))
}
