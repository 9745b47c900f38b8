//! The default filter set.
//!
//! Every filter takes its piped value as first argument, so `add` serves
//! both `add(1, 2)` and `1 |> add(2)`. Registration happens once at
//! context build time.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::BinaryOp;
use crate::error::ScriptError;
use crate::evaluator::binary_op;
use crate::filters::{FilterInvocation, FilterRegistry};
use crate::output::{stringify, to_json};
use crate::render::render_partial;
use crate::value::Value;

/// Compiled-regex cache shared by `matches` and `replaceRegex`. `Regex`
/// clones share the compiled program, so handing out clones is cheap.
static REGEX_CACHE: Lazy<Mutex<HashMap<String, Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn compiled(pattern: &str) -> Result<Regex, ScriptError> {
    let mut cache = REGEX_CACHE.lock().expect("poisoned regex cache");
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern)
        .map_err(|e| ScriptError::Argument(format!("invalid pattern '{}': {}", pattern, e)))?;
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

type Native = fn(&FilterInvocation<'_, '_>, Vec<Value>) -> Result<Value, ScriptError>;

fn insert(reg: &mut FilterRegistry, name: &str, arity: usize, func: Native) {
    reg.insert(name, arity, Arc::new(func));
}

pub(crate) fn register_defaults(reg: &mut FilterRegistry) {
    // math
    insert(reg, "add", 2, |_, a| binary_op(BinaryOp::Add, &a[0], &a[1]));
    insert(reg, "sub", 2, |_, a| {
        binary_op(BinaryOp::Subtract, &a[0], &a[1])
    });
    insert(reg, "mul", 2, |_, a| {
        binary_op(BinaryOp::Multiply, &a[0], &a[1])
    });
    insert(reg, "div", 2, |_, a| {
        binary_op(BinaryOp::Divide, &a[0], &a[1])
    });
    insert(reg, "mod", 2, |_, a| {
        binary_op(BinaryOp::Modulo, &a[0], &a[1])
    });
    insert(reg, "min", 2, |_, a| pick(&a[0], &a[1], Ordering::Less));
    insert(reg, "max", 2, |_, a| pick(&a[0], &a[1], Ordering::Greater));
    insert(reg, "floor", 1, |_, a| round_toward("floor", &a[0], f64::floor));
    insert(reg, "ceil", 1, |_, a| round_toward("ceil", &a[0], f64::ceil));
    insert(reg, "square", 1, |_, a| {
        binary_op(BinaryOp::Multiply, &a[0], &a[0])
    });
    insert(reg, "pow", 2, |_, a| pow(&a[0], &a[1]));

    // strings
    insert(reg, "upper", 1, |_, a| {
        Ok(Value::Str(need_str(&a[0], "upper")?.to_uppercase()))
    });
    insert(reg, "lower", 1, |_, a| {
        Ok(Value::Str(need_str(&a[0], "lower")?.to_lowercase()))
    });
    insert(reg, "trim", 1, |_, a| {
        Ok(Value::Str(need_str(&a[0], "trim")?.trim().to_string()))
    });
    insert(reg, "substring", 2, |_, a| {
        let s = need_str(&a[0], "substring")?;
        let start = need_index(&a[1], "substring")?;
        Ok(Value::Str(s.chars().skip(start).collect()))
    });
    insert(reg, "substring", 3, |_, a| {
        let s = need_str(&a[0], "substring")?;
        let start = need_index(&a[1], "substring")?;
        let len = need_index(&a[2], "substring")?;
        Ok(Value::Str(s.chars().skip(start).take(len).collect()))
    });
    insert(reg, "replace", 3, |_, a| {
        let s = need_str(&a[0], "replace")?;
        let from = need_str(&a[1], "replace")?;
        let to = need_str(&a[2], "replace")?;
        Ok(Value::Str(s.replace(from, to)))
    });
    insert(reg, "padLeft", 2, |_, a| pad(&a[0], &a[1], " ", true));
    insert(reg, "padLeft", 3, |_, a| {
        pad(&a[0], &a[1], need_str(&a[2], "padLeft")?, true)
    });
    insert(reg, "padRight", 2, |_, a| pad(&a[0], &a[1], " ", false));
    insert(reg, "padRight", 3, |_, a| {
        pad(&a[0], &a[1], need_str(&a[2], "padRight")?, false)
    });
    insert(reg, "matches", 2, |_, a| {
        let s = need_str(&a[0], "matches")?;
        let re = compiled(need_str(&a[1], "matches")?)?;
        Ok(Value::Bool(re.is_match(s)))
    });
    insert(reg, "replaceRegex", 3, |_, a| {
        let s = need_str(&a[0], "replaceRegex")?;
        let re = compiled(need_str(&a[1], "replaceRegex")?)?;
        let to = need_str(&a[2], "replaceRegex")?;
        Ok(Value::Str(re.replace_all(s, to).into_owned()))
    });
    insert(reg, "split", 2, |_, a| {
        let s = need_str(&a[0], "split")?;
        let sep = need_str(&a[1], "split")?;
        Ok(Value::Array(
            s.split(sep).map(|p| Value::Str(p.to_string())).collect(),
        ))
    });
    insert(reg, "join", 1, |_, a| join(&a[0], ","));
    insert(reg, "join", 2, |_, a| join(&a[0], need_str(&a[1], "join")?));
    insert(reg, "appendTo", 2, |inv, a| {
        let name = need_str(&a[1], "appendTo")?;
        let mut buf = match inv.scope.lookup(name) {
            Some(Value::Str(s)) => s,
            _ => String::new(),
        };
        buf.push_str(&stringify(&a[0]));
        bind(inv, name, Value::Str(buf));
        Ok(Value::Null)
    });

    // collections
    insert(reg, "count", 1, |_, a| {
        let n = match &a[0] {
            Value::Null => 0,
            Value::Str(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            Value::Map(map) => map.len(),
            other => {
                return Err(ScriptError::Argument(format!(
                    "count: cannot count {}",
                    other.type_name()
                )));
            }
        };
        Ok(Value::Int(n as i64))
    });
    insert(reg, "first", 1, |_, a| {
        Ok(need_array(&a[0], "first")?.first().cloned().unwrap_or(Value::Null))
    });
    insert(reg, "last", 1, |_, a| {
        Ok(need_array(&a[0], "last")?.last().cloned().unwrap_or(Value::Null))
    });
    insert(reg, "reverse", 1, |_, a| match &a[0] {
        Value::Str(s) => Ok(Value::Str(s.chars().rev().collect())),
        other => {
            let mut items = need_array(other, "reverse")?.to_vec();
            items.reverse();
            Ok(Value::Array(items))
        }
    });
    insert(reg, "sort", 1, |_, a| {
        let mut items = need_array(&a[0], "sort")?.to_vec();
        items.sort_by(compare_values);
        Ok(Value::Array(items))
    });
    insert(reg, "take", 2, |_, a| {
        let items = need_array(&a[0], "take")?;
        let n = need_index(&a[1], "take")?;
        Ok(Value::Array(items.iter().take(n).cloned().collect()))
    });
    insert(reg, "skip", 2, |_, a| {
        let items = need_array(&a[0], "skip")?;
        let n = need_index(&a[1], "skip")?;
        Ok(Value::Array(items.iter().skip(n).cloned().collect()))
    });
    insert(reg, "map", 2, |inv, a| {
        let items = need_array(&a[0], "map")?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(inv.call(&a[1], vec![item.clone()])?);
        }
        Ok(Value::Array(out))
    });
    insert(reg, "where", 2, |inv, a| {
        let items = need_array(&a[0], "where")?;
        let mut out = Vec::new();
        for item in items {
            if inv.call(&a[1], vec![item.clone()])?.is_truthy() {
                out.push(item.clone());
            }
        }
        Ok(Value::Array(out))
    });
    insert(reg, "sum", 1, |_, a| fold_sum(&a[0], "sum"));
    insert(reg, "avg", 1, |_, a| {
        let items = need_array(&a[0], "avg")?;
        if items.is_empty() {
            return Err(ScriptError::Argument("avg: empty array".to_string()));
        }
        let total = fold_sum(&a[0], "avg")?;
        binary_op(BinaryOp::Divide, &total, &Value::Int(items.len() as i64))
    });
    insert(reg, "contains", 2, |_, a| {
        let found = match (&a[0], &a[1]) {
            (Value::Str(s), Value::Str(needle)) => s.contains(needle.as_str()),
            (Value::Array(items), needle) => items.iter().any(|v| v.loose_eq(needle)),
            (Value::Map(map), Value::Str(key)) => map.contains_key(key),
            (target, _) => {
                return Err(ScriptError::Argument(format!(
                    "contains: cannot search {}",
                    target.type_name()
                )));
            }
        };
        Ok(Value::Bool(found))
    });
    insert(reg, "range", 1, |_, a| {
        let end = need_i64(&a[0], "range")?;
        Ok(Value::Array((0..end).map(Value::Int).collect()))
    });
    insert(reg, "range", 2, |_, a| {
        let start = need_i64(&a[0], "range")?;
        let end = need_i64(&a[1], "range")?;
        Ok(Value::Array((start..end).map(Value::Int).collect()))
    });

    // logic / value
    insert(reg, "default", 2, |_, a| {
        Ok(if a[0].is_null() {
            a[1].clone()
        } else {
            a[0].clone()
        })
    });
    insert(reg, "otherwise", 2, |_, a| {
        Ok(if a[0].is_truthy() {
            a[0].clone()
        } else {
            a[1].clone()
        })
    });
    insert(reg, "isNull", 1, |_, a| Ok(Value::Bool(a[0].is_null())));
    insert(reg, "isEmpty", 1, |_, a| {
        let empty = match &a[0] {
            Value::Null => true,
            Value::Str(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            _ => false,
        };
        Ok(Value::Bool(empty))
    });
    insert(reg, "typeName", 1, |_, a| {
        Ok(Value::Str(a[0].type_name().to_string()))
    });
    insert(reg, "json", 1, |_, a| {
        Ok(Value::Str(to_json(&a[0]).to_string()))
    });

    // scope side-effects: bind the piped value into a named variable and
    // render nothing
    insert(reg, "assignTo", 2, assign_to);
    insert(reg, "to", 2, assign_to);

    // error views over the captured-exception binding
    insert(reg, "lastError", 0, |inv, _| Ok(last_error(inv)));
    insert(reg, "ifError", 1, |inv, a| {
        Ok(if last_error(inv).is_null() {
            Value::Null
        } else {
            a[0].clone()
        })
    });

    // partials
    insert(reg, "partial", 1, |inv, a| {
        let name = need_str(&a[0], "partial")?;
        render_partial(inv, name, None)
    });
    insert(reg, "partial", 2, |inv, a| {
        let name = need_str(&a[0], "partial")?;
        let Value::Map(args) = &a[1] else {
            return Err(ScriptError::Argument(
                "partial: arguments must be a map".to_string(),
            ));
        };
        render_partial(inv, name, Some(args.clone()))
    });
}

fn assign_to(inv: &FilterInvocation<'_, '_>, a: Vec<Value>) -> Result<Value, ScriptError> {
    let name = need_str(&a[1], "assignTo")?;
    bind(inv, name, a[0].clone());
    Ok(Value::Null)
}

/// Scope write used by the side-effecting filters: update the layer that
/// already holds the name, or bind render-locally. Unlike the `=`
/// operator this never reaches through to the shared context globals.
fn bind(inv: &FilterInvocation<'_, '_>, name: &str, value: Value) {
    if inv.scope.contains(name) {
        inv.scope.assign(name, value);
    } else {
        inv.scope.declare(name, value);
    }
}

fn last_error(inv: &FilterInvocation<'_, '_>) -> Value {
    match &inv.ctx().config().assign_exceptions_to {
        Some(name) => inv.scope.lookup(name).unwrap_or(Value::Null),
        None => Value::Null,
    }
}

fn need_str<'a>(value: &'a Value, filter: &str) -> Result<&'a str, ScriptError> {
    value.as_str().ok_or_else(|| {
        ScriptError::Argument(format!(
            "{}: expected a string, found {}",
            filter,
            value.type_name()
        ))
    })
}

fn need_array<'a>(value: &'a Value, filter: &str) -> Result<&'a [Value], ScriptError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(ScriptError::Argument(format!(
            "{}: expected an array, found {}",
            filter,
            other.type_name()
        ))),
    }
}

fn need_i64(value: &Value, filter: &str) -> Result<i64, ScriptError> {
    value.as_int().ok_or_else(|| {
        ScriptError::Argument(format!(
            "{}: expected an integer, found {}",
            filter,
            value.type_name()
        ))
    })
}

fn need_index(value: &Value, filter: &str) -> Result<usize, ScriptError> {
    let n = need_i64(value, filter)?;
    usize::try_from(n).map_err(|_| {
        ScriptError::Argument(format!("{}: expected a non-negative integer", filter))
    })
}

fn pick(a: &Value, b: &Value, keep: Ordering) -> Result<Value, ScriptError> {
    let (Some(x), Some(y)) = (a.as_float(), b.as_float()) else {
        return Err(ScriptError::Argument(format!(
            "expected numbers, found {} and {}",
            a.type_name(),
            b.type_name()
        )));
    };
    Ok(if x.partial_cmp(&y) == Some(keep) {
        a.clone()
    } else {
        b.clone()
    })
}

fn round_toward(filter: &str, value: &Value, f: fn(f64) -> f64) -> Result<Value, ScriptError> {
    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(n) => Ok(Value::Int(f(*n) as i64)),
        other => Err(ScriptError::Argument(format!(
            "{}: expected a number, found {}",
            filter,
            other.type_name()
        ))),
    }
}

fn pow(base: &Value, exp: &Value) -> Result<Value, ScriptError> {
    match (base, exp) {
        (Value::Int(b), Value::Int(e)) if *e >= 0 && *e <= u32::MAX as i64 => {
            Ok(Value::Int(b.wrapping_pow(*e as u32)))
        }
        _ => {
            let (Some(b), Some(e)) = (base.as_float(), exp.as_float()) else {
                return Err(ScriptError::Argument(format!(
                    "pow: expected numbers, found {} and {}",
                    base.type_name(),
                    exp.type_name()
                )));
            };
            Ok(Value::Float(b.powf(e)))
        }
    }
}

fn pad(value: &Value, width: &Value, fill: &str, left: bool) -> Result<Value, ScriptError> {
    let s = need_str(value, "pad")?;
    let width = need_index(width, "pad")?;
    let fill = fill.chars().next().unwrap_or(' ');
    let len = s.chars().count();
    if len >= width {
        return Ok(Value::Str(s.to_string()));
    }
    let padding: String = std::iter::repeat(fill).take(width - len).collect();
    Ok(Value::Str(if left {
        format!("{}{}", padding, s)
    } else {
        format!("{}{}", s, padding)
    }))
}

fn join(value: &Value, sep: &str) -> Result<Value, ScriptError> {
    let items = need_array(value, "join")?;
    let parts: Vec<String> = items.iter().map(stringify).collect();
    Ok(Value::Str(parts.join(sep)))
}

fn fold_sum(value: &Value, filter: &str) -> Result<Value, ScriptError> {
    let items = need_array(value, filter)?;
    let mut total = Value::Int(0);
    for item in items {
        total = binary_op(BinaryOp::Add, &total, item)?;
    }
    Ok(total)
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}
