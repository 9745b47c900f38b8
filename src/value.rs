use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::Expr;
use crate::scope::ScopeChain;

/// A host-typed object exposed to scripts.
///
/// Unlike a [`Value::Map`], a typed object has a fixed set of named
/// properties: accessing a missing property is an evaluation error, where a
/// missing map key quietly yields null. Implementors may additionally
/// expose an indexer for `obj[key]` access.
pub trait ScriptObject: Send + Sync {
    /// Runtime type name used in error messages.
    fn type_name(&self) -> &str;

    /// Named property lookup; `None` means the property does not exist.
    fn get_property(&self, name: &str) -> Option<Value>;

    /// Single-argument indexer; `None` means indexing is unsupported or
    /// the key missed.
    fn index(&self, _key: &Value) -> Option<Value> {
        None
    }
}

/// An arrow-function closure: parameter names, a single-expression body,
/// and the scope chain captured at the definition site.
pub struct ScriptFunction {
    pub params: Vec<String>,
    pub body: Expr,
    pub env: ScopeChain,
}

impl fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn({})", self.params.join(", "))
    }
}

/// A runtime value in the sharpscript engine.
///
/// The engine is duck-typed over this closed set of tags; member and index
/// resolution dispatches on the tag rather than on host reflection.
/// Integers and floats are kept distinct so arithmetic can preserve
/// integer results where they are exact.
#[derive(Clone, Default)]
pub enum Value {
    /// Null / undefined / absent
    #[default]
    Null,

    /// Boolean
    Bool(bool),

    /// Integer number
    Int(i64),

    /// Floating-point number
    Float(f64),

    /// UTF-8 string
    Str(String),

    /// Ordered sequence
    Array(Vec<Value>),

    /// Key-value mapping; missing keys resolve to null rather than error
    Map(HashMap<String, Value>),

    /// Host-typed object with named properties and optional indexer
    Object(Arc<dyn ScriptObject>),

    /// Callable arrow-function closure
    Function(Arc<ScriptFunction>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    /// Human-readable type name for error messages.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Object(o) => o.type_name(),
            Value::Function(_) => "function",
        }
    }

    /// Truthiness used by conditions, `&&`/`||` short-circuiting and the
    /// broadened `??` coalescing test: null, false, zero, the empty string
    /// and empty collections are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(arr) => !arr.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Numeric view as float, for mixed arithmetic and comparisons.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Loose equality used by `==`: numeric values compare across the
    /// int/float divide, everything else compares structurally.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({:?})", b),
            Value::Int(n) => write!(f, "Int({:?})", n),
            Value::Float(n) => write!(f, "Float({:?})", n),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Value::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Value::Object(o) => write!(f, "Object({})", o.type_name()),
            Value::Function(func) => write!(f, "Function({:?})", func),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            // identity comparison for host objects and closures
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::Array(items)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(map: HashMap<String, Value>) -> Value {
        Value::Map(map)
    }
}
