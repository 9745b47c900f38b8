use crate::ast::{BinaryOp, DeclarationKind, LogicOp, UnaryOp};

/// Self-evaluating literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// One property of an object literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectProperty {
    /// `key: value` pair; shorthand `{key}` is expanded to
    /// `{key: key}` at parse time with `shorthand` set.
    Pair {
        key: String,
        value: Expr,
        shorthand: bool,
    },
    /// `...expr` spread of another map into the literal
    Spread(Expr),
}

/// Abstract Syntax Tree node representing a parsed expression.
///
/// Nodes are immutable once constructed and equality is structural: two
/// trees parsed from identical text compare equal, which the test suite
/// relies on to compare fresh parses against hand-built trees.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 'hello'
    /// true
    /// ```
    Literal(Literal),

    /// Variable, argument or filter name
    Identifier(String),

    /// Back-tick template literal
    ///
    /// `parts` always has one more element than `exprs`.
    ///
    /// # Example
    /// ```text
    /// `total: ${n * price}`
    /// ```
    TemplateLiteral {
        parts: Vec<String>,
        exprs: Vec<Expr>,
    },

    /// Eager binary operation (arithmetic, bitwise, comparison)
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Short-circuiting logical operation (`&&`, `||`, `??`)
    Logical {
        op: LogicOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Prefix unary operation
    Unary { op: UnaryOp, expr: Box<Expr> },

    /// Ternary conditional (`test ? consequent : alternate`)
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },

    /// Member access, dotted (`a.b`) or computed (`a[b]`)
    ///
    /// For the dotted form `property` is an `Identifier` and `computed`
    /// is false; the name is then looked up literally, not through scope.
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
        computed: bool,
    },

    /// Call expression
    ///
    /// # Examples
    /// ```text
    /// add(1, 2)
    /// items.where(x => x > 1)
    /// ```
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },

    /// Array literal, elements may be `Spread`
    Array(Vec<Expr>),

    /// Object literal
    Object(Vec<ObjectProperty>),

    /// Spread element (`...expr`), valid inside arrays, objects and
    /// call argument lists
    Spread(Box<Expr>),

    /// Arrow function with a single-expression body
    ///
    /// # Examples
    /// ```text
    /// x => x * 2
    /// (a, b) => a + b
    /// ```
    ArrowFunction {
        params: Vec<String>,
        body: Box<Expr>,
    },

    /// Assignment; `target` must be an identifier or member expression.
    /// The assignment is itself an expression whose value is the
    /// assigned value.
    Assignment {
        target: Box<Expr>,
        value: Box<Expr>,
    },

    /// `var`/`let`/`const` declaration with one or more declarators,
    /// evaluated left to right
    VariableDeclaration {
        kind: DeclarationKind,
        declarations: Vec<(String, Option<Expr>)>,
    },
}

impl Expr {
    pub fn int(n: i64) -> Expr {
        Expr::Literal(Literal::Integer(n))
    }

    pub fn float(n: f64) -> Expr {
        Expr::Literal(Literal::Float(n))
    }

    pub fn string(s: impl Into<String>) -> Expr {
        Expr::Literal(Literal::String(s.into()))
    }

    pub fn ident(name: impl Into<String>) -> Expr {
        Expr::Identifier(name.into())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}
