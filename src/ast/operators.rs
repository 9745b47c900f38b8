/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    // Arithmetic
    /// Addition or string concatenation (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`)
    Divide,
    /// Modulo (`%`)
    Modulo,

    // Bitwise (integers only)
    /// Bitwise AND (`&`)
    BitAnd,
    /// Bitwise OR (`|`)
    BitOr,
    /// Bitwise XOR (`^`)
    BitXor,
    /// Left shift (`<<`)
    ShiftLeft,
    /// Right shift (`>>`)
    ShiftRight,

    // Comparison
    /// Equal (`==`)
    Equal,
    /// Not equal (`!=`)
    NotEqual,
    /// Less than (`<`)
    LessThan,
    /// Greater than (`>`)
    GreaterThan,
    /// Less than or equal (`<=`)
    LessEqual,
    /// Greater than or equal (`>=`)
    GreaterEqual,
}

/// Short-circuiting logical operators.
///
/// These evaluate their right operand lazily, so they live in their own
/// node kind rather than in [`BinaryOp`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogicOp {
    /// Logical AND (`&&`) — returns the last evaluated operand
    And,
    /// Logical OR (`||`) — returns the last evaluated operand
    Or,
    /// Coalescing (`??`) — returns the right operand when the left is falsy
    /// (null, false, zero, empty string/array/map), a deliberately broader
    /// test than strict null-checking
    Coalesce,
}

/// Prefix unary operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// Logical negation (`!`)
    Not,
    /// Numeric negation (`-`)
    Minus,
    /// Numeric identity (`+`)
    Plus,
}

/// Declaration keyword of a variable statement.
///
/// All three kinds introduce bindings into the innermost scope layer;
/// `const` additionally rejects later reassignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeclarationKind {
    Var,
    Let,
    Const,
}

impl DeclarationKind {
    pub fn keyword(self) -> &'static str {
        match self {
            DeclarationKind::Var => "var",
            DeclarationKind::Let => "let",
            DeclarationKind::Const => "const",
        }
    }
}
