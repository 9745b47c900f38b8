#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Floating-point number, including exponent forms
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 1e5
    /// 2.5e-3
    /// ```
    Float(f64),

    /// Integer
    Integer(i64),

    /// String literal enclosed in single or double quotes
    ///
    /// # Examples
    /// ```text
    /// "hello"
    /// 'item #1'
    /// ```
    String(String),

    /// Back-tick template literal, split at its `${...}` holes.
    ///
    /// `parts` always has one more element than `holes`; the raw hole
    /// sources are re-parsed as expressions by the parser.
    ///
    /// # Example
    /// ```text
    /// `sum is ${a + b}!`
    /// ```
    Template {
        parts: Vec<String>,
        holes: Vec<String>,
    },

    /// Boolean literal (`true` / `false`)
    Boolean(bool),

    /// Null literal (`null` and its `undefined` alias)
    Null,

    // Identifiers and keywords
    /// Field name, variable or filter identifier
    ///
    /// Must start with a letter or underscore, followed by letters, digits,
    /// or underscores.
    Identifier(String),

    /// `var` declaration keyword
    Var,
    /// `let` declaration keyword
    Let,
    /// `const` declaration keyword
    Const,

    // Operators
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `!`
    Bang,
    /// `=`
    Assign,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `??`
    Coalesce,
    /// `&`
    Amp,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `=>`
    Arrow,
    /// `...`
    Ellipsis,
    /// `|>`
    PipeGt,

    // Punctuation
    /// `?`
    Question,
    /// `:`
    Colon,
    /// `;`
    Semicolon,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,

    /// End of input
    Eof,
}
