use crate::ast::Expr;

/// One filter invocation in a `{{ expr |> f1 |> f2(...) }}` pipeline.
///
/// The previous stage's value is prepended to `args` at dispatch time, so
/// `args` holds only the explicitly written arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expr>,
}

/// A `{{ ... }}` fragment: an optional bound expression followed by zero or
/// more filter segments. `original` preserves the exact source including
/// delimiters so unmatched pipelines can be re-emitted verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct PageVariableFragment {
    pub expr: Option<Expr>,
    pub filters: Vec<FilterCall>,
    pub original: String,
}

/// Parsed argument of a block fragment header.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockArgs {
    /// `#if expr` / `else if expr` condition
    If(Expr),
    /// `#each x in seq`; `#each seq` binds the implicit `it`
    Each { binding: String, seq: Expr },
    /// `#raw` — body is a single literal string fragment
    Raw,
    /// Any other named block: the raw header text plus its expression form
    /// when the header parses as one
    Custom {
        raw: String,
        expr: Option<Expr>,
    },
}

/// An `{{else}}` / `{{else if expr}}` branch of a block.
#[derive(Debug, Clone, PartialEq)]
pub struct PageElseBlock {
    pub condition: Option<Expr>,
    pub body: Vec<PageFragment>,
}

/// A `{{#name args}} ... {{/name}}` block with recursively parsed bodies.
/// Bodies form a tree; fragments never reference their parents.
#[derive(Debug, Clone, PartialEq)]
pub struct PageBlockFragment {
    pub name: String,
    pub args: BlockArgs,
    pub body: Vec<PageFragment>,
    pub else_blocks: Vec<PageElseBlock>,
}

/// One fragment of a parsed page: literal text, a `{{ }}` expression
/// pipeline, or a block.
#[derive(Debug, Clone, PartialEq)]
pub enum PageFragment {
    Str(String),
    Var(PageVariableFragment),
    Block(PageBlockFragment),
}
