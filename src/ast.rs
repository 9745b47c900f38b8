//! # sharpscript — Abstract Syntax Tree
//!
//! This module defines the AST for the sharpscript expression language: a
//! small JavaScript-like grammar (literals, binary/unary/logical operators,
//! member/call/array/object expressions, arrow functions, spread, template
//! literals, assignment, variable declarations) plus the page-fragment tree
//! the template parser produces.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (literals, access, operations)
//! - **[operators]** - Binary, logical, unary and declaration operators
//! - **[fragments]** - Page fragments (text, `{{ }}` pipelines, blocks)
//!
//! ## Core Concepts
//!
//! ### Expressions
//!
//! ```text
//! 1 + 2 * 3
//! items.where(x => x.price > 100).map(x => x.name)
//! user.name ?? 'anonymous'
//! ```
//!
//! ### Pages
//!
//! A page is literal text interleaved with `{{ }}` expression pipelines and
//! control blocks:
//!
//! ```text
//! <h1>{{ title |> upper }}</h1>
//! {{#each item in items}}<li>{{ item }}</li>{{/each}}
//! ```
//!
//! ### Filter pipelines
//!
//! `{{ expr |> f1(a) |> f2 }}` chains left to right: the result of each
//! stage becomes the first argument of the next.
//!
//! All nodes derive structural `PartialEq`; two different textual forms
//! compare equal only when their trees are literally isomorphic.
pub mod expressions;
pub mod fragments;
pub mod operators;
pub mod tokens;

pub use expressions::{Expr, Literal, ObjectProperty};
pub use fragments::{
    BlockArgs, FilterCall, PageBlockFragment, PageElseBlock, PageFragment, PageVariableFragment,
};
pub use operators::{BinaryOp, DeclarationKind, LogicOp, UnaryOp};
pub use tokens::Token;
