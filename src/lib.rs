pub mod ast;
#[cfg(feature = "cli")]
pub mod cli;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod filters;
pub mod lexer;
pub mod output;
pub mod page;
pub mod parser;
pub mod render;
pub mod scope;
pub mod scripts;
pub mod template;
pub mod value;

pub use ast::{BinaryOp, Expr, Literal, LogicOp, PageFragment, Token, UnaryOp};
pub use context::{
    CompiledScript, ScriptConfig, ScriptContext, ScriptContextBuilder, ScriptLanguage,
};
pub use error::{ScriptError, ScriptException, TraceFrame};
pub use evaluator::Evaluator;
pub use filters::{FilterInvocation, FilterRegistry};
pub use lexer::{tokenize, Lexer};
pub use output::{from_json, stringify, to_json};
pub use page::{PageCache, SharpPage};
pub use parser::{Parser, ParserOptions};
pub use render::{BlockHandler, PageResult, RenderFrame};
pub use scope::{ScopeChain, ScopeLayer};
pub use template::parse_template;
pub use value::{ScriptFunction, ScriptObject, Value};
