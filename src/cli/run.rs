//! Evaluate expressions and render templates from the command line

use std::collections::HashMap;

use super::CliError;
use crate::context::ScriptContext;
use crate::output::{from_json, to_json};
use crate::value::Value;

/// Options for the eval command
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// The expression to evaluate
    pub expr: String,
    /// JSON object of argument bindings
    pub args: Option<String>,
}

/// Options for the render command
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// The template source to render
    pub template: String,
    /// JSON object of argument bindings
    pub args: Option<String>,
    /// Only validate syntax, don't render
    pub check: bool,
}

/// Result of a render operation
#[derive(Debug)]
pub enum RenderResult {
    /// Syntax validation passed
    SyntaxValid,
    /// Template rendered successfully
    Rendered(String),
}

fn parse_args(args: Option<&str>) -> Result<HashMap<String, Value>, CliError> {
    let Some(args) = args else {
        return Ok(HashMap::new());
    };
    let parsed: serde_json::Value = serde_json::from_str(args)?;
    match from_json(parsed) {
        Value::Map(map) => Ok(map),
        _ => Err(CliError::BadArgs),
    }
}

/// Evaluate an expression and return its JSON form.
pub fn execute_eval(options: &EvalOptions) -> Result<serde_json::Value, CliError> {
    let args = parse_args(options.args.as_deref())?;
    let ctx = ScriptContext::new();
    let value = ctx.evaluate(&options.expr, args)?;
    Ok(to_json(&value))
}

/// Render a template, or validate its syntax only.
pub fn execute_render(options: &RenderOptions) -> Result<RenderResult, CliError> {
    let ctx = ScriptContext::new();

    if options.check {
        ctx.compile(&options.template)?;
        return Ok(RenderResult::SyntaxValid);
    }

    let args = parse_args(options.args.as_deref())?;
    let output = ctx.render(&options.template, args)?;
    Ok(RenderResult::Rendered(output))
}
