//! CLI support for sharpscript
//!
//! Provides programmatic access to the `sharp` CLI functionality for
//! embedding in other tools.

mod run;

pub use run::{execute_eval, execute_render, EvalOptions, RenderOptions, RenderResult};

use std::io;

use crate::error::{ScriptError, ScriptException};

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Lexing, parsing or evaluation error
    Script(ScriptError),
    /// Page render error with its trace
    Render(ScriptException),
    /// JSON parsing error
    Json(serde_json::Error),
    /// IO error
    Io(io::Error),
    /// No template provided
    NoInput,
    /// `--args` was not a JSON object
    BadArgs,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Script(e) => write!(f, "Script error: {}", e),
            CliError::Render(e) => write!(f, "Render error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => {
                write!(f, "No template provided. Pass a file or pipe text to stdin.")
            }
            CliError::BadArgs => write!(f, "--args must be a JSON object"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Script(e) => Some(e),
            CliError::Render(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ScriptError> for CliError {
    fn from(e: ScriptError) -> Self {
        CliError::Script(e)
    }
}

impl From<ScriptException> for CliError {
    fn from(e: ScriptException) -> Self {
        CliError::Render(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
