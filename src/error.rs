use std::error::Error;
use std::fmt;

/// Errors raised while lexing, parsing or evaluating a script.
///
/// The taxonomy mirrors where in the pipeline a failure happened: syntax
/// errors carry a source offset, argument errors blame the caller of a
/// filter, evaluation errors blame the expression itself, and host errors
/// wrap a failure that escaped host-registered code.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// Malformed source text, with the character offset where lexing or
    /// parsing stopped.
    Syntax { message: String, position: usize },

    /// A filter or function was called with unusable arguments.
    Argument(String),

    /// An expression could not be evaluated: bad operand types, a missing
    /// property on a typed object, an out-of-range index.
    Evaluation(String),

    /// The evaluation step budget was exhausted.
    BudgetExceeded { steps: usize },

    /// Arrow-function recursion exceeded the call-depth limit.
    StackOverflow { depth: usize },

    /// The render was cancelled through its cancellation token.
    Cancelled,

    /// A failure inside host-registered filter code, tagged with the
    /// filter name it escaped from.
    Host {
        filter: String,
        cause: Box<ScriptError>,
    },
}

impl ScriptError {
    pub fn syntax(message: impl Into<String>, position: usize) -> ScriptError {
        ScriptError::Syntax {
            message: message.into(),
            position,
        }
    }

    /// Tag this error with the host filter it escaped from. Already-tagged
    /// errors pass through unchanged so nested filter calls keep the
    /// innermost attribution.
    pub fn in_filter(self, name: &str) -> ScriptError {
        match self {
            ScriptError::Host { .. } => self,
            other => ScriptError::Host {
                filter: name.to_string(),
                cause: Box::new(other),
            },
        }
    }

    /// Short machine-friendly tag for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            ScriptError::Syntax { .. } => "syntax",
            ScriptError::Argument(_) => "argument",
            ScriptError::Evaluation(_) => "evaluation",
            ScriptError::BudgetExceeded { .. } => "budget",
            ScriptError::StackOverflow { .. } => "stack-overflow",
            ScriptError::Cancelled => "cancelled",
            ScriptError::Host { .. } => "host",
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Syntax { message, position } => {
                write!(f, "syntax error at offset {}: {}", position, message)
            }
            ScriptError::Argument(message) => write!(f, "argument error: {}", message),
            ScriptError::Evaluation(message) => write!(f, "{}", message),
            ScriptError::BudgetExceeded { steps } => {
                write!(f, "evaluation exceeded the budget of {} steps", steps)
            }
            ScriptError::StackOverflow { depth } => {
                write!(f, "call depth exceeded the limit of {}", depth)
            }
            ScriptError::Cancelled => write!(f, "render was cancelled"),
            ScriptError::Host { filter, cause } => {
                write!(f, "error in filter '{}': {}", filter, cause)
            }
        }
    }
}

impl Error for ScriptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ScriptError::Host { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

/// One frame of a render trace: the page being rendered and the source of
/// the fragment that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceFrame {
    pub page: String,
    pub source: String,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}: {}", self.page, self.source)
    }
}

/// A render failure: the underlying error plus the trace of pages and
/// fragments it propagated through, innermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptException {
    pub error: ScriptError,
    pub trace: Vec<TraceFrame>,
}

impl ScriptException {
    pub fn new(error: ScriptError) -> ScriptException {
        ScriptException {
            error,
            trace: Vec::new(),
        }
    }

    pub fn with_frame(mut self, page: impl Into<String>, source: impl Into<String>) -> Self {
        self.trace.push(TraceFrame {
            page: page.into(),
            source: source.into(),
        });
        self
    }

    /// The full trace rendered one frame per line, innermost first.
    pub fn stack_trace(&self) -> String {
        self.trace
            .iter()
            .map(TraceFrame::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        for frame in &self.trace {
            write!(f, "\n  {}", frame)?;
        }
        Ok(())
    }
}

impl Error for ScriptException {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

impl From<ScriptError> for ScriptException {
    fn from(error: ScriptError) -> ScriptException {
        ScriptException::new(error)
    }
}
