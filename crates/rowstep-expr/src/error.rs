use rowstep_core::error::Error;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("parse error at {pos}: {msg}")]
    Parse { pos: usize, msg: String },

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("function {name} expects {expected} arguments, got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("{0}")]
    Eval(String),
}

impl ExprError {
    pub fn eval(msg: impl Into<String>) -> Self {
        ExprError::Eval(msg.into())
    }

    /// Raised while evaluating: an evaluation error whatever its kind.
    pub(crate) fn at_runtime(self) -> Self {
        match self {
            ExprError::Eval(_) => self,
            other => ExprError::Eval(other.to_string()),
        }
    }

    pub(crate) fn parse(pos: usize, msg: impl Into<String>) -> Self {
        ExprError::Parse {
            pos,
            msg: msg.into(),
        }
    }
}

/// `Program` reports every runtime failure as `Eval`; the rest come from parsing
/// and are configuration errors.
impl From<ExprError> for Error {
    fn from(e: ExprError) -> Self {
        match e {
            ExprError::Eval(m) => Error::Evaluation(m),
            other => Error::Config(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExprError>;
