use thiserror::Error;

/// Canonical result for the engine.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad or incomplete declarative input; never retried.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Unresolved datasource, provider or step name.
    #[error("unresolved resource: {0}")]
    Resource(String),

    /// An expression failed against a specific row.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// A method was called out of its allowed lifecycle order.
    #[error("invalid state: {0}")]
    State(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("codec error: {0}")]
    Codec(String),

    // Higher layers map their I/O errors into this variant.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Error::Resource(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Error::State(msg.into())
    }

    /// Prefix the message with some context, keeping the error kind.
    pub fn context(self, pfx: &str) -> Self {
        match self {
            Error::Config(m) => Error::Config(format!("{pfx}: {m}")),
            Error::Resource(m) => Error::Resource(format!("{pfx}: {m}")),
            Error::Evaluation(m) => Error::Evaluation(format!("{pfx}: {m}")),
            Error::State(m) => Error::State(format!("{pfx}: {m}")),
            Error::Codec(m) => Error::Codec(format!("{pfx}: {m}")),
            Error::Io(m) => Error::Io(format!("{pfx}: {m}")),
            Error::Cancelled => Error::Cancelled,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_kind() {
        let err = Error::config("no group attributes specified").context("agg");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(
            err.to_string(),
            "invalid configuration: agg: no group attributes specified"
        );
        assert!(matches!(Error::Cancelled.context("x"), Error::Cancelled));
    }
}
