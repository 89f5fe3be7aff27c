use thiserror::Error as ThisError;

/// Typed failure kinds of the query layer.
///
/// Errors travel as [`crate::Error`] with one of these kinds as the
/// source; match on them with `error.downcast_ref::<QueryError>()`.
#[derive(Debug, ThisError)]
pub enum QueryError {
    /// Builder or query misuse: pending operator at build, operator with
    /// no prior condition, duplicate post-filter, use after close.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Operation disallowed for the current configuration.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A value outside the domain the operation accepts.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A unique retrieval matched more than one result.
    #[error("the query matched more than one result")]
    NotUnique,

    /// Engine failure. Transient ones are retried by the store envelope.
    #[error("backend error: {message}")]
    Backend { message: String, transient: bool },
}

impl QueryError {
    pub fn illegal_state(message: impl Into<String>) -> crate::Error {
        crate::Error::new(Self::IllegalState(message.into()))
    }

    pub fn unsupported(message: impl Into<String>) -> crate::Error {
        crate::Error::new(Self::Unsupported(message.into()))
    }

    pub fn invalid_argument(message: impl Into<String>) -> crate::Error {
        crate::Error::new(Self::InvalidArgument(message.into()))
    }

    pub fn not_unique() -> crate::Error {
        crate::Error::new(Self::NotUnique)
    }

    pub fn backend(message: impl Into<String>, transient: bool) -> crate::Error {
        crate::Error::new(Self::Backend {
            message: message.into(),
            transient,
        })
    }

    /// Whether the retry envelope may try `error` again.
    pub fn is_transient(error: &crate::Error) -> bool {
        matches!(
            error.downcast_ref::<QueryError>(),
            Some(QueryError::Backend {
                transient: true,
                ..
            })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_detection() {
        assert!(QueryError::is_transient(&QueryError::backend("busy", true)));
        assert!(!QueryError::is_transient(&QueryError::backend("corrupt", false)));
        assert!(!QueryError::is_transient(&QueryError::illegal_state("x")));
    }

    #[test]
    fn kinds_downcast() {
        let error = QueryError::unsupported("find_ids on an ordered query");
        assert!(matches!(
            error.downcast_ref::<QueryError>(),
            Some(QueryError::Unsupported(..))
        ));
    }
}
