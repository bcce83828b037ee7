use std::fmt;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    Internal,
    InvalidArgument,
    /// Translating or executing a query against the index failed
    Query,
    /// `iterate_matching` was asked for a sort it cannot stream
    UnsupportedIteration,
    /// A blocking wait was interrupted
    Interrupted,
    /// A match callback failed; the callback's error is the source
    Callback,
    AuthenticationRequired,
    AuthorizationDenied,
    IllegalOperation,
}

impl ErrorKind {
    /// Kinds that callers of the search API observe as query failures.
    pub fn is_query_failure(&self) -> bool {
        matches!(
            self,
            ErrorKind::Query
                | ErrorKind::UnsupportedIteration
                | ErrorKind::Interrupted
                | ErrorKind::Callback
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{kind}: {context}")]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
    #[source]
    pub source: Option<BoxError>,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error {
            kind,
            context: context.into(),
            source: None,
        }
    }

    /// Wrap a lower-level failure, keeping it reachable through `source()`.
    pub fn with_source(kind: ErrorKind, context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error {
            kind,
            context: context.into(),
            source: Some(source.into()),
        }
    }

    pub fn query(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Query, context)
    }

    pub fn invalid_argument(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidArgument, context)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Re-raise as a query failure. Errors that already are query failures
    /// pass through untouched.
    pub fn into_query_failure(self, context: &str) -> Self {
        if self.kind.is_query_failure() {
            self
        } else {
            Error::with_source(ErrorKind::Query, context, self)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Io, err.to_string(), err)
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::with_source(ErrorKind::Parse, err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Parse, err.to_string(), err)
    }
}

impl From<fst::Error> for Error {
    fn from(err: fst::Error) -> Self {
        Error::with_source(ErrorKind::Internal, format!("FST error: {}", err), err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::with_source(ErrorKind::InvalidArgument, format!("invalid pattern: {}", err), err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn wrapped_errors_keep_their_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = Error::from(io).into_query_failure("search failed");

        assert_eq!(err.kind(), ErrorKind::Query);
        let cause = err.source().expect("cause");
        assert!(cause.to_string().contains("disk gone"));
    }

    #[test]
    fn query_failures_are_not_double_wrapped() {
        let err = Error::new(ErrorKind::UnsupportedIteration, "two sort fields")
            .into_query_failure("search failed");
        assert_eq!(err.kind(), ErrorKind::UnsupportedIteration);
        assert!(err.source().is_none());
    }
}
