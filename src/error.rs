use thiserror::Error;

/// Errors produced while framing, routing and dispatching a request.
#[derive(Debug, Error)]
pub enum Error {
    /// The request line could not be parsed, or the header block never completed.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The stream closed before `Content-Length` bytes of body arrived.
    #[error("incomplete body: expected {expected} bytes, received {received}")]
    IncompleteBody { expected: usize, received: usize },

    /// The body was required as text but is not valid UTF-8.
    #[error("request body is not valid UTF-8: {0}")]
    BodyDecode(#[from] std::str::Utf8Error),

    /// The header block grew past the configured limit.
    #[error("request header block exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    /// `Content-Length` announced more body than the configured limit.
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("no route for {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// A handler asked for an argument no source provided.
    #[error("missing argument `{0}`")]
    MissingArgument(String),

    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },

    /// The handler itself failed.
    #[error("handler failed: {0}")]
    Handler(String),

    #[error("invalid path template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps any displayable failure as a handler error.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        Error::Handler(err.to_string())
    }

    /// Errors after which no request exists to answer; the connection is dropped.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Error::MalformedRequest(_)
                | Error::IncompleteBody { .. }
                | Error::BodyDecode(_)
                | Error::HeaderTooLarge { .. }
                | Error::BodyTooLarge { .. }
                | Error::Io(_)
        )
    }

    /// Errors raised while binding arguments or running a handler.
    pub fn is_binding(&self) -> bool {
        matches!(
            self,
            Error::MissingArgument(_) | Error::InvalidArgument { .. } | Error::Handler(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
