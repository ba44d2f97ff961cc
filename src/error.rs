//! Unified error type.

use thiserror::Error;

/// A boxed error returned by a failing handler.
///
/// Any `E: Into<BoxError>` works: `std::io::Error`, `String`, `&'static str`,
/// or your own error type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by waypost's fallible operations.
///
/// Routing outcomes (404, 405, 501) and handler failures (500) are expressed
/// as HTTP responses, not as `Error`s. This type surfaces configuration
/// mistakes in path templates and infrastructure failures: binding to a port
/// or accepting a connection.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address: {0}")]
    Address(#[from] std::net::AddrParseError),

    /// A `{` or `}` with no partner was left in the template's literal text.
    #[error("unbalanced braces in path template `{template}`")]
    UnbalancedBraces { template: String },

    /// A `{}` placeholder with no name.
    #[error("empty parameter name in path template `{template}`")]
    EmptyParameter { template: String },

    #[error("path template compiled to an invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}
