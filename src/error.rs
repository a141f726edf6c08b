//! The typed error hierarchy surfaced by every public operation on a [`Session`](crate::session::Session).
//!
//! Mirrors the six-way classification from the original C library's `SMTPErrors` enum:
//! caller errors never touch the wire, server errors leave the session usable, transport
//! errors shut the session down, and resource errors leave the session's state untouched.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SmtpError>;

/// All failure modes a [`Session`](crate::session::Session) operation can return.
///
/// There is no `Success` variant: success is `Ok(())`/`Ok(T)`. This mirrors the original's
/// `SMTP_ERR_SUCCESS == 0` convention without needing to represent it as an error case.
#[derive(Debug, Error)]
pub enum SmtpError {
    /// The server replied with a well-formed but unexpected status code.
    ///
    /// The session remains usable; the caller may retry (after `RSET`, for the data phase).
    /// The raw status is retained so callers can tell a transient 4xx from a permanent 5xx,
    /// a distinction the original library does not expose on its own.
    #[error("server returned unexpected status {status}: {text}")]
    Failure { status: u16, text: String },

    /// A local buffer overflowed or an allocation could not be satisfied.
    #[error("buffer error: {0}")]
    Buffer(String),

    /// A transport failure (socket I/O) or a malformed server reply. The session has already
    /// been shut down by the time this is returned.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Caller-supplied input was invalid: a malformed address, a body containing the
    /// end-of-data sentinel, or an attachment read failure. Never touches the wire.
    #[error("invalid data: {0}")]
    Data(String),

    /// The requested operation is not legal in the session's current state.
    #[error("operation not valid in the current session state")]
    InvalidState,
}

impl SmtpError {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        SmtpError::Protocol(msg.into())
    }

    pub(crate) fn data(msg: impl Into<String>) -> Self {
        SmtpError::Data(msg.into())
    }
}

impl From<std::io::Error> for SmtpError {
    fn from(err: std::io::Error) -> Self {
        SmtpError::Protocol(err.to_string())
    }
}
