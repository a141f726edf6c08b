//! A from-scratch SMTP client: speaks the protocol directly over a TCP socket, with its own
//! MX discovery, session state machine, MIME multipart framing and streaming base64 encoder.
//! No local MTA is required.
//!
//! The pieces, bottom-up:
//! - [`base64_codec`]: the restartable streaming base64 encoder.
//! - [`buffer`]: the coalescing send buffer every write to the wire goes through.
//! - [`reply`]: the multi-line SMTP reply parser.
//! - [`address`]: the address ledger and `MAIL FROM`/`RCPT TO` address parser.
//! - [`mime`]: renders the `DATA` payload — headers, body, and MIME attachment parts.
//! - [`resolve`]: MX discovery and the connect-and-greet loop.
//! - [`session`]: the state machine tying the above together into `connect`/`mail_from`/
//!   `recipient`/`data`/`reset`/`disconnect`.
//! - [`error`]: the typed error hierarchy returned by every [`session::Session`] operation.
//! - [`config`]: environment-variable configuration for the `direct_smtp_send` binary.

pub mod address;
pub mod base64_codec;
pub mod buffer;
pub mod config;
pub mod error;
pub mod mime;
pub mod reply;
pub mod resolve;
pub mod session;

pub use error::{Result, SmtpError};
pub use session::{connect, connect_default, Session, SessionState};
