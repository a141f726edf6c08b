//! The session state machine: `HELO`, `MAIL FROM`/`RCPT TO`, `DATA`, `RSET` and `QUIT`, all
//! sequenced over a single transport.
//!
//! Ports the original library's `SMTPConnect`/`SMTPAddress` callers/`SMTPData`/`SMTPReset`/
//! `SMTPDisconnect`, which operated on one `SMTPConn` struct carrying an explicit
//! `SMTPStates` field. Here that becomes [`SessionState`], and the transport is a type
//! parameter (mirroring the teacher's generic protocol type) so the whole engine can be
//! driven over an in-memory pipe in tests instead of a real socket.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::address::{parse_address, AddressKind, AddressLedger};
use crate::buffer::SendBuffer;
use crate::error::{Result, SmtpError};
use crate::mime::{self, Attachment, BoundarySource, Headers, TimeSeededBoundarySource};
use crate::reply::{read_reply, Reply};
use crate::resolve::{connect_and_greet, resolve_candidates, DEFAULT_TIMEOUT};

/// The session's position in the `HELO`/envelope/`DATA` protocol.
///
/// `Disconnected` is both the implicit starting point (no live connection exists yet) and the
/// terminal state reached after `QUIT` or any transport failure; there is no way back from it
/// except constructing a new [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// `HELO` has completed; no `MAIL FROM` has been accepted yet.
    Connected,
    /// `MAIL FROM` accepted; waiting for at least one `RCPT TO`.
    AwaitingRecipient,
    /// At least one `RCPT TO` accepted; `DATA` may now be sent.
    Ready,
}

/// A live SMTP session over `T`. Construct with [`connect`] for a real MX-resolved TCP
/// connection, or [`Session::from_transport`] to drive the state machine over any
/// `Read + Write` transport (used by tests).
pub struct Session<T: Read + Write> {
    transport: Option<T>,
    state: SessionState,
    ledger: AddressLedger,
}

impl<T: Read + Write> Session<T> {
    /// Sends `HELO <helo_hostname>` over an already-connected transport and awaits its `250`.
    /// On any failure the transport is dropped and no `Session` is returned.
    pub fn from_transport(transport: T, helo_hostname: &str) -> Result<Self> {
        let mut session = Session {
            transport: Some(transport),
            state: SessionState::Connected,
            ledger: AddressLedger::new(),
        };
        session.send_and_expect(&format!("HELO {helo_hostname}\r\n"), 250)?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The addresses accepted so far, in the order the server confirmed them. Not cleared
    /// across a `DATA` call, but cleared by `RSET` along with the rest of the envelope (see
    /// DESIGN.md).
    pub fn ledger(&self) -> &AddressLedger {
        &self.ledger
    }

    /// `MAIL FROM:<address>`. Only legal in [`SessionState::Connected`].
    pub fn mail_from(&mut self, address: &str) -> Result<()> {
        let result = self.mail_from_inner(address);
        self.finish(result)
    }

    fn mail_from_inner(&mut self, address: &str) -> Result<()> {
        self.require_state(SessionState::Connected)?;
        let parsed = parse_address(address)?;
        let command = format!("MAIL FROM:<{}>\r\n", parsed.wire);
        self.send_and_expect(&command, 250)?;
        self.ledger.push(AddressKind::From, parsed.original.to_string());
        self.state = SessionState::AwaitingRecipient;
        Ok(())
    }

    /// `RCPT TO:<address>`. `kind` must be [`AddressKind::To`], [`AddressKind::Cc`] or
    /// [`AddressKind::Bcc`]; only legal once a `MAIL FROM` is in effect. BCC addresses reach
    /// the wire but are never recorded in the ledger.
    pub fn recipient(&mut self, kind: AddressKind, address: &str) -> Result<()> {
        let result = self.recipient_inner(kind, address);
        self.finish(result)
    }

    fn recipient_inner(&mut self, kind: AddressKind, address: &str) -> Result<()> {
        if kind == AddressKind::From {
            return Err(SmtpError::InvalidState);
        }
        match self.state {
            SessionState::AwaitingRecipient | SessionState::Ready => {}
            _ => return Err(SmtpError::InvalidState),
        }
        let parsed = parse_address(address)?;
        let command = format!("RCPT TO:<{}>\r\n", parsed.wire);
        self.send_and_expect(&command, 250)?;
        if kind != AddressKind::Bcc {
            self.ledger.push(kind, parsed.original.to_string());
        }
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Sends the `DATA` command, the full MIME payload, and reads the server's final `250`.
    /// Only legal in [`SessionState::Ready`]. On success the session stays `Ready`, so a
    /// second `DATA` can be sent over the same envelope without an intervening `RSET`; the
    /// ledger is left untouched either way, so it accumulates across every message sent on
    /// this session.
    pub fn data(
        &mut self,
        subject: Option<&str>,
        body: &str,
        attachments: &mut [Attachment<'_>],
        boundary_source: &mut dyn BoundarySource,
    ) -> Result<()> {
        let result = self.data_inner(subject, body, attachments, boundary_source);
        self.finish(result)
    }

    fn data_inner(
        &mut self,
        subject: Option<&str>,
        body: &str,
        attachments: &mut [Attachment<'_>],
        boundary_source: &mut dyn BoundarySource,
    ) -> Result<()> {
        self.require_state(SessionState::Ready)?;
        if body.as_bytes().windows(mime::END_OF_DATA.len()).any(|w| w == mime::END_OF_DATA) {
            return Err(SmtpError::data("body contains the end-of-data sentinel"));
        }

        self.send_and_expect("DATA\r\n", 354)?;

        let ledger = &self.ledger;
        let transport = self.transport.as_mut().ok_or(SmtpError::InvalidState)?;
        let mut buffer = SendBuffer::new(2048, transport);
        let headers = Headers { ledger, subject };
        write_message_result(&mut buffer, &headers, body, attachments, boundary_source)?;
        buffer.flush().map_err(SmtpError::from)?;

        let reply = read_reply(self.transport_mut()?)?;
        if reply.status != 250 {
            return Err(SmtpError::Failure { status: reply.status, text: reply.text });
        }
        // Deliberately stays `Ready`: a second `DATA` can be sent on the same envelope without
        // an intervening `RSET` (see DESIGN.md).
        Ok(())
    }

    /// `RSET`. Clears the envelope (the wire's `MAIL FROM`/`RCPT TO` state, mirrored by
    /// returning to [`SessionState::Connected`] and clearing the ledger) without disconnecting.
    /// Legal in any state except [`SessionState::Disconnected`].
    pub fn reset(&mut self) -> Result<()> {
        let result = self.reset_inner();
        self.finish(result)
    }

    fn reset_inner(&mut self) -> Result<()> {
        if self.state == SessionState::Disconnected {
            return Err(SmtpError::InvalidState);
        }
        self.send_and_expect("RSET\r\n", 250)?;
        self.ledger.clear();
        self.state = SessionState::Connected;
        Ok(())
    }

    /// `QUIT`. Always leaves the session disconnected, even if the server's reply is
    /// unexpected or the transport fails while sending it.
    pub fn disconnect(mut self) -> Result<()> {
        if self.state == SessionState::Disconnected {
            return Ok(());
        }
        let result = self.send_and_expect("QUIT\r\n", 221).map(|_| ());
        self.transport = None;
        self.state = SessionState::Disconnected;
        result
    }

    fn transport_mut(&mut self) -> Result<&mut T> {
        self.transport.as_mut().ok_or(SmtpError::InvalidState)
    }

    fn send_and_expect(&mut self, command: &str, expected: u16) -> Result<Reply> {
        let transport = self.transport_mut()?;
        transport.write_all(command.as_bytes()).map_err(SmtpError::from)?;
        let reply = read_reply(transport)?;
        if reply.status != expected {
            return Err(SmtpError::Failure { status: reply.status, text: reply.text });
        }
        Ok(reply)
    }

    fn require_state(&self, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SmtpError::InvalidState)
        }
    }

    /// A transport failure or malformed reply leaves the connection unusable: tear it down so
    /// the state reflects reality, rather than reporting a state the caller can no longer act
    /// on.
    fn finish<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(SmtpError::Protocol(_)) = &result {
            self.transport = None;
            self.state = SessionState::Disconnected;
        }
        result
    }
}

fn write_message_result<W: Write>(
    buffer: &mut SendBuffer<W>,
    headers: &Headers<'_>,
    body: &str,
    attachments: &mut [Attachment<'_>],
    boundary_source: &mut dyn BoundarySource,
) -> Result<()> {
    mime::write_message(buffer, headers, body, attachments, boundary_source)
}

/// Resolves `domain`'s mail servers, connects to the first one that greets successfully, and
/// completes the `HELO` handshake. The full replacement for the original's `Connect`.
pub fn connect(domain: &str, port: u16, helo_hostname: &str, timeout: Duration) -> Result<Session<TcpStream>> {
    let candidates = resolve_candidates(domain)?;
    let stream = connect_and_greet(&candidates, port, timeout)?;
    Session::from_transport(stream, helo_hostname)
}

/// Convenience wrapper over [`connect`] using [`DEFAULT_TIMEOUT`].
pub fn connect_default(domain: &str, port: u16, helo_hostname: &str) -> Result<Session<TcpStream>> {
    connect(domain, port, helo_hostname, DEFAULT_TIMEOUT)
}

/// A default, time-seeded [`BoundarySource`], exposed so callers of [`Session::data`] don't
/// need to depend on [`crate::mime`] directly for the common case.
pub fn default_boundary_source() -> TimeSeededBoundarySource {
    TimeSeededBoundarySource::default()
}
