//! Builds the payload that follows the server's `354` response: the `Date`/address/`Subject`
//! headers, the body (plain or as a MIME multipart envelope with base64-encoded attachments),
//! and the terminating end-of-data sentinel.
//!
//! Ports the original library's `GenerateDate`, the address-header loop inlined in `SMTPData`,
//! and `MIMEData`. The original's manual GMT/local `tm`-struct subtraction for the `Date:`
//! timezone offset is replaced with `chrono::Local`'s direct signed offset (see DESIGN.md); the
//! boundary's time-seeded PRNG is replaced with a caller-injectable [`BoundarySource`] trait
//! (see DESIGN.md Open Questions) so tests can pin the boundary deterministically.

use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Datelike, Timelike};
use fastrand::Rng;

use crate::address::{AddressKind, AddressLedger};
use crate::base64_codec::Base64Stream;
use crate::buffer::SendBuffer;
use crate::error::{Result, SmtpError};

/// `\r\n`, used as every line terminator on the wire.
pub const CRLF: &[u8] = b"\r\n";
/// The literal byte sequence that ends the `DATA` payload.
pub const END_OF_DATA: &[u8] = b"\r\n.\r\n";
/// Column at which a base64 line is folded, regardless of encoder quartet boundaries.
pub const LINE_LENGTH: usize = 76;
/// Number of decimal digits appended to the literal `Boundary` prefix.
pub const BOUNDARY_DIGITS: usize = 5;

/// An attachment to be base64-encoded into its own MIME part.
///
/// Borrowed for the duration of a single `DATA` call. On a read error the reader's own
/// cleanup (e.g. a file handle's `Drop`) is responsible for itself — the writer never invokes
/// `close` on that path. `close` is invoked only if a transport/sink failure interrupts the
/// attachment mid-stream (see [`write_attachment_part`]); it is never invoked on normal
/// completion.
pub struct Attachment<'a> {
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub reader: &'a mut dyn Read,
    close: Option<Box<dyn FnOnce() + 'a>>,
}

impl<'a> Attachment<'a> {
    pub fn new(reader: &'a mut dyn Read) -> Self {
        Attachment {
            filename: None,
            mime_type: None,
            reader,
            close: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Registers a capability invoked only if a transport/sink failure interrupts this
    /// attachment mid-stream; never invoked on a read error or normal completion.
    pub fn with_close(mut self, close: impl FnOnce() + 'a) -> Self {
        self.close = Some(Box::new(close));
        self
    }

    /// Invokes the registered close capability, if any. Called by the writer exactly once,
    /// only on a mid-stream sink failure.
    fn close_on_error(&mut self) {
        if let Some(close) = self.close.take() {
            close();
        }
    }
}

/// Supplies fresh candidate boundary suffixes. The default, [`TimeSeededBoundarySource`],
/// mirrors the original's `srand(time(NULL))`; tests should inject a fixed-sequence source
/// instead.
pub trait BoundarySource {
    /// Returns `BOUNDARY_DIGITS` ASCII decimal digits for a new boundary candidate.
    fn next_digits(&mut self) -> String;
}

/// Default boundary source: a small PRNG seeded from the wall clock at construction time.
pub struct TimeSeededBoundarySource {
    rng: Rng,
}

impl Default for TimeSeededBoundarySource {
    fn default() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        TimeSeededBoundarySource {
            rng: Rng::with_seed(seed),
        }
    }
}

impl BoundarySource for TimeSeededBoundarySource {
    fn next_digits(&mut self) -> String {
        (0..BOUNDARY_DIGITS)
            .map(|_| (b'0' + self.rng.u8(0..10)) as char)
            .collect()
    }
}

/// Draws boundary candidates from `source` until one that is not a substring of `body` is
/// found. Collision with the body would prematurely close a MIME part, so this must never be
/// skipped.
fn choose_boundary(body: &str, source: &mut dyn BoundarySource) -> String {
    loop {
        let candidate = format!("Boundary{}", source.next_digits());
        if !body.contains(&candidate) {
            return candidate;
        }
    }
}

/// Everything needed to render the address header block and subject line.
pub struct Headers<'a> {
    pub ledger: &'a AddressLedger,
    pub subject: Option<&'a str>,
}

/// Writes the complete `DATA` payload (headers, body, optional MIME attachments, and the
/// end-of-data sentinel) through `buffer`.
///
/// `body` must not contain [`END_OF_DATA`]; the caller is expected to have checked this before
/// entering the `DATA` phase (see [`crate::session::Session::data`]).
pub fn write_message<W: Write>(
    buffer: &mut SendBuffer<W>,
    headers: &Headers<'_>,
    body: &str,
    attachments: &mut [Attachment<'_>],
    boundary_source: &mut dyn BoundarySource,
) -> Result<()> {
    write_date(buffer)?;
    write_address_headers(buffer, headers.ledger)?;
    write_subject(buffer, headers.subject)?;

    if attachments.is_empty() {
        buffer.append_all(&[CRLF, body.as_bytes()]).map_err(protocol)?;
    } else {
        write_multipart(buffer, body, attachments, boundary_source)?;
    }

    buffer.append(END_OF_DATA).map_err(protocol)?;
    Ok(())
}

fn write_date<W: Write>(buffer: &mut SendBuffer<W>) -> Result<()> {
    let now = chrono::Local::now();
    let weekday = now.weekday().to_string();
    let weekday = &weekday[..3];
    let month = MONTHS[now.month0() as usize];
    let offset_minutes = now.offset().local_minus_utc() / 60;
    let date = format!(
        "{}, {:02} {} {:04} {:02}:{:02}:{:02} {:+03}{:02}",
        weekday,
        now.day(),
        month,
        now.year(),
        now.hour(),
        now.minute(),
        now.second(),
        offset_minutes / 60,
        (offset_minutes % 60).abs(),
    );
    buffer
        .append_all(&[b"Date: ", date.as_bytes(), CRLF])
        .map_err(protocol)
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn write_address_headers<W: Write>(buffer: &mut SendBuffer<W>, ledger: &AddressLedger) -> Result<()> {
    let mut previous: Option<AddressKind> = None;
    for entry in ledger.entries() {
        match previous {
            Some(prev) if prev == entry.kind => {
                buffer.append_all(&[b",", CRLF, b" "]).map_err(protocol)?;
            }
            _ => {
                if previous.is_some() {
                    buffer.append(CRLF).map_err(protocol)?;
                }
                let label: &[u8] = match entry.kind {
                    AddressKind::From => b"From: ",
                    AddressKind::To => b"To: ",
                    AddressKind::Cc => b"Cc: ",
                    AddressKind::Bcc => {
                        return Err(SmtpError::Buffer("BCC address leaked into the ledger".into()))
                    }
                };
                buffer.append(label).map_err(protocol)?;
            }
        }
        buffer.append(entry.original.as_bytes()).map_err(protocol)?;
        previous = Some(entry.kind);
    }
    buffer.append(CRLF).map_err(protocol)
}

fn write_subject<W: Write>(buffer: &mut SendBuffer<W>, subject: Option<&str>) -> Result<()> {
    if let Some(subject) = subject {
        buffer
            .append_all(&[b"Subject: ", subject.as_bytes(), CRLF])
            .map_err(protocol)?;
    }
    Ok(())
}

fn write_multipart<W: Write>(
    buffer: &mut SendBuffer<W>,
    body: &str,
    attachments: &mut [Attachment<'_>],
    boundary_source: &mut dyn BoundarySource,
) -> Result<()> {
    let boundary = choose_boundary(body, boundary_source);
    let boundary_bytes = boundary.as_bytes();

    buffer
        .append_all(&[
            b"MIME-Version: 1.0",
            CRLF,
            b"Content-Type: multipart/mixed; boundary=",
            boundary_bytes,
            CRLF,
            CRLF,
        ])
        .map_err(protocol)?;

    buffer
        .append_all(&[
            b"--",
            boundary_bytes,
            CRLF,
            b"Content-Type: text/plain",
            CRLF,
            CRLF,
            body.as_bytes(),
            CRLF,
        ])
        .map_err(protocol)?;

    for attachment in attachments.iter_mut() {
        write_attachment_part(buffer, boundary_bytes, attachment)?;
    }

    buffer.append_all(&[b"--", boundary_bytes, b"--"]).map_err(protocol)
}

/// Writes one attachment's MIME part. On a transport/sink failure anywhere in this part
/// (headers or body), invokes the attachment's CLOSE capability before propagating the
/// `Protocol` error; a read failure propagates as `Data` without touching CLOSE.
fn write_attachment_part<W: Write>(
    buffer: &mut SendBuffer<W>,
    boundary: &[u8],
    attachment: &mut Attachment<'_>,
) -> Result<()> {
    let result = write_attachment_part_inner(buffer, boundary, attachment);
    if let Err(SmtpError::Protocol(_)) = &result {
        attachment.close_on_error();
    }
    result
}

fn write_attachment_part_inner<W: Write>(
    buffer: &mut SendBuffer<W>,
    boundary: &[u8],
    attachment: &mut Attachment<'_>,
) -> Result<()> {
    let mime_type = attachment.mime_type.as_deref().unwrap_or("application/octet-stream");
    buffer
        .append_all(&[b"--", boundary, CRLF, b"Content-Type: ", mime_type.as_bytes(), CRLF])
        .map_err(protocol)?;
    buffer.append(b"Content-Disposition: attachment").map_err(protocol)?;
    if let Some(filename) = &attachment.filename {
        buffer
            .append_all(&[b"; filename=", filename.as_bytes()])
            .map_err(protocol)?;
    }
    buffer
        .append_all(&[CRLF, b"Content-Transfer-Encoding: base64", CRLF, CRLF])
        .map_err(protocol)?;

    encode_attachment_body(buffer, attachment.reader)
}

/// Drives the base64 encoder over `reader`'s bytes, folding the encoded output at
/// [`LINE_LENGTH`] columns regardless of where the encoder's quartet boundaries fall.
fn encode_attachment_body<W: Write>(buffer: &mut SendBuffer<W>, reader: &mut dyn Read) -> Result<()> {
    let mut stream = Base64Stream::new();
    let mut read_buf = [0u8; 2048];
    let mut column = 0usize;
    let mut done = false;

    while !done {
        let n = reader.read(&mut read_buf).map_err(|e| SmtpError::data(e.to_string()))?;
        if n == 0 {
            done = true;
        }

        let mut input = &read_buf[..n];
        loop {
            let mut encoded = [0u8; 2048];
            let (consumed, written) = stream.encode(input, &mut encoded, done);
            input = &input[consumed..];

            fold_into_lines(buffer, &encoded[..written], &mut column)?;

            if done || input.is_empty() {
                break;
            }
        }
    }

    if column != 0 {
        buffer.append(CRLF).map_err(protocol)?;
    }
    Ok(())
}

fn fold_into_lines<W: Write>(buffer: &mut SendBuffer<W>, mut chunk: &[u8], column: &mut usize) -> Result<()> {
    while !chunk.is_empty() {
        let room = LINE_LENGTH - *column;
        let take = room.min(chunk.len());
        buffer.append(&chunk[..take]).map_err(protocol)?;
        *column += take;
        chunk = &chunk[take..];

        if *column >= LINE_LENGTH {
            buffer.append(CRLF).map_err(protocol)?;
            *column = 0;
        }
    }
    Ok(())
}

fn protocol(err: std::io::Error) -> SmtpError {
    SmtpError::protocol(err.to_string())
}
