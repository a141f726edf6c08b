//! Parses multi-line SMTP replies off the wire.
//!
//! A port of the original library's `ReadReply`. A reply is one or more lines, each starting
//! with exactly three status digits; every line but the last has `-` as its fourth byte.
//! `read_reply` consumes exactly one such reply and returns it, stopping immediately after the
//! terminating `CRLF` of the final line so that bytes belonging to the *next* reply are left
//! untouched on the stream.

use std::io::Read;

use crate::error::{Result, SmtpError};

/// Maximum number of bytes retained from a reply; mirrors `SMTP_BUFFER_SIZE` in the original.
pub const REPLY_BUFFER_SIZE: usize = 2048;

/// A fully parsed SMTP reply.
#[derive(Debug, Clone)]
pub struct Reply {
    /// The numeric status code of the final line (e.g. `250`).
    pub status: u16,
    /// The full reply text, all lines concatenated with their original `CRLF` terminators,
    /// truncated to [`REPLY_BUFFER_SIZE`] bytes as the original buffer does.
    pub text: String,
}

/// Reads one complete SMTP reply from `reader`.
///
/// Fails with [`SmtpError::Protocol`] on a closed connection, a read error, or a line whose
/// first three bytes are not ASCII digits.
pub fn read_reply<R: Read>(reader: &mut R) -> Result<Reply> {
    let mut kept = Vec::with_capacity(REPLY_BUFFER_SIZE);
    let mut line_size = 0usize;
    let mut multiline = false;
    let mut crlf_match = 0usize;
    const TERMINATOR: &[u8; 2] = b"\r\n";

    let mut chunk = [0u8; 512];
    loop {
        let n = reader.read(&mut chunk).map_err(|e| SmtpError::protocol(e.to_string()))?;
        if n == 0 {
            return Err(SmtpError::protocol("connection closed while awaiting reply"));
        }

        for &byte in &chunk[..n] {
            if kept.len() < REPLY_BUFFER_SIZE {
                kept.push(byte);
            }

            if line_size < 3 {
                if !byte.is_ascii_digit() {
                    return Err(SmtpError::protocol(format!(
                        "malformed reply: expected status digit, got {byte:#04x}"
                    )));
                }
            } else if line_size == 3 && byte == b'-' {
                multiline = true;
            }
            line_size += 1;

            if byte == TERMINATOR[crlf_match] {
                crlf_match += 1;
                if crlf_match >= TERMINATOR.len() {
                    crlf_match = 0;
                    line_size = 0;
                    if !multiline {
                        let text = String::from_utf8_lossy(&kept).into_owned();
                        let status = parse_status(&text)?;
                        return Ok(Reply { status, text });
                    }
                    multiline = false;
                }
            } else {
                crlf_match = 0;
            }
        }
    }
}

fn parse_status(text: &str) -> Result<u16> {
    text.get(0..3)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| SmtpError::protocol("reply did not start with a numeric status"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn single_line_reply() {
        let mut cursor = Cursor::new(b"250 OK\r\n".to_vec());
        let reply = read_reply(&mut cursor).unwrap();
        assert_eq!(reply.status, 250);
        assert_eq!(reply.text, "250 OK\r\n");
    }

    #[test]
    fn multiline_reply_stops_exactly_after_final_line() {
        let mut stream = b"250-hello\r\n250-PIPELINING\r\n250 SIZE 1024\r\nNEXT REPLY".to_vec();
        let mut cursor = Cursor::new(stream.clone());
        let reply = read_reply(&mut cursor).unwrap();
        assert_eq!(reply.status, 250);
        assert_eq!(reply.text, "250-hello\r\n250-PIPELINING\r\n250 SIZE 1024\r\n");

        // Confirm the remaining unread bytes are exactly the next reply's bytes.
        let consumed = reply.text.len();
        stream.drain(..consumed);
        assert_eq!(stream, b"NEXT REPLY");
    }

    #[test]
    fn non_digit_status_is_protocol_error() {
        let mut cursor = Cursor::new(b"abc broken\r\n".to_vec());
        let err = read_reply(&mut cursor).unwrap_err();
        assert!(matches!(err, SmtpError::Protocol(_)));
    }

    #[test]
    fn closed_connection_is_protocol_error() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let err = read_reply(&mut cursor).unwrap_err();
        assert!(matches!(err, SmtpError::Protocol(_)));
    }
}
