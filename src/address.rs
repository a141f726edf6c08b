//! The address ledger and the `MAIL FROM:`/`RCPT TO:` address-string parser.
//!
//! Ports the original library's inline pointer-arithmetic parser in `SMTPAddress` and the
//! `AddressBuffer` byte region it appended accepted addresses to. The byte-region's manual
//! `<kind><bytes><NUL>` encoding and doubling-reallocation strategy are a C memory-management
//! detail, not a contract (see DESIGN.md); the port keeps only the parts that are contractual:
//! insertion order, at most one `From` entry which must come first, and BCC addresses never
//! being recorded.

use crate::error::{Result, SmtpError};

/// The role an address plays in the envelope/headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    From,
    To,
    Cc,
    /// Sent on the wire via `RCPT TO:` but never recorded in the ledger or rendered in headers.
    Bcc,
}

/// One accepted, non-BCC address: its role and the caller's original (unparsed) input string,
/// preserved verbatim so that display-name forms (`"Name" <addr>`) survive into the headers.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub kind: AddressKind,
    pub original: String,
}

/// Ordered record of the sender and non-BCC recipients accepted so far in a session.
#[derive(Debug, Default)]
pub struct AddressLedger {
    entries: Vec<LedgerEntry>,
}

impl AddressLedger {
    pub fn new() -> Self {
        AddressLedger::default()
    }

    /// Records a non-BCC address. Must only be called after the server has accepted the
    /// corresponding `MAIL FROM`/`RCPT TO`.
    pub fn push(&mut self, kind: AddressKind, original: String) {
        debug_assert_ne!(kind, AddressKind::Bcc, "BCC addresses must never enter the ledger");
        self.entries.push(LedgerEntry { kind, original });
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The wire address plus the caller's original input, as produced by [`parse_address`].
pub struct ParsedAddress<'a> {
    /// The bare address to send as `<...>` on the wire.
    pub wire: &'a str,
    /// The full original input, to be preserved in headers.
    pub original: &'a str,
}

/// Extracts the e-mail address from either a bare (`user@host`) or display-name
/// (`"Name" <user@host>`) input string.
///
/// The search for `<...>` ignores angle brackets inside double-quoted regions. A lone `<`
/// without a matching `>`, a second `<` after one was already found, or a resulting substring
/// without an `@` are all [`SmtpError::Data`].
pub fn parse_address(input: &str) -> Result<ParsedAddress<'_>> {
    let bytes = input.as_bytes();
    let mut in_quotes = false;
    let mut start: Option<usize> = None;
    let mut end: Option<usize> = None;

    for (idx, &byte) in bytes.iter().enumerate() {
        if !in_quotes {
            match byte {
                b'<' => {
                    if start.is_some() {
                        return Err(SmtpError::data("address contains more than one '<'"));
                    }
                    start = Some(idx + 1);
                }
                b'>' => {
                    if start.is_none() {
                        return Err(SmtpError::data("address contains '>' without a matching '<'"));
                    }
                    end = Some(idx);
                    break;
                }
                _ => {}
            }
        }
        if byte == b'"' {
            in_quotes = !in_quotes;
        }
    }

    let wire = match (start, end) {
        (Some(s), Some(e)) => &input[s..e],
        (Some(_), None) => return Err(SmtpError::data("unbalanced '<' in address")),
        (None, _) => input,
    };

    if !wire.contains('@') {
        return Err(SmtpError::data("address is missing '@'"));
    }

    Ok(ParsedAddress { wire, original: input })
}
