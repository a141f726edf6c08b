//! MX discovery and the connect-and-greet loop.
//!
//! Ports the original library's `Connect`, which walked a preference-ordered list of MX
//! candidates (falling back to the bare hostname's A record if there were none) trying each
//! in turn until one accepted a connection and sent a `220` greeting. The original's
//! `ConnectToMXServer` used the Win32 `DnsQuery_A` API directly; this port uses
//! `hickory-resolver` instead, which is portable and already part of the ambient stack (see
//! DESIGN.md).

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::Resolver;
use log::{debug, info, warn};

use crate::error::{Result, SmtpError};
use crate::reply::read_reply;

/// Default socket connect/read timeout, mirroring `SMTP_BLOCKING_TIME` (15 seconds) in the
/// original.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// One candidate mail server, ranked by MX preference (lower first). A` preference` of `u16::MAX`
/// marks the synthetic candidate used when falling back to the domain's own A record.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub host: String,
    pub preference: u16,
}

/// Resolves `domain`'s MX records, sorted by ascending preference. Falls back to a single
/// synthetic candidate naming `domain` itself if it has no MX records, matching the original's
/// behavior of trying the bare hostname when MX lookup comes back empty.
pub fn resolve_candidates(domain: &str) -> Result<Vec<Candidate>> {
    let resolver = Resolver::new(ResolverConfig::default(), ResolverOpts::default())
        .map_err(|e| SmtpError::protocol(format!("failed to initialize resolver: {e}")))?;

    match resolver.mx_lookup(domain) {
        Ok(lookup) => {
            let mut candidates: Vec<Candidate> = lookup
                .iter()
                .map(|mx| Candidate {
                    host: mx.exchange().to_utf8().trim_end_matches('.').to_string(),
                    preference: mx.preference(),
                })
                .collect();
            candidates.sort_by_key(|c| c.preference);
            if candidates.is_empty() {
                debug!("no MX records for {domain}, falling back to A record");
                Ok(vec![Candidate { host: domain.to_string(), preference: u16::MAX }])
            } else {
                Ok(candidates)
            }
        }
        Err(e) => {
            debug!("MX lookup for {domain} failed ({e}), falling back to A record");
            Ok(vec![Candidate { host: domain.to_string(), preference: u16::MAX }])
        }
    }
}

/// Tries each candidate in order, connecting on `port` and waiting for a `220` greeting.
/// Returns the first connected, greeted socket. Matches the original's "first success wins"
/// strategy across both the MX list and the A-record fallback.
pub fn connect_and_greet(
    candidates: &[Candidate],
    port: u16,
    timeout: Duration,
) -> Result<TcpStream> {
    let mut last_err = None;

    for candidate in candidates {
        match try_candidate(&candidate.host, port, timeout) {
            Ok(stream) => {
                info!("connected to {}:{port}", candidate.host);
                return Ok(stream);
            }
            Err(e) => {
                warn!("candidate {} did not connect or greet: {e}", candidate.host);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| SmtpError::protocol("no MX or A candidates available")))
}

fn try_candidate(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| SmtpError::protocol(format!("could not resolve {host}: {e}")))?
        .next()
        .ok_or_else(|| SmtpError::protocol(format!("{host} resolved to no addresses")))?;

    let stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| SmtpError::protocol(format!("connect to {addr} failed: {e}")))?;
    stream.set_read_timeout(Some(timeout)).map_err(SmtpError::from)?;
    stream.set_write_timeout(Some(timeout)).map_err(SmtpError::from)?;

    let mut greeting_source = stream.try_clone().map_err(SmtpError::from)?;
    let reply = read_reply(&mut greeting_source)?;
    if reply.status != 220 {
        return Err(SmtpError::Failure { status: reply.status, text: reply.text });
    }

    Ok(stream)
}

/// Drains and discards any bytes already buffered on `reader`'s kernel socket buffer beyond
/// what `read_reply` consumed. Used nowhere in normal operation; kept for symmetry with the
/// original's `SMTP_BUFFER_SIZE`-bounded reply handling and exercised directly in tests.
#[cfg(test)]
fn drain_available<R: std::io::Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    reader.read(buf)
}
