//! Manages the demo binary's configuration, loaded from environment variables.
//!
//! This module defines the `Config` struct used by `direct_smtp_send` and provides the
//! `from_env` function to populate it. It supports loading variables from a `.env` file via
//! `dotenvy` and provides default values for optional settings, following the required/
//! optional-with-logged-defaults pattern used throughout this crate's ambient stack.

use anyhow::{anyhow, Result};
use std::env;
use std::time::Duration;

/// Holds the demo binary's runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The `MAIL FROM` address, and the `From:` header. (Required: `DIRECT_SMTP_FROM`)
    pub from: String,

    /// `RCPT TO` addresses rendered in the `To:` header. (Required: `DIRECT_SMTP_TO`, comma-separated)
    pub to: Vec<String>,

    /// `RCPT TO` addresses rendered in the `Cc:` header. (Optional: `DIRECT_SMTP_CC`, comma-separated)
    pub cc: Vec<String>,

    /// `RCPT TO` addresses sent on the wire but never rendered in any header. (Optional: `DIRECT_SMTP_BCC`, comma-separated)
    pub bcc: Vec<String>,

    /// The `Subject:` header. (Optional: `DIRECT_SMTP_SUBJECT`)
    pub subject: Option<String>,

    /// The plain-text message body. (Required: `DIRECT_SMTP_BODY`)
    pub body: String,

    /// Filesystem paths of files to attach, base64-encoded into their own MIME parts.
    /// (Optional: `DIRECT_SMTP_ATTACHMENTS`, comma-separated)
    pub attachments: Vec<String>,

    /// The hostname to present in `HELO`. (Optional: `DIRECT_SMTP_HELO_HOSTNAME`, Default: "localhost")
    pub helo_hostname: String,

    /// The destination SMTP port. (Optional: `DIRECT_SMTP_PORT`, Default: 25)
    pub port: u16,

    /// Socket connect/read timeout in seconds. (Optional: `DIRECT_SMTP_TIMEOUT_SECS`, Default: 15)
    pub timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, prefixed `DIRECT_SMTP_`. Supports
    /// loading from a `.env` file if present; a missing `.env` is not an error.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if a required variable is missing or empty, or an optional numeric
    /// variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let from = required("DIRECT_SMTP_FROM")?;
        log::info!("Config: Using from: {}", from);

        let to = required_list("DIRECT_SMTP_TO")?;
        log::info!("Config: Using to: {:?}", to);

        let cc = optional_list("DIRECT_SMTP_CC");
        log::info!("Config: Using cc: {:?}", cc);

        let bcc = optional_list("DIRECT_SMTP_BCC");
        log::info!("Config: Using bcc: {:?}", bcc);

        let subject = env::var("DIRECT_SMTP_SUBJECT").ok();
        log::info!("Config: Using subject: {:?}", subject);

        let body = required("DIRECT_SMTP_BODY")?;

        let attachments = optional_list("DIRECT_SMTP_ATTACHMENTS");
        log::info!("Config: Using attachments: {:?}", attachments);

        let helo_hostname = env::var("DIRECT_SMTP_HELO_HOSTNAME").unwrap_or_else(|_| {
            let default_val = "localhost".to_string();
            log::info!("Config: Using default helo_hostname: {}", default_val);
            default_val
        });

        let port_str = env::var("DIRECT_SMTP_PORT").unwrap_or_else(|_| "25".to_string());
        let port: u16 = port_str
            .parse()
            .map_err(|e| anyhow!("DIRECT_SMTP_PORT ('{port_str}') must be a valid u16 port number: {e}"))?;
        log::info!("Config: Using port: {}", port);

        let timeout_secs: u64 = env::var("DIRECT_SMTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .map_err(|e| anyhow!("DIRECT_SMTP_TIMEOUT_SECS must be a valid u64: {e}"))?;
        log::info!("Config: Using timeout_secs: {}", timeout_secs);

        Ok(Config {
            from,
            to,
            cc,
            bcc,
            subject,
            body,
            attachments,
            helo_hostname,
            port,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// The domain to resolve MX records for, taken from the first `To` address.
    pub fn destination_domain(&self) -> Result<&str> {
        self.to
            .first()
            .and_then(|addr| addr.rsplit('@').next())
            .ok_or_else(|| anyhow!("DIRECT_SMTP_TO must contain at least one address with a domain"))
    }
}

fn required(var: &str) -> Result<String> {
    match env::var(var) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        Ok(_) => {
            let msg = format!("{var} environment variable cannot be empty");
            log::error!("{}", msg);
            Err(anyhow!(msg))
        }
        Err(e) => {
            let msg = format!("{var} environment variable must be set");
            log::error!("{}: {}", msg, e);
            Err(anyhow!(e).context(msg))
        }
    }
}

fn required_list(var: &str) -> Result<Vec<String>> {
    let raw = required(var)?;
    let list = split_list(&raw);
    if list.is_empty() {
        let msg = format!("{var} must contain at least one valid address after trimming and splitting");
        log::error!("{}", msg);
        return Err(anyhow!(msg));
    }
    Ok(list)
}

fn optional_list(var: &str) -> Vec<String> {
    env::var(var).map(|val| split_list(&val)).unwrap_or_default()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

// Include the tests defined in tests.rs
#[cfg(test)]
mod tests;
