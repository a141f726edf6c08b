use crate::config::Config;
use std::env;
use std::sync::{Mutex, OnceLock};

/// `Config::from_env` reads process-wide environment variables, so tests that set them must
/// not run concurrently with each other.
fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn clear_all() {
    for var in [
        "DIRECT_SMTP_FROM",
        "DIRECT_SMTP_TO",
        "DIRECT_SMTP_CC",
        "DIRECT_SMTP_BCC",
        "DIRECT_SMTP_SUBJECT",
        "DIRECT_SMTP_BODY",
        "DIRECT_SMTP_ATTACHMENTS",
        "DIRECT_SMTP_HELO_HOSTNAME",
        "DIRECT_SMTP_PORT",
        "DIRECT_SMTP_TIMEOUT_SECS",
    ] {
        env::remove_var(var);
    }
}

#[test]
fn config_from_env_reads_every_variable() {
    let _guard = env_lock().lock().unwrap();
    clear_all();
    env::set_var("DIRECT_SMTP_FROM", "sender@example.com");
    env::set_var("DIRECT_SMTP_TO", "a@example.org, b@example.org");
    env::set_var("DIRECT_SMTP_CC", "c@example.org");
    env::set_var("DIRECT_SMTP_SUBJECT", "Hello");
    env::set_var("DIRECT_SMTP_BODY", "Body text");
    env::set_var("DIRECT_SMTP_HELO_HOSTNAME", "client.example.com");
    env::set_var("DIRECT_SMTP_PORT", "2525");

    let config = Config::from_env().expect("config should load");

    assert_eq!(config.from, "sender@example.com");
    assert_eq!(config.to, vec!["a@example.org", "b@example.org"]);
    assert_eq!(config.cc, vec!["c@example.org"]);
    assert!(config.bcc.is_empty());
    assert_eq!(config.subject.as_deref(), Some("Hello"));
    assert_eq!(config.helo_hostname, "client.example.com");
    assert_eq!(config.port, 2525);
    assert_eq!(config.destination_domain().unwrap(), "example.org");

    clear_all();
}

#[test]
fn config_default_values_apply_when_optional_vars_absent() {
    let _guard = env_lock().lock().unwrap();
    clear_all();
    env::set_var("DIRECT_SMTP_FROM", "sender@example.com");
    env::set_var("DIRECT_SMTP_TO", "a@example.org");
    env::set_var("DIRECT_SMTP_BODY", "Body text");

    let config = Config::from_env().expect("config should load");

    assert_eq!(config.helo_hostname, "localhost");
    assert_eq!(config.port, 25);
    assert_eq!(config.timeout.as_secs(), 15);
    assert!(config.subject.is_none());

    clear_all();
}

#[test]
fn missing_required_vars_is_an_error() {
    let _guard = env_lock().lock().unwrap();
    clear_all();

    let result = Config::from_env();
    assert!(result.is_err());

    clear_all();
}

#[test]
fn empty_to_list_after_trimming_is_an_error() {
    let _guard = env_lock().lock().unwrap();
    clear_all();
    env::set_var("DIRECT_SMTP_FROM", "sender@example.com");
    env::set_var("DIRECT_SMTP_TO", " , ,");
    env::set_var("DIRECT_SMTP_BODY", "Body text");

    let result = Config::from_env();
    assert!(result.is_err());

    clear_all();
}
