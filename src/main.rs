use std::fs::File;

use log::{error, info};

use direct_smtp::address::AddressKind;
use direct_smtp::config::Config;
use direct_smtp::mime::Attachment;
use direct_smtp::session;

fn main() {
    env_logger::init_from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"));

    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let domain = config.destination_domain()?;

    info!("connecting to {domain}:{}", config.port);
    let mut session = session::connect(domain, config.port, &config.helo_hostname, config.timeout)?;

    session.mail_from(&config.from)?;
    for to in &config.to {
        session.recipient(AddressKind::To, to)?;
    }
    for cc in &config.cc {
        session.recipient(AddressKind::Cc, cc)?;
    }
    for bcc in &config.bcc {
        session.recipient(AddressKind::Bcc, bcc)?;
    }

    let mut files: Vec<File> = config
        .attachments
        .iter()
        .map(File::open)
        .collect::<std::io::Result<_>>()?;
    let mut attachments: Vec<Attachment<'_>> = config
        .attachments
        .iter()
        .zip(files.iter_mut())
        .map(|(path, file)| {
            let filename = path.rsplit('/').next().unwrap_or(path).to_string();
            Attachment::new(file).with_filename(filename)
        })
        .collect();

    let mut boundary_source = session::default_boundary_source();
    session.data(config.subject.as_deref(), &config.body, &mut attachments, &mut boundary_source)?;

    info!("message accepted, disconnecting");
    session.disconnect()?;
    Ok(())
}
