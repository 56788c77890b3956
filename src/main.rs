use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use zenith::config::{
    ClientConfig, DEFAULT_CREDENTIAL_NAME, DEFAULT_URL, Deployment, PagerArity, Profile,
};
use zenith::credentials::{CookieJar, CredentialError, CredentialSource};
use zenith::pager;
use zenith::view::{TerminalView, View};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("failed to read stdin: {0}")]
    Stdin(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "zenith", about = "Pager client for the zenith websocket endpoint")]
struct Cli {
    #[arg(long, env = "ZENITH_URL", default_value = DEFAULT_URL)]
    url: String,

    #[arg(long, env = "ZENITH_PROFILE", value_enum, default_value_t = Deployment::Hello)]
    profile: Deployment,

    /// Override the profile's handshake setting.
    #[arg(long)]
    handshake: Option<bool>,

    /// Override the profile's `pager.message` arity.
    #[arg(long, value_enum)]
    arity: Option<PagerArity>,

    #[arg(long, env = "ZENITH_COOKIE", conflicts_with = "cookie_file")]
    cookie: Option<String>,

    #[arg(long, env = "ZENITH_COOKIE_FILE")]
    cookie_file: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_CREDENTIAL_NAME)]
    credential_name: String,
}

impl Cli {
    fn config(&self) -> ClientConfig {
        let mut profile = Profile::from(self.profile);
        if let Some(handshake) = self.handshake {
            profile = profile.with_handshake(handshake);
        }
        if let Some(arity) = self.arity {
            profile = profile.with_pager_arity(arity);
        }
        ClientConfig {
            url: self.url.clone(),
            profile,
            credential_name: self.credential_name.clone(),
        }
    }

    async fn credentials(&self) -> Result<Option<Box<dyn CredentialSource>>, CliError> {
        if let Some(raw) = &self.cookie {
            return Ok(Some(Box::new(CookieJar::parse(raw))));
        }
        if let Some(path) = &self.cookie_file {
            return Ok(Some(Box::new(CookieJar::load(path).await?)));
        }
        Ok(None)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = cli.config();
    let credentials = cli.credentials().await?;

    let view: Rc<dyn View> = Rc::new(TerminalView);
    let (mut router, mut events) = pager::connect(&config, view, credentials);
    router.on_disconnect(|reason| {
        if let Some(reason) = reason {
            eprintln!("disconnected: {reason}");
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    while !router.state().is_closed() {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => router.handle_event(event),
                None => break,
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    if let Err(error) = pager::send_prompted(&mut router, || Some(line)) {
                        warn!(%error, "message not sent");
                    }
                }
                None => {
                    stdin_open = false;
                    router.close();
                }
            },
        }
    }

    Ok(())
}
