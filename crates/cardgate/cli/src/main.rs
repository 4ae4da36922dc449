use std::path::PathBuf;
use std::time::Duration;

use cardgate::{CardKind, Client, ClientConfig, PinRequest, ReaderFilter};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use url::Url;

mod config;

#[derive(Parser)]
#[command(version, about = "Bootstrap and inspect the local smartcard agent")]
struct Cli {
    /// Configuration file (defaults to ~/.cardgate/cardgate.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the agent API
    #[arg(long)]
    agent_url: Option<String>,

    /// Base URL of the distribution service API
    #[arg(long)]
    ds_url: Option<Url>,

    /// Distribution service API key
    #[arg(long)]
    api_key: Option<String>,

    /// Debug level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Establish trust, register the device and install required containers
    Init,

    /// Show the agent self-report
    Info,

    /// List card readers
    Readers {
        /// Only readers with a card inserted
        #[arg(long, conflicts_with = "without_card")]
        with_card: bool,

        /// Only readers without a card
        #[arg(long)]
        without_card: bool,
    },

    /// Wait until a card is inserted
    WaitCard {
        /// Seconds to wait
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// Show the distribution service status
    Status,

    /// Print the installer download link for this platform
    DownloadLink,

    /// Initialize, then exchange the capability token for a fresh one
    RefreshToken,

    /// Initialize, then verify the card holder PIN
    VerifyPin {
        /// Card type in the reader
        #[arg(long, value_enum)]
        card: CardArg,

        /// Reader identifier
        #[arg(long)]
        reader: String,

        /// PIN code, omit to use the reader pinpad
        #[arg(long)]
        pin: Option<String>,

        /// Let the OS prompt for the PIN
        #[arg(long)]
        os_dialog: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CardArg {
    Beid,
    Luxeid,
    Dnie,
    Emv,
    Piv,
    Ocra,
    Aventra,
    Oberthur,
    Pkcs11,
}

impl From<CardArg> for CardKind {
    fn from(card: CardArg) -> Self {
        match card {
            CardArg::Beid => Self::BeId,
            CardArg::Luxeid => Self::LuxId,
            CardArg::Dnie => Self::Dnie,
            CardArg::Emv => Self::Emv,
            CardArg::Piv => Self::Piv,
            CardArg::Ocra => Self::Ocra,
            CardArg::Aventra => Self::Aventra,
            CardArg::Oberthur => Self::Oberthur,
            CardArg::Pkcs11 => Self::Pkcs11,
        }
    }
}

impl Cli {
    /// Load the configuration and apply command line overrides
    fn client_config(&self) -> eyre::Result<ClientConfig> {
        let mut config = config::load_config(self.config.as_deref())?;
        if let Some(url) = &self.agent_url {
            config.agent_url = url.clone();
        }
        if let Some(url) = &self.ds_url {
            config.distribution_url = Some(url.clone());
        }
        if let Some(api_key) = &self.api_key {
            config.api_key = Some(api_key.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = cli.client_config()?;
    debug!(agent = %config.agent_url, "loaded configuration");
    let client = Client::new(config)?;

    match cli.command {
        Commands::Init => {
            let init = client.initialize().await?;
            info!(uuid = %init.identity.uuid, version = %init.agent.version, "device initialized");
            println!("device:  {}", init.identity.uuid);
            println!("agent:   {}", init.agent.version);
            println!("mode:    {:?}", init.mode);
            println!("sync:    {:?}", init.sync);
        }
        Commands::Info => {
            let agent = client.agent().info().await?;
            println!("uid:        {}", agent.uid);
            println!("version:    {}", agent.version);
            println!("activated:  {}", agent.activated);
            println!("managed:    {}", agent.managed);
            match agent.containers {
                cardgate::ContainerSupport::Legacy => println!("containers: not supported"),
                cardgate::ContainerSupport::Managed(containers) => {
                    println!("containers:");
                    for container in containers {
                        println!("  {} {} {}", container.name, container.version, container.status);
                    }
                }
            }
        }
        Commands::Readers {
            with_card,
            without_card,
        } => {
            let filter = match (with_card, without_card) {
                (true, _) => ReaderFilter::WithCard,
                (_, true) => ReaderFilter::WithoutCard,
                _ => ReaderFilter::All,
            };
            for reader in client.agent().readers(filter).await? {
                let card = reader.card.as_ref().map_or("-", |card| card.atr.as_str());
                let pinpad = if reader.pinpad { "pinpad" } else { "" };
                println!("{}\t{}\t{}\t{}", reader.id, reader.name, card, pinpad);
            }
        }
        Commands::WaitCard { timeout } => {
            let reader = client.wait_for_card(Duration::from_secs(timeout)).await?;
            println!("card inserted in {} ({})", reader.name, reader.id);
        }
        Commands::Status => {
            let status = client.distribution().system_status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::DownloadLink => {
            println!("{}", client.download_link().await?.url);
        }
        Commands::RefreshToken => {
            client.initialize().await?;
            let token = client.refresh_token().await?;
            println!("required containers: {}", token.required());
            if let Some(expires_at) = token.expires_at() {
                println!("expires at: {expires_at:?}");
            }
        }
        Commands::VerifyPin {
            card,
            reader,
            pin,
            os_dialog,
        } => {
            client.initialize().await?;
            let request = match pin {
                Some(pin) => PinRequest::with_pin(pin),
                None => PinRequest::without_pin(),
            }
            .with_os_dialog(os_dialog);
            let response = client.card(card.into(), reader).await.verify_pin(request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, &directives))
        .with_ansi(true)
        .init();
}

/// `RUST_LOG` style `directives` over a default of `info`, or `debug` when verbose
fn log_filter(verbose: bool, directives: &str) -> EnvFilter {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy(directives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    fn enabled_levels(filter: EnvFilter) -> (bool, bool, bool) {
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
        tracing::subscriber::with_default(subscriber, || {
            (
                tracing::enabled!(Level::WARN),
                tracing::enabled!(Level::INFO),
                tracing::enabled!(Level::DEBUG),
            )
        })
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(enabled_levels(log_filter(false, "")), (true, true, false));
        assert_eq!(enabled_levels(log_filter(true, "")), (true, true, true));
        assert_eq!(enabled_levels(log_filter(true, "warn")), (true, false, false));
    }
}
