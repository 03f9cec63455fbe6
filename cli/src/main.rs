//! tezbot — watches Tezos governance and publishes what happens.
//!
//! ```text
//! tezbot [-c <config.yaml>] [--history] [--from <level>] [--rpc-url <url>] [--json-logs]
//! ```
//!
//! Ballots, proposal injections and upvotes, cycle summaries, period winners
//! and protocol activations are posted to Twitter, or printed to stdout when
//! no access token is configured. Ctrl-C stops the bot.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use tezbot_core::{Publisher, Service};
use tezbot_publish::{
    DebugPublisher, DnsTxtResolver, MessageFormatter, NameResolver, NoopResolver, TwitterConfig,
    TwitterPublisher,
};
use tezbot_rpc::TezosRpcClient;

mod config;
mod logging;

use config::Config;

#[derive(Parser)]
#[command(
    name = "tezbot",
    about = "Tezos governance bot: publishes ballots, proposals and protocol changes",
    version
)]
struct Cli {
    /// Config file
    #[arg(short, long, default_value = "./config.yaml")]
    config: PathBuf,

    /// Replay past blocks instead of following the head
    #[arg(long)]
    history: bool,

    /// First level to replay (implies --history)
    #[arg(long, value_name = "LEVEL")]
    from: Option<u64>,

    /// Node RPC URL (overrides the config file)
    #[arg(long, value_name = "URL")]
    rpc_url: Option<String>,

    /// Emit JSON structured logs
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if self.history {
            config.listener.history = true;
        }
        if let Some(level) = self.from {
            config.listener.history = true;
            config.listener.history_starting_block = level;
        }
        if let Some(url) = &self.rpc_url {
            config.rpc_url = url.clone();
        }
        if self.json_logs {
            config.log.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config)?;
    let found = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    cli.apply(&mut config);

    logging::init_tracing(&config.log)?;
    if !found {
        warn!(path = %cli.config.display(), "config file not found, using defaults");
    }

    let chain = Arc::new(
        TezosRpcClient::default_for(&config.rpc_url).context("creating RPC client")?,
    );
    let publisher = build_publisher(&config).await?;

    let service = Service::new(chain, publisher, config.listener.clone());
    let handle = service.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            handle.stop();
        }
    });

    info!(
        rpc = %config.rpc_url,
        chain = %config.listener.chain,
        history = config.listener.history,
        "bot started"
    );
    service.run().await.context("listener terminated")?;
    Ok(())
}

async fn build_publisher(config: &Config) -> Result<Arc<dyn Publisher>> {
    let names: Arc<dyn NameResolver> = if config.name_lookup {
        Arc::new(DnsTxtResolver::new(&config.doh_endpoint).context("creating name resolver")?)
    } else {
        Arc::new(NoopResolver)
    };
    let formatter = MessageFormatter::new(names);

    if config.twitter_access_token.is_empty() {
        if config.has_partial_twitter_credentials() {
            warn!("twitter consumer credentials set without an access token");
        }
        info!("twitter access token not configured, posting to stdout");
        return Ok(Arc::new(DebugPublisher::new(formatter)));
    }

    let twitter = TwitterPublisher::connect(
        TwitterConfig::new(&config.twitter_access_token),
        formatter,
    )
    .await
    .context("verifying twitter credentials")?;
    Ok(Arc::new(twitter))
}
