use std::sync::Arc;

use clap::Parser;

use perpbot::api::{BitMexClient, RetryPolicy};
use perpbot::config::BotConfig;
use perpbot::dispatcher::Dispatcher;
use perpbot::execution::OrderExecutor;
use perpbot::feed::{ChannelFeed, RestPoller};
use perpbot::notify::{NoopNotifier, Notifier, WebhookNotifier};
use perpbot::strategy::SmaCross;

/// Derivatives strategy runner
#[derive(Parser, Debug)]
#[command(name = "perpbot", about = "Runs a candle-driven strategy against BitMEX")]
struct Cli {
    /// Use the testnet endpoints and credentials
    #[arg(long)]
    testnet: bool,

    /// Contract symbol (default XBTUSD)
    #[arg(long)]
    symbol: Option<String>,

    /// Strategy timeframe, e.g. 5m or 1h
    #[arg(long)]
    timeframe: Option<String>,

    /// Rolling window length in bins
    #[arg(long)]
    window: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let mut config = BotConfig::from_env(cli.testnet)?;
    if let Some(symbol) = cli.symbol {
        config.symbol = symbol;
    }
    if let Some(timeframe) = cli.timeframe {
        config.timeframe = timeframe.parse()?;
    }
    if let Some(window) = cli.window {
        config.window_len = window;
    }

    tracing::info!(
        symbol = %config.symbol,
        timeframe = %config.timeframe,
        window = config.window_len,
        testnet = config.testnet,
        "perpbot starting"
    );

    let api = Arc::new(BitMexClient::new(&config));
    let retry = RetryPolicy::default();
    let orders = OrderExecutor::new(api.clone(), retry.clone());
    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(NoopNotifier),
    };

    let lot = orders.default_lot(config.retain_rate).await?;
    tracing::info!(lot, "sized default lot from wallet and leverage");
    let strategy = Box::new(SmaCross::new(10, 20, lot));

    let (tx, mut feed) = ChannelFeed::new(64);
    let poller = RestPoller::new(api.clone(), retry.clone(), config.timeframe.native());
    tokio::spawn(poller.run(tx));

    let mut dispatcher = Dispatcher::new(
        api,
        retry,
        orders,
        strategy,
        notifier,
        config.timeframe,
        config.window_len,
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("ctrl-c received, shutting down");
        }
        result = dispatcher.run(&mut feed) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "bot stopped");
            }
        }
    }

    tracing::info!("perpbot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter("perpbot=info")
        .init();
}
