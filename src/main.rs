//! Kline Trend Trader - Main Entry Point
//!
//! Runs the decision loop against Binance, with simulated fills in paper mode.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kline_trend_trader::config::Config;
use kline_trend_trader::engine::{Collaborators, TradingEngine};
use kline_trend_trader::events::{EventPublisher, LogPublisher, WebhookPublisher};
use kline_trend_trader::exchange::{BinanceClient, MockExchange, OrderGateway};
use kline_trend_trader::persistence::{CsvPositionStore, PositionStore, TradeJournal};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Kline Trend Trader CLI
#[derive(Parser)]
#[command(name = "kline-trend-trader")]
#[command(version, about = "Trend-renewal spot trading on Binance")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trading loop (default)
    Run {
        /// Simulate fills instead of sending orders
        #[arg(long)]
        paper: bool,
    },

    /// Show open positions and recent trades from persisted state
    Status {
        /// Number of recent trades to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;
    config.validate()?;

    match cli.command {
        Some(Commands::Status { limit }) => show_status(&config, limit),
        Some(Commands::Run { paper }) => run(config, paper).await,
        None => run(config, false).await,
    }
}

async fn run(mut config: Config, paper: bool) -> Result<()> {
    init_logging()?;
    config.execution.paper_trading |= paper;

    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║           Kline Trend Trader v{}                        ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");
    log_config(&config);

    let client = Arc::new(BinanceClient::new(&config.binance)?);

    let gateway: Arc<dyn OrderGateway> = if config.execution.paper_trading {
        info!("📝 PAPER TRADING MODE - fills are simulated");
        Arc::new(MockExchange::new())
    } else {
        anyhow::ensure!(
            client.has_credentials(),
            "live trading requires binance.api_key and binance.secret_key"
        );
        warn!("⚠️  LIVE TRADING MODE - Real money at risk!");
        client.clone()
    };

    let publisher: Arc<dyn EventPublisher> = match &config.publisher.webhook_url {
        Some(url) => {
            info!("Webhook event publishing enabled");
            Arc::new(WebhookPublisher::new(url, &config.publisher)?)
        }
        None => Arc::new(LogPublisher),
    };

    let store = CsvPositionStore::new(&config.persistence.positions_path, config.risk.clone());
    let journal = TradeJournal::open(&config.persistence.journal_path)
        .context("Failed to open trade journal")?;

    let mut engine = TradingEngine::new(
        config,
        Collaborators {
            source: client,
            gateway,
            publisher,
            store: Box::new(store),
            journal,
        },
    )
    .context("Failed to restore engine state")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received, stopping after the current cycle");
        let _ = shutdown_tx.send(true);
    });

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    engine.run(shutdown_rx).await;

    let state = engine.state();
    info!("🏁 Final state: {} open positions, {} recent exits", state.positions.len(), state.recent_exits.len());
    info!("👋 Kline Trend Trader shutdown complete");
    Ok(())
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "kline-trader.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("kline_trend_trader=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    let horizons: Vec<String> = config.strategy.horizons.iter().map(|h| h.to_string()).collect();
    info!("📋 Configuration:");
    info!("   Horizons: {}", horizons.join(", "));
    info!("   Days Analyzed: {}", config.strategy.days_to_analyze);
    info!(
        "   Moving-Average Filter: {}",
        if config.strategy.moving_average_filter { "on" } else { "off" }
    );
    info!(
        "   Stops: day {}% / hour {}% / minute {}%",
        config.risk.day_threshold, config.risk.hour_threshold, config.risk.minute_threshold
    );
    info!("   Repurchase Recovery: {}%", config.risk.repurchase_recovery_pct);
    info!(
        "   Order Value: {} {}",
        config.execution.order_value, config.strategy.quote_asset
    );
    info!("   Max Open Positions: {}", config.execution.max_open_positions);
    info!("   Tick Interval: {}s", config.execution.tick_interval_secs);
}

/// Print open positions and journal history.
fn show_status(config: &Config, limit: usize) -> Result<()> {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              KLINE TREND TRADER STATUS                     ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let store = CsvPositionStore::new(&config.persistence.positions_path, config.risk.clone());
    let positions = store.load()?;

    println!("\n🔓 Open Positions ({})", positions.len());
    for p in &positions {
        let total = p.total_change(p.current_price).unwrap_or_default();
        println!("   ┌─ {} [{}]", p.symbol, p.horizon);
        println!("   ├─ Entry:        {} x {} = {}", p.entry_price, p.quantity, p.entry_value.round_dp(4));
        println!("   ├─ Last:         {} ({:+.2}%)", p.current_price, total);
        println!("   ├─ Valorization: {:+.2}%", p.valorization);
        println!("   ├─ Stop:         {}%", p.risk_threshold);
        println!("   └─ Opened:       {}", p.opened_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    if !Path::new(&config.persistence.journal_path).exists() {
        println!("\n❌ Journal not found: {}", config.persistence.journal_path);
        println!();
        return Ok(());
    }

    let journal = TradeJournal::open(&config.persistence.journal_path)?;
    let summary = journal.summary()?;

    println!("\n📈 Activity");
    println!("   ├─ Entries:            {}", summary.entries);
    println!("   ├─ Exits:              {} ({} wins / {} losses)", summary.exits, summary.wins, summary.losses);
    println!("   ├─ Total Valorization: {:+.2}%", summary.total_valorization);
    println!("   └─ Realized PnL:       {:.4}", summary.realized_pnl);

    let trades = journal.recent_trades(limit)?;
    if !trades.is_empty() {
        println!("\n📜 Recent Trades");
        for t in &trades {
            let detail = match (t.valorization, t.reason) {
                (Some(v), Some(r)) => format!(" {:+.2}% ({})", v, r),
                _ => String::new(),
            };
            println!(
                "   ├─ {} {} {} {} @ {} [{}]{}",
                t.timestamp.format("%Y-%m-%d %H:%M"),
                t.side,
                t.quantity,
                t.symbol,
                t.price,
                t.horizon,
                detail
            );
        }
    }

    println!();
    Ok(())
}
