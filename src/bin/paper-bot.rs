// Paper Trading Bot - CLI
// Single entry point for paper trading sessions, replays and session history

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use paper_trading_bot::{
    Config, Database, FeedEvent, HoldStrategy, KrakenWebSocketFeed, MacdBollingerStrategy,
    PaperRunner, PreFlightValidator, ReplayFeed, RestPollingFeed, RunReport, SessionRecord,
    Strategy, TradingError, TradingResult,
};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "paper-bot")]
#[command(version = "0.3.0")]
#[command(about = "Paper trading runner with simulated execution", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FeedKind {
    /// Kraken WebSocket ticker stream
    Ws,
    /// Kraken REST polling
    Rest,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and workspace
    Init,

    /// Run against a live market data feed
    Run {
        /// Feed transport
        #[arg(long, value_enum, default_value = "ws")]
        feed: FeedKind,

        /// Stop automatically after this many minutes
        #[arg(short, long)]
        minutes: Option<f64>,

        /// Use the do-nothing hold strategy
        #[arg(long)]
        hold: bool,

        /// Skip session persistence
        #[arg(long)]
        no_db: bool,
    },

    /// Replay a recorded quote file
    Replay {
        /// CSV file with timestamp,symbol,bid,ask lines
        file: String,

        /// Sleep between quotes to mirror recorded timestamps
        #[arg(short, long)]
        paced: bool,

        /// Use the do-nothing hold strategy
        #[arg(long)]
        hold: bool,

        /// Skip session persistence
        #[arg(long)]
        no_db: bool,
    },

    /// Show recent session history
    Status {
        /// Number of sessions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    std::env::set_var("RUST_LOG", log_level);
    tracing_subscriber::fmt::init();

    info!("🚀 Paper Trading Bot v0.3.0");
    info!("📁 Config: {}", cli.config);

    let outcome = match cli.command {
        Commands::Init => init_workspace(&cli.config),
        Commands::Run {
            feed,
            minutes,
            hold,
            no_db,
        } => run_live(&cli.config, feed, minutes, hold, no_db).await,
        Commands::Replay {
            file,
            paced,
            hold,
            no_db,
        } => run_replay(&cli.config, &file, paced, hold, no_db).await,
        Commands::Status { limit } => show_status(&cli.config, limit),
    };

    match outcome {
        Ok(()) => {}
        Err(e) => {
            error!("❌ {}", e.user_message());
            std::process::exit(1);
        }
    }
}

fn init_workspace(config_path: &str) -> TradingResult<()> {
    info!("🔧 Initializing workspace...");

    std::fs::create_dir_all("data")?;

    let config = Config::load_or_create(config_path)?;

    if !config.db_path.is_empty() {
        let db = Database::new(&config.db_path)
            .map_err(|e| TradingError::DatabaseConnection(e.to_string()))?;
        db.run_migrations()
            .map_err(|e| TradingError::DatabaseMigration(e.to_string()))?;
        info!("📁 Session store ready at {}", config.db_path);
    }

    info!("✅ Workspace initialized successfully!");
    info!("💡 Next steps:");
    info!("   1. Edit {} (symbol, capital, stake)", config_path);
    info!("   2. Run: paper-bot run --feed ws");
    info!("   3. Or:  paper-bot replay quotes.csv");

    Ok(())
}

fn load_config(path: &str) -> TradingResult<Config> {
    if !std::path::Path::new(path).exists() {
        return Err(TradingError::ConfigNotFound(path.to_string()));
    }
    Ok(Config::from_file(path)?)
}

fn build_strategy(config: &Config, hold: bool) -> Box<dyn Strategy> {
    if hold {
        Box::new(HoldStrategy)
    } else {
        Box::new(MacdBollingerStrategy::new(&config.trading, &config.strategy))
    }
}

fn open_database(config: &Config, no_db: bool) -> Option<Database> {
    if no_db || config.db_path.is_empty() {
        return None;
    }

    match Database::new(&config.db_path) {
        Ok(db) => match db.run_migrations() {
            Ok(()) => Some(db),
            Err(e) => {
                warn!(error = %e, "migrations failed, continuing without persistence");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "session store unavailable, continuing without persistence");
            None
        }
    }
}

/// Raise the stop flag on Ctrl-C or after an optional deadline
fn spawn_stop_handler(stop_tx: watch::Sender<bool>, minutes: Option<f64>) {
    tokio::spawn(async move {
        let deadline = async {
            match minutes {
                Some(m) => tokio::time::sleep(Duration::from_secs_f64(m * 60.0)).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Ctrl-C received, stopping...");
            }
            _ = deadline => {
                info!("⏰ Session duration reached, stopping...");
            }
        }
        let _ = stop_tx.send(true);
    });
}

async fn run_live(
    config_path: &str,
    feed_kind: FeedKind,
    minutes: Option<f64>,
    hold: bool,
    no_db: bool,
) -> TradingResult<()> {
    let config = load_config(config_path)?;

    let validation = PreFlightValidator::new(config.clone()).validate_for_live().await;
    validation.display();
    if !validation.passed {
        return Err(TradingError::ConfigValidation(
            "pre-flight validation failed".to_string(),
        ));
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let (tx, rx) = mpsc::channel::<FeedEvent>(config.feed.queue_capacity);
    spawn_stop_handler(stop_tx, minutes);

    let symbol = config.trading.symbol.clone();
    let feed_handle: JoinHandle<TradingResult<()>> = match feed_kind {
        FeedKind::Ws => {
            let feed = KrakenWebSocketFeed::new(&config.feed, &symbol);
            tokio::spawn(feed.run(tx, stop_rx))
        }
        FeedKind::Rest => {
            let feed = RestPollingFeed::new(&config.feed, &symbol);
            tokio::spawn(feed.run(tx, stop_rx))
        }
    };

    let strategy = build_strategy(&config, hold);
    let db = open_database(&config, no_db);

    let mut runner = PaperRunner::new(config, strategy);
    if let Some(db) = &db {
        runner.attach_database(db);
    }

    let report = runner.run(rx).await?;

    // The feed exhausting its reconnect attempts fails the run even though
    // the runner drained the queue cleanly
    match feed_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e),
        Err(e) => return Err(TradingError::Internal(format!("feed task panicked: {}", e))),
    }

    print_report(&report);
    Ok(())
}

async fn run_replay(
    config_path: &str,
    file: &str,
    paced: bool,
    hold: bool,
    no_db: bool,
) -> TradingResult<()> {
    let config = load_config(config_path)?;

    let validation = PreFlightValidator::new(config.clone()).validate_for_replay(file);
    validation.display();
    if !validation.passed {
        return Err(TradingError::ConfigValidation(
            "pre-flight validation failed".to_string(),
        ));
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let (tx, rx) = mpsc::channel::<FeedEvent>(config.feed.queue_capacity);
    spawn_stop_handler(stop_tx, None);

    let feed = ReplayFeed::new(file, paced);
    let feed_handle: JoinHandle<TradingResult<()>> = tokio::spawn(feed.run(tx, stop_rx));

    let strategy = build_strategy(&config, hold);
    let db = open_database(&config, no_db);

    let mut runner = PaperRunner::new(config, strategy);
    if let Some(db) = &db {
        runner.attach_database(db);
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} replaying... {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));

    let report = runner.run(rx).await;
    spinner.finish_and_clear();
    let report = report?;

    match feed_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e),
        Err(e) => return Err(TradingError::Internal(format!("feed task panicked: {}", e))),
    }

    print_report(&report);
    Ok(())
}

fn show_status(config_path: &str, limit: usize) -> TradingResult<()> {
    let config = load_config(config_path)?;
    if config.db_path.is_empty() {
        warn!("Persistence is disabled in config, no session history");
        return Ok(());
    }

    let db = Database::new(&config.db_path)
        .map_err(|e| TradingError::DatabaseConnection(e.to_string()))?;
    db.run_migrations()
        .map_err(|e| TradingError::DatabaseMigration(e.to_string()))?;

    let sessions = SessionRecord::list_recent(limit, db.get_connection())
        .map_err(|e| TradingError::DatabaseQuery(e.to_string()))?;

    if sessions.is_empty() {
        info!("No sessions recorded yet");
        return Ok(());
    }

    info!("📊 Recent sessions");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for s in sessions {
        let id = s.id.unwrap_or(0);
        let outcome = s.outcome.as_deref().unwrap_or("running");
        let pnl = s.realized_pnl.unwrap_or(0.0);
        let equity = s.final_equity.unwrap_or(s.starting_capital);
        info!(
            "#{} {} [{}] {} | capital {:.2} -> equity {:.2} | pnl {:+.2} | fills {}",
            id, s.symbol, s.strategy, outcome, s.starting_capital, equity, pnl, s.fill_count
        );
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    let state = &report.ledger;
    info!("📊 Session summary");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("   Quotes processed: {}", report.quotes_processed);
    info!(
        "   Orders: {} submitted, {} rejected",
        report.orders_submitted, report.orders_rejected
    );
    info!("   Fills: {}", state.fill_count);
    info!("   Cash: {:.2}", state.cash);
    info!("   Equity: {:.2}", state.equity);
    info!(
        "   Realized PnL: {:+.2} (unrealized {:+.2})",
        state.realized_pnl, state.unrealized_pnl
    );
    info!("   Fees paid: {:.2}", state.total_fees);
    if let Some(id) = report.session_id {
        info!("   Session id: {}", id);
    }
}
