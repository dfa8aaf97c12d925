// End-to-end runner tests over replayed quote files

mod common;

use common::{create_temp_db_dir, create_test_config, generate_test_quotes};
use paper_trading_bot::{
    Database, FeedEvent, FillRecord, HoldStrategy, LedgerState, MacdBollingerStrategy,
    OrderRequest, PaperRunner, Quote, ReplayFeed, RunnerState, SessionRecord, Side, Strategy,
    TradingResult,
};
use std::io::Write;
use tokio::sync::{mpsc, watch};

fn write_quote_file(quotes: &[Quote]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "timestamp,symbol,bid,ask").unwrap();
    for q in quotes {
        writeln!(
            file,
            "{},{},{},{}",
            q.timestamp.to_rfc3339(),
            q.symbol,
            q.bid,
            q.ask
        )
        .unwrap();
    }
    file
}

async fn replay_session(
    quotes: &[Quote],
    strategy: Box<dyn Strategy>,
    db: Option<&Database>,
) -> LedgerState {
    let file = write_quote_file(quotes);
    let config = create_test_config();

    let (tx, rx) = mpsc::channel::<FeedEvent>(config.feed.queue_capacity);
    let (_stop_tx, stop_rx) = watch::channel(false);

    let feed = ReplayFeed::new(file.path(), false);
    let feed_handle = tokio::spawn(feed.run(tx, stop_rx));

    let mut runner = PaperRunner::new(config, strategy);
    if let Some(db) = db {
        runner.attach_database(db);
    }

    let report = runner.run(rx).await.expect("run should not fail");
    feed_handle.await.unwrap().expect("feed should not fail");

    assert_eq!(report.state, RunnerState::Stopped);
    report.ledger
}

#[tokio::test]
async fn test_hold_strategy_preserves_capital() {
    let quotes = generate_test_quotes(50_000.0, 100, 0.002);
    let state = replay_session(&quotes, Box::new(HoldStrategy), None).await;

    assert_eq!(state.fill_count, 0);
    assert_eq!(state.cash, 10_000.0);
    assert_eq!(state.equity, 10_000.0);
}

#[tokio::test]
async fn test_replay_is_deterministic() {
    let config = create_test_config();
    let quotes = generate_test_quotes(50_000.0, 300, 0.004);

    let first = replay_session(
        &quotes,
        Box::new(MacdBollingerStrategy::new(&config.trading, &config.strategy)),
        None,
    )
    .await;
    let second = replay_session(
        &quotes,
        Box::new(MacdBollingerStrategy::new(&config.trading, &config.strategy)),
        None,
    )
    .await;

    assert_eq!(first.cash, second.cash);
    assert_eq!(first.equity, second.equity);
    assert_eq!(first.realized_pnl, second.realized_pnl);
    assert_eq!(first.fill_count, second.fill_count);
}

/// Buys a fixed quantity on the first quote it sees
struct BuyOnce {
    bought: bool,
}

impl Strategy for BuyOnce {
    fn name(&self) -> &str {
        "buy-once"
    }

    fn on_quote(&mut self, quote: &Quote, _ledger: &LedgerState) -> TradingResult<Vec<OrderRequest>> {
        if self.bought {
            return Ok(Vec::new());
        }
        self.bought = true;
        Ok(vec![OrderRequest::market(quote.symbol.clone(), Side::Buy, 0.01)])
    }
}

#[tokio::test]
async fn test_session_history_survives_the_run() {
    let (_temp_dir, db_path) = create_temp_db_dir();
    let db = Database::new(&db_path).expect("Failed to create database");
    db.run_migrations().expect("Failed to run migrations");

    let quotes = generate_test_quotes(50_000.0, 50, 0.002);
    let state = replay_session(&quotes, Box::new(BuyOnce { bought: false }), Some(&db)).await;
    assert_eq!(state.fill_count, 1);

    let sessions = SessionRecord::list_recent(10, db.get_connection()).unwrap();
    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert_eq!(session.outcome.as_deref(), Some("stopped"));
    assert_eq!(session.fill_count, 1);
    assert_eq!(session.strategy, "buy-once");

    let fills = FillRecord::for_session(session.id.unwrap(), db.get_connection()).unwrap();
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].side, Side::Buy);
}

#[tokio::test]
async fn test_malformed_replay_lines_are_skipped() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "timestamp,symbol,bid,ask").unwrap();
    writeln!(file, "2024-03-01T12:00:00Z,BTC-USDT,100.0,100.2").unwrap();
    writeln!(file, "this is not a quote").unwrap();
    writeln!(file, "2024-03-01T12:00:01Z,BTC-USDT,100.1,100.3").unwrap();

    let config = create_test_config();
    let (tx, rx) = mpsc::channel::<FeedEvent>(16);
    let (_stop_tx, stop_rx) = watch::channel(false);

    let feed = ReplayFeed::new(file.path(), false);
    let feed_handle = tokio::spawn(feed.run(tx, stop_rx));

    let mut runner = PaperRunner::new(config, Box::new(HoldStrategy));
    let report = runner.run(rx).await.unwrap();
    feed_handle.await.unwrap().unwrap();

    assert_eq!(report.state, RunnerState::Stopped);
    assert_eq!(report.quotes_processed, 2);
}
