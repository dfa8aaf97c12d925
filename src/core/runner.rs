// Paper trading runner
//
// Single-threaded over the ledger: quotes arrive on one channel and every
// mutation of simulator and ledger happens inside this loop, which is what
// makes a replayed session reproduce the same final state. Each quote goes
// through the same sequence: re-evaluate resting orders, mark to market,
// let the strategy decide, submit its orders.

use crate::config::Config;
use crate::core::ledger::{Ledger, LedgerState};
use crate::core::strategy::Strategy;
use crate::db::{Database, FillRecord, SessionRecord};
use crate::error::{TradingError, TradingResult};
use crate::feed::FeedEvent;
use crate::simulation::{FeeConfig, OrderSimulator, Submission};
use crate::types::{Fill, Instrument, Quote};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
    Stopped,
    Failed,
}

/// Summary handed back when a run ends
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: RunnerState,
    pub ledger: LedgerState,
    pub quotes_processed: u64,
    pub orders_submitted: u64,
    pub orders_rejected: u64,
    pub session_id: Option<i64>,
}

struct Persistence {
    session_id: i64,
    conn: Arc<Mutex<Connection>>,
}

pub struct PaperRunner {
    config: Config,
    ledger: Ledger,
    simulator: OrderSimulator,
    strategy: Box<dyn Strategy>,
    state: RunnerState,
    persistence: Option<Persistence>,
    quotes_processed: u64,
    orders_submitted: u64,
    orders_rejected: u64,
}

impl PaperRunner {
    pub fn new(config: Config, strategy: Box<dyn Strategy>) -> Self {
        let fees = FeeConfig {
            maker_fee_bps: config.trading.maker_fee_bps,
            taker_fee_bps: config.trading.taker_fee_bps,
        };
        let mut simulator = OrderSimulator::new(fees, config.trading.order_ttl_quotes);
        simulator.register_instrument(Instrument::new(
            config.trading.symbol.clone(),
            config.trading.tick_size,
            config.trading.lot_size,
        ));

        let ledger = Ledger::new(config.trading.starting_capital);

        Self {
            config,
            ledger,
            simulator,
            strategy,
            state: RunnerState::Idle,
            persistence: None,
            quotes_processed: 0,
            orders_submitted: 0,
            orders_rejected: 0,
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Attach a session store. A failed attach is logged and ignored so
    /// the run can proceed without history.
    pub fn attach_database(&mut self, db: &Database) {
        let record = SessionRecord::new(
            &self.config.trading.symbol,
            self.strategy.name(),
            self.config.trading.starting_capital,
        );
        match record.insert(db.get_connection()) {
            Ok(session_id) => {
                info!(session_id, "📁 session recording started");
                self.persistence = Some(Persistence {
                    session_id,
                    conn: db.get_connection(),
                });
            }
            Err(e) => {
                warn!(error = %e, "session store unavailable, continuing without persistence");
            }
        }
    }

    /// Consume the feed until it closes or a fatal error occurs
    pub async fn run(&mut self, mut rx: mpsc::Receiver<FeedEvent>) -> TradingResult<RunReport> {
        self.state = RunnerState::Running;
        info!(
            symbol = %self.config.trading.symbol,
            strategy = self.strategy.name(),
            capital = self.config.trading.starting_capital,
            "🚀 paper trading started"
        );

        while let Some(event) = rx.recv().await {
            match event {
                FeedEvent::Quote(quote) => {
                    if let Err(e) = self.process_quote(&quote) {
                        self.fail(&e);
                        return Err(e);
                    }
                }
                FeedEvent::Error(e) => {
                    // The feed already decided to keep going
                    warn!(category = e.category(), error = %e, "feed reported a problem");
                }
            }
        }

        // Closed channel is the normal end of data
        self.finish();
        Ok(self.report())
    }

    fn process_quote(&mut self, quote: &Quote) -> TradingResult<()> {
        if !quote.is_valid() {
            warn!(bid = quote.bid, ask = quote.ask, "dropping invalid quote");
            return Ok(());
        }

        self.quotes_processed += 1;
        if self.config.logging.enable_quote_logging {
            debug!(symbol = %quote.symbol, bid = quote.bid, ask = quote.ask, "quote");
        }
        self.persist_quote(quote);

        // Resting limit orders see the quote before the strategy does
        let resting_fills = self.simulator.on_quote(quote, &mut self.ledger);
        for fill in &resting_fills {
            self.persist_fill(fill);
        }

        self.ledger.mark_to_market(self.simulator.quotes());
        self.ledger.check_invariant()?;

        let decisions = self
            .strategy
            .on_quote(quote, &self.ledger.snapshot())
            .map_err(|e| TradingError::StrategyFailed(e.to_string()))?;

        for request in &decisions {
            self.orders_submitted += 1;
            match self.simulator.submit(request, &mut self.ledger) {
                Ok(Submission::Filled(fill)) => {
                    if self.config.logging.enable_fill_logging {
                        info!(
                            side = %fill.side,
                            price = fill.price,
                            quantity = fill.quantity,
                            equity = self.ledger.equity(),
                            "fill applied"
                        );
                    }
                    self.persist_fill(&fill);
                }
                Ok(Submission::Accepted(order_id)) => {
                    debug!(order_id = %order_id, "order resting");
                }
                Err(e) if e.is_rejection() => {
                    // Rejections are data, not failures
                    self.orders_rejected += 1;
                    warn!(error = %e, "order rejected");
                }
                Err(e) => return Err(e),
            }
        }

        if !decisions.is_empty() || !resting_fills.is_empty() {
            self.ledger.mark_to_market(self.simulator.quotes());
            self.ledger.check_invariant()?;
            if self.config.logging.enable_equity_logging {
                debug!(equity = self.ledger.equity(), cash = self.ledger.cash(), "equity updated");
            }
            self.persist_equity();
        }

        Ok(())
    }

    fn finish(&mut self) {
        self.state = RunnerState::Stopped;
        let state = self.ledger.snapshot();
        info!(
            quotes = self.quotes_processed,
            fills = state.fill_count,
            equity = state.equity,
            realized_pnl = state.realized_pnl,
            fees = state.total_fees,
            "✅ session stopped"
        );

        if let Some(p) = &self.persistence {
            if let Err(e) = SessionRecord::finish(p.session_id, &state, "stopped", Arc::clone(&p.conn)) {
                warn!(error = %e, "failed to close session record");
            }
        }
    }

    fn fail(&mut self, cause: &TradingError) {
        self.state = RunnerState::Failed;
        error!(category = cause.category(), error = %cause, "❌ session failed");

        let state = self.ledger.snapshot();
        if let Some(p) = &self.persistence {
            if let Err(e) = SessionRecord::finish(p.session_id, &state, "failed", Arc::clone(&p.conn)) {
                warn!(error = %e, "failed to close session record");
            }
        }
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            state: self.state,
            ledger: self.ledger.snapshot(),
            quotes_processed: self.quotes_processed,
            orders_submitted: self.orders_submitted,
            orders_rejected: self.orders_rejected,
            session_id: self.persistence.as_ref().map(|p| p.session_id),
        }
    }

    fn persist_quote(&self, quote: &Quote) {
        if let Some(p) = &self.persistence {
            if let Err(e) = SessionRecord::record_quote(p.session_id, quote, Arc::clone(&p.conn)) {
                warn!(error = %e, "failed to persist quote");
            }
        }
    }

    fn persist_fill(&self, fill: &Fill) {
        if let Some(p) = &self.persistence {
            let record = FillRecord::from_fill(p.session_id, fill);
            if let Err(e) = record.insert(Arc::clone(&p.conn)) {
                warn!(error = %e, "failed to persist fill");
            }
        }
    }

    fn persist_equity(&self) {
        if let Some(p) = &self.persistence {
            let state = self.ledger.snapshot();
            if let Err(e) = SessionRecord::record_equity(p.session_id, &state, Arc::clone(&p.conn)) {
                warn!(error = %e, "failed to persist equity point");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::strategy::HoldStrategy;
    use crate::error::TradingResult;
    use crate::types::{OrderRequest, Side};
    use chrono::Utc;

    fn config() -> Config {
        let mut config = Config::default();
        config.trading.symbol = "X".to_string();
        config.trading.starting_capital = 10_000.0;
        config.trading.trade_stake = 1_000.0;
        config.trading.maker_fee_bps = 0.0;
        config.trading.taker_fee_bps = 0.0;
        config.db_path = String::new();
        config
    }

    fn quote(bid: f64, ask: f64) -> Quote {
        Quote::new("X", bid, ask, Utc::now())
    }

    /// Buys a fixed quantity on the first quote, then holds
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
            Ok(vec![OrderRequest::market(quote.symbol.clone(), Side::Buy, 10.0)])
        }
    }

    /// Fails on the first quote it sees
    struct Explode;

    impl Strategy for Explode {
        fn name(&self) -> &str {
            "explode"
        }

        fn on_quote(&mut self, _quote: &Quote, _ledger: &LedgerState) -> TradingResult<Vec<OrderRequest>> {
            Err(TradingError::StrategyFailed("boom".to_string()))
        }
    }

    /// Asks for a quantity the simulator will reject, every quote
    struct BadSizer;

    impl Strategy for BadSizer {
        fn name(&self) -> &str {
            "bad-sizer"
        }

        fn on_quote(&mut self, quote: &Quote, _ledger: &LedgerState) -> TradingResult<Vec<OrderRequest>> {
            Ok(vec![OrderRequest::market(quote.symbol.clone(), Side::Buy, -1.0)])
        }
    }

    async fn run_with(strategy: Box<dyn Strategy>, quotes: Vec<Quote>) -> TradingResult<RunReport> {
        let mut runner = PaperRunner::new(config(), strategy);
        let (tx, rx) = mpsc::channel(16);
        for q in quotes {
            tx.send(FeedEvent::Quote(q)).await.unwrap();
        }
        drop(tx);
        runner.run(rx).await
    }

    #[tokio::test]
    async fn test_exhausted_feed_stops_cleanly() {
        let report = run_with(Box::new(HoldStrategy), vec![quote(99.0, 101.0)])
            .await
            .unwrap();
        assert_eq!(report.state, RunnerState::Stopped);
        assert_eq!(report.quotes_processed, 1);
        assert_eq!(report.ledger.equity, 10_000.0);
    }

    #[tokio::test]
    async fn test_strategy_orders_reach_the_ledger() {
        let report = run_with(
            Box::new(BuyOnce { bought: false }),
            vec![quote(99.0, 101.0), quote(104.0, 106.0)],
        )
        .await
        .unwrap();

        assert_eq!(report.state, RunnerState::Stopped);
        assert_eq!(report.ledger.fill_count, 1);
        // 10 bought at 101, marked at the later bid of 104
        assert!((report.ledger.cash - 8_990.0).abs() < 1e-9);
        assert!((report.ledger.equity - 10_030.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_strategy_error_fails_the_run() {
        let err = run_with(Box::new(Explode), vec![quote(99.0, 101.0)])
            .await
            .unwrap_err();
        assert!(matches!(err, TradingError::StrategyFailed(_)));
    }

    #[tokio::test]
    async fn test_rejections_do_not_stop_the_run() {
        let report = run_with(
            Box::new(BadSizer),
            vec![quote(99.0, 101.0), quote(99.0, 101.0), quote(99.0, 101.0)],
        )
        .await
        .unwrap();

        assert_eq!(report.state, RunnerState::Stopped);
        assert_eq!(report.orders_rejected, 3);
        assert_eq!(report.ledger.fill_count, 0);
    }

    #[tokio::test]
    async fn test_invalid_quotes_are_dropped() {
        let report = run_with(
            Box::new(HoldStrategy),
            vec![quote(101.0, 99.0), quote(99.0, 101.0)],
        )
        .await
        .unwrap();

        assert_eq!(report.quotes_processed, 1);
    }

    #[tokio::test]
    async fn test_session_persisted_when_database_attached() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();

        let mut runner = PaperRunner::new(config(), Box::new(BuyOnce { bought: false }));
        runner.attach_database(&db);

        let (tx, rx) = mpsc::channel(16);
        tx.send(FeedEvent::Quote(quote(99.0, 101.0))).await.unwrap();
        drop(tx);

        let report = runner.run(rx).await.unwrap();
        let session_id = report.session_id.unwrap();

        let session = SessionRecord::get(session_id, db.get_connection()).unwrap();
        assert_eq!(session.outcome.as_deref(), Some("stopped"));
        assert_eq!(session.fill_count, 1);

        let fills = FillRecord::for_session(session_id, db.get_connection()).unwrap();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, 101.0);

        // Quotes and equity are journaled whenever a store is attached,
        // independent of the logging toggles
        assert!(!config().logging.enable_quote_logging);
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();
        let quotes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM session_quotes WHERE session_id = ?1",
                rusqlite::params![session_id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(quotes, 1);
        let equity_points: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM session_equity WHERE session_id = ?1",
                rusqlite::params![session_id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(equity_points, 1);
    }
}
