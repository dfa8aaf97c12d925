// Trading strategies
//
// A strategy sees each quote together with the current ledger state and
// answers with zero or more order requests. It never touches the ledger or
// the simulator directly.

use crate::config::{StrategyConfig, TradingConfig};
use crate::core::indicators::IndicatorEngine;
use crate::core::ledger::LedgerState;
use crate::error::TradingResult;
use crate::types::{OrderRequest, Quote, Side};
use tracing::{debug, info};

pub trait Strategy: Send {
    fn name(&self) -> &str;

    /// Called once per quote, after the ledger has been marked to market
    fn on_quote(&mut self, quote: &Quote, ledger: &LedgerState) -> TradingResult<Vec<OrderRequest>>;
}

/// A strategy that never trades. Useful for dry runs over a replay file
/// where only the feed and ledger plumbing are of interest.
pub struct HoldStrategy;

impl Strategy for HoldStrategy {
    fn name(&self) -> &str {
        "hold"
    }

    fn on_quote(&mut self, _quote: &Quote, _ledger: &LedgerState) -> TradingResult<Vec<OrderRequest>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone)]
struct OpenTrade {
    entry_price: f64,
    take_profit: f64,
    stop_loss: f64,
}

/// Long-only momentum strategy: enter on a MACD crossover confirmed by the
/// price sitting high in the Bollinger channel, exit at an ATR-scaled
/// take-profit or stop-loss.
pub struct MacdBollingerStrategy {
    symbol: String,
    trade_stake: f64,
    config: StrategyConfig,
    indicators: IndicatorEngine,
    prev_histogram: Option<f64>,
    open_trade: Option<OpenTrade>,
}

impl MacdBollingerStrategy {
    pub fn new(trading: &TradingConfig, strategy: &StrategyConfig) -> Self {
        Self {
            symbol: trading.symbol.clone(),
            trade_stake: trading.trade_stake,
            config: strategy.clone(),
            indicators: IndicatorEngine::new(strategy.clone()),
            prev_histogram: None,
            open_trade: None,
        }
    }
}

impl Strategy for MacdBollingerStrategy {
    fn name(&self) -> &str {
        "macd-bollinger"
    }

    fn on_quote(&mut self, quote: &Quote, ledger: &LedgerState) -> TradingResult<Vec<OrderRequest>> {
        if quote.symbol != self.symbol {
            return Ok(Vec::new());
        }

        let snapshot = match self.indicators.update(quote) {
            Some(s) => s,
            None => return Ok(Vec::new()),
        };

        let position_qty = ledger.quantity(&self.symbol);

        // An entry that was rejected or expired leaves us flat while the
        // trade record says otherwise; trust the ledger
        if position_qty <= 0.0 && self.open_trade.is_some() {
            debug!(symbol = %self.symbol, "clearing stale trade record");
            self.open_trade = None;
        }

        let crossed_up = matches!(self.prev_histogram, Some(prev) if prev <= 0.0)
            && snapshot.macd_histogram > 0.0;
        self.prev_histogram = Some(snapshot.macd_histogram);

        if position_qty > 0.0 {
            if let Some(trade) = &self.open_trade {
                if quote.bid >= trade.take_profit {
                    info!(
                        symbol = %self.symbol,
                        bid = quote.bid,
                        target = trade.take_profit,
                        "🎯 take-profit hit, closing position"
                    );
                    self.open_trade = None;
                    return Ok(vec![OrderRequest::market(
                        self.symbol.clone(),
                        Side::Sell,
                        position_qty,
                    )]);
                }

                if quote.bid <= trade.stop_loss {
                    info!(
                        symbol = %self.symbol,
                        bid = quote.bid,
                        stop = trade.stop_loss,
                        entry = trade.entry_price,
                        "🛑 stop-loss hit, closing position"
                    );
                    self.open_trade = None;
                    return Ok(vec![OrderRequest::market(
                        self.symbol.clone(),
                        Side::Sell,
                        position_qty,
                    )]);
                }
            }
            return Ok(Vec::new());
        }

        // Flat: look for an entry
        if crossed_up
            && snapshot.bb_channel_pos >= self.config.bb_channel_pos
            && snapshot.atr > 0.0
        {
            let entry_price = quote.ask;
            let quantity = self.trade_stake / entry_price;
            if quantity <= 0.0 || !quantity.is_finite() {
                return Ok(Vec::new());
            }

            self.open_trade = Some(OpenTrade {
                entry_price,
                take_profit: entry_price + self.config.tp_atr_mult * snapshot.atr,
                stop_loss: entry_price - self.config.sl_atr_mult * snapshot.atr,
            });

            info!(
                symbol = %self.symbol,
                price = entry_price,
                quantity,
                atr = snapshot.atr,
                channel_pos = snapshot.bb_channel_pos,
                "🚀 entry signal"
            );

            return Ok(vec![OrderRequest::market(
                self.symbol.clone(),
                Side::Buy,
                quantity,
            )]);
        }

        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::ledger::Ledger;
    use crate::types::Fill;
    use chrono::Utc;
    use uuid::Uuid;

    fn config() -> Config {
        let mut config = Config::default();
        config.trading.symbol = "X".to_string();
        config.trading.starting_capital = 10_000.0;
        config.trading.trade_stake = 1_000.0;
        config.strategy.macd_fast = 3;
        config.strategy.macd_slow = 6;
        config.strategy.macd_signal = 3;
        config.strategy.bb_period = 5;
        config.strategy.atr_period = 4;
        config
    }

    fn quote(mid: f64) -> Quote {
        Quote::new("X", mid - 0.5, mid + 0.5, Utc::now())
    }

    #[test]
    fn test_hold_strategy_never_trades() {
        let mut strategy = HoldStrategy;
        let ledger = Ledger::new(1_000.0);
        let orders = strategy.on_quote(&quote(100.0), &ledger.snapshot()).unwrap();
        assert!(orders.is_empty());
    }

    #[test]
    fn test_no_orders_during_warmup() {
        let config = config();
        let mut strategy = MacdBollingerStrategy::new(&config.trading, &config.strategy);
        let ledger = Ledger::new(10_000.0);

        let orders = strategy.on_quote(&quote(100.0), &ledger.snapshot()).unwrap();
        assert!(orders.is_empty());
    }

    #[test]
    fn test_entry_on_momentum_reversal() {
        let config = config();
        let mut strategy = MacdBollingerStrategy::new(&config.trading, &config.strategy);
        let ledger = Ledger::new(10_000.0);

        // Decline establishes a negative histogram, then a sharp rally
        // crosses it up with the price high in the band channel
        let mut entries = Vec::new();
        for i in 0..20 {
            let q = quote(110.0 - i as f64 * 0.5);
            entries.extend(strategy.on_quote(&q, &ledger.snapshot()).unwrap());
        }
        for i in 0..15 {
            let q = quote(100.0 + i as f64 * 2.0);
            entries.extend(strategy.on_quote(&q, &ledger.snapshot()).unwrap());
        }

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].side, Side::Buy);
        assert!(entries[0].quantity > 0.0);
    }

    #[test]
    fn test_exit_on_stop_loss() {
        let config = config();
        let mut strategy = MacdBollingerStrategy::new(&config.trading, &config.strategy);
        let mut ledger = Ledger::new(10_000.0);

        let mut entry = None;
        for i in 0..20 {
            let q = quote(110.0 - i as f64 * 0.5);
            let _ = strategy.on_quote(&q, &ledger.snapshot()).unwrap();
        }
        let mut last_mid = 100.0;
        for i in 0..15 {
            last_mid = 100.0 + i as f64 * 2.0;
            let orders = strategy.on_quote(&quote(last_mid), &ledger.snapshot()).unwrap();
            if let Some(req) = orders.into_iter().next() {
                entry = Some(req);
                break;
            }
        }
        let entry = entry.expect("strategy should have entered");

        // Simulate the fill so the ledger shows a long position
        ledger.apply(&Fill {
            order_id: Uuid::new_v4(),
            symbol: "X".to_string(),
            side: Side::Buy,
            price: last_mid + 0.5,
            quantity: entry.quantity,
            fee: 0.0,
            is_maker: false,
            timestamp: Utc::now(),
        });

        // Collapse the price well below any stop level
        let orders = strategy.on_quote(&quote(last_mid - 50.0), &ledger.snapshot()).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Sell);
        assert!((orders[0].quantity - entry.quantity).abs() < 1e-9);
    }

    #[test]
    fn test_ignores_other_symbols() {
        let config = config();
        let mut strategy = MacdBollingerStrategy::new(&config.trading, &config.strategy);
        let ledger = Ledger::new(10_000.0);

        let q = Quote::new("OTHER", 99.0, 101.0, Utc::now());
        let orders = strategy.on_quote(&q, &ledger.snapshot()).unwrap();
        assert!(orders.is_empty());
    }
}
