// Position ledger with single-writer accounting
//
// All mutations go through apply(); replaying the same fill sequence from
// the same starting capital always reproduces the same state.

use crate::error::{TradingError, TradingResult};
use crate::types::{Fill, Quote};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Signed quantity: positive long, negative short
    pub quantity: f64,
    /// Weighted-average entry price of the open quantity
    pub average_cost: f64,
    pub realized_pnl: f64,
    /// Last price the position traded or was marked at
    pub mark_price: f64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Position {
    fn new(symbol: String, now: DateTime<Utc>) -> Self {
        Self {
            symbol,
            quantity: 0.0,
            average_cost: 0.0,
            realized_pnl: 0.0,
            mark_price: 0.0,
            created_at: now,
            last_updated: now,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0.0
    }

    /// Cost basis of the open quantity
    pub fn book_value(&self) -> f64 {
        self.quantity * self.average_cost
    }

    /// Open quantity valued at the current mark price
    pub fn market_value(&self) -> f64 {
        self.quantity * self.mark_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.quantity * (self.mark_price - self.average_cost)
    }

    /// Apply a signed quantity delta at a price, realizing P&L on the
    /// portion that reduces or closes the position. Returns realized P&L.
    fn apply_delta(&mut self, delta: f64, price: f64, now: DateTime<Utc>) -> f64 {
        let mut realized = 0.0;

        if self.quantity == 0.0 || self.quantity.signum() == delta.signum() {
            // Addition: weighted-average cost over the combined quantity
            let old_abs = self.quantity.abs();
            let add_abs = delta.abs();
            let combined = old_abs + add_abs;
            if combined > 0.0 {
                self.average_cost = (old_abs * self.average_cost + add_abs * price) / combined;
            }
            self.quantity += delta;
        } else {
            // Reduction: realize on the closing quantity first
            let closing = delta.abs().min(self.quantity.abs());
            realized = (price - self.average_cost) * closing * self.quantity.signum();
            self.realized_pnl += realized;
            self.quantity += delta;

            if self.quantity == 0.0 {
                self.average_cost = 0.0;
            } else if self.quantity.signum() != -delta.signum() {
                // Crossed through zero: the remainder opens at the fill price
                self.average_cost = price;
            }
        }

        self.mark_price = price;
        self.last_updated = now;
        realized
    }
}

/// Consistent point-in-time view of the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerState {
    pub starting_capital: f64,
    pub cash: f64,
    pub realized_pnl: f64,
    pub total_fees: f64,
    pub equity: f64,
    pub unrealized_pnl: f64,
    pub positions: HashMap<String, Position>,
    pub fill_count: usize,
    pub as_of: DateTime<Utc>,
}

impl LedgerState {
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Signed open quantity for a symbol, zero when flat
    pub fn quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map(|p| p.quantity).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct Ledger {
    starting_capital: f64,
    cash: f64,
    total_fees: f64,
    positions: HashMap<String, Position>,
    /// Append-only audit trail of every applied fill
    fills: Vec<Fill>,
}

impl Ledger {
    pub fn new(starting_capital: f64) -> Self {
        Self {
            starting_capital,
            cash: starting_capital,
            total_fees: 0.0,
            positions: HashMap::new(),
            fills: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn starting_capital(&self) -> f64 {
        self.starting_capital
    }

    pub fn total_fees(&self) -> f64 {
        self.total_fees
    }

    pub fn realized_pnl(&self) -> f64 {
        self.positions.values().map(|p| p.realized_pnl).sum()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions.values().map(|p| p.unrealized_pnl()).sum()
    }

    /// Cash plus open positions at their current mark
    pub fn equity(&self) -> f64 {
        self.cash + self.positions.values().map(|p| p.market_value()).sum::<f64>()
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    /// Apply a fill: move cash, update the position under the
    /// weighted-average-cost rule, realize P&L on reductions.
    pub fn apply(&mut self, fill: &Fill) {
        let now = fill.timestamp;
        let delta = fill.side.sign() * fill.quantity;

        // Buys consume cash, sells release it; fees always consume it
        self.cash -= fill.side.sign() * fill.price * fill.quantity;
        self.cash -= fill.fee;
        self.total_fees += fill.fee;

        let position = self
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::new(fill.symbol.clone(), now));

        let realized = position.apply_delta(delta, fill.price, now);

        debug!(
            symbol = %fill.symbol,
            side = %fill.side,
            price = fill.price,
            quantity = fill.quantity,
            realized,
            cash = self.cash,
            "fill applied"
        );

        self.fills.push(fill.clone());
    }

    /// Refresh mark prices from current quotes (unrealized P&L only;
    /// never touches cash or realized P&L)
    pub fn mark_to_market(&mut self, quotes: &HashMap<String, Quote>) {
        for (symbol, position) in &mut self.positions {
            if let Some(quote) = quotes.get(symbol) {
                // Long inventory is liquidated at the bid, short at the ask
                position.mark_price = if position.quantity >= 0.0 {
                    quote.bid
                } else {
                    quote.ask
                };
                position.last_updated = quote.timestamp;
            }
        }
    }

    /// Consistent snapshot; no partial updates are ever visible because
    /// the ledger is only mutated from the single runner task.
    pub fn snapshot(&self) -> LedgerState {
        LedgerState {
            starting_capital: self.starting_capital,
            cash: self.cash,
            realized_pnl: self.realized_pnl(),
            total_fees: self.total_fees,
            equity: self.equity(),
            unrealized_pnl: self.unrealized_pnl(),
            positions: self.positions.clone(),
            fill_count: self.fills.len(),
            as_of: Utc::now(),
        }
    }

    /// Accounting identity, checked at book value:
    /// cash + Σ book_value == starting_capital + realized P&L − fees.
    /// Equivalently, equity == that sum plus unrealized P&L.
    pub fn check_invariant(&self) -> TradingResult<()> {
        let book: f64 = self.positions.values().map(|p| p.book_value()).sum();
        let lhs = self.cash + book;
        let rhs = self.starting_capital + self.realized_pnl() - self.total_fees;

        let scale = self.starting_capital.abs().max(1.0);
        if (lhs - rhs).abs() > scale * 1e-9 {
            return Err(TradingError::LedgerInconsistent(format!(
                "cash {:.8} + book {:.8} != capital {:.8} + realized {:.8} - fees {:.8}",
                self.cash,
                book,
                self.starting_capital,
                self.realized_pnl(),
                self.total_fees
            )));
        }
        Ok(())
    }
}
