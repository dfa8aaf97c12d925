// Order simulator
//
// Fills synthetic orders against the latest quotes with no real capital at
// risk. Market orders take the opposing quote immediately; limit orders rest
// and are re-evaluated on every subsequent quote until they fill, are
// cancelled, or expire. Every fill is applied to the ledger before the call
// returns.

use crate::core::ledger::Ledger;
use crate::error::{TradingError, TradingResult};
use crate::types::{Fill, Instrument, Order, OrderRequest, OrderStatus, OrderType, Quote, Side};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fee structure in basis points (Kraken-like defaults)
#[derive(Debug, Clone)]
pub struct FeeConfig {
    pub maker_fee_bps: f64,
    pub taker_fee_bps: f64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            maker_fee_bps: 16.0, // 0.16%
            taker_fee_bps: 26.0, // 0.26%
        }
    }
}

impl FeeConfig {
    pub fn zero() -> Self {
        Self {
            maker_fee_bps: 0.0,
            taker_fee_bps: 0.0,
        }
    }

    fn fee_for(&self, price: f64, quantity: f64, is_maker: bool) -> f64 {
        let bps = if is_maker {
            self.maker_fee_bps
        } else {
            self.taker_fee_bps
        };
        price * quantity * (bps / 10_000.0)
    }
}

/// Outcome of a successful submission
#[derive(Debug, Clone)]
pub enum Submission {
    /// Order filled within this evaluation step
    Filled(Fill),
    /// Limit order accepted and resting until a later quote crosses it
    Accepted(Uuid),
}

pub struct OrderSimulator {
    instruments: HashMap<String, Instrument>,
    quotes: HashMap<String, Quote>,
    fees: FeeConfig,
    /// Resting limit orders expire after this many quotes without a fill
    order_ttl_quotes: u32,
    /// Append-only order history; resting orders are the Pending entries
    orders: Vec<Order>,
}

impl OrderSimulator {
    pub fn new(fees: FeeConfig, order_ttl_quotes: u32) -> Self {
        Self {
            instruments: HashMap::new(),
            quotes: HashMap::new(),
            fees,
            order_ttl_quotes,
            orders: Vec::new(),
        }
    }

    pub fn register_instrument(&mut self, instrument: Instrument) {
        debug!(symbol = %instrument.symbol, "instrument registered");
        self.instruments.insert(instrument.symbol.clone(), instrument);
    }

    pub fn instrument(&self, symbol: &str) -> Option<&Instrument> {
        self.instruments.get(symbol)
    }

    pub fn last_quote(&self, symbol: &str) -> Option<&Quote> {
        self.quotes.get(symbol)
    }

    pub fn quotes(&self) -> &HashMap<String, Quote> {
        &self.quotes
    }

    /// Full order audit trail, including terminal orders
    pub fn order_history(&self) -> &[Order] {
        &self.orders
    }

    pub fn open_orders(&self) -> Vec<&Order> {
        self.orders
            .iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .collect()
    }

    /// Submit an order. Market orders reach a terminal state within this
    /// call; limit orders either fill immediately (taker) or rest.
    pub fn submit(&mut self, req: &OrderRequest, ledger: &mut Ledger) -> TradingResult<Submission> {
        if let Err(e) = self.validate(req) {
            self.reject(req, &e);
            return Err(e);
        }

        // validate established that a quote exists for the symbol
        let quote = match self.quotes.get(&req.symbol).cloned() {
            Some(q) => q,
            None => {
                let e = TradingError::NoQuote(req.symbol.clone());
                self.reject(req, &e);
                return Err(e);
            }
        };
        let mut order = Order::from_request(req, quote.timestamp);

        match req.order_type {
            OrderType::Market => {
                // Zero-liquidity is not modeled: any size fills at the quote
                let price = Self::opposing_price(&quote, req.side);
                let fill = self.execute(&mut order, price, false, &quote, ledger);
                self.orders.push(order);
                Ok(Submission::Filled(fill))
            }
            OrderType::Limit => {
                let limit = order.limit_price.unwrap_or(0.0);
                if Self::limit_crosses(&quote, req.side, limit) {
                    // Marketable limit takes liquidity at the opposing quote
                    let price = Self::opposing_price(&quote, req.side);
                    let fill = self.execute(&mut order, price, false, &quote, ledger);
                    self.orders.push(order);
                    return Ok(Submission::Filled(fill));
                }

                let id = order.id;
                debug!(order_id = %id, symbol = %req.symbol, limit, "limit order resting");
                self.orders.push(order);
                Ok(Submission::Accepted(id))
            }
        }
    }

    /// Feed a quote into the simulator: updates the quote map, re-evaluates
    /// resting limit orders in submission order, expires stale ones.
    /// Returns the fills produced by this quote.
    pub fn on_quote(&mut self, quote: &Quote, ledger: &mut Ledger) -> Vec<Fill> {
        self.quotes.insert(quote.symbol.clone(), quote.clone());

        let mut fills = Vec::new();
        let ttl = self.order_ttl_quotes;
        let fees = self.fees.clone();

        for order in &mut self.orders {
            if order.status != OrderStatus::Pending || order.symbol != quote.symbol {
                continue;
            }

            let limit = order.limit_price.unwrap_or(0.0);
            if Self::limit_crosses(quote, order.side, limit) {
                // Resting order provides liquidity when the market reaches it
                let price = Self::opposing_price(quote, order.side);
                let fee = fees.fee_for(price, order.quantity, true);
                let fill = Fill {
                    order_id: order.id,
                    symbol: order.symbol.clone(),
                    side: order.side,
                    price,
                    quantity: order.quantity,
                    fee,
                    is_maker: true,
                    timestamp: quote.timestamp,
                };
                order.status = OrderStatus::Filled;
                ledger.apply(&fill);
                info!(
                    order_id = %order.id,
                    symbol = %order.symbol,
                    side = %order.side,
                    price,
                    quantity = order.quantity,
                    "✅ resting limit filled"
                );
                fills.push(fill);
            } else {
                order.quotes_seen += 1;
                if order.quotes_seen >= ttl {
                    order.status = OrderStatus::Expired;
                    warn!(order_id = %order.id, symbol = %order.symbol, "⏱ limit order expired");
                }
            }
        }

        fills
    }

    /// Cancel a resting order
    pub fn cancel(&mut self, order_id: Uuid) -> TradingResult<()> {
        let order = self
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| TradingError::OrderNotFound(order_id.to_string()))?;

        if order.status != OrderStatus::Pending {
            return Err(TradingError::OrderRejected(format!(
                "order {} is already terminal ({:?})",
                order_id, order.status
            )));
        }

        order.status = OrderStatus::Cancelled;
        info!(order_id = %order_id, "order cancelled");
        Ok(())
    }

    /// Record a rejected submission in the audit trail
    fn reject(&mut self, req: &OrderRequest, cause: &TradingError) {
        let mut order = Order::from_request(req, chrono::Utc::now());
        order.status = OrderStatus::Rejected(cause.to_string());
        self.orders.push(order);
    }

    fn execute(
        &mut self,
        order: &mut Order,
        price: f64,
        is_maker: bool,
        quote: &Quote,
        ledger: &mut Ledger,
    ) -> Fill {
        let fee = self.fees.fee_for(price, order.quantity, is_maker);
        let fill = Fill {
            order_id: order.id,
            symbol: order.symbol.clone(),
            side: order.side,
            price,
            quantity: order.quantity,
            fee,
            is_maker,
            timestamp: quote.timestamp,
        };

        order.status = OrderStatus::Filled;
        // Ledger sees the fill before the submission result is returned
        ledger.apply(&fill);

        info!(
            order_id = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            price,
            quantity = order.quantity,
            fee,
            "✅ order filled"
        );

        fill
    }

    /// Buy orders pay the ask, sell orders hit the bid
    fn opposing_price(quote: &Quote, side: Side) -> f64 {
        match side {
            Side::Buy => quote.ask,
            Side::Sell => quote.bid,
        }
    }

    /// A limit is marketable when it is at least as favorable as the
    /// opposing quote
    fn limit_crosses(quote: &Quote, side: Side, limit: f64) -> bool {
        match side {
            Side::Buy => limit >= quote.ask,
            Side::Sell => limit <= quote.bid,
        }
    }

    fn validate(&self, req: &OrderRequest) -> TradingResult<()> {
        let instrument = self
            .instruments
            .get(&req.symbol)
            .ok_or_else(|| TradingError::UnknownInstrument(req.symbol.clone()))?;

        // No order, limit or market, can be priced before the first quote
        if !self.quotes.contains_key(&req.symbol) {
            return Err(TradingError::NoQuote(req.symbol.clone()));
        }

        if !req.quantity.is_finite() || req.quantity <= 0.0 {
            return Err(TradingError::InvalidQuantity(
                req.quantity,
                "quantity must be positive".to_string(),
            ));
        }

        if req.quantity < instrument.lot_size {
            return Err(TradingError::InvalidQuantity(
                req.quantity,
                format!("below lot size {}", instrument.lot_size),
            ));
        }

        if req.order_type == OrderType::Limit {
            match req.limit_price {
                None => {
                    return Err(TradingError::OrderRejected(
                        "limit order requires a price".to_string(),
                    ))
                }
                Some(p) if !p.is_finite() || p <= 0.0 => {
                    return Err(TradingError::OrderRejected(format!("invalid limit price: {}", p)))
                }
                _ => {}
            }
        }

        Ok(())
    }
}
