// Paper Trading Bot Library
//
// A paper trading runner: live or replayed market data drives simulated
// order execution against a position ledger, with sessions persisted to SQLite

pub mod config;
pub mod core;
pub mod db; // SQLite session store
pub mod error; // Unified error handling
pub mod feed; // Market data feeds
pub mod simulation;
pub mod types;
pub mod validation; // Pre-flight validation

// Re-export core engine types
pub use crate::core::{
    HoldStrategy, IndicatorEngine, IndicatorSnapshot, Ledger, LedgerState, MacdBollingerStrategy,
    PaperRunner, Position, RunReport, RunnerState, Strategy,
};

// Re-export error types
pub use crate::error::{TradingError, TradingResult};

// Re-export validation types
pub use crate::validation::{PreFlightValidator, ValidationCheck, ValidationLevel, ValidationResult};

// Re-export feed types
pub use crate::feed::{FeedEvent, KrakenWebSocketFeed, ReplayFeed, RestPollingFeed};

// Re-export simulation types
pub use crate::simulation::{FeeConfig, OrderSimulator, Submission};

// Re-export configuration
pub use crate::config::{Config, ConfigError, FeedConfig, LoggingConfig, StrategyConfig, TradingConfig};

// Re-export database types
pub use crate::db::{Database, FillRecord, SessionRecord};

// Re-export market and order types
pub use crate::types::{Fill, Instrument, Order, OrderRequest, OrderStatus, OrderType, Quote, Side};
