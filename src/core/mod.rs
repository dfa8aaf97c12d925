// Core trading engine: ledger, indicators, strategies and the runner

pub mod indicators;
pub mod ledger;
pub mod runner;
pub mod strategy;

pub use indicators::{IndicatorEngine, IndicatorSnapshot};
pub use ledger::{Ledger, LedgerState, Position};
pub use runner::{PaperRunner, RunReport, RunnerState};
pub use strategy::{HoldStrategy, MacdBollingerStrategy, Strategy};
