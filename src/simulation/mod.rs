// Order execution simulation

pub mod simulator;

pub use simulator::{FeeConfig, OrderSimulator, Submission};
