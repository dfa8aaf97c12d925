// Configuration loading and validation

use paper_trading_bot::{Config, ConfigError};
use tempfile::TempDir;

#[test]
fn test_load_or_create_writes_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    assert!(!path.exists());
    let config = Config::load_or_create(&path).unwrap();
    assert!(path.exists());
    assert_eq!(config.trading.symbol, "BTC-USDT");

    // A second load reads the file it just wrote
    let reloaded = Config::load_or_create(&path).unwrap();
    assert_eq!(reloaded.trading.starting_capital, config.trading.starting_capital);
}

#[test]
fn test_round_trip_preserves_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = Config::default();
    config.trading.symbol = "ETH-USDT".to_string();
    config.trading.starting_capital = 5_000.0;
    config.strategy.atr_period = 21;
    config.to_file(&path).unwrap();

    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded.trading.symbol, "ETH-USDT");
    assert_eq!(loaded.trading.starting_capital, 5_000.0);
    assert_eq!(loaded.strategy.atr_period, 21);
}

#[test]
fn test_garbage_toml_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is { not toml").unwrap();

    let err = Config::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = Config::default();
    config.trading.starting_capital = -100.0;
    // Bypass validation by serializing directly
    let toml = toml::to_string_pretty(&config).unwrap();
    std::fs::write(&path, toml).unwrap();

    let err = Config::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn test_missing_file_is_an_error() {
    let err = Config::from_file("/nonexistent/config.toml").unwrap_err();
    assert!(matches!(err, ConfigError::FileRead(_)));
}
