//! Pre-flight validation
//!
//! Runs a set of checks before a session starts so obvious problems (bad
//! parameters, unreachable feed, missing replay file) surface up front
//! instead of minutes into a run.

use crate::config::Config;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

/// Validation result with detailed findings
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub passed: bool,
    pub checks: Vec<ValidationCheck>,
}

#[derive(Debug, Clone)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub level: ValidationLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Critical, // Must pass for the run to proceed
    Warning,  // Should pass, but the run can continue
    Info,     // Informational only
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        ValidationResult {
            passed: true,
            checks: Vec::new(),
        }
    }

    pub fn add_check(&mut self, check: ValidationCheck) {
        if !check.passed && check.level == ValidationLevel::Critical {
            self.passed = false;
        }
        self.checks.push(check);
    }

    pub fn critical_failures(&self) -> Vec<&ValidationCheck> {
        self.checks
            .iter()
            .filter(|c| !c.passed && c.level == ValidationLevel::Critical)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&ValidationCheck> {
        self.checks
            .iter()
            .filter(|c| !c.passed && c.level == ValidationLevel::Warning)
            .collect()
    }

    pub fn display(&self) {
        info!("🔍 Pre-flight Validation");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        for check in &self.checks {
            let icon = if check.passed {
                "✅"
            } else {
                match check.level {
                    ValidationLevel::Critical => "❌",
                    ValidationLevel::Warning => "⚠️",
                    ValidationLevel::Info => "ℹ️",
                }
            };

            info!("{} {} - {}", icon, check.name, check.message);
        }

        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if !self.passed {
            let failures = self.critical_failures();
            error!("❌ Validation failed: {} critical issue(s)", failures.len());
            for failure in failures {
                error!("   • {}: {}", failure.name, failure.message);
            }
        } else {
            let warnings = self.warnings();
            if !warnings.is_empty() {
                warn!("⚠️  {} warning(s) detected", warnings.len());
                for warning in warnings {
                    warn!("   • {}: {}", warning.name, warning.message);
                }
            }
            info!("✅ All critical checks passed");
        }
    }
}

/// Pre-flight validator for paper trading sessions
pub struct PreFlightValidator {
    config: Config,
}

impl PreFlightValidator {
    pub fn new(config: Config) -> Self {
        PreFlightValidator { config }
    }

    /// Checks common to every run mode
    pub fn validate_common(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        result.add_check(self.check_config());
        result.add_check(self.check_capital());
        result.add_check(self.check_fees());

        if let Some(check) = self.check_database() {
            result.add_check(check);
        }

        result
    }

    /// Validate for a live-feed run (network reachability matters)
    pub async fn validate_for_live(&self) -> ValidationResult {
        let mut result = self.validate_common();
        result.add_check(self.check_network_connectivity().await);
        result
    }

    /// Validate for a replay run (the quote file matters)
    pub fn validate_for_replay<P: AsRef<Path>>(&self, quotes_file: P) -> ValidationResult {
        let mut result = self.validate_common();

        let path = quotes_file.as_ref();
        result.add_check(if path.is_file() {
            ValidationCheck {
                name: "Replay File".to_string(),
                passed: true,
                message: path.display().to_string(),
                level: ValidationLevel::Info,
            }
        } else {
            ValidationCheck {
                name: "Replay File".to_string(),
                passed: false,
                message: format!("Not found: {}", path.display()),
                level: ValidationLevel::Critical,
            }
        });

        result
    }

    fn check_config(&self) -> ValidationCheck {
        match self.config.validate() {
            Ok(()) => ValidationCheck {
                name: "Configuration".to_string(),
                passed: true,
                message: format!("Trading {} with valid parameters", self.config.trading.symbol),
                level: ValidationLevel::Critical,
            },
            Err(e) => ValidationCheck {
                name: "Configuration".to_string(),
                passed: false,
                message: e.to_string(),
                level: ValidationLevel::Critical,
            },
        }
    }

    fn check_capital(&self) -> ValidationCheck {
        let capital = self.config.trading.starting_capital;
        let stake = self.config.trading.trade_stake;

        if capital <= 0.0 {
            ValidationCheck {
                name: "Capital".to_string(),
                passed: false,
                message: "Starting capital must be positive".to_string(),
                level: ValidationLevel::Critical,
            }
        } else if stake > capital * 0.9 {
            ValidationCheck {
                name: "Capital".to_string(),
                passed: false,
                message: format!(
                    "Stake ({:.2}) uses over 90% of capital ({:.2}), one losing trade dominates the run",
                    stake, capital
                ),
                level: ValidationLevel::Warning,
            }
        } else {
            ValidationCheck {
                name: "Capital".to_string(),
                passed: true,
                message: format!("{:.2} allocated, {:.2} per trade", capital, stake),
                level: ValidationLevel::Info,
            }
        }
    }

    fn check_fees(&self) -> ValidationCheck {
        let maker = self.config.trading.maker_fee_bps;
        let taker = self.config.trading.taker_fee_bps;

        if maker > 100.0 || taker > 100.0 {
            ValidationCheck {
                name: "Fees".to_string(),
                passed: false,
                message: format!("Fees above 1% (maker {} bps, taker {} bps) look like a typo", maker, taker),
                level: ValidationLevel::Warning,
            }
        } else {
            ValidationCheck {
                name: "Fees".to_string(),
                passed: true,
                message: format!("maker {} bps, taker {} bps", maker, taker),
                level: ValidationLevel::Info,
            }
        }
    }

    async fn check_network_connectivity(&self) -> ValidationCheck {
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                return ValidationCheck {
                    name: "Network".to_string(),
                    passed: false,
                    message: format!("HTTP client error: {}", e),
                    level: ValidationLevel::Critical,
                }
            }
        };

        let url = format!(
            "{}/0/public/Time",
            self.config.feed.rest_url.trim_end_matches('/')
        );
        match client.get(&url).send().await {
            Ok(_) => ValidationCheck {
                name: "Network".to_string(),
                passed: true,
                message: "Feed API reachable".to_string(),
                level: ValidationLevel::Warning,
            },
            Err(_) => ValidationCheck {
                name: "Network".to_string(),
                passed: false,
                message: format!("Cannot reach {}", self.config.feed.rest_url),
                level: ValidationLevel::Warning,
            },
        }
    }

    fn check_database(&self) -> Option<ValidationCheck> {
        use crate::db::Database;

        if self.config.db_path.is_empty() {
            return Some(ValidationCheck {
                name: "Database".to_string(),
                passed: true,
                message: "Persistence disabled".to_string(),
                level: ValidationLevel::Info,
            });
        }

        match Database::new(&self.config.db_path) {
            Ok(db) => match db.health_check() {
                Ok(true) => Some(ValidationCheck {
                    name: "Database".to_string(),
                    passed: true,
                    message: "Healthy".to_string(),
                    level: ValidationLevel::Info,
                }),
                _ => Some(ValidationCheck {
                    name: "Database".to_string(),
                    passed: false,
                    message: "Health check failed".to_string(),
                    level: ValidationLevel::Warning,
                }),
            },
            Err(_) => Some(ValidationCheck {
                name: "Database".to_string(),
                passed: false,
                message: format!("Cannot open {}", self.config.db_path),
                level: ValidationLevel::Warning,
            }),
        }
    }
}
