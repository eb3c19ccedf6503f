//! Configuration for the trade-guard binary.
//!
//! YAML with `${VAR}` / `${VAR:-default}` environment interpolation. Every
//! field has a default, so a partial file is enough; `validate_config`
//! rejects values the runtime cannot use.
//!
//! # Usage
//!
//! ```rust,ignore
//! use trade_guard::config::load_config;
//!
//! let config = load_config(Some("config.yaml"))?;
//! let strategy = config.strategy.to_strategy_config();
//! ```

mod bot;
mod exchange;
mod gateway;
mod market_cache;
mod observability;
mod oracle;
mod persistence;
mod positions;
mod strategy;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::use_cases::OrchestratorConfig;

pub use bot::BotSettings;
pub use exchange::{ExchangeKind, ExchangeSettings, PaperMarketSettings};
pub use gateway::{CircuitBreakerSettings, GatewaySettings, RetrySettings};
pub use market_cache::MarketCacheSettings;
pub use observability::{MetricsSettings, ObservabilitySettings};
pub use oracle::OracleSettings;
pub use persistence::{PersistenceBackend, PersistenceSettings};
pub use positions::PositionSettings;
pub use strategy::{ExitRulesSettings, SizingSettings, StrategySettings, TrendSettings};

/// Default config path.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Cycle loop.
    #[serde(default)]
    pub bot: BotSettings,
    /// Exchange account.
    #[serde(default)]
    pub exchange: ExchangeSettings,
    /// Decision oracle endpoint.
    #[serde(default)]
    pub oracle: OracleSettings,
    /// Market discovery cache.
    #[serde(default)]
    pub market_cache: MarketCacheSettings,
    /// Order gateway.
    #[serde(default)]
    pub gateway: GatewaySettings,
    /// Position lifecycle.
    #[serde(default)]
    pub positions: PositionSettings,
    /// Position persistence.
    #[serde(default)]
    pub persistence: PersistenceSettings,
    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilitySettings,
    /// Strategy (reloadable).
    #[serde(default)]
    pub strategy: StrategySettings,
}

impl Config {
    /// Timeouts and cadence for the orchestrator.
    #[must_use]
    pub const fn to_orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            read_timeout: Duration::from_millis(self.bot.read_timeout_ms),
            oracle_timeout: self.oracle.timeout(),
            reconcile_interval: Duration::from_secs(self.positions.reconcile_interval_secs),
        }
    }

    /// Interval between cycle starts.
    #[must_use]
    pub const fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.bot.cycle_interval_secs)
    }
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax. Unset or empty
/// variables without a default become the empty string.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |message: &str| Err(ConfigError::ValidationError(message.to_string()));

    if config.bot.cycle_interval_secs == 0 {
        return invalid("bot.cycle_interval_secs must be positive");
    }
    if config.bot.read_timeout_ms == 0 {
        return invalid("bot.read_timeout_ms must be positive");
    }

    // Exchange
    let exchange = &config.exchange;
    if exchange.name.trim().is_empty() {
        return invalid("exchange.name must not be empty");
    }
    if exchange.starting_balance < rust_decimal::Decimal::ZERO {
        return invalid("exchange.starting_balance must not be negative");
    }
    if exchange.max_leverage < rust_decimal::Decimal::ONE {
        return invalid("exchange.max_leverage must be at least 1");
    }
    if exchange.tick_interval_ms == 0 {
        return invalid("exchange.tick_interval_ms must be positive");
    }
    let mut seen = std::collections::HashSet::new();
    for market in &exchange.markets {
        let symbol = crate::domain::shared::Symbol::parse(&market.symbol).map_err(|e| {
            ConfigError::ValidationError(format!("exchange.markets: {e}"))
        })?;
        if !seen.insert(symbol.clone()) {
            return Err(ConfigError::ValidationError(format!(
                "exchange.markets: duplicate symbol {symbol}"
            )));
        }
        if market.initial_price <= rust_decimal::Decimal::ZERO
            || market.min_order_size <= rust_decimal::Decimal::ZERO
        {
            return Err(ConfigError::ValidationError(format!(
                "exchange.markets: {symbol} needs a positive initial_price and min_order_size"
            )));
        }
    }

    // Oracle
    if !config.oracle.endpoint.starts_with("http://")
        && !config.oracle.endpoint.starts_with("https://")
    {
        return invalid("oracle.endpoint must be an http(s) URL");
    }
    if config.oracle.timeout_secs == 0 {
        return invalid("oracle.timeout_secs must be positive");
    }

    if config.market_cache.refresh_interval_secs == 0 {
        return invalid("market_cache.refresh_interval_secs must be positive");
    }
    if config.market_cache.discover_timeout_secs == 0 {
        return invalid("market_cache.discover_timeout_secs must be positive");
    }

    // Gateway
    let gateway = &config.gateway;
    if gateway.call_timeout_ms == 0 {
        return invalid("gateway.call_timeout_ms must be positive");
    }
    if gateway.retry.max_attempts == 0 {
        return invalid("gateway.retry.max_attempts must be at least 1");
    }
    if gateway.retry.backoff_multiplier < 1.0 {
        return invalid("gateway.retry.backoff_multiplier must be at least 1.0");
    }
    if !(0.0..=1.0).contains(&gateway.retry.jitter_factor) {
        return invalid("gateway.retry.jitter_factor must be between 0.0 and 1.0");
    }
    if gateway.circuit_breaker.failure_threshold == 0 {
        return invalid("gateway.circuit_breaker.failure_threshold must be at least 1");
    }
    if gateway.circuit_breaker.permitted_calls_in_half_open == 0 {
        return invalid("gateway.circuit_breaker.permitted_calls_in_half_open must be at least 1");
    }

    if config.positions.pending_timeout_secs == 0 {
        return invalid("positions.pending_timeout_secs must be positive");
    }
    if config.positions.reconcile_interval_secs == 0 {
        return invalid("positions.reconcile_interval_secs must be positive");
    }

    if config.persistence.backend == PersistenceBackend::JsonFile
        && config.persistence.data_dir.as_os_str().is_empty()
    {
        return invalid("persistence.data_dir is required for the json_file backend");
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_lowercase().as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "observability.log_level must be one of: {LOG_LEVELS:?}"
        )));
    }

    config
        .strategy
        .to_strategy_config()
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_mapping_uses_defaults() {
        let config = match load_config_from_string("{}") {
            Ok(c) => c,
            Err(e) => panic!("should load empty config: {e}"),
        };

        assert_eq!(config, Config::default());
        assert_eq!(config.bot.cycle_interval_secs, 300);
        assert_eq!(config.market_cache.refresh_interval_secs, 3600);
        assert_eq!(config.gateway.retry.max_attempts, 3);
        assert_eq!(config.persistence.backend, PersistenceBackend::JsonFile);
        assert_eq!(config.exchange.markets.len(), 3);
        assert!(!config.observability.metrics.enabled);
    }

    #[test]
    fn test_env_var_with_default_when_missing() {
        let input = "endpoint: ${TRADE_GUARD_CONFIG_TEST_NONEXISTENT_VAR:-http://oracle:9000}";
        let result = interpolate_env_vars(input);

        assert_eq!(result, "endpoint: http://oracle:9000");
    }

    #[test]
    #[expect(clippy::literal_string_with_formatting_args)] // ${...} is env var syntax, not format args
    fn test_env_var_with_default_uses_existing() {
        let input = "path: ${PATH:-default}";
        let result = interpolate_env_vars(input);

        assert_ne!(result, "path: default");
        assert!(result.starts_with("path: "));
    }

    #[test]
    fn test_env_var_without_default_becomes_empty() {
        let input = "api_key: ${TRADE_GUARD_CONFIG_TEST_UNLIKELY_TO_EXIST}";
        let result = interpolate_env_vars(input);

        assert_eq!(result, "api_key: ");
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let yaml = r"
gateway:
  retry:
    max_attempts: 0
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for zero attempts");
        };
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_validation_rejects_positive_stop_loss() {
        let yaml = r"
strategy:
  exit_rules:
    stop_loss_pct: 1.0
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for positive stop loss");
        };
        assert!(err.to_string().contains("stop_loss_pct"));
    }

    #[test]
    fn test_validation_rejects_duplicate_markets() {
        let yaml = r"
exchange:
  markets:
    - symbol: BTC
      initial_price: 60000
      min_order_size: 0.001
    - symbol: btc
      initial_price: 61000
      min_order_size: 0.001
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for duplicate symbol");
        };
        assert!(err.to_string().contains("duplicate symbol BTC"));
    }

    #[test]
    fn test_validation_rejects_unknown_log_level() {
        let yaml = r"
observability:
  log_level: chatty
";
        assert!(load_config_from_string(yaml).is_err());
    }

    #[test]
    fn test_unknown_backend_fails_to_parse() {
        let yaml = r"
persistence:
  backend: postgres
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected parse error");
        };
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_full_config_parse() {
        let yaml = r#"
bot:
  cycle_interval_secs: 60
exchange:
  name: paper-eu
  starting_balance: 2500
  markets:
    - symbol: SOL
      initial_price: 150
      min_order_size: 0.1
    - symbol: ETH
      initial_price: 3000
      min_order_size: 0.01
      active: false
oracle:
  endpoint: "https://oracle.internal/decide"
  api_key: "${TRADE_GUARD_CONFIG_TEST_KEY:-abc}"
  timeout_secs: 20
gateway:
  call_timeout_ms: 2000
  circuit_breaker:
    failure_threshold: 3
    cooldown_secs: 30
positions:
  pending_timeout_secs: 45
persistence:
  backend: memory
observability:
  log_level: debug
  json_logs: true
  metrics:
    enabled: true
    listen_addr: "127.0.0.1:9100"
strategy:
  version: 7
  name: momentum
  min_confidence: 0.7
  sizing:
    balance_pct: 5
    leverage: 3
    max_open_positions: 2
  exit_rules:
    take_profit_pct: 4
    stop_loss_pct: -1
    max_hold_secs: 7200
    min_hold_secs: 600
    trend_reversal_enabled: false
"#;

        let config = match load_config_from_string(yaml) {
            Ok(c) => c,
            Err(e) => panic!("should load full config: {e}"),
        };

        assert_eq!(config.cycle_interval(), Duration::from_secs(60));
        assert_eq!(config.exchange.starting_balance, dec!(2500));
        assert!(!config.exchange.markets[1].active);
        assert_eq!(config.oracle.to_http_config().api_key.as_deref(), Some("abc"));
        assert_eq!(config.persistence.backend, PersistenceBackend::Memory);
        assert_eq!(
            config.observability.to_metrics_config().map(|m| m.listen_addr.port()),
            Some(9100)
        );

        let gateway = config.gateway.to_gateway_config();
        assert_eq!(gateway.call_timeout, Duration::from_secs(2));
        assert_eq!(gateway.circuit_breaker.failure_threshold, 3);
        assert_eq!(gateway.retry.max_attempts, 3);

        let orchestrator = config.to_orchestrator_config();
        assert_eq!(orchestrator.oracle_timeout, Duration::from_secs(20));

        let strategy = config.strategy.to_strategy_config();
        assert_eq!(strategy.version, 7);
        assert_eq!(strategy.sizing.leverage, dec!(3));
        assert_eq!(strategy.exit_rules.min_hold, Duration::from_secs(600));
        assert!(!strategy.exit_rules.trend_reversal_enabled);
        assert_eq!(strategy.trend.slow_period, 21);

        let paper = config.exchange.to_paper_config();
        assert_eq!(paper.name, "paper-eu");
        assert_eq!(paper.markets.len(), 2);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.yaml");
        let config = match load_config(Some(path)) {
            Ok(c) => c,
            Err(e) => panic!("shipped config should load: {e}"),
        };

        assert_eq!(config.exchange, ExchangeSettings::default());
        assert_eq!(config.gateway, GatewaySettings::default());
        assert_eq!(config.strategy, StrategySettings::default());
        assert_eq!(config.persistence.backend, PersistenceBackend::JsonFile);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let Err(err) = load_config(Some("/nonexistent/trade-guard.yaml")) else {
            panic!("expected read error");
        };
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
