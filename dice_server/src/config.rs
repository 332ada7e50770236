//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use spicy_dice::{Decimal, GameConfig, db::DatabaseConfig, dice::DEFAULT_DICE_SIDES};
use std::net::SocketAddr;
use std::time::Duration;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration; `None` when running on the in-memory ledger
    pub database: Option<DatabaseConfig>,
    /// Betting limits
    pub game: GameConfig,
    /// Per-connection timing and buffering
    pub connection: ConnectionSettings,
    /// Prometheus listener address, if metrics are enabled
    pub metrics_bind: Option<SocketAddr>,
    /// Players created at startup in in-memory mode
    pub seed: SeedConfig,
}

/// Timing and buffering for each client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Interval between liveness pings
    pub ping_interval: Duration,
    /// How long the reader waits for a pong before giving up
    pub read_timeout: Duration,
    /// Deadline for any single frame write
    pub write_timeout: Duration,
    /// Capacity of the outbound envelope queue
    pub outbound_capacity: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(54),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            outbound_capacity: 64,
        }
    }
}

/// Players seeded into the in-memory ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedConfig {
    /// Players `1..=players` are created
    pub players: i64,
    /// Starting balance of every seeded player
    pub balance: Decimal,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            players: 10,
            balance: Decimal::from(1_000),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `in_memory` - Run on the in-memory ledger instead of PostgreSQL
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        in_memory: bool,
    ) -> Result<Self, ConfigError> {
        Self::from_lookup(
            |key| std::env::var(key).ok(),
            bind_override,
            database_url_override,
            in_memory,
        )
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(
        lookup: F,
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        in_memory: bool,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Bind address
        let bind = bind_override
            .or_else(|| lookup("SERVER_BIND").and_then(|s| s.parse().ok()))
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)));

        // Database configuration (REQUIRED unless in-memory)
        let database = if in_memory {
            None
        } else {
            let database_url = database_url_override
                .or_else(|| lookup("DATABASE_URL"))
                .ok_or_else(|| ConfigError::MissingRequired {
                    var: "DATABASE_URL".to_string(),
                    hint: "Set a PostgreSQL URL or start with --in-memory".to_string(),
                })?;

            Some(DatabaseConfig {
                database_url,
                max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 20),
                min_connections: parse_or(&lookup, "DB_MIN_CONNECTIONS", 2),
                connection_timeout_secs: parse_or(&lookup, "DB_CONNECTION_TIMEOUT_SECS", 5),
                idle_timeout_secs: parse_or(&lookup, "DB_IDLE_TIMEOUT_SECS", 300),
                max_lifetime_secs: parse_or(&lookup, "DB_MAX_LIFETIME_SECS", 1800),
            })
        };

        let defaults = GameConfig::default();
        let game = GameConfig {
            min_bet: parse_or(&lookup, "MIN_BET", defaults.min_bet),
            max_bet: parse_or(&lookup, "MAX_BET", defaults.max_bet),
            dice_sides: parse_or(&lookup, "DICE_SIDES", DEFAULT_DICE_SIDES),
        };

        let connection_defaults = ConnectionSettings::default();
        let connection = ConnectionSettings {
            ping_interval: Duration::from_secs(parse_or(
                &lookup,
                "WS_PING_INTERVAL_SECS",
                connection_defaults.ping_interval.as_secs(),
            )),
            read_timeout: Duration::from_secs(parse_or(
                &lookup,
                "WS_READ_TIMEOUT_SECS",
                connection_defaults.read_timeout.as_secs(),
            )),
            write_timeout: Duration::from_secs(parse_or(
                &lookup,
                "WS_WRITE_TIMEOUT_SECS",
                connection_defaults.write_timeout.as_secs(),
            )),
            outbound_capacity: parse_or(
                &lookup,
                "WS_OUTBOUND_CAPACITY",
                connection_defaults.outbound_capacity,
            ),
        };

        let metrics_bind = lookup("METRICS_BIND").and_then(|s| s.parse().ok());

        let seed_defaults = SeedConfig::default();
        let seed = SeedConfig {
            players: parse_or(&lookup, "SEED_PLAYERS", seed_defaults.players),
            balance: parse_or(&lookup, "SEED_BALANCE", seed_defaults.balance),
        };

        Ok(ServerConfig {
            bind,
            database,
            game,
            connection,
            metrics_bind,
            seed,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = self.game.validate() {
            return Err(ConfigError::Invalid {
                var: "MIN_BET/MAX_BET/DICE_SIDES".to_string(),
                reason: e.to_string(),
            });
        }

        if self.connection.ping_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "WS_PING_INTERVAL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        // A pong must have time to arrive before the read deadline passes
        if self.connection.ping_interval >= self.connection.read_timeout {
            return Err(ConfigError::Invalid {
                var: "WS_READ_TIMEOUT_SECS".to_string(),
                reason: format!(
                    "Must be greater than the ping interval ({}s)",
                    self.connection.ping_interval.as_secs()
                ),
            });
        }

        if self.connection.write_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "WS_WRITE_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.connection.outbound_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "WS_OUTBOUND_CAPACITY".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.seed.balance < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                var: "SEED_BALANCE".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse a variable with default fallback
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
