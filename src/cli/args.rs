use crate::config::EngineConfig;
use crate::logging::LogFormat;
use crate::replay::ReplayConfig;
use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

/// Replay wallet ledger commands and print the resulting balances
#[derive(Parser, Debug)]
#[command(name = "wallet-ledger")]
#[command(about = "Replay wallet ledger commands and print the resulting balances", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing ledger commands
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// How long an operation waits for a row lock
    #[arg(
        long = "lock-timeout-ms",
        value_name = "MS",
        env = "LEDGER_LOCK_TIMEOUT_MS",
        default_value_t = 30_000,
        help = "Milliseconds to wait for a row lock before giving up"
    )]
    pub lock_timeout_ms: u64,

    /// Per-user ceiling on payouts within one UTC day
    #[arg(
        long = "daily-payout-limit",
        value_name = "AMOUNT",
        env = "LEDGER_DAILY_PAYOUT_LIMIT",
        default_value = "25000.00",
        help = "Maximum payout principal per user per UTC day"
    )]
    pub daily_payout_limit: Decimal,

    /// Number of commands per batch
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands read per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Worker threads of the async runtime
    #[arg(
        long = "worker-threads",
        value_name = "COUNT",
        help = "Number of runtime worker threads (default: CPU cores)"
    )]
    pub worker_threads: Option<usize>,

    /// Log line format
    #[arg(
        long = "log-format",
        value_name = "FORMAT",
        default_value = "text",
        help = "Log format on stderr: 'text' or 'json'"
    )]
    pub log_format: LogFormat,
}

impl CliArgs {
    /// Build the engine configuration, falling back to defaults for invalid values
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::new(
            Duration::from_millis(self.lock_timeout_ms),
            self.daily_payout_limit,
        )
    }

    /// Build the replay configuration
    ///
    /// Missing values take the defaults; zero values fall back to them with a warning.
    pub fn to_replay_config(&self) -> ReplayConfig {
        if self.batch_size.is_some() || self.worker_threads.is_some() {
            let default = ReplayConfig::default();
            ReplayConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.worker_threads.unwrap_or(default.worker_threads),
            )
        } else {
            ReplayConfig::default()
        }
    }
}
