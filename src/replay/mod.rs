//! Command file replay
//!
//! Drives a [`Platform`] from a CSV file of ledger commands and writes the
//! final wallet states.
//!
//! # Architecture
//!
//! ```text
//! run_replay
//!     ├── ReplayConfig (batch_size, worker_threads)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── Replayer (alias maps + command dispatch)
//!     │     └── Platform
//!     │           ├── ScriptedProvider (every payout acknowledged as pending)
//!     │           └── StaticMpinVerifier (accepts any MPIN)
//!     └── write_accounts_csv
//! ```
//!
//! Commands run in file order, one at a time, so the output is deterministic.
//! A command that fails is logged at WARN and skipped.

use crate::config::EngineConfig;
use crate::core::payout::{ScriptedProvider, StaticMpinVerifier};
use crate::core::Platform;
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_accounts_csv;
use crate::types::{
    Beneficiary, CallbackOutcome, Command, CorrelationId, FundRequestId, LedgerError,
    NewFundRequest, PayoutIntent,
};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for batch reading
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Number of commands read per batch
    pub batch_size: usize,
    /// Worker threads of the tokio runtime
    pub worker_threads: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            worker_threads: num_cpus::get(),
        }
    }
}

impl ReplayConfig {
    /// Create a ReplayConfig, falling back to the defaults for zero values
    pub fn new(batch_size: usize, worker_threads: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let worker_threads = if worker_threads == 0 {
            warn!(
                worker_threads,
                default = default.worker_threads,
                "invalid worker thread count, using default"
            );
            default.worker_threads
        } else {
            worker_threads
        };

        Self {
            batch_size,
            worker_threads,
        }
    }
}

/// Applies replayed commands to a platform
///
/// Payouts are addressed by an alias chosen in the file. Fund requests are
/// addressed by their UTR.
#[derive(Debug)]
pub struct Replayer {
    platform: Platform,
    payout_aliases: HashMap<String, CorrelationId>,
}

impl Replayer {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            payout_aliases: HashMap::new(),
        }
    }

    /// A replayer over a fresh platform whose provider leaves every payout pending
    pub fn with_config(config: EngineConfig) -> Self {
        Self::new(Platform::new(
            config,
            Arc::new(ScriptedProvider::pending()),
            Arc::new(StaticMpinVerifier::accept_any()),
        ))
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Apply one command; `line` is only used for error context
    pub async fn apply(&mut self, line: u64, command: Command) -> Result<(), LedgerError> {
        let platform = &self.platform;
        match command {
            Command::Open {
                account,
                owner_type,
                parent,
            } => {
                platform
                    .registry()
                    .open_account_with_id(account, owner_type, parent)?;
            }
            Command::TopUp {
                admin,
                amount,
                remarks,
            } => {
                platform.transfers().top_up(admin, amount, &remarks).await?;
            }
            Command::Transfer {
                from,
                to,
                amount,
                remarks,
            } => {
                platform
                    .transfers()
                    .fund_transfer(from, to, amount, &remarks)
                    .await?;
            }
            Command::Revert {
                from,
                admin,
                amount,
                remarks,
            } => {
                platform
                    .transfers()
                    .revert(from, admin, amount, &remarks)
                    .await?;
            }
            Command::FundRequest {
                requester,
                approver,
                amount,
                utr,
                remarks,
            } => {
                platform.fund_requests().create(NewFundRequest {
                    requester,
                    approver,
                    amount,
                    utr,
                    remarks,
                })?;
            }
            Command::Accept { approver, utr } => {
                let id = self.fund_request_by_utr(line, &utr)?;
                platform.fund_requests().accept(id, approver).await?;
            }
            Command::Reject { utr } => {
                let id = self.fund_request_by_utr(line, &utr)?;
                let status = platform.fund_requests().reject(id).await?;
                debug!(utr = %utr, status = %status, "fund request rejection applied");
            }
            Command::Payout {
                user,
                amount,
                commission,
                alias,
                mpin,
                transfer_type,
            } => {
                if self.payout_aliases.contains_key(&alias) {
                    return Err(LedgerError::ParseError {
                        line: Some(line),
                        message: format!("payout alias '{}' is already in use", alias),
                    });
                }
                let receipt = platform
                    .payouts()
                    .initiate_payout(PayoutIntent {
                        user,
                        amount,
                        commission,
                        beneficiary: Beneficiary::default(),
                        transfer_type,
                        mpin,
                        remarks: alias.clone(),
                    })
                    .await?;
                self.payout_aliases.insert(alias, receipt.correlation_id);
            }
            Command::PayoutSuccess {
                alias,
                operator_reference,
            } => {
                let correlation_id = self.payout_by_alias(line, &alias)?;
                let outcome = platform
                    .payouts()
                    .on_provider_success(correlation_id, &operator_reference, None)
                    .await?;
                log_callback(&alias, outcome);
            }
            Command::PayoutFailure { alias, reason } => {
                let correlation_id = self.payout_by_alias(line, &alias)?;
                let outcome = platform
                    .payouts()
                    .on_provider_failure(correlation_id, &reason)
                    .await?;
                log_callback(&alias, outcome);
            }
            Command::PayoutRefund { alias } => {
                let correlation_id = self.payout_by_alias(line, &alias)?;
                platform.payouts().refund(correlation_id).await?;
            }
            Command::CommissionOverride { distributor, table } => {
                platform
                    .payouts()
                    .set_commission_override(distributor, table)?;
            }
        }
        Ok(())
    }

    fn fund_request_by_utr(
        &self,
        line: u64,
        utr: &str,
    ) -> Result<FundRequestId, LedgerError> {
        self.platform
            .fund_requests()
            .find_by_utr(utr)
            .ok_or_else(|| LedgerError::ParseError {
                line: Some(line),
                message: format!("no fund request with UTR '{}'", utr),
            })
    }

    fn payout_by_alias(&self, line: u64, alias: &str) -> Result<CorrelationId, LedgerError> {
        self.payout_aliases
            .get(alias)
            .copied()
            .ok_or_else(|| LedgerError::ParseError {
                line: Some(line),
                message: format!("unknown payout alias '{}'", alias),
            })
    }
}

fn log_callback(alias: &str, outcome: CallbackOutcome) {
    if let CallbackOutcome::AlreadySettled { status } = outcome {
        info!(alias = %alias, status = %status, "callback for settled payout ignored");
    }
}

/// Replay the commands in `input_path` and write the final wallets to `output`
///
/// Fatal errors (missing file, runtime or output failures) are returned.
/// Individual command failures are logged and skipped.
pub fn run_replay(
    input_path: &Path,
    engine_config: EngineConfig,
    replay_config: ReplayConfig,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(replay_config.worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let file = tokio::fs::File::open(input_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LedgerError::FileNotFound {
                    path: input_path.display().to_string(),
                }
            } else {
                LedgerError::from(e)
            }
        })?;
        let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
        let mut reader = AsyncReader::new(compat_file);
        let mut replayer = Replayer::with_config(engine_config);

        let mut applied = 0usize;
        let mut skipped = 0usize;
        loop {
            let batch = reader.read_batch(replay_config.batch_size).await;
            if batch.is_empty() {
                break;
            }

            for (line, command) in batch {
                let op = command.op();
                match replayer.apply(line, command).await {
                    Ok(()) => applied += 1,
                    Err(e) => {
                        skipped += 1;
                        warn!(line, op, error = %e, "command skipped");
                    }
                }
            }
        }

        info!(applied, skipped, "replay finished");

        let accounts = replayer.platform().registry().all_accounts().await?;
        write_accounts_csv(&accounts, output).map_err(|message| LedgerError::IoError { message })
    })
}
