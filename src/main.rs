//! Wallet Ledger CLI
//!
//! Replays ledger commands from a CSV file and prints the final wallets.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > wallets.csv
//! cargo run -- --batch-size 2000 --worker-threads 8 commands.csv > wallets.csv
//! RUST_LOG=debug cargo run -- --log-format json commands.csv > wallets.csv
//! ```
//!
//! Wallets go to stdout; logs go to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, file not readable, etc.)

use std::process;
use wallet_ledger_engine::{cli, logging, replay};

fn main() {
    let args = cli::parse_args();
    logging::init_logging(args.log_format);

    let engine_config = args.to_engine_config();
    let replay_config = args.to_replay_config();

    let mut output = std::io::stdout();
    if let Err(e) = replay::run_replay(&args.input_file, engine_config, replay_config, &mut output)
    {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
