//! Benchmark suite for ledger throughput
//!
//! Uses the divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```
//!
//! Two groups are measured:
//! - `replay` - end-to-end replay of a generated command file
//! - `transfers` - concurrent fund transfers on a shared platform, either all
//!   drawing on one admin wallet or spread over disjoint distributor wallets

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use wallet_ledger_engine::core::{ScriptedProvider, StaticMpinVerifier};
use wallet_ledger_engine::{run_replay, EngineConfig, OwnerType, Platform, ReplayConfig};

fn main() {
    divan::main();
}

const USERS: u32 = 20;

/// Admin 1, MD 2, distributor 3 and users 10.. under it, followed by `transfers` transfers and payouts
fn command_file(transfers: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    let mut csv = String::from("op,account,target,amount,commission,reference,note\n");
    csv.push_str("open,1,,,,admin,\nopen,2,1,,,master_distributor,\nopen,3,2,,,distributor,\n");
    for user in 0..USERS {
        csv.push_str(&format!("open,{},3,,,user,\n", 10 + user));
    }
    csv.push_str("topup,1,,1000000000,,,\n");
    for i in 0..transfers {
        let user = 10 + (i as u32 % USERS);
        csv.push_str(&format!("transfer,1,{},10.25,,,\n", user));
        if i % 10 == 9 {
            csv.push_str(&format!("payout,{},,5,0.5,p{},\n", user, i));
            csv.push_str(&format!("payout_success,,,,,p{},OP{}\n", i, i));
        }
    }
    file.write_all(csv.as_bytes())
        .expect("Failed to write command file");
    file.flush().expect("Failed to flush command file");
    file
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn replay(bencher: divan::Bencher, transfers: usize) {
    let file = command_file(transfers);
    bencher.bench_local(|| {
        let mut output = Vec::new();
        run_replay(
            file.path(),
            EngineConfig::default(),
            ReplayConfig::default(),
            &mut output,
        )
        .expect("Replay failed");
    });
}

fn platform(distributors: u32) -> Platform {
    let platform = Platform::new(
        EngineConfig::new(Duration::from_secs(30), "1000000000".parse().unwrap()),
        Arc::new(ScriptedProvider::pending()),
        Arc::new(StaticMpinVerifier::accept_any()),
    );
    let registry = platform.registry();
    registry.open_account_with_id(1, OwnerType::Admin, None).unwrap();
    registry
        .open_account_with_id(2, OwnerType::MasterDistributor, Some(1))
        .unwrap();
    for d in 0..distributors {
        registry
            .open_account_with_id(100 + d, OwnerType::Distributor, Some(2))
            .unwrap();
        registry
            .open_account_with_id(1000 + d, OwnerType::User, Some(100 + d))
            .unwrap();
    }
    platform
}

/// Every transfer locks the same admin wallet
#[divan::bench(args = [1_000])]
fn transfers_contended(bencher: divan::Bencher, count: u32) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    bencher.bench_local(|| {
        runtime.block_on(async {
            let platform = platform(8);
            platform
                .transfers()
                .top_up(1, "100000000".parse().unwrap(), "")
                .await
                .unwrap();
            let handles: Vec<_> = (0..count)
                .map(|i| {
                    let platform = platform.clone();
                    tokio::spawn(async move {
                        platform
                            .transfers()
                            .fund_transfer(1, 100 + i % 8, "1".parse().unwrap(), "")
                            .await
                    })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
        })
    });
}

/// Each distributor funds only its own user, so lock sets never overlap across distributors
#[divan::bench(args = [1_000])]
fn transfers_disjoint(bencher: divan::Bencher, count: u32) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    bencher.bench_local(|| {
        runtime.block_on(async {
            let platform = platform(8);
            platform
                .transfers()
                .top_up(1, "100000000".parse().unwrap(), "")
                .await
                .unwrap();
            for d in 0..8 {
                platform
                    .transfers()
                    .fund_transfer(1, 100 + d, "100000".parse().unwrap(), "")
                    .await
                    .unwrap();
            }
            let handles: Vec<_> = (0..count)
                .map(|i| {
                    let platform = platform.clone();
                    let d = i % 8;
                    tokio::spawn(async move {
                        platform
                            .transfers()
                            .fund_transfer(100 + d, 1000 + d, "1".parse().unwrap(), "")
                            .await
                    })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
        })
    });
}
