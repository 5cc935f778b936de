//! End-to-end integration tests
//!
//! These tests validate the complete replay pipeline using predefined CSV
//! fixtures. Each test:
//! 1. Reads input.csv from a fixture directory
//! 2. Replays every command against a fresh platform
//! 3. Generates the wallet CSV
//! 4. Compares actual output with expected.csv
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Fund request approval, rejection and duplicate UTRs
//! - Payout settlement with idempotent callbacks
//! - Payout failure and all-or-nothing refunds
//! - Insufficient balances and hierarchy rules
//! - Commission overrides, including one that cannot split a commission
//! - Malformed rows
//!
//! Each fixture is replayed twice: once one command per batch and once with
//! the whole file in a single batch.

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;
    use wallet_ledger_engine::{run_replay, EngineConfig, LedgerError, ReplayConfig};

    /// Replay tests/fixtures/{fixture_name}/input.csv and compare with expected.csv
    fn run_test_fixture(fixture_name: &str, batch_size: usize) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );
        assert!(
            Path::new(&expected_path).exists(),
            "Expected file not found: {}",
            expected_path
        );

        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");

        run_replay(
            Path::new(&input_path),
            EngineConfig::default(),
            ReplayConfig::new(batch_size, 2),
            &mut temp_output,
        )
        .unwrap_or_else(|e| panic!("Failed to replay commands: {}", e));

        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));

        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (batch size: {})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, batch_size, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("fund_request_flow")]
    #[case("payout_settlement")]
    #[case("failure_and_refund")]
    #[case("insufficient_balance")]
    #[case("hierarchy_rules")]
    #[case("commission_override")]
    #[case("unsplittable_commission")]
    #[case("malformed_data")]
    #[case("empty_input")]
    fn test_fixtures(#[case] fixture: &str, #[values(1, 1000)] batch_size: usize) {
        run_test_fixture(fixture, batch_size);
    }

    #[test]
    fn test_missing_input_file() {
        let mut output = Vec::new();
        let result = run_replay(
            Path::new("tests/fixtures/does_not_exist/input.csv"),
            EngineConfig::default(),
            ReplayConfig::default(),
            &mut output,
        );

        assert!(matches!(result, Err(LedgerError::FileNotFound { .. })));
    }

    #[test]
    fn test_daily_limit_from_config() {
        let mut input = NamedTempFile::new().expect("Failed to create temp file");
        input
            .write_all(
                b"op,account,target,amount,commission,reference,note\n\
                  open,1,,,,admin,\n\
                  open,2,1,,,master_distributor,\n\
                  open,3,2,,,distributor,\n\
                  open,4,3,,,user,\n\
                  topup,1,,1000,,,\n\
                  transfer,1,4,1000,,,\n\
                  payout,4,,60,,p1,\n\
                  payout,4,,50,,p2,\n\
                  payout,4,,40,,p3,\n",
            )
            .expect("Failed to write input");
        input.flush().expect("Failed to flush input");

        let config = EngineConfig::new(std::time::Duration::from_secs(5), "100".parse().unwrap());
        let mut output = Vec::new();
        run_replay(input.path(), config, ReplayConfig::default(), &mut output).unwrap();

        // p2 would take the day to 110 and is refused; p3 brings it to exactly 100
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "account,tier,parent,balance,version\n\
             1,ADMIN,,0.00,2\n\
             2,MASTER_DISTRIBUTOR,1,0.00,0\n\
             3,DISTRIBUTOR,2,0.00,0\n\
             4,USER,3,900.00,3\n"
        );
    }
}
