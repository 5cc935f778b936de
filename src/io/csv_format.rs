//! CSV format handling for ledger commands and wallet output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CommandRecord structure for deserialization
//! - Conversion from CSV records to [`Command`]s
//! - Wallet output serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! Input columns are `op,account,target,amount,commission,reference,note`, plus an
//! optional trailing `transfer_type` (`IMPS` or `NEFT`, default `IMPS`) read by
//! `payout`. Which columns an op reads:
//!
//! | op                    | account   | target   | amount | commission | reference | note     |
//! |-----------------------|-----------|----------|--------|------------|-----------|----------|
//! | `open`                | new id    | parent   |        |            | tier      |          |
//! | `topup`               | admin     |          | yes    |            |           | remarks  |
//! | `transfer`            | from      | to       | yes    |            |           | remarks  |
//! | `revert`              | from      | admin    | yes    |            |           | remarks  |
//! | `fund_request`        | requester | approver | yes    |            | UTR       | remarks  |
//! | `accept`              | approver  |          |        |            | UTR       |          |
//! | `reject`              |           |          |        |            | UTR       |          |
//! | `payout`              | user      |          | yes    | yes        | alias     | MPIN     |
//! | `payout_success`      |           |          |        |            | alias     | op. ref  |
//! | `payout_failure`      |           |          |        |            | alias     | reason   |
//! | `payout_refund`       |           |          |        |            | alias     |          |
//! | `commission_override` | distrib.  |          |        |            | `r/a/d/m` |          |

use crate::types::{Account, AccountId, Command, CommissionTable, OwnerType, TransferType};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
///
/// Every column except `op` is optional; which ones are required depends on the op.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct CommandRecord {
    pub op: String,
    pub account: Option<AccountId>,
    pub target: Option<AccountId>,
    pub amount: Option<String>,
    pub commission: Option<String>,
    pub reference: Option<String>,
    pub note: Option<String>,
    /// Absent from files whose header stops at `note`
    pub transfer_type: Option<String>,
}

impl CommandRecord {
    fn account(&self, role: &str) -> Result<AccountId, String> {
        self.account
            .ok_or_else(|| format!("'{}' requires the {} account", self.op, role))
    }

    fn target(&self, role: &str) -> Result<AccountId, String> {
        self.target
            .ok_or_else(|| format!("'{}' requires the {} account in target", self.op, role))
    }

    fn amount(&self) -> Result<Decimal, String> {
        parse_decimal(&self.op, "amount", self.amount.as_deref())?
            .ok_or_else(|| format!("'{}' requires an amount", self.op))
    }

    fn commission(&self) -> Result<Decimal, String> {
        Ok(parse_decimal(&self.op, "commission", self.commission.as_deref())?
            .unwrap_or(Decimal::ZERO))
    }

    fn reference(&self, what: &str) -> Result<String, String> {
        match self.reference.as_deref().map(str::trim) {
            Some(reference) if !reference.is_empty() => Ok(reference.to_string()),
            _ => Err(format!("'{}' requires a {} in reference", self.op, what)),
        }
    }

    fn transfer_type(&self) -> Result<TransferType, String> {
        match self.transfer_type.as_deref().map(str::trim) {
            Some(scheme) if !scheme.is_empty() => TransferType::from_str(scheme),
            _ => Ok(TransferType::default()),
        }
    }

    fn note(&self) -> String {
        self.note.as_deref().unwrap_or_default().trim().to_string()
    }
}

fn parse_decimal(op: &str, column: &str, value: Option<&str>) -> Result<Option<Decimal>, String> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Decimal::from_str(text)
            .map(Some)
            .map_err(|_| format!("Invalid {} '{}' for '{}'", column, text, op)),
        _ => Ok(None),
    }
}

/// Convert a CommandRecord to a Command
///
/// # Returns
///
/// Result containing either:
/// - Ok(Command) - Successfully converted record
/// - Err(String) - Error message describing the conversion failure
pub fn convert_command_record(record: CommandRecord) -> Result<Command, String> {
    let command = match record.op.trim().to_lowercase().as_str() {
        "open" => Command::Open {
            account: record.account("new")?,
            owner_type: OwnerType::from_str(&record.reference("tier")?)?,
            parent: record.target,
        },
        "topup" => Command::TopUp {
            admin: record.account("admin")?,
            amount: record.amount()?,
            remarks: record.note(),
        },
        "transfer" => Command::Transfer {
            from: record.account("source")?,
            to: record.target("destination")?,
            amount: record.amount()?,
            remarks: record.note(),
        },
        "revert" => Command::Revert {
            from: record.account("source")?,
            admin: record.target("admin")?,
            amount: record.amount()?,
            remarks: record.note(),
        },
        "fund_request" => Command::FundRequest {
            requester: record.account("requester")?,
            approver: record.target("approver")?,
            amount: record.amount()?,
            utr: record.reference("UTR")?,
            remarks: record.note(),
        },
        "accept" => Command::Accept {
            approver: record.account("approver")?,
            utr: record.reference("UTR")?,
        },
        "reject" => Command::Reject {
            utr: record.reference("UTR")?,
        },
        "payout" => Command::Payout {
            user: record.account("user")?,
            amount: record.amount()?,
            commission: record.commission()?,
            alias: record.reference("payout alias")?,
            mpin: record.note(),
            transfer_type: record.transfer_type()?,
        },
        "payout_success" => Command::PayoutSuccess {
            alias: record.reference("payout alias")?,
            operator_reference: record.note(),
        },
        "payout_failure" => Command::PayoutFailure {
            alias: record.reference("payout alias")?,
            reason: record.note(),
        },
        "payout_refund" => Command::PayoutRefund {
            alias: record.reference("payout alias")?,
        },
        "commission_override" => Command::CommissionOverride {
            distributor: record.account("distributor")?,
            table: CommissionTable::from_str(&record.reference("commission table")?)
                .map_err(|e| e.to_string())?,
        },
        _ => return Err(format!("Invalid op: '{}'", record.op)),
    };
    Ok(command)
}

/// Write wallet states to CSV format
///
/// Writes wallets with columns: account, tier, parent, balance, version.
/// Wallets are sorted by id for deterministic output and balances carry two decimals.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["account", "tier", "parent", "balance", "version"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.id);

    for account in sorted_accounts {
        writer
            .write_record(&[
                account.id.to_string(),
                account.owner_type.to_string(),
                account.parent.map(|p| p.to_string()).unwrap_or_default(),
                format!("{:.2}", account.balance),
                account.version.to_string(),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(op: &str) -> CommandRecord {
        CommandRecord {
            op: op.to_string(),
            ..CommandRecord::default()
        }
    }

    #[test]
    fn test_convert_open() {
        let mut open = record("open");
        open.account = Some(3);
        open.target = Some(2);
        open.reference = Some("distributor".to_string());

        assert_eq!(
            convert_command_record(open),
            Ok(Command::Open {
                account: 3,
                owner_type: OwnerType::Distributor,
                parent: Some(2),
            })
        );
    }

    #[test]
    fn test_convert_transfer() {
        let mut transfer = record("TRANSFER");
        transfer.account = Some(1);
        transfer.target = Some(2);
        transfer.amount = Some(" 250.50 ".to_string());
        transfer.note = Some("float".to_string());

        assert_eq!(
            convert_command_record(transfer),
            Ok(Command::Transfer {
                from: 1,
                to: 2,
                amount: Decimal::new(25050, 2),
                remarks: "float".to_string(),
            })
        );
    }

    #[test]
    fn test_convert_payout_defaults_commission_to_zero() {
        let mut payout = record("payout");
        payout.account = Some(4);
        payout.amount = Some("100".to_string());
        payout.reference = Some("p1".to_string());

        assert_eq!(
            convert_command_record(payout),
            Ok(Command::Payout {
                user: 4,
                amount: Decimal::new(100, 0),
                commission: Decimal::ZERO,
                alias: "p1".to_string(),
                mpin: String::new(),
                transfer_type: TransferType::Imps,
            })
        );
    }

    #[rstest]
    #[case("NEFT", TransferType::Neft)]
    #[case(" neft ", TransferType::Neft)]
    #[case("IMPS", TransferType::Imps)]
    #[case("", TransferType::Imps)]
    fn test_convert_payout_transfer_type(#[case] scheme: &str, #[case] expected: TransferType) {
        let mut payout = record("payout");
        payout.account = Some(4);
        payout.amount = Some("100".to_string());
        payout.reference = Some("p1".to_string());
        payout.transfer_type = Some(scheme.to_string());

        let command = convert_command_record(payout).unwrap();
        assert!(matches!(command, Command::Payout { transfer_type, .. } if transfer_type == expected));
    }

    #[test]
    fn test_convert_commission_override() {
        let mut row = record("commission_override");
        row.account = Some(3);
        row.reference = Some("60/20/15/5".to_string());

        let command = convert_command_record(row).unwrap();
        assert!(matches!(command, Command::CommissionOverride { distributor: 3, .. }));
    }

    #[rstest]
    #[case::unknown_op(record("mint"))]
    #[case::transfer_without_target(CommandRecord { account: Some(1), amount: Some("1".into()), ..record("transfer") })]
    #[case::topup_without_amount(CommandRecord { account: Some(1), ..record("topup") })]
    #[case::bad_amount(CommandRecord { account: Some(1), amount: Some("abc".into()), ..record("topup") })]
    #[case::accept_without_utr(CommandRecord { account: Some(1), ..record("accept") })]
    #[case::bad_tier(CommandRecord { account: Some(1), reference: Some("king".into()), ..record("open") })]
    #[case::bad_transfer_type(CommandRecord { account: Some(4), amount: Some("1".into()), reference: Some("p1".into()), transfer_type: Some("RTGS".into()), ..record("payout") })]
    #[case::bad_table(CommandRecord { account: Some(3), reference: Some("1/2".into()), ..record("commission_override") })]
    fn test_convert_rejects(#[case] record: CommandRecord) {
        assert!(convert_command_record(record).is_err());
    }

    #[test]
    fn test_write_accounts_csv() {
        let mut admin = Account::new(1, OwnerType::Admin, None);
        admin.balance = Decimal::new(8000, 0);
        admin.version = 2;
        let mut distributor = Account::new(3, OwnerType::Distributor, Some(2));
        distributor.balance = Decimal::new(20005, 1);
        distributor.version = 1;

        let mut output = Vec::new();
        write_accounts_csv(&[distributor, admin], &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert_eq!(
            output_str,
            "account,tier,parent,balance,version\n\
             1,ADMIN,,8000.00,2\n\
             3,DISTRIBUTOR,2,2000.50,1\n"
        );
    }
}
