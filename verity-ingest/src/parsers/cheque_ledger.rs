//! Cheque-ledger statement layout (text)
//!
//! Expected extracted-text rows (runs of spaces collapse to one):
//!   DATE        DETAILS              CHQ.NO.  VALUE DATE   WITHDRAWAL  DEPOSIT   BALANCE
//!   02-01-2025  ATM CASH 0192        nan      02-01-2025   50.00       nan       2599.13
//!
//! `nan` marks an empty cell. The balance may carry a `Cr`/`Dr` suffix.

use anyhow::Result;
use regex::Regex;
use tracing::warn;
use verity_core::dates::parse_statement_date;
use verity_core::{RowSkip, SkipReason, Transaction};

use super::{printed_amount, printed_balance, ParsedRows};

/// Parse extracted statement text laid out as a cheque ledger.
pub fn parse_cheque_ledger_text(text: &str) -> Result<ParsedRows> {
    let spaces_re = Regex::new(r"[ ]{2,}")?;

    // DATE DETAILS CHQ VALUE-DATE WITHDRAWAL DEPOSIT BALANCE
    let txn_re = Regex::new(concat!(
        r"^(?P<date>\d{2}-\d{2}-\d{4})\s+",
        r"(?P<details>.+?)\s+",
        r"(?P<cheque>nan|\S+)\s+",
        r"(?P<value_date>\d{2}-\d{2}-\d{4})\s+",
        r"(?P<withdrawal>nan|-|[\d,]*\d\.\d+)\s+",
        r"(?P<deposit>nan|-|[\d,]*\d\.\d+)\s+",
        r"(?P<balance>-?[\d,]*\d(?:\.\d+)?(?:\s?(?:Cr|Dr|CR|DR))?)\s*$"
    ))?;

    let mut out = ParsedRows::default();

    for (row, line) in text.lines().enumerate() {
        let line = spaces_re.replace_all(line.trim(), " ");
        let Some(caps) = txn_re.captures(&line) else {
            continue;
        };

        let parsed = decode_line(&caps, out.transactions.len() as i64 + 1);
        match parsed {
            Ok(txn) => out.transactions.push(txn),
            Err(reason) => {
                let skip = RowSkip::new(row, reason);
                warn!(%skip, "dropping ledger row");
                out.skipped.push(skip);
            }
        }
    }

    Ok(out)
}

fn decode_line(caps: &regex::Captures<'_>, id: i64) -> Result<Transaction, SkipReason> {
    let date = parse_statement_date(&caps["date"])
        .ok_or_else(|| SkipReason::BadDate(caps["date"].to_string()))?;
    let withdrawal = printed_amount("withdrawal", &caps["withdrawal"])?;
    let deposit = printed_amount("deposit", &caps["deposit"])?;
    let balance = printed_balance(&caps["balance"])?;
    Ok(Transaction::new(
        id,
        caps["details"].trim(),
        date,
        deposit.abs() - withdrawal.abs(),
        balance,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use verity_core::Balance;

    #[test]
    fn test_parse_cheque_ledger_basic() {
        let text = r#"
STATEMENT OF ACCOUNT
Date        Narration                 Chq./Ref.No.   Value Dt     Withdrawal   Deposit    Closing Balance
01-01-2025  OPENING BALANCE           nan            01-01-2025   nan          nan        2649.13
02-01-2025  ATM CASH  0192            nan            02-01-2025   50.00        nan        2599.13
03-01-2025  CHQ PAID  ACME LTD        000451         03-01-2025   312.00       nan        2200.00 Cr
04-01-2025  NEFT CR  PAYROLL          N0042          04-01-2025   nan          1,500.00   3,700.00
Page 1 of 1
"#;
        let rows = parse_cheque_ledger_text(text).unwrap();
        assert!(rows.skipped.is_empty());
        assert_eq!(rows.transactions.len(), 4);
        assert_eq!(rows.transactions[0].amount, 0.0);
        assert_eq!(rows.transactions[0].balance, Some(Balance::Amount(2649.13)));
        assert_eq!(rows.transactions[1].details, "ATM CASH 0192");
        assert_eq!(rows.transactions[1].amount, -50.0);
        assert_eq!(rows.transactions[2].amount, -312.0);
        assert_eq!(rows.transactions[2].balance, Some(Balance::Amount(2200.0)));
        assert_eq!(rows.transactions[3].amount, 1500.0);
        assert_eq!(rows.transactions[3].balance, Some(Balance::Amount(3700.0)));
    }

    #[test]
    fn test_impossible_date_is_skipped() {
        let text = "31-02-2025 FEE nan 31-02-2025 5.00 nan 95.00";
        let rows = parse_cheque_ledger_text(text).unwrap();
        assert!(rows.transactions.is_empty());
        assert_eq!(rows.skipped.len(), 1);
        assert!(matches!(rows.skipped[0].reason, SkipReason::BadDate(_)));
    }

    #[test]
    fn test_prose_is_ignored() {
        let rows = parse_cheque_ledger_text("Dear customer,\nthank you for banking with us.").unwrap();
        assert!(rows.is_empty());
    }
}
