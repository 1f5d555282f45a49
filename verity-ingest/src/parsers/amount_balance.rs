//! Signed-amount statement layout (text)
//!
//! Expected extracted-text rows:
//!   DATE         DESCRIPTION                          AMOUNT      BALANCE
//!   02/01/2025   ATM CASH WDL 0192 MG ROAD            -500.00     2,149.13
//!   03 Jan 2025  NEFT CR SALARY JAN                   1,000.00    3,149.13 Cr

use anyhow::Result;
use regex::Regex;
use tracing::warn;
use verity_core::dates::parse_statement_date;
use verity_core::{RowSkip, SkipReason, Transaction};

use super::{printed_amount, printed_balance, ParsedRows};

/// Parse extracted statement text with one signed amount and a running
/// balance per line.
pub fn parse_amount_balance_text(text: &str) -> Result<ParsedRows> {
    // DATE DESCRIPTION AMOUNT BALANCE
    let txn_re = Regex::new(concat!(
        r"^\s*(?P<date>\d{2}[-/.]\d{2}[-/.]\d{4}|\d{4}-\d{2}-\d{2}|\d{1,2}[ -][A-Za-z]{3}[ -]\d{4})\s+",
        r"(?P<desc>.+?)\s+",
        r"(?P<amount>[-+]?[\d,]*\d\.\d{2})\s+",
        r"(?P<balance>-?[\d,]*\d\.\d{2}(?:\s?(?:Cr|Dr|CR|DR))?)\s*$"
    ))?;

    let mut out = ParsedRows::default();

    for (row, line) in text.lines().enumerate() {
        let Some(caps) = txn_re.captures(line) else {
            continue;
        };

        let raw_date = &caps["date"];
        let Some(date) = parse_statement_date(raw_date) else {
            let skip = RowSkip::new(row, SkipReason::BadDate(raw_date.to_string()));
            warn!(%skip, "dropping statement row");
            out.skipped.push(skip);
            continue;
        };

        let parsed = printed_amount("amount", &caps["amount"])
            .and_then(|amount| Ok((amount, printed_balance(&caps["balance"])?)));
        match parsed {
            Ok((amount, balance)) => out.transactions.push(Transaction::new(
                out.transactions.len() as i64 + 1,
                caps["desc"].trim(),
                date,
                amount,
                balance,
            )),
            Err(reason) => {
                let skip = RowSkip::new(row, reason);
                warn!(%skip, "dropping statement row");
                out.skipped.push(skip);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use verity_core::Balance;

    #[test]
    fn test_parse_amount_balance_basic() {
        let text = r#"
TRANSACTION DETAIL
       DATE          DESCRIPTION                                     AMOUNT     BALANCE
       22/04/2025    ATM CASH WDL 0192 MG ROAD                      -500.00   2,149.13
       23/04/2025    NEFT CR SALARY APR 2025                       1,000.00   3,149.13 Cr
       24 Apr 2025   Cheque 000452                                   -49.13   3,100.00
"#;

        let rows = parse_amount_balance_text(text).unwrap();
        assert_eq!(rows.transactions.len(), 3);
        assert_eq!(rows.transactions[0].amount, -500.00);
        assert_eq!(rows.transactions[0].balance, Some(Balance::Amount(2149.13)));
        assert_eq!(rows.transactions[0].details, "ATM CASH WDL 0192 MG ROAD");
        assert_eq!(rows.transactions[1].amount, 1000.00);
        assert_eq!(rows.transactions[1].balance, Some(Balance::Amount(3149.13)));
        assert_eq!(rows.transactions[2].details, "Cheque 000452");
    }

    #[test]
    fn test_header_and_totals_are_ignored() {
        let text = "DATE DESCRIPTION AMOUNT BALANCE\nTotal 10.00 20.00\n";
        assert!(parse_amount_balance_text(text).unwrap().is_empty());
    }
}
