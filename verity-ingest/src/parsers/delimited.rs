//! Delimited (CSV-like) statement text.
//!
//! The first non-empty line is the header. Columns are mapped by
//! case-insensitive substring:
//!   date            -> date
//!   desc            -> description
//!   debit/withdraw  -> debit
//!   credit/deposit  -> credit
//!   bal             -> running balance
//!   amount          -> signed amount (only used without debit/credit)
//! Data rows are read positionally. A row whose field count differs from the
//! header's, or whose date/amounts do not convert, is skipped and reported.

use csv::{ReaderBuilder, Trim};
use tracing::{debug, warn};
use verity_core::dates::parse_statement_date;
use verity_core::money::parse_strict;
use verity_core::{RowSkip, SkipReason, Transaction};

use super::{printed_balance, ParsedRows};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Date,
    Description,
    Debit,
    Credit,
    Balance,
    Amount,
    Ignored,
}

fn map_column(name: &str) -> Column {
    let name = name.trim().to_lowercase();
    if name.contains("date") {
        Column::Date
    } else if name.contains("desc") {
        Column::Description
    } else if name.contains("debit") || name.contains("withdraw") {
        Column::Debit
    } else if name.contains("credit") || name.contains("deposit") {
        Column::Credit
    } else if name.contains("bal") {
        Column::Balance
    } else if name.contains("amount") {
        Column::Amount
    } else {
        Column::Ignored
    }
}

/// First occurrence of each mapped column wins ("Value Date" after "Date"
/// does not replace it).
struct Layout {
    width: usize,
    date: usize,
    description: Option<usize>,
    debit: Option<usize>,
    credit: Option<usize>,
    balance: Option<usize>,
    amount: Option<usize>,
}

impl Layout {
    fn from_header(fields: &[String]) -> Option<Self> {
        let find = |col: Column| fields.iter().position(|f| map_column(f) == col);
        let layout = Layout {
            width: fields.len(),
            date: find(Column::Date)?,
            description: find(Column::Description),
            debit: find(Column::Debit),
            credit: find(Column::Credit),
            balance: find(Column::Balance),
            amount: find(Column::Amount),
        };
        let has_money = layout.debit.is_some()
            || layout.credit.is_some()
            || layout.amount.is_some()
            || layout.balance.is_some();
        has_money.then_some(layout)
    }
}

/// Parse delimited text. `None` when the first non-empty line is not a
/// recognisable delimited header.
pub fn parse_delimited_text(text: &str) -> Option<ParsedRows> {
    let (header_line, _) = text
        .lines()
        .enumerate()
        .find(|(_, l)| !l.trim().is_empty())?;
    let header_text = text.lines().nth(header_line)?;
    if !header_text.contains(',') {
        return None;
    }

    let body: String = text
        .lines()
        .skip(header_line)
        .collect::<Vec<_>>()
        .join("\n");
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    let mut records = rdr.records();
    let header: Vec<String> = match records.next()? {
        Ok(rec) => rec.iter().map(str::to_string).collect(),
        Err(_) => return None,
    };
    let layout = Layout::from_header(&header)?;
    debug!(columns = ?header, "delimited header detected");

    let mut out = ParsedRows::default();
    for result in records {
        let (row, fields) = match result {
            Ok(rec) => {
                let line = rec.position().map(|p| p.line() as usize).unwrap_or(1);
                let fields: Vec<String> = rec.iter().map(str::to_string).collect();
                (header_line + line - 1, fields)
            }
            Err(e) => {
                let line = e.position().map(|p| p.line() as usize).unwrap_or(1);
                let skip = RowSkip::new(header_line + line - 1, SkipReason::Decode(e.to_string()));
                warn!(%skip, "dropping delimited row");
                out.skipped.push(skip);
                continue;
            }
        };
        if fields.iter().all(|f| f.is_empty()) {
            continue;
        }

        match decode_row(&layout, &fields, out.transactions.len()) {
            Ok(txn) => out.transactions.push(txn),
            Err(reason) => {
                let skip = RowSkip::new(row, reason);
                warn!(%skip, "dropping delimited row");
                out.skipped.push(skip);
            }
        }
    }

    debug!(rows = out.transactions.len(), skipped = out.skipped.len(), "delimited parse done");
    Some(out)
}

fn decode_row(layout: &Layout, fields: &[String], kept: usize) -> Result<Transaction, SkipReason> {
    if fields.len() != layout.width {
        return Err(SkipReason::FieldCount {
            expected: layout.width,
            found: fields.len(),
        });
    }

    let raw_date = &fields[layout.date];
    let date = parse_statement_date(raw_date).ok_or_else(|| SkipReason::BadDate(raw_date.clone()))?;

    let money = |idx: Option<usize>, field: &'static str| -> Result<f64, SkipReason> {
        match idx {
            Some(i) => parse_strict(&fields[i])
                .map(|v| v.unwrap_or(0.0))
                .map_err(|source| SkipReason::BadAmount { field, source }),
            None => Ok(0.0),
        }
    };

    let amount = if layout.debit.is_some() || layout.credit.is_some() {
        let debit = money(layout.debit, "debit")?;
        let credit = money(layout.credit, "credit")?;
        credit.abs() - debit.abs()
    } else {
        money(layout.amount, "amount")?
    };

    let balance = match layout.balance {
        Some(i) => printed_balance(&fields[i])?,
        None => None,
    };

    let details = layout
        .description
        .map(|i| fields[i].clone())
        .unwrap_or_default();

    Ok(Transaction::new(kept as i64 + 1, details, date, amount, balance))
}
