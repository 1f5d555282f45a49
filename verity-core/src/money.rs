//! Monetary value coercion.
//!
//! Two dialects:
//! - strict: what the normalizer accepts from extractors. A clean signed
//!   decimal or a placeholder. Symbols and separators are rejected, not
//!   stripped.
//! - balance literal: what a statement (or a user editing one) prints in the
//!   balance column, e.g. `1,025.50 Cr`. Markers and separators are stripped.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{AmountError, ReconcileError};

const PLACEHOLDERS: &[&str] = &["", "-", "--", "nan", "null", "none", "n/a", "na"];

/// True for the "no value here" markers extractors emit.
pub fn is_placeholder(s: &str) -> bool {
    let s = s.trim();
    PLACEHOLDERS.iter().any(|p| s.eq_ignore_ascii_case(p))
}

/// Strictly parse a monetary string. `Ok(None)` for placeholders.
pub fn parse_strict(s: &str) -> Result<Option<f64>, AmountError> {
    let t = s.trim();
    if is_placeholder(t) {
        return Ok(None);
    }
    if t.contains(',') {
        return Err(AmountError::ThousandsSeparator(s.to_string()));
    }
    if t.chars().any(is_currency_char) || has_currency_code(t) {
        return Err(AmountError::CurrencySymbol(s.to_string()));
    }
    let body = t.strip_prefix(['+', '-']).unwrap_or(t);
    let well_formed = !body.is_empty()
        && body.chars().all(|c| c.is_ascii_digit() || c == '.')
        && body.chars().filter(|c| *c == '.').count() <= 1
        && body.chars().any(|c| c.is_ascii_digit());
    if !well_formed {
        return Err(AmountError::NotANumber(s.to_string()));
    }
    t.parse::<f64>()
        .map(Some)
        .map_err(|_| AmountError::NotANumber(s.to_string()))
}

/// Strictly coerce a JSON value. Numbers pass through, strings go through
/// [`parse_strict`], `null` is a placeholder.
pub fn value_strict(v: &Value) -> Result<Option<f64>, AmountError> {
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| AmountError::NotANumber(n.to_string())),
        Value::String(s) => parse_strict(s),
        other => Err(AmountError::WrongType(json_kind(other).to_string())),
    }
}

/// Parse a printed balance: drops `Cr`/`Dr` markers, thousands separators and
/// whitespace. `Ok(None)` for placeholders.
pub fn parse_balance_literal(s: &str) -> Result<Option<f64>, ReconcileError> {
    let cleaned: String = s
        .replace("Cr", "")
        .replace("CR", "")
        .replace("Dr", "")
        .replace("DR", "")
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if is_placeholder(&cleaned) {
        return Ok(None);
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| ReconcileError::UnparsableBalance(s.to_string()))
}

/// Serde adapter for signed amounts in user-edited rows: numbers, numeric
/// strings, `null` and placeholders (as zero).
pub fn de_amount<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let v = Value::deserialize(d)?;
    value_strict(&v)
        .map(|a| a.unwrap_or(0.0))
        .map_err(serde::de::Error::custom)
}

const CURRENCY_CODES: &[&str] = &["rs.", "rs", "inr", "usd", "eur", "gbp", "ngn", "zar", "kes"];

fn is_currency_char(c: char) -> bool {
    matches!(c, '$' | '€' | '£' | '¥' | '₹' | '₦' | '₩' | '₱' | '₽' | '¢')
}

fn has_currency_code(t: &str) -> bool {
    let lower = t.to_ascii_lowercase();
    let lower = lower.trim_start_matches(['+', '-']);
    CURRENCY_CODES
        .iter()
        .any(|code| lower.starts_with(code) || lower.ends_with(code))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
