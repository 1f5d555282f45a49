//! Statement date parsing.
//!
//! Canonical form is day-month-year (`DD-MM-YYYY`). Extractors and users
//! also hand us slashes, dots, ISO dates and short month names.

use chrono::NaiveDate;

/// Canonical serialization format.
pub const DMY: &str = "%d-%m-%Y";

const ACCEPTED: &[&str] = &[
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%Y-%m-%d",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d %B %Y",
    "%b %d, %Y",
];

/// Parse a statement date in any accepted layout.
pub fn parse_statement_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    ACCEPTED
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Format a date the canonical way.
pub fn format_dmy(date: NaiveDate) -> String {
    date.format(DMY).to_string()
}

/// `#[serde(with = "crate::dates::dmy")]` adapter.
pub mod dmy {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_dmy(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_statement_date(&raw)
            .ok_or_else(|| de::Error::custom(format!("unrecognised date {raw:?}")))
    }
}
