use std::fmt;

use chrono::{Local, NaiveDate};

use crate::normalize::normalize_opt;
use crate::record::Record;

const REVOCATION_TOKEN: &str = "revogacao";

/// Lifecycle label derived from a permit's type and expiration date.
///
/// Never stored on the record, always computed against "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PermitStatus {
    Revoked,
    Valid,
    Expired,
    UnspecifiedDate,
    InvalidFormat,
}

impl PermitStatus {
    pub const ALL: [PermitStatus; 5] = [
        PermitStatus::Revoked,
        PermitStatus::Valid,
        PermitStatus::Expired,
        PermitStatus::UnspecifiedDate,
        PermitStatus::InvalidFormat,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PermitStatus::Revoked => "Revoked",
            PermitStatus::Valid => "Valid",
            PermitStatus::Expired => "Expired",
            PermitStatus::UnspecifiedDate => "Unspecified date",
            PermitStatus::InvalidFormat => "Invalid format",
        }
    }

    pub fn from_label(label: &str) -> Option<PermitStatus> {
        let wanted = label.trim().to_lowercase();
        PermitStatus::ALL
            .into_iter()
            .find(|s| s.label().to_lowercase() == wanted)
    }
}

impl fmt::Display for PermitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies a record against the given date.
pub fn classify(record: &Record, today: NaiveDate) -> PermitStatus {
    if normalize_opt(record.kind.as_deref()).contains(REVOCATION_TOKEN) {
        return PermitStatus::Revoked;
    }

    let expiration = match record.expiration_date.as_deref() {
        Some(s) if !s.trim().is_empty() => s,
        _ => return PermitStatus::UnspecifiedDate,
    };

    match parse_date(expiration) {
        Some(date) if date > today => PermitStatus::Valid,
        Some(_) => PermitStatus::Expired,
        None => PermitStatus::InvalidFormat,
    }
}

/// Classifies a record against the current local date.
pub fn classify_now(record: &Record) -> PermitStatus {
    classify(record, today())
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Strict `DD/MM/YYYY`. Dates that match the pattern but do not exist
/// on the calendar (e.g. 31/02) are rejected as well.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[2] == b'/'
        && bytes[5] == b'/'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 2 || i == 5 || b.is_ascii_digit());
    if !shape_ok {
        return None;
    }
    let day = s[0..2].parse().ok()?;
    let month = s[3..5].parse().ok()?;
    let year = s[6..10].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
