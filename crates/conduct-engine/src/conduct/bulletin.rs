use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use super::domain::{
    next_sanction_id, Rank, Sanction, SanctionKind, SubjectId, SubjectProfile, ValidationError,
};

/// Roster and sanction history extracted from a disciplinary bulletin export.
///
/// Subjects are listed once each in first-appearance order. A row with an
/// empty `Kind` column enrolls the subject without recording a sanction.
#[derive(Debug, Default)]
pub struct BulletinLedger {
    pub subjects: Vec<SubjectProfile>,
    pub sanctions: Vec<Sanction>,
}

pub fn import_ledger_from_path(path: impl AsRef<Path>) -> Result<BulletinLedger, BulletinImportError> {
    let file = File::open(path)?;
    import_ledger(file)
}

pub fn import_ledger<R: Read>(reader: R) -> Result<BulletinLedger, BulletinImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut ledger = BulletinLedger::default();
    let mut seen = HashSet::new();

    for (index, record) in csv_reader.deserialize::<BulletinRow>().enumerate() {
        // Row 1 is the header line.
        let row_number = index + 2;
        let row = record?;

        let subject_id = SubjectId(row.subject_id.clone());
        let rank = Rank::from_str(&row.rank).map_err(|source| BulletinImportError::InvalidValue {
            row: row_number,
            source,
        })?;
        if seen.insert(subject_id.clone()) {
            ledger.subjects.push(SubjectProfile {
                id: subject_id.clone(),
                name: row.name.clone(),
                rank,
            });
        }

        let Some(raw_kind) = row.kind else {
            continue;
        };
        let kind = SanctionKind::from_str(&raw_kind).map_err(|source| {
            BulletinImportError::InvalidValue {
                row: row_number,
                source,
            }
        })?;
        let duration_days = row.days.ok_or(BulletinImportError::MissingField {
            row: row_number,
            field: "Days",
        })?;
        if duration_days == 0 {
            return Err(BulletinImportError::InvalidValue {
                row: row_number,
                source: ValidationError::NonPositiveDuration { days: duration_days },
            });
        }
        let raw_applied = row.applied_at.ok_or(BulletinImportError::MissingField {
            row: row_number,
            field: "Applied At",
        })?;
        let applied_at =
            parse_instant(&raw_applied).ok_or_else(|| BulletinImportError::InvalidDate {
                row: row_number,
                value: raw_applied.clone(),
            })?;

        ledger.sanctions.push(Sanction {
            id: next_sanction_id(),
            subject_id,
            kind,
            duration_days,
            applied_at,
            terminates_at: applied_at + Duration::days(i64::from(duration_days)),
            reason: row.reason,
            source_case_ref: row.case_ref,
        });
    }

    Ok(ledger)
}

#[derive(Debug, Deserialize)]
struct BulletinRow {
    #[serde(rename = "Subject ID")]
    subject_id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Rank")]
    rank: String,
    #[serde(rename = "Kind", default, deserialize_with = "empty_string_as_none")]
    kind: Option<String>,
    #[serde(rename = "Days", default)]
    days: Option<u32>,
    #[serde(
        rename = "Applied At",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    applied_at: Option<String>,
    #[serde(rename = "Reason", default)]
    reason: String,
    #[serde(rename = "Case Ref", default, deserialize_with = "empty_string_as_none")]
    case_ref: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(instant.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    None
}

#[derive(Debug, Error)]
pub enum BulletinImportError {
    #[error("failed to read bulletin: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed bulletin: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: missing value for '{field}'")]
    MissingField { row: usize, field: &'static str },
    #[error("row {row}: {source}")]
    InvalidValue { row: usize, source: ValidationError },
    #[error("row {row}: unrecognized date '{value}'")]
    InvalidDate { row: usize, value: String },
}
