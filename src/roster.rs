//! The roster: the immutable dataset snapshot every query is answered from.
//!
//! Records are normalized at ingestion (trimmed, class letters upper-cased,
//! yes/no homework markers folded to booleans) so that the evaluator can
//! compare values without re-normalizing per query. The snapshot is built
//! once at startup and only ever read after that; concurrent queries share
//! it behind an `Arc` with no locking.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::condition::FieldValue;
use crate::error::Result;

// ------------- Record -------------

/// One student row. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub name: String,
    pub grade: i64,
    pub class_name: String,
    pub quiz_score: f64,
    pub homework_submitted: bool,
}

impl Record {
    /// Typed value of a field by its schema name. `None` only for names the
    /// schema registry never issued, which validation upstream rules out.
    pub fn value_of(&self, field: &str) -> Option<FieldValue> {
        match field {
            "name" => Some(FieldValue::Text(self.name.clone())),
            "grade" => Some(FieldValue::Integer(self.grade)),
            "class_name" => Some(FieldValue::Text(self.class_name.clone())),
            "quiz_score" => Some(FieldValue::Number(self.quiz_score)),
            "homework_submitted" => Some(FieldValue::Boolean(self.homework_submitted)),
            _ => None,
        }
    }
}

// The raw shape of a CSV row before coercion. Everything arrives as text;
// coercion decides which rows make it into the snapshot.
#[derive(Debug, Deserialize)]
struct RawRow {
    name: String,
    grade: String,
    #[serde(rename = "class", alias = "class_name")]
    class_name: String,
    quiz_score: String,
    homework_submitted: String,
}

impl RawRow {
    fn coerce(self) -> Option<Record> {
        let name = self.name.trim().to_owned();
        let grade = self.grade.trim().parse::<i64>().ok()?;
        let class_name = self.class_name.trim().to_uppercase();
        let quiz_score = self.quiz_score.trim().parse::<f64>().ok()?;
        if !(0.0..=100.0).contains(&quiz_score) {
            return None;
        }
        let homework_submitted = match self.homework_submitted.trim().to_lowercase().as_str() {
            "yes" | "true" | "1" => true,
            "no" | "false" | "0" => false,
            _ => return None,
        };
        Some(Record { name, grade, class_name, quiz_score, homework_submitted })
    }
}

// ------------- Roster -------------

/// Read-only ordered sequence of records.
#[derive(Debug, Default)]
pub struct Roster {
    records: Vec<Record>,
}

impl Roster {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Load and normalize a roster from a CSV file. Rows whose values fail
    /// coercion are skipped with a warning rather than aborting the load,
    /// so one malformed line cannot take the whole dataset down.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let mut records = Vec::new();
        let mut skipped = 0usize;
        for (line, row) in reader.deserialize::<RawRow>().enumerate() {
            match row {
                Ok(raw) => match raw.coerce() {
                    Some(record) => records.push(record),
                    None => {
                        skipped += 1;
                        warn!(line = line + 2, "skipping row with uncoercible values");
                    }
                },
                Err(e) => {
                    skipped += 1;
                    warn!(line = line + 2, error = %e, "skipping unreadable row");
                }
            }
        }
        info!(loaded = records.len(), skipped, "roster ingested");
        Ok(Self { records })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_normalizes_class_and_homework() {
        let raw = RawRow {
            name: " Priya ".into(),
            grade: "7".into(),
            class_name: " a".into(),
            quiz_score: "88.5".into(),
            homework_submitted: "Yes".into(),
        };
        let record = raw.coerce().unwrap();
        assert_eq!(record.name, "Priya");
        assert_eq!(record.class_name, "A");
        assert!(record.homework_submitted);
    }

    #[test]
    fn out_of_range_scores_are_dropped() {
        let raw = RawRow {
            name: "X".into(),
            grade: "7".into(),
            class_name: "B".into(),
            quiz_score: "123".into(),
            homework_submitted: "no".into(),
        };
        assert!(raw.coerce().is_none());
    }
}
