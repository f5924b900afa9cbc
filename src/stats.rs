//! Grouped numeric summaries over any sequence of records.
//!
//! Independent of the filter path: callers hand in either a query result's
//! rows or the full roster. Group keys keep the insertion order of first
//! appearance; a group with zero members simply never exists, so there is
//! no divide-by-zero case to special-case.

use serde::Serialize;

use crate::condition::FieldValue;
use crate::error::{CohortError, Result};
use crate::roster::{Record, Roster};
use crate::schema::{FieldType, SchemaRegistry};

/// Count and arithmetic mean of one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    pub count: usize,
    pub mean: f64,
}

/// Mean of `measure` grouped by `group_by`. Both field choices are
/// configuration and are validated against the schema registry here, not
/// guessed from text.
pub fn grouped_mean(
    registry: &SchemaRegistry,
    records: &[Record],
    group_by: &str,
    measure: &str,
) -> Result<Vec<GroupSummary>> {
    let group_spec = registry.resolve(group_by).ok_or_else(|| CohortError::SchemaViolation {
        message: format!("unknown grouping field: {group_by}"),
    })?;
    if !group_spec.groupable() {
        return Err(CohortError::SchemaViolation {
            message: format!("field {} cannot be grouped by", group_spec.name()),
        });
    }
    let measure_spec = registry.resolve(measure).ok_or_else(|| CohortError::SchemaViolation {
        message: format!("unknown measure field: {measure}"),
    })?;
    if !matches!(measure_spec.field_type(), FieldType::Integer | FieldType::Number) {
        return Err(CohortError::SchemaViolation {
            message: format!("field {} is not numeric", measure_spec.name()),
        });
    }

    // groups are few, so a linear scan keeps first-appearance order for free
    let mut groups: Vec<(String, usize, f64)> = Vec::new();
    for record in records {
        let key = match record.value_of(group_spec.name()) {
            Some(value) => key_string(&value),
            None => continue,
        };
        let sample = match record.value_of(measure_spec.name()) {
            Some(FieldValue::Number(n)) => n,
            Some(FieldValue::Integer(i)) => i as f64,
            _ => continue,
        };
        match groups.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, count, sum)) => {
                *count += 1;
                *sum += sample;
            }
            None => groups.push((key, 1, sample)),
        }
    }
    Ok(groups
        .into_iter()
        .map(|(key, count, sum)| GroupSummary { key, count, mean: sum / count as f64 })
        .collect())
}

fn key_string(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.clone(),
        FieldValue::Integer(i) => i.to_string(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Boolean(b) => b.to_string(),
    }
}

// ------------- Dataset overview -------------

/// The roster-level numbers the stats endpoint serves.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetOverview {
    pub total_records: usize,
    pub filtered_records: usize,
    pub grades: Vec<i64>,
    pub classes: Vec<String>,
    pub average_quiz_score: Option<f64>,
    pub homework_submitted_count: usize,
}

pub fn overview(roster: &Roster, rows: &[Record]) -> DatasetOverview {
    let mut grades: Vec<i64> = rows.iter().map(|r| r.grade).collect();
    grades.sort_unstable();
    grades.dedup();
    let mut classes: Vec<String> = rows.iter().map(|r| r.class_name.clone()).collect();
    classes.sort();
    classes.dedup();
    let average_quiz_score = if rows.is_empty() {
        None
    } else {
        Some(rows.iter().map(|r| r.quiz_score).sum::<f64>() / rows.len() as f64)
    };
    DatasetOverview {
        total_records: roster.len(),
        filtered_records: rows.len(),
        grades,
        classes,
        average_quiz_score,
        homework_submitted_count: rows.iter().filter(|r| r.homework_submitted).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<Record> {
        vec![
            Record {
                name: "Asha".into(),
                grade: 7,
                class_name: "A".into(),
                quiz_score: 80.0,
                homework_submitted: true,
            },
            Record {
                name: "Ben".into(),
                grade: 7,
                class_name: "A".into(),
                quiz_score: 90.0,
                homework_submitted: false,
            },
            Record {
                name: "Chen".into(),
                grade: 8,
                class_name: "B".into(),
                quiz_score: 70.0,
                homework_submitted: true,
            },
        ]
    }

    #[test]
    fn grouped_mean_by_class() {
        let registry = SchemaRegistry::student_records();
        let summaries = grouped_mean(&registry, &records(), "class_name", "quiz_score").unwrap();
        assert_eq!(summaries.len(), 2, "class C has no rows and is absent");
        assert_eq!(summaries[0].key, "A");
        assert_eq!(summaries[0].mean, 85.0);
        assert_eq!(summaries[1].key, "B");
        assert_eq!(summaries[1].mean, 70.0);
    }

    #[test]
    fn group_keys_keep_first_appearance_order() {
        let registry = SchemaRegistry::student_records();
        let mut rows = records();
        rows.reverse();
        let summaries = grouped_mean(&registry, &rows, "grade", "quiz_score").unwrap();
        let keys: Vec<&str> = summaries.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["8", "7"]);
    }

    #[test]
    fn ungroupable_or_unknown_fields_are_rejected() {
        let registry = SchemaRegistry::student_records();
        assert!(grouped_mean(&registry, &records(), "quiz_score", "quiz_score").is_err());
        assert!(grouped_mean(&registry, &records(), "favorite_color", "quiz_score").is_err());
        assert!(grouped_mean(&registry, &records(), "class_name", "name").is_err());
    }

    #[test]
    fn overview_counts_and_averages() {
        let roster = Roster::new(records());
        let stats = overview(&roster, roster.records());
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.grades, vec![7, 8]);
        assert_eq!(stats.classes, vec!["A", "B"]);
        assert_eq!(stats.average_quiz_score, Some(80.0));
        assert_eq!(stats.homework_submitted_count, 2);
    }

    #[test]
    fn overview_of_nothing_has_no_average() {
        let roster = Roster::new(records());
        let stats = overview(&roster, &[]);
        assert_eq!(stats.filtered_records, 0);
        assert_eq!(stats.average_quiz_score, None);
    }
}
