//! Execution of a finalized condition against the roster snapshot.
//!
//! Filter mode walks the predicate tree with short-circuit boolean logic
//! and preserves dataset order. Ranking mode finds the extreme value of the
//! ranking field within the candidate pool and returns every row tied at
//! that extreme. A type mismatch at this stage means upstream validation
//! was bypassed; it is logged and surfaced as an internal fault, never as
//! a user-facing "no results".

use std::cmp::Ordering;

use serde::Serialize;
use tracing::error;

use crate::condition::{Condition, Direction, Expr, FieldValue, Predicate, RankingSpec};
use crate::error::{CohortError, Result};
use crate::roster::{Record, Roster};
use crate::schema::Operator;

/// Result of one query: a human-readable rendering of the condition that
/// was executed, matching rows in dataset order, and their count. The count
/// is derived from the rows, so the two can never diverge.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub condition: String,
    pub rows: Vec<Record>,
    pub count: usize,
}

impl QueryResult {
    fn new(condition: &Condition, rows: Vec<Record>) -> Self {
        Self { condition: condition.to_string(), count: rows.len(), rows }
    }
}

pub fn evaluate(roster: &Roster, condition: &Condition) -> Result<QueryResult> {
    let rows = match condition {
        Condition::Filter(expr) => filter_rows(roster, expr)?,
        Condition::Ranking(spec) => rank_rows(roster, spec)?,
    };
    Ok(QueryResult::new(condition, rows))
}

fn filter_rows(roster: &Roster, expr: &Expr) -> Result<Vec<Record>> {
    let mut rows = Vec::new();
    for record in roster.records() {
        if eval_expr(expr, record)? {
            rows.push(record.clone());
        }
    }
    Ok(rows)
}

fn rank_rows(roster: &Roster, spec: &RankingSpec) -> Result<Vec<Record>> {
    // candidate pool first, then the extreme within it
    let mut pool: Vec<(usize, f64)> = Vec::new();
    for (index, record) in roster.records().iter().enumerate() {
        if let Some(filter) = &spec.pool {
            if !eval_expr(filter, record)? {
                continue;
            }
        }
        pool.push((index, numeric_value(record, spec.field)?));
    }
    // an empty pool is an empty answer, not an error
    if pool.is_empty() {
        return Ok(Vec::new());
    }

    let mut ordered = pool.clone();
    ordered.sort_by(|a, b| match spec.direction {
        Direction::Max => compare_f64(b.1, a.1),
        Direction::Min => compare_f64(a.1, b.1),
    });
    let limit = spec.limit.max(1).min(ordered.len());
    let boundary = ordered[limit - 1].1;

    // everything at least as extreme as the boundary stays in, so ties at
    // the cut are included rather than arbitrarily dropped
    let keeps = |value: f64| match spec.direction {
        Direction::Max => value >= boundary,
        Direction::Min => value <= boundary,
    };
    let rows = pool
        .into_iter()
        .filter(|(_, value)| keeps(*value))
        .map(|(index, _)| roster.records()[index].clone())
        .collect();
    Ok(rows)
}

fn eval_expr(expr: &Expr, record: &Record) -> Result<bool> {
    match expr {
        Expr::Compare(p) => eval_predicate(p, record),
        Expr::And(children) => {
            for child in children {
                if !eval_expr(child, record)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Expr::Or(children) => {
            for child in children {
                if eval_expr(child, record)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn eval_predicate(predicate: &Predicate, record: &Record) -> Result<bool> {
    let actual = record
        .value_of(predicate.field)
        .ok_or_else(|| consistency_fault(predicate, "field absent from record"))?;
    match (&actual, &predicate.value) {
        (FieldValue::Integer(a), FieldValue::Integer(b)) => Ok(compare_ord(a.cmp(b), predicate.op)),
        (FieldValue::Number(a), FieldValue::Number(b)) => {
            Ok(compare_ord(compare_f64(*a, *b), predicate.op))
        }
        // integer fields compared against float literals (and vice versa)
        // are still numeric comparisons, never lexicographic
        (FieldValue::Integer(a), FieldValue::Number(b)) => {
            Ok(compare_ord(compare_f64(*a as f64, *b), predicate.op))
        }
        (FieldValue::Number(a), FieldValue::Integer(b)) => {
            Ok(compare_ord(compare_f64(*a, *b as f64), predicate.op))
        }
        (FieldValue::Text(a), FieldValue::Text(b)) => match predicate.op {
            Operator::Eq => Ok(a == b),
            Operator::Ne => Ok(a != b),
            _ => Err(consistency_fault(predicate, "ordering comparison on text")),
        },
        (FieldValue::Boolean(a), FieldValue::Boolean(b)) => match predicate.op {
            Operator::Eq => Ok(a == b),
            Operator::Ne => Ok(a != b),
            _ => Err(consistency_fault(predicate, "ordering comparison on boolean")),
        },
        _ => Err(consistency_fault(predicate, "value type does not match field")),
    }
}

fn numeric_value(record: &Record, field: &'static str) -> Result<f64> {
    match record.value_of(field) {
        Some(FieldValue::Number(n)) => Ok(n),
        Some(FieldValue::Integer(i)) => Ok(i as f64),
        _ => {
            error!(field, "ranking over a non-numeric field slipped past validation");
            Err(CohortError::InternalConsistency(format!(
                "ranking field {field} is not numeric"
            )))
        }
    }
}

fn compare_ord(ordering: Ordering, op: Operator) -> bool {
    match op {
        Operator::Eq => ordering == Ordering::Equal,
        Operator::Ne => ordering != Ordering::Equal,
        Operator::Gt => ordering == Ordering::Greater,
        Operator::Gte => ordering != Ordering::Less,
        Operator::Lt => ordering == Ordering::Less,
        Operator::Lte => ordering != Ordering::Greater,
    }
}

// Scores are finite by ingestion, so a total order exists in practice.
fn compare_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn consistency_fault(predicate: &Predicate, detail: &str) -> CohortError {
    error!(predicate = %predicate, detail, "predicate evaluation hit a validation bypass");
    CohortError::InternalConsistency(format!("{detail}: {predicate}"))
}
