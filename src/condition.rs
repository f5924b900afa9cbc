//! The condition model: a validated filter or ranking expression.
//!
//! A [`Condition`] is what the rest of the pipeline trades in once the
//! translator has vetted the language service's proposal. It is either a
//! boolean predicate tree or a ranking specification; the two modes are
//! mutually exclusive and never mixed in one expression.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::Operator;

// ------------- FieldValue -------------

/// A typed literal, already checked against the field it is compared to.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => write!(f, "\"{s}\""),
            FieldValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

// ------------- Predicate -------------

/// A single field/operator/value comparison. The field name is the canonical
/// `&'static str` owned by the schema registry, so a predicate cannot be
/// built around a name the registry never issued.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: &'static str,
    pub op: Operator,
    pub value: FieldValue,
}

impl Predicate {
    pub fn new(field: &'static str, op: Operator, value: FieldValue) -> Self {
        Self { field, op, value }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.value)
    }
}

// ------------- Expr -------------

/// Boolean combination of predicates. Grouping is explicit in the tree, so
/// rendering only parenthesizes where the structure demands it.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare(Predicate),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    /// Visit every predicate in the tree.
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Predicate>) {
        match self {
            Expr::Compare(p) => out.push(p),
            Expr::And(children) | Expr::Or(children) => {
                for child in children {
                    child.collect(out);
                }
            }
        }
    }

    fn render(&self, f: &mut fmt::Formatter, parenthesize_or: bool) -> fmt::Result {
        match self {
            Expr::Compare(p) => write!(f, "{p}"),
            Expr::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " and ")?;
                    }
                    // or-branches bind looser than and, so they need parens here
                    child.render(f, true)?;
                }
                Ok(())
            }
            Expr::Or(children) => {
                if parenthesize_or {
                    write!(f, "(")?;
                }
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " or ")?;
                    }
                    child.render(f, false)?;
                }
                if parenthesize_or {
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.render(f, false)
    }
}

// ------------- RankingSpec -------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Max,
    Min,
}

/// A request for the rows at an extreme of a rankable field, rather than a
/// boolean filter. `pool` optionally restricts the candidate rows first
/// ("topper from 7th class" ranks only within grade 7). Ties at the cut are
/// always included, so more than `limit` rows may come back.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingSpec {
    pub field: &'static str,
    pub direction: Direction,
    pub limit: usize,
    pub pool: Option<Expr>,
}

impl RankingSpec {
    pub fn new(field: &'static str, direction: Direction) -> Self {
        Self { field, direction, limit: 1, pool: None }
    }
}

impl fmt::Display for RankingSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let end = match self.direction {
            Direction::Max => "top",
            Direction::Min => "bottom",
        };
        write!(f, "{} {} by {}", end, self.limit, self.field)?;
        if let Some(pool) = &self.pool {
            write!(f, " where {pool}")?;
        }
        Ok(())
    }
}

// ------------- Condition -------------

/// A validated expression, ready for scope clamping and evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Filter(Expr),
    Ranking(RankingSpec),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Condition::Filter(expr) => write!(f, "{expr}"),
            Condition::Ranking(spec) => write!(f, "{spec}"),
        }
    }
}
