//! Role scope enforcement: the caller-supplied grade/class boundary is made
//! authoritative over whatever the translator produced.
//!
//! Clamping is a pure function from (condition, scope) to a new condition.
//! It runs after translation on purpose: prompt instructions are not a
//! security boundary, so even an adversarially-suggested expression cannot
//! widen the visible dataset. When the scope fixes a field, any candidate
//! predicate on that field is overridden by the scope's equality rather than
//! rejected, so a conflicting query still answers within the boundary.

use serde::Deserialize;

use crate::condition::{Condition, Expr, FieldValue, Predicate};
use crate::schema::Operator;

/// The caller's permitted boundary. `None` means unrestricted ("any").
/// Supplied by the transport layer per request, never derived from the
/// query text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleScope {
    #[serde(default)]
    pub grade: Option<i64>,
    #[serde(default)]
    pub class_name: Option<String>,
}

impl RoleScope {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.grade.is_none() && self.class_name.is_none()
    }

    fn predicates(&self) -> Vec<Predicate> {
        let mut preds = Vec::new();
        if let Some(grade) = self.grade {
            preds.push(Predicate::new("grade", Operator::Eq, FieldValue::Integer(grade)));
        }
        if let Some(class) = &self.class_name {
            preds.push(Predicate::new(
                "class_name",
                Operator::Eq,
                FieldValue::Text(class.trim().to_uppercase()),
            ));
        }
        preds
    }
}

/// Clamp a condition to the scope. Filter trees get the scope's equality
/// predicates conjoined; ranking pools are restricted the same way.
pub fn clamp(condition: Condition, scope: &RoleScope) -> Condition {
    if scope.is_unrestricted() {
        return condition;
    }
    match condition {
        Condition::Filter(expr) => Condition::Filter(clamp_expr(Some(expr), scope)),
        Condition::Ranking(mut spec) => {
            spec.pool = Some(clamp_expr(spec.pool, scope));
            Condition::Ranking(spec)
        }
    }
}

fn clamp_expr(expr: Option<Expr>, scope: &RoleScope) -> Expr {
    // candidate predicates on scoped fields are dropped first; the scope
    // always wins over anything the translator suggested for those fields
    let mut stripped = expr;
    if scope.grade.is_some() {
        stripped = stripped.and_then(|e| strip_field(e, "grade"));
    }
    if scope.class_name.is_some() {
        stripped = stripped.and_then(|e| strip_field(e, "class_name"));
    }
    let mut parts: Vec<Expr> = scope.predicates().into_iter().map(Expr::Compare).collect();
    if let Some(rest) = stripped {
        parts.push(rest);
    }
    flatten(Expr::And(parts))
}

fn strip_field(expr: Expr, field: &str) -> Option<Expr> {
    match expr {
        Expr::Compare(p) => {
            if p.field == field {
                None
            } else {
                Some(Expr::Compare(p))
            }
        }
        Expr::And(children) => rebuild(children, field, Expr::And),
        Expr::Or(children) => rebuild(children, field, Expr::Or),
    }
}

fn rebuild(children: Vec<Expr>, field: &str, combine: fn(Vec<Expr>) -> Expr) -> Option<Expr> {
    let kept: Vec<Expr> = children
        .into_iter()
        .filter_map(|child| strip_field(child, field))
        .collect();
    match kept.len() {
        0 => None,
        1 => kept.into_iter().next(),
        _ => Some(combine(kept)),
    }
}

fn flatten(expr: Expr) -> Expr {
    match expr {
        Expr::And(mut children) if children.len() == 1 => children.remove(0),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Direction, RankingSpec};

    fn pred(field: &'static str, op: Operator, value: FieldValue) -> Expr {
        Expr::Compare(Predicate::new(field, op, value))
    }

    #[test]
    fn unrestricted_scope_leaves_condition_alone() {
        let condition = Condition::Filter(pred(
            "quiz_score",
            Operator::Gt,
            FieldValue::Number(90.0),
        ));
        let clamped = clamp(condition.clone(), &RoleScope::unrestricted());
        assert_eq!(clamped, condition);
    }

    #[test]
    fn conflicting_grade_is_overridden_not_rejected() {
        let scope = RoleScope { grade: Some(8), class_name: None };
        let condition = Condition::Filter(pred("grade", Operator::Eq, FieldValue::Integer(7)));
        let clamped = clamp(condition, &scope);
        assert_eq!(
            clamped,
            Condition::Filter(pred("grade", Operator::Eq, FieldValue::Integer(8)))
        );
    }

    #[test]
    fn scope_is_conjoined_onto_unrelated_filters() {
        let scope = RoleScope { grade: Some(8), class_name: Some("a".into()) };
        let condition = Condition::Filter(pred(
            "homework_submitted",
            Operator::Eq,
            FieldValue::Boolean(false),
        ));
        let clamped = clamp(condition, &scope);
        assert_eq!(
            clamped.to_string(),
            "grade == 8 and class_name == \"A\" and homework_submitted == false"
        );
    }

    #[test]
    fn ranking_pool_is_restricted() {
        let scope = RoleScope { grade: Some(7), class_name: None };
        let condition = Condition::Ranking(RankingSpec::new("quiz_score", Direction::Max));
        let clamped = clamp(condition, &scope);
        assert_eq!(clamped.to_string(), "top 1 by quiz_score where grade == 7");
    }
}
