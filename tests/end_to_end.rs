//! The full pipeline on the canonical "topper" scenario: the restriction
//! comes from the question text (via the ranking pool), the role scope is
//! unrestricted, and ties at the extreme are both returned.

use std::sync::Arc;

use async_trait::async_trait;
use cohort::error::Result;
use cohort::interface::QueryPipeline;
use cohort::roster::{Record, Roster};
use cohort::schema::SchemaRegistry;
use cohort::scope::RoleScope;
use cohort::stats;
use cohort::translate::{parse_payload, ConditionProvider, RawCondition};

struct Scripted(&'static str);

#[async_trait]
impl ConditionProvider for Scripted {
    async fn propose(
        &self,
        _query: &str,
        _registry: &SchemaRegistry,
        _scope: &RoleScope,
    ) -> Result<RawCondition> {
        parse_payload(self.0)
    }
}

fn record(name: &str, grade: i64, class: &str, score: f64, homework: bool) -> Record {
    Record {
        name: name.into(),
        grade,
        class_name: class.into(),
        quiz_score: score,
        homework_submitted: homework,
    }
}

#[tokio::test]
async fn topper_from_seventh_only_returns_the_tied_seventh_graders() {
    let roster = Roster::new(vec![
        record("Asha", 7, "A", 95.0, true),
        record("Ben", 7, "B", 95.0, false),
        record("Chen", 8, "A", 98.0, true),
    ]);
    // what the language service is expected to make of the question
    let reply = r#"{"kind":"ranking","field":"quiz_score","direction":"max",
        "pool":{"field":"grade","op":"eq","value":7}}"#;
    let p = QueryPipeline::new(
        Arc::new(roster),
        Arc::new(SchemaRegistry::student_records()),
        Box::new(Scripted(reply)),
    );

    let result = p
        .query("Who is topper from 7th class?", &RoleScope::unrestricted())
        .await
        .unwrap();

    assert_eq!(result.count, 2);
    let names: Vec<&str> = result.rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Asha", "Ben"], "the higher-scoring 8th grader stays out");
    assert_eq!(result.condition, "top 1 by quiz_score where grade == 7");
}

#[tokio::test]
async fn result_rows_feed_straight_into_aggregation() {
    let roster = Roster::new(vec![
        record("Asha", 7, "A", 80.0, true),
        record("Ben", 7, "A", 90.0, true),
        record("Chen", 7, "B", 70.0, false),
        record("Dara", 8, "C", 50.0, true),
    ]);
    let reply = r#"{"kind":"filter","where":{"field":"grade","op":"eq","value":7}}"#;
    let registry = Arc::new(SchemaRegistry::student_records());
    let p = QueryPipeline::new(Arc::new(roster), Arc::clone(&registry), Box::new(Scripted(reply)));

    let result = p.query("grade 7 students", &RoleScope::unrestricted()).await.unwrap();
    let summaries =
        stats::grouped_mean(&registry, &result.rows, "class_name", "quiz_score").unwrap();

    assert_eq!(summaries.len(), 2, "class C has no grade-7 rows and is absent");
    assert_eq!(summaries[0].key, "A");
    assert_eq!(summaries[0].mean, 85.0);
    assert_eq!(summaries[1].key, "B");
    assert_eq!(summaries[1].mean, 70.0);
}
