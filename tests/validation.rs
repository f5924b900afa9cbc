use std::sync::Arc;

use async_trait::async_trait;
use cohort::error::{CohortError, Result};
use cohort::interface::QueryPipeline;
use cohort::roster::{Record, Roster};
use cohort::schema::SchemaRegistry;
use cohort::scope::RoleScope;
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

fn setup(reply: &'static str) -> QueryPipeline {
    let roster = Roster::new(vec![
        Record {
            name: "Asha".into(),
            grade: 7,
            class_name: "A".into(),
            quiz_score: 91.0,
            homework_submitted: false,
        },
        Record {
            name: "Ben".into(),
            grade: 7,
            class_name: "B".into(),
            quiz_score: 62.0,
            homework_submitted: true,
        },
    ]);
    QueryPipeline::new(
        Arc::new(roster),
        Arc::new(SchemaRegistry::student_records()),
        Box::new(Scripted(reply)),
    )
}

#[tokio::test]
async fn unknown_field_as_only_clause_fails_instead_of_returning_everything() {
    let p = setup(r#"{"kind":"filter","where":{"field":"favorite_color","op":"eq","value":"blue"}}"#);
    let err = p.query("favorite colors?", &RoleScope::unrestricted()).await.unwrap_err();
    assert!(matches!(err, CohortError::TranslationInvalid(_)));
}

#[tokio::test]
async fn bad_clause_is_stripped_and_the_rest_executes() {
    let p = setup(
        r#"{"kind":"filter","where":{"all":[
            {"field":"favorite_color","op":"eq","value":"blue"},
            {"field":"homework_submitted","op":"eq","value":false}
        ]}}"#,
    );
    let result = p.query("missing homework?", &RoleScope::unrestricted()).await.unwrap();
    assert_eq!(result.count, 1);
    assert_eq!(result.rows[0].name, "Asha");
    assert_eq!(result.condition, "homework_submitted == false");
}

#[tokio::test]
async fn prose_reply_is_not_understood() {
    let p = setup("Sorry, I can only answer questions about students.");
    let err = p.query("what is the weather?", &RoleScope::unrestricted()).await.unwrap_err();
    assert!(matches!(err, CohortError::TranslationInvalid(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn blank_query_never_reaches_the_service() {
    let p = setup(r#"{"kind":"filter","where":{"field":"grade","op":"eq","value":7}}"#);
    let err = p.query("   ", &RoleScope::unrestricted()).await.unwrap_err();
    assert!(matches!(err, CohortError::TranslationInvalid(_)));
}

#[tokio::test]
async fn yes_no_values_are_folded_to_booleans() {
    let p = setup(r#"{"kind":"filter","where":{"field":"homework_submitted","op":"eq","value":"Yes"}}"#);
    let result = p.query("who submitted?", &RoleScope::unrestricted()).await.unwrap();
    assert_eq!(result.count, 1);
    assert_eq!(result.rows[0].name, "Ben");
}
