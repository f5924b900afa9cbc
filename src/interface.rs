//! The query pipeline façade: one entry point owning the shared snapshot,
//! the schema registry and the translator, used by the transport layer and
//! by tests alike.
//!
//! Requests are independent units of work. Everything the pipeline holds is
//! read-only after construction, so arbitrarily many queries may run
//! concurrently without coordination; the only suspension point is the
//! translator's outbound call.

use std::sync::Arc;

use crate::error::Result;
use crate::evaluate::{self, QueryResult};
use crate::roster::{Record, Roster};
use crate::schema::SchemaRegistry;
use crate::scope::{self, RoleScope};
use crate::translate::{ConditionProvider, Translator};

pub struct QueryPipeline {
    roster: Arc<Roster>,
    registry: Arc<SchemaRegistry>,
    translator: Translator,
}

impl QueryPipeline {
    pub fn new(
        roster: Arc<Roster>,
        registry: Arc<SchemaRegistry>,
        provider: Box<dyn ConditionProvider>,
    ) -> Self {
        Self { roster, registry, translator: Translator::new(provider) }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Resolve one natural-language query: translate, clamp to the role
    /// scope, evaluate. Failures come back as values; a failed query has no
    /// effect on any other request.
    pub async fn query(&self, text: &str, role: &RoleScope) -> Result<QueryResult> {
        let candidate = self.translator.translate(text, &self.registry, role).await?;
        let finalized = scope::clamp(candidate, role);
        evaluate::evaluate(&self.roster, &finalized)
    }

    /// The subset of the roster a scope admits, for the statistics path,
    /// which does not go through translation at all.
    pub fn rows_in(&self, role: &RoleScope) -> Vec<Record> {
        self.roster
            .records()
            .iter()
            .filter(|record| {
                role.grade.is_none_or(|grade| record.grade == grade)
                    && role.class_name.as_deref().is_none_or(|class| {
                        record.class_name.eq_ignore_ascii_case(class.trim())
                    })
            })
            .cloned()
            .collect()
    }
}
