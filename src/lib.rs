//! Cohort – natural-language querying over a student roster, clamped to
//! role scopes.
//!
//! The core is the query resolution pipeline: free-form text goes out to an
//! external language-understanding service, comes back as an untrusted
//! structured expression, is validated against the schema registry, clamped
//! to the caller's role scope, and finally evaluated against an immutable
//! in-memory roster snapshot.
//!
//! ## Modules
//! * [`schema`] – the registry of filterable/rankable/groupable fields,
//!   their types, operators and closed value sets.
//! * [`condition`] – the validated expression model: predicate trees and
//!   ranking specifications.
//! * [`roster`] – records, the dataset snapshot, and CSV ingestion with
//!   value normalization.
//! * [`translate`] – prompt construction, the language-service client, and
//!   the parse-then-validate promotion of untrusted payloads.
//! * [`scope`] – role scope clamping; the caller's boundary always wins
//!   over anything the translator produced.
//! * [`evaluate`] – filter and ranking execution over the snapshot.
//! * [`stats`] – grouped numeric summaries and the dataset overview.
//! * [`interface`] – the pipeline façade tying the stages together.
//! * [`server`] – the axum transport exposing query, stats and health.
//! * [`config`] – layered runtime settings.
//!
//! ## Trust boundaries
//! The language service's reply is parsed as data and validated field by
//! field before it becomes a [`condition::Condition`]; role scopes are
//! enforced by explicit conjunction after translation, never by prompt
//! instruction alone.

pub mod condition;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod interface;
pub mod roster;
pub mod schema;
pub mod scope;
pub mod server;
pub mod stats;
pub mod translate;
