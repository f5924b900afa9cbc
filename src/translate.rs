//! Translation of free-form text into a validated [`Condition`].
//!
//! The outbound half speaks to an OpenAI-compatible chat completions
//! endpoint: the prompt carries the schema registry's vocabulary (field
//! names, operators, closed value sets) and instructs the service to answer
//! with a single JSON expression using only that vocabulary. Superlative
//! phrasing ("topper", "highest") must come back as a ranking payload; a
//! guessed equality on a maximum is wrong by construction because the
//! maximum is data-dependent.
//!
//! The inbound half treats the reply as untrusted. It is deserialized into
//! the loosely-typed [`RawCondition`] (values stay `serde_json::Value`) and
//! promoted to a typed [`Condition`] only by explicit validation against
//! the registry: unknown fields, disallowed operators and mistyped values
//! cause the offending clause to be dropped; if nothing usable remains the
//! whole translation is rejected. There is no shortcut from parse to trust.

use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::condition::{Condition, Direction, Expr, FieldValue, Predicate, RankingSpec};
use crate::error::{CohortError, Result};
use crate::schema::{FieldSpec, FieldType, Operator, SchemaRegistry};
use crate::scope::RoleScope;

// ------------- Raw payload -------------

/// The structured expression as the language service sent it. Nothing in
/// here is trusted until [`promote`] has checked it against the registry.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawCondition {
    Filter {
        #[serde(rename = "where")]
        where_clause: RawExpr,
    },
    Ranking {
        field: String,
        direction: String,
        #[serde(default)]
        limit: Option<serde_json::Value>,
        #[serde(default)]
        pool: Option<RawExpr>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawExpr {
    All { all: Vec<RawExpr> },
    Any { any: Vec<RawExpr> },
    Compare(RawPredicate),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPredicate {
    pub field: String,
    pub op: String,
    pub value: serde_json::Value,
}

// ------------- Provider seam -------------

/// Source of candidate expressions. The production implementation calls the
/// external language service; tests script replies in-process.
#[async_trait]
pub trait ConditionProvider: Send + Sync {
    async fn propose(
        &self,
        query: &str,
        registry: &SchemaRegistry,
        scope: &RoleScope,
    ) -> Result<RawCondition>;
}

// ------------- Prompt -------------

/// The instruction block sent as the system message. Only vocabulary drawn
/// from the registry appears in it, so prompt and validator cannot drift.
pub fn build_prompt(registry: &SchemaRegistry, scope: &RoleScope) -> String {
    let mut prompt = String::from(
        "You convert questions about a student roster into one JSON expression.\n\
         Fields:\n",
    );
    for field in registry.fields() {
        let ops: Vec<&str> = field.operators().iter().map(|op| op.wire_name()).collect();
        prompt.push_str(&format!("- {} ({}; operators: {}", field.name(), field.field_type(), ops.join(", ")));
        if let Some(values) = field.allowed_values() {
            prompt.push_str(&format!("; values: {}", values.join(", ")));
        }
        prompt.push_str(")\n");
    }
    prompt.push_str(
        "\nAnswer with exactly one JSON object and nothing else. Two forms exist:\n\
         {\"kind\":\"filter\",\"where\":EXPR}\n\
         {\"kind\":\"ranking\",\"field\":FIELD,\"direction\":\"max\" or \"min\",\"limit\":N,\"pool\":EXPR}\n\
         EXPR is {\"field\":FIELD,\"op\":OP,\"value\":VALUE}, {\"all\":[EXPR,...]} or {\"any\":[EXPR,...]}.\n\
         Superlatives (topper, highest, best, lowest, worst) are ranking queries; never guess a\n\
         concrete extreme value. Put restrictions named in the question (a grade, a class) into\n\
         the ranking pool. If part of the question cannot be expressed with the fields above,\n\
         leave that part out rather than inventing fields or values.\n",
    );
    let context = match (&scope.grade, &scope.class_name) {
        (Some(g), Some(c)) => format!("grade {g}, class {c}"),
        (Some(g), None) => format!("grade {g}"),
        (None, Some(c)) => format!("class {c}"),
        (None, None) => String::new(),
    };
    if !context.is_empty() {
        prompt.push_str(&format!(
            "\nFor context only (access is enforced elsewhere): the caller sees {context}.\n"
        ));
    }
    prompt
}

// ------------- Language service client -------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: String,
}

/// OpenAI-compatible chat completions client with a bounded timeout.
pub struct LanguageServiceClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl LanguageServiceClient {
    pub fn new(base_url: &str, model: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CohortError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: 0.0,
        };
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CohortError::TranslationUnavailable("request timed out".into())
                } else if e.is_connect() {
                    CohortError::TranslationUnavailable(format!("connection failed: {e}"))
                } else {
                    CohortError::TranslationUnavailable(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(CohortError::TranslationUnavailable("rate limited".into()));
        }
        if !status.is_success() {
            return Err(CohortError::TranslationUnavailable(format!(
                "service answered with status {status}"
            )));
        }
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CohortError::TranslationUnavailable(format!("unreadable response envelope: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CohortError::TranslationUnavailable("response carried no choices".into()))
    }
}

#[async_trait]
impl ConditionProvider for LanguageServiceClient {
    async fn propose(
        &self,
        query: &str,
        registry: &SchemaRegistry,
        scope: &RoleScope,
    ) -> Result<RawCondition> {
        let system = build_prompt(registry, scope);
        let content = self.complete(&system, query).await?;
        parse_payload(&content)
    }
}

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").unwrap();
}

/// Parse the service's reply text into the raw payload. Models like to wrap
/// JSON in markdown fences; those are peeled off first.
pub fn parse_payload(content: &str) -> Result<RawCondition> {
    let trimmed = content.trim();
    let body = match CODE_FENCE.captures(trimmed) {
        Some(captures) => captures.get(1).map_or(trimmed, |m| m.as_str()),
        None => trimmed,
    };
    serde_json::from_str(body)
        .map_err(|e| CohortError::TranslationInvalid(format!("reply is not a usable expression: {e}")))
}

// ------------- Validation / promotion -------------

/// Promote the untrusted payload to a typed condition. Bad clauses are
/// dropped one by one; a payload with nothing usable left is rejected as a
/// whole. This is the only path from [`RawCondition`] to [`Condition`].
pub fn promote(raw: RawCondition, registry: &SchemaRegistry) -> Result<Condition> {
    match raw {
        RawCondition::Filter { where_clause } => promote_expr(where_clause, registry)
            .map(Condition::Filter)
            .ok_or_else(|| {
                CohortError::TranslationInvalid("no usable clause remained after validation".into())
            }),
        RawCondition::Ranking { field, direction, limit, pool } => {
            let spec = registry.resolve(&field).ok_or_else(|| {
                CohortError::TranslationInvalid(format!("unknown ranking field: {field}"))
            })?;
            if !spec.rankable() {
                return Err(CohortError::TranslationInvalid(format!(
                    "field {} cannot be ranked",
                    spec.name()
                )));
            }
            let direction = match direction.trim().to_lowercase().as_str() {
                "max" => Direction::Max,
                "min" => Direction::Min,
                other => {
                    return Err(CohortError::TranslationInvalid(format!(
                        "unknown ranking direction: {other}"
                    )));
                }
            };
            // a pool that validates down to nothing is omitted, which widens
            // the pool to the scope the enforcer will apply anyway
            let pool = pool.and_then(|p| promote_expr(p, registry));
            Ok(Condition::Ranking(RankingSpec {
                field: spec.name(),
                direction,
                limit: parse_limit(limit),
                pool,
            }))
        }
    }
}

fn parse_limit(raw: Option<serde_json::Value>) -> usize {
    let parsed = raw.as_ref().and_then(|value| {
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
    });
    parsed.unwrap_or(1).max(1) as usize
}

fn promote_expr(raw: RawExpr, registry: &SchemaRegistry) -> Option<Expr> {
    match raw {
        RawExpr::All { all } => promote_children(all, registry, Expr::And),
        RawExpr::Any { any } => promote_children(any, registry, Expr::Or),
        RawExpr::Compare(raw) => match validate_predicate(&raw, registry) {
            Ok(predicate) => Some(Expr::Compare(predicate)),
            Err(reason) => {
                warn!(field = %raw.field, op = %raw.op, %reason, "dropping clause");
                None
            }
        },
    }
}

fn promote_children(
    children: Vec<RawExpr>,
    registry: &SchemaRegistry,
    combine: fn(Vec<Expr>) -> Expr,
) -> Option<Expr> {
    let kept: Vec<Expr> = children
        .into_iter()
        .filter_map(|child| promote_expr(child, registry))
        .collect();
    match kept.len() {
        0 => None,
        1 => kept.into_iter().next(),
        _ => Some(combine(kept)),
    }
}

fn validate_predicate(
    raw: &RawPredicate,
    registry: &SchemaRegistry,
) -> std::result::Result<Predicate, String> {
    let spec = registry
        .resolve(&raw.field)
        .ok_or_else(|| format!("unknown field: {}", raw.field))?;
    let op = parse_operator(&raw.op).ok_or_else(|| format!("unknown operator: {}", raw.op))?;
    if !spec.allows(op) {
        return Err(format!("operator {op} not allowed on {}", spec.name()));
    }
    let value = coerce_value(spec, &raw.value)?;
    debug!(field = spec.name(), %op, %value, "clause accepted");
    Ok(Predicate::new(spec.name(), op, value))
}

fn parse_operator(raw: &str) -> Option<Operator> {
    match raw.trim() {
        "eq" | "==" | "=" => Some(Operator::Eq),
        "ne" | "!=" => Some(Operator::Ne),
        "gt" | ">" => Some(Operator::Gt),
        "gte" | ">=" => Some(Operator::Gte),
        "lt" | "<" => Some(Operator::Lt),
        "lte" | "<=" => Some(Operator::Lte),
        _ => None,
    }
}

fn coerce_value(
    spec: &FieldSpec,
    raw: &serde_json::Value,
) -> std::result::Result<FieldValue, String> {
    match spec.field_type() {
        FieldType::Integer => raw
            .as_i64()
            .or_else(|| raw.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .or_else(|| raw.as_str().and_then(|s| s.trim().parse().ok()))
            .map(FieldValue::Integer)
            .ok_or_else(|| format!("expected an integer for {}", spec.name())),
        FieldType::Number => raw
            .as_f64()
            .or_else(|| raw.as_str().and_then(|s| s.trim().parse().ok()))
            .map(FieldValue::Number)
            .ok_or_else(|| format!("expected a number for {}", spec.name())),
        FieldType::Text => {
            let text = raw
                .as_str()
                .map(str::trim)
                .ok_or_else(|| format!("expected text for {}", spec.name()))?;
            match spec.allowed_values() {
                Some(allowed) => allowed
                    .iter()
                    .find(|candidate| candidate.eq_ignore_ascii_case(text))
                    .map(|canonical| FieldValue::Text((*canonical).to_string()))
                    .ok_or_else(|| {
                        format!("{text:?} is not an allowed value for {}", spec.name())
                    }),
                None => Ok(FieldValue::Text(text.to_string())),
            }
        }
        FieldType::Boolean => raw
            .as_bool()
            .or_else(|| match raw.as_str().map(|s| s.trim().to_lowercase()) {
                Some(s) if s == "yes" || s == "true" => Some(true),
                Some(s) if s == "no" || s == "false" => Some(false),
                _ => None,
            })
            .map(FieldValue::Boolean)
            .ok_or_else(|| format!("expected a boolean for {}", spec.name())),
    }
}

// ------------- Translator -------------

/// The translation stage of the pipeline: asks the provider for a candidate
/// expression and promotes it. Never forwards an unvalidated expression.
pub struct Translator {
    provider: Box<dyn ConditionProvider>,
}

impl Translator {
    pub fn new(provider: Box<dyn ConditionProvider>) -> Self {
        Self { provider }
    }

    pub async fn translate(
        &self,
        query: &str,
        registry: &SchemaRegistry,
        scope: &RoleScope,
    ) -> Result<Condition> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CohortError::TranslationInvalid("empty query".into()));
        }
        let raw = self.provider.propose(query, registry, scope).await?;
        promote(raw, registry)
    }
}
