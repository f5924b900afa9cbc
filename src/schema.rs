//! The schema registry: the single authority on which fields exist, what
//! type their values carry, and which comparisons are allowed on them.
//!
//! Every other component consults this registry and nothing else, so the
//! vocabulary offered to the language service and the vocabulary the
//! evaluator accepts cannot drift apart. The registry is constructed once
//! and never mutated.

use std::fmt;

use serde::{Deserialize, Serialize};

// ------------- FieldType -------------

/// Value type of a field, as declared in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Integer,
    Number,
    Text,
    Boolean,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldType::Integer => write!(f, "integer"),
            FieldType::Number => write!(f, "number"),
            FieldType::Text => write!(f, "text"),
            FieldType::Boolean => write!(f, "boolean"),
        }
    }
}

// ------------- Operator -------------

/// Comparison operator. Which operators apply to a field is decided by the
/// registry, not by the operator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
        }
    }
    /// The wire name offered to (and expected back from) the language service.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

const EQUALITY: &[Operator] = &[Operator::Eq, Operator::Ne];
const ORDERED: &[Operator] = &[
    Operator::Eq,
    Operator::Ne,
    Operator::Gt,
    Operator::Gte,
    Operator::Lt,
    Operator::Lte,
];

// ------------- FieldSpec -------------

/// Declaration of a single filterable field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: &'static str,
    field_type: FieldType,
    operators: &'static [Operator],
    // a closed value set, when the field only admits a fixed alphabet
    allowed_values: Option<&'static [&'static str]>,
    rankable: bool,
    groupable: bool,
}

impl FieldSpec {
    // Names are exposed through getters only; a spec never changes after
    // the registry is built.
    pub fn name(&self) -> &'static str {
        self.name
    }
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
    pub fn operators(&self) -> &'static [Operator] {
        self.operators
    }
    pub fn allowed_values(&self) -> Option<&'static [&'static str]> {
        self.allowed_values
    }
    /// Whether extreme-value (ranking) queries may use this field.
    pub fn rankable(&self) -> bool {
        self.rankable
    }
    /// Whether aggregations may group by this field.
    pub fn groupable(&self) -> bool {
        self.groupable
    }
    pub fn allows(&self, op: Operator) -> bool {
        self.operators.contains(&op)
    }
}

// ------------- SchemaRegistry -------------

#[derive(Debug)]
pub struct SchemaRegistry {
    fields: Vec<FieldSpec>,
}

impl SchemaRegistry {
    /// The fixed schema of the student roster.
    pub fn student_records() -> Self {
        Self {
            fields: vec![
                FieldSpec {
                    name: "name",
                    field_type: FieldType::Text,
                    operators: EQUALITY,
                    allowed_values: None,
                    rankable: false,
                    groupable: false,
                },
                FieldSpec {
                    name: "grade",
                    field_type: FieldType::Integer,
                    operators: ORDERED,
                    allowed_values: None,
                    rankable: true,
                    groupable: true,
                },
                FieldSpec {
                    name: "class_name",
                    field_type: FieldType::Text,
                    operators: EQUALITY,
                    allowed_values: Some(&["A", "B", "C"]),
                    rankable: false,
                    groupable: true,
                },
                FieldSpec {
                    name: "quiz_score",
                    field_type: FieldType::Number,
                    operators: ORDERED,
                    allowed_values: None,
                    rankable: true,
                    groupable: false,
                },
                FieldSpec {
                    name: "homework_submitted",
                    field_type: FieldType::Boolean,
                    operators: EQUALITY,
                    allowed_values: None,
                    rankable: false,
                    groupable: true,
                },
            ],
        }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn resolve(&self, name: &str) -> Option<&FieldSpec> {
        let wanted = name.trim();
        self.fields.iter().find(|f| f.name == wanted)
    }

    pub fn valid_operator(&self, field: &str, op: Operator) -> bool {
        self.resolve(field).is_some_and(|f| f.allows(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_field_does_not_resolve() {
        let registry = SchemaRegistry::student_records();
        assert!(registry.resolve("favorite_color").is_none());
        assert!(registry.resolve("quiz_score").is_some());
    }

    #[test]
    fn ordering_is_rejected_on_text_fields() {
        let registry = SchemaRegistry::student_records();
        assert!(registry.valid_operator("quiz_score", Operator::Gt));
        assert!(!registry.valid_operator("class_name", Operator::Gt));
        assert!(registry.valid_operator("class_name", Operator::Eq));
    }

    #[test]
    fn class_names_are_a_closed_set() {
        let registry = SchemaRegistry::student_records();
        let class = registry.resolve("class_name").unwrap();
        assert_eq!(class.allowed_values(), Some(["A", "B", "C"].as_slice()));
    }
}
