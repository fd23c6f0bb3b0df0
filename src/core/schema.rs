use crate::models::{AttributeValue, RawAttributeRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// The two matched entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Funding seeker (founder)
    #[serde(alias = "founder")]
    Seeker,
    /// Capital provider (investor)
    #[serde(alias = "investor")]
    Provider,
}

impl EntityKind {
    /// Name used for this entity in request payloads
    pub fn payload_name(&self) -> &'static str {
        match self {
            EntityKind::Seeker => "founder",
            EntityKind::Provider => "investor",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.payload_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn numeric(name: &str) -> Self {
        Self { name: name.to_string(), kind: FieldKind::Numeric }
    }

    pub fn categorical(name: &str) -> Self {
        Self { name: name.to_string(), kind: FieldKind::Categorical }
    }
}

/// Fixed, ordered attribute schema of one entity type
///
/// Field order here is the column order of every encoded vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub entity: EntityKind,
    pub fields: Vec<FieldSpec>,
}

/// What is wrong with a single attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    Missing,
    Unknown,
    ExpectedNumber { found: String },
    ExpectedString { found: String },
    NonFinite,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub kind: IssueKind,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IssueKind::Missing => write!(f, "{}: required attribute is missing", self.field),
            IssueKind::Unknown => write!(f, "{}: unknown attribute", self.field),
            IssueKind::ExpectedNumber { found } => {
                write!(f, "{}: expected a number, got {}", self.field, found)
            }
            IssueKind::ExpectedString { found } => {
                write!(f, "{}: expected a string, got {}", self.field, found)
            }
            IssueKind::NonFinite => write!(f, "{}: number must be finite", self.field),
            IssueKind::Blank => write!(f, "{}: value must not be blank", self.field),
        }
    }
}

/// Malformed or wrongly typed request attributes for one entity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {entity} attributes: {}", format_issues(.issues))]
pub struct ValidationError {
    pub entity: EntityKind,
    pub issues: Vec<FieldIssue>,
}

fn format_issues(issues: &[FieldIssue]) -> String {
    issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; ")
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl EntitySchema {
    /// Founder-side schema
    pub fn seeker() -> Self {
        Self {
            entity: EntityKind::Seeker,
            fields: vec![
                FieldSpec::numeric("fund_required"),
                FieldSpec::categorical("industry"),
                FieldSpec::categorical("funding_stage"),
            ],
        }
    }

    /// Investor-side schema
    pub fn provider() -> Self {
        Self {
            entity: EntityKind::Provider,
            fields: vec![
                FieldSpec::numeric("total_invested"),
                FieldSpec::categorical("preferred_funding_stage"),
                FieldSpec::categorical("risk_tolerance"),
            ],
        }
    }

    pub fn for_entity(entity: EntityKind) -> Self {
        match entity {
            EntityKind::Seeker => Self::seeker(),
            EntityKind::Provider => Self::provider(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Convert an untyped JSON object into a typed record
    ///
    /// Collects every problem instead of stopping at the first one.
    pub fn parse_json(&self, object: &Map<String, Value>) -> Result<RawAttributeRecord, ValidationError> {
        let mut issues = Vec::new();
        let mut record = RawAttributeRecord::new();

        for attr in &self.fields {
            let Some(value) = object.get(&attr.name) else {
                issues.push(FieldIssue { field: attr.name.clone(), kind: IssueKind::Missing });
                continue;
            };

            match (attr.kind, value) {
                (FieldKind::Numeric, Value::Number(n)) => match n.as_f64() {
                    Some(v) if v.is_finite() => record.insert(&attr.name, AttributeValue::Numeric(v)),
                    _ => issues.push(FieldIssue { field: attr.name.clone(), kind: IssueKind::NonFinite }),
                },
                (FieldKind::Numeric, other) => issues.push(FieldIssue {
                    field: attr.name.clone(),
                    kind: IssueKind::ExpectedNumber { found: json_type_name(other).to_string() },
                }),
                (FieldKind::Categorical, Value::String(s)) => {
                    if s.trim().is_empty() {
                        issues.push(FieldIssue { field: attr.name.clone(), kind: IssueKind::Blank });
                    } else {
                        record.insert(&attr.name, AttributeValue::Categorical(s.clone()));
                    }
                }
                (FieldKind::Categorical, other) => issues.push(FieldIssue {
                    field: attr.name.clone(),
                    kind: IssueKind::ExpectedString { found: json_type_name(other).to_string() },
                }),
            }
        }

        for name in object.keys() {
            if self.field(name).is_none() {
                issues.push(FieldIssue { field: name.clone(), kind: IssueKind::Unknown });
            }
        }

        if issues.is_empty() {
            Ok(record)
        } else {
            Err(ValidationError { entity: self.entity, issues })
        }
    }

    /// Check an already-typed record against this schema
    pub fn validate(&self, record: &RawAttributeRecord) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        for attr in &self.fields {
            let kind = match (attr.kind, record.get(&attr.name)) {
                (_, None) => Some(IssueKind::Missing),
                (FieldKind::Numeric, Some(AttributeValue::Numeric(v))) if !v.is_finite() => {
                    Some(IssueKind::NonFinite)
                }
                (FieldKind::Numeric, Some(AttributeValue::Numeric(_))) => None,
                (FieldKind::Numeric, Some(other)) => Some(IssueKind::ExpectedNumber {
                    found: other.kind_name().to_string(),
                }),
                (FieldKind::Categorical, Some(AttributeValue::Categorical(s))) if s.trim().is_empty() => {
                    Some(IssueKind::Blank)
                }
                (FieldKind::Categorical, Some(AttributeValue::Categorical(_))) => None,
                (FieldKind::Categorical, Some(other)) => Some(IssueKind::ExpectedString {
                    found: other.kind_name().to_string(),
                }),
            };
            if let Some(kind) = kind {
                issues.push(FieldIssue { field: attr.name.clone(), kind });
            }
        }

        for name in record.names() {
            if self.field(name).is_none() {
                issues.push(FieldIssue { field: name.to_string(), kind: IssueKind::Unknown });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { entity: self.entity, issues })
        }
    }
}
