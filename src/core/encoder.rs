use crate::core::schema::{EntityKind, EntitySchema, FieldKind};
use crate::models::{AttributeValue, EncodedVector, RawAttributeRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised while fitting or applying a feature encoder
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncoderError {
    #[error("{entity} record does not match schema: {reason}")]
    SchemaMismatch { entity: EntityKind, reason: String },

    #[error("{0} encoder used before it was fitted")]
    NotFitted(EntityKind),

    #[error("cannot fit {0} encoder on an empty record set")]
    EmptyFitSet(EntityKind),
}

/// Frozen per-column transform learned at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnTransform {
    /// `(x - mean) / scale`; scale is 1.0 when the column had no variance
    Standardize { field: String, mean: f64, scale: f64 },
    /// One slot per category in `categories`; unseen values leave the block zeroed
    OneHot { field: String, categories: Vec<String> },
}

impl ColumnTransform {
    fn width(&self) -> usize {
        match self {
            ColumnTransform::Standardize { .. } => 1,
            ColumnTransform::OneHot { categories, .. } => categories.len(),
        }
    }
}

/// Deterministic record -> vector transform for one entity type
///
/// An encoder starts unfitted (schema only). [`FeatureEncoder::fit`] returns a
/// new encoder whose column transforms are frozen; the same fitted encoder,
/// serialized and loaded in another process, reproduces identical vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    schema: EntitySchema,
    #[serde(default)]
    columns: Option<Vec<ColumnTransform>>,
}

impl FeatureEncoder {
    pub fn new(schema: EntitySchema) -> Self {
        Self { schema, columns: None }
    }

    pub fn seeker() -> Self {
        Self::new(EntitySchema::seeker())
    }

    pub fn provider() -> Self {
        Self::new(EntitySchema::provider())
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn entity(&self) -> EntityKind {
        self.schema.entity
    }

    pub fn is_fitted(&self) -> bool {
        self.columns.is_some()
    }

    /// Length of every vector this encoder produces, once fitted
    pub fn output_dim(&self) -> Option<usize> {
        self.columns
            .as_ref()
            .map(|cols| cols.iter().map(ColumnTransform::width).sum())
    }

    /// Learn standardization statistics and category vocabularies
    pub fn fit(&self, records: &[RawAttributeRecord]) -> Result<FeatureEncoder, EncoderError> {
        if records.is_empty() {
            return Err(EncoderError::EmptyFitSet(self.entity()));
        }
        for record in records {
            self.check_record(record)?;
        }

        let columns = self
            .schema
            .fields
            .iter()
            .map(|attr| match attr.kind {
                FieldKind::Numeric => {
                    let values: Vec<f64> = records
                        .iter()
                        .filter_map(|r| r.get(&attr.name).and_then(AttributeValue::as_numeric))
                        .collect();
                    let (mean, scale) = standardization(&values);
                    ColumnTransform::Standardize { field: attr.name.clone(), mean, scale }
                }
                FieldKind::Categorical => {
                    let categories: BTreeSet<&str> = records
                        .iter()
                        .filter_map(|r| r.get(&attr.name).and_then(AttributeValue::as_categorical))
                        .collect();
                    ColumnTransform::OneHot {
                        field: attr.name.clone(),
                        categories: categories.into_iter().map(str::to_string).collect(),
                    }
                }
            })
            .collect();

        Ok(FeatureEncoder { schema: self.schema.clone(), columns: Some(columns) })
    }

    /// Encode one record with the frozen transforms
    pub fn transform(&self, record: &RawAttributeRecord) -> Result<EncodedVector, EncoderError> {
        let columns = self.columns.as_ref().ok_or(EncoderError::NotFitted(self.entity()))?;
        self.check_record(record)?;

        let mut out = Vec::with_capacity(columns.iter().map(ColumnTransform::width).sum());
        for column in columns {
            match column {
                ColumnTransform::Standardize { field, mean, scale } => {
                    let value = record
                        .get(field)
                        .and_then(AttributeValue::as_numeric)
                        .ok_or_else(|| self.mismatch(format!("missing numeric attribute '{}'", field)))?;
                    out.push(((value - mean) / scale) as f32);
                }
                ColumnTransform::OneHot { field, categories } => {
                    let value = record
                        .get(field)
                        .and_then(AttributeValue::as_categorical)
                        .ok_or_else(|| self.mismatch(format!("missing categorical attribute '{}'", field)))?;
                    let hot = categories.binary_search_by(|c| c.as_str().cmp(value)).ok();
                    out.extend((0..categories.len()).map(|i| if Some(i) == hot { 1.0 } else { 0.0 }));
                }
            }
        }

        Ok(out)
    }

    /// Encode many records, failing on the first bad one
    pub fn transform_all(&self, records: &[RawAttributeRecord]) -> Result<Vec<EncodedVector>, EncoderError> {
        records.iter().map(|r| self.transform(r)).collect()
    }

    /// Human-readable name of every output column
    pub fn feature_names(&self) -> Result<Vec<String>, EncoderError> {
        let columns = self.columns.as_ref().ok_or(EncoderError::NotFitted(self.entity()))?;
        let mut names = Vec::new();
        for column in columns {
            match column {
                ColumnTransform::Standardize { field, .. } => names.push(format!("num__{}", field)),
                ColumnTransform::OneHot { field, categories } => {
                    names.extend(categories.iter().map(|c| format!("cat__{}_{}", field, c)));
                }
            }
        }
        Ok(names)
    }

    fn check_record(&self, record: &RawAttributeRecord) -> Result<(), EncoderError> {
        for attr in &self.schema.fields {
            match (attr.kind, record.get(&attr.name)) {
                (_, None) => {
                    return Err(self.mismatch(format!("missing attribute '{}'", attr.name)));
                }
                (FieldKind::Numeric, Some(AttributeValue::Categorical(_))) => {
                    return Err(self.mismatch(format!("attribute '{}' must be numeric", attr.name)));
                }
                (FieldKind::Categorical, Some(AttributeValue::Numeric(_))) => {
                    return Err(self.mismatch(format!("attribute '{}' must be categorical", attr.name)));
                }
                _ => {}
            }
        }
        if let Some(extra) = record.names().find(|name| self.schema.field(name).is_none()) {
            return Err(self.mismatch(format!("unexpected attribute '{}'", extra)));
        }
        Ok(())
    }

    fn mismatch(&self, reason: String) -> EncoderError {
        EncoderError::SchemaMismatch { entity: self.entity(), reason }
    }
}

/// Population mean and standard deviation, with a unit scale for flat columns
fn standardization(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    let scale = if std.is_finite() && std > f64::EPSILON { std } else { 1.0 };
    (mean, scale)
}
