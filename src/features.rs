//! # Feature Transformation
//!
//! Projects a validated batch onto the five model columns, encodes `Sex`
//! numerically and drops every row that still holds a missing value.
//!
//! Dropped rows are not imputed. Each surviving row remembers its position in
//! the original batch so predictions can be realigned with the records that
//! produced them.

use crate::schema::Record;
use serde_json::Value;
use tracing::{trace, warn};

/// The model's input columns, in feature order.
pub const FEATURE_COLUMNS: [&str; 5] = ["Pclass", "Sex", "SibSp", "Parch", "Fare"];

/// Index of `Sex` within [`FEATURE_COLUMNS`].
const SEX_COLUMN: usize = 1;

/// One encoded passenger.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
  /// Position of the source record within the request batch.
  pub source_index: usize,
  /// Feature values in [`FEATURE_COLUMNS`] order.
  pub values: [f64; 5],
}

/// The encoded batch handed to the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
  rows: Vec<FeatureRow>,
}

impl FeatureMatrix {
  /// Builds a matrix from already encoded rows.
  pub fn new(rows: Vec<FeatureRow>) -> Self {
    Self { rows }
  }

  /// Number of surviving rows.
  pub fn len(&self) -> usize {
    self.rows.len()
  }

  /// Returns `true` when every row was dropped.
  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// Number of feature columns.
  pub fn width(&self) -> usize {
    FEATURE_COLUMNS.len()
  }

  /// The encoded rows, in batch order.
  pub fn rows(&self) -> &[FeatureRow] {
    &self.rows
  }

  /// Original batch positions of the surviving rows.
  pub fn row_indices(&self) -> Vec<usize> {
    self.rows.iter().map(|row| row.source_index).collect()
  }
}

/// Encodes a `Sex` value: `"male"` is 0, `"female"` is 1, anything else is missing.
pub fn encode_sex(value: &Value) -> Option<f64> {
  match value.as_str() {
    Some("male") => Some(0.0),
    Some("female") => Some(1.0),
    _ => None,
  }
}

fn encode_numeric(value: &Value) -> Option<f64> {
  value.as_f64()
}

fn encode_row(record: &Record) -> Option<[f64; 5]> {
  let mut values = [0.0; 5];
  for (column, slot) in FEATURE_COLUMNS.iter().zip(values.iter_mut()) {
    let value = record.get(*column)?;
    *slot = if *column == FEATURE_COLUMNS[SEX_COLUMN] {
      encode_sex(value)?
    } else {
      encode_numeric(value)?
    };
  }
  Some(values)
}

/// Transforms a validated batch into a [`FeatureMatrix`].
///
/// Extra fields are ignored. Rows with a missing, null, non-numeric or
/// unencodable value are removed; the relative order of the rest is kept.
pub fn transform(batch: &[Record]) -> FeatureMatrix {
  trace!(records = batch.len(), "transform");
  let rows: Vec<FeatureRow> = batch
    .iter()
    .enumerate()
    .filter_map(|(source_index, record)| {
      encode_row(record).map(|values| FeatureRow {
        source_index,
        values,
      })
    })
    .collect();

  let dropped = batch.len() - rows.len();
  if dropped > 0 {
    warn!(dropped, kept = rows.len(), "dropped incomplete rows");
  }
  FeatureMatrix::new(rows)
}
