//! # Schema Validation
//!
//! Checks an incoming passenger batch against the fixed column schema the
//! model was trained on.
//!
//! Validation works on whole columns, not individual records: the type of a
//! column is inferred from every value it holds across the batch, and a single
//! out-of-place value changes the inferred type of the entire column. A batch
//! is either accepted or rejected as a unit.
//!
//! ## Column Type Inference
//!
//! | Values present in the column                       | Inferred type |
//! |----------------------------------------------------|---------------|
//! | integers only, no gaps                             | `int64`       |
//! | numbers, with at least one float, null or gap      | `float64`     |
//! | booleans only, no gaps                             | `bool`        |
//! | anything else (strings, mixtures, all null)        | `object`      |
//!
//! A gap is a record that does not carry the field at all. A field that no
//! record carries is reported as missing.
//!
//! Only `int64` and `float64` satisfy a numeric field. Dataframe dtype checks
//! usually count a `bool` column as numeric too; here it is rejected.

use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, trace};

/// A single passenger record as decoded from the request body.
pub type Record = Map<String, Value>;

/// The kind of values a schema field must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  /// Integer or floating point column.
  Numeric,
  /// Free-form string column, encoded later by the feature transformer.
  Categorical,
}

impl FieldKind {
  /// Name used for this kind in validation messages.
  pub fn as_str(&self) -> &'static str {
    match self {
      FieldKind::Numeric => "numeric",
      FieldKind::Categorical => "string",
    }
  }

  fn accepts(&self, column: ColumnType) -> bool {
    match self {
      FieldKind::Numeric => matches!(column, ColumnType::Int64 | ColumnType::Float64),
      FieldKind::Categorical => column == ColumnType::Object,
    }
  }
}

/// The expected passenger schema, in the order fields are checked.
pub const PASSENGER_SCHEMA: &[(&str, FieldKind)] = &[
  ("Pclass", FieldKind::Numeric),
  ("Sex", FieldKind::Categorical),
  ("SibSp", FieldKind::Numeric),
  ("Parch", FieldKind::Numeric),
  ("Fare", FieldKind::Numeric),
];

/// Type inferred for a column across a whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
  /// Every record holds an integer.
  Int64,
  /// Numbers with at least one float, null or gap.
  Float64,
  /// Every record holds a boolean.
  Bool,
  /// Strings, mixed values, or nothing but nulls.
  Object,
}

impl fmt::Display for ColumnType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ColumnType::Int64 => "int64",
      ColumnType::Float64 => "float64",
      ColumnType::Bool => "bool",
      ColumnType::Object => "object",
    };
    f.write_str(name)
  }
}

/// Outcome of validating a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
  /// Every schema field is present with an acceptable column type.
  Valid,
  /// The first schema violation found.
  Invalid(String),
}

impl ValidationResult {
  /// Returns `true` for [`ValidationResult::Valid`].
  pub fn is_valid(&self) -> bool {
    matches!(self, ValidationResult::Valid)
  }
}

/// Infers the type of `field` across `batch`.
///
/// Returns `None` when no record carries the field.
pub fn infer_column_type(batch: &[Record], field: &str) -> Option<ColumnType> {
  let mut present = false;
  let mut gaps = false;
  let mut integers = 0usize;
  let mut floats = 0usize;
  let mut bools = 0usize;
  let mut others = 0usize;

  for record in batch {
    match record.get(field) {
      None => gaps = true,
      Some(value) => {
        present = true;
        match value {
          Value::Null => gaps = true,
          Value::Number(n) if n.is_i64() || n.is_u64() => integers += 1,
          Value::Number(_) => floats += 1,
          Value::Bool(_) => bools += 1,
          _ => others += 1,
        }
      }
    }
  }

  if !present {
    return None;
  }

  let numbers = integers + floats;
  let column = if others > 0 || (numbers > 0 && bools > 0) {
    ColumnType::Object
  } else if numbers > 0 {
    if floats > 0 || gaps {
      ColumnType::Float64
    } else {
      ColumnType::Int64
    }
  } else if bools > 0 && !gaps {
    ColumnType::Bool
  } else {
    ColumnType::Object
  };
  Some(column)
}

/// Validates a batch against [`PASSENGER_SCHEMA`].
///
/// Fields are checked in schema order and the first failure wins.
pub fn validate(batch: &[Record]) -> ValidationResult {
  trace!(records = batch.len(), "validate");
  for (field, kind) in PASSENGER_SCHEMA {
    let Some(column) = infer_column_type(batch, field) else {
      debug!(field = %field, "batch is missing a schema field");
      return ValidationResult::Invalid(format!("missing field: {}", field));
    };
    if !kind.accepts(column) {
      debug!(field = %field, expected = kind.as_str(), actual = %column, "column has the wrong type");
      return ValidationResult::Invalid(format!(
        "wrong type for field {}: expected {}, got {}",
        field,
        kind.as_str(),
        column
      ));
    }
  }
  ValidationResult::Valid
}
