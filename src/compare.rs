// src/compare.rs
//
// Result-set equivalence used for scoring. Two result sets are equal when they hold the same
// multiset of value-multisets: column names, column order and row order are all ignored.
// This leniency is intentional, since generated SQL labels and orders its columns freely,
// but it also accepts swapped columns that happen to hold the same values.

use crate::table::{Record, Scalar};
use serde_json::Value;
use thiserror::Error;

/// Token that stands in for null after normalization.
pub const NULL_TOKEN: &str = "None";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompareError {
    #[error("ground_truth was not a list")]
    NotAList,
    #[error("ground_truth row {index} is not an object")]
    RowNotObject { index: usize },
}

/// A result set reduced to its comparable form: sorted rows of sorted value tokens.
pub type Canonical = Vec<Vec<String>>;

pub fn normalize_scalar(value: &Scalar) -> String {
    match value {
        Scalar::Null => NULL_TOKEN.to_string(),
        Scalar::Int(v) => v.to_string(),
        Scalar::Float(v) => float_token(*v),
        Scalar::Text(s) => s.clone(),
    }
}

pub fn normalize_json(value: &Value) -> String {
    match value {
        Value::Null => NULL_TOKEN.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(float_token).unwrap_or_else(|| n.to_string())
            }
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Integral finite floats compare as integers.
fn float_token(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        if v.abs() < 9.0e18 {
            (v as i64).to_string()
        } else {
            format!("{:.0}", v)
        }
    } else {
        v.to_string()
    }
}

fn canonicalize(mut rows: Vec<Vec<String>>) -> Canonical {
    for row in &mut rows {
        row.sort();
    }
    rows.sort();
    rows
}

pub fn canonical_records(records: &[Record]) -> Canonical {
    canonicalize(
        records
            .iter()
            .map(|r| r.values().map(normalize_scalar).collect())
            .collect(),
    )
}

/// Canonical form of ground truth read from a dataset line.
pub fn canonical_ground_truth(ground_truth: &Value) -> Result<Canonical, CompareError> {
    let rows = ground_truth.as_array().ok_or(CompareError::NotAList)?;
    let rows = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            row.as_object()
                .map(|obj| obj.values().map(normalize_json).collect())
                .ok_or(CompareError::RowNotObject { index })
        })
        .collect::<Result<Vec<Vec<String>>, _>>()?;
    Ok(canonicalize(rows))
}

/// True when `predicted` and `ground_truth` hold the same multiset of value-multisets.
pub fn matches_ground_truth(
    predicted: &[Record],
    ground_truth: &Value,
) -> Result<bool, CompareError> {
    Ok(canonical_records(predicted) == canonical_ground_truth(ground_truth)?)
}

pub fn records_match(a: &[Record], b: &[Record]) -> bool {
    canonical_records(a) == canonical_records(b)
}
