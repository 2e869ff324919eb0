// src/table/mod.rs

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

pub mod parse;
pub mod render;

pub use parse::{parse_ascii_table, ParsedTable};
pub use render::render_ascii_table;

/// A single cell value as seen by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Infer a typed value from one trimmed cell of a rendered table.
    ///
    /// `NULL` (any case) and the empty cell are null. Text containing a `.` is tried as a
    /// float, anything else as an integer; on failure the raw text is kept.
    pub fn from_cell(cell: &str) -> Self {
        if cell.is_empty() || cell.eq_ignore_ascii_case("NULL") {
            return Scalar::Null;
        }
        if cell.contains('.') {
            cell.parse::<f64>()
                .map(Scalar::Float)
                .unwrap_or_else(|_| Scalar::Text(cell.to_string()))
        } else {
            cell.parse::<i64>()
                .map(Scalar::Int)
                .unwrap_or_else(|_| Scalar::Text(cell.to_string()))
        }
    }
}

/// Renders the cell text used inside an ASCII table.
/// Integral floats keep a trailing `.0` so they parse back as floats.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("NULL"),
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(s) => f.write_str(&s.replace('\n', "\\n").replace('\r', "\\r")),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Int(v) => serializer.serialize_i64(*v),
            Scalar::Float(v) => serializer.serialize_f64(*v),
            Scalar::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map_or(Scalar::Null, Into::into)
    }
}

/// One result row: column name → value, in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Scalar)>,
}

impl Record {
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Scalar>,
        I: IntoIterator<Item = (K, V)>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect()
    }

    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Scalar> {
        self.fields.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Scalar)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Scalar)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A positional result grid, as produced by the query engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a grid from records; the first record decides the column order.
    pub fn from_records(records: &[Record]) -> Self {
        let columns = records
            .first()
            .map(|r| r.columns().map(str::to_string).collect())
            .unwrap_or_default();
        let rows = records
            .iter()
            .map(|r| r.values().cloned().collect())
            .collect();
        Self { columns, rows }
    }

    pub fn to_records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    pub fn render(&self) -> String {
        render_ascii_table(self)
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_inference() {
        assert_eq!(Scalar::from_cell("NULL"), Scalar::Null);
        assert_eq!(Scalar::from_cell("null"), Scalar::Null);
        assert_eq!(Scalar::from_cell(""), Scalar::Null);
        assert_eq!(Scalar::from_cell("42"), Scalar::Int(42));
        assert_eq!(Scalar::from_cell("-7"), Scalar::Int(-7));
        assert_eq!(Scalar::from_cell("2.5"), Scalar::Float(2.5));
        assert_eq!(Scalar::from_cell("1.2.3"), Scalar::from("1.2.3"));
        assert_eq!(Scalar::from_cell("1e5"), Scalar::from("1e5"));
        assert_eq!(Scalar::from_cell("Paris"), Scalar::from("Paris"));
    }

    #[test]
    fn display_keeps_float_marker() {
        assert_eq!(Scalar::Float(3.0).to_string(), "3.0");
        assert_eq!(Scalar::Float(-0.25).to_string(), "-0.25");
        assert_eq!(Scalar::Int(3).to_string(), "3");
        assert_eq!(Scalar::Null.to_string(), "NULL");
        assert_eq!(Scalar::from("a\nb").to_string(), "a\\nb");
    }

    #[test]
    fn record_serializes_in_column_order() {
        let record = Record::from_pairs([
            ("zeta", Scalar::from("US")),
            ("alpha", Scalar::Int(2)),
            ("mid", Scalar::Null),
        ]);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"zeta":"US","alpha":2,"mid":null}"#);
        assert_eq!(record.get("alpha"), Some(&Scalar::Int(2)));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn table_records_roundtrip() {
        let records = vec![
            Record::from_pairs([("a", Scalar::Int(1)), ("b", Scalar::from("x"))]),
            Record::from_pairs([("a", Scalar::Int(2)), ("b", Scalar::Null)]),
        ];
        let table = Table::from_records(&records);
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.to_records(), records);
    }
}
