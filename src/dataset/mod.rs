// src/dataset/mod.rs

use anyhow::{Context, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};
use tracing::{debug, info};

/// One chat message as stored in dataset lines and produced by model rollouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(MessageContent::Text(content.into())),
        }
    }

    /// Plain text of the message. For multi-part content only the first part counts.
    /// `None` when there is no content at all.
    pub fn text(&self) -> Option<&str> {
        match self.content.as_ref()? {
            MessageContent::Text(s) => Some(s),
            MessageContent::Parts(parts) => {
                Some(parts.first().and_then(|p| p.text.as_deref()).unwrap_or(""))
            }
        }
    }
}

/// One JSONL line: the prompt transcript plus the expected result rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatasetRow {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<Value>,
    /// Any other fields on the line, carried through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DatasetRow {
    /// True when the row carries a non-empty ground truth.
    pub fn has_ground_truth(&self) -> bool {
        self.ground_truth.as_ref().map_or(false, is_truthy)
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Read up to `max_rows` rows (all when `None`). Blank lines are skipped; a malformed line is an
/// error naming its line number.
pub fn load_rows(path: impl AsRef<Path>, max_rows: Option<usize>) -> Result<Vec<DatasetRow>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening dataset {}", path.display()))?;
    let limit = max_rows.unwrap_or(usize::MAX);

    let mut rows = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        if rows.len() >= limit {
            break;
        }
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let row: DatasetRow = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid dataset line", path.display(), lineno + 1))?;
        rows.push(row);
    }
    debug!(path = %path.display(), rows = rows.len(), "loaded dataset");
    Ok(rows)
}

/// Write rows as JSONL, creating parent directories as needed.
pub fn write_rows<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct Split {
    pub train: Vec<DatasetRow>,
    pub test: Vec<DatasetRow>,
}

/// Drop rows without ground truth, shuffle with `seed`, and cut at `train_fraction`.
pub fn split_train_test(rows: Vec<DatasetRow>, train_fraction: f64, seed: u64) -> Split {
    let total = rows.len();
    let mut kept: Vec<DatasetRow> = rows.into_iter().filter(|r| r.has_ground_truth()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    kept.shuffle(&mut rng);

    let fraction = train_fraction.clamp(0.0, 1.0);
    let cut = ((kept.len() as f64) * fraction) as usize;
    let test = kept.split_off(cut);
    info!(
        total,
        kept = kept.len() + test.len(),
        train = kept.len(),
        test = test.len(),
        "split dataset"
    );
    Split { train: kept, test }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn row(i: usize, gt: Value) -> DatasetRow {
        DatasetRow {
            messages: vec![Message::new("user", format!("question {}", i))],
            ground_truth: Some(gt),
            extra: Map::new(),
        }
    }

    #[test]
    fn message_text_variants() {
        let m: Message = serde_json::from_value(json!({"role": "assistant", "content": "SELECT 1"}))
            .unwrap();
        assert_eq!(m.text(), Some("SELECT 1"));

        let m: Message = serde_json::from_value(json!({
            "role": "assistant",
            "content": [{"type": "text", "text": "SELECT 2"}, {"type": "text", "text": "ignored"}]
        }))
        .unwrap();
        assert_eq!(m.text(), Some("SELECT 2"));

        let m: Message =
            serde_json::from_value(json!({"role": "assistant", "content": null})).unwrap();
        assert_eq!(m.text(), None);

        let m: Message = serde_json::from_value(json!({"role": "assistant"})).unwrap();
        assert_eq!(m.text(), None);

        let m: Message =
            serde_json::from_value(json!({"role": "assistant", "content": []})).unwrap();
        assert_eq!(m.text(), Some(""));
    }

    #[test]
    fn load_respects_max_rows_and_keeps_extra_fields() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("rows.jsonl");
        fs::write(
            &path,
            concat!(
                r#"{"messages":[{"role":"user","content":"a"}],"#,
                r#""ground_truth":[{"n":1}],"source":"synthetic"}"#,
                "\n\n",
                r#"{"messages":[],"ground_truth":[]}"#,
                "\n",
                r#"{"ground_truth":null}"#,
                "\n"
            ),
        )?;

        let all = load_rows(&path, None)?;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].extra["source"], json!("synthetic"));
        assert!(all[0].has_ground_truth());
        assert!(!all[1].has_ground_truth());
        assert!(!all[2].has_ground_truth());
        assert!(all[2].messages.is_empty());

        assert_eq!(load_rows(&path, Some(2))?.len(), 2);
        assert!(load_rows(&path, Some(0))?.is_empty());
        Ok(())
    }

    #[test]
    fn bad_line_reports_line_number() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{\"messages\":[]}\n{oops\n")?;
        let err = load_rows(&path, None).unwrap_err();
        assert!(format!("{:#}", err).contains(":2:"));
        Ok(())
    }

    #[test]
    fn write_then_load() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested/out.jsonl");
        let rows = vec![row(1, json!([{"a": 1}])), row(2, json!([{"a": null}]))];
        write_rows(&path, &rows)?;
        assert_eq!(load_rows(&path, None)?, rows);
        Ok(())
    }

    #[test]
    fn split_is_deterministic_and_complete() {
        let mut rows: Vec<DatasetRow> = (0..10).map(|i| row(i, json!([{"i": i}]))).collect();
        rows.push(row(99, json!([])));
        rows.push(DatasetRow::default());

        let a = split_train_test(rows.clone(), 0.8, 42);
        let b = split_train_test(rows.clone(), 0.8, 42);
        assert_eq!(a.train.len(), 8);
        assert_eq!(a.test.len(), 2);
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);

        let mut seen: Vec<Value> = a
            .train
            .iter()
            .chain(a.test.iter())
            .map(|r| r.ground_truth.clone().unwrap())
            .collect();
        seen.sort_by_key(|v| v[0]["i"].as_i64());
        let expected: Vec<Value> = (0..10).map(|i| json!([{"i": i}])).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn split_edges() {
        let rows: Vec<DatasetRow> = (0..3).map(|i| row(i, json!([{"i": i}]))).collect();
        assert_eq!(split_train_test(rows.clone(), 1.0, 7).test.len(), 0);
        assert_eq!(split_train_test(rows.clone(), 0.0, 7).train.len(), 0);
        assert!(split_train_test(Vec::new(), 0.8, 42).train.is_empty());
    }
}
