// src/eval/mod.rs
//
// Scores one SQL candidate by running it through the query service and comparing the rendered
// result with the expected rows. Every failure becomes a score-0 result; nothing propagates.

use crate::compare::{canonical_ground_truth, canonical_records, CompareError};
use crate::dataset::{DatasetRow, Message};
use crate::mcp::{JsonRpcRequest, McpClient};
use crate::table::{parse_ascii_table, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub mod messages;

pub use messages::extract_sql;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Service root, e.g. `http://127.0.0.1:8080`.
    pub mcp_url: Option<String>,
    pub timeout: Duration,
    pub session_id: String,
    pub request_id: String,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            mcp_url: None,
            timeout: DEFAULT_TIMEOUT,
            session_id: "stateless-eval".to_string(),
            request_id: "eval-1".to_string(),
        }
    }
}

impl EvalConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            mcp_url: Some(url.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateResult {
    pub score: u8,
    pub reason: String,
    pub is_score_valid: bool,
}

impl EvaluateResult {
    pub fn pass() -> Self {
        Self {
            score: 1,
            reason: "match".to_string(),
            is_score_valid: true,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            score: 0,
            reason: reason.into(),
            is_score_valid: true,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_score_valid: false,
            ..Self::fail(reason)
        }
    }

    pub fn passed(&self) -> bool {
        self.score == 1
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("MCP_SERVER_URL not set")]
    MissingServerUrl,
    #[error("invalid MCP_SERVER_URL: {0}")]
    InvalidServerUrl(String),
    #[error("No assistant output")]
    NoOutput,
    #[error("Empty assistant output")]
    EmptyOutput,
    #[error("ground_truth was not a list")]
    InvalidGroundTruth,
    #[error("Missing messages or ground_truth")]
    MissingRowData,
    #[error("MCP request failed: {0}")]
    Transport(String),
    #[error("No event-stream JSON found")]
    NoEvent,
    #[error("MCP error: {0}")]
    Protocol(String),
    #[error("MCP tool error: {0}")]
    Tool(String),
    #[error("compare error: {0}")]
    Compare(String),
}

impl EvalError {
    /// False when the failure says nothing about the SQL itself.
    pub fn is_score_valid(&self) -> bool {
        !matches!(
            self,
            EvalError::MissingServerUrl
                | EvalError::InvalidServerUrl(_)
                | EvalError::NoOutput
                | EvalError::EmptyOutput
                | EvalError::InvalidGroundTruth
                | EvalError::MissingRowData
        )
    }
}

impl From<CompareError> for EvalError {
    fn from(e: CompareError) -> Self {
        match e {
            CompareError::NotAList => EvalError::InvalidGroundTruth,
            other => EvalError::Compare(other.to_string()),
        }
    }
}

impl From<EvalError> for EvaluateResult {
    fn from(e: EvalError) -> Self {
        EvaluateResult {
            score: 0,
            reason: e.to_string(),
            is_score_valid: e.is_score_valid(),
        }
    }
}

pub struct Evaluator {
    config: EvalConfig,
    client: Result<McpClient, EvalError>,
}

impl Evaluator {
    /// Build the blocking HTTP client up front. A missing or unusable URL is not an error here;
    /// it surfaces as an invalid score on every evaluation.
    ///
    /// Must not be called (or dropped) from inside an async runtime.
    pub fn new(config: EvalConfig) -> Self {
        let client = match config.mcp_url.as_deref().map(str::trim) {
            None | Some("") => Err(EvalError::MissingServerUrl),
            Some(url) => McpClient::new(url, config.timeout)
                .map_err(|e| EvalError::InvalidServerUrl(format!("{:#}", e))),
        };
        Self { config, client }
    }

    /// Score the final message of `messages` against `ground_truth` (a list of row objects).
    pub fn evaluate(&self, messages: &[Message], ground_truth: &Value) -> EvaluateResult {
        match self.try_evaluate(messages, ground_truth) {
            Ok(result) => result,
            Err(e) => {
                debug!(error = %e, "evaluation failed");
                e.into()
            }
        }
    }

    /// Score one dataset row; rows without messages or ground truth are invalid.
    pub fn evaluate_row(&self, row: &DatasetRow) -> EvaluateResult {
        match &row.ground_truth {
            Some(gt) if !row.messages.is_empty() => self.evaluate(&row.messages, gt),
            _ => EvalError::MissingRowData.into(),
        }
    }

    fn try_evaluate(
        &self,
        messages: &[Message],
        ground_truth: &Value,
    ) -> Result<EvaluateResult, EvalError> {
        let client = self.client.as_ref().map_err(Clone::clone)?;
        let sql = extract_sql(messages)?;
        let expected = canonical_ground_truth(ground_truth)?;

        let request =
            JsonRpcRequest::query_tool_call(&self.config.request_id, &self.config.session_id, &sql);
        let envelope = client
            .call(&request)
            .map_err(|e| EvalError::Transport(format!("{:#}", e)))?
            .ok_or(EvalError::NoEvent)?;
        let text = table_text(&envelope)?;

        let parsed = parse_ascii_table(text);
        if parsed.dropped_rows > 0 {
            warn!(
                dropped = parsed.dropped_rows,
                kept = parsed.records.len(),
                "rows with a mismatched cell count were dropped"
            );
        }

        if canonical_records(&parsed.records) == expected {
            Ok(EvaluateResult::pass())
        } else {
            Ok(EvaluateResult::fail(format!(
                "mismatch: gt={} pred={}",
                ground_truth,
                records_json(&parsed.records)
            )))
        }
    }
}

/// Pull the rendered table out of a response envelope.
fn table_text(envelope: &Value) -> Result<&str, EvalError> {
    if let Some(err) = envelope.get("error") {
        return Err(EvalError::Protocol(err.to_string()));
    }
    let result = envelope
        .get("result")
        .ok_or_else(|| EvalError::Transport("response has no result".to_string()))?;
    let text = result.pointer("/content/0/text").and_then(Value::as_str);

    if result.get("isError").and_then(Value::as_bool) == Some(true) {
        let detail = text.map_or_else(|| result.to_string(), str::to_string);
        return Err(EvalError::Tool(detail));
    }
    text.ok_or_else(|| EvalError::Transport("response has no result.content[0].text".to_string()))
}

fn records_json(records: &[Record]) -> String {
    serde_json::to_string(records).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}
