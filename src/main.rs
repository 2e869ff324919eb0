use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use sqlrft::{
    dataset::{self, load_rows},
    eval::{EvalConfig, EvaluateResult, Evaluator},
};
use std::{path::PathBuf, time::Duration, time::Instant};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Score each dataset row's final assistant message against its ground truth.
#[derive(Parser, Debug)]
struct Args {
    /// JSONL dataset of `{messages, ground_truth}` lines
    #[arg(default_value = "datasets/final_rft_sql_test_data.jsonl")]
    dataset: PathBuf,

    /// Query service root
    #[arg(long, env = "MCP_SERVER_URL")]
    mcp_url: Option<String>,

    #[arg(long, default_value_t = 20)]
    timeout_secs: u64,

    /// Only evaluate the first N rows
    #[arg(long)]
    max_rows: Option<usize>,

    /// Write per-row results here as JSONL
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct RowResult {
    row: usize,
    #[serde(flatten)]
    result: EvaluateResult,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    let rows = load_rows(&args.dataset, args.max_rows)?;
    info!(dataset = %args.dataset.display(), rows = rows.len(), "loaded");

    let evaluator = Evaluator::new(EvalConfig {
        mcp_url: args.mcp_url.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
        ..EvalConfig::default()
    });

    let start = Instant::now();
    let mut results = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let result = evaluator.evaluate_row(row);
        if result.passed() {
            info!(row = i, "match");
        } else {
            warn!(row = i, valid = result.is_score_valid, reason = %result.reason, "no match");
        }
        results.push(RowResult { row: i, result });
    }

    let total = results.len();
    let passed = results.iter().filter(|r| r.result.passed()).count();
    let invalid = results.iter().filter(|r| !r.result.is_score_valid).count();
    let pct = if total > 0 {
        passed as f64 * 100.0 / total as f64
    } else {
        0.0
    };
    info!(elapsed = ?start.elapsed(), "evaluation finished");
    println!("Passed {}/{} ({:.2}%), {} invalid", passed, total, pct, invalid);

    if let Some(path) = &args.output {
        dataset::write_rows(path, &results)?;
        info!(path = %path.display(), "wrote results");
    }
    Ok(())
}
