use anyhow::{bail, Context, Result};
use clap::Parser;
use sqlrft::{
    dataset::{load_rows, DatasetRow, Message},
    eval::{EvalConfig, Evaluator},
    llm::{ChatMessage, LlmClient, DEFAULT_BASE_URL},
};
use std::{env, path::PathBuf, thread, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_BASE_MODEL: &str = "accounts/fireworks/models/qwen2p5-7b";
const DEFAULT_LARGE_MODEL: &str = "accounts/fireworks/models/qwen3-coder-480b-a35b-instruct";

/// Ask each model the dataset's questions and score the SQL it writes.
#[derive(Parser, Debug)]
struct Args {
    #[arg(default_value = "datasets/final_rft_sql_test_data.jsonl")]
    dataset: PathBuf,

    #[arg(long, env = "MCP_SERVER_URL")]
    mcp_url: String,

    #[arg(long, env = "FIREWORKS_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(long, env = "LLM_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// `label=model_id`; repeatable. Defaults to the base, large and fine-tuned models from the
    /// environment.
    #[arg(long = "model", value_parser = parse_model)]
    models: Vec<(String, String)>,

    /// Pause after every model call
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,

    #[arg(long, default_value_t = 60)]
    llm_timeout_secs: u64,

    #[arg(long)]
    max_rows: Option<usize>,
}

fn parse_model(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((label, id)) if !label.is_empty() && !id.is_empty() => {
            Ok((label.to_string(), id.to_string()))
        }
        _ => Err(format!("expected label=model_id, got {:?}", s)),
    }
}

fn default_models() -> Vec<(String, String)> {
    let mut models = vec![
        (
            "base".to_string(),
            env::var("BASE_MODEL_ID").unwrap_or_else(|_| DEFAULT_BASE_MODEL.to_string()),
        ),
        (
            "large".to_string(),
            env::var("LARGE_BASE_MODEL_ID").unwrap_or_else(|_| DEFAULT_LARGE_MODEL.to_string()),
        ),
    ];
    if let Ok(tuned) = env::var("FINE_TUNED_MODEL_ID") {
        models.push(("tuned".to_string(), tuned));
    }
    models
}

/// System and user prompts are the first two messages of a row.
fn prompts(row: &DatasetRow) -> Option<[ChatMessage; 2]> {
    let system = row.messages.first()?.text()?;
    let user = row.messages.get(1)?.text()?;
    Some([ChatMessage::system(system), ChatMessage::user(user)])
}

struct Contestant {
    label: String,
    llm: LlmClient,
    passed: usize,
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
    let total = rows.len();
    info!(dataset = %args.dataset.display(), rows = total, "loaded");
    if total == 0 {
        bail!("dataset {} has no rows", args.dataset.display());
    }

    let models = if args.models.is_empty() {
        default_models()
    } else {
        args.models.clone()
    };
    let timeout = Duration::from_secs(args.llm_timeout_secs);
    let mut contestants = models
        .into_iter()
        .map(|(label, model)| -> Result<Contestant> {
            let llm = LlmClient::new(&args.base_url, model, args.api_key.as_str(), timeout)?;
            Ok(Contestant { label, llm, passed: 0 })
        })
        .collect::<Result<Vec<_>>>()?;

    // The evaluator's blocking client lives outside the runtime; only LLM calls are async.
    let evaluator = Evaluator::new(EvalConfig::with_url(args.mcp_url.clone()));
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let delay = Duration::from_millis(args.delay_ms);

    for (i, row) in rows.iter().enumerate() {
        let (prompt, ground_truth) = match (prompts(row), &row.ground_truth) {
            (Some(p), Some(gt)) => (p, gt),
            _ => {
                warn!(row = i, "row lacks system/user prompts or ground truth; scored 0");
                continue;
            }
        };

        for c in contestants.iter_mut() {
            match rt.block_on(c.llm.chat(&prompt)) {
                Ok(sql) => {
                    let answer = [Message::new("assistant", sql)];
                    let result = evaluator.evaluate(&answer, ground_truth);
                    if result.passed() {
                        c.passed += 1;
                    }
                    info!(row = i, model = %c.label, score = result.score, reason = %result.reason);
                }
                Err(e) => warn!(
                    row = i,
                    model = %c.label,
                    error = %format!("{:#}", e),
                    "LLM call failed"
                ),
            }
            thread::sleep(delay);
        }

        if (i + 1) % 10 == 0 {
            info!("Progress {}/{}", i + 1, total);
        }
    }

    println!("Results:");
    for c in &contestants {
        let pct = c.passed as f64 * 100.0 / total as f64;
        println!("{:<6}: {}/{} ({:.2}%)  [{}]", c.label, c.passed, total, pct, c.llm.model);
    }
    Ok(())
}
