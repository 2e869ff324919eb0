use anyhow::Result;
use clap::Parser;
use sqlrft::dataset::{load_rows, split_train_test, write_rows};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Shuffle a generated dataset with a fixed seed and cut it into train and test files.
#[derive(Parser, Debug)]
struct Args {
    #[arg(default_value = "datasets/final_rft_sql_data.jsonl")]
    input: PathBuf,

    #[arg(long, default_value = "datasets/final_rft_sql_train_data.jsonl")]
    train_out: PathBuf,

    #[arg(long, default_value = "datasets/final_rft_sql_test_data.jsonl")]
    test_out: PathBuf,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 0.8)]
    train_fraction: f64,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    let rows = load_rows(&args.input, None)?;
    let split = split_train_test(rows, args.train_fraction, args.seed);

    write_rows(&args.train_out, &split.train)?;
    write_rows(&args.test_out, &split.test)?;
    info!(
        "Wrote train={} to {}, test={} to {}",
        split.train.len(),
        args.train_out.display(),
        split.test.len(),
        args.test_out.display()
    );
    Ok(())
}
