use anyhow::{Context, Result};
use clap::Parser;
use sqlrft::duck::QueryEngine;
use sqlrft::mcp::{server, McpServer};
use std::{env, net::IpAddr, path::PathBuf, sync::Arc};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Serve the `query` tool over JSON-RPC for a DuckDB database.
#[derive(Parser, Debug)]
struct Args {
    /// DuckDB database file
    #[arg(long, env = "DB_PATH", default_value = "data/synthetic_openflights.db")]
    db_path: PathBuf,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Open the database writable instead of read-only
    #[arg(long)]
    read_write: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let engine = if args.read_write {
        QueryEngine::open(&args.db_path)?
    } else {
        QueryEngine::open_read_only(&args.db_path)?
    };
    info!(db = %args.db_path.display(), read_only = !args.read_write, "database opened");

    let routes = server::routes(Arc::new(McpServer::new(Arc::new(engine))));

    let (addr, serving) = warp::serve(routes)
        .try_bind_ephemeral((args.host, args.port))
        .with_context(|| format!("binding {}:{}", args.host, args.port))?;
    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("MCP endpoint: POST http://{}/mcp/", addr);

    serving.await;
    Ok(())
}
