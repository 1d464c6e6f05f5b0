//! `palletsense-worker` -- run one analysis batch from the command line.
//!
//! Configuration comes from the environment (see
//! [`palletsense_worker::config::WorkerConfig::from_env`]). A `.env` file
//! in the working directory is honoured.
//!
//! | Variable     | Default                                                | Description           |
//! |--------------|--------------------------------------------------------|-----------------------|
//! | `RUST_LOG`   | `palletsense_worker=info,palletsense_pipeline=info`    | Log filter            |
//! | `LOG_FORMAT` | `text`                                                 | `json` for JSON lines |
//!
//! Ctrl-C cancels the run between entities.

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use palletsense_pipeline::{run_batch, AnalysisBatch, RunOptions};
use palletsense_worker::config::WorkerConfig;

const DEFAULT_LOG_FILTER: &str = "palletsense_worker=info,palletsense_pipeline=info";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    // Logs go to stderr so a report written to stdout stays clean.
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::from_env().context("invalid worker configuration")?;
    tracing::info!(
        input = %config.input_path.display(),
        output = ?config.output_path,
        route_index = ?config.route_index,
        "Starting palletsense-worker",
    );

    let bytes = tokio::fs::read(&config.input_path)
        .await
        .with_context(|| format!("failed to read {}", config.input_path.display()))?;
    let batch = AnalysisBatch::from_json_slice(&bytes).context("failed to parse batch document")?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            signal_token.cancel();
        }
    });

    let analysis = config.analysis.clone();
    let options = RunOptions {
        route_index: config.route_index,
        snapshot_at: None,
    };
    let report = tokio::task::spawn_blocking(move || {
        run_batch(&batch, &analysis, &options, &cancel)
    })
    .await
    .context("analysis task panicked")??;

    let rendered = serde_json::to_vec_pretty(&report)?;
    match &config.output_path {
        Some(path) => {
            tokio::fs::write(path, &rendered)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), run_id = %report.run_id, "Report written");
        }
        None => {
            use tokio::io::AsyncWriteExt;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&rendered).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}
