//! Runs one indexing session from a JSON-lines resource file.

use std::process::ExitCode;

use dotenv::dotenv;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use search_indexer::{is_clean_run, Dependencies, IndexerSettings, IndexingError, JsonLinesSource};
use search_indexer_pipeline::orchestrator::SessionControl;
use search_indexer_pipeline::reconciler::SessionSummary;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, IndexingError> {
    dotenv().ok();
    init_tracing();

    let settings = IndexerSettings::from_env()?;
    let deps = Dependencies::new(settings).await?;
    let orchestrator = deps.orchestrator;

    orchestrator.prepare_indices(deps.reset_indices).await?;
    let source = JsonLinesSource::open(&deps.source_path).await?;

    let control = SessionControl::new();
    let shutdown = control.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, cancelling session");
                shutdown.shutdown();
            }
            Err(e) => error!(error = %e, "Cannot listen for interrupt"),
        }
    });

    let mut progress = control.subscribe_progress();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = progress.borrow_and_update().clone();
            debug!(
                state = ?snapshot.state,
                submitted = snapshot.submitted,
                succeeded = snapshot.succeeded,
                fatally_failed = snapshot.fatally_failed,
                in_flight = snapshot.in_flight_batches,
                pending_retries = snapshot.pending_retries,
                "Progress"
            );
        }
    });

    info!(source = %deps.source_path.display(), "Starting indexing");
    let summary = orchestrator.run_with(source, control).await;

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => error!(error = %e, "Cannot serialize session summary"),
    }

    Ok(exit_code(&summary))
}

fn exit_code(summary: &SessionSummary) -> ExitCode {
    if let Some(error) = &summary.source_error {
        error!(error = %error, "Resource source failed, input was not fully indexed");
    }
    if is_clean_run(summary) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
