use decibel_indexer::api::{self, AppState};
use decibel_indexer::{
    init_db, AppError, AptosLedgerSource, Config, Indexer, IndexerConfig, LedgerSource, Repository,
};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Exiting with error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let pool = init_db(&config.database_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let source: Arc<dyn LedgerSource> = Arc::new(AptosLedgerSource::new(
        config.ledger_api_url.clone(),
        config.ledger_api_key.clone(),
        config.request_timeout,
    )?);

    let mut indexer = Indexer::new(source, repo.clone(), IndexerConfig::from(&config))
        .start()
        .await?;

    let app = api::create_router(AppState::new(
        repo,
        config.processor_name.clone(),
        indexer.running_flag(),
    ));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Health server listening on {}", addr);

    let (stop_server, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => None,
        result = indexer.join() => Some(result),
    };
    let result = match finished {
        Some(result) => result,
        None => {
            info!("Shutdown requested");
            indexer.close().await
        }
    };

    let _ = stop_server.send(());
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Health server error"),
        Err(e) => warn!(error = %e, "Health server task failed"),
    }

    result.map_err(AppError::from)
}
