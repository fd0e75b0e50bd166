//! corpus-serve binary entry point

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = corpus_serve::ServerConfig::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(
        host = %config.host,
        port = config.port,
        db_path = %config.db_path,
        "starting corpus-serve"
    );

    let server = corpus_serve::CorpusServer::new(config)?;
    server.start().await?;

    Ok(())
}
