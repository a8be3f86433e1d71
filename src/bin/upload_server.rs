use anyhow::{Context, Result};
use convocation_media::{config::UploaderConfig, init_tracing, uploader};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = UploaderConfig::from_env()?;
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.upload_dir.display()))?;

    let addr = config.bind_addr();
    let app = uploader::build_uploader_router(&config);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Upload server running on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
