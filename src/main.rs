use anyhow::{Context, Result};
use convocation_media::{auth, config::Config, init_tracing, routes, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // `convocation-media hash-password <password>` prints a hash for the users file.
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("hash-password") {
        let password = args.get(2).context("usage: convocation-media hash-password <password>")?;
        println!("{}", auth::hash_password(password)?);
        return Ok(());
    }

    init_tracing();

    let config = Config::from_env()?;
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.upload_dir.display()))?;
    tracing::info!(
        "Loaded {} user(s); storing images in {}",
        config.users.len(),
        config.upload_dir.display()
    );

    let addr = config.bind_addr();
    let app = routes::build_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server running on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
