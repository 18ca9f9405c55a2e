use anyhow::Result;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let app = qsl_server::app::vault_app();
    qsl_server::config::config(&app)?;

    let vault = qsl_server::build(app).await?;

    let host = vault
        .ax
        .app
        .get("http.host")
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = vault
        .ax
        .app
        .get("http.port")
        .unwrap_or_else(|| "5000".to_string());
    let addr = format!("{host}:{port}");
    info!(%addr, "qsl vault starting");

    let served = vault.ax.clone().listen(addr).await;
    vault.shutdown().await;
    served
}
