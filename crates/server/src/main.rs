use anyhow::Context;

use smartstock_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    smartstock_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let app = smartstock_server::app::build_app(config).await?;

    app.run_until(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    })
    .await;

    Ok(())
}
