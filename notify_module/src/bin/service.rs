use notify_module::service::{run_server, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().init();

    let config = ServiceConfig::from_env()?;
    run_server(config, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install ctrl-c handler: {}", err);
    }
}
