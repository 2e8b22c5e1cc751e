use cartera_server::{ServerConfig, run_server, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init()?;
    run_server(ServerConfig::from_env()?).await
}
