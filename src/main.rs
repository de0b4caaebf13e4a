use anyhow::Result;
use clap::Parser;

use dirplan_lib::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    tracing::info!(
        "dirplan v{} starting (sandbox={}, template={})",
        env!("CARGO_PKG_VERSION"),
        config.sandbox_root.display(),
        config.template_dir.display(),
    );

    dirplan_lib::run(config).await
}
