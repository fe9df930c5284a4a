use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use reqwest::Client as HttpClient;
use tracing::info;

use redbook_launch::core::config::AppConfig;
use redbook_launch::flags::{HttpRemoteConfig, RemoteFlagFetcher};
use redbook_launch::flow::{AttributionFlowController, FlowSettings};
use redbook_launch::metrics::HttpMetricsClient;
use redbook_launch::permissions::PermissionGateway;
use redbook_launch::platform::HeadlessPlatform;
use redbook_launch::store::{DestinationStore, FileDestinationStore};

#[derive(Parser)]
#[command(name = "redbook-launch", about = "RedBook Bird first-launch gate")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the launch flow once and print the decision as JSON
    Run,
    /// Print the persisted destination, if any
    Show,
    /// Forget the persisted destination
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    redbook_launch::setup_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Run => {
            let config = AppConfig::from_env().map_err(|e| anyhow!("Config error: {e}"))?;
            let store = Arc::new(FileDestinationStore::new(&config.store_path));
            run(&config, store).await
        }
        Command::Show => {
            let store = FileDestinationStore::new(AppConfig::store_path_from_env());
            let record = store.load_record().context("reading persisted destination")?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Command::Clear => {
            let store = FileDestinationStore::new(AppConfig::store_path_from_env());
            store.clear().context("clearing persisted destination")?;
            info!(path = %store.path().display(), "Persisted destination cleared");
            Ok(())
        }
    }
}

async fn run(config: &AppConfig, store: Arc<FileDestinationStore>) -> Result<()> {
    let platform = Arc::new(HeadlessPlatform::from_env().map_err(|e| anyhow!(e))?);
    let permissions = Arc::new(PermissionGateway::new(platform.clone(), platform));

    let remote_config = HttpRemoteConfig::new(
        HttpClient::builder().timeout(config.flag_timeout).build()?,
        &config.remote_config_url,
    );
    let flags = Arc::new(RemoteFlagFetcher::new(
        Arc::new(remote_config),
        config.flag_timeout,
    ));
    let metrics = Arc::new(HttpMetricsClient::new(
        &config.metrics_url,
        config.metrics_timeout,
    )?);

    let flow = Arc::new(AttributionFlowController::new(
        permissions,
        flags,
        metrics,
        store,
        FlowSettings::from_config(config),
    ));

    let decision = flow.spawn().await.context("launch flow task failed")?;
    println!("{}", serde_json::to_string(&decision)?);
    Ok(())
}
