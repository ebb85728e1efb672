use std::process::ExitCode;

use log::{error, info};
use tokio_util::sync::CancellationToken;

use picarto_notify::{CONFIG_URL_ENV, Notifier};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config_url = match dotenvy::var(CONFIG_URL_ENV) {
        Ok(url) => url,
        Err(e) => {
            error!("Please set {CONFIG_URL_ENV} to the URL of the configuration document ({e})");
            return ExitCode::FAILURE;
        }
    };

    let mut notifier = match Notifier::new(config_url).await {
        Ok(notifier) => notifier,
        Err(e) => {
            error!("Failed to load the initial configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            shutdown.cancel();
        }
    });

    notifier.run(token).await;
    ExitCode::SUCCESS
}
