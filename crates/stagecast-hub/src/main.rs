//! Hub process entry point. All knobs come from the environment (or a
//! local `.env`); see `HubConfig` for the variable names.

use stagecast_common::{try_init_tracing, HubConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if try_init_tracing().is_err() {
        eprintln!("tracing subscriber already set, continuing without re-init");
    }

    let config = match HubConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Refusing to start with incomplete configuration");
            std::process::exit(1);
        }
    };

    info!(env = ?config.env, addr = %config.address(), "Hub starting");

    if let Err(e) = stagecast_hub::server::run(config).await {
        error!(error = %e, "Hub exited with error");
        std::process::exit(1);
    }
}
