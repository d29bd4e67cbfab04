use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use tokio::signal;
use tokio::sync::oneshot;

use trialwatch::api::rest::RestApi;
use trialwatch::config::load_config;
use trialwatch::runner::Runner;
use trialwatch::store::{MemoryStore, TrialStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = load_config(Path::new("config.yaml"))?;

    let store = match &config.store.seed_path {
        Some(path) => {
            info!("loading seed fixture from {}", path.display());
            MemoryStore::from_seed_file(path)?
        }
        None => MemoryStore::new(),
    };
    let store: Arc<dyn TrialStore> = Arc::new(store);

    let runner = Arc::new(Runner::new(
        store,
        config.analysis.trial_phase,
        config.analysis.weights,
    ));
    let api = RestApi::new(Arc::clone(&runner), config.api.cron_secret.clone());

    let ip: IpAddr = config.api.host.parse()?;
    let addr = SocketAddr::new(ip, config.api.port);
    info!("starting server on {}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let (_, server) = warp::serve(api.routes()).bind_with_graceful_shutdown(addr, async move {
        shutdown_rx.await.ok();
        info!("shutting down server");
    });

    let server_handle = tokio::spawn(server);

    signal::ctrl_c().await?;
    info!("shutdown signal received");
    shutdown_tx.send(()).ok();

    if let Err(err) = server_handle.await {
        error!("server task failed: {}", err);
    }

    Ok(())
}
