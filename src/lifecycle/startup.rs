//! Startup sequence of the `serve` command.
//!
//! ```text
//! metrics exporter → registry (first build) → config watcher
//!     → signal handlers → admin server (or idle until shutdown)
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::schema::HostsConfig;
use crate::config::watcher::ConfigWatcher;
use crate::hosting::{BuildPolicy, FileSource, HostingManager};
use crate::http::AdminServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::observability::metrics;

pub async fn serve(
    config_path: &Path,
    config: HostsConfig,
    policy: BuildPolicy,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let manager = Arc::new(HostingManager::new(FileSource::new(config_path)).with_policy(policy));
    let hosts = manager.load()?;
    tracing::info!(
        generation = hosts.generation(),
        host_groups = ?hosts.host_group_names(),
        "Hosting registry loaded"
    );

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));
    tokio::spawn(signals::invalidate_on_hangup(Arc::clone(&manager), shutdown.clone()));

    let (watcher, mut updates) = ConfigWatcher::new(config_path);
    let _watcher = match watcher.run() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::error!(error = %e, "Config watcher not started; hot reload disabled");
            None
        }
    };
    let reload_manager = Arc::clone(&manager);
    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                update = updates.recv() => {
                    let Some(new_config) = update else { break };
                    match reload_manager.replace(new_config) {
                        Ok(hosts) => tracing::info!(generation = hosts.generation(), "Hosting configuration reloaded"),
                        Err(e) => tracing::error!(error = %e, "Reloaded configuration rejected; keeping current registry"),
                    }
                }
                _ = stop.recv() => break,
            }
        }
    });

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        AdminServer::new(Arc::clone(&manager), config.admin.clone())
            .run(listener, shutdown.wait())
            .await?;
    } else {
        tracing::info!("Admin API disabled; waiting for shutdown");
        shutdown.wait().await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
