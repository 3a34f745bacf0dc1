//! scm: entry point for a storage container manager process.
//!
//! Loads config, sets up the container registry, then serves the
//! container location gRPC service on the configured listen address.

use scm_container::ContainerMap;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    scm_metrics::init_tracing();

    // Load config: first CLI arg is the YAML config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "scm.yaml".to_string());

    let config = match scm_config::load_from_file(std::path::Path::new(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                "failed to load config from {}: {}, using defaults",
                config_path,
                e
            );
            scm_config::load_from_str("listen: \"127.0.0.1:9860\"\n")?
        }
    };

    let containers = Arc::new(ContainerMap::new(config.containers.first_container_id));
    tracing::info!(
        "container ids start at {}, list cap {}",
        config.containers.first_container_id,
        config.containers.max_list_count
    );

    let router = scm_net::build_server(containers, config.containers.max_list_count);

    // Spawn metrics HTTP server if configured
    if let Some(metrics_port) = config.metrics_port {
        let metrics_addr = std::net::SocketAddr::from(([0, 0, 0, 0], metrics_port));
        tokio::spawn(async move {
            if let Err(e) = scm_metrics::serve_metrics(metrics_addr).await {
                tracing::warn!("metrics server failed: {}", e);
            }
        });
    }

    // Serve with graceful shutdown on Ctrl+C
    tracing::info!("serving gRPC on {}", config.listen);
    tokio::select! {
        result = router.serve(config.listen) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
