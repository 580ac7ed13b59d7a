use anyhow::Result;
use common::{Ingress, Route};
use control::apis::ingress::{
    IngressReconciler, KubeIngressStore, KubeRouteClient, RouteTranslator,
};
use control::config::ControllerConfig;
use control::server::MetricsServer;
use kube::{Api, Client};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Knative Ingress → OpenShift Route controller
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (needed for Kubernetes TLS client)
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok(); // Ignore error if already installed

    let config = ControllerConfig::from_env()?;
    init_tracing(&config.log_format);

    info!("Starting Ingress route controller");
    info!("   Field manager: {}", config.controller_name);
    info!(
        "   Watching: {}",
        config.watch_namespace.as_deref().unwrap_or("all namespaces")
    );
    info!("   Gateway: {}", config.gateway.internal_domain());

    let client = Client::try_default().await?;

    let (ingresses, routes): (Api<Ingress>, Api<Route>) = match &config.watch_namespace {
        Some(ns) => (
            Api::namespaced(client.clone(), ns),
            Api::namespaced(client.clone(), ns),
        ),
        None => (Api::all(client.clone()), Api::all(client.clone())),
    };

    let reconciler = IngressReconciler::new(
        KubeIngressStore::new(client.clone()),
        RouteTranslator::new(
            KubeRouteClient::new(client, config.controller_name.clone()),
            config.gateway.clone(),
        ),
        config.requeue.clone(),
    );

    let metrics_server = MetricsServer::bind(&config.metrics_bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    let metrics_handle = tokio::spawn(metrics_server.serve());

    // The controller stops on SIGTERM/ctrl-c by itself
    let controller_handle = tokio::spawn(reconciler.run(ingresses, routes));

    tokio::select! {
        _ = controller_handle => {
            info!("Controller exited");
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    metrics_handle.abort();

    Ok(())
}

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
