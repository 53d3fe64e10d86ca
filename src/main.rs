// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::{reflector, watcher, WatchStreamExt};
use kube::{Api, Client};
use kube_runtime::watcher::Config as WatcherConfig;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use federator::config::Config;
use federator::controller::Controller;
use federator::kubernetes::wait_for_crd;
use federator::reconciler::ObjectReconciler;
use federator::reconcilers::ConfigMapHandler;
use federator::store::KubeStore;
use federator::types::FederatedConfigMap;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting federator");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: namespace={}, workers={}",
        config.watch_namespace.as_deref().unwrap_or("<all>"),
        config.worker_count
    );

    // Create Kubernetes client
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for FederatedConfigMap CRD to become available...");
    wait_for_crd::<FederatedConfigMap>(&client).await?;

    let api: Api<FederatedConfigMap> = match &config.watch_namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };
    let (reader, writer) = reflector::store();
    let events = reflector(writer, watcher(api, WatcherConfig::default())).default_backoff();

    let reconciler = ObjectReconciler::new(
        reader,
        ConfigMapHandler::new(KubeStore::<ConfigMap>::new(client)),
    );
    let controller = Controller::new(
        "FederatedConfigMap",
        reconciler,
        &config.controller_config(),
    );
    let bridge = controller.event_bridge();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = controller.start(shutdown_rx);
    let mut bridge_task = tokio::spawn(bridge.run(events));

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
        }
        _ = &mut bridge_task => warn!("Event stream ended unexpectedly"),
    }

    // The receiver is gone only if the controller already stopped.
    let _ = shutdown_tx.send(true);
    handle.wait().await;
    bridge_task.abort();

    info!("Federator stopped");
    Ok(())
}
