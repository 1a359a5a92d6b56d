use std::sync::Arc;

use error::ResultOkLogExt;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;

/// Container Watch: a per-host agent that follows the container runtime's
/// lifecycle events, samples CPU and memory usage of running containers and
/// publishes them to a remote collector.
///
/// Liveness is reported through a time-limited heartbeat key, and operational
/// failures are batched into periodic alert digests.
pub mod alert;
pub mod api;
pub mod config;
pub mod container;
pub mod discovery;
pub mod error;
pub mod publisher;
pub mod registry;
pub mod runtime;
pub mod sampler;
pub mod shutdown;

/// Runs the agent until SIGINT or SIGTERM.
///
/// Starts the event listener, the metrics publisher, the alert batcher and,
/// when configured, the status endpoint, all sharing one registry and one
/// alert queue.
///
/// # Errors
///
/// Possible errors include:
/// - Missing or malformed environment variables (e.g., `HOST_ID`).
/// - An invalid Redis address or HTTP client setup failure.
/// - Failure to install the signal handlers.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    log::info!(
        "Starting container-watch: host_id={}, docker_socket={}, poll_interval={:?}, alert_interval={:?}, alerts_enabled={}",
        config.host_id,
        config.docker_socket.display(),
        config.poll_interval,
        config.alert_interval,
        config.discord_webhook_url.is_some()
    );

    let registry = Arc::new(registry::Registry::default());
    let alerts = Arc::new(alert::AlertQueue::with_capacity(
        config.alert_queue_capacity,
    ));
    let runtime = Arc::new(runtime::docker::DockerClient::new(
        config.docker_socket.clone(),
        config.http_timeout,
    ));

    let heartbeat = publisher::RedisHeartbeat::new(&config.redis_url, config.http_timeout)?;
    let metrics_sink = publisher::HttpMetricsSink::new(
        config.metrics_url.clone(),
        config.api_key.clone(),
        config.http_timeout,
    )?;
    let alert_sink = config
        .discord_webhook_url
        .as_ref()
        .map(|url| alert::DiscordWebhook::new(url.clone(), config.http_timeout))
        .transpose()?;
    if alert_sink.is_none() {
        log::warn!("DISCORD_WEBHOOK_URL is not set, alerts will only be logged");
    }

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let (trigger, shutdown) = shutdown::channel();

    let mut handles: Vec<(&'static str, JoinHandle<()>)> = Vec::with_capacity(4);
    handles.push((
        "listener",
        tokio::spawn(
            discovery::Listener::new(
                Arc::clone(&runtime),
                Arc::clone(&registry),
                config.events_reconnect,
            )
            .run(shutdown.clone()),
        ),
    ));
    handles.push((
        "publisher",
        tokio::spawn(
            publisher::Publisher::new(
                runtime,
                heartbeat,
                metrics_sink,
                Arc::clone(&registry),
                Arc::clone(&alerts),
                config.host_id.clone(),
                config.poll_interval,
            )
            .run(shutdown.clone()),
        ),
    ));
    handles.push((
        "alert batcher",
        tokio::spawn(
            alert::AlertBatcher::new(
                Arc::clone(&alerts),
                alert_sink,
                config.host_id.clone(),
                config.alert_interval,
            )
            .run(shutdown.clone()),
        ),
    ));
    if let Some(addr) = config.status_addr {
        let server = api::APIServer::new(api::AppState::new(
            &config.host_id,
            Arc::clone(&registry),
            Arc::clone(&alerts),
        ));
        let shutdown = shutdown.clone();
        handles.push((
            "status endpoint",
            tokio::spawn(async move {
                server.listen(addr, shutdown).await.ok_log();
            }),
        ));
    }

    tokio::select! {
        _ = sigint.recv() => log::info!("Received SIGINT, initiating graceful shutdown"),
        _ = sigterm.recv() => log::info!("Received SIGTERM, initiating graceful shutdown"),
    }
    trigger.fire();

    for (name, handle) in handles {
        if handle.await.ok_log().is_some() {
            log::debug!("{} task finished", name);
        }
    }
    log::info!(
        "Shutdown complete: tracked={}, undelivered_alerts={}",
        registry.size(),
        alerts.len()
    );

    Ok(())
}
