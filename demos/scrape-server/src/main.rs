mod config;

use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use prometheus::{IntCounterVec, IntGauge, Opts};
use tracing::{info, warn};

use promgate_core::{HandlerOpts, SharedRegistry, TracingErrorLog};
use promgate_http::{MetricsEndpoint, instrument_metric_handler, metrics_router};
use promgate_observe::init_logger;

use crate::config::ServerConfig;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // 1) config + logger
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg = ServerConfig::load(path.as_deref())?;
    init_logger(&cfg.logger)?;
    info!(listen = %cfg.listen, handler = ?cfg.handler, "configuration loaded");

    // 2) application metrics
    let registry = SharedRegistry::new();
    let jobs = IntCounterVec::new(
        Opts::new("demo_jobs_processed_total", "Jobs processed by the demo worker"),
        &["queue"],
    )?;
    registry.register(jobs.clone())?;
    let backlog = IntGauge::new("demo_queue_backlog", "Jobs waiting in the demo queue")?;
    registry.register(backlog.clone())?;

    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_millis(500));
        for round in 0_u64.. {
            tick.tick().await;
            let queue = if round % 3 == 0 { "priority" } else { "default" };
            jobs.with_label_values(&[queue]).inc();
            backlog.set((round % 7) as i64);
        }
    });

    // 3) metrics endpoint, instrumented with its own request metrics
    let opts = HandlerOpts::from(cfg.handler.clone()).with_error_log(TracingErrorLog);
    let endpoint = MetricsEndpoint::for_registry(registry.clone(), opts)?;
    let app = instrument_metric_handler(&registry, metrics_router("/metrics", endpoint))?;

    // 4) serve
    let listener = tokio::net::TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("binding {}", cfg.listen))?;
    info!(addr = %cfg.listen, "serving /metrics");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutting down");
        })
        .await?;

    Ok(())
}
