// traffic-monitor/src/main.rs
use actix::Actor;
use common::{setup_tracing, Config};
use std::sync::Arc;
use std::time::Duration;

use traffic_monitor::actors::monitor_actor::{Close, GetAggregates, GetStatus, SwitchApp};
use traffic_monitor::actors::session_actor::{Login, Shutdown};
use traffic_monitor::{ChannelRegistry, FeedSubscriber, HttpPageFetcher, SessionActor, TrafficMonitor};

#[actix::main]
async fn main() -> std::io::Result<()> {
    // Setup tracing
    setup_tracing();

    // Load configuration
    let config = Config::from_env();

    let app_id = match config.app_id.clone() {
        Some(app_id) => app_id,
        None => {
            tracing::error!("No application configured; set APP__APP_ID");
            return Ok(());
        }
    };

    let session = SessionActor::new(Duration::from_secs(config.session_check_interval_secs.max(1))).start();
    match config.auth_token.clone() {
        Some(token) => match session.send(Login { token }).await {
            Ok(Ok(expires_at)) => tracing::info!("Session valid until {}", expires_at),
            Ok(Err(e)) => tracing::error!("Login failed: {}", e),
            Err(e) => tracing::error!("Session actor unavailable: {}", e),
        },
        None => tracing::warn!("No auth token configured; history requests will fail"),
    }

    // The registry outlives every view that subscribes through it
    let registry = ChannelRegistry::create();
    let subscriber = FeedSubscriber::new(registry.clone(), config.clone());
    let fetcher = Arc::new(HttpPageFetcher::new(config.clone()));
    let monitor = TrafficMonitor::new(subscriber, fetcher, session.clone(), config.page_size).start();

    tracing::info!("Starting traffic monitor for {} against {}", app_id, config.api_url);

    match monitor.send(SwitchApp { app_id: Some(app_id) }).await {
        Ok(Ok(added)) => tracing::info!("Initial page loaded ({} entries)", added),
        Ok(Err(e)) => tracing::error!("{} ({})", e.user_message(), e),
        Err(e) => tracing::error!("Monitor unavailable: {}", e),
    }

    let mut report = tokio::time::interval(Duration::from_secs(config.report_interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            },
            _ = report.tick() => {
                let (status, aggregates) = match (monitor.send(GetStatus).await, monitor.send(GetAggregates).await) {
                    (Ok(status), Ok(aggregates)) => (status, aggregates),
                    _ => {
                        tracing::error!("Monitor stopped unexpectedly");
                        break;
                    }
                };

                tracing::info!(
                    "{:?}: {} entries, page {}/{}{}",
                    status.connection,
                    status.entry_count,
                    status.pagination.current,
                    status.pagination.total,
                    status.error.map(|e| format!(" ({})", e)).unwrap_or_default()
                );

                for aggregate in aggregates.values() {
                    tracing::info!(
                        "{}: {} requests, {}% success, most used {}, last access {}",
                        aggregate.ip,
                        aggregate.total_requests,
                        aggregate.success_rate_display(),
                        aggregate.most_used_url,
                        aggregate.last_access
                    );
                }
            }
        }
    }

    let _ = monitor.send(Close).await;
    registry.destroy();
    let _ = session.send(Shutdown).await;

    Ok(())
}
