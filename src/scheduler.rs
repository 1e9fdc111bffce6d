use crate::config::SchedulerConfig;
use crate::orchestrator::ForecastService;
use crate::region::Region;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};
use tracing::info;

/// Periodically walks every region through the forecast path so stale
/// readings are replaced before users ask for them.
pub struct Scheduler {
    config: SchedulerConfig,
    service: Arc<ForecastService>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        service: Arc<ForecastService>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            service,
            shutdown_rx,
        }
    }

    pub async fn run(&mut self) {
        let initial_delay = Duration::from_secs(self.config.initial_delay_seconds);
        let poll_interval = Duration::from_secs(self.config.interval_minutes * 60);

        info!(
            "Scheduler starting with {}s initial delay, {}m interval",
            self.config.initial_delay_seconds, self.config.interval_minutes
        );

        // Initial delay
        tokio::select! {
            _ = tokio::time::sleep(initial_delay) => {},
            _ = self.shutdown_rx.changed() => {
                info!("Shutdown received during initial delay");
                return;
            }
        }

        // Run immediately, then on interval
        self.run_refresh().await;

        let mut ticker = interval(poll_interval);
        ticker.tick().await; // First tick is immediate, skip it

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_refresh().await;
                }
                _ = self.shutdown_rx.changed() => {
                    info!("Shutdown signal received, stopping scheduler");
                    break;
                }
            }
        }
    }

    async fn run_refresh(&self) {
        info!("Starting scheduled refresh");

        let delay = Duration::from_millis(self.config.request_delay_ms);
        let refreshed = self.service.refresh_all(delay).await;

        info!(
            "Scheduled refresh completed: {}/{} regions have current readings",
            refreshed,
            Region::ALL.len()
        );
    }
}
