use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::alerts::AlertEvaluator;
use crate::config::{AppConfig, DEFAULT_HORIZON_DAYS, DEFAULT_REFRESH_SECS};
use crate::error::ServiceResult;
use crate::forecast::ForecastService;
use crate::store::RecordStore;

/// Config for the periodic forecast refresh.
///
/// One cycle regenerates every product's horizon, then evaluates the alert rules
/// against the fresh horizons.
#[derive(Debug, Clone)]
pub struct ForecastRefreshRunner {
    pub interval: Duration,
    pub horizon_days: usize,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for ForecastRefreshRunner {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_REFRESH_SECS),
            horizon_days: DEFAULT_HORIZON_DAYS,
            max_retries: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

/// Handle for the running refresh task (shutdown + trigger hook).
#[derive(Debug)]
pub struct ForecastRefreshRunnerHandle {
    shutdown: watch::Sender<bool>,
    trigger: mpsc::Sender<()>,
    completed: Arc<AtomicU64>,
    join: JoinHandle<()>,
}

impl ForecastRefreshRunnerHandle {
    /// Request a cycle now, e.g. after a batch of sales was recorded.
    ///
    /// Triggers are coalesced: if one is already pending this is a no-op.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Cycles finished since the runner started, including failed ones.
    pub fn completed_cycles(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Stop the runner and wait for the task to exit. A cycle in progress is
    /// allowed to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            warn!(error = %e, "forecast refresh runner task ended abnormally");
        }
    }
}

impl ForecastRefreshRunner {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: config.refresh_interval,
            horizon_days: config.forecast_horizon_days,
            ..Self::default()
        }
    }

    /// Spawn the runner on the current tokio runtime.
    ///
    /// - Schedule: once at startup, then every `interval`
    /// - Trigger: `handle.trigger()` requests an extra cycle
    /// - Failures: logged and retried with bounded exponential backoff; never propagate
    pub fn spawn<S>(
        &self,
        forecasts: Arc<ForecastService<S>>,
        alerts: Arc<AlertEvaluator<S>>,
    ) -> ForecastRefreshRunnerHandle
    where
        S: RecordStore + ?Sized + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);
        let completed = Arc::new(AtomicU64::new(0));

        let join = tokio::spawn(runner_loop(
            self.clone(),
            forecasts,
            alerts,
            shutdown_rx,
            trigger_rx,
            completed.clone(),
        ));

        ForecastRefreshRunnerHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            completed,
            join,
        }
    }
}

async fn runner_loop<S>(
    cfg: ForecastRefreshRunner,
    forecasts: Arc<ForecastService<S>>,
    alerts: Arc<AlertEvaluator<S>>,
    mut shutdown_rx: watch::Receiver<bool>,
    mut trigger_rx: mpsc::Receiver<()>,
    completed: Arc<AtomicU64>,
) where
    S: RecordStore + ?Sized + 'static,
{
    info!(
        interval_secs = cfg.interval.as_secs(),
        horizon_days = cfg.horizon_days,
        "forecast refresh runner started"
    );

    // The first tick completes immediately: that is the startup run.
    let mut ticker = tokio::time::interval(cfg.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures: u32 = 0;

    'runner: loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break 'runner,
            _ = ticker.tick() => {}
            Some(()) = trigger_rx.recv() => {}
        }

        loop {
            match run_cycle(cfg.horizon_days, &forecasts, &alerts).await {
                Ok(()) => {
                    failures = 0;
                    break;
                }
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, attempt = failures, "forecast refresh cycle failed");
                    if failures > cfg.max_retries {
                        failures = 0;
                        break;
                    }
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => break 'runner,
                        _ = tokio::time::sleep(backoff(cfg.base_backoff, failures)) => {}
                    }
                }
            }
        }

        completed.fetch_add(1, Ordering::AcqRel);
    }

    info!("forecast refresh runner stopped");
}

/// Refresh every horizon, then evaluate alerts. Evaluation still runs when the
/// refresh fails: low-stock checks do not depend on forecasts.
async fn run_cycle<S>(
    horizon_days: usize,
    forecasts: &ForecastService<S>,
    alerts: &AlertEvaluator<S>,
) -> ServiceResult<()>
where
    S: RecordStore + ?Sized,
{
    let refreshed = forecasts.refresh_catalog(horizon_days).await;
    let evaluated = alerts.evaluate_catalog().await;

    let summary = refreshed?;
    let created = evaluated?;
    info!(
        refreshed = summary.refreshed,
        fallbacks = summary.fallbacks,
        failed = summary.failed,
        alerts_created = created.len(),
        "forecast refresh cycle complete"
    );
    Ok(())
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    // base * 2^(attempt-1), capped at 30s.
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(pow as u128);
    Duration::from_millis(ms.min(30_000) as u64)
}
