use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::describe::DescriptionResolver;
use crate::tasks::{ActivityOutcome, TaskStore};

use super::observer::{ActiveWindowObserver, ActivitySample};
use super::tracker::{FocusEvent, FocusTarget, FocusTracker};

// Set to false to silence this module's per-tick logging
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Consecutive observer failures before a warning is logged.
const FAILURE_WARN_THRESHOLD: u32 = 5;

/// Everything the sampling loop needs besides the tracker it owns.
#[derive(Clone)]
pub struct SamplingContext {
    pub observer: Arc<dyn ActiveWindowObserver>,
    pub store: TaskStore,
    pub resolver: Arc<DescriptionResolver>,
    pub focus_tx: Arc<watch::Sender<Option<FocusTarget>>>,
    pub interval: Duration,
    pub sample_timeout: Duration,
    pub auto_record: bool,
}

pub async fn sampling_loop(
    ctx: SamplingContext,
    mut tracker: FocusTracker,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures: u32 = 0;

    log_info!("sampling loop started ({}ms period)", ctx.interval.as_millis());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match take_sample(&ctx).await {
                    Ok(sample) => {
                        if consecutive_failures >= FAILURE_WARN_THRESHOLD {
                            log_info!("foreground sampling recovered after {consecutive_failures} failures");
                        }
                        consecutive_failures = 0;
                        handle_sample(&ctx, &mut tracker, &sample).await;
                    }
                    Err(err) => {
                        consecutive_failures += 1;
                        if consecutive_failures == FAILURE_WARN_THRESHOLD {
                            log_warn!("foreground sampling failing repeatedly: {err:#}");
                        } else {
                            log_debug!("no sample this tick: {err:#}");
                        }
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("sampling loop shutting down");
                break;
            }
        }
    }
}

async fn take_sample(ctx: &SamplingContext) -> Result<ActivitySample> {
    let observer = Arc::clone(&ctx.observer);
    let worker = tokio::task::spawn_blocking(move || observer.sample());

    match tokio::time::timeout(ctx.sample_timeout, worker).await {
        Ok(joined) => Ok(joined.context("observer worker join failed")??),
        Err(_) => {
            log_warn!(
                "foreground sample timeout (> {}ms)",
                ctx.sample_timeout.as_millis()
            );
            Err(anyhow!("foreground sample timed out"))
        }
    }
}

/// Feed one sample through the tracker, publish the stored target and, when
/// auto-recording, commit the transition to the task store.
pub async fn handle_sample(
    ctx: &SamplingContext,
    tracker: &mut FocusTracker,
    sample: &ActivitySample,
) -> Option<ActivityOutcome> {
    let event = tracker.observe(sample)?;
    ctx.focus_tx.send_replace(event.stored().cloned());

    let kind = match &event {
        FocusEvent::AppChanged { .. } => "app",
        FocusEvent::WindowChanged { .. } => "window",
    };
    log_debug!("focus {kind} change: {} / {}", sample.app, sample.window);

    if !ctx.auto_record {
        return None;
    }
    let target = event.stored()?;

    match ctx
        .store
        .record_activity(&target.app, &target.window, &ctx.resolver)
        .await
    {
        Ok(outcome) => {
            match &outcome {
                ActivityOutcome::Created(task) => log_info!("new task: {}", task.text),
                ActivityOutcome::Updated(task) => log_debug!("task moved: {}", task.text),
                ActivityOutcome::AlreadyTracked => {}
            }
            Some(outcome)
        }
        Err(err) => {
            log_error!("failed to record activity for {}: {err}", target.app);
            None
        }
    }
}
