use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::tasks::{organize, OrganizedView, TaskStats, TaskStore, ViewMode};

// Set to false to silence this module's per-tick logging
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// What the presentation layer draws on each refresh.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DisplaySnapshot {
    pub mode: ViewMode,
    pub view: OrganizedView,
    pub stats: TaskStats,
    pub refreshed_at: DateTime<Utc>,
}

impl DisplaySnapshot {
    pub fn render(store: &TaskStore, mode: ViewMode) -> Self {
        let tasks = store.active_tasks();
        Self {
            mode,
            view: organize(&tasks, mode),
            stats: TaskStats::of(&tasks),
            refreshed_at: Utc::now(),
        }
    }
}

/// Re-derive the display snapshot from the store on a fixed period, and
/// right away when the view mode changes.
pub async fn refresh_loop(
    store: TaskStore,
    mut mode_rx: watch::Receiver<ViewMode>,
    view_tx: Arc<watch::Sender<DisplaySnapshot>>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut mode_open = true;

    log_info!("refresh loop started ({}ms period)", interval.as_millis());

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = mode_rx.changed(), if mode_open => {
                if changed.is_err() {
                    mode_open = false;
                    continue;
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("refresh loop shutting down");
                break;
            }
        }

        let mode = *mode_rx.borrow_and_update();
        let snapshot = DisplaySnapshot::render(&store, mode);
        log_debug!("refreshed view: {}", snapshot.stats);
        view_tx.send_replace(snapshot);
    }
}
