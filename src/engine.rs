use std::{path::Path, sync::Arc};

use anyhow::{anyhow, Result};
use log::info;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::describe::{DescriptionResolver, RuleTable, TextGenerator};
use crate::display::{refresh_loop, DisplaySnapshot};
use crate::error::StoreError;
use crate::sensing::{
    focus_channel, ActiveWindowObserver, FocusHandle, FocusTarget, FocusTracker, SamplingContext,
    SensingController,
};
use crate::settings::EngineSettings;
use crate::tasks::{
    organize, ActivityOutcome, JsonFilePersistence, OrganizedView, Task, TaskStats, TaskStore,
    ViewMode,
};

struct RefreshTask {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// The activity-to-task engine as seen by a front end.
///
/// Cloning is cheap; clones share the store, caches and background loops.
#[derive(Clone)]
pub struct Engine {
    settings: Arc<EngineSettings>,
    store: TaskStore,
    resolver: Arc<DescriptionResolver>,
    observer: Arc<dyn ActiveWindowObserver>,
    focus: FocusHandle,
    focus_tx: Arc<watch::Sender<Option<FocusTarget>>>,
    mode_tx: Arc<watch::Sender<ViewMode>>,
    view_tx: Arc<watch::Sender<DisplaySnapshot>>,
    sensing: Arc<Mutex<SensingController>>,
    refresh: Arc<Mutex<Option<RefreshTask>>>,
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        store: TaskStore,
        observer: Arc<dyn ActiveWindowObserver>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let resolver = DescriptionResolver::new(RuleTable::standard(&settings.messaging_apps), generator);
        let (focus_tx, focus) = focus_channel();
        let mode = settings.default_view;
        let (mode_tx, _) = watch::channel(mode);
        let (view_tx, _) = watch::channel(DisplaySnapshot::render(&store, mode));

        Self {
            settings: Arc::new(settings),
            store,
            resolver: Arc::new(resolver),
            observer,
            focus,
            focus_tx: Arc::new(focus_tx),
            mode_tx: Arc::new(mode_tx),
            view_tx: Arc::new(view_tx),
            sensing: Arc::new(Mutex::new(SensingController::new())),
            refresh: Arc::new(Mutex::new(None)),
        }
    }

    /// Engine whose task files live under `data_dir`.
    pub fn open(
        settings: EngineSettings,
        data_dir: &Path,
        observer: Arc<dyn ActiveWindowObserver>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let store = TaskStore::open(
            Box::new(JsonFilePersistence::new(settings.tasks_path(data_dir))),
            Box::new(JsonFilePersistence::new(settings.archive_path(data_dir))),
            settings.browser_apps.clone(),
        );
        Self::new(settings, store, observer, generator)
    }

    /// Start the sampling and refresh loops.
    pub async fn start(&self) -> Result<()> {
        let ctx = SamplingContext {
            observer: Arc::clone(&self.observer),
            store: self.store.clone(),
            resolver: Arc::clone(&self.resolver),
            focus_tx: Arc::clone(&self.focus_tx),
            interval: Duration::from_millis(self.settings.sample_interval_ms),
            sample_timeout: Duration::from_millis(self.settings.sample_timeout_ms),
            auto_record: self.settings.auto_record,
        };
        let tracker = FocusTracker::new(self.settings.self_apps.clone());
        self.sensing.lock().await.start_sensing(ctx, tracker)?;

        let mut refresh = self.refresh.lock().await;
        if refresh.is_some() {
            return Err(anyhow!("refresh loop already running"));
        }
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(refresh_loop(
            self.store.clone(),
            self.mode_tx.subscribe(),
            Arc::clone(&self.view_tx),
            Duration::from_millis(self.settings.refresh_interval_ms),
            cancel_token.clone(),
        ));
        *refresh = Some(RefreshTask {
            handle,
            cancel_token,
        });

        info!("Engine started");
        Ok(())
    }

    /// Stop both loops and wait for them to exit.
    pub async fn shutdown(&self) -> Result<()> {
        self.sensing.lock().await.stop_sensing().await?;

        if let Some(task) = self.refresh.lock().await.take() {
            task.cancel_token.cancel();
            task.handle.await?;
        }
        info!("Engine stopped");
        Ok(())
    }

    pub fn active_tasks(&self) -> Vec<Task> {
        self.store.active_tasks()
    }

    pub fn archived_tasks(&self) -> Vec<Task> {
        self.store.archived_tasks()
    }

    pub fn stats(&self) -> TaskStats {
        self.store.stats()
    }

    /// Most recent target outside this tool.
    pub fn current_focus(&self) -> Option<FocusTarget> {
        self.focus.current()
    }

    pub async fn record_activity(&self, app: &str, window: &str) -> Result<ActivityOutcome, StoreError> {
        self.store.record_activity(app, window, &self.resolver).await
    }

    /// Track whatever the user was last doing outside this tool, under the
    /// same one-open-task-per-application rule as automatic recording.
    /// `None` when nothing has been observed yet.
    pub async fn add_task(&self) -> Result<Option<ActivityOutcome>, StoreError> {
        let Some(target) = self.focus.current() else {
            return Ok(None);
        };
        self.record_activity(&target.app, &target.window)
            .await
            .map(Some)
    }

    pub fn toggle_completion(&self, task: &Task) -> Result<Option<bool>, StoreError> {
        self.store.toggle_completion(task)
    }

    pub fn remove_task(&self, task: &Task) -> Result<bool, StoreError> {
        self.store.remove_task(task)
    }

    pub fn clear_completed(&self) -> Result<usize, StoreError> {
        self.store.clear_completed()
    }

    pub fn archive_all(&self) -> Result<usize, StoreError> {
        self.store.archive_all()
    }

    pub fn organized_view(&self, mode: ViewMode) -> OrganizedView {
        organize(&self.store.active_tasks(), mode)
    }

    pub fn view_mode(&self) -> ViewMode {
        *self.mode_tx.borrow()
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        self.mode_tx.send_replace(mode);
    }

    /// Latest snapshot published by the refresh loop.
    pub fn latest_snapshot(&self) -> DisplaySnapshot {
        self.view_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplaySnapshot> {
        self.view_tx.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn publish_focus(&self, target: FocusTarget) {
        self.focus_tx.send_replace(Some(target));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::resolver::testing::CountingGenerator;
    use crate::error::ObserverError;
    use crate::sensing::ActivitySample;

    struct Unavailable;

    impl ActiveWindowObserver for Unavailable {
        fn sample(&self) -> Result<ActivitySample, ObserverError> {
            Err(ObserverError::Unavailable("test".into()))
        }
    }

    fn engine(dir: &Path) -> Engine {
        Engine::open(
            EngineSettings::default(),
            dir,
            Arc::new(Unavailable),
            Arc::new(CountingGenerator::default()),
        )
    }

    #[tokio::test]
    async fn manual_add_needs_a_focus_target() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        assert_eq!(engine.add_task().await.unwrap(), None);

        engine.publish_focus(FocusTarget {
            app: "Microsoft Word".into(),
            window: "report.docx".into(),
        });
        let Some(ActivityOutcome::Created(task)) = engine.add_task().await.unwrap() else {
            panic!("expected a new task");
        };
        assert_eq!(task.text, "📝 Editing document");
        assert_eq!(task.app_name, "Microsoft Word");
        assert_eq!(
            engine.add_task().await.unwrap(),
            Some(ActivityOutcome::AlreadyTracked)
        );
        assert_eq!(engine.stats().total, 1);
    }

    #[tokio::test]
    async fn manual_add_keeps_one_open_task_per_application() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());

        for window in ["A.swift", "B.swift"] {
            engine.publish_focus(FocusTarget {
                app: "Xcode".into(),
                window: window.into(),
            });
            engine.add_task().await.unwrap();
        }

        let tasks = engine.active_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].window_name, "B.swift");
        assert_eq!(tasks[0].text, "Using Xcode: B.swift");
    }

    #[tokio::test]
    async fn manual_add_racing_the_sampler_creates_one_task() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(CountingGenerator::slow(Duration::from_millis(50)));
        let engine = Engine::open(
            EngineSettings::default(),
            dir.path(),
            Arc::new(Unavailable),
            generator.clone(),
        );
        engine.publish_focus(FocusTarget {
            app: "Figma".into(),
            window: "Onboarding".into(),
        });

        let (sampled, added) = tokio::join!(
            engine.record_activity("Figma", "Onboarding"),
            engine.add_task()
        );
        let mut outcomes = vec![sampled.unwrap(), added.unwrap().unwrap()];
        outcomes.sort_by_key(|o| matches!(o, ActivityOutcome::AlreadyTracked));
        assert!(matches!(outcomes[0], ActivityOutcome::Created(_)));
        assert_eq!(outcomes[1], ActivityOutcome::AlreadyTracked);

        assert_eq!(engine.active_tasks().len(), 1);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn start_twice_is_rejected_and_shutdown_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.start().await.unwrap();
        assert!(engine.start().await.is_err());
        engine.shutdown().await.unwrap();
        // Stopping again is a no-op.
        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn view_mode_switch_reaches_the_refresh_loop() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.record_activity("Mail", "Inbox").await.unwrap();
        let mut views = engine.subscribe();
        engine.start().await.unwrap();

        engine.set_view_mode(ViewMode::ByApplication);
        let snapshot = loop {
            views.changed().await.unwrap();
            let snapshot = views.borrow_and_update().clone();
            if snapshot.mode == ViewMode::ByApplication {
                break snapshot;
            }
        };
        engine.shutdown().await.unwrap();

        assert_eq!(engine.view_mode(), ViewMode::ByApplication);
        assert_eq!(snapshot.stats.total, 1);
        assert_eq!(snapshot.view, engine.organized_view(ViewMode::ByApplication));
        assert_eq!(engine.latest_snapshot().mode, ViewMode::ByApplication);
    }
}
