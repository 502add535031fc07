use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info};

use crate::describe::rules::rephrase_for_window;
use crate::describe::DescriptionResolver;
use crate::error::StoreError;
use crate::settings::lists_app;

use super::models::{Task, TaskStats};
use super::persistence::TaskPersistence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Open task for the same application and window.
    Exact,
    /// Open task for the same non-browser application, different window.
    SameApp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    AlreadyTracked,
    /// An open task followed its application to the new window.
    Updated(Task),
    Created(Task),
}

struct Collections {
    active: Vec<Task>,
    archive: Vec<Task>,
}

struct StoreInner {
    state: Mutex<Collections>,
    active_file: Box<dyn TaskPersistence>,
    archive_file: Box<dyn TaskPersistence>,
    browser_apps: Vec<String>,
}

/// Owner of the active and archived task collections.
///
/// Every mutation runs under one lock covering both collections and writes
/// the touched collections before the lock is released. Description lookups
/// happen outside the lock.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<StoreInner>,
}

impl TaskStore {
    pub fn open(
        active_file: Box<dyn TaskPersistence>,
        archive_file: Box<dyn TaskPersistence>,
        browser_apps: Vec<String>,
    ) -> Self {
        let active = active_file.load();
        let archive = archive_file.load();
        info!(
            "Task store opened with {} active and {} archived tasks",
            active.len(),
            archive.len()
        );

        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(Collections { active, archive }),
                active_file,
                archive_file,
                browser_apps,
            }),
        }
    }

    fn is_browser(&self, app: &str) -> bool {
        lists_app(&self.inner.browser_apps, app)
    }

    pub fn active_tasks(&self) -> Vec<Task> {
        self.lock().active.clone()
    }

    pub fn archived_tasks(&self) -> Vec<Task> {
        self.lock().archive.clone()
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats::of(&self.lock().active)
    }

    /// The open task an activity on `(app, window)` would land on, if any.
    pub fn match_existing(&self, app: &str, window: &str) -> Option<(Task, MatchKind)> {
        let state = self.lock();
        self.match_index(&state.active, app, window)
            .map(|(index, kind)| (state.active[index].clone(), kind))
    }

    /// Track activity on `(app, window)`, updating or creating a task so that
    /// each application (each window, for browsers) has one open task. Used
    /// by the sampling loop and by manual adds alike.
    pub async fn record_activity(
        &self,
        app: &str,
        window: &str,
        resolver: &DescriptionResolver,
    ) -> Result<ActivityOutcome, StoreError> {
        {
            let mut state = self.lock();
            if let Some(outcome) = self.apply_existing(&mut state, app, window)? {
                return Ok(outcome);
            }
        }

        let text = resolver.resolve(app, window).await;

        let mut state = self.lock();
        // Another caller may have tracked this pair while we were resolving.
        if let Some(outcome) = self.apply_existing(&mut state, app, window)? {
            return Ok(outcome);
        }

        let task = Task::new(text, app.to_string(), window.to_string());
        state.active.push(task.clone());
        info!("Tracking new task for {app}: {}", task.text);
        self.save_active(&state)?;
        Ok(ActivityOutcome::Created(task))
    }

    /// Flip the completion flag of the first active task equal to `task`.
    ///
    /// Completing a task appends a copy to the archive but leaves it in the
    /// active collection until `clear_completed` or `archive_all` runs.
    /// Returns the new flag, or `None` if no such task is active.
    pub fn toggle_completion(&self, task: &Task) -> Result<Option<bool>, StoreError> {
        let mut state = self.lock();
        let Some(index) = state.active.iter().position(|t| t == task) else {
            return Ok(None);
        };

        let completed = !state.active[index].completed;
        state.active[index].completed = completed;

        if completed {
            let copy = state.active[index].clone();
            state.archive.push(copy);
            self.persist_both(&state)?;
        } else {
            self.save_active(&state)?;
        }
        Ok(Some(completed))
    }

    /// Drop the first active task equal to `task` without archiving it.
    pub fn remove_task(&self, task: &Task) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(index) = state.active.iter().position(|t| t == task) else {
            return Ok(false);
        };
        state.active.remove(index);
        self.save_active(&state)?;
        Ok(true)
    }

    /// Move completed tasks to the archive. Returns how many moved.
    pub fn clear_completed(&self) -> Result<usize, StoreError> {
        let mut state = self.lock();
        let (completed, open): (Vec<Task>, Vec<Task>) = std::mem::take(&mut state.active)
            .into_iter()
            .partition(|t| t.completed);

        let moved = completed.len();
        state.archive.extend(completed);
        state.active = open;
        info!("Cleared {moved} completed tasks into the archive");
        self.persist_both(&state)?;
        Ok(moved)
    }

    /// Move every active task to the archive. Returns how many moved.
    pub fn archive_all(&self) -> Result<usize, StoreError> {
        let mut state = self.lock();
        let all = std::mem::take(&mut state.active);
        let moved = all.len();
        state.archive.extend(all);
        info!("Archived all {moved} active tasks");
        self.persist_both(&state)?;
        Ok(moved)
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn match_index(&self, tasks: &[Task], app: &str, window: &str) -> Option<(usize, MatchKind)> {
        if let Some(index) = tasks.iter().position(|t| t.is_open_for(app, window)) {
            return Some((index, MatchKind::Exact));
        }
        if self.is_browser(app) {
            return None;
        }
        tasks
            .iter()
            .position(|t| t.is_open_for_app(app))
            .map(|index| (index, MatchKind::SameApp))
    }

    fn apply_existing(
        &self,
        state: &mut Collections,
        app: &str,
        window: &str,
    ) -> Result<Option<ActivityOutcome>, StoreError> {
        match self.match_index(&state.active, app, window) {
            Some((_, MatchKind::Exact)) => Ok(Some(ActivityOutcome::AlreadyTracked)),
            Some((index, MatchKind::SameApp)) => {
                let task = &mut state.active[index];
                task.window_name = window.to_string();
                task.text = rephrase_for_window(app, window);
                let updated = task.clone();
                debug!("Moved open {app} task to window {window}");
                self.save_active(state)?;
                Ok(Some(ActivityOutcome::Updated(updated)))
            }
            None => Ok(None),
        }
    }

    fn save_active(&self, state: &Collections) -> Result<(), StoreError> {
        self.inner.active_file.save(&state.active).map_err(|err| {
            error!("Failed to persist active tasks: {err}");
            err
        })
    }

    fn save_archive(&self, state: &Collections) -> Result<(), StoreError> {
        self.inner.archive_file.save(&state.archive).map_err(|err| {
            error!("Failed to persist archive: {err}");
            err
        })
    }

    // Attempt both writes even if the first fails.
    fn persist_both(&self, state: &Collections) -> Result<(), StoreError> {
        let archive = self.save_archive(state);
        let active = self.save_active(state);
        archive.and(active)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::describe::resolver::testing::CountingGenerator;
    use crate::describe::RuleTable;

    /// In-memory collection whose writes can be made to fail.
    #[derive(Default)]
    struct MemoryFile {
        saved: Mutex<Vec<Task>>,
        fail: AtomicBool,
    }

    impl TaskPersistence for Arc<MemoryFile> {
        fn load(&self) -> Vec<Task> {
            self.saved.lock().unwrap().clone()
        }

        fn save(&self, tasks: &[Task]) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Io {
                    path: "memory".into(),
                    source: std::io::Error::other("disk full"),
                });
            }
            *self.saved.lock().unwrap() = tasks.to_vec();
            Ok(())
        }
    }

    struct Fixture {
        store: TaskStore,
        active: Arc<MemoryFile>,
        archive: Arc<MemoryFile>,
        resolver: DescriptionResolver,
        generator: Arc<CountingGenerator>,
    }

    fn fixture() -> Fixture {
        let active = Arc::new(MemoryFile::default());
        let archive = Arc::new(MemoryFile::default());
        let store = TaskStore::open(
            Box::new(active.clone()),
            Box::new(archive.clone()),
            vec!["Safari".to_string()],
        );
        let generator = Arc::new(CountingGenerator::default());
        let resolver = DescriptionResolver::new(
            RuleTable::standard(&["Slack".to_string()]),
            generator.clone(),
        );
        Fixture {
            store,
            active,
            archive,
            resolver,
            generator,
        }
    }

    #[tokio::test]
    async fn repeated_activity_keeps_one_task() {
        let f = fixture();
        let first = f.store.record_activity("Mail", "Inbox", &f.resolver).await.unwrap();
        let second = f.store.record_activity("Mail", "Inbox", &f.resolver).await.unwrap();

        assert!(matches!(first, ActivityOutcome::Created(_)));
        assert_eq!(second, ActivityOutcome::AlreadyTracked);

        let tasks = f.store.active_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].app_name, "Mail");
        assert_eq!(tasks[0].window_name, "Inbox");
        assert_eq!(tasks[0].text, "📧 Checking new messages");
        assert!(!tasks[0].completed);
        assert_eq!(*f.active.saved.lock().unwrap(), tasks);
    }

    #[tokio::test]
    async fn non_browser_task_follows_its_window() {
        let f = fixture();
        f.store.record_activity("Preview", "A.pdf", &f.resolver).await.unwrap();
        let outcome = f.store.record_activity("Preview", "B.pdf", &f.resolver).await.unwrap();

        let tasks = f.store.active_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].window_name, "B.pdf");
        assert_eq!(tasks[0].text, "Viewing: B.pdf");
        assert_eq!(outcome, ActivityOutcome::Updated(tasks[0].clone()));
        assert_eq!(f.active.saved.lock().unwrap()[0].text, "Viewing: B.pdf");
    }

    #[tokio::test]
    async fn browser_windows_are_tracked_separately() {
        let f = fixture();
        f.store.record_activity("Safari", "Docs", &f.resolver).await.unwrap();
        f.store.record_activity("Safari", "News", &f.resolver).await.unwrap();
        f.store.record_activity("Safari", "Docs", &f.resolver).await.unwrap();

        let windows: Vec<String> = f
            .store
            .active_tasks()
            .into_iter()
            .map(|t| t.window_name)
            .collect();
        assert_eq!(windows, vec!["Docs", "News"]);
        assert_eq!(f.generator.calls(), 2);
    }

    #[tokio::test]
    async fn match_existing_reports_kind() {
        let f = fixture();
        f.store.record_activity("Xcode", "App.swift", &f.resolver).await.unwrap();
        f.store.record_activity("Safari", "Docs", &f.resolver).await.unwrap();

        assert_eq!(
            f.store.match_existing("Xcode", "App.swift").map(|(_, k)| k),
            Some(MatchKind::Exact)
        );
        assert_eq!(
            f.store.match_existing("Xcode", "Other.swift").map(|(_, k)| k),
            Some(MatchKind::SameApp)
        );
        assert!(f.store.match_existing("Safari", "News").is_none());
        assert!(f.store.match_existing("Figma", "x").is_none());
    }

    #[tokio::test]
    async fn completed_tasks_do_not_match() {
        let f = fixture();
        f.store.record_activity("Xcode", "App.swift", &f.resolver).await.unwrap();
        let task = f.store.active_tasks()[0].clone();
        f.store.toggle_completion(&task).unwrap();

        let outcome = f.store.record_activity("Xcode", "App.swift", &f.resolver).await.unwrap();
        assert!(matches!(outcome, ActivityOutcome::Created(_)));
        assert_eq!(f.store.stats(), TaskStats { total: 2, active: 1, completed: 1 });
    }

    #[tokio::test]
    async fn completing_copies_to_archive_but_keeps_task_active() {
        let f = fixture();
        f.store.record_activity("Mail", "Inbox", &f.resolver).await.unwrap();
        let task = f.store.active_tasks()[0].clone();

        assert_eq!(f.store.toggle_completion(&task).unwrap(), Some(true));

        // Known inconsistency: the task is both active (completed) and archived.
        let active = f.store.active_tasks();
        let archived = f.store.archived_tasks();
        assert_eq!(active.len(), 1);
        assert!(active[0].completed);
        assert_eq!(archived, active);
        assert_eq!(*f.archive.saved.lock().unwrap(), archived);

        // Reopening does not pull the archive copy back out.
        assert_eq!(f.store.toggle_completion(&active[0]).unwrap(), Some(false));
        assert_eq!(f.store.archived_tasks().len(), 1);
        assert!(!f.store.active_tasks()[0].completed);
    }

    #[tokio::test]
    async fn toggling_an_unknown_task_is_a_no_op() {
        let f = fixture();
        let stranger = Task::new("x".into(), "Nope".into(), "w".into());
        assert_eq!(f.store.toggle_completion(&stranger).unwrap(), None);
        assert!(!f.store.remove_task(&stranger).unwrap());
    }

    #[tokio::test]
    async fn clear_completed_moves_exactly_the_completed_tasks() {
        let f = fixture();
        for app in ["A", "B", "C"] {
            f.store.record_activity(app, "w", &f.resolver).await.unwrap();
        }
        let tasks = f.store.active_tasks();
        f.store.toggle_completion(&tasks[0]).unwrap();
        f.store.toggle_completion(&tasks[2]).unwrap();
        let archived_before = f.store.archived_tasks().len();

        assert_eq!(f.store.clear_completed().unwrap(), 2);

        let active = f.store.active_tasks();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].app_name, "B");
        assert!(active.iter().all(|t| !t.completed));

        let archived = f.store.archived_tasks();
        assert_eq!(archived.len(), archived_before + 2);
        assert_eq!(archived[archived_before].app_name, "A");
        assert_eq!(archived[archived_before + 1].app_name, "C");
        assert_eq!(*f.active.saved.lock().unwrap(), active);
        assert_eq!(*f.archive.saved.lock().unwrap(), archived);
    }

    #[tokio::test]
    async fn archive_all_empties_active() {
        let f = fixture();
        for app in ["A", "B"] {
            f.store.record_activity(app, "w", &f.resolver).await.unwrap();
        }
        assert_eq!(f.store.archive_all().unwrap(), 2);
        assert!(f.store.active_tasks().is_empty());
        assert_eq!(f.store.archived_tasks().len(), 2);
        assert!(f.active.saved.lock().unwrap().is_empty());

        assert_eq!(f.store.archive_all().unwrap(), 0);
        assert_eq!(f.store.archived_tasks().len(), 2);
    }

    #[tokio::test]
    async fn remove_task_skips_the_archive() {
        let f = fixture();
        f.store.record_activity("Mail", "Inbox", &f.resolver).await.unwrap();
        let task = f.store.active_tasks()[0].clone();
        assert!(f.store.remove_task(&task).unwrap());
        assert!(f.store.active_tasks().is_empty());
        assert!(f.store.archived_tasks().is_empty());
    }

    #[tokio::test]
    async fn write_failures_surface_but_memory_stays_authoritative() {
        let f = fixture();
        f.active.fail.store(true, Ordering::SeqCst);

        let err = f.store.record_activity("Mail", "Inbox", &f.resolver).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert_eq!(f.store.active_tasks().len(), 1);

        f.active.fail.store(false, Ordering::SeqCst);
        f.archive.fail.store(true, Ordering::SeqCst);
        assert!(f.store.archive_all().is_err());
        assert!(f.store.active_tasks().is_empty());
        // The active write still went through.
        assert!(f.active.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopening_loads_persisted_collections() {
        let f = fixture();
        f.store.record_activity("Mail", "Inbox", &f.resolver).await.unwrap();
        f.store.record_activity("Xcode", "App.swift", &f.resolver).await.unwrap();
        let task = f.store.active_tasks()[0].clone();
        f.store.toggle_completion(&task).unwrap();

        let reopened = TaskStore::open(
            Box::new(f.active.clone()),
            Box::new(f.archive.clone()),
            Vec::new(),
        );
        assert_eq!(reopened.active_tasks(), f.store.active_tasks());
        assert_eq!(reopened.archived_tasks(), f.store.archived_tasks());
    }
}
