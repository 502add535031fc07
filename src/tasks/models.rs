use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub text: String,
    pub completed: bool,
    #[serde(with = "created_at_format")]
    pub created_at: NaiveDateTime,
    /// Preserved for file compatibility. Nothing sets it, so it does not
    /// tell automatic tasks apart from manual ones.
    pub auto_tracked: bool,
    pub app_name: String,
    pub window_name: String,
}

impl Task {
    pub fn new(text: String, app_name: String, window_name: String) -> Self {
        Self {
            text,
            completed: false,
            created_at: now_seconds(),
            auto_tracked: false,
            app_name,
            window_name,
        }
    }

    pub fn is_open_for(&self, app: &str, window: &str) -> bool {
        !self.completed && self.app_name == app && self.window_name == window
    }

    pub fn is_open_for_app(&self, app: &str) -> bool {
        !self.completed && self.app_name == app
    }
}

/// Counts over the active collection.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

impl TaskStats {
    pub fn of(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|t| t.completed).count();
        Self {
            total: tasks.len(),
            active: tasks.len() - completed,
            completed,
        }
    }
}

impl std::fmt::Display for TaskStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Total tasks: {} | Active: {} | Completed: {}",
            self.total, self.active, self.completed
        )
    }
}

// Stored timestamps have whole-second precision, so truncate at creation to
// keep in-memory tasks equal to their reloaded copies.
fn now_seconds() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

mod created_at_format {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_snake_case_fields_and_local_timestamp() {
        let mut task = Task::new("📄 Viewing document".into(), "Preview".into(), "a.pdf".into());
        task.created_at =
            NaiveDateTime::parse_from_str("2024-03-01 09:15:00", "%Y-%m-%d %H:%M:%S").unwrap();

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["created_at"], "2024-03-01 09:15:00");
        assert_eq!(value["app_name"], "Preview");
        assert_eq!(value["window_name"], "a.pdf");
        assert_eq!(value["auto_tracked"], false);
        assert_eq!(value.as_object().unwrap().len(), 6);

        let back: Task = serde_json::from_value(value).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn new_tasks_are_open_and_manual() {
        let task = Task::new("x".into(), "Mail".into(), "Inbox".into());
        assert!(!task.completed);
        assert!(!task.auto_tracked);
        assert_eq!(task.created_at.nanosecond(), 0);
        assert!(task.is_open_for("Mail", "Inbox"));
        assert!(task.is_open_for_app("Mail"));
        assert!(!task.is_open_for("Mail", "Drafts"));
    }

    #[test]
    fn stats_split_active_and_completed() {
        let mut done = Task::new("a".into(), "A".into(), "1".into());
        done.completed = true;
        let open = Task::new("b".into(), "B".into(), "2".into());

        let stats = TaskStats::of(&[done, open]);
        assert_eq!(
            stats,
            TaskStats {
                total: 2,
                active: 1,
                completed: 1
            }
        );
        assert_eq!(stats.to_string(), "Total tasks: 2 | Active: 1 | Completed: 1");
    }
}
