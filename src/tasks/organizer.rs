use serde::{Deserialize, Serialize};

use super::models::Task;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    ByType,
    ByApplication,
}

impl std::str::FromStr for ViewMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "type" | "by_type" => Ok(ViewMode::ByType),
            "app" | "application" | "by_application" => Ok(ViewMode::ByApplication),
            other => Err(format!("unknown view mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppGroup {
    pub app_name: String,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TypeGroup {
    pub label: String,
    pub apps: Vec<AppGroup>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "mode", content = "groups", rename_all = "snake_case")]
pub enum OrganizedView {
    ByType(Vec<TypeGroup>),
    ByApplication(Vec<AppGroup>),
}

impl OrganizedView {
    pub fn is_empty(&self) -> bool {
        match self {
            OrganizedView::ByType(groups) => groups.is_empty(),
            OrganizedView::ByApplication(groups) => groups.is_empty(),
        }
    }
}

/// Text before the first colon, trimmed. Texts without a colon are their own type.
pub fn type_label(text: &str) -> &str {
    text.split(':').next().unwrap_or(text).trim()
}

/// Group tasks for display. Groups keep first-appearance order; within a
/// group open tasks come before completed ones, otherwise in input order.
pub fn organize(tasks: &[Task], mode: ViewMode) -> OrganizedView {
    match mode {
        ViewMode::ByApplication => OrganizedView::ByApplication(group_by_app(tasks.iter())),
        ViewMode::ByType => {
            let mut types: Vec<(String, Vec<&Task>)> = Vec::new();
            for task in tasks {
                let label = type_label(&task.text);
                match types.iter_mut().find(|(l, _)| l.as_str() == label) {
                    Some((_, members)) => members.push(task),
                    None => types.push((label.to_string(), vec![task])),
                }
            }

            OrganizedView::ByType(
                types
                    .into_iter()
                    .map(|(label, members)| TypeGroup {
                        label,
                        apps: group_by_app(members.into_iter()),
                    })
                    .collect(),
            )
        }
    }
}

fn group_by_app<'a>(tasks: impl Iterator<Item = &'a Task>) -> Vec<AppGroup> {
    let mut groups: Vec<AppGroup> = Vec::new();
    for task in tasks {
        match groups.iter_mut().find(|g| g.app_name == task.app_name) {
            Some(group) => group.tasks.push(task.clone()),
            None => groups.push(AppGroup {
                app_name: task.app_name.clone(),
                tasks: vec![task.clone()],
            }),
        }
    }

    for group in &mut groups {
        // sort_by_key is stable
        group.tasks.sort_by_key(|t| t.completed);
    }
    groups
}
