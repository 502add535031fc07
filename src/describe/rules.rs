//! Data-driven description rules, evaluated top to bottom.

use crate::settings::lists_app;

/// Window-title fragments and the description they imply. Order matters:
/// the first fragment contained in the title wins.
const WINDOW_PATTERNS: &[(&str, &str)] = &[
    // mail and calendar
    ("Inbox", "📧 Checking new messages"),
    ("Draft", "📧 Composing email"),
    ("Sent", "📧 Reviewing sent items"),
    ("Calendar", "📅 Managing calendar"),
    // web apps
    ("mail.google.com", "📧 Using Gmail"),
    ("calendar.google.com", "📅 Using Calendar"),
    ("docs.google.com", "📝 Using Google Docs"),
    ("sheets.google.com", "📊 Using Google Sheets"),
    ("meet.google.com", "🎥 In Google Meet"),
    // documents
    (".doc", "📝 Editing document"),
    (".docx", "📝 Editing document"),
    (".xls", "📊 Working on spreadsheet"),
    (".xlsx", "📊 Working on spreadsheet"),
    (".ppt", "📊 Working on presentation"),
    (".pptx", "📊 Working on presentation"),
    (".pdf", "📄 Viewing document"),
    // source files
    (".py", "💻 Writing Python code"),
    (".js", "💻 Writing JavaScript code"),
    (".html", "💻 Writing HTML"),
    (".css", "💻 Writing CSS"),
    (".md", "📝 Writing documentation"),
];

pub const MESSAGING_DESCRIPTION: &str = "💬 Responding to conversation";

/// Phrasing used when an open task follows its application to a new window.
const REPHRASE_PREFIXES: &[(&str, &str)] = &[
    ("Microsoft Word", "Editing"),
    ("Microsoft Excel", "Working on"),
    ("Preview", "Viewing"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulePredicate {
    /// Case-insensitive substring of the window title. Stored lowercased.
    WindowContains(String),
    AppIn(Vec<String>),
}

impl RulePredicate {
    fn matches(&self, app: &str, window_lower: &str) -> bool {
        match self {
            RulePredicate::WindowContains(needle) => window_lower.contains(needle.as_str()),
            RulePredicate::AppIn(apps) => lists_app(apps, app),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionRule {
    pub predicate: RulePredicate,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<DescriptionRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<DescriptionRule>) -> Self {
        Self { rules }
    }

    /// Built-in window patterns followed by the messaging-app shortcut.
    pub fn standard(messaging_apps: &[String]) -> Self {
        let mut rules: Vec<DescriptionRule> = WINDOW_PATTERNS
            .iter()
            .map(|(needle, description)| DescriptionRule {
                predicate: RulePredicate::WindowContains(needle.to_lowercase()),
                description: (*description).to_string(),
            })
            .collect();

        rules.push(DescriptionRule {
            predicate: RulePredicate::AppIn(messaging_apps.to_vec()),
            description: MESSAGING_DESCRIPTION.to_string(),
        });

        Self { rules }
    }

    pub fn describe(&self, app: &str, window: &str) -> Option<&str> {
        let window_lower = window.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.predicate.matches(app, &window_lower))
            .map(|rule| rule.description.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Text for an open task whose application moved to a different window.
pub fn rephrase_for_window(app: &str, window: &str) -> String {
    match REPHRASE_PREFIXES.iter().find(|(name, _)| *name == app) {
        Some((_, prefix)) => format!("{prefix}: {window}"),
        None => format!("Using {app}: {window}"),
    }
}

/// Description used when the generator cannot be reached.
pub fn fallback_description(window: &str) -> String {
    format!("Working on: {window}")
}
