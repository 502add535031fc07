use serde::Serialize;
use tokio::sync::watch;

use super::observer::ActivitySample;
use crate::settings::lists_app;

/// An application and window the user was working in.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FocusTarget {
    pub app: String,
    pub window: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusEvent {
    AppChanged { stored: Option<FocusTarget> },
    WindowChanged { stored: Option<FocusTarget> },
}

impl FocusEvent {
    pub fn stored(&self) -> Option<&FocusTarget> {
        match self {
            FocusEvent::AppChanged { stored } | FocusEvent::WindowChanged { stored } => {
                stored.as_ref()
            }
        }
    }
}

/// Read side of the stored focus target published by the sampling loop.
#[derive(Clone)]
pub struct FocusHandle {
    rx: watch::Receiver<Option<FocusTarget>>,
}

impl FocusHandle {
    pub fn current(&self) -> Option<FocusTarget> {
        self.rx.borrow().clone()
    }
}

pub fn focus_channel() -> (watch::Sender<Option<FocusTarget>>, FocusHandle) {
    let (tx, rx) = watch::channel(None);
    (tx, FocusHandle { rx })
}

/// Follows the foreground application across samples.
///
/// `last_*` mirrors whatever was in front at the previous sample. The stored
/// target only moves for applications outside `self_apps`, so focusing this
/// tool (or the terminal running it) keeps the previous target.
#[derive(Debug, Default)]
pub struct FocusTracker {
    self_apps: Vec<String>,
    last_app: Option<String>,
    last_window: Option<String>,
    stored_app: Option<String>,
    stored_window: Option<String>,
}

impl FocusTracker {
    pub fn new(self_apps: Vec<String>) -> Self {
        Self {
            self_apps,
            ..Self::default()
        }
    }

    pub fn observe(&mut self, sample: &ActivitySample) -> Option<FocusEvent> {
        if sample.app.is_empty() {
            return None;
        }
        let is_self = lists_app(&self.self_apps, &sample.app);

        if self.last_app.as_deref() != Some(sample.app.as_str()) {
            self.last_app = Some(sample.app.clone());
            self.last_window = Some(sample.window.clone());
            if !is_self {
                self.stored_app = Some(sample.app.clone());
                self.stored_window = Some(sample.window.clone());
            }
            return Some(FocusEvent::AppChanged {
                stored: self.stored(),
            });
        }

        if self.last_window.as_deref() != Some(sample.window.as_str()) {
            self.last_window = Some(sample.window.clone());
            if !is_self {
                self.stored_window = Some(sample.window.clone());
            }
            return Some(FocusEvent::WindowChanged {
                stored: self.stored(),
            });
        }

        None
    }

    /// The most recent target outside this tool, once one has been seen.
    pub fn stored(&self) -> Option<FocusTarget> {
        match (&self.stored_app, &self.stored_window) {
            (Some(app), Some(window)) => Some(FocusTarget {
                app: app.clone(),
                window: window.clone(),
            }),
            _ => None,
        }
    }

    #[cfg(test)]
    fn last_app(&self) -> Option<&str> {
        self.last_app.as_deref()
    }
}
