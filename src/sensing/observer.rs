use std::process::Command;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ObserverError;

pub const UNKNOWN_WINDOW: &str = "Unknown Window";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivitySample {
    pub app: String,
    pub window: String,
    pub observed_at: DateTime<Utc>,
}

impl ActivitySample {
    pub fn new(app: impl Into<String>, window: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            window: window.into(),
            observed_at: Utc::now(),
        }
    }
}

/// Source of the current foreground application and window title.
///
/// Calls may block; the sampling loop runs them on the blocking pool.
pub trait ActiveWindowObserver: Send + Sync {
    fn sample(&self) -> Result<ActivitySample, ObserverError>;
}

/// Reads the frontmost process and its front window through `osascript`.
pub struct AppleScriptObserver;

const FRONT_APP_SCRIPT: &str =
    "tell application \"System Events\" to get name of first process whose frontmost is true";

fn front_window_script(app: &str) -> String {
    let escaped = app.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        r#"tell application "{escaped}"
    if it is running then
        try
            return name of front window
        on error
            return "{UNKNOWN_WINDOW}"
        end try
    end if
end tell"#
    )
}

fn run_osascript(script: &str) -> Result<String, ObserverError> {
    let output = Command::new("osascript")
        .args(["-e", script])
        .output()
        .map_err(|err| ObserverError::Unavailable(format!("failed to spawn osascript: {err}")))?;

    if !output.status.success() {
        return Err(ObserverError::Unavailable(format!(
            "osascript exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

impl ActiveWindowObserver for AppleScriptObserver {
    fn sample(&self) -> Result<ActivitySample, ObserverError> {
        let app = run_osascript(FRONT_APP_SCRIPT)?;
        if app.is_empty() {
            return Err(ObserverError::Unavailable("no frontmost process".into()));
        }

        let window = match run_osascript(&front_window_script(&app)) {
            Ok(window) => window,
            Err(err) => {
                log::debug!("front window query for {app} failed: {err}");
                UNKNOWN_WINDOW.to_string()
            }
        };

        Ok(ActivitySample::new(app, window))
    }
}
