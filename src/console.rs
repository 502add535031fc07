//! Line-oriented front end over stdin.

use std::fmt::Write as _;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::engine::Engine;
use crate::tasks::{ActivityOutcome, OrganizedView, Task};

const HELP: &str = "commands: add | toggle <n> | remove <n> | clear | archive | mode type|app | list | archived | stats | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add,
    Toggle(usize),
    Remove(usize),
    Clear,
    Archive,
    Mode(String),
    List,
    Archived,
    Stats,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, String> {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next();

        let index = |arg: Option<&str>| -> Result<usize, String> {
            arg.ok_or_else(|| format!("{name} needs a task number"))?
                .parse::<usize>()
                .map_err(|_| "task numbers start at 1".to_string())
                .and_then(|n| n.checked_sub(1).ok_or_else(|| "task numbers start at 1".to_string()))
        };

        match name.as_str() {
            "add" => Ok(Command::Add),
            "toggle" | "done" => index(arg).map(Command::Toggle),
            "remove" | "rm" => index(arg).map(Command::Remove),
            "clear" => Ok(Command::Clear),
            "archive" => Ok(Command::Archive),
            "mode" => Ok(Command::Mode(arg.unwrap_or_default().to_string())),
            "list" | "ls" | "" => Ok(Command::List),
            "archived" => Ok(Command::Archived),
            "stats" => Ok(Command::Stats),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command '{other}'; {HELP}")),
        }
    }
}

/// Run one command against the engine. Returns the text to show and whether
/// the session should end.
pub async fn execute(engine: &Engine, command: Command) -> (String, bool) {
    let output = match command {
        Command::Add => match engine.add_task().await {
            Ok(Some(ActivityOutcome::Created(task))) => format!("added: {}", task.text),
            Ok(Some(ActivityOutcome::Updated(task))) => format!("updated: {}", task.text),
            Ok(Some(ActivityOutcome::AlreadyTracked)) => match engine.current_focus() {
                Some(target) => format!("already tracking {} / {}", target.app, target.window),
                None => "already tracking".to_string(),
            },
            Ok(None) => "nothing to add yet: no application observed".to_string(),
            Err(err) => format!("error: {err}"),
        },
        Command::Toggle(index) => with_task(engine, index, |task| {
            engine.toggle_completion(task).map(|state| match state {
                Some(true) => format!("completed: {}", task.text),
                Some(false) => format!("reopened: {}", task.text),
                None => "task changed; list again".to_string(),
            })
        }),
        Command::Remove(index) => with_task(engine, index, |task| {
            engine.remove_task(task).map(|removed| {
                if removed {
                    format!("removed: {}", task.text)
                } else {
                    "task changed; list again".to_string()
                }
            })
        }),
        Command::Clear => match engine.clear_completed() {
            Ok(moved) => format!("archived {moved} completed tasks"),
            Err(err) => format!("error: {err}"),
        },
        Command::Archive => match engine.archive_all() {
            Ok(moved) => format!("archived {moved} tasks"),
            Err(err) => format!("error: {err}"),
        },
        Command::Mode(raw) => match raw.parse() {
            Ok(mode) => {
                engine.set_view_mode(mode);
                render_view(&engine.organized_view(mode), &engine.active_tasks())
            }
            Err(err) => err,
        },
        Command::List => render_view(
            &engine.organized_view(engine.view_mode()),
            &engine.active_tasks(),
        ),
        Command::Archived => render_list(&engine.archived_tasks()),
        Command::Stats => engine.stats().to_string(),
        Command::Help => HELP.to_string(),
        Command::Quit => return (String::new(), true),
    };
    (output, false)
}

fn with_task(
    engine: &Engine,
    index: usize,
    op: impl FnOnce(&Task) -> Result<String, crate::error::StoreError>,
) -> String {
    let tasks = engine.active_tasks();
    match tasks.get(index) {
        Some(task) => op(task).unwrap_or_else(|err| format!("error: {err}")),
        None => format!("no task {}; there are {}", index + 1, tasks.len()),
    }
}

fn marker(task: &Task) -> &'static str {
    if task.completed {
        "✓"
    } else {
        "○"
    }
}

// Numbers follow active-collection order so `toggle <n>` is stable across modes.
fn number_of(tasks: &[Task], task: &Task) -> usize {
    tasks.iter().position(|t| t == task).map_or(0, |i| i + 1)
}

pub fn render_view(view: &OrganizedView, tasks: &[Task]) -> String {
    let mut out = String::new();
    match view {
        OrganizedView::ByType(types) => {
            for group in types {
                let _ = writeln!(out, "{}", group.label);
                for app in &group.apps {
                    let _ = writeln!(out, "  {}", app.app_name);
                    for task in &app.tasks {
                        let _ = writeln!(out, "    [{}] {} {}", number_of(tasks, task), marker(task), task.text);
                    }
                }
            }
        }
        OrganizedView::ByApplication(apps) => {
            for app in apps {
                let _ = writeln!(out, "{}", app.app_name);
                for task in &app.tasks {
                    let _ = writeln!(out, "  [{}] {} {}", number_of(tasks, task), marker(task), task.text);
                }
            }
        }
    }
    let _ = write!(out, "{}", crate::tasks::TaskStats::of(tasks));
    out
}

fn render_list(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "archive is empty".to_string();
    }
    tasks
        .iter()
        .map(|t| format!("{} {} {} ({})", t.created_at, marker(t), t.text, t.app_name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read commands until EOF or `quit`.
pub async fn run_console<R>(engine: &Engine, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    println!("{HELP}");
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let (output, quit) = match Command::parse(&line) {
            Ok(command) => execute(engine, command).await,
            Err(err) => (err, false),
        };
        if quit {
            break;
        }
        println!("{output}");
    }
    Ok(())
}
