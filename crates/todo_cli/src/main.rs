//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `todo_core` wiring end to end.
//! - Act as a tiny view: send actions, reload the list on every change.
//! - Start file logging before anything else runs.
//!
//! Usage:
//! - `todo_cli` runs a scripted demo against an in-memory store.
//! - `todo_cli list|add <title>|toggle <id>|rm <id>` works on the store
//!   resolved from `TODO_DB_PATH`.
//! - Logs go to `TODO_LOG_DIR` (absolute), or `todo_logs` under the temp dir.

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use todo_core::{StoreConfig, TodoApp, TodoChange, TodoId};
use tokio::sync::mpsc;

const CHANGE_WAIT: Duration = Duration::from_secs(5);

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    println!("todo_core ping={}", todo_core::ping());
    println!("todo_core version={}", todo_core::core_version());

    if let Err(message) = start_logging(&todo_core::log_dir_from_env()) {
        eprintln!("error: {message}");
        return ExitCode::FAILURE;
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        None | Some("demo") => run_demo().await,
        Some(command) => run_command(command, &args[1..]).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn start_logging(log_dir: &Path) -> Result<(), String> {
    let level = todo_core::default_log_level();
    todo_core::init_logging(level.as_str(), &log_dir.to_string_lossy())
        .map_err(|err| format!("logging unavailable: {err}"))?;
    log::info!(
        "event=cli_start module=cli status=ok level={} log_dir={}",
        level.as_str(),
        log_dir.display()
    );
    Ok(())
}

async fn run_demo() -> Result<(), String> {
    let app = start_app(&StoreConfig::in_memory())?;
    let mut changes = watch_changes(&app);

    app.actions().create("write the design notes");
    await_change(&mut changes).await?;
    app.actions().create("review the store worker");
    await_change(&mut changes).await?;
    print_list(&app).await?;

    let first = newest_id(&app).await?;
    app.actions().toggle_completed(first);
    await_change(&mut changes).await?;
    print_list(&app).await?;

    app.actions().delete(first);
    await_change(&mut changes).await?;
    print_list(&app).await
}

async fn run_command(command: &str, rest: &[String]) -> Result<(), String> {
    let app = start_app(&StoreConfig::from_env())?;
    if let Some(reason) = app.store().init_error() {
        return Err(format!("store unavailable: {reason}"));
    }
    let mut changes = watch_changes(&app);

    match command {
        "list" => {}
        "add" => {
            let title = rest.join(" ");
            if title.trim().is_empty() {
                return Err("add needs a title".to_string());
            }
            app.actions().create(title);
            await_change(&mut changes).await?;
        }
        "toggle" => {
            app.actions().toggle_completed(parse_id(rest)?);
            await_change(&mut changes).await?;
        }
        "rm" => {
            app.actions().delete(parse_id(rest)?);
            await_change(&mut changes).await?;
        }
        other => return Err(format!("unknown command `{other}`")),
    }

    print_list(&app).await
}

fn start_app(config: &StoreConfig) -> Result<TodoApp, String> {
    TodoApp::start_current(config).map_err(|err| err.to_string())
}

fn watch_changes(app: &TodoApp) -> mpsc::UnboundedReceiver<TodoChange> {
    let (tx, rx) = mpsc::unbounded_channel();
    app.on_change(move |change| {
        let _ = tx.send(change);
    });
    rx
}

// Failed actions never notify, so a missing change is reported as a failure.
async fn await_change(changes: &mut mpsc::UnboundedReceiver<TodoChange>) -> Result<(), String> {
    match tokio::time::timeout(CHANGE_WAIT, changes.recv()).await {
        Ok(Some(change)) => {
            log::debug!("event=cli_change module=cli status=ok change={change:?}");
            Ok(())
        }
        Ok(None) => Err("change feed closed".to_string()),
        Err(_) => Err("action was not applied".to_string()),
    }
}

async fn print_list(app: &TodoApp) -> Result<(), String> {
    let records = app.store().list_all().await.map_err(|err| err.to_string())?;
    println!("--- {} item(s)", records.len());
    for record in records {
        let mark = if record.completed { "x" } else { " " };
        println!("[{mark}] {} {}", record.id, record.title);
    }
    Ok(())
}

async fn newest_id(app: &TodoApp) -> Result<TodoId, String> {
    app.store()
        .list_all()
        .await
        .map_err(|err| err.to_string())?
        .first()
        .map(|record| record.id)
        .ok_or_else(|| "list is empty".to_string())
}

fn parse_id(rest: &[String]) -> Result<TodoId, String> {
    let raw = rest.first().ok_or("missing item id")?;
    raw.parse::<TodoId>()
        .map_err(|err| format!("invalid item id `{raw}`: {err}"))
}
