// revgrid CLI - browse and restore the version history of a spreadsheet
// stored in a JSON history file

mod exit_codes;
mod history_file;
mod inline_rows;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use exit_codes::{
    history_exit_code, status_exit_code, EXIT_IO, EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE,
};
use history_file::{FileBackend, HistoryFile};
use inline_rows::InlineRows;
use revgrid_config::{HistorySettings, SettingsError};
use revgrid_history::{BackendError, HistoryError, HistorySession, NavigationOutcome};
use revgrid_protocol::RevisionId;

#[derive(Parser)]
#[command(name = "revgrid")]
#[command(about = "Spreadsheet version history: list, replay, check, rename and fork revisions")]
#[command(version)]
struct Cli {
    /// More logging (-v info, -vv debug). RUST_LOG overrides.
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (.json or .toml) instead of the default location
    #[arg(long, global = true, env = "REVGRID_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List restorable revisions, newest first
    #[command(after_help = "\
Examples:
  revgrid log history.json
  revgrid log history.json --all --json")]
    Log {
        file: PathBuf,

        /// List every revision instead of the first page
        #[arg(long)]
        all: bool,

        #[arg(long)]
        json: bool,
    },

    /// Replay the document at a revision and print its cells
    #[command(after_help = "\
Examples:
  revgrid show history.json
  revgrid show history.json --at rev-2
  revgrid show history.json --at 2 --json")]
    Show {
        file: PathBuf,

        /// Revision id (number) or nextRevisionId; defaults to the latest
        #[arg(long)]
        at: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Verify the revision chain (exit 0 complete, 20 missing revisions, 21 corrupted)
    Check {
        file: PathBuf,

        /// Report missing revisions instead of reloading from the snapshot
        #[arg(long)]
        no_auto_reload: bool,

        #[arg(long)]
        json: bool,
    },

    /// Name a revision. An empty or unchanged name does nothing.
    Rename {
        file: PathBuf,
        id: u64,
        name: String,
    },

    /// Create a new document from a revision
    Fork {
        file: PathBuf,
        id: u64,

        /// Where to write the new history file (default: <file>.fork.json)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = load_settings(cli.config.as_deref()).and_then(|settings| match cli.command {
        Commands::Log { file, all, json } => cmd_log(&file, settings, all, json),
        Commands::Show { file, at, json } => cmd_show(&file, settings, at, json),
        Commands::Check { file, no_auto_reload, json } => {
            cmd_check(&file, settings, no_auto_reload, json)
        }
        Commands::Rename { file, id, name } => cmd_rename(&file, settings, RevisionId(id), &name),
        Commands::Fork { file, id, output } => cmd_fork(&file, settings, RevisionId(id), output),
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn settings(err: SettingsError) -> Self {
        let code = match err {
            SettingsError::Io(_) => EXIT_IO,
            SettingsError::Parse(_) | SettingsError::Invalid(_) => EXIT_PARSE,
        };
        Self { code, message: err.to_string(), hint: None }
    }

    /// Error from a history session, with its exit code.
    pub fn history(err: HistoryError) -> Self {
        let hint = match &err {
            HistoryError::Corrupted => {
                Some("the revisions cannot be replayed; work from the live document".to_string())
            }
            HistoryError::UnknownRevision(_) | HistoryError::UnknownRevisionId(_) => {
                Some("run `revgrid log <file> --all` to list revisions".to_string())
            }
            HistoryError::Fetch(BackendError::Malformed(_)) => {
                Some("expected {\"data\": ..., \"revisions\": [...]}".to_string())
            }
            _ => None,
        };
        Self { code: history_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn load_settings(path: Option<&Path>) -> Result<HistorySettings, CliError> {
    match path {
        Some(path) => HistorySettings::load_from(path).map_err(|e| {
            CliError::settings(e).with_hint("keys are dotted, e.g. \"history.pageSize\": 50")
        }),
        None => Ok(HistorySettings::load()),
    }
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::io(format!("cannot serialize output: {}", e)))?;
    println!("{}", output);
    Ok(())
}

/// Open the history stored in `file`, with its rows as data source.
fn open_session(
    file: &Path,
    settings: HistorySettings,
    backend: FileBackend,
) -> Result<(HistorySession<FileBackend>, InlineRows), CliError> {
    let contents = HistoryFile::read(file)
        .map_err(|e| CliError::history(HistoryError::Fetch(e)))?;
    let rows = InlineRows::new(contents.rows);
    log::debug!("opening document {} from {}", contents.id, backend.path().display());
    let session = HistorySession::open(backend, contents.id, settings, false)
        .map_err(CliError::history)?;
    Ok((session, rows))
}

/// `nextRevisionId` designated by a revision number or id.
fn resolve_target(session: &HistorySession<FileBackend>, at: &str) -> Result<String, CliError> {
    let at = at.trim();
    if at.is_empty() {
        return Err(CliError::args("--at needs a revision id"));
    }
    if let Ok(id) = at.parse::<u64>() {
        if let Some((_, revision)) = session.navigator().log().find(RevisionId(id)) {
            return Ok(revision.next_revision_id.clone());
        }
    }
    Ok(at.to_string())
}

// ============================================================================
// log
// ============================================================================

fn cmd_log(file: &Path, settings: HistorySettings, all: bool, json: bool) -> Result<u8, CliError> {
    let (mut session, _) = open_session(file, settings, FileBackend::new(file))?;
    if all {
        while session.load_more() > 0 {}
    }
    let entries = session.entries();

    if json {
        print_json(&json!({
            "document": session.document_id(),
            "name": session.name(),
            "status": session.status(),
            "current": session.current_revision(),
            "hasMore": session.has_more(),
            "entries": entries,
        }))?;
        return Ok(status_exit_code(session.status()));
    }

    println!("{} ({})", session.name(), session.status());
    for entry in &entries {
        let marker = if entry.is_current { '*' } else { ' ' };
        println!(
            "{} {:>4}  {:<12} {:<32} {:<16} {}",
            marker, entry.id, entry.revision_id, entry.label, entry.author, entry.info
        );
    }
    if session.has_more() {
        let hidden = session.navigator().restorable().count() - entries.len();
        println!("  ... {} more (use --all)", hidden);
    }
    Ok(status_exit_code(session.status()))
}

// ============================================================================
// show
// ============================================================================

fn cmd_show(
    file: &Path,
    settings: HistorySettings,
    at: Option<String>,
    json: bool,
) -> Result<u8, CliError> {
    let (mut session, mut rows) = open_session(file, settings, FileBackend::new(file))?;
    if let Some(at) = at {
        let target = resolve_target(&session, &at)?;
        session.navigate(&target).map_err(CliError::history)?;
    }
    session.load_data_sources(&mut rows);

    let document = session.document();
    let sheets: Vec<_> = document
        .sheets()
        .iter()
        .map(|sheet| {
            let cells: serde_json::Map<_, _> = sheet
                .cells()
                .into_iter()
                .map(|(position, cell)| {
                    let value = document.cell_value(sheet.id(), position).to_text();
                    (position.to_a1(), json!({ "content": cell.content, "value": value }))
                })
                .collect();
            json!({ "id": sheet.id().as_str(), "name": sheet.name, "cells": cells })
        })
        .collect();

    if json {
        print_json(&json!({
            "revision": session.current_revision(),
            "head": document.head(),
            "status": session.status(),
            "fetches": rows.fetched(),
            "sheets": sheets,
        }))?;
        return Ok(status_exit_code(session.status()));
    }

    println!("{} at {} ({})", session.name(), session.current_revision(), session.status());
    for sheet in document.sheets() {
        println!("[{}]", sheet.name);
        for (position, cell) in sheet.cells() {
            let value = document.cell_value(sheet.id(), position).to_text();
            if cell.is_formula() {
                println!("  {:<6} {}  -> {}", position.to_a1(), cell.content, value);
            } else {
                println!("  {:<6} {}", position.to_a1(), value);
            }
        }
    }
    Ok(status_exit_code(session.status()))
}

// ============================================================================
// check
// ============================================================================

fn cmd_check(
    file: &Path,
    mut settings: HistorySettings,
    no_auto_reload: bool,
    json: bool,
) -> Result<u8, CliError> {
    if no_auto_reload {
        settings.auto_reload_from_snapshot = false;
    }
    let (session, _) = open_session(file, settings, FileBackend::new(file))?;
    let status = session.status();
    let replay_error = session.replay_error().map(|e| e.to_string());

    if json {
        print_json(&json!({
            "document": session.document_id(),
            "status": status,
            "revision": session.current_revision(),
            "head": session.document().head(),
            "fromSnapshot": session.is_from_snapshot(),
            "replayError": replay_error,
        }))?;
    } else {
        println!("{}: {}", file.display(), status);
        if session.document().head() != session.current_revision() {
            println!(
                "  expected head {}, replay stopped at {}",
                session.current_revision(),
                session.document().head()
            );
        }
        if let Some(error) = replay_error {
            println!("  {}", error);
        }
    }
    Ok(status_exit_code(status))
}

// ============================================================================
// rename / fork
// ============================================================================

fn cmd_rename(file: &Path, settings: HistorySettings, id: RevisionId, name: &str) -> Result<u8, CliError> {
    let (mut session, _) = open_session(file, settings, FileBackend::new(file))?;
    if session.rename(id, name).map_err(CliError::history)? {
        println!("revision {} renamed to {:?}", id, name.trim());
    } else {
        println!("revision {} unchanged", id);
    }
    Ok(EXIT_SUCCESS)
}

fn cmd_fork(
    file: &Path,
    settings: HistorySettings,
    id: RevisionId,
    output: Option<PathBuf>,
) -> Result<u8, CliError> {
    let mut backend = FileBackend::new(file);
    if let Some(output) = output {
        backend = backend.with_fork_output(output);
    }
    let (mut session, _) = open_session(file, settings, backend)?;

    let target = session
        .navigator()
        .log()
        .find(id)
        .map(|(_, revision)| revision.next_revision_id.clone())
        .ok_or_else(|| CliError::history(HistoryError::UnknownRevisionId(id)))?;
    if let NavigationOutcome::Navigated { status, .. } =
        session.navigate(&target).map_err(CliError::history)?
    {
        log::info!("forking from {} ({})", target, status);
    }
    let destination = session.fork(id).map_err(CliError::history)?;
    print_json(&destination)?;
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_history_error_hints() {
        let err = CliError::history(HistoryError::Corrupted);
        assert_eq!(err.code, exit_codes::EXIT_HISTORY_CORRUPTED);
        assert!(err.hint.is_some());

        let err = CliError::history(HistoryError::Backend(BackendError::Rejected("no".into())));
        assert_eq!(err.code, exit_codes::EXIT_HISTORY_BACKEND);
        assert!(err.hint.is_none());
        assert_eq!(err.with_hint("retry").hint.as_deref(), Some("retry"));
    }

    #[test]
    fn test_settings_error_codes() {
        assert_eq!(CliError::settings(SettingsError::Io("gone".into())).code, EXIT_IO);
        assert_eq!(CliError::settings(SettingsError::Invalid("pageSize".into())).code, EXIT_PARSE);
    }
}
