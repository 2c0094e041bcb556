//! Interactive main menu.
//!
//! Each pick maps to one [`UserAction`]. Errors that only abort the current
//! action are printed and the menu comes back; fatal ones end the session.

use std::fmt;
use std::path::{Path, PathBuf};

use containdb_common::catalog::{ServiceKind, ToolKind};
use containdb_common::error::Result;
use containdb_runtime::backend::ContainerRuntime;
use containdb_runtime::engine::{Engine, Field, Operator, Outcome, Question, UserAction, companion_for};

use crate::output;

/// Main menu entries, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Install,
    List,
    RemoveDatabase,
    RemoveImage,
    RemoveVolume,
    InstallTool,
    Export,
    Import,
}

impl Entry {
    const ALL: [Self; 8] = [
        Self::Install,
        Self::List,
        Self::RemoveDatabase,
        Self::RemoveImage,
        Self::RemoveVolume,
        Self::InstallTool,
        Self::Export,
        Self::Import,
    ];
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Install => "Install Database",
            Self::List => "List Databases",
            Self::RemoveDatabase => "Remove Database",
            Self::RemoveImage => "Remove Image",
            Self::RemoveVolume => "Remove Volume",
            Self::InstallTool => "Install Management Tool",
            Self::Export => "Export Services",
            Self::Import => "Import Services",
        })
    }
}

/// Tools offered by the tool submenu.
const TOOL_ACTIONS: [(&str, UserAction); 4] = [
    ("phpMyAdmin", UserAction::InstallTool(ToolKind::PhpMyAdmin)),
    ("pgAdmin", UserAction::InstallTool(ToolKind::PgAdmin)),
    ("RedisInsight", UserAction::InstallTool(ToolKind::RedisInsight)),
    ("MongoDB Compass", UserAction::InstallCompass),
];

fn labels<T: fmt::Display>(items: &[T]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

/// Asks for the action behind a menu entry; `None` means back to the menu.
fn action_for(
    entry: Entry,
    operator: &mut dyn Operator,
    export_file: &Path,
) -> Result<Option<UserAction>> {
    let action = match entry {
        Entry::Install => operator
            .select("Select database to install", &labels(&ServiceKind::ALL))?
            .and_then(|idx| ServiceKind::ALL.get(idx).copied())
            .map(UserAction::Install),
        Entry::List => Some(UserAction::List),
        Entry::RemoveDatabase => Some(UserAction::RemoveContainer),
        Entry::RemoveImage => Some(UserAction::RemoveImage),
        Entry::RemoveVolume => Some(UserAction::RemoveVolume),
        Entry::InstallTool => {
            let names: Vec<String> = TOOL_ACTIONS.iter().map(|(n, _)| (*n).to_string()).collect();
            operator
                .select("Select tool to install", &names)?
                .and_then(|idx| TOOL_ACTIONS.get(idx))
                .map(|(_, action)| action.clone())
        }
        Entry::Export => Some(UserAction::Export(export_file.to_path_buf())),
        Entry::Import => {
            let answer = operator.input(&Field::DescriptorPath)?;
            let path = answer.trim();
            Some(UserAction::Import(if path.is_empty() {
                export_file.to_path_buf()
            } else {
                PathBuf::from(path)
            }))
        }
    };
    Ok(action)
}

/// Performs `action`, printing the outcome. Non-fatal errors are printed
/// and swallowed.
fn perform<R: ContainerRuntime>(
    engine: &Engine<R>,
    action: UserAction,
    operator: &mut dyn Operator,
) -> Result<Option<Outcome>> {
    match engine.perform(action, operator) {
        Ok(outcome) => {
            println!("{}", output::render(&outcome));
            Ok(Some(outcome))
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::debug!(error = ?e, "action failed");
            println!("{}", output::failure(&e));
            Ok(None)
        }
    }
}

/// Runs the menu until the operator exits.
///
/// # Errors
///
/// Returns [`Cancelled`](containdb_common::error::ContainDbError::Cancelled)
/// when input ends or the session is interrupted.
pub fn run<R: ContainerRuntime>(engine: &Engine<R>, operator: &mut dyn Operator) -> Result<()> {
    let export_file = engine.config().export_file.clone();
    loop {
        let Some(entry) = operator
            .select("What would you like to do?", &labels(&Entry::ALL))?
            .and_then(|idx| Entry::ALL.get(idx).copied())
        else {
            println!("{}", output::farewell());
            return Ok(());
        };
        let Some(action) = action_for(entry, operator, &export_file)? else {
            continue;
        };

        let outcome = perform(engine, action, operator)?;
        if let Some(Outcome::Installed { kind, .. }) = outcome {
            offer_companion(engine, kind, operator)?;
        }
    }
}

fn offer_companion<R: ContainerRuntime>(
    engine: &Engine<R>,
    kind: ServiceKind,
    operator: &mut dyn Operator,
) -> Result<()> {
    let Some(companion) = companion_for(kind) else {
        return Ok(());
    };
    let label = match &companion {
        UserAction::InstallTool(tool) => tool.label(),
        _ => "MongoDB Compass",
    };
    if operator.confirm(&Question::InstallCompanion { label })? {
        let _ = perform(engine, companion, operator)?;
    }
    Ok(())
}
