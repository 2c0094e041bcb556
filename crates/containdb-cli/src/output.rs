//! Formatted output helpers for CLI commands.
//!
//! Every [`Outcome`] renders to plain text here so the menu and the one-shot
//! flags print the same thing.

use std::fmt::Write as _;

use containdb_common::error::ContainDbError;
use containdb_runtime::engine::Outcome;

/// Formats a byte count into a human-readable string (e.g., "128 MiB").
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Renders the result of one action.
#[must_use]
pub fn render(outcome: &Outcome) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_outcome(&mut out, outcome);
    out
}

fn write_outcome(out: &mut String, outcome: &Outcome) -> std::fmt::Result {
    match outcome {
        Outcome::AlreadyRunning { kind, port } => {
            write!(out, "{kind} is already running (port {port}), nothing to do.")
        }
        Outcome::Installed {
            kind,
            container,
            image,
            host_port,
            volume,
        } => {
            write!(out, "{kind} is running as '{container}' ({image}).")?;
            match host_port {
                Some(port) => write!(out, "\n  reachable at localhost:{port}")?,
                None => write!(out, "\n  reachable from the managed network only")?,
            }
            if let Some(volume) = volume {
                write!(out, "\n  data persisted in volume '{volume}'")?;
            }
            Ok(())
        }
        Outcome::ToolInstalled { tool, linked, url } => {
            write!(out, "{tool} is running, linked to '{linked}'.\n  open {url}")
        }
        Outcome::CompassInstalled { bytes } => write!(
            out,
            "MongoDB Compass installed ({} downloaded).",
            format_bytes(*bytes)
        ),
        Outcome::Listed(running) => {
            writeln!(out, "{:<28} {:<30}", "NAME", "IMAGE")?;
            for container in running {
                writeln!(out, "{:<28} {:<30}", container.name, container.image)?;
            }
            write!(out, "{} database(s) running.", running.len())
        }
        Outcome::Removed(handle) => write!(out, "Removed {} '{}'.", handle.class, handle.name),
        Outcome::Exported { path, services } => write!(
            out,
            "Exported {} service(s) to {}: {}",
            services.len(),
            path.display(),
            services.join(", ")
        ),
        Outcome::Imported { path, warnings } => {
            write!(out, "Applied {}.", path.display())?;
            for warning in warnings {
                write!(
                    out,
                    "\n  warning: '{}' mounts {} which does not exist on this host",
                    warning.service,
                    warning.path.display()
                )?;
            }
            Ok(())
        }
        Outcome::Nothing { what } => write!(out, "No {what} found."),
        Outcome::Aborted(reason) => write!(out, "Stopped: {reason}."),
    }
}

/// Renders an error that ended one action but not the session.
#[must_use]
pub fn failure(error: &ContainDbError) -> String {
    format!("Error: {error}")
}

/// Printed when the operator leaves the menu.
#[must_use]
pub const fn farewell() -> &'static str {
    "Goodbye."
}
