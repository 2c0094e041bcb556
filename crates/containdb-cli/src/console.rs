//! Terminal implementation of the engine's [`Operator`].

use std::io::{self, BufRead, StdinLock, Stdout, Write};
use std::path::PathBuf;

use containdb_common::error::{ContainDbError, Result};
use containdb_runtime::engine::{Field, Operator, Question, VolumeResolution};

/// Prompts on `output` and reads answers line by line from `input`.
pub struct ConsoleOperator<I, O> {
    input: I,
    output: O,
    hide_secrets: bool,
}

impl ConsoleOperator<StdinLock<'static>, Stdout> {
    /// Operator bound to the process terminal. Secrets are read without echo.
    pub fn stdio() -> Self {
        Self {
            hide_secrets: true,
            ..Self::new(io::stdin().lock(), io::stdout())
        }
    }
}

impl<I: BufRead, O: Write> ConsoleOperator<I, O> {
    /// Operator over arbitrary streams; secrets are read like any other line.
    pub const fn new(input: I, output: O) -> Self {
        Self {
            input,
            output,
            hide_secrets: false,
        }
    }

    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{text}").map_err(stdio_error)
    }

    fn prompt(&mut self, text: &str) -> Result<()> {
        write!(self.output, "{text}")
            .and_then(|()| self.output.flush())
            .map_err(stdio_error)
    }

    /// Reads one trimmed line. End of input means the operator is gone.
    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => Err(ContainDbError::Cancelled),
            Ok(_) => Ok(line.trim().to_string()),
            Err(e) => Err(stdio_error(e)),
        }
    }

    fn read_secret(&mut self, prompt: &str) -> Result<String> {
        let secret = if self.hide_secrets {
            rpassword::prompt_password(prompt)
        } else {
            self.prompt(prompt)?;
            rpassword::read_password_from_bufread(&mut self.input)
        };
        secret.map_err(stdio_error)
    }

    /// Numbered menu; `exit` adds a `0) Exit` entry mapped to `None`.
    fn choose(&mut self, prompt: &str, choices: &[String], exit: bool) -> Result<Option<usize>> {
        self.say(prompt)?;
        for (idx, choice) in choices.iter().enumerate() {
            self.say(&format!("  {}) {choice}", idx + 1))?;
        }
        if exit {
            self.say("  0) Exit")?;
        }
        loop {
            self.prompt("Select an option: ")?;
            let answer = self.read_line()?;
            match answer.parse::<usize>() {
                Ok(0) if exit => return Ok(None),
                Ok(n) if (1..=choices.len()).contains(&n) => return Ok(Some(n - 1)),
                _ => self.say(&format!("Invalid choice '{answer}'."))?,
            }
        }
    }
}

impl<I: BufRead, O: Write> Operator for ConsoleOperator<I, O> {
    fn confirm(&mut self, question: &Question) -> Result<bool> {
        loop {
            self.prompt(&format!("{question} (y/n): "))?;
            match self.read_line()?.to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("Please answer y or n.")?,
            }
        }
    }

    fn input(&mut self, field: &Field) -> Result<String> {
        let prompt = match field.default_value() {
            Some(default) => format!("{field} [{default}]: "),
            None => format!("{field}: "),
        };
        if field.is_secret() {
            return self.read_secret(&prompt);
        }
        self.prompt(&prompt)?;
        self.read_line()
    }

    fn select(&mut self, prompt: &str, choices: &[String]) -> Result<Option<usize>> {
        self.choose(prompt, choices, true)
    }

    fn resolve_volume_conflict(&mut self, volume: &str) -> Result<VolumeResolution> {
        let labels: Vec<String> = VolumeResolution::ALL.iter().map(ToString::to_string).collect();
        let picked = self.choose(&format!("Volume '{volume}' already exists."), &labels, false)?;
        Ok(picked
            .and_then(|idx| VolumeResolution::ALL.get(idx).copied())
            .unwrap_or(VolumeResolution::Abort))
    }
}

/// Maps terminal I/O failures; a closed or interrupted stream cancels.
fn stdio_error(e: io::Error) -> ContainDbError {
    match e.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::Interrupted => ContainDbError::Cancelled,
        _ => ContainDbError::Io {
            path: PathBuf::from("<terminal>"),
            source: e,
        },
    }
}
