//! Shared fixtures for the runtime integration tests.

#![allow(dead_code, clippy::panic)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use containdb_common::config::ContainDbConfig;
use containdb_common::constants::MANAGED_NETWORK;
use containdb_common::error::{ContainDbError, Result};
use containdb_runtime::backend::memory::InMemoryRuntime;
use containdb_runtime::download::Fetch;
use containdb_runtime::engine::{Engine, Field, Operator, Question, VolumeResolution};

/// One scripted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Text(String),
    Pick(Option<usize>),
    Volume(VolumeResolution),
}

/// Shorthand for a text answer.
pub fn text(value: &str) -> Answer {
    Answer::Text(value.to_string())
}

/// Operator replaying a fixed script. Running out of answers behaves like
/// end of input: every further prompt returns `Cancelled`.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: VecDeque<Answer>,
    /// Every prompt shown, in order.
    pub asked: Vec<String>,
}

impl ScriptedOperator {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    /// Operator that must never be consulted.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, prompt: String) -> Result<Answer> {
        self.asked.push(prompt);
        self.answers.pop_front().ok_or(ContainDbError::Cancelled)
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&mut self, question: &Question) -> Result<bool> {
        match self.next(question.to_string())? {
            Answer::Yes => Ok(true),
            Answer::No => Ok(false),
            other => panic!("expected yes/no for '{question}', script has {other:?}"),
        }
    }

    fn input(&mut self, field: &Field) -> Result<String> {
        match self.next(field.to_string())? {
            Answer::Text(value) => Ok(value),
            other => panic!("expected text for '{field}', script has {other:?}"),
        }
    }

    fn select(&mut self, prompt: &str, choices: &[String]) -> Result<Option<usize>> {
        match self.next(format!("{prompt}: {}", choices.join(", ")))? {
            Answer::Pick(idx) => Ok(idx),
            other => panic!("expected selection for '{prompt}', script has {other:?}"),
        }
    }

    fn resolve_volume_conflict(&mut self, volume: &str) -> Result<VolumeResolution> {
        match self.next(format!("volume {volume} exists"))? {
            Answer::Volume(resolution) => Ok(resolution),
            other => panic!("expected volume resolution for '{volume}', script has {other:?}"),
        }
    }
}

/// Fetcher writing fixed bytes instead of downloading.
pub struct FakeFetch {
    pub body: Vec<u8>,
}

impl Fetch for FakeFetch {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        std::fs::write(dest, &self.body).map_err(|e| ContainDbError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;
        assert!(url.starts_with("https://"));
        Ok(self.body.len() as u64)
    }
}

/// Fetcher that always fails.
pub struct FailingFetch;

impl Fetch for FailingFetch {
    fn fetch(&self, url: &str, _dest: &Path) -> Result<u64> {
        Err(ContainDbError::Download {
            url: url.to_string(),
            message: "HTTP 404 Not Found".into(),
        })
    }
}

/// Config pointing temp artifacts into `temp_dir`.
pub fn config_in(temp_dir: &Path) -> ContainDbConfig {
    ContainDbConfig {
        temp_dir: PathBuf::from(temp_dir),
        ..ContainDbConfig::default()
    }
}

/// A runtime that already has the managed network.
pub fn managed_runtime() -> InMemoryRuntime {
    InMemoryRuntime::new().with_network(MANAGED_NETWORK)
}

/// Engine over a clone of `runtime` with default configuration.
pub fn engine(runtime: &InMemoryRuntime) -> Engine<InMemoryRuntime> {
    Engine::new(runtime.clone(), ContainDbConfig::default())
}

/// Redacted command lines of every mutating call.
pub fn mutations(runtime: &InMemoryRuntime) -> Vec<String> {
    runtime
        .mutating_calls()
        .iter()
        .map(ToString::to_string)
        .collect()
}
