/* Copyright 2022-2023 Danny McClanahan */
/* SPDX-License-Identifier: (Apache-2.0 OR MIT) */

//! Locate the tea prefix, from the environment or by asking `tea` itself.

use crate::config::ShimConfig;

use super_process::{
  base::{self, CommandBase},
  exe, fs,
  sync::{self, SyncInvocable},
};

use async_trait::async_trait;
use displaydoc::Display;
use thiserror::Error;
use tracing::debug;

use std::{
  env,
  ffi::{OsStr, OsString},
  os::unix::ffi::OsStringExt,
  path::PathBuf,
};

/// Errors locating the prefix.
#[derive(Debug, Display, Error)]
pub enum PrefixError {
  /// error setting up prefix query: {0}
  Setup(#[from] base::SetupErrorWrapper),
  /// prefix query failed: {0}
  Command(#[from] exe::CommandErrorWrapper),
}

/// The root directory of the tea installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
  pub path: PathBuf,
}

impl Prefix {
  pub fn as_os_str(&self) -> &OsStr { self.path.as_os_str() }
}

/// Read-only access to environment variables.
pub trait EnvLookup {
  fn var_os(&self, name: &str) -> Option<OsString>;
}

/// The environment of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
  fn var_os(&self, name: &str) -> Option<OsString> { env::var_os(name) }
}

impl EnvLookup for exe::EnvModifications {
  fn var_os(&self, name: &str) -> Option<OsString> {
    let Self(env) = self;
    env.get(OsStr::new(name)).cloned()
  }
}

/// The capability to run a command to completion and collect its output.
#[async_trait]
pub trait CommandRunner {
  async fn run(&self, command: exe::Command) -> Result<sync::RawOutput, exe::CommandErrorWrapper>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subprocesses;

#[async_trait]
impl CommandRunner for Subprocesses {
  async fn run(&self, command: exe::Command) -> Result<sync::RawOutput, exe::CommandErrorWrapper> {
    command.invoke().await
  }
}

/// `tea --prefix`, or whatever [`ShimConfig`] says to run instead.
#[derive(Debug, Clone)]
pub struct TeaPrefixQuery {
  pub program: PathBuf,
  pub args: Vec<OsString>,
}

impl TeaPrefixQuery {
  pub fn from_config(config: &ShimConfig) -> Self {
    Self {
      program: config.prefix_query_program.clone(),
      args: config.prefix_query_args.clone(),
    }
  }
}

#[async_trait]
impl CommandBase for TeaPrefixQuery {
  async fn setup_command(self) -> Result<exe::Command, base::SetupError> {
    let Self { program, args } = self;
    Ok(exe::Command {
      exe: exe::Exe(fs::File(program)),
      argv: exe::Argv(args),
      ..Default::default()
    })
  }
}

/// Resolve the prefix once for this invocation.
///
/// A non-empty value in [`ShimConfig::prefix_env_var`] wins. Otherwise the
/// [`TeaPrefixQuery`] is run through `runner` and its stdout, trimmed of
/// surrounding whitespace, is the prefix. Only a failed query is an error: its
/// output is taken as raw bytes, and may even be empty.
pub async fn resolve_prefix<E, R>(
  env: &E,
  runner: &R,
  config: &ShimConfig,
) -> Result<Prefix, PrefixError>
where
  E: EnvLookup + ?Sized,
  R: CommandRunner + ?Sized,
{
  if let Some(value) = env.var_os(&config.prefix_env_var) {
    if !value.is_empty() {
      debug!(var = %config.prefix_env_var, prefix = ?value, "prefix from environment");
      return Ok(Prefix {
        path: PathBuf::from(value),
      });
    }
  }

  let command = TeaPrefixQuery::from_config(config)
    .setup_command()
    .await
    .map_err(|e| e.with_context("in resolve_prefix()".to_string()))?;
  debug!(%command, "querying prefix");
  let sync::RawOutput { stdout, .. } = runner.run(command).await?;

  let prefix = OsString::from_vec(trim_ascii_whitespace(&stdout).to_vec());
  debug!(?prefix, "prefix from query");
  Ok(Prefix {
    path: PathBuf::from(prefix),
  })
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
  let start = bytes
    .iter()
    .position(|b| !b.is_ascii_whitespace())
    .unwrap_or(bytes.len());
  let end = bytes
    .iter()
    .rposition(|b| !b.is_ascii_whitespace())
    .map_or(start, |i| i + 1);
  &bytes[start..end]
}
