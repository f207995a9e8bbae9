/* Copyright 2022-2023 Danny McClanahan */
/* SPDX-License-Identifier: (Apache-2.0 OR MIT) */

//! How the shim was invoked, and the command line it hands off to.

use crate::{
  config::ShimConfig,
  prefix::Prefix,
  rpath::{self, RpathFlag},
};

use super_process::{
  base::{self, CommandBase},
  exe, fs,
};

use async_trait::async_trait;
use displaydoc::Display;
use thiserror::Error;
use tracing::debug;

use std::{
  env,
  ffi::{OsStr, OsString},
  fs as std_fs,
  os::unix::fs::MetadataExt,
  path::{Path, PathBuf},
};

/// Errors figuring out which tool to hand off to.
#[derive(Debug, Display, Error)]
pub enum InvocationError {
  /// the shim was started with an empty argv
  MissingArgv0,
  /// could not determine a tool name from argv[0] {0:?}
  NoToolName(OsString),
  /// delegate {0:?} is this shim itself
  Recursion(PathBuf),
}

/// The name this process was started under, and the rest of its command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub argv0: OsString,
  pub args: exe::Argv,
}

impl Invocation {
  pub fn from_args_os<I: IntoIterator<Item=OsString>>(args: I) -> Result<Self, InvocationError> {
    let mut args = args.into_iter();
    let argv0 = args.next().ok_or(InvocationError::MissingArgv0)?;
    Ok(Self {
      argv0,
      args: exe::Argv(args.collect()),
    })
  }

  pub fn from_env() -> Result<Self, InvocationError> { Self::from_args_os(env::args_os()) }

  /// The base name of argv\[0\], e.g. `cc` for `/opt/tea/shims/cc`.
  pub fn tool_name(&self) -> Result<&OsStr, InvocationError> {
    Path::new(&self.argv0)
      .file_name()
      .ok_or_else(|| InvocationError::NoToolName(self.argv0.clone()))
  }
}

/// The real tool, at `<delegate dir>/<tool name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateLocation {
  pub exe: exe::Exe,
}

impl DelegateLocation {
  pub fn locate(tool_name: &OsStr, config: &ShimConfig) -> Result<Self, InvocationError> {
    let path = config.delegate_dir.join(tool_name);
    match env::current_exe() {
      Ok(shim) => Self::ensure_distinct(&path, &shim)?,
      Err(e) => debug!(%e, "could not locate the running shim, skipping recursion check"),
    }
    debug!(delegate = %path.display(), "located delegate");
    Ok(Self {
      exe: exe::Exe(fs::File(path)),
    })
  }

  /// Refuse to exec `delegate` if it is the same file as `shim`, through any
  /// symlink or hard link.
  ///
  /// A missing delegate passes; exec will report it.
  pub(crate) fn ensure_distinct(delegate: &Path, shim: &Path) -> Result<(), InvocationError> {
    match (std_fs::metadata(delegate), std_fs::metadata(shim)) {
      (Ok(d), Ok(s)) if d.dev() == s.dev() && d.ino() == s.ino() => {
        Err(InvocationError::Recursion(delegate.to_path_buf()))
      },
      _ => Ok(()),
    }
  }
}

/// The rewritten command line for the real tool.
#[derive(Debug, Clone)]
pub struct ShimInvocation {
  pub delegate: DelegateLocation,
  pub args: exe::Argv,
  pub flag: RpathFlag,
}

impl ShimInvocation {
  pub fn prepare(
    invocation: Invocation,
    prefix: &Prefix,
    config: &ShimConfig,
  ) -> Result<Self, InvocationError> {
    let delegate = DelegateLocation::locate(invocation.tool_name()?, config)?;
    let Invocation { args, .. } = invocation;
    Ok(Self {
      delegate,
      args,
      flag: RpathFlag::for_prefix(prefix),
    })
  }
}

#[async_trait]
impl CommandBase for ShimInvocation {
  async fn setup_command(self) -> Result<exe::Command, base::SetupError> {
    let Self {
      delegate: DelegateLocation { exe },
      args,
      flag,
    } = self;
    Ok(exe::Command {
      exe,
      argv: rpath::rewrite(args, &flag),
      ..Default::default()
    })
  }
}
