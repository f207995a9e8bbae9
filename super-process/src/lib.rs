/*
 * Description: A process invocation framework for transparent command-line
 * shims.
 *
 * Copyright (C) 2022 Danny McClanahan <dmcC2@hypnicjerk.ai>
 * SPDX-License-Identifier: Apache-2.0
 */

//! A process invocation framework for transparent command-line shims.
//!
//! - [`exe::Command`] covers all the configuration for a single process
//!   invocation.
//! - [`base::CommandBase`] abstracts a process invocation which requires setup
//!   work.
//! - [`sync`] invokes a process and slurps its output.
//! - [`exec`] hands the terminal over to a process, either by replacing the
//!   current process image or by waiting on a child with inherited stdio.

#![deny(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]
/* Make all doctests fail if they produce any warnings. */
#![doc(test(attr(deny(warnings))))]
#![deny(clippy::all)]
#![allow(clippy::collapsible_else_if)]
#![allow(clippy::result_large_err)]

/// Representations of filesystem locations on the local host.
///
/// *TODO: currently these don't do any validation!*
pub mod fs {
  use displaydoc::Display;

  use std::path::PathBuf;

  /// Trait for objects representing a handle to a filesystem path.
  pub(crate) trait PathWrapper {
    /// Consume this object and return a path.
    fn into_path_buf(self) -> PathBuf;
  }

  /// @={0}
  ///
  /// A path to a file that is assumed to already exist.
  #[derive(Debug, Display, Clone, PartialEq, Eq)]
  #[ignore_extra_doc_attributes]
  pub struct File(pub PathBuf);

  impl PathWrapper for File {
    fn into_path_buf(self) -> PathBuf {
      let Self(path) = self;
      path
    }
  }

  /// @<{0}
  ///
  /// A path to a directory that is assumed to already exist.
  #[derive(Debug, Display, Clone, PartialEq, Eq)]
  #[ignore_extra_doc_attributes]
  pub struct Directory(pub PathBuf);

  impl PathWrapper for Directory {
    fn into_path_buf(self) -> PathBuf {
      let Self(path) = self;
      path
    }
  }
}

/// Representations of executable files and methods to build process handles
/// from them.
pub mod exe {
  use super::fs::{self, PathWrapper};

  use displaydoc::Display;
  use indexmap::IndexMap;
  use once_cell::sync::Lazy;
  use signal_hook::consts::{signal::*, TERM_SIGNALS};
  use thiserror::Error;

  use std::{
    ffi::{OsStr, OsString},
    io, iter,
    os::unix::process::ExitStatusExt,
    path::{Path, PathBuf},
    process, str,
  };

  /// *{0}
  ///
  /// A path to an executable file which is assumed to exist.
  #[derive(Debug, Display, Clone, PartialEq, Eq)]
  #[ignore_extra_doc_attributes]
  pub struct Exe(pub fs::File);

  impl<R: AsRef<OsStr>> From<&R> for Exe {
    fn from(value: &R) -> Self {
      let p = Path::new(value);
      let f = fs::File(p.to_path_buf());
      Self(f)
    }
  }

  impl Default for Exe {
    fn default() -> Self { Self(fs::File(PathBuf::default())) }
  }

  impl Exe {
    /// This is the default state of the executable.
    ///
    /// If an executable in this state is invoked, a panic will occur.
    pub fn is_empty(&self) -> bool {
      let Self(fs::File(exe)) = self;
      exe.as_os_str().is_empty()
    }

    /// The path this executable will be invoked at.
    pub fn as_path(&self) -> &Path {
      let Self(fs::File(exe)) = self;
      exe.as_path()
    }
  }

  impl PathWrapper for Exe {
    fn into_path_buf(self) -> PathBuf {
      let Self(exe) = self;
      exe.into_path_buf()
    }
  }

  /// [{0:?}]
  ///
  /// The command line to provide to the executable. Note that the complete
  /// "argv" used by [`Command`] contains the executable path prefixed to
  /// these arguments.
  #[derive(Debug, Display, Clone, Default, PartialEq, Eq)]
  #[ignore_extra_doc_attributes]
  pub struct Argv(pub Vec<OsString>);

  impl<R: AsRef<OsStr>, I: iter::IntoIterator<Item=R>> From<I> for Argv {
    fn from(value: I) -> Self {
      let argv: Vec<OsString> = value
        .into_iter()
        .map(|s| {
          let s: &OsStr = s.as_ref();
          s.to_os_string()
        })
        .collect();
      Self(argv)
    }
  }

  impl Argv {
    /// Append `rightmost_arg` to the end of ourself.
    pub fn push(&mut self, rightmost_arg: OsString) {
      let Self(ref mut argv) = self;
      argv.push(rightmost_arg);
    }

    /// Iterate over the arguments in order.
    pub fn iter(&self) -> impl Iterator<Item=&OsStr> { self.0.iter().map(|s| s.as_os_str()) }

    /// The number of arguments.
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether there are no arguments at all.
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
  }

  /// [{0:?}]
  ///
  /// Environment variables to set in the subprocess environment.
  #[derive(Debug, Display, Clone, Default, PartialEq, Eq)]
  #[ignore_extra_doc_attributes]
  pub struct EnvModifications(pub IndexMap<OsString, OsString>);

  impl<R: AsRef<OsStr>, I: iter::IntoIterator<Item=(R, R)>> From<I> for EnvModifications {
    fn from(value: I) -> Self {
      let env: IndexMap<OsString, OsString> = value
        .into_iter()
        .map(|(k, v)| {
          let k: &OsStr = k.as_ref();
          let v: &OsStr = v.as_ref();
          (k.to_os_string(), v.to_os_string())
        })
        .collect();
      Self(env)
    }
  }

  /// <exe={exe}, wd={wd:?}, argv={argv}, env={env}>
  ///
  /// Request to execute a subprocess. See [`crate::sync`] and [`crate::exec`]
  /// for examples of invocation.
  #[derive(Debug, Display, Clone, Default, PartialEq, Eq)]
  #[ignore_extra_doc_attributes]
  pub struct Command {
    /// Executable name, which may be absolute or relative to `$PATH` entries.
    pub exe: Exe,
    /// The working directory for the child process; otherwise, the working
    /// directory is inherited from the parent process.
    pub wd: Option<fs::Directory>,
    /// Arguments to pass to the executable. These should *not* be quoted at
    /// all.
    pub argv: Argv,
    /// Any new environment variables to set within the child process. The
    /// environment is otherwise inherited from the parent.
    pub env: EnvModifications,
  }

  impl Command {
    fn configure<C: CommandLike>(self) -> C {
      let Self {
        exe,
        wd,
        argv,
        env: EnvModifications(env),
      } = self;
      if exe.is_empty() {
        unreachable!(
          "command was executed before .exe was set; this can only occur using ::default()"
        );
      }
      let mut command = C::new(exe.into_path_buf());
      if let Some(wd) = wd {
        command.current_dir(wd.into_path_buf());
      }
      command.args(argv.0);
      for (var, val) in env.into_iter() {
        command.env(&var, &val);
      }
      command
    }

    pub(crate) fn command(self) -> async_process::Command { self.configure() }

    pub(crate) fn std_command(self) -> process::Command { self.configure() }
  }

  /* async_process::Command and process::Command share this surface but no trait. */
  trait CommandLike {
    fn new(exe: PathBuf) -> Self;
    fn current_dir(&mut self, wd: PathBuf);
    fn args(&mut self, argv: Vec<OsString>);
    fn env(&mut self, var: &OsStr, val: &OsStr);
  }

  macro_rules! command_like {
    ($t:ty) => {
      impl CommandLike for $t {
        fn new(exe: PathBuf) -> Self { <$t>::new(exe) }

        fn current_dir(&mut self, wd: PathBuf) { <$t>::current_dir(self, wd); }

        fn args(&mut self, argv: Vec<OsString>) { <$t>::args(self, argv); }

        fn env(&mut self, var: &OsStr, val: &OsStr) { <$t>::env(self, var, val); }
      }
    };
  }

  command_like![async_process::Command];
  command_like![process::Command];

  /// Errors that can occur when executing command lines.
  #[derive(Debug, Display, Error)]
  pub enum CommandError {
    /// a command line exited with non-zero status {0}
    NonZeroExit(i32),
    /// a command line exited with termination signal {0} ({1})
    ProcessTerminated(i32, &'static str),
    /// a command line exited with non-termination signal {0} ({1})
    ProcessKilled(i32, &'static str),
    /// i/o error invoking command line: {0}
    Io(#[from] io::Error),
    /// utf-8 decoding error for command line: {0}
    Utf8(#[from] str::Utf8Error),
  }

  macro_rules! signal_pairs {
  ($($name:ident),+) => {
    [$(($name, stringify!($name))),+]
  }
  }

  static SIGNAL_NAMES: Lazy<IndexMap<i32, &'static str>> = Lazy::new(|| {
    signal_pairs![
      SIGABRT, SIGALRM, SIGBUS, SIGCHLD, SIGCONT, SIGFPE, SIGHUP, SIGILL, SIGINT, SIGIO, SIGKILL,
      SIGPIPE, SIGPROF, SIGQUIT, SIGSEGV, SIGSTOP, SIGSYS, SIGTERM, SIGTRAP, SIGTSTP, SIGTTIN,
      SIGTTOU, SIGURG, SIGUSR1, SIGUSR2, SIGVTALRM, SIGWINCH, SIGXCPU, SIGXFSZ
    ]
    .into_iter()
    .collect()
  });

  fn signal_name(signal: i32) -> &'static str {
    SIGNAL_NAMES.get(&signal).copied().unwrap_or("<unknown>")
  }

  /// The exit code a shell would report for `status`.
  ///
  /// Processes killed by a signal map to `128 + signo`.
  pub fn exit_code_of(status: process::ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
      (Some(code), _) => code,
      (None, Some(signal)) => 128 + signal,
      (None, None) => 1,
    }
  }

  impl CommandError {
    /// Raise an error if the process exited with any type of failure.
    pub fn analyze_exit_status(status: process::ExitStatus) -> Result<(), Self> {
      if let Some(code) = status.code() {
        if code == 0 {
          Ok(())
        } else {
          Err(Self::NonZeroExit(code))
        }
      } else if let Some(signal) = status.signal() {
        Err(if TERM_SIGNALS.contains(&signal) {
          Self::ProcessTerminated(signal, signal_name(signal))
        } else {
          Self::ProcessKilled(signal, signal_name(signal))
        })
      } else {
        unreachable!("status {:?} had no exit code or signal", status)
      }
    }

    /// Attach the failing `command` and some `context` to this error.
    pub fn command_with_context(self, command: Command, context: String) -> CommandErrorWrapper {
      CommandErrorWrapper {
        command,
        context,
        error: self,
      }
    }
  }

  /// command {command:?} failed ({context}): {error}
  #[derive(Debug, Display, Error)]
  pub struct CommandErrorWrapper {
    /// The command that attempted to be executed.
    pub command: Command,
    /// Additional information about where the error occurred.
    pub context: String,
    /// The underlying error.
    #[source]
    pub error: CommandError,
  }

}

/// Extend the concept of a "process" to include setup, to enable abstraction.
pub mod base {
  use super::*;

  use async_trait::async_trait;
  use displaydoc::Display;
  use thiserror::Error;

  use std::io;

  /// Errors which may occur during the execution of
  /// [`CommandBase::setup_command`].
  #[derive(Debug, Display, Error)]
  pub enum SetupError {
    /// i/o error: {0}
    Io(#[from] io::Error),
  }

  impl SetupError {
    /// Wrap a raw error with `context` to produced a wrapped error.
    pub fn with_context(self, context: String) -> SetupErrorWrapper {
      SetupErrorWrapper {
        context,
        error: self,
      }
    }
  }

  /// setup error ({context}): {error}
  #[derive(Debug, Display, Error)]
  pub struct SetupErrorWrapper {
    /// Additional information about where the error occurred.
    pub context: String,
    /// The underlying error.
    #[source]
    pub error: SetupError,
  }

  /// Declare higher-level operations which desugar to command lines by
  /// implementing this trait.
  #[async_trait]
  pub trait CommandBase {
    /// Generate a command line from the given object.
    async fn setup_command(self) -> Result<exe::Command, SetupError>;
  }
}

/// Methods to execute a process "synchronously", i.e. waiting until it has
/// exited.
///
///```
/// # tokio_test::block_on(async {
/// use std::{str, path::PathBuf};
/// use super_process::{fs, exe, sync::SyncInvocable};
///
/// let command = exe::Command {
///   exe: exe::Exe(fs::File(PathBuf::from("echo"))),
///   argv: ["hey"].as_ref().into(),
///   ..Default::default()
/// };
///
/// // Spawn the child process and wait for it to end.
/// let output = command.clone().invoke().await.expect("sync subprocess failed");
/// // Parse stdout into utf8...
/// let hey = str::from_utf8(&output.stdout).expect("utf8 decoding failed")
///   // ...and strip the trailing newline.
///   .strip_suffix("\n")
///   .expect("trailing newline not found");
/// assert_eq!(hey, "hey");
/// # }) // async
/// ```
pub mod sync {
  use super::exe;

  use async_trait::async_trait;

  use std::{process, str};

  /// The slurped streams for a synchronously-invoked process, as raw bytes.
  #[derive(Debug, Clone)]
  #[allow(missing_docs)]
  pub struct RawOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
  }

  impl RawOutput {
    /// Parse the process's exit status with
    /// [`exe::CommandError::analyze_exit_status`].
    pub fn extract(
      command: exe::Command,
      output: process::Output,
    ) -> Result<Self, exe::CommandErrorWrapper> {
      let process::Output {
        status,
        stdout,
        stderr,
      } = output;

      let output = Self { stdout, stderr };
      if let Err(e) = exe::CommandError::analyze_exit_status(status) {
        let output_msg: String = match output.clone().decode(command.clone()) {
          Ok(decoded) => format!("(utf-8 decoded) {:?}", decoded),
          Err(_) => format!("(could not decode) {:?}", &output),
        };
        return Err(e.command_with_context(
          command,
          format!("when analyzing exit status for output {}", output_msg),
        ));
      }

      Ok(output)
    }

    /// Decode the output streams of this process, with the invoking `command`
    /// provided for error context.
    pub fn decode(self, command: exe::Command) -> Result<DecodedOutput, exe::CommandErrorWrapper> {
      let Self { stdout, stderr } = &self;
      let stdout = str::from_utf8(stdout)
        .map_err(|e| e.into())
        .map_err(|e: exe::CommandError| {
          e.command_with_context(
            command.clone(),
            format!("when decoding stdout from {:?}", &self),
          )
        })?
        .to_string();
      let stderr = str::from_utf8(stderr)
        .map_err(|e| e.into())
        .map_err(|e: exe::CommandError| {
          e.command_with_context(command, format!("when decoding stderr from {:?}", &self))
        })?
        .to_string();
      Ok(DecodedOutput { stdout, stderr })
    }
  }

  /// The slurped streams for a synchronously-invoked process, after UTF-8
  /// decoding.
  #[derive(Debug, Clone)]
  #[allow(missing_docs)]
  pub struct DecodedOutput {
    pub stdout: String,
    pub stderr: String,
  }

  /// Trait that defines "synchronously" invokable processes.
  #[async_trait]
  pub trait SyncInvocable {
    /// Invoke a child process and wait on it to complete while slurping its
    /// output.
    async fn invoke(self) -> Result<RawOutput, exe::CommandErrorWrapper>;
  }

  #[async_trait]
  impl SyncInvocable for exe::Command {
    async fn invoke(self) -> Result<RawOutput, exe::CommandErrorWrapper> {
      let mut command = self.clone().command();
      let output =
        command
          .output()
          .await
          .map_err(|e| e.into())
          .map_err(|e: exe::CommandError| {
            e.command_with_context(self.clone(), "waiting for output".to_string())
          })?;
      let output = RawOutput::extract(self, output)?;
      Ok(output)
    }
  }
}

/// Methods to hand the current terminal over to another process.
///
/// [`Replaceable`](exec::Replaceable) swaps out the current process image, so
/// the target inherits our pid, our stdio, and determines our exit code.
/// [`Delegating`](exec::Delegating) gets the same observable behavior from a
/// child process, at the cost of an extra process in between.
///
///```
/// # tokio_test::block_on(async {
/// use std::path::PathBuf;
/// use super_process::{fs, exe, exec::Delegating};
///
/// let command = exe::Command {
///   exe: exe::Exe(fs::File(PathBuf::from("sh"))),
///   argv: ["-c", "exit 3"].as_ref().into(),
///   ..Default::default()
/// };
///
/// // Unlike `SyncInvocable`, a non-zero exit is not an error here.
/// let status = command.delegate().await.expect("spawning sh failed");
/// assert_eq!(exe::exit_code_of(status), 3);
/// # }) // async
/// ```
pub mod exec {
  use super::exe;

  use async_process::Stdio;
  use async_trait::async_trait;

  use std::{os::unix::process::CommandExt, process};

  /// Processes which can take over the current process image.
  pub trait Replaceable {
    /// Replace the current process with this command.
    ///
    /// This only returns if the replacement could not be performed.
    fn replace_process(self) -> exe::CommandErrorWrapper;
  }

  impl Replaceable for exe::Command {
    fn replace_process(self) -> exe::CommandErrorWrapper {
      let e = self.clone().std_command().exec();
      exe::CommandError::from(e).command_with_context(self, "replacing process image".to_string())
    }
  }

  /// Processes which can be run in the foreground with inherited stdio.
  #[async_trait]
  pub trait Delegating {
    /// Spawn a child process sharing our stdio and wait for it to exit.
    ///
    /// The exit status is returned as-is, successful or not.
    async fn delegate(self) -> Result<process::ExitStatus, exe::CommandErrorWrapper>;
  }

  #[async_trait]
  impl Delegating for exe::Command {
    async fn delegate(self) -> Result<process::ExitStatus, exe::CommandErrorWrapper> {
      let mut command = self.clone().command();
      let status = command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| e.into())
        .map_err(|e: exe::CommandError| {
          e.command_with_context(self, "waiting for delegated process".to_string())
        })?;
      Ok(status)
    }
  }

}
