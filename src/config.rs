/* Copyright 2022-2023 Danny McClanahan */
/* SPDX-License-Identifier: (Apache-2.0 OR MIT) */

//! Where the shim looks for its prefix and for the tool it shadows.

use tracing::debug;

use std::{env, ffi::OsString, path::PathBuf};

/// Hardcoded names and locations.
///
/// These are only ever overridden through [`ShimConfig`], never edited in
/// place.
pub mod defaults {
  /// Environment variable holding the tea prefix.
  pub const PREFIX_ENV_VAR: &str = "TEA_PREFIX";
  /// Program run to discover the prefix when [`PREFIX_ENV_VAR`] is missing.
  pub const PREFIX_QUERY_PROGRAM: &str = "tea";
  /// The sole argument to [`PREFIX_QUERY_PROGRAM`].
  pub const PREFIX_QUERY_ARG: &str = "--prefix";
  /// Directory containing the real compiler drivers and linkers.
  pub const DELEGATE_DIR: &str = "/usr/bin";
  /// Overrides [`DELEGATE_DIR`] when set to a non-empty value.
  pub const DELEGATE_DIR_ENV_VAR: &str = "TEA_SHIM_DELEGATE_DIR";
  /// `tracing` filter directives for the shim's own diagnostics.
  pub const LOG_ENV_VAR: &str = "TEA_SHIM_LOG";
}

/// Runtime configuration for a single shim invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimConfig {
  /// Name of the environment variable consulted for the prefix.
  pub prefix_env_var: String,
  /// Program which prints the prefix on stdout.
  pub prefix_query_program: PathBuf,
  /// Arguments to [`Self::prefix_query_program`].
  pub prefix_query_args: Vec<OsString>,
  /// Directory the real tool is executed from.
  pub delegate_dir: PathBuf,
}

impl Default for ShimConfig {
  fn default() -> Self {
    Self {
      prefix_env_var: defaults::PREFIX_ENV_VAR.to_string(),
      prefix_query_program: PathBuf::from(defaults::PREFIX_QUERY_PROGRAM),
      prefix_query_args: vec![OsString::from(defaults::PREFIX_QUERY_ARG)],
      delegate_dir: PathBuf::from(defaults::DELEGATE_DIR),
    }
  }
}

impl ShimConfig {
  /// Apply overrides from the process environment to [`Self::default`].
  pub fn from_env() -> Self {
    Self::default().with_delegate_dir(env::var_os(defaults::DELEGATE_DIR_ENV_VAR))
  }

  /// Take the delegate directory from `dir`, if it is set and non-empty.
  pub fn with_delegate_dir(mut self, dir: Option<OsString>) -> Self {
    match dir {
      Some(dir) if !dir.is_empty() => {
        debug!(
          var = defaults::DELEGATE_DIR_ENV_VAR,
          dir = ?dir,
          "delegate directory overridden"
        );
        self.delegate_dir = PathBuf::from(dir);
      },
      _ => (),
    }
    self
  }
}
