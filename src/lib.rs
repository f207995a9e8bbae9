/* Copyright 2022-2023 Danny McClanahan */
/* SPDX-License-Identifier: (Apache-2.0 OR MIT) */

//! A shim for compiler drivers and linkers which embeds the [tea] prefix as an
//! rpath.
//!
//! The shim is installed under the name of the tool it shadows (`cc`, `ld`,
//! ...). When run, it:
//! 1. resolves the prefix from `$TEA_PREFIX`, or else from `tea --prefix`
//!    ([`prefix::resolve_prefix`]),
//! 2. strips any `-Wl,-rpath,<prefix>` already on the command line, and
//!    appends exactly one if the command line looks like it links against a
//!    shared library ([`rpath::rewrite`]),
//! 3. replaces itself with the real tool of the same name from `/usr/bin`
//!    ([`invocation::ShimInvocation`]).
//!
//! [tea]: https://github.com/teaxyz/cli

#![deny(unsafe_code)]
// Turn all warnings into errors!
// #![deny(warnings)]
// Warn for missing docs in general, and hard require crate-level docs.
// #![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
/* Make all doctests fail if they produce any warnings. */
#![doc(test(attr(deny(warnings))))]

pub mod config;
pub mod invocation;
pub mod logging;
pub mod prefix;
pub mod rpath;

use super_process::{base, exe};

use displaydoc::Display;
use thiserror::Error;

/// Errors that can occur.
#[derive(Debug, Display, Error)]
#[ignore_extra_doc_attributes]
pub enum Error {
  /// could not resolve prefix: {0}
  ///
  /// `$TEA_PREFIX` was unset and `tea --prefix` did not produce one.
  Prefix(#[from] prefix::PrefixError),
  /// could not determine delegate: {0}
  Invocation(#[from] invocation::InvocationError),
  /// setup error: {0}
  Setup(#[from] base::SetupErrorWrapper),
  /// could not execute delegate: {0}
  ///
  /// This will occur if the real tool is missing or not executable.
  Delegate(#[from] exe::CommandErrorWrapper),
}
