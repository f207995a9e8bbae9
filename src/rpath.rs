/* Copyright 2022-2023 Danny McClanahan */
/* SPDX-License-Identifier: (Apache-2.0 OR MIT) */

//! Rewriting a compiler or linker command line to embed the prefix as an
//! rpath.

use crate::prefix::Prefix;

use super_process::exe::Argv;

use displaydoc::Display;
use tracing::debug;

use std::{
  ffi::{OsStr, OsString},
  os::unix::ffi::OsStrExt,
};

/// {0:?}
///
/// The single argument `-Wl,-rpath,<prefix>`.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
#[ignore_extra_doc_attributes]
pub struct RpathFlag(OsString);

impl RpathFlag {
  pub const LEADER: &'static str = "-Wl,-rpath,";

  pub fn for_prefix(prefix: &Prefix) -> Self {
    let mut flag = OsString::from(Self::LEADER);
    flag.push(prefix.as_os_str());
    Self(flag)
  }

  pub fn as_os_str(&self) -> &OsStr { self.0.as_os_str() }

  pub fn into_os_string(self) -> OsString { self.0 }
}

/// Drop every argument exactly equal to `flag`, keeping everything else in
/// order.
///
/// Comparison is bytewise, so `-Wl,-rpath,/opt/tea/` does not match a prefix
/// of `/opt/tea`.
pub fn strip_rpath(argv: Argv, flag: &RpathFlag) -> Argv {
  let Argv(args) = argv;
  Argv(
    args
      .into_iter()
      .filter(|arg| arg.as_os_str() != flag.as_os_str())
      .collect(),
  )
}

/// Guess whether this command line produces a dynamically linked artifact.
///
/// Matches if any argument starts with `-l` or ends with `.dylib`. This is an
/// approximation and misses plenty of such invocations (e.g. linking only
/// `.so` paths). It is still not applied to every command line, since an
/// rpath on a compile-only invocation makes some drivers warn about an unused
/// linker argument.
pub fn links_dynamically(argv: &Argv) -> bool {
  argv.iter().any(|arg| {
    let bytes = arg.as_bytes();
    bytes.starts_with(b"-l") || bytes.ends_with(b".dylib")
  })
}

/// Deduplicate `flag` out of `argv`, then append it exactly once if
/// [`links_dynamically`] says so.
pub fn rewrite(argv: Argv, flag: &RpathFlag) -> Argv {
  let mut filtered = strip_rpath(argv, flag);
  if links_dynamically(&filtered) {
    debug!(%flag, "appending rpath");
    filtered.push(flag.clone().into_os_string());
  } else {
    debug!("no dynamic link arguments found, passing through");
  }
  filtered
}
