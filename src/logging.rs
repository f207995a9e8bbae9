/* Copyright 2022-2023 Danny McClanahan */
/* SPDX-License-Identifier: (Apache-2.0 OR MIT) */

//! Opt-in diagnostics.
//!
//! The shim must not add anything to the streams of the tool it wraps, so
//! nothing is installed unless [`LOG_ENV_VAR`] is set.

use crate::config::defaults::LOG_ENV_VAR;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::{env, io};

/// Install a stderr subscriber filtered by `$TEA_SHIM_LOG`, if that is set.
pub fn init() {
  let directives = match env::var(LOG_ENV_VAR) {
    Ok(directives) if !directives.is_empty() => directives,
    _ => return,
  };
  /* Only reachable when diagnostics were asked for, so stderr is fair game. */
  if let Err(e) = tracing_subscriber::registry()
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(false),
    )
    .with(EnvFilter::new(directives))
    .try_init()
  {
    eprintln!("{}: could not install log subscriber: {}", LOG_ENV_VAR, e);
  }
}
