/* Copyright 2022-2023 Danny McClanahan */
/* SPDX-License-Identifier: (Apache-2.0 OR MIT) */

use tea_shim::{
  config::ShimConfig,
  invocation::{Invocation, ShimInvocation},
  logging,
  prefix::{self, ProcessEnv, Subprocesses},
};

use super_process::{base::CommandBase, exec::Replaceable};

use eyre::WrapErr;
use tracing::debug;

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
  logging::init();
  let config = ShimConfig::from_env();

  let invocation = Invocation::from_env().map_err(tea_shim::Error::from)?;
  let prefix = prefix::resolve_prefix(&ProcessEnv, &Subprocesses, &config)
    .await
    .map_err(tea_shim::Error::from)?;

  let command = ShimInvocation::prepare(invocation, &prefix, &config)
    .map_err(tea_shim::Error::from)?
    .setup_command()
    .await
    .map_err(|e| tea_shim::Error::from(e.with_context("preparing delegate".to_string())))?;
  debug!(%command, "replacing process");

  /* Only returns if exec failed. */
  let e = command.replace_process();
  Err::<(), _>(tea_shim::Error::from(e)).wrap_err("failed to hand off to the real tool")
}
