/* Copyright 2022-2023 Danny McClanahan */
/* SPDX-License-Identifier: (Apache-2.0 OR MIT) */

use super_process::{
  exe,
  exec::Delegating,
  fs as sp_fs,
  sync::{self, SyncInvocable},
};

use tempfile::{tempdir, TempDir};

use std::{
  ffi::OsStr,
  fs, io,
  os::unix::fs::PermissionsExt,
  path::PathBuf,
  str,
  sync::{Mutex, MutexGuard},
};

/* Prints each argument on its own line, then exits with $FAKE_CC_EXIT. */
const FAKE_CC: &str = r#"#!/bin/sh
for arg in "$@"; do
  printf '%s\n' "$arg"
done
exit "${FAKE_CC_EXIT:-0}"
"#;

/* Writing an executable while another test forks can fail the exec with
 * ETXTBSY, so deployments are used one at a time. */
static SERIAL: Mutex<()> = Mutex::new(());

struct Deployment {
  _serial: MutexGuard<'static, ()>,
  _root: TempDir,
  shim: PathBuf,
  delegate_dir: PathBuf,
  empty_path: PathBuf,
}

impl Deployment {
  /// Install the shim as `shims/cc` and a fake `real/cc` next to it.
  fn new() -> io::Result<Self> {
    let serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let root = tempdir()?;
    let shims = root.path().join("shims");
    let delegate_dir = root.path().join("real");
    let empty_path = root.path().join("empty");
    for dir in [&shims, &delegate_dir, &empty_path] {
      fs::create_dir(dir)?;
    }

    let shim = shims.join("cc");
    std::os::unix::fs::symlink(env!("CARGO_BIN_EXE_tea-shim"), &shim)?;

    let fake = delegate_dir.join("cc");
    fs::write(&fake, FAKE_CC)?;
    fs::set_permissions(&fake, fs::Permissions::from_mode(0o755))?;

    Ok(Self {
      _serial: serial,
      _root: root,
      shim,
      delegate_dir,
      empty_path,
    })
  }

  fn command(&self, args: &[&str], env: &[(&str, &OsStr)]) -> exe::Command {
    let mut vars: Vec<(&OsStr, &OsStr)> = vec![
      (OsStr::new("TEA_SHIM_DELEGATE_DIR"), self.delegate_dir.as_os_str()),
      (OsStr::new("TEA_SHIM_LOG"), OsStr::new("")),
    ];
    vars.extend(env.iter().map(|(k, v)| (OsStr::new(*k), *v)));
    exe::Command {
      exe: exe::Exe(sp_fs::File(self.shim.clone())),
      argv: args.into(),
      env: vars.into(),
      ..Default::default()
    }
  }
}

fn lines(stdout: &[u8]) -> Vec<&str> { str::from_utf8(stdout).unwrap().lines().collect() }

#[tokio::test]
async fn compile_only_passes_through() -> eyre::Result<()> {
  let deployment = Deployment::new()?;
  let command = deployment.command(&["-o", "foo.o", "-c", "bar.c"], &[(
    "TEA_PREFIX",
    OsStr::new("/opt/tea"),
  )]);
  let output = command.invoke().await?;
  assert_eq!(lines(&output.stdout), vec!["-o", "foo.o", "-c", "bar.c"]);
  assert!(output.stderr.is_empty());
  Ok(())
}

#[tokio::test]
async fn linking_appends_rpath() -> eyre::Result<()> {
  let deployment = Deployment::new()?;
  let command = deployment.command(&["-lfoo", "-o", "libbar.dylib"], &[(
    "TEA_PREFIX",
    OsStr::new("/opt/tea"),
  )]);
  let output = command.invoke().await?;
  assert_eq!(lines(&output.stdout), vec![
    "-lfoo",
    "-o",
    "libbar.dylib",
    "-Wl,-rpath,/opt/tea"
  ]);
  Ok(())
}

#[tokio::test]
async fn duplicate_rpaths_collapse() -> eyre::Result<()> {
  let deployment = Deployment::new()?;
  let command = deployment.command(
    &["-Wl,-rpath,/opt/tea", "-Wl,-rpath,/opt/tea", "-lfoo"],
    &[("TEA_PREFIX", OsStr::new("/opt/tea"))],
  );
  let output = command.invoke().await?;
  assert_eq!(lines(&output.stdout), vec!["-lfoo", "-Wl,-rpath,/opt/tea"]);
  Ok(())
}

#[tokio::test]
async fn exit_code_passes_through() -> eyre::Result<()> {
  let deployment = Deployment::new()?;
  let command = deployment.command(&["-c", "a.c"], &[
    ("TEA_PREFIX", OsStr::new("/opt/tea")),
    ("FAKE_CC_EXIT", OsStr::new("7")),
  ]);
  let status = command.delegate().await?;
  assert_eq!(exe::exit_code_of(status), 7);
  Ok(())
}

/// The captured output of a shim run that is expected to fail.
fn failure_output(result: Result<sync::RawOutput, exe::CommandErrorWrapper>) -> String {
  match result {
    Err(exe::CommandErrorWrapper {
      error: exe::CommandError::NonZeroExit(_),
      context,
      ..
    }) => context,
    r => panic!("unexpected result: {:?}", r),
  }
}

#[tokio::test]
async fn missing_prefix_query_is_fatal() -> eyre::Result<()> {
  let deployment = Deployment::new()?;
  /* An empty TEA_PREFIX falls back to `tea --prefix`, which is not on PATH. */
  let command = deployment.command(&["-lfoo"], &[
    ("TEA_PREFIX", OsStr::new("")),
    ("PATH", deployment.empty_path.as_os_str()),
  ]);
  let output = failure_output(command.invoke().await);
  /* The fake delegate never ran. */
  assert!(output.contains(r#"stdout: """#), "{}", output);
  assert!(!output.contains(r#"stderr: """#), "{}", output);
  assert!(output.contains("could not resolve prefix"), "{}", output);
  Ok(())
}

#[tokio::test]
async fn missing_delegate_is_fatal() -> eyre::Result<()> {
  let deployment = Deployment::new()?;
  fs::remove_file(deployment.delegate_dir.join("cc"))?;
  let command = deployment.command(&["-c", "a.c"], &[("TEA_PREFIX", OsStr::new("/opt/tea"))]);
  let output = failure_output(command.invoke().await);
  assert!(output.contains(r#"stdout: """#), "{}", output);
  assert!(output.contains("failed to hand off"), "{}", output);
  assert!(output.contains("real/cc"), "{}", output);
  Ok(())
}

#[tokio::test]
async fn missing_delegate_exit_code() -> eyre::Result<()> {
  let deployment = Deployment::new()?;
  fs::remove_file(deployment.delegate_dir.join("cc"))?;
  let command = deployment.command(&["-c", "a.c"], &[("TEA_PREFIX", OsStr::new("/opt/tea"))]);
  let status = command.delegate().await?;
  assert_ne!(exe::exit_code_of(status), 0);
  Ok(())
}

#[tokio::test]
async fn silent_prefix_query_still_delegates() -> eyre::Result<()> {
  let deployment = Deployment::new()?;
  /* A `tea` which succeeds without printing anything. */
  let tea = deployment.empty_path.join("tea");
  fs::write(&tea, "#!/bin/sh\nexit 0\n")?;
  fs::set_permissions(&tea, fs::Permissions::from_mode(0o755))?;
  let command = deployment.command(&["-lfoo"], &[
    ("TEA_PREFIX", OsStr::new("")),
    ("PATH", deployment.empty_path.as_os_str()),
  ]);
  let output = command.invoke().await?;
  assert_eq!(lines(&output.stdout), vec!["-lfoo", "-Wl,-rpath,"]);
  Ok(())
}
