//! Shared helpers for integration tests: fixture lookup and running the
//! `iceflow` binary.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Absolute path of a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Contents of a fixture file.
pub fn fixture_text(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("fixture readable")
}

/// Copies a fixture into `dir` and returns the new path.
pub fn copy_fixture(name: &str, dir: &Path) -> PathBuf {
    let dest = dir.join(name);
    std::fs::copy(fixture_path(name), &dest).expect("fixture copied");
    dest
}

/// Runs the `iceflow` binary to completion with logging pinned down.
pub fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_iceflow"))
        .args(args)
        .env_remove("ICEFLOW_LOG_LEVEL")
        .env_remove("ICEFLOW_LOG_FORMAT")
        .env_remove("ICEFLOW_EXPAND_ENV")
        .env("ICEFLOW_COLOR", "never")
        .output()
        .expect("failed to run iceflow")
}

/// Stdout of a finished process as a string.
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Stderr of a finished process as a string.
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
