mod common;

use common::{copy_fixture, fixture_path, run, stderr, stdout};

fn fixture_arg(name: &str) -> String {
    fixture_path(name).to_str().unwrap().to_string()
}

#[test]
fn validate_valid_config() {
    let output = run(&["validate", &fixture_arg("ice_xi_250_to_100.yaml")]);
    assert!(
        output.status.success(),
        "validate should succeed for valid config: {}",
        stderr(&output)
    );
    assert!(stdout(&output).contains("ice_xi_250_to_100.yaml: ok"));
}

#[test]
fn validate_invalid_config() {
    let output = run(&["validate", &fixture_arg("missing_seed.yaml")]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("missing required field 'seed'"));
}

#[test]
fn validate_checks_every_file() {
    let output = run(&[
        "validate",
        &fixture_arg("bad_yaml.yaml"),
        &fixture_arg("ice_xi_small.yaml"),
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("ice_xi_small.yaml: ok"));
    assert!(stderr(&output).contains("1 file(s) failed validation"));
}

#[test]
fn validate_missing_file() {
    let output = run(&["validate", "/tmp/nonexistent_iceflow_test_file.yaml"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("file not found"));
}

#[test]
fn validate_glob() {
    let pattern = fixture_arg("ice_xi_*.yaml");
    let output = run(&["validate", "--format", "json", &pattern]);
    assert!(output.status.success(), "{}", stderr(&output));

    let parsed: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("output should be valid JSON");
    assert_eq!(parsed["summary"]["total"], 2);
    assert_eq!(parsed["summary"]["valid"], 2);
}

#[test]
fn validate_glob_without_match_is_usage_error() {
    let pattern = fixture_arg("nothing_*.yaml");
    let output = run(&["validate", &pattern]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn validate_json_output() {
    let output = run(&[
        "validate",
        "--format",
        "json",
        &fixture_arg("with_warnings.yaml"),
        &fixture_arg("missing_seed.yaml"),
    ]);
    assert_eq!(output.status.code(), Some(2));

    let parsed: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("output should be valid JSON");
    let files = parsed["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["valid"], true);
    assert_eq!(files[0]["warnings"].as_array().unwrap().len(), 2);
    assert_eq!(files[1]["valid"], false);
    assert_eq!(files[1]["error"], "missing required field 'seed'");
    assert_eq!(parsed["summary"]["invalid"], 1);
}

#[test]
fn validate_prints_warnings() {
    let output = run(&["validate", &fixture_arg("with_warnings.yaml")]);
    assert!(output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Unknown key 'reportng'"), "{err}");
    assert!(err.contains("not divisible"), "{err}");
}

#[test]
fn validate_strict_fails_on_warnings() {
    let output = run(&["validate", "--strict", &fixture_arg("with_warnings.yaml")]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("treated as errors"));
}

#[test]
fn show_yaml_materializes_defaults() {
    let output = run(&["show", &fixture_arg("ice_xi_small.yaml")]);
    assert!(output.status.success(), "{}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("global_step: 0"));
    assert!(text.contains("energy_error_handling: log_warning"));
    assert!(text.contains("num_repetitions: 1"));
}

#[test]
fn show_json() {
    let output = run(&["show", "--format", "json", &fixture_arg("ice_xi_250_to_100.yaml")]);
    assert!(output.status.success(), "{}", stderr(&output));

    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed["seed"], 42);
    assert_eq!(parsed["reporting"]["num_samples"], 10_000);
    assert!(parsed["reporting"]["plot_quaternions"].is_null());
    assert_eq!(parsed["model"]["target"]["temperature"], 100.0);
}

#[test]
fn show_output_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&["show", &fixture_arg("ice_xi_250_to_100.yaml")]);
    let copy = dir.path().join("normalized.yaml");
    std::fs::write(&copy, output.stdout).unwrap();

    let output = run(&["validate", copy.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
}

#[test]
fn step_records_progress() {
    let dir = tempfile::tempdir().unwrap();
    let path = copy_fixture("ice_xi_small.yaml", dir.path());
    let path_arg = path.to_str().unwrap();

    let output = run(&["step", path_arg, "1500"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("global_step 0 -> 1500"));

    let output = run(&["step", path_arg, "100"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("--force"));

    let output = run(&["step", "--force", path_arg, "100"]);
    assert!(output.status.success(), "{}", stderr(&output));
}

#[test]
fn step_keeps_env_references() {
    let dir = tempfile::tempdir().unwrap();
    let path = copy_fixture("ice_xi_small.yaml", dir.path());
    let text = std::fs::read_to_string(&path).unwrap().replacen(
        "path: data/water/ice_XI",
        "path: ${ICEFLOW_IT_STEP_ROOT_UNSET:-data/water/ice_XI}",
        1,
    );
    std::fs::write(&path, text).unwrap();
    let path_arg = path.to_str().unwrap();

    let output = run(&["--expand-env", "step", path_arg, "250"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("${ICEFLOW_IT_STEP_ROOT_UNSET:-data/water/ice_XI}"), "{written}");
    assert!(written.contains("global_step: 250"), "{written}");
}

#[test]
fn show_keeps_references_without_expand_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = copy_fixture("ice_xi_small.yaml", dir.path());
    let text = std::fs::read_to_string(&path).unwrap().replacen(
        "path: data/water/ice_XI",
        "path: ${ICEFLOW_IT_SHOW_ROOT_UNSET:-/scratch}",
        1,
    );
    std::fs::write(&path, text).unwrap();
    let path_arg = path.to_str().unwrap();

    let output = run(&["show", "--format", "json", path_arg]);
    assert!(output.status.success(), "{}", stderr(&output));
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed["model"]["base"]["path"], "${ICEFLOW_IT_SHOW_ROOT_UNSET:-/scratch}");

    let output = run(&["show", "--expand-env", "--format", "json", path_arg]);
    assert!(output.status.success(), "{}", stderr(&output));
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed["model"]["base"]["path"], "/scratch");
}

#[test]
fn step_missing_file_is_io_error() {
    let output = run(&["step", "/tmp/nonexistent_iceflow_step.yaml", "1"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn completions_bash() {
    let output = run(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("iceflow"));
}

#[test]
fn version_human() {
    let output = run(&["version"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("iceflow "));
}

#[test]
fn version_json() {
    let output = run(&["version", "--format", "json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed["name"], "iceflow");
}

#[test]
fn quiet_suppresses_warnings() {
    let output = run(&["--quiet", "validate", &fixture_arg("with_warnings.yaml")]);
    assert!(output.status.success());
    assert!(!stderr(&output).contains("reportng"));
}
