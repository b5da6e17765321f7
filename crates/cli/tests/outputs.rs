use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("pushlab-tests-{}-{}", prefix, nonce));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_pushlab"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("PushLab"));
    assert!(stdout.contains("test"));
    assert!(stdout.contains("run"));
}

#[test]
fn test_cli_missing_script() {
    let output = Command::new(env!("CARGO_BIN_EXE_pushlab"))
        .args(["test", "--script", "non_existent_script.yaml"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
}

#[test]
fn test_cli_test_mode_outputs() {
    let dir = temp_dir("outputs");

    // Board path is resolved relative to the script.
    let board = r#"
name: "four-leds"
window:
  base: 0xFF200000
  span: "20KiB"
registers:
  leds: 0x0
  switches: 0x40
  buttons: 0x50
led_count: 4
"#;
    std::fs::write(dir.join("board.yaml"), board).expect("Failed to write board");

    let script = r#"
schema_version: "1.0"
board: "board.yaml"
limits:
  max_ticks: 50
initial:
  counter: 15
steps:
  - buttons: [0]
  - buttons: []
  - buttons: [1]
  - buttons: []
  - buttons: [2]
  - buttons: []
  - buttons: [3]
    ticks: 4
assertions:
  - expected_leds: 14
  - expected_stop_reason: max_ticks
"#;
    let script_path = dir.join("script.yaml");
    std::fs::write(&script_path, script).expect("Failed to write script");

    let output_dir = dir.join("artifacts");
    let output = Command::new(env!("CARGO_BIN_EXE_pushlab"))
        .args([
            "test",
            "--script",
            script_path.to_str().unwrap(),
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let result_path = output_dir.join("result.json");
    assert!(result_path.exists());

    let result_content = std::fs::read_to_string(&result_path).unwrap();
    let result: serde_json::Value = serde_json::from_str(&result_content).unwrap();

    assert_eq!(result["status"], "pass");
    assert_eq!(result["stop_reason"], "max_ticks");
    assert_eq!(result["ticks"], 50);
    assert_eq!(result["final_leds"], 14);
    assert_eq!(result["last_event"], "none");
    // Seven presses and releases, then the release after the script ends.
    assert_eq!(result["metrics"]["actions"], 8);
    assert!(result["config"]["board"]
        .as_str()
        .unwrap()
        .contains("board.yaml"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_test_mode_sentinel_exit() {
    let dir = temp_dir("sentinel");
    let script = r#"
schema_version: "1.0"
limits:
  max_ticks: 1000
initial:
  switches: 5
steps:
  - buttons: [0, 1]
  - buttons: []
  - buttons: [2, 3]
    switches: 0
assertions:
  - expected_leds: 0
  - expected_stop_reason: sentinel
"#;
    let script_path = dir.join("script.yaml");
    std::fs::write(&script_path, script).expect("Failed to write script");

    let output_dir = dir.join("artifacts");
    let output = Command::new(env!("CARGO_BIN_EXE_pushlab"))
        .args([
            "test",
            "--script",
            script_path.to_str().unwrap(),
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());

    let result: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output_dir.join("result.json")).unwrap())
            .unwrap();
    assert_eq!(result["stop_reason"], "sentinel");
    assert_eq!(result["ticks"], 3);
    assert_eq!(result["counter"], 0);
    assert_eq!(result["last_event"], "multiple");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_test_mode_failed_assertion() {
    let dir = temp_dir("failing");
    let script = r#"
schema_version: "1.0"
limits:
  max_ticks: 5
steps:
  - buttons: [0]
assertions:
  - expected_leds: 2
"#;
    let script_path = dir.join("script.yaml");
    std::fs::write(&script_path, script).expect("Failed to write script");

    let output_dir = dir.join("artifacts");
    let output = Command::new(env!("CARGO_BIN_EXE_pushlab"))
        .args([
            "test",
            "--script",
            script_path.to_str().unwrap(),
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());

    let result: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output_dir.join("result.json")).unwrap())
            .unwrap();
    assert_eq!(result["status"], "fail");
    assert_eq!(result["final_leds"], 1);
    assert_eq!(result["assertions"][0]["passed"], false);

    let _ = std::fs::remove_dir_all(&dir);
}
