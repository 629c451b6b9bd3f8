//! One-shot 命令端到端测试（内置模拟器）

use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    Command::cargo_bin("tmcl-cli").unwrap()
}

#[test]
fn test_position_on_simulator() {
    cli()
        .args(["--port", "sim", "position"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Connected successfully! Current position: 0"))
        .stdout(predicate::str::contains("Disconnected from motor"));
}

#[test]
fn test_move_absolute_logs() {
    cli()
        .args(["--port", "sim", "move", "--absolute", "500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Moving to absolute position: 500"));
}

#[test]
fn test_invalid_address_fails() {
    cli()
        .args(["--port", "sim", "--address", "0", "position"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid argument"));
}

#[test]
fn test_negative_velocity_fails() {
    cli()
        .args(["--port", "sim", "rotate", "left", "--velocity", "-5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("velocity"));
}

#[test]
fn test_missing_port_fails() {
    cli()
        .arg("stop")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--port"));
}

#[test]
fn test_monitor_prints_snapshots() {
    cli()
        .args(["--port", "sim", "--poll-ms", "100", "monitor", "--duration-secs", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("position=0 speed=0"));
}
