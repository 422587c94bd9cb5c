use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use nanofactory::devices::attenuator::encode_calibration;

const JOB: &str = r#"
coordinate_system:
  offset_x: 1.0
  offset_y: 2.0
shapes:
  - type: single_line
    start: {x: 0.0, y: 0.0}
    end: {x: 1.0, y: 0.0}
    feed: {F: 10.0}
  - type: vertical_line
    position: {x: 0.5, y: 0.5}
    z_min: 0.0
    z_max: 0.2
"#;

/// Binary isolated from settings files, the environment and the home directory
fn nanofactory(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("nanofactory").unwrap();
    cmd.current_dir(dir.path()).env("HOME", dir.path());
    for (key, _) in std::env::vars() {
        if key.starts_with("NANOFACTORY_") || key == "RUST_LOG" {
            cmd.env_remove(key);
        }
    }
    cmd
}

#[test]
fn test_info() {
    let dir = TempDir::new().unwrap();
    nanofactory(&dir)
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("nanofactory"))
        .stdout(predicate::str::contains("License: MIT"));

    nanofactory(&dir)
        .args(["info", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"operatingSystem\": \"OS independent\""));
}

#[test]
fn test_setup_snippets() {
    let dir = TempDir::new().unwrap();
    nanofactory(&dir)
        .args(["setup", "default", "--incremental"])
        .assert()
        .success()
        .stdout(predicate::str::contains("INCREMENTAL"))
        .stdout(predicate::str::contains("IFOV OFF"));

    nanofactory(&dir)
        .args(["setup", "ifov", "--ifov-size", "0.3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("IFOV SIZE 0.300000"));

    nanofactory(&dir)
        .args(["setup", "sideways"])
        .assert()
        .failure();
}

#[test]
fn test_draw_then_trace() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("job.yaml"), JOB).unwrap();

    nanofactory(&dir)
        .args(["draw", "job.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("' Shape 1: single_line"))
        .stdout(predicate::str::contains("' Shape 2: vertical_line"));

    nanofactory(&dir)
        .args(["draw", "job.yaml", "--output", "out/job.pgm"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Shapes: 2"));
    assert!(dir.path().join("out/job.pgm").exists());

    nanofactory(&dir)
        .args(["trace", "out/job.pgm", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"exposed_moves\": 2"));

    nanofactory(&dir)
        .args(["trace", "out/job.pgm", "--movements"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ON ]"))
        .stdout(predicate::str::contains("Exposed path"));
}

#[test]
fn test_draw_rejects_unknown_format() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("job.txt"), JOB).unwrap();
    nanofactory(&dir)
        .args(["draw", "job.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("job.txt"));
}

#[test]
fn test_status_on_dummy_controller() {
    let dir = TempDir::new().unwrap();
    nanofactory(&dir)
        .args(["--dummy", "status", "--tasks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Controller version"))
        .stdout(predicate::str::contains("Tasks:"));
}

#[test]
fn test_run_on_dummy_controller() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("prog.pgm"),
        "' move\nLINEAR X1.0 Y2.0\n\nLINEAR X0.0 Y0.0\n",
    )
    .unwrap();

    nanofactory(&dir)
        .args(["--dummy", "run", "prog.pgm"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sent 2 lines"));

    nanofactory(&dir)
        .args(["--dummy", "run", "missing.pgm"])
        .assert()
        .failure();

    nanofactory(&dir)
        .args(["--dummy", "run", "prog.pgm", "--task-id", "40", "--task"])
        .assert()
        .failure();
}

#[test]
fn test_plane_fit_with_container() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("points.csv"),
        "x,y,z\n0,0,1.0\n10,0,1.1\n0,10,0.9\n10,10,1.0\n",
    )
    .unwrap();

    nanofactory(&dir)
        .args(["plane-fit", "points.csv", "--container", "plane"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fitted plane"))
        .stdout(predicate::str::contains("plane.zdc"));
    assert!(dir.path().join("plane.zdc").exists());
}

#[test]
fn test_attenuator_conversion() {
    let dir = TempDir::new().unwrap();
    let pairs: Vec<[f64; 2]> = (0..=10).map(|i| [i as f64, 3.0 * i as f64]).collect();
    std::fs::write(dir.path().join("att.dat"), encode_calibration(&pairs)).unwrap();

    nanofactory(&dir)
        .args([
            "attenuator",
            "--calibration",
            "att.dat",
            "--fit",
            "linear",
            "--value",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.00 - 30.00 mW (11 steps)"))
        .stdout(predicate::str::contains("Value 2.0000 -> 6.0000 mW"));
}

#[test]
fn test_config_show_and_set() {
    let dir = TempDir::new().unwrap();
    nanofactory(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("controller_port = \"8000\""));

    nanofactory(&dir)
        .args(["config", "set", "controller_host", "10.1.1.1"])
        .assert()
        .success();
    assert!(dir.path().join("nanofactory.toml").exists());

    // picked up from the working directory on the next run
    nanofactory(&dir)
        .args(["config", "get", "controller_host"])
        .assert()
        .success()
        .stdout("10.1.1.1\n");

    nanofactory(&dir)
        .env("NANOFACTORY_CONTROLLER_HOST", "10.2.2.2")
        .args(["config", "get", "controller_host"])
        .assert()
        .success()
        .stdout("10.2.2.2\n");

    nanofactory(&dir)
        .args(["config", "set", "controller_port", "not-a-port"])
        .assert()
        .failure();

    nanofactory(&dir)
        .args(["config", "get", "no_such_key"])
        .assert()
        .failure();
}
