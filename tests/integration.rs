use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Command with an isolated config directory and colours off.
fn crudbench_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("crudbench").unwrap();
    cmd.env("HOME", home.path());
    cmd.env("XDG_CONFIG_HOME", home.path().join(".config"));
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn parse_json(stdout: &[u8]) -> serde_json::Value {
    serde_json::from_slice(stdout).expect("output should be valid JSON")
}

// ---- Backend selection ----

#[test]
fn unknown_backend_fails_before_any_round() {
    let tmp = TempDir::new().unwrap();
    crudbench_cmd(&tmp)
        .arg("mongo")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Wrong backend provided: 'mongo'"))
        .stderr(predicate::str::contains("round").not())
        .stdout(predicate::str::is_empty());
}

#[test]
fn missing_backend_is_a_usage_error() {
    let tmp = TempDir::new().unwrap();
    crudbench_cmd(&tmp).assert().failure();
}

// ---- Table output ----

#[test]
fn memory_backend_prints_summary_table() {
    let tmp = TempDir::new().unwrap();
    crudbench_cmd(&tmp)
        .args(["memory", "--count", "50", "--rounds", "3", "--warmup", "1"])
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "using memory backend, 3 rounds (+1 warm up), 50 items",
        ))
        .stderr(predicate::str::contains("\rround"))
        .stdout(predicate::str::contains("insert"))
        .stdout(predicate::str::contains("remove"))
        .stdout(predicate::str::contains("min"))
        .stdout(predicate::str::contains("avg"))
        .stdout(predicate::str::contains("max"))
        .stdout(predicate::str::contains("3 measured rounds"));
}

#[test]
fn sqlite_backend_runs() {
    let tmp = TempDir::new().unwrap();
    crudbench_cmd(&tmp)
        .args(["sqlite", "-c", "20", "-r", "2", "-w", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 measured rounds"));
}

#[test]
fn sqlite_file_backend_uses_db_path() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.child("bench.sqlite");
    crudbench_cmd(&tmp)
        .args(["sqlite-file", "-c", "10", "-r", "1", "-w", "0", "--db-path"])
        .arg(db.path())
        .assert()
        .success();
    db.assert(predicate::path::exists());
}

// ---- JSON output ----

#[test]
fn json_output_valid() {
    let tmp = TempDir::new().unwrap();
    let output = crudbench_cmd(&tmp)
        .args(["memory", "-c", "10", "-r", "2", "-w", "1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed = parse_json(&output.stdout);
    assert_eq!(parsed["backend"], "memory");
    assert_eq!(parsed["count"], 10);
    assert_eq!(parsed["rounds"], 2);
    assert_eq!(parsed["warmup"], 1);
    assert_eq!(parsed["warmup_rounds"].as_array().unwrap().len(), 1);
    assert_eq!(parsed["measured_rounds"].as_array().unwrap().len(), 2);

    let summary = &parsed["summary"];
    for bucket in ["insert", "find", "update", "remove", "all"] {
        let min = summary["min"][bucket].as_f64().unwrap();
        let avg = summary["avg"][bucket].as_f64().unwrap();
        let max = summary["max"][bucket].as_f64().unwrap();
        assert!(min <= avg + 1e-9 && avg <= max + 1e-9, "{bucket}: {min} {avg} {max}");
    }
}

#[test]
fn json_rounds_keep_all_as_sum() {
    let tmp = TempDir::new().unwrap();
    let output = crudbench_cmd(&tmp)
        .args(["memory", "-c", "10", "-r", "3", "-w", "0", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed = parse_json(&output.stdout);
    for round in parsed["measured_rounds"].as_array().unwrap() {
        let sum: f64 = ["insert", "find", "update", "remove"]
            .iter()
            .map(|b| round[*b].as_f64().unwrap())
            .sum();
        assert!((round["all"].as_f64().unwrap() - sum).abs() < 1e-6);
    }
}

// ---- Round plan validation ----

#[test]
fn zero_measured_rounds_is_reported() {
    let tmp = TempDir::new().unwrap();
    crudbench_cmd(&tmp)
        .args(["memory", "--rounds", "0", "--warmup", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No rounds left to aggregate"))
        .stdout(predicate::str::is_empty());
}

#[cfg(target_pointer_width = "64")]
#[test]
fn overflowing_round_count_is_reported() {
    let tmp = TempDir::new().unwrap();
    crudbench_cmd(&tmp)
        .args(["memory", "-c", "1", "--warmup", "1", "--rounds"])
        .arg(usize::MAX.to_string())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Too many rounds"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn zero_find_repeat_is_reported() {
    let tmp = TempDir::new().unwrap();
    crudbench_cmd(&tmp)
        .args(["memory", "--find-repeat", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Repeat count for 'find'"));
}

// ---- Config file ----

#[test]
fn config_file_sets_parameters() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.child("bench.toml");
    config.write_str("count = 5\nrounds = 2\nwarmup = 0\n").unwrap();

    crudbench_cmd(&tmp)
        .arg("memory")
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("2 rounds (+0 warm up), 5 items"));
}

#[test]
fn cli_flags_override_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.child("bench.toml");
    config.write_str("count = 5\nrounds = 2\nwarmup = 0\n").unwrap();

    crudbench_cmd(&tmp)
        .args(["memory", "--rounds", "1", "--config"])
        .arg(config.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("1 rounds (+0 warm up), 5 items"));
}

#[cfg(target_os = "linux")]
#[test]
fn default_config_location_is_read() {
    let tmp = TempDir::new().unwrap();
    tmp.child(".config/crudbench/config.toml")
        .write_str("count = 3\nrounds = 1\nwarmup = 0\n")
        .unwrap();

    crudbench_cmd(&tmp)
        .arg("memory")
        .assert()
        .success()
        .stderr(predicate::str::contains("1 rounds (+0 warm up), 3 items"));
}

#[test]
fn malformed_config_file_fails() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.child("bench.toml");
    config.write_str("count = \"many\"\n").unwrap();

    crudbench_cmd(&tmp)
        .arg("memory")
        .arg("--config")
        .arg(config.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse config file"));
}

// ---- Verbose ----

#[test]
fn verbose_prints_measurement_lines() {
    let tmp = TempDir::new().unwrap();
    crudbench_cmd(&tmp)
        .args(["memory", "-c", "5", "-r", "1", "-w", "0", "--verbose"])
        .assert()
        .success()
        .stderr(predicate::str::contains("ops/s"))
        .stderr(predicate::str::contains("insert"))
        .stderr(predicate::str::contains("remove"));
}
