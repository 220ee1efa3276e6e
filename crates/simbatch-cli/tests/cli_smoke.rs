#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::{json, Value};

const JOB: &str = r#"cfg="${1#*=}"
grep -q '"rate": 2' "$cfg" && { echo "rate 2 unsupported" 1>&2; exit 5; }
echo ok
"#;

fn write_plan(dir: &Path) -> std::path::PathBuf {
    fs::write(dir.join("job.sh"), JOB).expect("job");
    let plan = dir.join("plan.yaml");
    fs::write(
        &plan,
        r#"
output_root: results
launcher: { kind: command, program: sh, args: [job.sh], working_dir: . }
inputs:
  - { name: rate, default: 1, config_key: rate }
  - { name: mode, default: "a" }
axes:
  - { name: rate, values: [1, 2] }
  - { name: mode, values: ["a", "b"] }
"#,
    )
    .expect("plan");
    plan
}

fn simbatch() -> Command {
    Command::new(env!("CARGO_BIN_EXE_simbatch"))
}

#[test]
fn enumerate_prints_points_in_run_order() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = write_plan(temp.path());
    let output = simbatch()
        .args(["enumerate", "--plan"])
        .arg(&plan)
        .output()
        .expect("spawn");
    assert!(output.status.success());
    let lines: Vec<Value> = String::from_utf8(output.stdout)
        .expect("utf8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(
        lines,
        vec![
            json!({"index": 0, "point": {"rate": 1, "mode": "a"}}),
            json!({"index": 1, "point": {"rate": 1, "mode": "b"}}),
            json!({"index": 2, "point": {"rate": 2, "mode": "a"}}),
            json!({"index": 3, "point": {"rate": 2, "mode": "b"}}),
        ]
    );
}

#[test]
fn run_exits_nonzero_when_a_job_fails() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = write_plan(temp.path());
    let output = simbatch()
        .args(["run", "--parallelism", "2", "--plan"])
        .arg(&plan)
        .output()
        .expect("spawn");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("2 of 4 runs failed"), "stderr: {stderr}");

    let root = String::from_utf8(output.stdout).expect("utf8");
    let root = Path::new(root.trim());
    for index in 0..4 {
        assert!(root.join("runs").join(index.to_string()).join("out/stdout.txt").is_file());
    }
    let report: Value =
        serde_json::from_slice(&fs::read(root.join("campaign.json")).expect("report")).expect("json");
    assert_eq!(report["failed"], json!(2));
    assert_eq!(report["runs"][2]["status"], json!("failed"));
    assert_eq!(report["runs"][1]["status"], json!("succeeded"));
}
