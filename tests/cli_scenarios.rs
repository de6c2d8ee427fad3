//! CLI runs over the bundled scenario files and presets.

use std::process::Command;

fn run_cli(args: &[&str]) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_vpp-dispatch"))
        .args(args)
        .output()
        .expect("vpp-dispatch process should run");
    (
        output.status.success(),
        String::from_utf8(output.stdout).expect("stdout should be valid UTF-8"),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    )
}

fn parse_metric(stdout: &str, label: &str) -> f64 {
    let line = stdout
        .lines()
        .find(|line| line.trim_start().starts_with(label))
        .unwrap_or_else(|| panic!("missing line `{label}` in output: {stdout}"));

    let raw = line
        .split_once(':')
        .map(|(_, right)| right.trim())
        .unwrap_or_else(|| panic!("invalid format for line `{line}`"));

    raw.parse::<f64>()
        .unwrap_or_else(|_| panic!("failed parsing `{raw}` from line `{line}`"))
}

#[test]
fn scenario_files_run_via_cli() {
    for path in [
        "scenarios/demo.toml",
        "scenarios/fixed_thresholds.toml",
        "scenarios/business_park.toml",
    ] {
        let (ok, stdout, stderr) = run_cli(&["--scenario", path]);
        assert!(ok, "scenario run failed for {path}: stderr={stderr}");
        assert!(stdout.contains("--- Economic Summary ---"), "{path}: {stdout}");
        let baseline = parse_metric(&stdout, "Baseline cost:");
        let dispatched = parse_metric(&stdout, "Dispatched cost:");
        let savings = parse_metric(&stdout, "Savings:");
        assert!(
            (baseline - dispatched - savings).abs() < 0.02,
            "{path}: {baseline} - {dispatched} != {savings}"
        );
    }
}

#[test]
fn demo_file_matches_demo_preset() {
    let (_, from_file, _) = run_cli(&["--scenario", "scenarios/demo.toml"]);
    let (_, from_preset, _) = run_cli(&["--preset", "demo"]);
    assert_eq!(from_file, from_preset);
}

#[test]
fn seed_override_changes_the_run() {
    let (_, a, _) = run_cli(&["--preset", "demo"]);
    let (ok, b, stderr) = run_cli(&["--preset", "demo", "--seed", "1234"]);
    assert!(ok, "{stderr}");
    assert_ne!(a, b);
}

#[test]
fn plan_out_writes_csv() {
    let path = std::env::temp_dir().join(format!("vpp-dispatch-cli-{}.csv", std::process::id()));
    let path_str = path.to_str().expect("utf-8 temp path");
    let (ok, _, stderr) = run_cli(&["--preset", "tight_storage", "--plan-out", path_str]);
    assert!(ok, "{stderr}");

    let csv = std::fs::read_to_string(&path).expect("plan CSV written");
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some(vpp_dispatch::io::export::PLAN_HEADER));
    assert_eq!(lines.count(), 24);
    std::fs::remove_file(path).ok();
}

#[test]
fn unknown_preset_fails() {
    let (ok, _, stderr) = run_cli(&["--preset", "nope"]);
    assert!(!ok);
    assert!(stderr.contains("unknown preset"), "{stderr}");
}

#[test]
fn invalid_scenario_reports_every_field() {
    let path = std::env::temp_dir().join(format!("vpp-dispatch-bad-{}.toml", std::process::id()));
    std::fs::write(&path, "[horizon]\nhistory_days = 0\n\n[storage]\nefficiency = 1.5\n")
        .expect("write scenario");
    let path_str = path.to_str().expect("utf-8 temp path");
    let (ok, _, stderr) = run_cli(&["--scenario", path_str]);
    assert!(!ok);
    assert!(stderr.contains("horizon.history_days"), "{stderr}");
    assert!(stderr.contains("storage.efficiency"), "{stderr}");
    std::fs::remove_file(path).ok();
}
