use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_econstat"))
}

fn repo_root() -> PathBuf {
    // crates/ec-cli -> repo root
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").canonicalize().unwrap()
}

fn fixture_path(name: &str) -> String {
    repo_root().join("tests/fixtures").join(name).to_string_lossy().into_owned()
}

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("econstat_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn stdout_json(out: &Output) -> serde_json::Value {
    assert!(out.status.success(), "command failed, stderr={}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).expect("stdout should be valid JSON")
}

fn param(v: &serde_json::Value, name: &str) -> f64 {
    v["params"][name].as_f64().unwrap_or_else(|| panic!("missing param {name}: {v}"))
}

#[test]
fn ols_recovers_line_and_drops_missing_rows() {
    let line = fixture_path("line.csv");
    let out = run(&["analyze", "-i", &line, "-m", "OLS", "--dependent", "y", "--base", "x"]);
    let v = stdout_json(&out);

    assert_eq!(v["method"], "OLS");
    assert!((param(&v, "x") - 2.0).abs() < 1e-6);
    assert!((param(&v, "const") - 1.0).abs() < 1e-6);
    assert!((v["r_squared"].as_f64().unwrap() - 1.0).abs() < 1e-6);
    let pkeys: Vec<&String> = v["pvalues"].as_object().unwrap().keys().collect();
    assert_eq!(pkeys, vec!["const", "x"]);
}

#[test]
fn text_format_prints_summary() {
    let line = fixture_path("line.csv");
    let out = run(&["analyze", "-i", &line, "-m", "ols", "--dependent", "y", "--base", "x", "--format", "text"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("OLS Regression Results"));
    assert!(text.contains("No. Observations"));
}

#[test]
fn output_file_receives_json() {
    let line = fixture_path("line.csv");
    let dest = tmp_path("ols.json");
    let out = run(&[
        "analyze",
        "-i",
        &line,
        "-m",
        "OLS",
        "--dependent",
        "y",
        "--base",
        "x",
        "-o",
        dest.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&dest).unwrap()).unwrap();
    assert_eq!(v["method"], "OLS");
    let _ = std::fs::remove_file(dest);
}

#[test]
fn iv_recovers_structural_coefficient() {
    let iv = fixture_path("iv.csv");
    let out = run(&[
        "analyze",
        "-i",
        &iv,
        "-m",
        "2SLS",
        "--dependent",
        "y",
        "--base",
        "x",
        "--instruments",
        "z",
        "--controls",
        "c",
    ]);
    let v = stdout_json(&out);
    assert_eq!(v["method"], "2SLS");
    assert!((param(&v, "x") - 1.2).abs() < 1e-3, "{v}");
    assert!((param(&v, "c") + 0.3).abs() < 1e-3, "{v}");
}

#[test]
fn panel_methods_report_regressors_only() {
    let panel = fixture_path("panel.csv");
    for method in ["FE", "RE"] {
        let out = run(&[
            "analyze",
            "-i",
            &panel,
            "-m",
            method,
            "--dependent",
            "y",
            "--exog",
            "x,w",
            "--entity",
            "country",
            "--time",
            "year",
        ]);
        let v = stdout_json(&out);
        assert_eq!(v["method"], method);
        let keys: Vec<&String> = v["params"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["const", "w", "x"], "{method}");
        assert_eq!(v["pvalues"].as_object().unwrap().len(), 3);
    }
}

#[test]
fn duplicate_panel_keys_fail() {
    let dup = fixture_path("panel_dup.csv");
    let out = run(&[
        "analyze",
        "-i",
        &dup,
        "-m",
        "FE",
        "--dependent",
        "y",
        "--exog",
        "x,w",
        "--entity",
        "country",
        "--time",
        "year",
    ]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("duplicate panel observation"), "stderr={stderr}");
    assert!(stderr.contains("usa") && stderr.contains("2001"), "stderr={stderr}");
}

#[test]
fn invalid_requests_fail_with_message() {
    let line = fixture_path("line.csv");

    let out = run(&["analyze", "-i", &line, "-m", "GMM", "--dependent", "y", "--base", "x"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Unknown method"));

    let out = run(&["analyze", "-i", &line, "-m", "2SLS", "--dependent", "y", "--base", "x"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("instruments"));

    let out = run(&["analyze", "-i", &line, "-m", "OLS", "--dependent", "y", "--base", "gdp"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("'gdp' not found"));
}

#[test]
fn catalog_lists_default_indicators() {
    let v = stdout_json(&run(&["catalog"]));
    assert_eq!(v["gdp"], "NY.GDP.MKTP.CD");
    assert_eq!(v["inflation"], "FP.CPI.TOTL.ZG");
}

#[test]
fn excel_input_is_read() {
    let xlsx = fixture_path("firms.xlsx");
    // Only two rows of the workbook are complete, which is too few for OLS with an intercept.
    let out = run(&["analyze", "-i", &xlsx, "-m", "OLS", "--dependent", "sales", "--base", "ads"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("insufficient data (2 usable rows"), "stderr={stderr}");
}
