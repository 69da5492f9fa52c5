use std::fs;
use std::path::Path;
use std::process::Command;

fn write(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path.to_string_lossy().into_owned()
}

fn run_pair(script: &str) -> (Option<i32>, String) {
    let dir = tempfile::tempdir().unwrap();
    let script_file = write(dir.path(), "script.yaml", script);
    let pair_file = write(
        dir.path(),
        "pair.yaml",
        r#"
primary_market: ETH-USD
secondary_market: BTC-USD
hedge_ratio: 0.052
z_score: 2.4
half_life: 11.5
primary: {size: "1.5", side: buy}
secondary: {size: "0.08", side: sell}
prices: {primary: "2000", secondary: "37500", failsafe: "1500"}
"#,
    );
    let log_file = dir.path().join("run.log").to_string_lossy().into_owned();
    let config_file = write(
        dir.path(),
        "executor.yaml",
        &format!(
            "exchange_name: scripted\n\
             scripted_exchange_file: {}\n\
             poll_interval_secs: 0\n\
             poll_attempts: 2\n\
             notifier: log\n\
             log_file: {}\n\
             pair_trade_file: {}\n",
            script_file, log_file, pair_file
        ),
    );

    let status = Command::new(env!("CARGO_BIN_EXE_pairleg"))
        .env("PAIRTRADE_CONFIG_PATH", &config_file)
        .env("RUST_LOG", "info")
        .status()
        .unwrap();
    let log = fs::read_to_string(&log_file).unwrap_or_default();
    (status.code(), log)
}

#[test]
fn unconfirmed_unwind_exits_with_code_one() {
    let (code, log) = run_pair(
        r#"
ETH-USD:
  - statuses: [filled]
  - statuses: [pending]
BTC-USD:
  - statuses: [canceled]
"#,
    );

    assert_eq!(code, Some(1));
    let notices: Vec<&str> = log.lines().filter(|l| l.contains("[NOTIFY]")).collect();
    assert_eq!(notices.len(), 2, "log was:\n{}", log);
    assert!(notices[0].ends_with("[NOTIFY] Error running close_primary_leg."));
    assert!(notices[1].ends_with("[NOTIFY] Exception: Could not close primary leg for ETH-USD."));
}

#[test]
fn confirmed_unwind_exits_cleanly() {
    let (code, log) = run_pair(
        r#"
ETH-USD:
  - statuses: [filled]
  - statuses: [filled]
BTC-USD:
  - statuses: [canceled]
"#,
    );

    assert_eq!(code, Some(0));
    assert!(!log.contains("[NOTIFY]"), "log was:\n{}", log);
}
