use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Command;

fn h2h_book(key: &str, celtics: f64, heat: f64) -> Value {
    json!({
        "key": key,
        "title": key,
        "last_update": "2026-01-09T20:00:00Z",
        "markets": [{
            "key": "h2h",
            "outcomes": [
                {"name": "Boston Celtics", "price": celtics},
                {"name": "Miami Heat", "price": heat}
            ]
        }]
    })
}

fn write_feed(name: &str) -> PathBuf {
    let feed = json!({
        "basketball_nba": [{
            "id": "evt-nba-1",
            "sport_key": "basketball_nba",
            "home_team": "Boston Celtics",
            "away_team": "Miami Heat",
            "commence_time": "2026-01-10T00:30:00Z",
            "bookmakers": [
                h2h_book("pinnacle", 1.6667, 2.3),
                h2h_book("fanduel", 1.6667, 2.3),
                h2h_book("betmgm", 1.8, 2.5),
            ]
        }]
    });

    let path = std::env::temp_dir().join(format!("evscan-{}-{name}.json", std::process::id()));
    std::fs::write(&path, feed.to_string()).unwrap();
    path
}

fn evscan(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_evscan"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

#[test]
fn test_analyze_saved_feed_as_json() {
    let feed = write_feed("json");
    let output = evscan(&[
        "analyze",
        "--input",
        feed.to_str().unwrap(),
        "--config",
        "does/not/exist.toml",
        "--json",
    ]);
    std::fs::remove_file(&feed).ok();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    let opportunities = report["opportunities"].as_array().unwrap();
    assert_eq!(opportunities.len(), 2);
    assert_eq!(opportunities[0]["Bet Description"], "Miami Heat");
    assert_eq!(opportunities[0]["Recommended Action"], "Bet at betmgm");
    assert_eq!(report["stats"]["events_seen"], 1);
}

#[test]
fn test_analyze_limit_and_table() {
    let feed = write_feed("table");
    let output = evscan(&[
        "analyze",
        "--input",
        feed.to_str().unwrap(),
        "--config",
        "does/not/exist.toml",
        "--limit",
        "1",
    ]);
    std::fs::remove_file(&feed).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Miami Heat"));
    assert!(stdout.contains("(showing 1 of 2)"));
}

#[test]
fn test_analyze_missing_input_fails() {
    let output = evscan(&["analyze", "--input", "does/not/exist.json"]);
    assert!(!output.status.success());
}
