mod discord_stub;

use std::fs;
use std::path::Path;

use discord_stub::DiscordStub;
use predicates::prelude::*;

struct Dirs {
    data: tempfile::TempDir,
    sheets: tempfile::TempDir,
}

fn dirs() -> Dirs {
    let dirs = Dirs {
        data: tempfile::TempDir::new().expect("create data dir"),
        sheets: tempfile::TempDir::new().expect("create sheets dir"),
    };
    write_sheet(
        dirs.sheets.path(),
        "alpha",
        "1,✅,✅,✅,✅,,Ana,Bo,Cy\n2,,,,,,,,\n",
    );
    write_sheet(dirs.sheets.path(), "beta", "3,,,,,,,,\n");
    dirs
}

fn write_sheet(dir: &Path, series: &str, rows: &str) {
    let csv = format!(
        "{series}\nChapter,RAW uploaded,Translation done,Clean done,Type done,Published,Translator,Cleaner,Typer\n{rows}"
    );
    fs::write(dir.join(format!("{series}.csv")), csv).expect("write sheet");
}

fn stagewatch(dirs: &Dirs) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("stagewatch");
    cmd.env_remove("RUST_LOG")
        .env_remove("STAGEWATCH_DISCORD_TOKEN")
        .env_remove("STAGEWATCH_DISCORD_CHANNEL_ID")
        .env_remove("STAGEWATCH_DISCORD_API_BASE")
        .arg("--data-dir")
        .arg(dirs.data.path())
        .arg("--sheets-dir")
        .arg(dirs.sheets.path());
    cmd
}

#[test]
fn alias_commands_round_trip() {
    let dirs = dirs();

    stagewatch(&dirs)
        .args(["alias", "add", "dir", "the-director-full-title"])
        .assert()
        .success()
        .stdout("dir -> the-director-full-title\n");
    stagewatch(&dirs)
        .args(["alias", "resolve", "dir"])
        .assert()
        .success()
        .stdout("the-director-full-title\n");
    stagewatch(&dirs)
        .args(["alias", "resolve", "unknown"])
        .assert()
        .success()
        .stdout("unknown\n");
    assert!(dirs.data.path().join("aliases.json").exists());
}

#[test]
fn pausing_a_series_removes_it_from_raw_pending() {
    let dirs = dirs();

    stagewatch(&dirs)
        .args(["status", "raw-pending"])
        .assert()
        .success()
        .stdout(predicate::str::contains("chapter 3 of beta"));

    stagewatch(&dirs)
        .args(["pause", "beta"])
        .assert()
        .success()
        .stdout("Paused beta.\n");
    stagewatch(&dirs)
        .args(["pause", "beta"])
        .assert()
        .success()
        .stdout("beta was already paused.\n");

    stagewatch(&dirs)
        .args(["status", "raw-pending"])
        .assert()
        .success()
        .stdout("✅ Every next chapter already has its RAW.\n");
}

#[test]
fn invalid_calendar_rule_is_rejected() {
    let dirs = dirs();

    stagewatch(&dirs)
        .args(["calendar", "set", "alpha", "monday", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mixes weekdays and days of month"));
    assert!(!dirs.data.path().join("calendar.json").exists());
}

#[test]
fn check_dry_run_prints_the_batch() {
    let dirs = dirs();

    stagewatch(&dirs)
        .args(["check", "--dry-run", "--weekly", "--date", "2026-10-18"])
        .assert()
        .success()
        .stdout(predicate::str::contains("chapter 3 of beta"))
        .stdout(predicate::str::contains("Chapter 1 of alpha is ready to publish"))
        .stdout(predicate::str::contains("Weekly summary: 1 series"));
}

#[test]
fn check_without_discord_settings_fails() {
    let dirs = dirs();

    stagewatch(&dirs)
        .args(["check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("STAGEWATCH_DISCORD_TOKEN"));
}

#[test]
fn check_delivers_every_message_to_discord() {
    let dirs = dirs();
    let stub = DiscordStub::spawn(Vec::new());

    stagewatch(&dirs)
        .env("STAGEWATCH_DISCORD_TOKEN", "test-token")
        .env("STAGEWATCH_DISCORD_CHANNEL_ID", "99")
        .env("STAGEWATCH_DISCORD_API_BASE", &stub.api_base)
        .args(["check", "--date", "2026-10-15"])
        .assert()
        .success();

    let delivered = stub.delivered();
    assert_eq!(delivered.len(), 2);
    assert!(delivered[0].content.contains("chapter 3 of beta"));
    assert!(delivered[1].content.contains("Chapter 1 of alpha"));
    assert!(
        delivered
            .iter()
            .all(|r| r.path == "/api/v10/channels/99/messages")
    );
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() {
    let dirs = dirs();

    stagewatch(&dirs)
        .env("RUST_LOG", "debug")
        .args(["exclusions"])
        .assert()
        .success()
        .stdout("Paused: (none)\nSolo: (none)\n")
        .stderr(predicate::str::contains("parsed cli"));
}
