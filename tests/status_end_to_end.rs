use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use stagewatch::app::source::CsvDirSource;
use stagewatch::app::store::{Document, LocalFsDocumentStore, StateStore};
use stagewatch::calendar::CalendarRule;
use stagewatch::deadline::Deadline;
use stagewatch::status::{Lookahead, RawGap, ReadyChapter, StatusAggregator};

const HEADER: &str =
    "Chapter,RAW uploaded,Translation done,Clean done,Type done,Published,Translator,Cleaner,Typer";

fn write_sheet(dir: &Path, series: &str, rows: &[&str]) -> anyhow::Result<()> {
    let mut csv = format!("{series},,,,,,,,\n{HEADER}\n");
    for row in rows {
        csv.push_str(row);
        csv.push('\n');
    }
    fs::write(dir.join(format!("{series}.csv")), csv)?;
    Ok(())
}

struct Fixture {
    _sheets: tempfile::TempDir,
    data: tempfile::TempDir,
    aggregator: StatusAggregator,
}

fn fixture() -> anyhow::Result<Fixture> {
    let sheets = tempfile::TempDir::new()?;
    let data = tempfile::TempDir::new()?;

    write_sheet(
        sheets.path(),
        "alpha",
        &[
            "1,✅,✅,✅,✅,,Ana,Bo,Cy",
            "2,,,,,,Ana,Bo,Cy",
        ],
    )?;
    write_sheet(sheets.path(), "beta", &["1,✅,✅,✅,✅,✅,,,", "3,,,,,,,,"])?;
    write_sheet(
        sheets.path(),
        "the-director-full-title",
        &["10,✅,✅,,,,Dee,,"],
    )?;
    write_sheet(sheets.path(), "CARPETAS", &["1,,,,,,,,"])?;
    fs::write(sheets.path().join("notes.txt"), "not a sheet")?;

    let source = CsvDirSource::new(sheets.path())
        .with_ignored(["CARPETAS".to_owned(), "DIA DE SUBIDA".to_owned()]);
    let aggregator = StatusAggregator::new(Arc::new(source), StateStore::local(data.path()));
    Ok(Fixture {
        _sheets: sheets,
        data,
        aggregator,
    })
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[tokio::test]
async fn alpha_is_ready_and_has_no_raw_gap() -> anyhow::Result<()> {
    let fx = fixture()?;

    let gaps = fx.aggregator.raw_pending_now().await?;
    assert!(gaps.iter().all(|g| g.series != "alpha"));
    assert_eq!(
        fx.aggregator.ready_to_publish().await?,
        Some(ReadyChapter {
            series: "alpha".to_owned(),
            chapter: "1".to_owned(),
        })
    );
    Ok(())
}

#[tokio::test]
async fn paused_series_disappears_from_raw_pending() -> anyhow::Result<()> {
    let fx = fixture()?;
    let store = fx.aggregator.store();

    assert_eq!(
        fx.aggregator.raw_pending_now().await?,
        vec![RawGap {
            series: "beta".to_owned(),
            chapter: "3".to_owned(),
        }]
    );

    store.set_paused("beta", true).await?;
    assert!(fx.aggregator.raw_pending_now().await?.is_empty());

    store.set_paused("beta", false).await?;
    assert_eq!(fx.aggregator.raw_pending_now().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn alias_resolves_with_identity_fallback() -> anyhow::Result<()> {
    let fx = fixture()?;
    let store = fx.aggregator.store();
    store.set_alias("dir", "the-director-full-title").await?;

    assert_eq!(store.resolve("dir").await?, "the-director-full-title");
    assert_eq!(store.resolve("unknown").await?, "unknown");

    let status = fx
        .aggregator
        .series_status(&store.resolve("dir").await?)
        .await?
        .expect("sheet is readable");
    assert_eq!(status.blocking.map(|(chapter, _)| chapter).as_deref(), Some("10"));
    Ok(())
}

#[tokio::test]
async fn report_combines_calendar_and_deadlines() -> anyhow::Result<()> {
    let fx = fixture()?;
    let store = fx.aggregator.store();
    // 2026-10-25 (today + 10) is a Sunday, 2026-10-22 (today + 7) a Thursday.
    store.set_rule("beta", CalendarRule::parse("domingo")?).await?;
    store
        .set_rule("the-director-full-title", CalendarRule::parse("22")?)
        .await?;
    store
        .set_deadline(
            "alpha",
            "2",
            Deadline {
                person: "Ana".to_owned(),
                due: "14/10/2026".to_owned(),
            },
        )
        .await?;
    store
        .set_deadline(
            "beta",
            "3",
            Deadline {
                person: "Bo".to_owned(),
                due: "not a date".to_owned(),
            },
        )
        .await?;

    let report = fx
        .aggregator
        .report(date(2026, 10, 15), Lookahead::default())
        .await?;

    assert_eq!(report.raw_lookahead.date, date(2026, 10, 25));
    assert_eq!(report.raw_lookahead.gaps.len(), 1);
    assert_eq!(report.raw_lookahead.gaps[0].series, "beta");
    assert_eq!(report.assignments.date, date(2026, 10, 22));
    assert_eq!(report.assignments.gaps.len(), 1);
    assert_eq!(report.assignments.gaps[0].chapter, "10");
    assert_eq!(report.overdue.len(), 1);
    assert_eq!(report.overdue[0].days_late, 1);
    Ok(())
}

#[tokio::test]
async fn stores_round_trip_through_json_files() -> anyhow::Result<()> {
    let fx = fixture()?;
    let store = fx.aggregator.store();
    store.set_solo("alpha", true).await?;
    store.set_rule("alpha", CalendarRule::parse("mon, sat")?).await?;

    let files = LocalFsDocumentStore::new(fx.data.path());
    let solo: Vec<String> = serde_json::from_slice(&fs::read(files.path(Document::Solo))?)?;
    assert_eq!(solo, vec!["alpha"]);
    let calendar: serde_json::Value =
        serde_json::from_slice(&fs::read(files.path(Document::Calendar))?)?;
    assert_eq!(
        calendar,
        serde_json::json!({ "alpha": { "kind": "weekday_set", "days": ["Mon", "Sat"] } })
    );
    assert!(!files.path(Document::Paused).exists());

    let reopened = StateStore::local(fx.data.path());
    assert!(reopened.exclusions().await?.solo.contains("alpha"));
    assert_eq!(
        reopened.calendar().await?.get("alpha"),
        Some(&CalendarRule::parse("saturday monday")?)
    );
    Ok(())
}
