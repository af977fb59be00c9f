use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Assigned person and due date of one chapter.
///
/// `due` is kept as written so a hand-edited store with a bad value still loads; it is parsed
/// when lateness is computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    pub person: String,
    pub due: String,
}

/// Deadlines keyed by series, then chapter id.
pub type DeadlineBook = BTreeMap<String, BTreeMap<String, Deadline>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overdue {
    pub series: String,
    pub chapter: String,
    pub person: String,
    pub days_late: i64,
}

pub fn parse_due_date(value: &str) -> Result<NaiveDate, ValidationError> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .ok_or_else(|| ValidationError::InvalidDate(value.to_owned()))
}

/// Every deadline strictly before `today`, most late first.
///
/// A record whose due date does not parse is logged and skipped.
pub fn overdue(book: &DeadlineBook, today: NaiveDate) -> Vec<Overdue> {
    let mut late = Vec::new();
    for (series, chapters) in book {
        for (chapter, deadline) in chapters {
            let due = match parse_due_date(&deadline.due) {
                Ok(due) => due,
                Err(err) => {
                    tracing::warn!(
                        kind = "malformed_deadline",
                        series = %series,
                        chapter = %chapter,
                        %err,
                        "skipping deadline"
                    );
                    continue;
                }
            };
            let days_late = (today - due).num_days();
            if days_late > 0 {
                late.push(Overdue {
                    series: series.clone(),
                    chapter: chapter.clone(),
                    person: deadline.person.clone(),
                    days_late,
                });
            }
        }
    }
    late.sort_by(|a, b| b.days_late.cmp(&a.days_late));
    late
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(entries: &[(&str, &str, &str, &str)]) -> DeadlineBook {
        let mut book = DeadlineBook::new();
        for (series, chapter, person, due) in entries {
            book.entry((*series).to_owned()).or_default().insert(
                (*chapter).to_owned(),
                Deadline {
                    person: (*person).to_owned(),
                    due: (*due).to_owned(),
                },
            );
        }
        book
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    #[test]
    fn due_today_is_not_overdue_and_yesterday_is_one_day_late() {
        let book = book(&[
            ("alpha", "10", "Ana", "2026-10-15"),
            ("alpha", "11", "Bo", "2026-10-14"),
            ("beta", "3", "Cy", "2026-10-20"),
        ]);
        let late = overdue(&book, today());
        assert_eq!(
            late,
            vec![Overdue {
                series: "alpha".to_owned(),
                chapter: "11".to_owned(),
                person: "Bo".to_owned(),
                days_late: 1,
            }]
        );
    }

    #[test]
    fn malformed_dates_do_not_hide_other_records() {
        let book = book(&[
            ("alpha", "1", "Ana", "next week"),
            ("beta", "2", "Bo", "01/10/2026"),
            ("gamma", "3", "Cy", "2026-10-12"),
        ]);
        let late = overdue(&book, today());
        let summary: Vec<(&str, i64)> = late
            .iter()
            .map(|o| (o.series.as_str(), o.days_late))
            .collect();
        assert_eq!(summary, vec![("beta", 14), ("gamma", 3)]);
    }

    #[test]
    fn parse_due_date_accepts_iso_and_day_first() {
        let march_first = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(parse_due_date(" 2026-03-01 ").unwrap(), march_first);
        assert_eq!(parse_due_date("01/03/2026").unwrap(), march_first);
        assert_eq!(
            parse_due_date("2026-13-01").unwrap_err(),
            ValidationError::InvalidDate("2026-13-01".to_owned())
        );
    }
}
