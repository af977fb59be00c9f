use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Declarative publication recurrence of a series.
///
/// Weekdays are stored as chrono's fixed enumeration; localized names are only used when
/// parsing operator input and when rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalendarRule {
    Weekday { day: Weekday },
    WeekdaySet { days: Vec<Weekday> },
    MonthDays { days: BTreeSet<u32> },
}

impl CalendarRule {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            Self::Weekday { day } => date.weekday() == *day,
            Self::WeekdaySet { days } => days.contains(&date.weekday()),
            Self::MonthDays { days } => days.contains(&date.day()),
        }
    }

    /// One weekday becomes [`CalendarRule::Weekday`], several a [`CalendarRule::WeekdaySet`].
    pub fn from_weekdays(days: impl IntoIterator<Item = Weekday>) -> Result<Self, ValidationError> {
        let mut unique: Vec<Weekday> = Vec::new();
        for day in days {
            if !unique.contains(&day) {
                unique.push(day);
            }
        }
        unique.sort_by_key(Weekday::num_days_from_monday);

        match unique.as_slice() {
            [] => Err(ValidationError::EmptyRule),
            [day] => Ok(Self::Weekday { day: *day }),
            _ => Ok(Self::WeekdaySet { days: unique }),
        }
    }

    pub fn from_month_days(days: impl IntoIterator<Item = u32>) -> Result<Self, ValidationError> {
        let days: BTreeSet<u32> = days.into_iter().collect();
        if days.is_empty() {
            return Err(ValidationError::EmptyRule);
        }
        if let Some(bad) = days.iter().find(|d| !(1..=31).contains(*d)) {
            return Err(ValidationError::DayOfMonthOutOfRange(*bad));
        }
        Ok(Self::MonthDays { days })
    }

    /// Parses operator input such as `wed`, `lunes, jueves` or `4,14,24`.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let tokens: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Err(ValidationError::EmptyRule);
        }

        let numeric = tokens
            .iter()
            .filter(|t| t.chars().all(|c| c.is_ascii_digit()))
            .count();
        if numeric == tokens.len() {
            let days = tokens
                .iter()
                .map(|t| {
                    t.parse::<u32>()
                        .map_err(|_| ValidationError::InvalidDayOfMonth((*t).to_owned()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Self::from_month_days(days);
        }
        if numeric > 0 {
            return Err(ValidationError::MixedRule(input.trim().to_owned()));
        }

        let days = tokens
            .into_iter()
            .map(parse_weekday)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_weekdays(days)
    }
}

impl fmt::Display for CalendarRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekday { day } => write!(f, "every {}", weekday_name(*day)),
            Self::WeekdaySet { days } => {
                let names: Vec<&str> = days.iter().map(|d| weekday_name(*d)).collect();
                write!(f, "every {}", names.join(", "))
            }
            Self::MonthDays { days } => {
                let days: Vec<String> = days.iter().map(u32::to_string).collect();
                write!(f, "on day {} of each month", days.join(", "))
            }
        }
    }
}

/// Accepts English names or abbreviations and Spanish names, case-insensitively.
pub fn parse_weekday(input: &str) -> Result<Weekday, ValidationError> {
    let lowered = input.trim().to_lowercase();
    let spanish = match lowered.as_str() {
        "lunes" => Some(Weekday::Mon),
        "martes" => Some(Weekday::Tue),
        "miércoles" | "miercoles" => Some(Weekday::Wed),
        "jueves" => Some(Weekday::Thu),
        "viernes" => Some(Weekday::Fri),
        "sábado" | "sabado" => Some(Weekday::Sat),
        "domingo" => Some(Weekday::Sun),
        _ => None,
    };
    if let Some(day) = spanish {
        return Ok(day);
    }
    lowered
        .parse::<Weekday>()
        .map_err(|_| ValidationError::UnknownWeekday(input.trim().to_owned()))
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Series whose rule matches `date`, in name order.
pub fn series_for_date(rules: &BTreeMap<String, CalendarRule>, date: NaiveDate) -> Vec<&str> {
    rules
        .iter()
        .filter(|(_, rule)| rule.matches(date))
        .map(|(series, _)| series.as_str())
        .collect()
}
