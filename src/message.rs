//! Notifier message text. Each function renders one result as one message.

use crate::deadline::Overdue;
use crate::model::Role;
use crate::status::{AssignmentGap, DatedGaps, RawGap, ReadyChapter, StatusReport};

/// Always produces a message: an empty result is a positive confirmation.
pub fn raw_pending_now(gaps: &[RawGap]) -> String {
    if gaps.is_empty() {
        return "✅ Every next chapter already has its RAW.".to_owned();
    }
    let mut text = format!("⚠️ RAW missing for {} series:", gaps.len());
    for gap in gaps {
        text.push_str(&format!("\n- chapter {} of {}", gap.chapter, gap.series));
    }
    text
}

pub fn raw_pending_lookahead(lookahead: &DatedGaps<RawGap>) -> Option<String> {
    if lookahead.gaps.is_empty() {
        return None;
    }
    let mut text = format!(
        "📅 Publishing on {} without RAW yet:",
        lookahead.date.format("%A %Y-%m-%d")
    );
    for gap in &lookahead.gaps {
        text.push_str(&format!("\n- chapter {} of {}", gap.chapter, gap.series));
    }
    Some(text)
}

pub fn assignment_gaps(lookahead: &DatedGaps<AssignmentGap>) -> Option<String> {
    if lookahead.gaps.is_empty() {
        return None;
    }
    let mut text = format!(
        "👥 Unassigned work for chapters publishing on {}:",
        lookahead.date.format("%A %Y-%m-%d")
    );
    for gap in &lookahead.gaps {
        text.push_str(&format!(
            "\n- {} chapter {}: no {}",
            gap.series,
            gap.chapter,
            role_list(&gap.missing)
        ));
    }
    Some(text)
}

pub fn ready_to_publish(ready: Option<&ReadyChapter>) -> Option<String> {
    ready.map(|ready| {
        format!(
            "🚀 Chapter {} of {} is ready to publish.",
            ready.chapter, ready.series
        )
    })
}

pub fn overdue(late: &[Overdue]) -> Option<String> {
    if late.is_empty() {
        return None;
    }
    let mut text = "⏰ Overdue deadlines:".to_owned();
    for item in late {
        let days = if item.days_late == 1 { "day" } else { "days" };
        text.push_str(&format!(
            "\n- {} chapter {} ({}): {} {days} late",
            item.series, item.chapter, item.person, item.days_late
        ));
    }
    Some(text)
}

pub fn weekly_summary(report: &StatusReport) -> String {
    format!(
        "📊 Weekly summary: {} series waiting on RAW, {} overdue deadline(s).",
        report.raw_now.len(),
        report.overdue.len()
    )
}

/// Messages of one scheduled batch, in delivery order.
pub fn batch(report: &StatusReport, weekly: bool) -> Vec<String> {
    let mut messages = vec![raw_pending_now(&report.raw_now)];
    messages.extend(raw_pending_lookahead(&report.raw_lookahead));
    messages.extend(assignment_gaps(&report.assignments));
    messages.extend(ready_to_publish(report.ready.as_ref()));
    messages.extend(overdue(&report.overdue));
    if weekly {
        messages.push(weekly_summary(report));
    }
    messages
}

fn role_list(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
