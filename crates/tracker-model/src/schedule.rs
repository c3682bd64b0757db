//! Deadline helpers used by boards and Gantt views

use crate::record::Record;
use crate::status::Status;
use chrono::{Days, NaiveDate};

/// Lead time assumed when a record has an end date but no start
pub const DEFAULT_LEAD_DAYS: u64 = 30;

/// Whether a node is past its deadline
///
/// A node is overdue when it has a deadline strictly before `today` and is
/// not `Concluído`. Nodes without a deadline are never overdue.
#[must_use]
pub fn is_overdue(deadline: Option<NaiveDate>, status: Status, today: NaiveDate) -> bool {
    match deadline {
        Some(day) => !status.is_done() && day < today,
        None => false,
    }
}

/// Start and end dates of a record on a timeline
///
/// The end is the record deadline, else the latest phase or sub-item
/// deadline. The start is the record start date, else the earliest phase or
/// sub-item deadline, else [`DEFAULT_LEAD_DAYS`] before the end.
#[must_use]
pub fn schedule_span(record: &Record) -> Option<(NaiveDate, NaiveDate)> {
    let nested: Vec<NaiveDate> = record
        .phases()
        .iter()
        .filter_map(|p| p.deadline)
        .chain(record.all_sub_items().filter_map(|s| s.deadline))
        .collect();

    let end = record.deadline.or_else(|| nested.iter().max().copied())?;
    let start = record
        .start_date
        .or_else(|| nested.iter().min().copied())
        .unwrap_or_else(|| {
            end.checked_sub_days(Days::new(DEFAULT_LEAD_DAYS))
                .unwrap_or(end)
        });
    Some((start, end))
}

/// Next free top-level outline number
///
/// Only top-level numbers ("3", not "3.1") count. Unparseable numbers are
/// ignored.
#[must_use]
pub fn next_topic_number<'a>(topic_numbers: impl IntoIterator<Item = &'a str>) -> u32 {
    topic_numbers
        .into_iter()
        .filter(|t| !t.is_empty() && !t.contains('.'))
        .filter_map(|t| t.trim().parse::<u32>().ok())
        .max()
        .map_or(1, |max| max.saturating_add(1))
}

/// Next free outline number under `parent` ("3.1", "3.2", ...)
///
/// Only direct children of `parent` count; "3.1.2" does not block "3.2".
#[must_use]
pub fn next_child_topic_number<'a>(
    parent: &str,
    topic_numbers: impl IntoIterator<Item = &'a str>,
) -> String {
    let prefix = format!("{parent}.");
    let next = topic_numbers
        .into_iter()
        .filter_map(|t| t.strip_prefix(prefix.as_str()))
        .filter(|rest| !rest.contains('.'))
        .filter_map(|rest| rest.trim().parse::<u32>().ok())
        .max()
        .map_or(1, |max| max.saturating_add(1));
    format!("{parent}.{next}")
}
