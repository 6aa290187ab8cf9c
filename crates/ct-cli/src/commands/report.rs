//! Report command for category and productivity summaries.
//!
//! Text output lists hours per top-level category for each day and for the
//! whole range, followed by the productive/other/sleep/untracked split. JSON
//! output adds the average weekday/hour profile.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;
use ct_core::Event;
use ct_core::report::{
    ProductivityBreakdown, WeekdayHourProfile, category_totals, daily_category_totals,
    hourly_weekday_profile, productivity_breakdown,
};
use serde::Serialize;

use super::util::format_hours;

/// Computed report data.
#[derive(Debug, Serialize)]
pub struct ReportData {
    /// Hours per top-level category, by start date.
    pub daily: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
    /// Hours per top-level category over the range.
    pub totals: BTreeMap<String, f64>,
    pub productivity: ProductivityBreakdown,
    pub weekday_hours: WeekdayHourProfile,
}

impl ReportData {
    pub fn new(events: &[Event], productive: &[String]) -> Self {
        Self {
            daily: daily_category_totals(events),
            totals: category_totals(events),
            productivity: productivity_breakdown(events, productive),
            weekday_hours: hourly_weekday_profile(events),
        }
    }
}

pub fn run<W: Write>(
    writer: &mut W,
    events: &[Event],
    productive: &[String],
    json: bool,
) -> Result<()> {
    let data = ReportData::new(events, productive);
    if json {
        serde_json::to_writer_pretty(&mut *writer, &data)?;
        writeln!(writer)?;
        return Ok(());
    }

    if events.is_empty() {
        writeln!(writer, "No events in range.")?;
        return Ok(());
    }

    writeln!(writer, "BY DAY")?;
    writeln!(writer, "──────")?;
    for (date, totals) in &data.daily {
        writeln!(writer, "{date}")?;
        write_rows(writer, totals.iter().map(|(name, hours)| (name.as_str(), *hours)))?;
    }

    writeln!(writer)?;
    writeln!(writer, "TOTAL")?;
    writeln!(writer, "─────")?;
    write_rows(writer, data.totals.iter().map(|(name, hours)| (name.as_str(), *hours)))?;

    let p = data.productivity;
    writeln!(writer)?;
    writeln!(writer, "PRODUCTIVITY")?;
    writeln!(writer, "────────────")?;
    write_rows(
        writer,
        [
            ("Productive", p.productive),
            ("Other", p.other),
            ("Sleep", p.sleep),
            ("Untracked", p.untracked),
            ("Total", p.total()),
        ],
    )?;
    Ok(())
}

fn write_rows<'a, W: Write>(
    writer: &mut W,
    rows: impl IntoIterator<Item = (&'a str, f64)>,
) -> Result<()> {
    for (name, hours) in rows {
        writeln!(writer, "  {name:<12} {:>7}", format_hours(hours))?;
    }
    Ok(())
}
