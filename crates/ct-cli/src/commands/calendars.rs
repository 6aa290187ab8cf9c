//! Calendars command: lists the remote calendars of each account.

use std::io::Write;

use anyhow::{Context, Result};
use ct_core::AccountId;
use ct_google::{CalendarInfo, GoogleCalendarSource};

pub fn run<W: Write>(
    writer: &mut W,
    source: &GoogleCalendarSource,
    accounts: &[AccountId],
) -> Result<()> {
    if accounts.is_empty() {
        writeln!(writer, "No accounts configured.")?;
        return Ok(());
    }

    for account in accounts {
        let calendars = source
            .list_calendars(account)
            .with_context(|| format!("failed to list calendars for {account}"))?;
        write_calendars(writer, account, &calendars)?;
    }
    Ok(())
}

/// Writes one account block; the primary calendar is starred.
fn write_calendars<W: Write>(
    writer: &mut W,
    account: &AccountId,
    calendars: &[CalendarInfo],
) -> Result<()> {
    writeln!(writer, "{account}")?;
    if calendars.is_empty() {
        writeln!(writer, "  (no calendars)")?;
    }
    for calendar in calendars {
        let marker = if calendar.primary { '*' } else { ' ' };
        if calendar.summary.is_empty() {
            writeln!(writer, "  {marker} {}", calendar.id)?;
        } else {
            writeln!(writer, "  {marker} {} ({})", calendar.id, calendar.summary)?;
        }
    }
    Ok(())
}
