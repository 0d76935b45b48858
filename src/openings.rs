//! Turning the published `HH:MM-HH:MM` shift strings into Unix intervals.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::entity::Opening;
use crate::TARGET_WEB_REQUEST;

static SHIFT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2}:\d{2})-(\d{1,2}:\d{2})").expect("shift pattern"));

/// Extracts every shift found in `fragments` as an interval on `date`.
///
/// `24:00` is midnight at the end of `date`. A shift closing at or before its
/// opening time runs past midnight and closes on the following day. Times that
/// do not exist on `date` in `tz` (daylight saving gap) are dropped.
pub fn parse_openings<Tz: TimeZone>(fragments: &[String], date: NaiveDate, tz: &Tz) -> Vec<Opening> {
    let mut openings = Vec::new();

    for fragment in fragments {
        for captures in SHIFT.captures_iter(fragment) {
            let (Some(open), Some(close)) = (
                local_datetime(&captures[1], date),
                local_datetime(&captures[2], date),
            ) else {
                warn!(target: TARGET_WEB_REQUEST, "Unparsable shift {:?}", &captures[0]);
                continue;
            };

            let close = if close <= open {
                match close.checked_add_days(Days::new(1)) {
                    Some(next_day) => next_day,
                    None => continue,
                }
            } else {
                close
            };

            match (epoch_seconds(tz, open), epoch_seconds(tz, close)) {
                (Some(open), Some(close)) => openings.push(Opening(open, close)),
                _ => warn!(
                    target: TARGET_WEB_REQUEST,
                    "Shift {:?} does not exist on {} in local time, skipping", &captures[0], date
                ),
            }
        }
    }

    openings
}

/// `H:MM` or `HH:MM` on `date`, with `24:00` rolling over to the next day.
fn local_datetime(clock: &str, date: NaiveDate) -> Option<NaiveDateTime> {
    let (hours, minutes) = clock.split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;

    if hours == 24 && minutes == 0 {
        return date
            .checked_add_days(Days::new(1))
            .map(|next| next.and_time(NaiveTime::MIN));
    }
    NaiveTime::from_hms_opt(hours, minutes, 0).map(|time| date.and_time(time))
}

fn epoch_seconds<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<i64> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|moment| moment.timestamp())
}
