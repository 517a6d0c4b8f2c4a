use std::sync::OnceLock;

use chrono::{NaiveDateTime, Timelike};
use log::debug;
use regex::Regex;

use super::report::{TimezoneReport, CANONICAL_TIME_FORMAT};
use crate::error_handling::types::RejectionReason;

/// Loose input format: month, day and hour may be written with one digit.
/// chrono accepts 1-2 digits for `%m`, `%d` and `%H`; the regex pins minutes and
/// seconds to exactly two.
const INPUT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const MAX_OFFSET_HOURS: i32 = 12;

// city: starts and ends with an alphanumeric, may contain inner spaces
// zone: UTC followed by optionally signed digits
// time: yyyy-M-d H:mm:ss
const REPORT_PATTERN: &str = r"^\s*([A-Za-z0-9](?:[A-Za-z0-9 ]*[A-Za-z0-9])?)\s*,\s*(UTC[+-]?[0-9]+)\s*,\s*([0-9]{4}-[0-9]{1,2}-[0-9]{1,2} [0-9]{1,2}:[0-9]{2}:[0-9]{2})\s*$";

fn report_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(REPORT_PATTERN).unwrap_or_else(|e| panic!("invalid report pattern: {}", e)))
}

/// Validates one client line and normalises it into a [`TimezoneReport`].
///
/// Checks run in order and stop at the first failure:
/// 1. overall shape (three fields, alphanumeric city, `UTC±n`, numeric date-time)
///    else [`RejectionReason::MalformedShape`]
/// 2. offset is an integer in `-12..=12` else [`RejectionReason::BadOffset`]
/// 3. date-time is a real calendar instant else [`RejectionReason::BadTimestamp`]
///
/// The returned report carries the trimmed city, the zone text as received and the
/// timestamp re-rendered as `yyyy-MM-dd HH:mm:ss`. Feeding a canonical line back in
/// yields the same report.
pub fn validate(line: &str) -> Result<TimezoneReport, RejectionReason> {
    let caps = report_regex().captures(line).ok_or_else(|| {
        debug!("Rejected malformed line: {:?}", line);
        RejectionReason::MalformedShape
    })?;

    let city = caps[1].to_string();
    let zone = caps[2].to_string();
    let utc_offset = parse_offset(&zone)?;
    let timestamp = canonical_timestamp(&caps[3])?;

    Ok(TimezoneReport::new(city, utc_offset, zone, timestamp))
}

fn parse_offset(zone: &str) -> Result<i8, RejectionReason> {
    let hours: i32 = zone
        .trim_start_matches("UTC")
        .parse()
        .map_err(|_| RejectionReason::BadOffset)?;

    if !(-MAX_OFFSET_HOURS..=MAX_OFFSET_HOURS).contains(&hours) {
        debug!("Rejected out of range offset: {}", zone);
        return Err(RejectionReason::BadOffset);
    }

    i8::try_from(hours).map_err(|_| RejectionReason::BadOffset)
}

fn canonical_timestamp(raw: &str) -> Result<String, RejectionReason> {
    let parsed = NaiveDateTime::parse_from_str(raw, INPUT_TIME_FORMAT).map_err(|e| {
        debug!("Rejected date-time {:?}: {}", raw, e);
        RejectionReason::BadTimestamp
    })?;

    // chrono parses second 60 as a leap second
    if parsed.nanosecond() >= 1_000_000_000 {
        return Err(RejectionReason::BadTimestamp);
    }

    Ok(parsed.format(CANONICAL_TIME_FORMAT).to_string())
}
