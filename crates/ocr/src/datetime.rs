use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Captures;
use serde::Serialize;

use crate::re;
use crate::types::ExtractedField;

/// Layout every extracted date-time is rendered in.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Compiled regex cache ─────────────────────────────────────────────────────

// `HH:MM[:SS] [AM|PM]`, optional, after whatever separators OCR left behind.
macro_rules! time_suffix {
    () => {
        r"(?:[\s,@T\-]*(?:at\s+)?(?P<hh>[0-9]{1,2}):(?P<mi>[0-9]{2})(?::(?P<ss>[0-9]{2}))?(?:\s*(?P<ampm>[ap])\.?m\b\.?)?)?"
    };
}

re!(re_month_name, concat!(
    r"(?i)(?:",
    r"\b(?P<d1>[0-9]{1,2})[\s\-/.,]*(?P<mon1>jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?[\s\-/.,]*(?P<y1>[0-9]{4})",
    r"|",
    r"\b(?P<mon2>jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(?P<d2>[0-9]{1,2}),?\s+(?P<y2>[0-9]{4})",
    r")",
    time_suffix!()
));

re!(re_numeric, concat!(
    r"(?i)(?:",
    r"\b(?P<y1>[0-9]{4})[/\-.](?P<m1>[0-9]{1,2})[/\-.](?P<d1>[0-9]{1,2})",
    r"|",
    r"\b(?P<d2>[0-9]{1,2})[/\-.](?P<m2>[0-9]{1,2})[/\-.](?P<y2>[0-9]{4})",
    r")",
    time_suffix!()
));

/// A date-time found in receipt text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateTimeMatch {
    /// The matched span, verbatim.
    pub raw: String,
    pub value: NaiveDateTime,
}

impl DateTimeMatch {
    pub fn canonical(&self) -> String {
        self.value.format(CANONICAL_FORMAT).to_string()
    }
}

/// Find the receipt's date-time. Month-name layouts are tried before purely
/// numeric ones; candidates that are not real calendar dates are skipped.
pub fn extract_datetime_match(text: &str) -> Option<ExtractedField<DateTimeMatch>> {
    if let Some(m) = first_valid(re_month_name().captures_iter(text), month_name_candidate) {
        return Some(ExtractedField::new(m, 0.90));
    }
    first_valid(re_numeric().captures_iter(text), numeric_candidate)
        .map(|m| ExtractedField::new(m, 0.75))
}

fn first_valid<'t>(
    mut candidates: impl Iterator<Item = Captures<'t>>,
    parse: fn(&Captures<'t>) -> Option<NaiveDate>,
) -> Option<DateTimeMatch> {
    candidates.find_map(|c| {
        let date = parse(&c)?;
        let span = c.get(0)?;
        let (time, raw) = match time_of(&c) {
            Some(time) => (time, span.as_str()),
            // No time, or one OCR garbled: the date stands alone at midnight.
            None => (NaiveTime::from_hms_opt(0, 0, 0)?, &span.as_str()[..date_end(&c)? - span.start()]),
        };
        Some(DateTimeMatch {
            raw: raw.trim().to_string(),
            value: date.and_time(time),
        })
    })
}

/// Byte offset where the date part of a candidate ends.
fn date_end(c: &Captures<'_>) -> Option<usize> {
    ["d1", "d2", "y1", "y2", "m1", "m2", "mon1", "mon2"]
        .iter()
        .filter_map(|name| c.name(name))
        .map(|m| m.end())
        .max()
}

fn month_name_candidate(c: &Captures<'_>) -> Option<NaiveDate> {
    let (day, mon, year) = match c.name("d1") {
        Some(d) => (d, c.name("mon1")?, c.name("y1")?),
        None => (c.name("d2")?, c.name("mon2")?, c.name("y2")?),
    };
    NaiveDate::from_ymd_opt(
        year.as_str().parse().ok()?,
        abbr_month_to_num(mon.as_str())?,
        day.as_str().parse().ok()?,
    )
}

fn numeric_candidate(c: &Captures<'_>) -> Option<NaiveDate> {
    if let Some(y) = c.name("y1") {
        let y: i32 = y.as_str().parse().ok()?;
        let m: u32 = c.name("m1")?.as_str().parse().ok()?;
        let d: u32 = c.name("d1")?.as_str().parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }
    let y: i32 = c.name("y2")?.as_str().parse().ok()?;
    let first: u32 = c.name("d2")?.as_str().parse().ok()?;
    let second: u32 = c.name("m2")?.as_str().parse().ok()?;
    // Day first; month first only when day-first is not a real date (03/25/2024).
    NaiveDate::from_ymd_opt(y, second, first).or_else(|| NaiveDate::from_ymd_opt(y, first, second))
}

/// The time the span carries; `None` when it has none or an impossible one.
fn time_of(c: &Captures<'_>) -> Option<NaiveTime> {
    let mut hour: u32 = c.name("hh")?.as_str().parse().ok()?;
    let minute: u32 = c.name("mi")?.as_str().parse().ok()?;
    let second: u32 = match c.name("ss") {
        Some(s) => s.as_str().parse().ok()?,
        None => 0,
    };
    if let Some(ampm) = c.name("ampm") {
        if !(1..=12).contains(&hour) {
            return None;
        }
        let pm = ampm.as_str().eq_ignore_ascii_case("p");
        hour = match (pm, hour) {
            (false, 12) => 0,
            (true, 12) => 12,
            (true, h) => h + 12,
            (false, h) => h,
        };
    }
    NaiveTime::from_hms_opt(hour, minute, second)
}

fn abbr_month_to_num(name: &str) -> Option<u32> {
    match name.to_lowercase().as_str() {
        "jan" => Some(1), "feb" => Some(2), "mar" => Some(3), "apr" => Some(4),
        "may" => Some(5), "jun" => Some(6), "jul" => Some(7), "aug" => Some(8),
        "sep" => Some(9), "oct" => Some(10), "nov" => Some(11), "dec" => Some(12),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(text: &str) -> Option<(String, String)> {
        extract_datetime_match(text).map(|f| (f.value.raw.clone(), f.value.canonical()))
    }

    fn in_order(haystack: &str, needles: &[&str]) -> bool {
        let mut rest = haystack;
        needles.iter().all(|n| match rest.find(n) {
            Some(i) => {
                rest = &rest[i + n.len()..];
                true
            }
            None => false,
        })
    }

    // ── Month-name tier ─────────────────────────────────────────────────────

    #[test]
    fn day_month_year_time() {
        let (raw, canonical) = found("Date 15 Jan 2024 14:30 Ref 1").unwrap();
        assert!(in_order(&raw, &["15", "Jan", "2024", "14:30"]), "raw was {raw}");
        assert_eq!(canonical, "2024-01-15 14:30:00");
    }

    #[test]
    fn full_month_name_and_seconds() {
        let (_, canonical) = found("03 September 2023 08:05:09").unwrap();
        assert_eq!(canonical, "2023-09-03 08:05:09");
    }

    #[test]
    fn dashed_layout_with_pm() {
        let (raw, canonical) = found("15-Jan-2024 02:30 PM").unwrap();
        assert_eq!(raw, "15-Jan-2024 02:30 PM");
        assert_eq!(canonical, "2024-01-15 14:30:00");
    }

    #[test]
    fn twelve_am_is_midnight() {
        assert_eq!(found("1 Feb 2024 12:10 am").unwrap().1, "2024-02-01 00:10:00");
    }

    #[test]
    fn am_inside_word_is_not_a_meridiem() {
        let (raw, canonical) = found("15 Jan 2024 09:15 amount 10").unwrap();
        assert_eq!(raw, "15 Jan 2024 09:15");
        assert_eq!(canonical, "2024-01-15 09:15:00");
    }

    #[test]
    fn month_name_without_time_is_midnight() {
        assert_eq!(found("WALMART 15 Jan 2024 Total").unwrap().1, "2024-01-15 00:00:00");
    }

    #[test]
    fn month_first_layout() {
        assert_eq!(found("March 5, 2024 at 10:00").unwrap().1, "2024-03-05 10:00:00");
    }

    #[test]
    fn month_name_beats_earlier_numeric_date() {
        let text = "printed 01/01/2020 transfer 15 Jan 2024 14:30";
        assert_eq!(found(text).unwrap().1, "2024-01-15 14:30:00");
    }

    #[test]
    fn invalid_calendar_date_is_skipped() {
        assert_eq!(found("31 Feb 2024 then 12/03/2024").unwrap().1, "2024-03-12 00:00:00");
    }

    // ── Numeric tier ────────────────────────────────────────────────────────

    #[test]
    fn day_first_slash_date_with_time() {
        let f = extract_datetime_match("رقم العملية: 778812345678 12/03/2024 09:15").unwrap();
        assert!(f.value.raw.contains("12/03/2024"));
        assert_eq!(f.value.canonical(), "2024-03-12 09:15:00");
        assert_eq!(f.confidence, 0.75);
    }

    #[test]
    fn year_first_date() {
        assert_eq!(found("2024/3/7").unwrap().1, "2024-03-07 00:00:00");
        assert_eq!(found("2024-03-07T18:45:00").unwrap().1, "2024-03-07 18:45:00");
    }

    #[test]
    fn dotted_date() {
        assert_eq!(found("on 05.11.2023").unwrap().1, "2023-11-05 00:00:00");
    }

    #[test]
    fn month_first_when_day_first_is_impossible() {
        assert_eq!(found("03/25/2024").unwrap().1, "2024-03-25 00:00:00");
    }

    #[test]
    fn impossible_time_keeps_the_date() {
        assert_eq!(
            found("12/03/2024 29:15"),
            Some(("12/03/2024".to_string(), "2024-03-12 00:00:00".to_string()))
        );
        assert_eq!(
            found("12/03/2024 13:00 pm"),
            Some(("12/03/2024".to_string(), "2024-03-12 00:00:00".to_string()))
        );
    }

    #[test]
    fn garbled_minutes_keep_the_month_name_date() {
        let (raw, canonical) = found("Date 15 Jan 2024 14:75 Ref 1").unwrap();
        assert_eq!(raw, "15 Jan 2024");
        assert_eq!(canonical, "2024-01-15 00:00:00");
    }

    #[test]
    fn nothing_found() {
        assert_eq!(found("no date here 14:30"), None);
        assert_eq!(found(""), None);
    }
}
