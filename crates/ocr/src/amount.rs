use std::str::FromStr;

use iesal_core::{Amount, AmountTier};
use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

use crate::re;
use crate::types::ExtractedField;

// Digits separated by single space/comma/dot characters. How much of the run
// is one number is decided by `trim_numeric_run`, not by the regex.
const NUMERIC_RUN: &str = r"[0-9]+(?:[ ,.][0-9]+)*";

re!(re_numeric_run, NUMERIC_RUN);

/// Finds the monetary amount on a receipt by trying each configured tier in
/// order. The first tier that yields a parseable number wins; within a tier the
/// leftmost candidate wins.
#[derive(Debug, Clone)]
pub struct AmountExtractor {
    labeled: Option<Regex>,
    tiers: Vec<AmountTier>,
}

impl AmountExtractor {
    pub fn new(labels: &[String], tiers: &[AmountTier]) -> Result<Self, regex::Error> {
        let labeled = label_alternation(labels)
            .map(|alt| Regex::new(&format!(r"(?i)(?:{alt})\s*[:\-]?\s*({NUMERIC_RUN})")))
            .transpose()?;
        Ok(Self { labeled, tiers: tiers.to_vec() })
    }

    pub fn extract(&self, text: &str) -> Option<ExtractedField<Amount>> {
        self.tiers.iter().find_map(|&tier| {
            let found = match tier {
                AmountTier::Labeled => self.labeled_amount(text),
                AmountTier::Decimal => decimal_amount(text),
                AmountTier::AnyNumber => any_number_amount(text),
            };
            if let Some(amount) = found {
                debug!(%tier, %amount, "amount matched");
            }
            found.map(|amount| ExtractedField::new(amount, tier_confidence(tier)))
        })
    }

    fn labeled_amount(&self, text: &str) -> Option<Amount> {
        let re = self.labeled.as_ref()?;
        re.captures_iter(text)
            .filter_map(|c| c.get(1))
            .find_map(|m| parse_candidate(trim_numeric_run(m.as_str(), true), AmountTier::Labeled))
    }
}

fn decimal_amount(text: &str) -> Option<Amount> {
    numeric_tokens(text).find_map(|(start, token)| {
        if touches_date(text, start, start + token.len()) {
            return None;
        }
        let cleaned = normalize_numeric(token);
        let has_cents = cleaned.split_once('.').is_some_and(|(_, frac)| frac.len() == 2);
        if !has_cents {
            return None;
        }
        parse_candidate(token, AmountTier::Decimal)
    })
}

fn any_number_amount(text: &str) -> Option<Amount> {
    numeric_tokens(text).find_map(|(_, token)| {
        if token.bytes().filter(u8::is_ascii_digit).count() < 2 {
            return None;
        }
        parse_candidate(token, AmountTier::AnyNumber)
    })
}

/// Every number in `text` with its byte offset, splitting loose runs such as
/// `2,500.00 12` at group boundaries. Space-separated groups are never joined.
fn numeric_tokens(text: &str) -> impl Iterator<Item = (usize, &str)> {
    re_numeric_run().find_iter(text).flat_map(|m| {
        let run = m.as_str();
        let mut pos = 0;
        std::iter::from_fn(move || {
            if pos >= run.len() {
                return None;
            }
            let start = pos;
            let token = trim_numeric_run(&run[start..], false);
            // A token always ends at a group boundary; skip the separator after it.
            pos = start + token.len() + 1;
            Some((m.start() + start, token))
        })
    })
}

fn parse_candidate(token: &str, tier: AmountTier) -> Option<Amount> {
    let parsed = parse_amount(token);
    if parsed.is_none() {
        debug!(%tier, token, "invalid numeric token");
    }
    parsed
}

fn tier_confidence(tier: AmountTier) -> f32 {
    match tier {
        AmountTier::Labeled => 0.92,
        AmountTier::Decimal => 0.70,
        AmountTier::AnyNumber => 0.35,
    }
}

/// `true` when the token continues into, or follows, a `/`, `-` or `.` plus a
/// digit, which is how numeric dates are written (`12.03.2024`, `2024/03/12`).
fn touches_date(text: &str, start: usize, end: usize) -> bool {
    let is_date_sep = |c: char| matches!(c, '/' | '-' | '.');
    let mut after = text[end..].chars();
    let glued_after = matches!((after.next(), after.next()), (Some(s), Some(d)) if is_date_sep(s) && d.is_ascii_digit());
    let mut before = text[..start].chars().rev();
    let glued_before = matches!((before.next(), before.next()), (Some(s), Some(d)) if is_date_sep(s) && d.is_ascii_digit());
    glued_after || glued_before
}

/// Build a regex alternation from a label vocabulary. Labels that start with
/// an ASCII letter must begin a word so `Total` does not fire inside
/// `Subtotal`; Arabic labels may carry attached prefixes and are left alone.
pub(crate) fn label_alternation(labels: &[String]) -> Option<String> {
    let parts: Vec<String> = labels
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(|l| {
            let escaped = regex::escape(l);
            if l.starts_with(|c: char| c.is_ascii_alphanumeric()) {
                format!(r"\b{escaped}")
            } else {
                escaped
            }
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("|"))
    }
}

/// Cut a loose run such as `1,234.56 2024` down to the prefix that reads as a
/// single number.
///
/// After the leading digits, a `,`/`.` group of three digits is a thousands
/// group, a group of one or two digits is the fractional part and ends the
/// number. With `space_groups`, a space group is accepted as thousands when
/// the leading group has at most three digits; otherwise a space ends it.
fn trim_numeric_run(run: &str, space_groups: bool) -> &str {
    let bytes = run.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = digits_from(0);
    let lead_len = end;

    while end < bytes.len() {
        let sep = bytes[end];
        let group_end = digits_from(end + 1);
        let len = group_end - end - 1;
        match (sep, len) {
            (b' ', 3) if space_groups && lead_len <= 3 => end = group_end,
            (b',' | b'.', 3) => end = group_end,
            (b',' | b'.', 1..=2) => return &run[..group_end],
            _ => break,
        }
    }

    &run[..end]
}

/// Rewrite a numeric token into plain `digits[.digits]` form.
///
/// - A lone comma kind is the decimal point only when exactly two digits
///   follow the last comma; otherwise commas group thousands.
/// - With both commas and dots, whichever comes last is the decimal point.
/// - Several dots and no comma are thousands separators.
pub fn normalize_numeric(token: &str) -> String {
    let s: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    let last_comma = s.rfind(',');
    let last_dot = s.rfind('.');

    let rewritten = match (last_comma, last_dot) {
        (Some(comma), None) => {
            let tail = &s[comma + 1..];
            if tail.len() == 2 && tail.bytes().all(|b| b.is_ascii_digit()) {
                format!("{}.{tail}", s[..comma].replace(',', ""))
            } else {
                s.replace(',', "")
            }
        }
        (Some(comma), Some(dot)) if comma > dot => {
            format!("{}.{}", s[..comma].replace(['.', ','], ""), &s[comma + 1..])
        }
        (Some(_), Some(_)) => s.replace(',', ""),
        (None, Some(_)) if s.matches('.').count() > 1 => s.replace('.', ""),
        _ => s,
    };

    rewritten.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect()
}

/// Parse a numeric token as it appears on a receipt.
pub fn parse_amount(token: &str) -> Option<Amount> {
    let cleaned = normalize_numeric(token);
    let decimal = Decimal::from_str(&cleaned).ok()?;
    Amount::from_decimal(decimal)
}
