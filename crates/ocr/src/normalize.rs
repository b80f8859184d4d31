use serde::Serialize;
use std::fmt;
use std::ops::Deref;

/// OCR text after [`normalize`]: one line, confusable glyphs replaced,
/// Arabic-script digits folded to ASCII.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for NormalizedText {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonicalize raw OCR output so the extractors only have to deal with one
/// spelling of each separator.
///
/// Idempotent: nothing this function emits is rewritten by a second pass.
pub fn normalize(text: &str) -> NormalizedText {
    let mut out = String::with_capacity(text.len());
    let mut in_line_break = false;

    for c in text.chars() {
        if c == '\n' || c == '\r' {
            if !in_line_break {
                out.push(' ');
                in_line_break = true;
            }
            continue;
        }
        in_line_break = false;
        out.push(fold_char(c));
    }

    NormalizedText(out)
}

fn fold_char(c: char) -> char {
    match c {
        '|' | '\\' => '/',
        '\u{2014}' | '\u{2013}' => '-',
        // Arabic decimal and thousands separators.
        '\u{066B}' => '.',
        '\u{066C}' => ',',
        '\u{0660}'..='\u{0669}' => ascii_digit(c as u32 - 0x0660),
        '\u{06F0}'..='\u{06F9}' => ascii_digit(c as u32 - 0x06F0),
        other => other,
    }
}

fn ascii_digit(n: u32) -> char {
    char::from_digit(n, 10).unwrap_or('0')
}
