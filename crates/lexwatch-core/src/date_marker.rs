//! "Last updated" date marker extraction.
//!
//! Consolidated texts announce their last revision with one of a few Spanish
//! phrasings followed by a `DD/MM/YYYY` date. The page may carry the accented
//! letters raw or as lower-case HTML entities, so each marker is a regex that
//! accepts both. Markers are tried independently against the same buffer and
//! the match that starts earliest wins.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// `ú` raw in any case, or as a lower-case entity.
const U_ACUTE: &str = r"(?:(?i:ú)|&uacute;|&#250;|&#xfa;)";
/// `ó` raw in any case, or as a lower-case entity.
const O_ACUTE: &str = r"(?:(?i:ó)|&oacute;|&#243;|&#xf3;)";
const SPACE: &str = r"(?:\s|&nbsp;)+";
const OPT_SPACE: &str = r"(?:\s|&nbsp;)*";
/// Exactly two-digit day, two-digit month, four-digit year; no trailing digit.
const DATE: &str = r"([0-9]{2}/[0-9]{2}/[0-9]{4})\b";

static MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let last_update = format!("{U_ACUTE}(?i:ltima){SPACE}(?i:actualizaci){O_ACUTE}(?i:n)");
    [
        // "Última actualización publicada el DD/MM/YYYY"
        format!("{last_update}{SPACE}(?i:publicada){SPACE}(?i:el){SPACE}{DATE}"),
        // "Última actualización, publicada el DD/MM/YYYY"
        format!("{last_update}{OPT_SPACE},{OPT_SPACE}(?i:publicada){SPACE}(?i:el){SPACE}{DATE}"),
        // "Texto consolidado - DD/MM/YYYY"
        format!("(?i:texto){SPACE}(?i:consolidado){OPT_SPACE}-{OPT_SPACE}{DATE}"),
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("date marker pattern is valid"))
    .collect()
});

/// Return the date of the earliest recognised marker in `text`, as `DD/MM/YYYY`.
///
/// Dates that are truncated or not a real calendar day do not qualify.
pub fn extract_date(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    MARKERS
        .iter()
        .filter_map(|marker| first_qualifying(marker, text))
        .min_by_key(|(start, _)| *start)
        .map(|(_, date)| date.to_string())
}

/// Same as [`extract_date`] over raw bytes. Invalid UTF-8 (e.g. a prefix cut
/// inside a multi-byte character) is replaced, not rejected.
pub fn extract_date_from_bytes(body: &[u8]) -> Option<String> {
    extract_date(&String::from_utf8_lossy(body))
}

fn first_qualifying<'t>(marker: &Regex, text: &'t str) -> Option<(usize, &'t str)> {
    marker.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let date = caps.get(1)?.as_str();
        is_calendar_date(date).then_some((whole.start(), date))
    })
}

fn is_calendar_date(token: &str) -> bool {
    NaiveDate::parse_from_str(token, "%d/%m/%Y").is_ok()
}
