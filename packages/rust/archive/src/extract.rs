//! Timestamp and report-body extraction from archive document text.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use bulletin_shared::ArchiveOccurrence;

/// `D. M. YYYY  H.MM` with flexible whitespace and no enforced leading zeros.
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})\.\s*(\d{1,2})\.\s*(\d{4})\s+(\d{1,2})\.(\d{2})").expect("valid regex")
});

/// A timestamp token and its byte span in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampToken {
    pub timestamp: NaiveDateTime,
    pub start: usize,
    pub end: usize,
}

/// Every calendar-valid timestamp token in `text`, in text order.
pub fn find_timestamps(text: &str) -> Vec<TimestampToken> {
    TIMESTAMP_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let num = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();
            let year = caps.get(3)?.as_str().parse::<i32>().ok()?;
            let timestamp = NaiveDate::from_ymd_opt(year, num(2)?, num(1)?)?
                .and_hms_opt(num(4)?, num(5)?, 0)?;
            Some(TimestampToken {
                timestamp,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Trim every line and drop the blank ones.
pub fn clean_body(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn after_marker<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    text.find(marker).map(|pos| &text[pos + marker.len()..])
}

/// Timestamped report bodies in `text`.
///
/// Each body is taken from the segment between its timestamp and the next
/// one, starting after the first `marker` in that segment. A segment with no
/// marker borrows the document-wide text after the first marker. Documents
/// without any marker, and bodies that clean to nothing, yield no occurrence.
pub fn find_occurrences(text: &str, marker: &str) -> Vec<ArchiveOccurrence> {
    let Some(document_body) = after_marker(text, marker) else {
        return Vec::new();
    };
    let tokens = find_timestamps(text);

    let mut occurrences = Vec::with_capacity(tokens.len());
    for (i, token) in tokens.iter().enumerate() {
        let segment_end = tokens.get(i + 1).map_or(text.len(), |next| next.start);
        let segment = &text[token.end..segment_end];
        let body = clean_body(after_marker(segment, marker).unwrap_or(document_body));
        if body.is_empty() {
            continue;
        }
        occurrences.push(ArchiveOccurrence {
            timestamp: token.timestamp,
            body,
        });
    }
    occurrences
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "Podatki o prometu.";

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").expect("timestamp")
    }

    #[test]
    fn single_report() {
        let text = "Prometno poročilo\n19. 4. 2023   18.40\nPodatki o prometu.\n\nZastoj na AC.\n";
        let got = find_occurrences(text, MARKER);
        assert_eq!(
            got,
            vec![ArchiveOccurrence {
                timestamp: ts("2023-04-19 18:40"),
                body: "Zastoj na AC.".to_string(),
            }]
        );
    }

    #[test]
    fn flexible_whitespace_and_leading_zeros() {
        let tokens = find_timestamps("05.04.2023 7.05 in 5. 4.2023\t07.05");
        assert_eq!(tokens.len(), 2);
        assert!(tokens.iter().all(|t| t.timestamp == ts("2023-04-05 07:05")));
    }

    #[test]
    fn invalid_calendar_values_are_skipped() {
        let tokens = find_timestamps("31. 2. 2023 10.00, 1. 3. 2023 25.00, 1. 3. 2023 10.61, 1. 3. 2023 10.15");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].timestamp, ts("2023-03-01 10:15"));
    }

    #[test]
    fn blank_lines_removed_and_lines_trimmed() {
        let text = "1. 1. 2024 8.00 Podatki o prometu.\n\n   Megla.  \n\n\n  Poledica.\n";
        let got = find_occurrences(text, MARKER);
        assert_eq!(got[0].body, "Megla.\nPoledica.");
    }

    #[test]
    fn each_timestamp_gets_its_own_segment() {
        let text = "1. 1. 2024 8.00\nPodatki o prometu.\nMegla.\n\
                    1. 1. 2024 9.00\nPodatki o prometu.\nBurja.\n";
        let got = find_occurrences(text, MARKER);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].body, "Megla.");
        assert_eq!(got[1].timestamp, ts("2024-01-01 09:00"));
        assert_eq!(got[1].body, "Burja.");
    }

    #[test]
    fn segment_without_marker_uses_document_body() {
        let text = "Podatki o prometu.\nZastoj.\n2. 1. 2024 10.30\nbrez oznake\n";
        let got = find_occurrences(text, MARKER);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].body, "Zastoj.\n2. 1. 2024 10.30\nbrez oznake");
    }

    #[test]
    fn document_without_marker_yields_nothing() {
        assert!(find_occurrences("19. 4. 2023 18.40\nZastoj na AC.", MARKER).is_empty());
    }
}
