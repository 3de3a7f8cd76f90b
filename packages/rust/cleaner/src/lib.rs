//! Bulletin fragment cleanup.
//!
//! Turns one markup-bearing bulletin fragment into plain, normalized lines:
//! 1. Parse paragraphs into a [`FragmentNode`] tree
//! 2. Drop attribution paragraphs (any hyperlink) and bare short headings
//! 3. Normalize each kept line (terminal punctuation, leading capital)
//!
//! Cleanup is a pure function of its input and never fails; malformed markup
//! degrades to plain text.

mod normalize;
pub mod tree;

use tracing::trace;

pub use tree::{FragmentNode, NodeKind};

/// Default maximum word count of a lead-in emphasis treated as a heading.
pub const DEFAULT_MAX_LEAD_IN_WORDS: usize = 3;

/// Cleanup options.
#[derive(Debug, Clone)]
pub struct Cleaner {
    /// Lead-in emphasis spans with at most this many words count as headings.
    pub max_lead_in_words: usize,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self {
            max_lead_in_words: DEFAULT_MAX_LEAD_IN_WORDS,
        }
    }
}

impl Cleaner {
    /// Clean one fragment. `None` means the fragment has no content.
    pub fn clean(&self, fragment: &str) -> Option<String> {
        let kept = match tree::parse_paragraphs(fragment) {
            Some(paragraphs) => paragraphs
                .iter()
                .filter_map(|p| self.keep_paragraph(p))
                .collect::<Vec<_>>(),
            // No paragraph structure: treat every line as its own paragraph.
            None => tree::fragment_text(fragment)
                .lines()
                .map(str::to_string)
                .collect(),
        };

        let lines: Vec<String> = kept
            .iter()
            .filter_map(|line| normalize::normalize_line(line))
            .collect();

        trace!(input_len = fragment.len(), lines = lines.len(), "fragment cleaned");

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    fn keep_paragraph(&self, paragraph: &FragmentNode) -> Option<String> {
        if paragraph.contains(NodeKind::Link) {
            return None;
        }

        if let Some(lead_in) = paragraph.find(NodeKind::Emphasis) {
            let words = lead_in.plain_text().split_whitespace().count();
            if words <= self.max_lead_in_words && paragraph.plain_text_without(lead_in).is_empty()
            {
                return None;
            }
        }

        let text = paragraph.plain_text();
        if text.is_empty() { None } else { Some(text) }
    }
}

/// Clean one fragment with default options.
pub fn clean_fragment(fragment: &str) -> Option<String> {
    Cleaner::default().clean(fragment)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_paragraph_is_discarded() {
        assert_eq!(clean_fragment(r##"<p><a href=#>vir</a></p>"##), None);
        assert_eq!(
            clean_fragment(r##"<p>Vir: <a href="https://promet.si">promet.si</a></p><p>Zastoj</p>"##),
            Some("Zastoj.".to_string())
        );
    }

    #[test]
    fn short_heading_paragraph_is_discarded() {
        assert_eq!(clean_fragment("<p><strong>Kratka novica</strong></p>"), None);
    }

    #[test]
    fn long_lead_in_keeps_text() {
        let out = clean_fragment(
            "<p><strong>Dolga uvodna fraza s stirimi</strong> in vec besedila</p>",
        )
        .expect("content");
        assert!(out.ends_with("in vec besedila."));
        assert!(out.starts_with('D'));
    }

    #[test]
    fn short_lead_in_with_body_keeps_paragraph() {
        let out = clean_fragment("<p><strong>A1:</strong> zastoj pred Vrhniko</p>").expect("content");
        assert_eq!(out, "A1: zastoj pred Vrhniko.");
    }

    #[test]
    fn lines_are_normalized_and_joined() {
        let out = clean_fragment(
            "<p>  nesreča na AC  </p><p><strong>Zastoji</strong></p><p>Ali je odprto?</p><p></p>",
        )
        .expect("content");
        assert_eq!(out, "Nesreča na AC.\nAli je odprto?");
    }

    #[test]
    fn empty_input_is_none() {
        assert_eq!(clean_fragment(""), None);
        assert_eq!(clean_fragment("   \n  "), None);
        assert_eq!(clean_fragment("<p> </p>"), None);
    }

    #[test]
    fn plain_text_is_treated_as_lines() {
        let out = clean_fragment("zastoj na AC\nOnesnažen zrak,").expect("content");
        assert_eq!(out, "Zastoj na AC.\nOnesnažen zrak,");
    }

    #[test]
    fn cleanup_is_idempotent() {
        let inputs = [
            "<p>nesreča na AC</p><p>Zastoj <b>dolg</b> 3 km</p>",
            "<p><strong>Dolga uvodna fraza s stirimi</strong> in vec besedila</p>",
            "zastoj\n\nvozniki, pozor!",
        ];
        for input in inputs {
            let once = clean_fragment(input).expect("content");
            let twice = clean_fragment(&once).expect("content");
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn every_line_is_punctuated_and_capitalized() {
        let out = clean_fragment("<p>a</p><p>čakalna doba 2 uri</p><p>ok!</p>").expect("content");
        for line in out.lines() {
            let first = line.chars().next().expect("non-empty line");
            assert!(first.is_uppercase(), "{line}");
            assert!(matches!(line.chars().last(), Some('.' | ',' | '?' | '!')), "{line}");
        }
    }

    #[test]
    fn custom_lead_in_limit() {
        let cleaner = Cleaner {
            max_lead_in_words: 5,
        };
        assert_eq!(cleaner.clean("<p><strong>Dolga uvodna fraza s stirimi</strong></p>"), None);
    }
}
