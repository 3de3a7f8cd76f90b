//! Best-effort conversion of archive documents to plain text.
//!
//! Supported formats are chosen by file extension:
//! - `docx`: paragraph text from `word/document.xml`, one line per paragraph
//! - `rtf`: control words stripped, `\par` → newline
//! - anything else listed in the config: read as (lossy) UTF-8 text

use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::Event;

use bulletin_shared::{CorpusError, Result};

/// Maximum decompressed bytes to read from `word/document.xml`.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Lowercase extension of `path`, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Convert the file at `path` to plain text.
///
/// Returns `Ok(None)` for extensions not in `extensions`.
pub fn convert_document(path: &Path, extensions: &[String]) -> Result<Option<String>> {
    let Some(ext) = extension_of(path) else {
        return Ok(None);
    };
    if !extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)) {
        return Ok(None);
    }

    let bytes = std::fs::read(path).map_err(|e| CorpusError::io(path, e))?;
    let text = match ext.as_str() {
        "docx" => docx_to_text(&bytes)?,
        "rtf" => rtf_to_text(&String::from_utf8_lossy(&bytes)),
        _ => String::from_utf8_lossy(&bytes).into_owned(),
    };
    Ok(Some(text))
}

// ---------------------------------------------------------------------------
// DOCX
// ---------------------------------------------------------------------------

/// Paragraph text of a Word document, one line per `<w:p>`.
pub fn docx_to_text(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| CorpusError::Extraction(format!("not a zip package: {e}")))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| CorpusError::Extraction(format!("word/document.xml not found: {e}")))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| CorpusError::Extraction(e.to_string()))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(CorpusError::Extraction(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    document_xml_to_text(&xml)
}

fn document_xml_to_text(xml: &[u8]) -> Result<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_t = true,
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                let text = te
                    .unescape()
                    .map_err(|e| CorpusError::Extraction(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(CorpusError::Extraction(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// RTF
// ---------------------------------------------------------------------------

/// Destinations whose content is never text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "header",
    "headerl",
    "headerr",
    "headerf",
    "footer",
    "footerl",
    "footerr",
    "footerf",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "themedata",
    "colorschememapping",
    "latentstyles",
    "datastore",
    "xmlnstbl",
    "generator",
];

#[derive(Clone, Copy)]
struct GroupState {
    skip: bool,
    unicode_fallback: usize,
}

/// Decode a Windows-1250 byte. Covers the Central European letters; other
/// high bytes fall back to their Latin-1 code point.
fn decode_cp1250(byte: u8) -> char {
    match byte {
        0x80 => '€',
        0x84 => '„',
        0x85 => '…',
        0x8A => 'Š',
        0x8C => 'Ś',
        0x8D => 'Ť',
        0x8E => 'Ž',
        0x8F => 'Ź',
        0x91 => '‘',
        0x92 => '’',
        0x93 => '“',
        0x94 => '”',
        0x96 => '–',
        0x97 => '—',
        0x9A => 'š',
        0x9C => 'ś',
        0x9D => 'ť',
        0x9E => 'ž',
        0x9F => 'ź',
        0xA0 => ' ',
        0xC6 => 'Ć',
        0xC8 => 'Č',
        0xD0 => 'Đ',
        0xE6 => 'ć',
        0xE8 => 'č',
        0xF0 => 'đ',
        b => b as char,
    }
}

/// Output buffer for RTF text that tracks `\uN` fallback characters.
struct RtfWriter {
    out: String,
    /// Characters still to drop after a `\uN` escape.
    pending_fallback: usize,
}

impl RtfWriter {
    /// Emit a control-word character; never counts as a fallback.
    fn control(&mut self, c: char, state: &GroupState) {
        if !state.skip {
            self.out.push(c);
        }
    }

    /// Emit a literal character unless it is a pending fallback.
    fn literal(&mut self, c: char, state: &GroupState) {
        if self.pending_fallback > 0 {
            self.pending_fallback -= 1;
        } else if !state.skip {
            self.out.push(c);
        }
    }
}

/// Strip RTF markup, keeping paragraph breaks as newlines.
pub fn rtf_to_text(rtf: &str) -> String {
    let chars: Vec<char> = rtf.chars().collect();
    let mut w = RtfWriter {
        out: String::new(),
        pending_fallback: 0,
    };
    let mut stack: Vec<GroupState> = Vec::new();
    let mut state = GroupState {
        skip: false,
        unicode_fallback: 1,
    };
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '{' => stack.push(state),
            '}' => {
                state = stack.pop().unwrap_or(state);
                w.pending_fallback = 0;
            }
            '\\' => {
                let Some(&next) = chars.get(i) else { break };
                if next.is_ascii_alphabetic() {
                    let start = i;
                    while i < chars.len() && chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().collect();
                    let param_start = i;
                    if i < chars.len() && chars[i] == '-' {
                        i += 1;
                    }
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    let param: Option<i32> = chars[param_start..i]
                        .iter()
                        .collect::<String>()
                        .parse()
                        .ok();
                    if i < chars.len() && chars[i] == ' ' {
                        i += 1;
                    }

                    match word.as_str() {
                        "par" | "line" | "sect" | "page" => w.control('\n', &state),
                        "tab" => w.control('\t', &state),
                        "emdash" => w.control('—', &state),
                        "endash" => w.control('–', &state),
                        "bullet" => w.control('•', &state),
                        "lquote" => w.control('‘', &state),
                        "rquote" => w.control('’', &state),
                        "ldblquote" => w.control('“', &state),
                        "rdblquote" => w.control('”', &state),
                        "uc" => state.unicode_fallback = param.unwrap_or(1).max(0) as usize,
                        "u" => {
                            if let Some(p) = param {
                                let code = if p < 0 { p + 65_536 } else { p } as u32;
                                if let Some(ch) = char::from_u32(code) {
                                    w.control(ch, &state);
                                }
                                w.pending_fallback = state.unicode_fallback;
                            }
                        }
                        d if SKIPPED_DESTINATIONS.contains(&d) => state.skip = true,
                        _ => {}
                    }
                } else {
                    i += 1;
                    match next {
                        '\'' => {
                            let hex: String = chars.iter().skip(i).take(2).collect();
                            i += hex.chars().count();
                            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                                w.literal(decode_cp1250(byte), &state);
                            }
                        }
                        '*' => state.skip = true,
                        '\\' | '{' | '}' => w.literal(next, &state),
                        '~' => w.literal(' ', &state),
                        '_' => w.literal('-', &state),
                        '\n' | '\r' => w.control('\n', &state),
                        _ => {}
                    }
                }
            }
            '\r' | '\n' => {}
            _ => w.literal(c, &state),
        }
    }

    w.out
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// Build a minimal `.docx` package with one `<w:p>` per input line.
#[cfg(test)]
pub(crate) fn build_test_docx(lines: &[&str]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut body = String::new();
    for line in lines {
        let escaped = line
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;");
        body.push_str(&format!(
            r#"<w:p><w:r><w:t xml:space="preserve">{escaped}</w:t></w:r></w:p>"#
        ));
    }
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docx_paragraphs_become_lines() {
        let bytes = build_test_docx(&["19. 4. 2023   18.40", "Podatki o prometu.", "", "Zastoj na AC."]);
        let text = docx_to_text(&bytes).expect("docx");
        assert_eq!(text, "19. 4. 2023   18.40\nPodatki o prometu.\n\nZastoj na AC.\n");
    }

    #[test]
    fn docx_runs_tabs_and_breaks() {
        let xml = br#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>Zastoj</w:t></w:r><w:r><w:tab/><w:t xml:space="preserve"> na AC</w:t><w:br/><w:t>pri Kozarjah</w:t></w:r></w:p></w:body></w:document>"#;
        let text = document_xml_to_text(xml).expect("xml");
        assert_eq!(text, "Zastoj\t na AC\npri Kozarjah\n");
    }

    #[test]
    fn invalid_docx_is_an_error() {
        assert!(matches!(docx_to_text(b"not a zip"), Err(CorpusError::Extraction(_))));
    }

    #[test]
    fn rtf_strips_markup() {
        let rtf = r"{\rtf1\ansi\ansicpg1250{\fonttbl{\f0 Arial;}}{\*\generator Writer;}\f0\fs20 Podatki o prometu.\par\par Zastoj na AC pri Kozarjah.\par}";
        assert_eq!(rtf_to_text(rtf), "Podatki o prometu.\n\nZastoj na AC pri Kozarjah.\n");
    }

    #[test]
    fn rtf_decodes_hex_and_unicode() {
        let rtf = r"{\rtf1 Ne\'9aa, \'e8\'9e\uc1\u382?a\par}";
        assert_eq!(rtf_to_text(rtf), "Neša, čžža\n");
    }

    #[test]
    fn rtf_escaped_braces() {
        assert_eq!(rtf_to_text(r"{\rtf1 a\{b\}c\\d}"), "a{b}c\\d");
    }

    #[test]
    fn unlisted_extension_is_ignored() {
        let dir = std::env::temp_dir().join(format!("bc-convert-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("opomba.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        let got = convert_document(&path, &["docx".to_string(), "txt".to_string()]).unwrap();
        assert!(got.is_none());

        let txt = dir.join("porocilo.TXT");
        std::fs::write(&txt, "Zastoj").unwrap();
        let got = convert_document(&txt, &["txt".to_string()]).unwrap();
        assert_eq!(got.as_deref(), Some("Zastoj"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
