//! Office Open XML spreadsheet reader.
//!
//! Reads just enough of an `.xlsx` package to get cell values out of a named
//! sheet: the workbook sheet list, its relationship targets, the shared string
//! table, and the worksheet cells.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use bulletin_shared::{CorpusError, Result};

/// Maximum decompressed bytes to read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 256 * 1024 * 1024;

/// Day zero of the spreadsheet serial date system (1900 system, leap-bug adjusted).
fn serial_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Text rendering used for fragment columns.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
        }
    }

    /// Interpret the cell as a timestamp: ISO-like text or a serial date number.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Text(s) => parse_timestamp_text(s),
            CellValue::Number(n) => serial_to_datetime(*n),
            CellValue::Bool(_) => None,
        }
    }
}

fn parse_timestamp_text(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let seconds = (serial * 86_400.0).round() as i64;
    serial_epoch().checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

/// Cells of one worksheet, row by row. Each row maps column index → value.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub rows: Vec<BTreeMap<usize, CellValue>>,
}

impl Sheet {
    /// Header names by column index, taken from the first non-empty row.
    pub fn header(&self) -> HashMap<usize, String> {
        self.rows
            .iter()
            .find(|r| !r.is_empty())
            .map(|r| {
                r.iter()
                    .map(|(col, v)| (*col, v.as_text().trim().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rows after the header row.
    pub fn data_rows(&self) -> impl Iterator<Item = &BTreeMap<usize, CellValue>> {
        self.rows.iter().skip_while(|r| r.is_empty()).skip(1)
    }
}

/// An opened `.xlsx` workbook.
pub struct Workbook {
    archive: zip::ZipArchive<Cursor<Vec<u8>>>,
    /// Sheet name → worksheet part path inside the package.
    sheets: Vec<(String, String)>,
    shared_strings: Vec<String>,
}

impl Workbook {
    /// Open a workbook from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| CorpusError::io(path, e))?;
        Self::from_bytes(bytes)
    }

    /// Open a workbook from an in-memory package.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| CorpusError::Workbook(format!("not a zip package: {e}")))?;

        let workbook_xml = read_entry(&mut archive, "xl/workbook.xml")?;
        let rels_xml = read_entry(&mut archive, "xl/_rels/workbook.xml.rels")?;
        let targets = parse_relationships(&rels_xml)?;
        let sheets = parse_sheet_list(&workbook_xml)?
            .into_iter()
            .filter_map(|(name, rel_id)| {
                targets
                    .get(&rel_id)
                    .map(|target| (name, resolve_target(target)))
            })
            .collect::<Vec<_>>();

        let has_shared_strings = archive
            .file_names()
            .any(|n| n == "xl/sharedStrings.xml");
        let shared_strings = if has_shared_strings {
            parse_shared_strings(&read_entry(&mut archive, "xl/sharedStrings.xml")?)?
        } else {
            Vec::new()
        };

        debug!(
            sheets = sheets.len(),
            shared_strings = shared_strings.len(),
            "workbook opened"
        );

        Ok(Self {
            archive,
            sheets,
            shared_strings,
        })
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Read all cells of the sheet named `name`.
    pub fn read_sheet(&mut self, name: &str) -> Result<Sheet> {
        let part = self
            .sheets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.clone())
            .ok_or_else(|| CorpusError::SheetNotFound {
                sheet: name.to_string(),
            })?;
        let xml = read_entry(&mut self.archive, &part)?;
        parse_sheet(&xml, &self.shared_strings)
    }
}

// ---------------------------------------------------------------------------
// Package parts
// ---------------------------------------------------------------------------

fn read_entry(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Result<Vec<u8>> {
    let entry = archive
        .by_name(name)
        .map_err(|e| CorpusError::Workbook(format!("missing part {name}: {e}")))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| CorpusError::Workbook(format!("reading {name}: {e}")))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(CorpusError::Workbook(format!(
            "part {name} exceeds size limit ({MAX_XML_ENTRY_BYTES} bytes)"
        )));
    }
    Ok(out)
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

fn attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn xml_err(part: &str, e: quick_xml::Error) -> CorpusError {
    CorpusError::parse(format!("malformed {part}: {e}"))
}

/// `(sheet name, relationship id)` in workbook order.
fn parse_sheet_list(xml: &[u8]) -> Result<Vec<(String, String)>> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                if let (Some(name), Some(id)) = (attr(&e, b"name"), attr(&e, b"id")) {
                    sheets.push((name, id));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err("workbook.xml", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    rels.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err("workbook.xml.rels", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

/// Each `<si>` item is the concatenation of all its `<t>` runs.
fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&te.unescape().map_err(|e| xml_err("sharedStrings.xml", e))?);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err("sharedStrings.xml", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Zero-based column index from a cell reference like `AB12`.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .map(|b| b.to_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        return None;
    }
    letters
        .iter()
        .try_fold(0usize, |acc, b| {
            acc.checked_mul(26)?.checked_add(usize::from(b - b'A' + 1))
        })?
        .checked_sub(1)
}

#[derive(Default)]
struct CellState {
    col: usize,
    kind: Option<String>,
    raw: String,
    capturing: bool,
}

fn finish_cell(cell: CellState, shared: &[String]) -> Option<CellValue> {
    let raw = cell.raw;
    match cell.kind.as_deref() {
        Some("s") => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i).cloned())
            .map(CellValue::Text),
        Some("inlineStr") | Some("str") | Some("d") => Some(CellValue::Text(raw)),
        Some("b") => Some(CellValue::Bool(raw.trim() == "1")),
        Some("e") => None,
        _ if raw.trim().is_empty() => None,
        _ => raw
            .trim()
            .parse::<f64>()
            .map(CellValue::Number)
            .ok()
            .or(Some(CellValue::Text(raw))),
    }
}

fn parse_sheet(xml: &[u8], shared: &[String]) -> Result<Sheet> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut sheet = Sheet::default();
    let mut row: Option<BTreeMap<usize, CellValue>> = None;
    let mut cell: Option<CellState> = None;
    let mut next_col = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row = Some(BTreeMap::new());
                    next_col = 0;
                }
                b"c" => {
                    let col = attr(&e, b"r")
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_col);
                    next_col = col + 1;
                    cell = Some(CellState {
                        col,
                        kind: attr(&e, b"t"),
                        ..CellState::default()
                    });
                }
                b"v" | b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.capturing = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => sheet.rows.push(BTreeMap::new()),
                b"c" => {
                    next_col = attr(&e, b"r")
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_col)
                        + 1;
                }
                _ => {}
            },
            Ok(Event::Text(te)) => {
                if let Some(c) = cell.as_mut().filter(|c| c.capturing) {
                    c.raw
                        .push_str(&te.unescape().map_err(|e| xml_err("worksheet", e))?);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.capturing = false;
                    }
                }
                b"c" => {
                    if let Some(done) = cell.take() {
                        let col = done.col;
                        if let (Some(value), Some(r)) = (finish_cell(done, shared), row.as_mut()) {
                            r.insert(col, value);
                        }
                    }
                }
                b"row" => sheet.rows.extend(row.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err("worksheet", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheet)
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// Build a minimal `.xlsx` package from `(sheet name, rows)` pairs.
/// Every cell is written as an inline string; `None` leaves the cell out.
#[cfg(test)]
pub(crate) fn build_test_workbook(sheets: &[(&str, Vec<Vec<Option<&str>>>)]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    let mut parts = Vec::new();
    for (i, (name, rows)) in sheets.iter().enumerate() {
        let n = i + 1;
        workbook.push_str(&format!(
            r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (r, row) in rows.iter().enumerate() {
            xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, value) in row.iter().enumerate() {
                if let Some(v) = value {
                    let col = (b'A' + c as u8) as char;
                    let escaped = v.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");
                    xml.push_str(&format!(
                        r#"<c r="{col}{}" t="inlineStr"><is><t xml:space="preserve">{escaped}</t></is></c>"#,
                        r + 1
                    ));
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        parts.push((format!("xl/worksheets/sheet{n}.xml"), xml));
    }
    workbook.push_str("</sheets></workbook>");
    rels.push_str("</Relationships>");

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();
    zip.start_file("xl/workbook.xml", opts).unwrap();
    zip.write_all(workbook.as_bytes()).unwrap();
    zip.start_file("xl/_rels/workbook.xml.rels", opts).unwrap();
    zip.write_all(rels.as_bytes()).unwrap();
    for (name, xml) in parts {
        zip.start_file(name, opts).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}
