//! Per-line normalization applied to every kept paragraph.

/// Characters accepted as a line terminator.
const TERMINATORS: [char; 4] = ['.', ',', '?', '!'];

/// Trim, terminate, and capitalize one line. Blank lines yield `None`.
pub(crate) fn normalize_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(capitalize_first(&ensure_terminator(trimmed)))
}

/// Append `.` unless the line already ends in one of [`TERMINATORS`].
fn ensure_terminator(line: &str) -> String {
    match line.chars().last() {
        Some(c) if TERMINATORS.contains(&c) => line.to_string(),
        _ => format!("{line}."),
    }
}

/// Uppercase the first character only; the rest is left as is.
fn capitalize_first(line: &str) -> String {
    let mut chars = line.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
