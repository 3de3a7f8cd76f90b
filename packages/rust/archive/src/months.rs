//! Month folder naming.
//!
//! Month folders are named after the localized month, e.g. `April 2023`.
//! Names come from chrono's locale tables when the configured locale is
//! known, and from the embedded Slovenian table otherwise. Process locale
//! state is never consulted.

use chrono::{Locale, NaiveDate};

/// Embedded month names in the archive's language.
const FALLBACK_MONTHS: [&str; 12] = [
    "Januar",
    "Februar",
    "Marec",
    "April",
    "Maj",
    "Junij",
    "Julij",
    "Avgust",
    "September",
    "Oktober",
    "November",
    "December",
];

fn known_locale(name: &str) -> Option<Locale> {
    let normalized = name.split('.').next().unwrap_or(name).replace('-', "_");
    match normalized.as_str() {
        "sl_SI" | "sl" => Some(Locale::sl_SI),
        "hr_HR" | "hr" => Some(Locale::hr_HR),
        "de_DE" | "de" => Some(Locale::de_DE),
        "it_IT" | "it" => Some(Locale::it_IT),
        "en_US" | "en" => Some(Locale::en_US),
        "en_GB" => Some(Locale::en_GB),
        _ => None,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Capitalized month name for `month` (1–12), or `None` when out of range.
pub fn month_name(month: u32, locale: &str) -> Option<String> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let localized = known_locale(locale)
        .and_then(|loc| {
            NaiveDate::from_ymd_opt(2000, month, 1).map(|d| d.format_localized("%B", loc).to_string())
        })
        .filter(|name| !name.trim().is_empty());

    Some(match localized {
        Some(name) => capitalize(name.trim()),
        None => FALLBACK_MONTHS[(month - 1) as usize].to_string(),
    })
}

/// Folder name of a year directory: `Promet <year>`.
pub fn year_folder(year: i32) -> String {
    format!("Promet {year}")
}

/// Folder name of a month directory: `<MonthName> <year>`.
pub fn month_folder(year: i32, month: u32, locale: &str) -> Option<String> {
    month_name(month, locale).map(|name| format!("{name} {year}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slovenian_names_are_capitalized() {
        assert_eq!(month_name(1, "sl_SI").as_deref(), Some("Januar"));
        assert_eq!(month_name(4, "sl_SI").as_deref(), Some("April"));
        assert_eq!(month_name(8, "sl_SI.UTF-8").as_deref(), Some("Avgust"));
    }

    #[test]
    fn unknown_locale_falls_back_to_table() {
        assert_eq!(month_name(3, "xx_YY").as_deref(), Some("Marec"));
        assert_eq!(month_name(12, "").as_deref(), Some("December"));
    }

    #[test]
    fn other_locales_resolve() {
        assert_eq!(month_name(3, "en_US").as_deref(), Some("March"));
    }

    #[test]
    fn out_of_range_month() {
        assert_eq!(month_name(0, "sl_SI"), None);
        assert_eq!(month_name(13, "sl_SI"), None);
    }

    #[test]
    fn folder_names() {
        assert_eq!(year_folder(2023), "Promet 2023");
        assert_eq!(month_folder(2023, 4, "sl_SI").as_deref(), Some("April 2023"));
    }
}
