//! Pattern-based extraction of personal details from recognized page text.
//!
//! Each extractor lowercases its input, walks its pattern table in priority
//! order and returns the first acceptable capture. The first pattern that
//! yields something wins, even if a later pattern would match better.

use regex::Regex;
use serde::{Deserialize, Serialize};

mod patterns;

/// Fields derived from a page's text. Never stored; always re-derived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupation_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
}

impl ExtractedFields {
    pub fn from_text(text: &str) -> Self {
        Self {
            dob: extract_date_of_birth(text),
            occupation_place: extract_occupation_place(text),
            native_address: extract_native_address(text),
            salary: extract_salary(text),
        }
    }
}

fn first_match<F>(patterns: &[Regex], text: &str, accept: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let lowered = text.to_lowercase();
    patterns.iter().find_map(|re| {
        re.captures_iter(&lowered)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| accept(m.as_str()))
    })
}

/// Date of birth as `D/M/YYYY`, `D-M-YYYY` or `D.M.YYYY`, with any
/// characters other than digits and separators removed.
pub fn extract_date_of_birth(text: &str) -> Option<String> {
    first_match(&patterns::DATE_OF_BIRTH, text, |raw| {
        let date: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, '/' | '-' | '.'))
            .collect();
        ['/', '-', '.']
            .iter()
            .any(|sep| date.split(*sep).count() == 3)
            .then_some(date)
    })
}

/// Place of work, from a labeled phrase or a known city name. Title-cased.
pub fn extract_occupation_place(text: &str) -> Option<String> {
    first_match(&patterns::OCCUPATION_PLACE, text, labeled_value)
}

/// Native place or address. Title-cased.
pub fn extract_native_address(text: &str) -> Option<String> {
    first_match(&patterns::NATIVE_ADDRESS, text, labeled_value)
}

/// The numeric part of a salary mention, unnormalized (`"12.5"`, `"45,000"`).
pub fn extract_salary(text: &str) -> Option<String> {
    first_match(&patterns::SALARY, text, |raw| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn labeled_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (trimmed.chars().count() > 2).then(|| title_case(trimmed))
}

/// Uppercases the first letter of every run of letters and lowercases the
/// rest, so `"3rd cross, hsr"` becomes `"3Rd Cross, Hsr"`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
