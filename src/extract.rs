//! Line-scanner field extraction: a single left-to-right pass over recognized
//! lines carrying one piece of state, the field a continuation line should be
//! interpreted as.

use std::sync::LazyLock;

use regex::Regex;
use tracing::instrument;

use crate::labels;
use crate::result::StudentRecord;

/// Scan state: which field, if any, the next unlabeled line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    FullName,
    BirthDate,
    Origin,
    Class,
    Major,
}

/// Whole-line student ID shape: optional prefix letter, two digits, a letter
/// block, then 3-4 digits where `O` stands in for a misread `0`.
static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[BĐD]?\d{2}[A-Z]+[0-9O]{3,4}$").unwrap());

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}").unwrap());

/// Corrects letter-confusable `O` to digit `0` in the trailing numeric
/// suffix only; the letter prefix is left untouched.
fn fix_student_id(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() <= 3 {
        return raw.to_string();
    }
    let (main, suffix) = chars.split_at(chars.len() - 3);
    let mut fixed: String = main.iter().collect();
    fixed.extend(suffix.iter().map(|&c| if c == 'O' { '0' } else { c }));
    fixed
}

/// First label variant found in the line, paired with the trimmed text after
/// its first occurrence.
fn value_after(line: &str, variants: &[&str]) -> Option<String> {
    variants.iter().find_map(|label| {
        line.split_once(label)
            .map(|(_, rest)| rest.trim().to_string())
    })
}

/// Splits a compound line at the first occurrence of a secondary label.
fn split_at_label<'a>(line: &'a str, variants: &[&str]) -> Option<(&'a str, &'a str)> {
    variants
        .iter()
        .find_map(|label| line.split_once(label).map(|(head, tail)| (head, tail.trim())))
}

fn set_if_unset(slot: &mut Option<String>, value: String) {
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value);
    }
}

/// Deterministically parses ordered, recognized text lines into a
/// [`StudentRecord`]. Best-effort over noisy recognizer output: a field whose
/// label never matches stays `None`, the parser itself never fails.
#[instrument(level = "debug", skip(lines))]
pub fn extract_fields<I, S>(lines: I) -> StudentRecord
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut record = StudentRecord::default();
    let mut pending = Pending::None;

    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }
        let upper = line.to_uppercase();
        // Title lines carry no field data.
        if upper.contains(labels::CARD_TITLE) {
            continue;
        }
        if BARE_ID.is_match(line) {
            if record.student_id.is_none() {
                record.student_id = Some(fix_student_id(line));
            }
            continue;
        }
        // The bare ID label on its own line is noise.
        if upper == labels::BARE_ID_LABEL {
            continue;
        }
        pending = scan_line(line, pending, &mut record);
    }
    record
}

/// One transition of the line scanner: classifies the line against the label
/// tables and the carried state, writes at most once per field (first writer
/// wins) and returns the next state.
fn scan_line(line: &str, pending: Pending, record: &mut StudentRecord) -> Pending {
    // Full name.
    if let Some(value) = value_after(line, labels::FULL_NAME) {
        if !value.is_empty() && record.full_name.is_none() {
            record.full_name = Some(value);
            return Pending::None;
        }
        return Pending::FullName;
    }
    if pending == Pending::FullName && record.full_name.is_none() {
        record.full_name = Some(line.to_string());
        return Pending::None;
    }

    // Birth date; continuations must be date-shaped or they are dropped.
    if let Some(value) = value_after(line, labels::BIRTH_DATE) {
        if !value.is_empty() && record.date_of_birth.is_none() {
            record.date_of_birth = Some(value);
            return Pending::None;
        }
        return Pending::BirthDate;
    }
    if pending == Pending::BirthDate && record.date_of_birth.is_none() {
        if DATE_SHAPE.is_match(line) {
            record.date_of_birth = Some(line.to_string());
        }
        return Pending::None;
    }

    // Place of origin.
    if let Some(value) = value_after(line, labels::ORIGIN) {
        if !value.is_empty() && record.place_of_origin.is_none() {
            record.place_of_origin = Some(value);
            return Pending::None;
        }
        return Pending::Origin;
    }
    if pending == Pending::Origin && record.place_of_origin.is_none() {
        record.place_of_origin = Some(line.to_string());
        return Pending::None;
    }

    // Class, possibly compounded with the enrollment type on one line.
    if value_after(line, labels::CLASS).is_some() {
        if let Some((head, extra)) = split_at_label(line, labels::CLASS_EXTRA) {
            if let Some(value) = value_after(head, labels::CLASS) {
                set_if_unset(&mut record.class.value, value);
            }
            set_if_unset(&mut record.class.extra, extra.to_string());
            return Pending::None;
        }
        if let Some(value) = value_after(line, labels::CLASS) {
            if !value.is_empty() && record.class.value.is_none() {
                record.class.value = Some(value);
                return Pending::None;
            }
        }
        return Pending::Class;
    }
    if let Some(value) = value_after(line, labels::CLASS_EXTRA) {
        set_if_unset(&mut record.class.extra, value);
        return Pending::None;
    }
    if pending == Pending::Class {
        if record.class.extra.is_none()
            && line.to_lowercase().contains(labels::CLASS_CONTINUATION_HINT)
        {
            record.class.extra = Some(line.to_string());
        }
        return Pending::None;
    }

    // Major, possibly compounded with the academic term on one line.
    if value_after(line, labels::MAJOR).is_some() {
        if let Some((head, extra)) = split_at_label(line, labels::MAJOR_EXTRA) {
            if let Some(value) = value_after(head, labels::MAJOR) {
                set_if_unset(&mut record.major_and_term.value, value);
            }
            set_if_unset(&mut record.major_and_term.extra, extra.to_string());
            return Pending::None;
        }
        if let Some(value) = value_after(line, labels::MAJOR) {
            if !value.is_empty() && record.major_and_term.value.is_none() {
                record.major_and_term.value = Some(value);
                return Pending::None;
            }
        }
        return Pending::Major;
    }
    if let Some(value) = value_after(line, labels::MAJOR_EXTRA) {
        set_if_unset(&mut record.major_and_term.extra, value);
        return Pending::None;
    }

    // Academic term never carries over to a following line.
    if let Some(value) = value_after(line, labels::ACADEMIC_TERM) {
        set_if_unset(&mut record.academic_term, value);
        return Pending::None;
    }

    if pending == Pending::Major {
        if record.major_and_term.value.is_none() {
            record.major_and_term.value = Some(line.to_string());
        }
        return Pending::None;
    }

    // Unlabeled line with no carried state: ignore.
    Pending::None
}
