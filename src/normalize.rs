//! Vietnamese text normalization and the flat pattern-table extraction
//! strategy used for uppercase-style card layouts.

use std::sync::LazyLock;

use regex::Regex;
use tracing::instrument;

use crate::result::StudentRecord;

/// Uppercase Vietnamese letter class used inside field patterns.
const VN_UPPER: &str =
    "A-ZĐÀÁẢÃẠÂẤẦẨẪẬĂẮẰẲẴẶÈÉẺẼẸÊẾỀỂỄỆÌÍỈĨỊÒÓỎÕỌÔỐỒỔỖỘƠỚỜỞỠỢÙÚỦŨỤƯỨỪỬỮỰỲÝỶỸỴ";

/// Lowercases, strips diacritics to the base Latin letter (đ→d plus every
/// tone-marked vowel family) and collapses whitespace, so labels match under
/// OCR noise.
pub fn normalize(text: &str) -> String {
    const FAMILIES: &[(char, &str)] = &[
        ('a', "áàảãạâấầẩẫậăắằẳẵặ"),
        ('e', "éèẻẽẹêếềểễệ"),
        ('i', "íìỉĩị"),
        ('o', "óòỏõọôốồổỗộơớờởỡợ"),
        ('u', "úùủũụưứừửữự"),
        ('y', "ýỳỷỹỵ"),
        ('d', "đ"),
    ];
    let stripped: String = text
        .to_lowercase()
        .chars()
        .map(|ch| {
            FAMILIES
                .iter()
                .find(|(_, variants)| variants.contains(ch))
                .map(|(base, _)| *base)
                .unwrap_or(ch)
        })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical token per curated list of common recognizer misreads on the
/// uppercase card face: digit/letter confusables and institution-name
/// misspellings. Longer canonicals first so partial words never shadow them.
const WORD_FIXES: &[(&str, &[&str])] = &[
    ("TRƯỜNG", &["TRUONG", "TRƯONG", "TRU0NG"]),
    ("THÔNG", &["THONG", "TH0NG"]),
    ("NGÀNH", &["NGANH"]),
    ("CHÍNH", &["CHINH"]),
    ("SINH", &["SINN", "SLNH", "S1NH"]),
    ("VIÊN", &["VIEN", "V1EN", "VIÉN"]),
    ("CÔNG", &["CONG", "C0NG"]),
    ("NGHỆ", &["NGHE", "NGHL"]),
    ("NGÀY", &["NGAY"]),
    ("PTIT", &["PIT", "P7IT"]),
    ("KHÓA", &["KH0A"]),
    ("ĐẠI", &["DAI", "DA1"]),
    ("HỌC", &["HOC", "H0C"]),
    ("LỚP", &["LOP"]),
    ("TÊN", &["TEN"]),
    ("HỆ", &["HE"]),
    ("MÃ", &["MA"]),
    ("SỐ", &["S0"]),
];

static WORD_FIX_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    WORD_FIXES
        .iter()
        .flat_map(|(canonical, variants)| {
            variants.iter().map(move |variant| {
                let pattern = format!(r"\b{}\b", regex::escape(variant));
                (Regex::new(&pattern).unwrap(), *canonical)
            })
        })
        .collect()
});

static STANDALONE_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([0178])\b").unwrap());
static PUNCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"["',]"#).unwrap());

/// Normalization variant for uppercase-style cards: uppercases, drops quote
/// punctuation, maps isolated digit confusables back to letters and applies
/// the curated word-fix table before pattern matching.
pub fn normalize_uppercase(text: &str) -> String {
    let mut normalized = text.to_uppercase();
    normalized = PUNCT.replace_all(&normalized, " ").into_owned();
    normalized = STANDALONE_DIGIT
        .replace_all(&normalized, |caps: &regex::Captures| {
            match &caps[1] {
                "0" => "O",
                "1" => "I",
                "7" => "T",
                "8" => "B",
                other => other,
            }
            .to_string()
        })
        .into_owned();
    for (pattern, canonical) in WORD_FIX_PATTERNS.iter() {
        normalized = pattern.replace_all(&normalized, *canonical).into_owned();
    }
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    StudentId,
    FullName,
    BirthDate,
    Class,
    Major,
    Origin,
    Enrollment,
    AcademicYear,
    AcademicTerm,
}

/// Field-to-pattern tables, one or more alternatives per field, evaluated in
/// order. The longest successful capture per field wins.
static FIELD_PATTERNS: LazyLock<Vec<(Field, Vec<Regex>)>> = LazyLock::new(|| {
    let vn = VN_UPPER;
    let table: Vec<(Field, Vec<String>)> = vec![
        (
            Field::StudentId,
            vec![
                r"(?:MÃ\s*SỐ\s*SINH\s*VIÊN|MÃ\s*SV|MSV|MSSV)[:\s]*([BĐD][0-9][A-Z0-9]{6,8})"
                    .to_string(),
                r"(?:^|\s)([BĐD][0-9][A-Z0-9]{6,8})(?:\s|$)".to_string(),
            ],
        ),
        (
            Field::FullName,
            vec![format!(
                r"H[ỌO]\s*(?:V[ÀA]\s*)?T[ÊE]N[:\s]*([{vn}\s]+?)(?:\s*(?:SINH\s*NG[ÀA]Y|NG[ÀA]Y\s*SINH)|$)"
            )],
        ),
        (
            Field::BirthDate,
            vec![
                r"(?:NGÀY\s*SINH|SINH\s*NGÀY)[:\s]*([0-9]{1,2}[-./][0-9]{1,2}[-./][0-9]{2,4})"
                    .to_string(),
            ],
        ),
        (Field::Class, vec![r"LỚP[:\s]*([A-Z0-9-]+)".to_string()]),
        (
            Field::Major,
            vec![format!(
                r"(?:CHUYÊN\s*NGÀNH|NGÀNH)[:\s]*([{vn}\s-]+?)(?:\s*KH[ÓO][AÁ]|$)"
            )],
        ),
        (
            Field::Origin,
            vec![format!(
                r"(?:QUÊ\s*QUÁN|HỘ\s*KHẨU\s*TT|NƠI\s*SINH)[:\s]*([{vn}\s,./-]+)"
            )],
        ),
        (
            Field::Enrollment,
            vec![format!(
                r"HỆ[:\s]*([{vn}\s]*?(?:CHÍNH\s*QUY|LIÊN\s*THÔNG))"
            )],
        ),
        (
            Field::AcademicYear,
            vec![r"KH[ÓO][AÁ][:\s]*([0-9]{4}(?:\s*-\s*[0-9]{4})?)".to_string()],
        ),
        (
            Field::AcademicTerm,
            vec![
                r"(?:H[ỌO]C\s*K[ỲY]|HK)[:\s]*((?:I{1,3}|[1-4])?\s*[0-9]{4}\s*-\s*[0-9]{4})"
                    .to_string(),
            ],
        ),
    ];
    table
        .into_iter()
        .map(|(field, patterns)| {
            let compiled = patterns
                .iter()
                .map(|p| Regex::new(p).unwrap())
                .collect::<Vec<_>>();
            (field, compiled)
        })
        .collect()
});

fn longest_capture(text: &str, patterns: &[Regex]) -> Option<String> {
    patterns
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|value| !value.is_empty())
        .max_by_key(|value| value.len())
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonicalizes two-digit years and separators to `D/M/YYYY`.
fn fix_birth_date(raw: &str) -> String {
    let parts: Vec<&str> = raw.split(['-', '.', '/']).collect();
    if parts.len() != 3 {
        return raw.to_string();
    }
    let year = match parts[2].len() {
        2 => {
            let short: u32 = parts[2].parse().unwrap_or(0);
            if short < 25 {
                format!("20{}", parts[2])
            } else {
                format!("19{}", parts[2])
            }
        }
        _ => parts[2].to_string(),
    };
    format!("{}/{}/{}", parts[0], parts[1], year)
}

/// Alternate, flat extraction strategy: normalizes the whole recognized text
/// once and runs the per-field pattern tables over it. Fills the same record
/// shape as the line scanner; enrollment type lands in `class.extra` and the
/// academic year in `major_and_term.extra`.
#[instrument(level = "debug", skip(lines))]
pub fn extract_with_patterns<I, S>(lines: I) -> StudentRecord
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = lines
        .into_iter()
        .map(|l| l.as_ref().trim().to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let text = normalize_uppercase(&joined);
    log::debug!("normalized card text: {text}");

    let mut record = StudentRecord::default();
    for (field, patterns) in FIELD_PATTERNS.iter() {
        let Some(value) = longest_capture(&text, patterns) else {
            continue;
        };
        match field {
            Field::StudentId => record.student_id = Some(value.to_uppercase()),
            Field::FullName => record.full_name = Some(title_case(&value)),
            Field::BirthDate => record.date_of_birth = Some(fix_birth_date(&value)),
            Field::Class => record.class.value = Some(value),
            Field::Major => record.major_and_term.value = Some(value),
            Field::Origin => record.place_of_origin = Some(value),
            Field::Enrollment => record.class.extra = Some(value),
            Field::AcademicYear => record.major_and_term.extra = Some(value),
            Field::AcademicTerm => record.academic_term = Some(value),
        }
    }
    record
}
