//! Surface-text label tables for the supported card layout. Kept as plain
//! data so new layouts or languages only touch this module, never the line
//! scanner itself.

/// Card title; lines containing it carry no field data.
pub(crate) const CARD_TITLE: &str = "THẺ SINH VIÊN";

/// A line that is only the bare ID label is discarded without effect.
pub(crate) const BARE_ID_LABEL: &str = "MÃ SV";

pub(crate) const FULL_NAME: &[&str] = &["Họ và tên:", "Họ tên:"];
pub(crate) const BIRTH_DATE: &[&str] = &["Sinh ngày:", "Ngày sinh:"];
pub(crate) const ORIGIN: &[&str] = &["Hộ khẩu TT:", "Quê quán:"];
pub(crate) const CLASS: &[&str] = &["Lớp:"];
pub(crate) const CLASS_EXTRA: &[&str] = &["Hệ:"];
pub(crate) const MAJOR: &[&str] = &["Ngành:", "Chuyên ngành:"];
pub(crate) const MAJOR_EXTRA: &[&str] = &["Khóa:"];
pub(crate) const ACADEMIC_TERM: &[&str] = &["Học kỳ:", "HK:", "Kỳ:"];

/// A class continuation line only counts as an enrollment type when it
/// mentions a university program.
pub(crate) const CLASS_CONTINUATION_HINT: &str = "đại học";
