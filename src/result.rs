use serde::Serialize;

use crate::geometry::BoundingBox;

/// A text line envelope paired with the recognizer's output. Confidence is
/// advisory and never gates extraction.
#[derive(Debug, Clone)]
pub struct RecognizedLine {
    pub envelope: BoundingBox,
    pub text: String,
    pub confidence: f32,
}

/// A field that carries a secondary sub-value on the same card row, such as
/// class + enrollment type or major + academic term.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompositeField {
    pub value: Option<String>,
    pub extra: Option<String>,
}

/// Structured record extracted from one card image. Fields that never matched
/// stay `None`; the record is created fresh per image and never mutated after
/// being returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudentRecord {
    pub student_id: Option<String>,
    pub full_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub place_of_origin: Option<String>,
    pub academic_term: Option<String>,
    pub class: CompositeField,
    pub major_and_term: CompositeField,
}
