use cardocr::geometry::{BoundingBox, Corner, Point};
use cardocr::{
    CardOcr, CardOcrError, CornerDetector, Detection, DetectionLabel, MaskSegmenter, Milestone,
    ModelError, TextDetector, TextRecognizer,
};
use image::{DynamicImage, RgbImage};

struct StubCorners(Vec<(Corner, Point)>);

impl CornerDetector for StubCorners {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>, ModelError> {
        Ok(self
            .0
            .iter()
            .map(|(corner, point)| Detection {
                label: DetectionLabel::Corner(*corner),
                polygon: vec![*point],
            })
            .collect())
    }
}

struct StubMask(Vec<Point>);

impl MaskSegmenter for StubMask {
    fn segment(&self, _image: &DynamicImage) -> Result<Vec<Point>, ModelError> {
        Ok(self.0.clone())
    }
}

struct StubWords(Vec<BoundingBox>);

impl TextDetector for StubWords {
    fn detect_text(&self, _image: &DynamicImage) -> Result<Vec<BoundingBox>, ModelError> {
        Ok(self.0.clone())
    }
}

/// Returns a canned line for the envelope whose `y_min` matches.
struct StubRecognizer(Vec<(f32, &'static str)>);

impl TextRecognizer for StubRecognizer {
    fn recognize(
        &self,
        _image: &DynamicImage,
        region: &BoundingBox,
    ) -> Result<(String, f32), ModelError> {
        let text = self
            .0
            .iter()
            .find(|(y, _)| (region.y_min - y).abs() < 1.0)
            .map(|(_, text)| text.to_string())
            .unwrap_or_default();
        Ok((text, 0.9))
    }
}

fn photo(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
}

fn square_corners() -> Vec<(Corner, Point)> {
    vec![
        (Corner::TopLeft, Point::new(10.0, 10.0)),
        (Corner::TopRight, Point::new(490.0, 10.0)),
        (Corner::BottomRight, Point::new(490.0, 490.0)),
        (Corner::BottomLeft, Point::new(10.0, 490.0)),
    ]
}

#[test]
fn full_pipeline_produces_record_and_milestones() {
    let _ = env_logger::builder().is_test(true).try_init();

    // Rectified card is 480x480; the header band covers y < 120.
    let words = vec![
        BoundingBox::new(100.0, 40.0, 300.0, 60.0), // header, dropped
        BoundingBox::new(50.0, 150.0, 170.0, 170.0),
        BoundingBox::new(180.0, 151.0, 330.0, 171.0),
        BoundingBox::new(50.0, 200.0, 200.0, 220.0),
        BoundingBox::new(50.0, 250.0, 300.0, 270.0),
        BoundingBox::new(50.0, 300.0, 160.0, 320.0),
    ];
    let lines = vec![
        (150.0, "Họ và tên: NGUYEN VAN A"),
        (200.0, "Sinh ngày: 01/01/2000"),
        (250.0, "Lớp: D21CQCN08-B Hệ: Chính quy"),
        (300.0, "B21DCCN123"),
    ];
    let ocr = CardOcr::builder()
        .corner_detector(StubCorners(square_corners()))
        .mask_segmenter(StubMask(Vec::new()))
        .text_detector(StubWords(words))
        .recognizer(StubRecognizer(lines))
        .build()
        .expect("all collaborators configured");

    let mut milestones = Vec::new();
    let record = ocr
        .process_with_progress(&photo(500, 500), |m| milestones.push(m))
        .expect("pipeline should succeed");

    assert_eq!(
        milestones,
        vec![
            Milestone::Rectified,
            Milestone::TextRegionsDetected,
            Milestone::TextRecognized,
            Milestone::FieldsExtracted,
        ]
    );
    assert_eq!(record.full_name.as_deref(), Some("NGUYEN VAN A"));
    assert_eq!(record.date_of_birth.as_deref(), Some("01/01/2000"));
    assert_eq!(record.class.value.as_deref(), Some("D21CQCN08-B"));
    assert_eq!(record.class.extra.as_deref(), Some("Chính quy"));
    assert_eq!(record.student_id.as_deref(), Some("B21DCCN123"));
    assert_eq!(record.place_of_origin, None);
}

#[test]
fn three_corners_recover_via_mask_segmentation() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut corners = square_corners();
    corners.remove(3); // bottom-left goes missing
    let mask = vec![
        Point::new(10.0, 10.0),
        Point::new(250.0, 8.0),
        Point::new(490.0, 10.0),
        Point::new(492.0, 250.0),
        Point::new(490.0, 490.0),
        Point::new(250.0, 492.0),
        Point::new(10.0, 490.0),
        Point::new(8.0, 250.0),
    ];
    let ocr = CardOcr::builder()
        .corner_detector(StubCorners(corners))
        .mask_segmenter(StubMask(mask))
        .text_detector(StubWords(Vec::new()))
        .recognizer(StubRecognizer(Vec::new()))
        .build()
        .unwrap();

    // No text boxes: the record degrades to all-null instead of failing.
    let record = ocr.process(&photo(500, 500)).expect("mask recovery");
    assert_eq!(record, cardocr::StudentRecord::default());
}

#[test]
fn fewer_than_three_corners_abort_the_pipeline() {
    let corners = square_corners().into_iter().take(2).collect();
    let ocr = CardOcr::builder()
        .corner_detector(StubCorners(corners))
        .mask_segmenter(StubMask(Vec::new()))
        .text_detector(StubWords(Vec::new()))
        .recognizer(StubRecognizer(Vec::new()))
        .build()
        .unwrap();

    let err = ocr.process(&photo(500, 500)).unwrap_err();
    assert!(matches!(err, CardOcrError::InsufficientCorners { found: 2 }));
}

#[test]
fn missing_collaborator_fails_at_build_time() {
    let result = CardOcr::builder()
        .corner_detector(StubCorners(square_corners()))
        .build();
    assert!(matches!(
        result,
        Err(CardOcrError::MissingCollaborator("mask segmenter"))
    ));
}

#[test]
fn horizontal_run_splits_at_the_configured_gap() {
    let ocr = CardOcr::builder()
        .corner_detector(StubCorners(square_corners()))
        .mask_segmenter(StubMask(Vec::new()))
        .text_detector(StubWords(Vec::new()))
        .recognizer(StubRecognizer(Vec::new()))
        .run_threshold(50.0)
        .build()
        .unwrap();

    let boxes = vec![
        BoundingBox::new(200.0, 10.0, 260.0, 30.0),
        BoundingBox::new(10.0, 10.0, 60.0, 30.0),
        BoundingBox::new(40.0, 12.0, 90.0, 32.0),
    ];
    let (run, rest) = ocr.horizontal_run(boxes);
    assert_eq!(run.len(), 2);
    assert_eq!(run[0].x_min, 10.0);
    assert_eq!(run[1].x_min, 40.0);
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].x_min, 200.0);
}

#[test]
fn record_serializes_for_transport() {
    let ocr = CardOcr::builder()
        .corner_detector(StubCorners(square_corners()))
        .mask_segmenter(StubMask(Vec::new()))
        .text_detector(StubWords(vec![BoundingBox::new(
            50.0, 200.0, 200.0, 220.0,
        )]))
        .recognizer(StubRecognizer(vec![(200.0, "Họ và tên: LE THI C")]))
        .build()
        .unwrap();

    let record = ocr.process(&photo(500, 500)).unwrap();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["full_name"], "LE THI C");
    assert!(json["student_id"].is_null());
    let keys = json.as_object().unwrap();
    assert!(keys.contains_key("academic_term"));
    assert!(json["academic_term"].is_null());
}
