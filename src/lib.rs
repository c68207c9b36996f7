//! Structured-field extraction for photographed Vietnamese student ID cards.
//!
//! The pipeline takes a raw photo through perspective rectification, text-line
//! reconstruction and recognition, and deterministic field parsing. The vision
//! models themselves (corner detection, card segmentation, text detection,
//! recognition) are injected collaborators behind narrow traits, so the whole
//! pipeline runs deterministically against stubs in tests.

use std::fmt;

mod error;
pub mod extract;
pub mod geometry;
mod labels;
pub mod layout;
pub mod normalize;
pub mod rectify;
mod result;

pub use error::{CardOcrError, ModelError, Result};
pub use result::{CompositeField, RecognizedLine, StudentRecord};

use image::DynamicImage;
use tracing::instrument;

use geometry::{order_points, BoundingBox, Corner, Point};
use layout::TextLine;

/// Proposes card corner (and icon) regions on the raw photo.
pub trait CornerDetector {
    fn detect(&self, image: &DynamicImage) -> std::result::Result<Vec<Detection>, ModelError>;
}

/// Produces a polygon approximating the card outline; consulted only when
/// exactly three corners were detected.
pub trait MaskSegmenter {
    fn segment(&self, image: &DynamicImage) -> std::result::Result<Vec<Point>, ModelError>;
}

/// Proposes unordered word-level boxes on the rectified card.
pub trait TextDetector {
    fn detect_text(&self, image: &DynamicImage)
        -> std::result::Result<Vec<BoundingBox>, ModelError>;
}

/// Converts one cropped region into a text string with a confidence score.
pub trait TextRecognizer {
    fn recognize(
        &self,
        image: &DynamicImage,
        region: &BoundingBox,
    ) -> std::result::Result<(String, f32), ModelError>;
}

/// One region proposed by the corner detector.
#[derive(Debug, Clone)]
pub struct Detection {
    pub label: DetectionLabel,
    pub polygon: Vec<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionLabel {
    Corner(Corner),
    /// Non-corner card decoration; ignored by the rectifier.
    Icon,
}

/// Progress milestones surfaced to the caller before the final record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    Rectified,
    TextRegionsDetected,
    TextRecognized,
    FieldsExtracted,
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Milestone::Rectified => "card rectified to a canonical rectangle",
            Milestone::TextRegionsDetected => "text regions detected on the card",
            Milestone::TextRecognized => "text content recognized from the regions",
            Milestone::FieldsExtracted => "fields extracted and normalized",
        };
        f.write_str(status)
    }
}

pub struct CardOcrBuilder {
    corner_detector: Option<Box<dyn CornerDetector>>,
    mask_segmenter: Option<Box<dyn MaskSegmenter>>,
    text_detector: Option<Box<dyn TextDetector>>,
    recognizer: Option<Box<dyn TextRecognizer>>,
    header_ratio: f32,
    vertical_threshold: f32,
    horizontal_threshold: f32,
    run_threshold: f32,
}

impl CardOcrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn corner_detector(mut self, detector: impl CornerDetector + 'static) -> Self {
        self.corner_detector = Some(Box::new(detector));
        self
    }

    pub fn mask_segmenter(mut self, segmenter: impl MaskSegmenter + 'static) -> Self {
        self.mask_segmenter = Some(Box::new(segmenter));
        self
    }

    pub fn text_detector(mut self, detector: impl TextDetector + 'static) -> Self {
        self.text_detector = Some(Box::new(detector));
        self
    }

    pub fn recognizer(mut self, recognizer: impl TextRecognizer + 'static) -> Self {
        self.recognizer = Some(Box::new(recognizer));
        self
    }

    /// Fraction of the card height treated as the header band and excluded
    /// from line reconstruction.
    pub fn header_ratio(mut self, ratio: f32) -> Self {
        self.header_ratio = ratio;
        self
    }

    pub fn vertical_threshold(mut self, threshold: f32) -> Self {
        self.vertical_threshold = threshold;
        self
    }

    pub fn horizontal_threshold(mut self, threshold: f32) -> Self {
        self.horizontal_threshold = threshold;
        self
    }

    pub fn run_threshold(mut self, threshold: f32) -> Self {
        self.run_threshold = threshold;
        self
    }

    pub fn build(self) -> Result<CardOcr> {
        Ok(CardOcr {
            corner_detector: self
                .corner_detector
                .ok_or(CardOcrError::MissingCollaborator("corner detector"))?,
            mask_segmenter: self
                .mask_segmenter
                .ok_or(CardOcrError::MissingCollaborator("mask segmenter"))?,
            text_detector: self
                .text_detector
                .ok_or(CardOcrError::MissingCollaborator("text detector"))?,
            recognizer: self
                .recognizer
                .ok_or(CardOcrError::MissingCollaborator("recognizer"))?,
            header_ratio: self.header_ratio,
            vertical_threshold: self.vertical_threshold,
            horizontal_threshold: self.horizontal_threshold,
            run_threshold: self.run_threshold,
        })
    }
}

impl Default for CardOcrBuilder {
    fn default() -> Self {
        Self {
            corner_detector: None,
            mask_segmenter: None,
            text_detector: None,
            recognizer: None,
            header_ratio: 0.25,
            vertical_threshold: 20.0,
            horizontal_threshold: 400.0,
            run_threshold: 100.0,
        }
    }
}

/// The per-image pipeline. All per-image state lives on the stack of one
/// `process` call; a `CardOcr` can serve independent images from independent
/// callers without locking.
pub struct CardOcr {
    corner_detector: Box<dyn CornerDetector>,
    mask_segmenter: Box<dyn MaskSegmenter>,
    text_detector: Box<dyn TextDetector>,
    recognizer: Box<dyn TextRecognizer>,
    header_ratio: f32,
    vertical_threshold: f32,
    horizontal_threshold: f32,
    run_threshold: f32,
}

impl CardOcr {
    pub fn builder() -> CardOcrBuilder {
        CardOcrBuilder::new()
    }

    /// Runs the full pipeline on one photo.
    #[instrument(skip(self, image))]
    pub fn process(&self, image: &DynamicImage) -> Result<StudentRecord> {
        self.process_with_progress(image, |_| {})
    }

    /// Like [`process`](Self::process), reporting each completed stage through
    /// the callback before the final record is returned.
    pub fn process_with_progress(
        &self,
        image: &DynamicImage,
        mut on_progress: impl FnMut(Milestone),
    ) -> Result<StudentRecord> {
        let card = self.rectify_card(image)?;
        on_progress(Milestone::Rectified);

        let lines = self.detect_lines(&card)?;
        on_progress(Milestone::TextRegionsDetected);

        let recognized = self.recognize_lines(&card, &lines)?;
        on_progress(Milestone::TextRecognized);

        let record = extract::extract_fields(recognized.iter().map(|line| line.text.as_str()));
        on_progress(Milestone::FieldsExtracted);
        Ok(record)
    }

    /// Locates the card quadrilateral and warps it to a canonical rectangle.
    /// Fewer than three located corners is a hard failure; exactly three fall
    /// back to mask-based recovery of the fourth.
    #[instrument(level = "debug", skip(self, image))]
    fn rectify_card(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let detections = self
            .corner_detector
            .detect(image)
            .map_err(|e| CardOcrError::model("corner detection", e))?;

        let mut corners: [Option<Point>; 4] = [None; 4];
        for detection in &detections {
            if let DetectionLabel::Corner(corner) = detection.label {
                let slot = &mut corners[corner.index()];
                if slot.is_none() {
                    *slot = geometry::centroid(&detection.polygon);
                }
            }
        }
        let found = corners.iter().flatten().count();
        log::debug!("corner detector located {found} of 4 corners");

        let quad = if let [Some(tl), Some(tr), Some(br), Some(bl)] = corners {
            order_points([tl, tr, br, bl])
        } else if found == 3 {
            let mask = self
                .mask_segmenter
                .segment(image)
                .map_err(|e| CardOcrError::model("mask segmentation", e))?;
            geometry::recover_missing_corner(&corners, &mask)?
        } else {
            return Err(CardOcrError::InsufficientCorners { found });
        };

        rectify::perspective_transform(image, &quad)
    }

    /// Word detection plus reading-order line reconstruction. An empty
    /// detector result degrades to an empty line sequence, not an error.
    fn detect_lines(&self, card: &DynamicImage) -> Result<Vec<TextLine>> {
        let boxes = self
            .text_detector
            .detect_text(card)
            .map_err(|e| CardOcrError::model("text detection", e))?;
        if boxes.is_empty() {
            log::debug!("text detector returned no boxes, record will be empty");
            return Ok(Vec::new());
        }
        let body = layout::filter_header(boxes, card.height() as f32, self.header_ratio);
        Ok(layout::cluster_lines(
            body,
            self.vertical_threshold,
            self.horizontal_threshold,
        ))
    }

    fn recognize_lines(
        &self,
        card: &DynamicImage,
        lines: &[TextLine],
    ) -> Result<Vec<RecognizedLine>> {
        lines
            .iter()
            .map(|line| {
                let (text, confidence) = self
                    .recognizer
                    .recognize(card, &line.envelope)
                    .map_err(|e| CardOcrError::model("text recognition", e))?;
                log::trace!("recognized line at {:?}: {text:?}", line.envelope);
                Ok(RecognizedLine {
                    envelope: line.envelope,
                    text,
                    confidence,
                })
            })
            .collect()
    }

    /// Compact single-row clustering for fields like expiry dates; exposed for
    /// callers that crop such regions themselves.
    pub fn horizontal_run(&self, boxes: Vec<BoundingBox>) -> (Vec<BoundingBox>, Vec<BoundingBox>) {
        layout::cluster_horizontal_run(boxes, self.run_threshold)
    }
}
