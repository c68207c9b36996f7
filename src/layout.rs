use float_ord::FloatOrd;
use tracing::instrument;

use crate::geometry::BoundingBox;

/// Word boxes sharing a visual row, ordered left-to-right, plus their merged
/// envelope (the crop handed to the recognizer).
#[derive(Debug, Clone)]
pub struct TextLine {
    pub words: Vec<BoundingBox>,
    pub envelope: BoundingBox,
}

/// Drops word boxes whose vertical center falls in the card's header band
/// (institution name and logo), keeping only the field region below it.
pub(crate) fn filter_header(
    boxes: Vec<BoundingBox>,
    image_height: f32,
    header_ratio: f32,
) -> Vec<BoundingBox> {
    let cutoff = image_height * header_ratio;
    boxes
        .into_iter()
        .filter(|b| b.center().y > cutoff)
        .collect()
}

fn envelope_of(boxes: &[BoundingBox]) -> Option<BoundingBox> {
    boxes.iter().copied().reduce(|acc, b| acc.union(&b))
}

fn min_y(boxes: &[BoundingBox]) -> f32 {
    boxes.iter().map(|b| b.y_min).fold(f32::INFINITY, f32::min)
}

/// Single-pass horizontal run split for compact single-row fields.
///
/// Boxes are walked in `(x_min, y_min)` order; the run extends while each next
/// box's `x_min` stays within `threshold` of the previously added one. Returns
/// the first run together with the unconsumed remainder.
pub fn cluster_horizontal_run(
    mut boxes: Vec<BoundingBox>,
    threshold: f32,
) -> (Vec<BoundingBox>, Vec<BoundingBox>) {
    boxes.sort_by_key(|b| (FloatOrd(b.x_min), FloatOrd(b.y_min)));
    let mut run: Vec<BoundingBox> = Vec::new();
    for (i, bx) in boxes.iter().enumerate() {
        if let Some(last) = run.last() {
            if (bx.x_min - last.x_min).abs() > threshold {
                let rest = boxes[i..].to_vec();
                return (run, rest);
            }
        }
        run.push(*bx);
    }
    (run, Vec::new())
}

/// Reconstructs reading-order text lines from unordered word boxes.
///
/// Boxes are scanned in `(y_min, x_min)` order. A box joins the current
/// cluster when its center sits within the vertical and horizontal thresholds
/// of the cluster's running envelope center; otherwise the cluster closes
/// (members sorted left-to-right) and a new one starts. Closed clusters are
/// ordered top-to-bottom by their minimum y.
#[instrument(level = "debug", skip(boxes))]
pub fn cluster_lines(
    mut boxes: Vec<BoundingBox>,
    vertical_threshold: f32,
    horizontal_threshold: f32,
) -> Vec<TextLine> {
    boxes.sort_by_key(|b| (FloatOrd(b.y_min), FloatOrd(b.x_min)));

    let mut clusters: Vec<Vec<BoundingBox>> = Vec::new();
    let mut current: Vec<BoundingBox> = Vec::new();
    for bx in boxes {
        let Some(envelope) = envelope_of(&current) else {
            current.push(bx);
            continue;
        };
        let vertical = (bx.center().y - envelope.center().y).abs();
        let horizontal = (bx.center().x - envelope.center().x).abs();
        if vertical < vertical_threshold && horizontal < horizontal_threshold {
            current.push(bx);
        } else {
            current.sort_by_key(|b| FloatOrd(b.x_min));
            clusters.push(std::mem::replace(&mut current, vec![bx]));
        }
    }
    if !current.is_empty() {
        current.sort_by_key(|b| FloatOrd(b.x_min));
        clusters.push(current);
    }

    clusters.sort_by_key(|c| FloatOrd(min_y(c)));
    log::debug!("clustered word boxes into {} text lines", clusters.len());

    clusters
        .into_iter()
        .filter_map(|words| {
            let envelope = envelope_of(&words)?;
            Some(TextLine { words, envelope })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bx(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> BoundingBox {
        BoundingBox::new(x_min, y_min, x_max, y_max)
    }

    #[test]
    fn nearby_rows_merge_and_distant_rows_split() {
        let boxes = vec![
            bx(0.0, 10.0, 50.0, 25.0),
            bx(60.0, 12.0, 110.0, 27.0),
            bx(0.0, 300.0, 50.0, 315.0),
            bx(60.0, 305.0, 110.0, 320.0),
        ];
        let lines = cluster_lines(boxes, 20.0, 400.0);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].envelope.y_min < lines[1].envelope.y_min);
        assert_eq!(lines[0].words.len(), 2);
        assert_eq!(lines[1].words.len(), 2);
    }

    #[test]
    fn clustering_partitions_the_input_exactly() {
        let boxes = vec![
            bx(5.0, 0.0, 20.0, 10.0),
            bx(30.0, 2.0, 45.0, 12.0),
            bx(700.0, 1.0, 720.0, 11.0), // beyond the horizontal threshold
            bx(5.0, 100.0, 20.0, 110.0),
        ];
        let lines = cluster_lines(boxes.clone(), 20.0, 400.0);
        let total: usize = lines.iter().map(|l| l.words.len()).sum();
        assert_eq!(total, boxes.len());
        for b in &boxes {
            let homes = lines
                .iter()
                .filter(|l| l.words.iter().any(|w| w == b))
                .count();
            assert_eq!(homes, 1, "box {b:?} must belong to exactly one line");
        }
        assert!(lines.iter().all(|l| !l.words.is_empty()));
    }

    #[test]
    fn envelope_contains_every_member() {
        let boxes = vec![
            bx(0.0, 10.0, 40.0, 22.0),
            bx(45.0, 8.0, 90.0, 20.0),
            bx(95.0, 11.0, 140.0, 23.0),
        ];
        let lines = cluster_lines(boxes, 20.0, 400.0);
        assert_eq!(lines.len(), 1);
        for word in &lines[0].words {
            assert!(lines[0].envelope.contains_box(word));
        }
    }

    #[test]
    fn words_within_a_line_are_ordered_left_to_right() {
        let boxes = vec![
            bx(90.0, 10.0, 130.0, 20.0),
            bx(0.0, 12.0, 40.0, 22.0),
            bx(45.0, 9.0, 85.0, 19.0),
        ];
        let lines = cluster_lines(boxes, 20.0, 400.0);
        assert_eq!(lines.len(), 1);
        let xs: Vec<f32> = lines[0].words.iter().map(|w| w.x_min).collect();
        assert_eq!(xs, vec![0.0, 45.0, 90.0]);
    }

    #[test]
    fn horizontal_run_splits_at_first_violation() {
        let boxes = vec![
            bx(500.0, 0.0, 520.0, 10.0),
            bx(10.0, 0.0, 30.0, 10.0),
            bx(60.0, 0.0, 80.0, 10.0),
            bx(610.0, 0.0, 630.0, 10.0),
        ];
        let (run, rest) = cluster_horizontal_run(boxes, 100.0);
        assert_eq!(run.len(), 2);
        assert_eq!(run[0].x_min, 10.0);
        assert_eq!(run[1].x_min, 60.0);
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].x_min, 500.0);
    }

    #[test]
    fn header_band_boxes_are_discarded() {
        let boxes = vec![
            bx(0.0, 10.0, 50.0, 30.0),   // center y = 20, header
            bx(0.0, 240.0, 50.0, 260.0), // center y = 250, header edge exactly
            bx(0.0, 300.0, 50.0, 320.0),
        ];
        let kept = filter_header(boxes, 1000.0, 0.25);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].y_min, 300.0);
    }
}
