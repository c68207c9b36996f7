use image::{DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use tracing::instrument;

use crate::geometry::{Corner, Quadrilateral};
use crate::{CardOcrError, Result};

/// Destination size for a rectified card: the longer of the two opposing edge
/// pairs, floored, never below one pixel.
pub(crate) fn destination_size(quad: &Quadrilateral) -> (u32, u32) {
    let tl = quad.corner(Corner::TopLeft);
    let tr = quad.corner(Corner::TopRight);
    let br = quad.corner(Corner::BottomRight);
    let bl = quad.corner(Corner::BottomLeft);

    let width = br.distance(&bl).max(tr.distance(&tl));
    let height = tr.distance(&br).max(tl.distance(&bl));
    ((width as u32).max(1), (height as u32).max(1))
}

/// Warps the card quadrilateral onto an axis-aligned rectangle via the unique
/// projective transform between the two. Fails on degenerate corner layouts
/// instead of falling back to the unrectified input.
#[instrument(level = "debug", skip(image))]
pub fn perspective_transform(image: &DynamicImage, quad: &Quadrilateral) -> Result<DynamicImage> {
    let (width, height) = destination_size(quad);

    let from = quad.points().map(|p| (p.x, p.y));
    let w = (width - 1) as f32;
    let h = (height - 1) as f32;
    let to = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];

    let projection =
        Projection::from_control_points(from, to).ok_or(CardOcrError::DegenerateQuad)?;
    log::trace!("warping card quad {quad:?} into {width}x{height}");

    let source = image.to_rgb8();
    let mut warped = RgbImage::new(width, height);
    warp_into(
        &source,
        &projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut warped,
    );
    Ok(DynamicImage::ImageRgb8(warped))
}
