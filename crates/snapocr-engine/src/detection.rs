//! Differentiable-binarization postprocessing: probability map to text boxes.

use image::Luma;
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point as PixelPoint;
use snapocr_protocol::{BoundingBox, OcrStatus};
use tracing::{debug, trace, warn};

use crate::config::DetectionConfig;
use crate::error::{OcrError, Result};
use crate::geometry::{convex_hull, min_area_rect, unclip, Point};
use crate::inference::OutputTensor;
use crate::pool::{BufferPool, PooledBuffer};
use crate::preprocess::resize_plane;

/// Boxes found in one probability map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detections {
    pub boxes: Vec<BoundingBox>,
    /// Last soft failure seen while decoding, if any.
    pub status: Option<OcrStatus>,
}

/// Turns a detector output of shape `[1, C, H, W]` into axis-aligned boxes in
/// original image coordinates.
pub struct DbPostProcessor {
    db_thresh: f32,
    box_thresh: f32,
    unclip_ratio: f32,
    use_dilation: bool,
    min_side: f32,
    float_pool: BufferPool<f32>,
    mask_pool: BufferPool<u8>,
}

impl DbPostProcessor {
    pub fn new(
        config: &DetectionConfig,
        float_pool: BufferPool<f32>,
        mask_pool: BufferPool<u8>,
    ) -> Self {
        Self {
            db_thresh: config.db_thresh,
            box_thresh: config.box_thresh,
            unclip_ratio: config.unclip_ratio,
            use_dilation: config.use_dilation,
            min_side: config.min_side,
            float_pool,
            mask_pool,
        }
    }

    pub fn process(
        &self,
        output: &OutputTensor,
        original_w: u32,
        original_h: u32,
    ) -> Result<Detections> {
        output.expect_rank(4, "detector")?;
        let (channels, h, w) = (output.shape[1], output.shape[2], output.shape[3]);
        if channels == 0 || h == 0 || w == 0 {
            return Err(OcrError::ModelShape(format!(
                "detector output has empty shape {:?}",
                output.shape
            )));
        }
        if original_w == 0 || original_h == 0 {
            return Err(OcrError::InvalidImage("image has zero size".into()));
        }

        let mut status = None;
        if channels != 1 {
            warn!(
                "Detector produced {} channels, using only the first",
                channels
            );
            status = Some(OcrStatus::ChannelMismatch { actual: channels });
        }

        let (ow, oh) = (original_w as usize, original_h as usize);

        let mut prob = self.float_pool.rent(h, w, 1);
        for (dst, &logit) in prob.as_mut_slice().iter_mut().zip(&output.data[..h * w]) {
            *dst = sigmoid(logit);
        }

        let mut resized = self.float_pool.rent(oh, ow, 1);
        resize_plane(prob.as_slice(), w, h, resized.as_mut_slice(), ow, oh);
        prob.release();

        let threshold = 1.0 - self.db_thresh;
        let mut mask = self.mask_pool.rent(oh, ow, 1);
        for (m, &p) in mask.as_mut_slice().iter_mut().zip(resized.as_slice()) {
            *m = if p > threshold { 255 } else { 0 };
        }
        if self.use_dilation {
            dilate_2x2(mask.as_mut_slice(), ow, oh);
        }

        let contours = mask.with_gray_image(|img| find_contours::<i32>(img));
        mask.release();
        trace!("Found {} contours", contours.len());

        let mut boxes = Vec::new();
        for contour in contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.points.len() > 3)
        {
            let points: Vec<Point> = contour
                .points
                .iter()
                .map(|p| Point::new(p.x as f32, p.y as f32))
                .collect();

            let Some(rect) = min_area_rect(&points) else {
                continue;
            };
            if rect.longer_side() < self.min_side {
                continue;
            }

            let score = self.polygon_score(&points, &resized, ow, oh);
            if score < self.box_thresh {
                debug!(
                    "Dropping region with score {:.3} below {:.3}",
                    score, self.box_thresh
                );
                status = Some(OcrStatus::LowBoxScore {
                    score,
                    threshold: self.box_thresh,
                });
                continue;
            }

            let Some((corners, expanded)) = unclip(&rect, self.unclip_ratio) else {
                continue;
            };
            if expanded.width < 1.001 && expanded.height < 1.001 {
                continue;
            }

            boxes.push(aabb(&corners).clamped(original_w, original_h));
        }
        resized.release();

        if boxes.is_empty() {
            status = Some(OcrStatus::NoTextRegion);
        }
        debug!("Detected {} text regions", boxes.len());
        Ok(Detections { boxes, status })
    }

    /// Mean probability inside the filled convex hull of `points`.
    fn polygon_score(
        &self,
        points: &[Point],
        prob: &PooledBuffer<f32>,
        width: usize,
        height: usize,
    ) -> f32 {
        let hull = convex_hull(points);
        if hull.len() < 3 {
            return 0.0;
        }

        let clamp = |v: f32, max: usize| (v.max(0.0) as usize).min(max - 1);
        let x0 = clamp(hull.iter().map(|p| p.x).fold(f32::MAX, f32::min), width);
        let x1 = clamp(hull.iter().map(|p| p.x).fold(f32::MIN, f32::max), width);
        let y0 = clamp(hull.iter().map(|p| p.y).fold(f32::MAX, f32::min), height);
        let y1 = clamp(hull.iter().map(|p| p.y).fold(f32::MIN, f32::max), height);
        let (rw, rh) = (x1 - x0 + 1, y1 - y0 + 1);

        let polygon: Vec<PixelPoint<i32>> = hull
            .iter()
            .map(|p| PixelPoint::new(p.x as i32 - x0 as i32, p.y as i32 - y0 as i32))
            .collect();

        let mut local = self.mask_pool.rent(rh, rw, 1);
        local.with_gray_image(|img| draw_polygon_mut(img, &polygon, Luma([1u8])));

        let prob = prob.as_slice();
        let (mut sum, mut count) = (0.0f32, 0usize);
        for (ly, row) in local.as_slice().chunks_exact(rw).enumerate() {
            let offset = (y0 + ly) * width + x0;
            for (lx, &inside) in row.iter().enumerate() {
                if inside != 0 {
                    sum += prob[offset + lx];
                    count += 1;
                }
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// In-place 2x2 dilation anchored at the kernel's bottom-right cell.
fn dilate_2x2(mask: &mut [u8], width: usize, height: usize) {
    for y in (0..height).rev() {
        for x in (0..width).rev() {
            let mut v = mask[y * width + x];
            if x > 0 {
                v = v.max(mask[y * width + x - 1]);
            }
            if y > 0 {
                v = v.max(mask[(y - 1) * width + x]);
                if x > 0 {
                    v = v.max(mask[(y - 1) * width + x - 1]);
                }
            }
            mask[y * width + x] = v;
        }
    }
}

fn aabb(corners: &[Point]) -> BoundingBox {
    let (mut x0, mut y0) = (f32::MAX, f32::MAX);
    let (mut x1, mut y1) = (f32::MIN, f32::MIN);
    for p in corners {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    BoundingBox::new(
        x0.round() as i32,
        y0.round() as i32,
        x1.round() as i32,
        y1.round() as i32,
    )
}
