//! Image preprocessing shared by the detection and recognition paths.
//!
//! Both paths run the same three steps with different parameters: resize,
//! per-channel normalization, and interleaved-to-planar conversion.

use image::RgbImage;
use snapocr_protocol::BoundingBox;

use crate::config::{ChannelOrder, LimitType};
use crate::error::{OcrError, Result};
use crate::inference::InputTensor;
use crate::pool::BufferPool;

/// Detector inputs must be multiples of this stride.
pub const DETECTION_STRIDE: u32 = 32;

/// How the input is resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePolicy {
    /// Scale against a side limit, then round both sides up to the detector stride.
    LimitSide {
        limit_type: LimitType,
        limit_side_len: u32,
    },
    /// Fixed height, width following the aspect ratio.
    FixedHeight { height: u32 },
}

/// Per-channel normalization: `(v / 255 - mean) * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeParams {
    pub mean: [f32; 3],
    pub scale: [f32; 3],
    /// Divide by 255 before subtracting the mean.
    pub is_scale: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessParams {
    pub resize: ResizePolicy,
    pub normalize: NormalizeParams,
}

/// A rectangular region of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ImageRegion {
    /// The whole image.
    pub fn full(image: &RgbImage) -> Self {
        Self {
            x: 0,
            y: 0,
            width: image.width(),
            height: image.height(),
        }
    }

    /// The half-open region covered by `bbox`, which must already lie inside the image.
    pub fn from_box(bbox: &BoundingBox) -> Self {
        Self {
            x: bbox.x_min.max(0) as u32,
            y: bbox.y_min.max(0) as u32,
            width: bbox.width().max(0) as u32,
            height: bbox.height().max(0) as u32,
        }
    }

    fn validate(&self, image: &RgbImage) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(OcrError::InvalidImage(format!(
                "empty region {}x{}",
                self.width, self.height
            )));
        }
        if self.x + self.width > image.width() || self.y + self.height > image.height() {
            return Err(OcrError::InvalidImage(format!(
                "region {:?} exceeds image bounds {}x{}",
                self, image.width(), image.height()
            )));
        }
        Ok(())
    }
}

/// Output of [`Preprocessor::preprocess`].
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Planar (channel-major) normalized data, `3 * height * width` values.
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
    /// Resized width over source width.
    pub ratio_w: f32,
    /// Resized height over source height.
    pub ratio_h: f32,
}

impl Preprocessed {
    /// Wrap as a `[1, 3, height, width]` tensor.
    pub fn into_tensor(self) -> InputTensor {
        InputTensor::new([1, 3, self.height as usize, self.width as usize], self.data)
    }
}

fn round_up_to_stride(value: u32) -> u32 {
    let rounded = value.div_ceil(DETECTION_STRIDE) * DETECTION_STRIDE;
    rounded.max(DETECTION_STRIDE)
}

/// Detection input size for an image of `width x height`.
///
/// The scaled sides are truncated to whole pixels, then each is rounded up
/// to the smallest multiple of 32 that is at least 32.
pub fn limit_side_dims(width: u32, height: u32, limit_type: LimitType, limit: u32) -> (u32, u32) {
    let mut ratio = 1.0f32;
    match limit_type {
        LimitType::Max => {
            let max_wh = width.max(height);
            if max_wh > limit {
                ratio = limit as f32 / max_wh as f32;
            }
        }
        LimitType::Min => {
            let min_wh = width.min(height);
            if min_wh < limit {
                ratio = limit as f32 / min_wh.max(1) as f32;
            }
        }
    }

    let resize_w = (width as f32 * ratio) as u32;
    let resize_h = (height as f32 * ratio) as u32;
    (round_up_to_stride(resize_w), round_up_to_stride(resize_h))
}

/// Recognition input size for a crop of `width x height`.
pub fn fixed_height_dims(width: u32, height: u32, target_height: u32) -> (u32, u32) {
    let aspect = width as f32 / height.max(1) as f32;
    let resize_w = (target_height as f32 * aspect).ceil() as u32;
    (resize_w.max(1), target_height)
}

/// Input size for `policy`.
pub fn resize_dims(policy: ResizePolicy, width: u32, height: u32) -> (u32, u32) {
    match policy {
        ResizePolicy::LimitSide {
            limit_type,
            limit_side_len,
        } => limit_side_dims(width, height, limit_type, limit_side_len),
        ResizePolicy::FixedHeight { height: target } => fixed_height_dims(width, height, target),
    }
}

/// Bilinear resize with half-pixel centers.
///
/// `sample(x, y, c)` reads the source; `dst` is written row-major with
/// `channels` interleaved values per pixel.
pub fn resize_bilinear<F>(
    src_w: usize,
    src_h: usize,
    channels: usize,
    sample: F,
    dst: &mut [f32],
    dst_w: usize,
    dst_h: usize,
) where
    F: Fn(usize, usize, usize) -> f32,
{
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return;
    }

    let taps = |dst_len: usize, src_len: usize| -> Vec<(usize, usize, f32)> {
        let scale = src_len as f32 / dst_len as f32;
        (0..dst_len)
            .map(|d| {
                let pos = ((d as f32 + 0.5) * scale - 0.5).max(0.0);
                let lo = (pos.floor() as usize).min(src_len - 1);
                let hi = (lo + 1).min(src_len - 1);
                let weight = if hi == lo { 0.0 } else { pos - lo as f32 };
                (lo, hi, weight)
            })
            .collect()
    };
    let x_taps = taps(dst_w, src_w);
    let y_taps = taps(dst_h, src_h);

    for (dy, &(y0, y1, wy)) in y_taps.iter().enumerate() {
        let row = &mut dst[dy * dst_w * channels..(dy + 1) * dst_w * channels];
        for (dx, &(x0, x1, wx)) in x_taps.iter().enumerate() {
            for c in 0..channels {
                let top = sample(x0, y0, c) * (1.0 - wx) + sample(x1, y0, c) * wx;
                let bottom = sample(x0, y1, c) * (1.0 - wx) + sample(x1, y1, c) * wx;
                row[dx * channels + c] = top * (1.0 - wy) + bottom * wy;
            }
        }
    }
}

/// Bilinear resize of a single-channel plane.
pub fn resize_plane(
    src: &[f32],
    src_w: usize,
    src_h: usize,
    dst: &mut [f32],
    dst_w: usize,
    dst_h: usize,
) {
    resize_bilinear(src_w, src_h, 1, |x, y, _| src[y * src_w + x], dst, dst_w, dst_h);
}

/// Normalize interleaved 3-channel data in place.
pub fn normalize(data: &mut [f32], params: &NormalizeParams) {
    let e = if params.is_scale { 1.0 / 255.0 } else { 1.0 };
    for pixel in data.chunks_exact_mut(3) {
        for (c, value) in pixel.iter_mut().enumerate() {
            *value = (*value * e - params.mean[c]) * params.scale[c];
        }
    }
}

/// Convert interleaved `(row, col, channel)` data to channel-major planes.
///
/// `planar` must hold `channels * width * height` values.
pub fn permute(interleaved: &[f32], channels: usize, planar: &mut [f32]) {
    let plane = interleaved.len() / channels;
    for (index, pixel) in interleaved.chunks_exact(channels).enumerate() {
        for (c, &value) in pixel.iter().enumerate() {
            planar[c * plane + index] = value;
        }
    }
}

/// Resizes, normalizes and permutes image regions into model inputs.
pub struct Preprocessor {
    pool: BufferPool<f32>,
    channel_order: ChannelOrder,
}

impl Preprocessor {
    pub fn new(pool: BufferPool<f32>, channel_order: ChannelOrder) -> Self {
        Self {
            pool,
            channel_order,
        }
    }

    /// Prepare `region` of `image` as a planar float buffer.
    pub fn preprocess(
        &self,
        image: &RgbImage,
        region: ImageRegion,
        params: &PreprocessParams,
    ) -> Result<Preprocessed> {
        region.validate(image)?;

        let (resize_w, resize_h) = resize_dims(params.resize, region.width, region.height);
        let (rw, rh) = (resize_w as usize, resize_h as usize);

        let raw = image.as_raw();
        let stride = image.width() as usize * 3;
        let (x0, y0) = (region.x as usize, region.y as usize);
        let order = self.channel_order.source_channels();
        let sample = |x: usize, y: usize, c: usize| -> f32 {
            raw[(y0 + y) * stride + (x0 + x) * 3 + order[c]] as f32
        };

        let mut resized = self.pool.rent(rh, rw, 3);
        {
            let dst = resized.as_mut_slice();
            if resize_w == region.width && resize_h == region.height {
                for (index, value) in dst.iter_mut().enumerate() {
                    let (pixel, c) = (index / 3, index % 3);
                    *value = sample(pixel % rw, pixel / rw, c);
                }
            } else {
                resize_bilinear(
                    region.width as usize,
                    region.height as usize,
                    3,
                    sample,
                    dst,
                    rw,
                    rh,
                );
            }
            normalize(dst, &params.normalize);
        }

        let mut data = vec![0.0f32; 3 * rw * rh];
        permute(resized.as_slice(), 3, &mut data);
        resized.release();

        Ok(Preprocessed {
            data,
            width: resize_w,
            height: resize_h,
            ratio_w: resize_w as f32 / region.width as f32,
            ratio_h: resize_h as f32 / region.height as f32,
        })
    }
}
