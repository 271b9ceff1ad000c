//! Per-channel image/mask loading and normalization.
//!
//! Color channels become 3-channel float buffers in `[-1, 1]`; masks become
//! single-channel buffers in `{0, 1}` by thresholding the grayscale value at
//! 128. All functions here are pure: the same bytes and flags always give
//! bit-identical output.

use std::path::Path;

use image::{imageops::FilterType, DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

use crate::error::{DatasetError, DatasetResult};

/// Grayscale threshold separating mask background from foreground.
pub const MASK_THRESHOLD: u8 = 128;

/// Output resolution of every channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    pub height: u32,
    pub width: u32,
}

impl TargetSize {
    pub fn new(height: u32, width: u32) -> DatasetResult<Self> {
        if height == 0 || width == 0 {
            return Err(DatasetError::InvalidTargetSize { height, width });
        }
        Ok(Self { height, width })
    }
}

/// A normalized channel in HWC layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBuffer {
    pub data: Vec<f32>,
    pub height: usize,
    pub width: usize,
    /// 3 for color channels, 1 for masks.
    pub channels: usize,
}

impl ChannelBuffer {
    /// `[height, width, channels]`.
    pub const fn shape(&self) -> [usize; 3] {
        [self.height, self.width, self.channels]
    }

    /// Smallest and largest value, `None` for an empty buffer.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.data.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f32>() / self.data.len() as f32
    }

    /// Maps the buffer back to 8-bit pixels: color from `[-1, 1]`, masks
    /// from `{0, 1}`.
    pub fn to_dynamic_image(&self) -> Option<DynamicImage> {
        let (width, height) = (self.width as u32, self.height as u32);
        match self.channels {
            1 => {
                let raw = self
                    .data
                    .iter()
                    .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
                    .collect();
                ImageBuffer::<Luma<u8>, _>::from_raw(width, height, raw)
                    .map(DynamicImage::ImageLuma8)
            }
            3 => {
                let raw = self
                    .data
                    .iter()
                    .map(|&v| ((v + 1.0) * 127.5).round().clamp(0.0, 255.0) as u8)
                    .collect();
                ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, raw)
                    .map(DynamicImage::ImageRgb8)
            }
            _ => None,
        }
    }
}

/// Decodes an image file into 8-bit RGB.
pub fn load_rgb8(path: &Path) -> DatasetResult<RgbImage> {
    image::open(path)
        .map(DynamicImage::into_rgb8)
        .map_err(|source| DatasetError::ImageOpenFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Reads, resizes and normalizes a channel file.
pub fn imread(
    path: &Path,
    size: TargetSize,
    is_mask: bool,
    invert_mask: bool,
) -> DatasetResult<ChannelBuffer> {
    let img = load_rgb8(path)?;
    Ok(imread_image(
        &DynamicImage::ImageRgb8(img),
        size,
        is_mask,
        invert_mask,
    ))
}

/// Resizes and normalizes an already decoded image.
///
/// Masks are converted to grayscale before resizing, then thresholded.
pub fn imread_image(
    img: &DynamicImage,
    size: TargetSize,
    is_mask: bool,
    invert_mask: bool,
) -> ChannelBuffer {
    if is_mask {
        let gray = luma_bt601(&img.to_rgb8());
        let gray = image::imageops::resize(&gray, size.width, size.height, FilterType::Triangle);
        mask_to_buffer(&gray, invert_mask)
    } else {
        let rgb = resize_rgb8(&img.to_rgb8(), size);
        color_to_buffer(&rgb)
    }
}

/// Normalizes an image without resizing.
pub fn image_int_to_float(img: &RgbImage, is_mask: bool, invert_mask: bool) -> ChannelBuffer {
    if is_mask {
        mask_to_buffer(&luma_bt601(img), invert_mask)
    } else {
        color_to_buffer(img)
    }
}

/// Bilinear resize to the target resolution.
pub fn resize_rgb8(img: &RgbImage, size: TargetSize) -> RgbImage {
    if img.dimensions() == (size.width, size.height) {
        return img.clone();
    }
    image::imageops::resize(img, size.width, size.height, FilterType::Triangle)
}

/// Replaces every sample `v` with `255 - v`.
pub fn invert_mask_u8(img: &mut RgbImage) {
    for v in img.iter_mut() {
        *v = u8::MAX - *v;
    }
}

/// Integer BT.601 luma, matching the usual fixed-point RGB to gray conversion.
fn luma_bt601(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0;
        let luma = (u32::from(r) * 4899 + u32::from(g) * 9617 + u32::from(b) * 1868 + 8192) >> 14;
        Luma([luma.min(255) as u8])
    })
}

fn color_to_buffer(img: &RgbImage) -> ChannelBuffer {
    let data = img
        .as_raw()
        .iter()
        .map(|&v| f32::from(v) / 127.5 - 1.0)
        .collect();
    ChannelBuffer {
        data,
        height: img.height() as usize,
        width: img.width() as usize,
        channels: 3,
    }
}

fn mask_to_buffer(gray: &GrayImage, invert: bool) -> ChannelBuffer {
    let data = gray
        .as_raw()
        .iter()
        .map(|&v| {
            let m = if v >= MASK_THRESHOLD { 1.0 } else { 0.0 };
            if invert {
                1.0 - m
            } else {
                m
            }
        })
        .collect();
    ChannelBuffer {
        data,
        height: gray.height() as usize,
        width: gray.width() as usize,
        channels: 1,
    }
}
