//! Synchronized data augmentation over groups of channels.
//!
//! A group declares which channels are transformed together. Each transform
//! in the group samples its random parameters once per invocation and
//! applies them to every target, so an image and its masks always stay
//! aligned. Mask-kind targets are resampled with nearest-neighbour
//! interpolation and skipped by color transforms.
//!
//! Groups used for training, in application order:
//! 1. Horizontal flip (50% probability) over all seven channels
//! 2. Scale jitter (±20%, 50%) then shift jitter (±20%, 50%), invoked once
//!    for the person channels and once, with fresh draws, for the garment
//! 3. HSV jitter (±5, 50%) then contrast jitter (±30%, 50%) over the three
//!    color images

use std::collections::BTreeMap;

use burn::config::Config;
use image::{imageops, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use rand::Rng;

use crate::{
    channel::{Channel, ChannelKind},
    error::{DatasetError, DatasetResult},
};

/// Decoded 8-bit channels of one sample, keyed by channel.
pub type ChannelImages = BTreeMap<Channel, RgbImage>;

/// Probabilities and limits of the training augmentation groups.
#[derive(Config, Debug)]
pub struct AugmentationConfig {
    /// Horizontal flip probability.
    #[config(default = 0.5)]
    pub flip_p: f64,
    /// Relative scale jitter, sampled from `1 ± scale_limit`.
    #[config(default = 0.2)]
    pub scale_limit: f64,
    #[config(default = 0.5)]
    pub scale_p: f64,
    /// Shift jitter as a fraction of width/height.
    #[config(default = 0.2)]
    pub shift_limit: f64,
    #[config(default = 0.5)]
    pub shift_p: f64,
    /// Hue shift in 8-bit HSV units (one unit is two degrees).
    #[config(default = 5.0)]
    pub hue_shift_limit: f64,
    #[config(default = 5.0)]
    pub sat_shift_limit: f64,
    #[config(default = 5.0)]
    pub val_shift_limit: f64,
    #[config(default = 0.5)]
    pub hsv_p: f64,
    /// Brightness offset as a fraction of 255.
    #[config(default = 0.0)]
    pub brightness_limit: f64,
    /// Contrast factor sampled from `1 ± contrast_limit`.
    #[config(default = 0.3)]
    pub contrast_limit: f64,
    #[config(default = 0.5)]
    pub brightness_contrast_p: f64,
}

impl AugmentationConfig {
    /// Checks that every probability lies in `[0, 1]`.
    pub fn validate(&self) -> DatasetResult<()> {
        let probabilities = [
            ("flip", self.flip_p),
            ("scale", self.scale_p),
            ("shift", self.shift_p),
            ("hue_saturation_value", self.hsv_p),
            ("brightness_contrast", self.brightness_contrast_p),
        ];
        for (transform, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return Err(DatasetError::InvalidProbability { transform, p });
            }
        }
        Ok(())
    }
}

/// A transform whose parameters are sampled once per group invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupTransform {
    HorizontalFlip {
        p: f64,
    },
    /// Affine scale and translation about the image center with a black
    /// constant border.
    ShiftScale {
        shift_limit: f64,
        scale_limit: f64,
        p: f64,
    },
    HueSaturationValue {
        hue_shift_limit: f64,
        sat_shift_limit: f64,
        val_shift_limit: f64,
        p: f64,
    },
    BrightnessContrast {
        brightness_limit: f64,
        contrast_limit: f64,
        p: f64,
    },
}

/// Parameters sampled for one transform invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformParams {
    HorizontalFlip,
    /// `dx`/`dy` are fractions of width/height.
    ShiftScale { scale: f32, dx: f32, dy: f32 },
    /// Shifts in 8-bit HSV units.
    HueSaturationValue { hue: f32, sat: f32, val: f32 },
    /// `v * alpha + beta * 255`.
    BrightnessContrast { alpha: f32, beta: f32 },
}

impl GroupTransform {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::HorizontalFlip { .. } => "horizontal_flip",
            Self::ShiftScale { .. } => "shift_scale",
            Self::HueSaturationValue { .. } => "hue_saturation_value",
            Self::BrightnessContrast { .. } => "brightness_contrast",
        }
    }

    pub const fn probability(&self) -> f64 {
        match self {
            Self::HorizontalFlip { p }
            | Self::ShiftScale { p, .. }
            | Self::HueSaturationValue { p, .. }
            | Self::BrightnessContrast { p, .. } => *p,
        }
    }

    /// Draws the gate and, if it passes, the transform parameters.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<TransformParams> {
        if !rng.random_bool(self.probability()) {
            return None;
        }

        let params = match *self {
            Self::HorizontalFlip { .. } => TransformParams::HorizontalFlip,
            Self::ShiftScale {
                shift_limit,
                scale_limit,
                ..
            } => TransformParams::ShiftScale {
                scale: 1.0 + symmetric(rng, scale_limit),
                dx: symmetric(rng, shift_limit),
                dy: symmetric(rng, shift_limit),
            },
            Self::HueSaturationValue {
                hue_shift_limit,
                sat_shift_limit,
                val_shift_limit,
                ..
            } => TransformParams::HueSaturationValue {
                hue: symmetric(rng, hue_shift_limit),
                sat: symmetric(rng, sat_shift_limit),
                val: symmetric(rng, val_shift_limit),
            },
            Self::BrightnessContrast {
                brightness_limit,
                contrast_limit,
                ..
            } => TransformParams::BrightnessContrast {
                alpha: 1.0 + symmetric(rng, contrast_limit),
                beta: symmetric(rng, brightness_limit),
            },
        };
        Some(params)
    }
}

fn symmetric<R: Rng + ?Sized>(rng: &mut R, limit: f64) -> f32 {
    let limit = limit.abs();
    rng.random_range(-limit..=limit) as f32
}

impl TransformParams {
    /// Applies these parameters to one channel.
    pub fn apply(&self, image: &mut RgbImage, kind: ChannelKind) {
        match *self {
            Self::HorizontalFlip => imageops::flip_horizontal_in_place(image),
            Self::ShiftScale { scale, dx, dy } => {
                if scale == 1.0 && dx == 0.0 && dy == 0.0 {
                    return;
                }
                let interpolation = match kind {
                    ChannelKind::Image => Interpolation::Bilinear,
                    ChannelKind::Mask => Interpolation::Nearest,
                };
                *image = shift_scale(image, scale, dx, dy, interpolation);
            }
            Self::HueSaturationValue { hue, sat, val } => {
                if kind == ChannelKind::Image {
                    shift_hsv(image, hue, sat, val);
                }
            }
            Self::BrightnessContrast { alpha, beta } => {
                if kind == ChannelKind::Image {
                    brightness_contrast(image, alpha, beta);
                }
            }
        }
    }
}

fn shift_scale(
    image: &RgbImage,
    scale: f32,
    dx: f32,
    dy: f32,
    interpolation: Interpolation,
) -> RgbImage {
    let (width, height) = (image.width() as f32, image.height() as f32);
    let (cx, cy) = (width / 2.0, height / 2.0);
    let projection = Projection::translate(cx + dx * width, cy + dy * height)
        * Projection::scale(scale, scale)
        * Projection::translate(-cx, -cy);
    warp(image, &projection, interpolation, Rgb([0, 0, 0]))
}

fn shift_hsv(image: &mut RgbImage, hue: f32, sat: f32, val: f32) {
    // 8-bit HSV hue units are two degrees; saturation and value span 0..=255.
    let hue_degrees = hue * 2.0;
    let sat = sat / 255.0;
    let val = val / 255.0;

    for pixel in image.pixels_mut() {
        let [r, g, b] = pixel.0.map(|c| f32::from(c) / 255.0);
        let (h, s, v) = rgb_to_hsv(r, g, b);
        let h = (h + hue_degrees).rem_euclid(360.0);
        let s = (s + sat).clamp(0.0, 1.0);
        let v = (v + val).clamp(0.0, 1.0);
        let (r, g, b) = hsv_to_rgb(h, s, v);
        pixel.0 = [r, g, b].map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8);
    }
}

fn brightness_contrast(image: &mut RgbImage, alpha: f32, beta: f32) {
    let lut: [u8; 256] = std::array::from_fn(|v| {
        (v as f32)
            .mul_add(alpha, beta * 255.0)
            .round()
            .clamp(0.0, 255.0) as u8
    });
    for v in image.iter_mut() {
        *v = lut[usize::from(*v)];
    }
}

/// `(hue in degrees, saturation, value)` from RGB in `[0, 1]`.
fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max > 0.0 { delta / max } else { 0.0 };
    (hue, saturation, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let sector = h / 60.0;
    let x = c * (1.0 - (sector.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    (r + m, g + m, b + m)
}

/// A set of channels that always receive the same sampled parameters.
#[derive(Debug, Clone)]
pub struct AugmentationGroup {
    name: &'static str,
    targets: Vec<(Channel, ChannelKind)>,
    transforms: Vec<GroupTransform>,
}

impl AugmentationGroup {
    /// Creates a group; each target is resampled according to its
    /// [`Channel::kind`].
    pub fn new(name: &'static str, targets: &[Channel], transforms: Vec<GroupTransform>) -> Self {
        Self {
            name,
            targets: targets.iter().map(|&c| (c, c.kind())).collect(),
            transforms,
        }
    }

    /// Flip shared by all seven channels.
    pub fn flip(config: &AugmentationConfig) -> Self {
        Self::new(
            "flip",
            &[
                Channel::Image,
                Channel::Agnostic,
                Channel::AgnosticMask,
                Channel::Cloth,
                Channel::ClothMask,
                Channel::ImageDensepose,
                Channel::GtClothWarpedMask,
            ],
            vec![GroupTransform::HorizontalFlip { p: config.flip_p }],
        )
    }

    /// Scale then shift jitter over the person-side channels.
    pub fn shift_scale_person(config: &AugmentationConfig) -> Self {
        Self::new(
            "shift_scale_person",
            &[
                Channel::Image,
                Channel::Agnostic,
                Channel::AgnosticMask,
                Channel::ImageDensepose,
                Channel::GtClothWarpedMask,
            ],
            Self::shift_scale_transforms(config),
        )
    }

    /// The same pipeline over the garment and its mask. Invoked separately
    /// so its draws are independent of the person group.
    pub fn shift_scale_garment(config: &AugmentationConfig) -> Self {
        Self::new(
            "shift_scale_garment",
            &[Channel::Cloth, Channel::ClothMask],
            Self::shift_scale_transforms(config),
        )
    }

    /// HSV and contrast jitter shared by the three color images.
    pub fn color(config: &AugmentationConfig) -> Self {
        Self::new(
            "color",
            &[Channel::Image, Channel::Cloth, Channel::Agnostic],
            vec![
                GroupTransform::HueSaturationValue {
                    hue_shift_limit: config.hue_shift_limit,
                    sat_shift_limit: config.sat_shift_limit,
                    val_shift_limit: config.val_shift_limit,
                    p: config.hsv_p,
                },
                GroupTransform::BrightnessContrast {
                    brightness_limit: config.brightness_limit,
                    contrast_limit: config.contrast_limit,
                    p: config.brightness_contrast_p,
                },
            ],
        )
    }

    fn shift_scale_transforms(config: &AugmentationConfig) -> Vec<GroupTransform> {
        vec![
            GroupTransform::ShiftScale {
                shift_limit: 0.0,
                scale_limit: config.scale_limit,
                p: config.scale_p,
            },
            GroupTransform::ShiftScale {
                shift_limit: config.shift_limit,
                scale_limit: 0.0,
                p: config.shift_p,
            },
        ]
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub fn targets(&self) -> impl Iterator<Item = Channel> + '_ {
        self.targets.iter().map(|&(channel, _)| channel)
    }

    pub fn transforms(&self) -> &[GroupTransform] {
        &self.transforms
    }

    /// Applies every transform of the group to all targets.
    ///
    /// Returns the parameters sampled per transform (`None` when the gate
    /// did not pass). Fails before drawing anything if a target is missing
    /// or the targets differ in size.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        images: &mut ChannelImages,
        rng: &mut R,
    ) -> DatasetResult<Vec<Option<TransformParams>>> {
        self.check_targets(images)?;

        let mut applied = Vec::with_capacity(self.transforms.len());
        for transform in &self.transforms {
            let params = transform.sample(rng);
            if let Some(params) = &params {
                for (channel, kind) in &self.targets {
                    if let Some(image) = images.get_mut(channel) {
                        params.apply(image, *kind);
                    }
                }
            }
            applied.push(params);
        }

        tracing::trace!(group = self.name, ?applied, "augmentation group applied");
        Ok(applied)
    }

    fn check_targets(&self, images: &ChannelImages) -> DatasetResult<()> {
        let mut expected = None;
        for &(channel, _) in &self.targets {
            let image = images.get(&channel).ok_or(DatasetError::MissingChannel {
                group: self.name,
                channel,
            })?;
            let actual = image.dimensions();
            match expected {
                None => expected = Some(actual),
                Some(expected) if expected != actual => {
                    return Err(DatasetError::ChannelSizeMismatch {
                        group: self.name,
                        channel,
                        expected,
                        actual,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Parameters sampled by each group during one [`VitonAugmentor::augment`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AugmentationTrace {
    pub flip: Vec<Option<TransformParams>>,
    pub shift_scale_person: Vec<Option<TransformParams>>,
    pub shift_scale_garment: Vec<Option<TransformParams>>,
    pub color: Vec<Option<TransformParams>>,
}

/// Runs the training augmentation groups in their fixed order.
#[derive(Debug, Clone)]
pub struct VitonAugmentor {
    flip: AugmentationGroup,
    shift_scale_person: AugmentationGroup,
    shift_scale_garment: AugmentationGroup,
    color: AugmentationGroup,
}

impl VitonAugmentor {
    pub fn new(config: &AugmentationConfig) -> DatasetResult<Self> {
        config.validate()?;
        Ok(Self {
            flip: AugmentationGroup::flip(config),
            shift_scale_person: AugmentationGroup::shift_scale_person(config),
            shift_scale_garment: AugmentationGroup::shift_scale_garment(config),
            color: AugmentationGroup::color(config),
        })
    }

    /// Groups in application order.
    pub const fn groups(&self) -> [&AugmentationGroup; 4] {
        [
            &self.flip,
            &self.shift_scale_person,
            &self.shift_scale_garment,
            &self.color,
        ]
    }

    /// Flip, then person and garment shift/scale, then color.
    ///
    /// Later groups see the already geometrically perturbed images.
    pub fn augment<R: Rng + ?Sized>(
        &self,
        images: &mut ChannelImages,
        rng: &mut R,
    ) -> DatasetResult<AugmentationTrace> {
        let trace = AugmentationTrace {
            flip: self.flip.apply(images, rng)?,
            shift_scale_person: self.shift_scale_person.apply(images, rng)?,
            shift_scale_garment: self.shift_scale_garment.apply(images, rng)?,
            color: self.color.apply(images, rng)?,
        };
        tracing::debug!(?trace, "sample augmented");
        Ok(trace)
    }
}
