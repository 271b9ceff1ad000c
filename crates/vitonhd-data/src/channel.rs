//! Logical image channels of a try-on sample.
//!
//! Every sample is made of seven channels stored in parallel directories.
//! A channel knows where it lives on disk, how the augmentation groups
//! resample it, and how it is normalized.

use std::fmt;

/// How a channel is resampled by geometric transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Color data: bilinear interpolation, receives color jitter.
    Image,
    /// Label-like data: nearest-neighbour interpolation, never color jittered.
    Mask,
}

/// One of the seven logical channels loaded per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    /// Clothing-agnostic person image.
    Agnostic,
    /// Region of the person image that was made agnostic.
    AgnosticMask,
    /// In-shop garment image.
    Cloth,
    /// Garment foreground mask.
    ClothMask,
    /// Person image.
    Image,
    /// Densepose rendering of the person.
    ImageDensepose,
    /// Garment mask warped onto the person.
    GtClothWarpedMask,
}

impl Channel {
    /// All channels in load order.
    pub const ALL: [Self; 7] = [
        Self::Agnostic,
        Self::AgnosticMask,
        Self::Cloth,
        Self::ClothMask,
        Self::Image,
        Self::ImageDensepose,
        Self::GtClothWarpedMask,
    ];

    /// Key used in the assembled sample.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Agnostic => "agn",
            Self::AgnosticMask => "agn_mask",
            Self::Cloth => "cloth",
            Self::ClothMask => "cloth_mask",
            Self::Image => "image",
            Self::ImageDensepose => "image_densepose",
            Self::GtClothWarpedMask => "gt_cloth_warped_mask",
        }
    }

    /// Directory under `{root}/{split}` holding this channel.
    pub const fn subdir(self) -> &'static str {
        match self {
            Self::Agnostic => "agnostic-v3.2",
            Self::AgnosticMask => "agnostic-mask",
            Self::Cloth => "cloth",
            Self::ClothMask => "cloth-mask",
            Self::Image => "image",
            Self::ImageDensepose => "image-densepose",
            Self::GtClothWarpedMask => "gt_cloth_warped_mask",
        }
    }

    /// Maps the manifest filename to the on-disk filename.
    pub fn file_name(self, name: &str) -> String {
        match self {
            Self::AgnosticMask => name.replace(".jpg", "_mask.jpg"),
            _ => name.to_string(),
        }
    }

    /// Interpolation class used by geometric transforms.
    pub const fn kind(self) -> ChannelKind {
        match self {
            Self::Agnostic | Self::Cloth | Self::Image => ChannelKind::Image,
            Self::AgnosticMask
            | Self::ClothMask
            | Self::ImageDensepose
            | Self::GtClothWarpedMask => ChannelKind::Mask,
        }
    }

    /// Whether normalization treats this channel as a binary mask.
    ///
    /// Follows the naming convention: any channel whose key contains
    /// `mask`. The densepose map is resampled like a mask but normalized
    /// as a color image.
    pub fn is_mask(self) -> bool {
        self.name().contains("mask")
    }

    /// Number of channels after normalization.
    pub fn depth(self) -> usize {
        if self.is_mask() {
            1
        } else {
            3
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
