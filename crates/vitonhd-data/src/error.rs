//! Error types for the vitonhd-data crate.
//!
//! Construction-time failures (manifest and configuration problems) and
//! retrieval-time failures (image decoding, channel shape problems) share a
//! single enum so callers can propagate them with `?`.

use std::path::PathBuf;

use thiserror::Error;

use crate::channel::Channel;

/// Error type for dataset construction and sample retrieval.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Training requires ground-truth garment alignment, so the unpaired
    /// manifest is only valid for the test split.
    #[error("train split must use paired garments")]
    UnpairedTrainSplit,

    /// Error when the pairing manifest cannot be read.
    #[error("Failed to read manifest: {path}")]
    ManifestReadFailed {
        /// The manifest path that failed to read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A manifest line did not contain exactly two whitespace-separated tokens.
    #[error("Malformed manifest line {line} in {path}: {content:?}")]
    MalformedManifestLine {
        /// The manifest path.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// The offending line.
        content: String,
    },

    /// Error when opening or decoding an image file fails.
    #[error("Failed to open image: {path}")]
    ImageOpenFailed {
        /// The image file path that failed to open.
        path: PathBuf,
        /// The underlying image processing error.
        #[source]
        source: image::ImageError,
    },

    /// Sample index past the end of the manifest.
    #[error("Index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// An augmentation group targets a channel that is not loaded.
    #[error("Augmentation group '{group}' targets missing channel '{channel}'")]
    MissingChannel {
        group: &'static str,
        channel: Channel,
    },

    /// Channels inside one augmentation group must share dimensions.
    #[error(
        "Channel '{channel}' in group '{group}' is {}x{}, expected {}x{}",
        actual.0,
        actual.1,
        expected.0,
        expected.1
    )]
    ChannelSizeMismatch {
        group: &'static str,
        channel: Channel,
        /// Expected (width, height).
        expected: (u32, u32),
        /// Actual (width, height).
        actual: (u32, u32),
    },

    /// Target height and width must be positive.
    #[error("Invalid target size {height}x{width}: dimensions must be positive")]
    InvalidTargetSize { height: u32, width: u32 },

    /// Transform probability outside [0, 1].
    #[error("Probability for '{transform}' must be in [0, 1] (got {p})")]
    InvalidProbability { transform: &'static str, p: f64 },
}

/// A specialized `Result` type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;
