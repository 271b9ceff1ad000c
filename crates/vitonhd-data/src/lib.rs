//! Paired person/garment dataset loading for virtual try-on training.
//!
//! Samples are assembled from seven channel images, resized to a common
//! resolution, augmented in synchronized groups on the train split and
//! normalized into model-ready float buffers.

pub mod augmentation;
pub mod channel;
pub mod dataset;
pub mod error;
pub mod manifest;
pub mod normalize;

// Re-export commonly used types
pub use augmentation::{
    AugmentationConfig, AugmentationGroup, AugmentationTrace, ChannelImages, GroupTransform,
    TransformParams, VitonAugmentor,
};
pub use channel::{Channel, ChannelKind};
pub use dataset::{DatasetConfig, VitonHdBatch, VitonHdBatcher, VitonHdDataset, VitonHdItem};
pub use error::{DatasetError, DatasetResult};
pub use manifest::{Manifest, PairEntry, Pairing, Split};
pub use normalize::{image_int_to_float, imread, imread_image, ChannelBuffer, TargetSize};
