//! VITON-HD style dataset for try-on training.
//!
//! Each sample pairs a person with a garment and is assembled from seven
//! channel images stored under `{root}/{split}/{subdir}/{filename}`.
//! Following Burn's convention the dataset returns raw float buffers and
//! [`VitonHdBatcher`] turns them into tensors on the target device.

use std::{
    collections::BTreeMap,
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use burn::{
    config::Config,
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Tensor, TensorData},
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    augmentation::{AugmentationConfig, ChannelImages, VitonAugmentor},
    channel::Channel,
    error::{DatasetError, DatasetResult},
    manifest::{Manifest, Pairing, Split},
    normalize::{
        image_int_to_float, invert_mask_u8, load_rgb8, resize_rgb8, ChannelBuffer, TargetSize,
    },
};

/// Construction parameters of [`VitonHdDataset`].
#[derive(Config, Debug)]
pub struct DatasetConfig {
    /// Root directory holding `{split}_pairs.txt` and the split directories.
    pub data_root_dir: String,
    /// Output height of every channel.
    #[config(default = 1024)]
    pub img_h: u32,
    /// Output width of every channel.
    #[config(default = 768)]
    pub img_w: u32,
    /// Pair each person with its own garment. Must be true for training.
    #[config(default = true)]
    pub is_paired: bool,
    /// Use the test split, which also disables augmentation.
    #[config(default = false)]
    pub is_test: bool,
    /// Sort pairs by filename instead of keeping manifest order.
    #[config(default = false)]
    pub is_sorted: bool,
    /// Base seed for per-sample augmentation randomness.
    #[config(default = 42)]
    pub seed: u64,
}

/// A fully assembled and normalized sample.
///
/// Color channels are `[H, W, 3]` in `[-1, 1]`; mask channels are
/// `[H, W, 1]` in `{0, 1}`.
#[derive(Debug, Clone)]
pub struct VitonHdItem {
    /// Text caption, always empty for this dataset.
    pub txt: String,
    pub img_fn: String,
    pub cloth_fn: String,
    pub agn: ChannelBuffer,
    /// Inverted: 1 where the person image is kept.
    pub agn_mask: ChannelBuffer,
    pub cloth: ChannelBuffer,
    pub cloth_mask: ChannelBuffer,
    pub image: ChannelBuffer,
    pub image_densepose: ChannelBuffer,
    pub gt_cloth_warped_mask: ChannelBuffer,
}

impl VitonHdItem {
    pub const fn channel(&self, channel: Channel) -> &ChannelBuffer {
        match channel {
            Channel::Agnostic => &self.agn,
            Channel::AgnosticMask => &self.agn_mask,
            Channel::Cloth => &self.cloth,
            Channel::ClothMask => &self.cloth_mask,
            Channel::Image => &self.image,
            Channel::ImageDensepose => &self.image_densepose,
            Channel::GtClothWarpedMask => &self.gt_cloth_warped_mask,
        }
    }

    pub fn iter_channels(&self) -> impl Iterator<Item = (Channel, &ChannelBuffer)> {
        Channel::ALL.into_iter().map(move |c| (c, self.channel(c)))
    }

    /// Buffers in [`Channel::ALL`] order.
    pub fn into_buffers(self) -> [ChannelBuffer; 7] {
        [
            self.agn,
            self.agn_mask,
            self.cloth,
            self.cloth_mask,
            self.image,
            self.image_densepose,
            self.gt_cloth_warped_mask,
        ]
    }

    fn from_buffers(
        img_fn: String,
        cloth_fn: String,
        mut buffers: BTreeMap<Channel, ChannelBuffer>,
    ) -> DatasetResult<Self> {
        let mut take = |channel: Channel| {
            buffers
                .remove(&channel)
                .ok_or(DatasetError::MissingChannel {
                    group: "sample",
                    channel,
                })
        };
        Ok(Self {
            txt: String::new(),
            img_fn,
            cloth_fn,
            agn: take(Channel::Agnostic)?,
            agn_mask: take(Channel::AgnosticMask)?,
            cloth: take(Channel::Cloth)?,
            cloth_mask: take(Channel::ClothMask)?,
            image: take(Channel::Image)?,
            image_densepose: take(Channel::ImageDensepose)?,
            gt_cloth_warped_mask: take(Channel::GtClothWarpedMask)?,
        })
    }
}

/// Paired person/garment dataset.
///
/// The manifest is read once at construction. Retrieval is stateless apart
/// from a draw counter that gives every call its own seeded RNG, so the
/// dataset can be shared across dataloader workers.
pub struct VitonHdDataset {
    root: PathBuf,
    split: Split,
    manifest: Manifest,
    size: TargetSize,
    augmentor: VitonAugmentor,
    seed: u64,
    draws: AtomicU64,
}

impl VitonHdDataset {
    /// Create a dataset with the default augmentation settings.
    ///
    /// # Errors
    ///
    /// Fails if the train split is combined with unpaired garments, the
    /// target size is zero, or the manifest is missing or malformed.
    pub fn new(config: &DatasetConfig) -> DatasetResult<Self> {
        Self::with_augmentation(config, &AugmentationConfig::new())
    }

    /// Create a dataset with custom augmentation settings.
    pub fn with_augmentation(
        config: &DatasetConfig,
        augmentation: &AugmentationConfig,
    ) -> DatasetResult<Self> {
        let split = Split::from_is_test(config.is_test);
        let pairing = Pairing::from_is_paired(config.is_paired);
        let size = TargetSize::new(config.img_h, config.img_w)?;
        let augmentor = VitonAugmentor::new(augmentation)?;

        let root = PathBuf::from(&config.data_root_dir);
        let manifest = Manifest::load(&root, split, pairing, config.is_sorted)?;

        tracing::info!(
            root = %root.display(),
            split = split.as_str(),
            pairing = pairing.as_str(),
            pairs = manifest.len(),
            height = size.height,
            width = size.width,
            "dataset created"
        );

        Ok(Self {
            root,
            split,
            manifest,
            size,
            augmentor,
            seed: config.seed,
            draws: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub const fn split(&self) -> Split {
        self.split
    }

    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub const fn target_size(&self) -> TargetSize {
        self.size
    }

    /// Augmentation runs only on the train split.
    pub fn is_train(&self) -> bool {
        self.split == Split::Train
    }

    /// On-disk path of `channel` for the sample at `index`.
    ///
    /// Every channel, garment included, is keyed by the person filename;
    /// the manifest's garment name is only reported as `cloth_fn`.
    pub fn image_path(&self, channel: Channel, index: usize) -> DatasetResult<PathBuf> {
        let (img_fn, _) = self.file_names(index)?;
        Ok(self.channel_path(channel, img_fn))
    }

    fn channel_path(&self, channel: Channel, name: &str) -> PathBuf {
        self.root
            .join(self.split.as_str())
            .join(channel.subdir())
            .join(channel.file_name(name))
    }

    fn file_names(&self, index: usize) -> DatasetResult<(&str, &str)> {
        let out_of_range = || DatasetError::IndexOutOfRange {
            index,
            len: self.manifest.len(),
        };
        let img_fn = self.manifest.image_name(index).ok_or_else(out_of_range)?;
        let cloth_fn = self.manifest.cloth_name(index).ok_or_else(out_of_range)?;
        Ok((img_fn, cloth_fn))
    }

    /// Decodes every channel of a sample and resizes it to the target size.
    pub fn load_channels(&self, index: usize) -> DatasetResult<ChannelImages> {
        let (img_fn, _) = self.file_names(index)?;
        Channel::ALL
            .into_iter()
            .map(|channel| -> DatasetResult<_> {
                let image = load_rgb8(&self.channel_path(channel, img_fn))?;
                Ok((channel, resize_rgb8(&image, self.size)))
            })
            .collect()
    }

    /// Assembles a sample, drawing augmentation parameters from `rng`.
    ///
    /// # Errors
    ///
    /// Fails on an out-of-range index, a missing or undecodable channel
    /// file, or an augmentation group rejecting the channel shapes.
    pub fn try_get_with_rng<R: Rng + ?Sized>(
        &self,
        index: usize,
        rng: &mut R,
    ) -> DatasetResult<VitonHdItem> {
        let mut images = self.load_channels(index)?;

        if self.is_train() {
            self.augmentor.augment(&mut images, rng)?;
        }

        if let Some(mask) = images.get_mut(&Channel::AgnosticMask) {
            invert_mask_u8(mask);
        }

        let buffers = images
            .into_iter()
            .map(|(channel, image)| (channel, image_int_to_float(&image, channel.is_mask(), false)))
            .collect();

        let (img_fn, cloth_fn) = self.file_names(index)?;
        VitonHdItem::from_buffers(img_fn.to_string(), cloth_fn.to_string(), buffers)
    }

    /// Assembles a sample with a fresh RNG derived from the configured seed.
    pub fn try_get(&self, index: usize) -> DatasetResult<VitonHdItem> {
        let draw = self.draws.fetch_add(1, Ordering::Relaxed);
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(draw));
        self.try_get_with_rng(index, &mut rng)
    }
}

impl Dataset<VitonHdItem> for VitonHdDataset {
    fn get(&self, index: usize) -> Option<VitonHdItem> {
        if index >= self.manifest.len() {
            return None;
        }
        match self.try_get(index) {
            Ok(item) => Some(item),
            Err(err) => {
                tracing::error!(index, error = %err, "failed to load sample");
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.manifest.len()
    }
}

/// Batched tensors, each channel as `[B, C, H, W]`.
#[derive(Debug, Clone)]
pub struct VitonHdBatch<B: Backend> {
    pub agn: Tensor<B, 4>,
    pub agn_mask: Tensor<B, 4>,
    pub cloth: Tensor<B, 4>,
    pub cloth_mask: Tensor<B, 4>,
    pub image: Tensor<B, 4>,
    pub image_densepose: Tensor<B, 4>,
    pub gt_cloth_warped_mask: Tensor<B, 4>,
    pub txt: Vec<String>,
    pub img_fn: Vec<String>,
    pub cloth_fn: Vec<String>,
}

impl<B: Backend> VitonHdBatch<B> {
    pub const fn channel(&self, channel: Channel) -> &Tensor<B, 4> {
        match channel {
            Channel::Agnostic => &self.agn,
            Channel::AgnosticMask => &self.agn_mask,
            Channel::Cloth => &self.cloth,
            Channel::ClothMask => &self.cloth_mask,
            Channel::Image => &self.image,
            Channel::ImageDensepose => &self.image_densepose,
            Channel::GtClothWarpedMask => &self.gt_cloth_warped_mask,
        }
    }
}

/// Batcher converting [`VitonHdItem`]s into a [`VitonHdBatch`].
#[derive(Clone, Default)]
pub struct VitonHdBatcher<B: Backend> {
    _phantom: PhantomData<B>,
}

impl<B: Backend> VitonHdBatcher<B> {
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

fn buffer_to_tensor<B: Backend>(buffer: ChannelBuffer, device: &B::Device) -> Tensor<B, 3> {
    let shape = buffer.shape();
    Tensor::<B, 3>::from_data(TensorData::new(buffer.data, shape), device).permute([2, 0, 1]) // HWC to CHW
}

impl<B: Backend> Batcher<B, VitonHdItem, VitonHdBatch<B>> for VitonHdBatcher<B> {
    fn batch(&self, items: Vec<VitonHdItem>, device: &B::Device) -> VitonHdBatch<B> {
        let batch_size = items.len();

        let mut txt = Vec::with_capacity(batch_size);
        let mut img_fn = Vec::with_capacity(batch_size);
        let mut cloth_fn = Vec::with_capacity(batch_size);
        let mut stacks: [Vec<Tensor<B, 3>>; 7] = Default::default();

        for mut item in items {
            txt.push(std::mem::take(&mut item.txt));
            img_fn.push(std::mem::take(&mut item.img_fn));
            cloth_fn.push(std::mem::take(&mut item.cloth_fn));
            for (stack, buffer) in stacks.iter_mut().zip(item.into_buffers()) {
                stack.push(buffer_to_tensor(buffer, device));
            }
        }

        let [agn, agn_mask, cloth, cloth_mask, image, image_densepose, gt_cloth_warped_mask] =
            stacks.map(|tensors| Tensor::stack::<4>(tensors, 0));

        VitonHdBatch {
            agn,
            agn_mask,
            cloth,
            cloth_mask,
            image,
            image_densepose,
            gt_cloth_warped_mask,
            txt,
            img_fn,
            cloth_fn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::ndarray::NdArray<f32>;

    fn constant_buffer(channel: Channel, height: usize, width: usize, value: f32) -> ChannelBuffer {
        let channels = channel.depth();
        ChannelBuffer {
            data: vec![value; height * width * channels],
            height,
            width,
            channels,
        }
    }

    fn item(name: &str, height: usize, width: usize) -> VitonHdItem {
        let buffers = Channel::ALL
            .into_iter()
            .map(|c| (c, constant_buffer(c, height, width, 0.5)))
            .collect();
        VitonHdItem::from_buffers(name.to_string(), format!("cloth_{name}"), buffers).unwrap()
    }

    #[test]
    fn dataset_config_defaults() {
        let config = DatasetConfig::new("data/vitonhd".to_string());
        assert_eq!(config.img_h, 1024);
        assert_eq!(config.img_w, 768);
        assert!(config.is_paired);
        assert!(!config.is_test);
        assert!(!config.is_sorted);
    }

    #[test]
    fn train_unpaired_fails_before_io() {
        let config = DatasetConfig::new("/nonexistent/vitonhd".to_string()).with_is_paired(false);
        assert!(matches!(
            VitonHdDataset::new(&config),
            Err(DatasetError::UnpairedTrainSplit)
        ));
    }

    #[test]
    fn zero_size_is_rejected() {
        let config = DatasetConfig::new("/nonexistent/vitonhd".to_string()).with_img_w(0);
        assert!(matches!(
            VitonHdDataset::new(&config),
            Err(DatasetError::InvalidTargetSize { .. })
        ));
    }

    #[test]
    fn item_channel_lookup_matches_fields() {
        let item = item("a.jpg", 2, 3);
        assert_eq!(item.txt, "");
        assert_eq!(item.channel(Channel::AgnosticMask).shape(), [2, 3, 1]);
        assert_eq!(item.channel(Channel::ImageDensepose).shape(), [2, 3, 3]);
        let names: Vec<_> = item.iter_channels().map(|(c, _)| c).collect();
        assert_eq!(names, Channel::ALL.to_vec());
    }

    #[test]
    fn batcher_creates_channel_first_tensors() {
        let device = Default::default();
        let batcher = VitonHdBatcher::<TestBackend>::new();

        let batch = batcher.batch(vec![item("a.jpg", 8, 6), item("b.jpg", 8, 6)], &device);

        assert_eq!(batch.image.dims(), [2, 3, 8, 6]);
        assert_eq!(batch.agn.dims(), [2, 3, 8, 6]);
        assert_eq!(batch.image_densepose.dims(), [2, 3, 8, 6]);
        assert_eq!(batch.agn_mask.dims(), [2, 1, 8, 6]);
        assert_eq!(batch.cloth_mask.dims(), [2, 1, 8, 6]);
        assert_eq!(batch.gt_cloth_warped_mask.dims(), [2, 1, 8, 6]);
        assert_eq!(batch.channel(Channel::Cloth).dims(), [2, 3, 8, 6]);
        assert_eq!(batch.img_fn, vec!["a.jpg", "b.jpg"]);
        assert_eq!(batch.cloth_fn, vec!["cloth_a.jpg", "cloth_b.jpg"]);
        assert_eq!(batch.txt, vec!["", ""]);
    }
}
