//! Writes assembled samples back to PNG so channel alignment after
//! augmentation can be checked by eye.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use burn::data::dataset::Dataset;
use vitonhd_data::{VitonHdDataset, VitonHdItem};

use crate::{config::LoaderConfig, inspect::create_dataset};

/// Directory name of one exported sample: index plus the person stem.
fn sample_dir_name(index: usize, item: &VitonHdItem) -> String {
    let stem = Path::new(&item.img_fn)
        .file_stem()
        .map_or_else(|| item.img_fn.clone(), |s| s.to_string_lossy().to_string());
    format!("{index:04}_{stem}")
}

/// Writes every channel of `item` as `{dir}/{channel}.png`.
///
/// # Errors
///
/// Returns an error if the directory or any image cannot be written.
pub fn export_item(item: &VitonHdItem, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(7);
    for (channel, buffer) in item.iter_channels() {
        let path = dir.join(format!("{}.png", channel.name()));
        let image = buffer
            .to_dynamic_image()
            .with_context(|| format!("channel {channel} has an unsupported layout"))?;
        image
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Exports the first `num_samples` samples of `dataset` under `output`.
///
/// # Errors
///
/// Returns an error if a sample fails to load or cannot be written.
pub fn export_samples(
    dataset: &VitonHdDataset,
    output: &Path,
    num_samples: usize,
) -> Result<Vec<PathBuf>> {
    let num_samples = num_samples.min(dataset.len());
    let mut written = Vec::new();

    for index in 0..num_samples {
        let item = dataset
            .try_get(index)
            .with_context(|| format!("failed to get sample {index}"))?;
        let dir = output.join(sample_dir_name(index, &item));
        written.extend(export_item(&item, &dir)?);
        tracing::debug!(index, dir = %dir.display(), "sample exported");
    }

    tracing::info!(
        samples = num_samples,
        files = written.len(),
        output = %output.display(),
        "export completed"
    );
    Ok(written)
}

/// Full `export` run.
///
/// # Errors
///
/// Returns an error if the dataset cannot be built or a sample cannot be
/// exported.
pub fn run_export(config: &LoaderConfig, output: &Path, num_samples: usize) -> Result<()> {
    let dataset = create_dataset(config)?;
    let written = export_samples(&dataset, output, num_samples)?;
    println!("Wrote {} files to {}", written.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use vitonhd_data::{Channel, ChannelBuffer};

    use super::*;

    fn item() -> VitonHdItem {
        let mut buffers: BTreeMap<Channel, ChannelBuffer> = Channel::ALL
            .into_iter()
            .map(|channel| {
                let channels = channel.depth();
                let buffer = ChannelBuffer {
                    data: vec![if channel.is_mask() { 1.0 } else { -1.0 }; 6 * channels],
                    height: 2,
                    width: 3,
                    channels,
                };
                (channel, buffer)
            })
            .collect();
        let take = |buffers: &mut BTreeMap<Channel, ChannelBuffer>, channel: Channel| {
            buffers.remove(&channel).unwrap()
        };
        VitonHdItem {
            txt: String::new(),
            img_fn: "00001_00.jpg".to_string(),
            cloth_fn: "00001_00.jpg".to_string(),
            agn: take(&mut buffers, Channel::Agnostic),
            agn_mask: take(&mut buffers, Channel::AgnosticMask),
            cloth: take(&mut buffers, Channel::Cloth),
            cloth_mask: take(&mut buffers, Channel::ClothMask),
            image: take(&mut buffers, Channel::Image),
            image_densepose: take(&mut buffers, Channel::ImageDensepose),
            gt_cloth_warped_mask: take(&mut buffers, Channel::GtClothWarpedMask),
        }
    }

    #[test]
    fn sample_dirs_use_index_and_stem() {
        assert_eq!(sample_dir_name(3, &item()), "0003_00001_00");
    }

    #[test]
    fn every_channel_is_written_as_png() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let written = export_item(&item(), tmp.path())?;
        assert_eq!(written.len(), 7);

        let mask = image::open(tmp.path().join("cloth_mask.png"))?;
        assert_eq!((mask.width(), mask.height()), (3, 2));
        assert!(mask.to_luma8().iter().all(|&v| v == 255));

        let color = image::open(tmp.path().join("image.png"))?.to_rgb8();
        assert!(color.iter().all(|&v| v == 0));
        Ok(())
    }
}
