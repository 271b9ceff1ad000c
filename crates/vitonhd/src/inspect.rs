//! Dataset inspection: per-channel statistics, value-range validation and a
//! dataloader batch check.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    prelude::*,
    tensor::cast::ToElement,
};
use vitonhd_data::{Channel, ChannelBuffer, VitonHdBatcher, VitonHdDataset};

use crate::config::LoaderConfig;

/// Batches pulled through the dataloader by [`check_batches`].
const MAX_BATCHES: usize = 3;

/// Running min/max/mean over the samples of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub min: f32,
    pub max: f32,
    mean_sum: f32,
    pub count: usize,
    /// Values outside the channel's legal set.
    pub violations: usize,
}

impl Default for ChannelStats {
    fn default() -> Self {
        Self {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            mean_sum: 0.0,
            count: 0,
            violations: 0,
        }
    }
}

impl ChannelStats {
    /// Folds one sample's buffer into the running statistics.
    pub fn add(&mut self, channel: Channel, buffer: &ChannelBuffer) {
        if let Some((lo, hi)) = buffer.value_range() {
            self.min = self.min.min(lo);
            self.max = self.max.max(hi);
        }
        self.mean_sum += buffer.mean();
        self.count += 1;
        self.violations += count_violations(channel, buffer);
    }

    pub fn avg_mean(&self) -> f32 {
        if self.count > 0 {
            self.mean_sum / self.count as f32
        } else {
            0.0
        }
    }
}

/// Masks must be exactly 0 or 1; color channels must lie in `[-1, 1]`.
pub fn count_violations(channel: Channel, buffer: &ChannelBuffer) -> usize {
    if channel.is_mask() {
        buffer
            .data
            .iter()
            .filter(|&&v| v != 0.0 && v != 1.0)
            .count()
    } else {
        buffer
            .data
            .iter()
            .filter(|&&v| !(-1.0..=1.0).contains(&v))
            .count()
    }
}

/// Builds the dataset described by `config`.
///
/// # Errors
///
/// Returns an error if the dataset cannot be constructed.
pub fn create_dataset(config: &LoaderConfig) -> Result<VitonHdDataset> {
    VitonHdDataset::with_augmentation(&config.dataset, &config.augmentation).with_context(|| {
        format!(
            "failed to create dataset at {}",
            config.dataset.data_root_dir
        )
    })
}

/// Loads the first `num_samples` samples, printing each channel's shape and
/// range, and returns statistics aggregated per channel.
///
/// # Errors
///
/// Returns an error on the first sample that fails to load.
pub fn inspect_samples(
    dataset: &VitonHdDataset,
    num_samples: usize,
) -> Result<BTreeMap<Channel, ChannelStats>> {
    let mut stats: BTreeMap<Channel, ChannelStats> = BTreeMap::new();
    let num_samples = num_samples.min(dataset.len());

    for index in 0..num_samples {
        let item = dataset
            .try_get(index)
            .with_context(|| format!("failed to get sample {index}"))?;

        println!("Sample {index}: {} / {}", item.img_fn, item.cloth_fn);
        for (channel, buffer) in item.iter_channels() {
            let (lo, hi) = buffer.value_range().unwrap_or_default();
            println!(
                "  {:<22} shape={:?} min={lo:.4} max={hi:.4} mean={:.4}",
                channel.name(),
                buffer.shape(),
                buffer.mean()
            );
            stats.entry(channel).or_default().add(channel, buffer);
        }
    }

    Ok(stats)
}

/// Prints the aggregated statistics, warning about any out-of-range values.
pub fn report_statistics(stats: &BTreeMap<Channel, ChannelStats>) {
    println!("\n=== Channel Statistics ===");
    for (channel, s) in stats {
        println!(
            "{:<22} samples={} min={:.4} max={:.4} mean={:.4}",
            channel.name(),
            s.count,
            s.min,
            s.max,
            s.avg_mean()
        );
        if s.violations > 0 {
            tracing::warn!(
                channel = channel.name(),
                violations = s.violations,
                "values outside the expected range"
            );
        }
    }
}

/// Runs a few batches through the burn dataloader and checks their layout.
/// Returns the number of batches seen.
pub fn check_batches<B: Backend>(
    dataset: VitonHdDataset,
    batch_size: usize,
    num_workers: usize,
) -> usize {
    let expected = [dataset.target_size().height, dataset.target_size().width];
    let dataloader = DataLoaderBuilder::new(VitonHdBatcher::<B>::new())
        .batch_size(batch_size)
        .num_workers(num_workers)
        .build(dataset);

    let mut batch_count = 0;
    for batch in dataloader.iter() {
        batch_count += 1;
        println!("Batch {batch_count}: {} samples", batch.img_fn.len());

        for channel in Channel::ALL {
            let tensor = batch.channel(channel);
            let [n, c, h, w] = tensor.dims();
            let (min, max) = tensor_range(tensor.clone());
            println!(
                "  {:<22} [{n}, {c}, {h}, {w}] min={min:.4} max={max:.4}",
                channel.name()
            );
            if n != batch.img_fn.len() || c != channel.depth() {
                tracing::error!(channel = channel.name(), n, c, "unexpected batch layout");
            }
            if [h as u32, w as u32] != expected {
                tracing::error!(channel = channel.name(), h, w, "unexpected resolution");
            }
        }

        if batch_count >= MAX_BATCHES {
            break;
        }
    }

    tracing::info!(batches = batch_count, "batch loading check completed");
    batch_count
}

fn tensor_range<B: Backend>(tensor: Tensor<B, 4>) -> (f32, f32) {
    let min = tensor.clone().min().into_scalar().to_f32();
    let max = tensor.max().into_scalar().to_f32();
    (min, max)
}

/// Full `inspect` run: statistics over `num_samples`, then the batch check.
///
/// # Errors
///
/// Returns an error if the dataset cannot be built or a sample fails to
/// load.
pub fn run_inspect<B: Backend>(config: &LoaderConfig, num_samples: usize) -> Result<()> {
    let dataset = create_dataset(config)?;
    println!(
        "Dataset: {} pairs ({} split, {})",
        dataset.len(),
        dataset.split().as_str(),
        dataset.manifest().pairing().as_str()
    );

    let stats = inspect_samples(&dataset, num_samples)?;
    report_statistics(&stats);

    let total: usize = stats.values().map(|s| s.violations).sum();
    if total > 0 {
        anyhow::bail!("{total} values outside the expected channel ranges");
    }

    println!("\n=== Batch Loading ===");
    check_batches::<B>(dataset, config.batch_size, config.num_workers);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(data: Vec<f32>, channels: usize) -> ChannelBuffer {
        let width = data.len() / channels;
        ChannelBuffer {
            data,
            height: 1,
            width,
            channels,
        }
    }

    #[test]
    fn mask_violations_count_non_binary_values() {
        let mask = buffer(vec![0.0, 1.0, 0.5, 1.0], 1);
        assert_eq!(count_violations(Channel::ClothMask, &mask), 1);
    }

    #[test]
    fn color_violations_count_out_of_range_values() {
        let color = buffer(vec![-1.0, 0.0, 1.0, 1.2, -1.5, 0.3], 3);
        assert_eq!(count_violations(Channel::Image, &color), 2);
    }

    #[test]
    fn stats_accumulate_across_samples() {
        let mut stats = ChannelStats::default();
        stats.add(Channel::Image, &buffer(vec![-1.0, 0.0, 1.0], 3));
        stats.add(Channel::Image, &buffer(vec![0.5, 0.5, 0.5], 3));
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, -1.0);
        assert_eq!(stats.max, 1.0);
        assert!((stats.avg_mean() - 0.25).abs() < 1e-6);
        assert_eq!(stats.violations, 0);
    }

    #[test]
    fn empty_stats_have_zero_mean() {
        assert_eq!(ChannelStats::default().avg_mean(), 0.0);
    }
}
