//! Loader configuration shared by the CLI subcommands.
//!
//! A [`LoaderConfig`] is read from a JSON file through burn's [`Config`]
//! support; command-line flags then override individual fields.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::config::Config;
use clap::Args;
use vitonhd_data::{AugmentationConfig, DatasetConfig};

/// Dataset, augmentation and dataloader settings.
#[derive(Config, Debug)]
pub struct LoaderConfig {
    pub dataset: DatasetConfig,

    #[config(default = "AugmentationConfig::new()")]
    pub augmentation: AugmentationConfig,

    #[config(default = 4)]
    pub batch_size: usize,

    #[config(default = 2)]
    pub num_workers: usize,
}

impl LoaderConfig {
    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::load(path).with_context(|| format!("failed to load config {}", path.display()))
    }

    /// Writes this configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        self.save(path)
            .with_context(|| format!("failed to write config {}", path.display()))
    }
}

/// Flags selecting and overriding the loader configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct LoaderArgs {
    /// Dataset root holding `{split}_pairs.txt` and the split directories
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// JSON loader configuration; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output height of every channel
    #[arg(long)]
    pub height: Option<u32>,

    /// Output width of every channel
    #[arg(long)]
    pub width: Option<u32>,

    /// Use the test split (no augmentation)
    #[arg(long)]
    pub test: bool,

    /// Pair each person with the manifest's second garment (test split only)
    #[arg(long)]
    pub unpaired: bool,

    /// Order pairs by filename instead of manifest order
    #[arg(long)]
    pub sorted: bool,

    /// Base seed for augmentation randomness
    #[arg(long)]
    pub seed: Option<u64>,

    /// Batch size for the dataloader check
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Number of dataloader workers
    #[arg(long)]
    pub num_workers: Option<usize>,
}

impl LoaderArgs {
    /// Builds the effective configuration: the config file if given,
    /// otherwise defaults, with every flag that was set applied on top.
    ///
    /// # Errors
    ///
    /// Fails if the config file is unreadable or no dataset root is known.
    pub fn resolve(&self) -> Result<LoaderConfig> {
        let mut config = match (&self.config, &self.root) {
            (Some(path), _) => LoaderConfig::from_file(path)?,
            (None, Some(root)) => {
                LoaderConfig::new(DatasetConfig::new(root.to_string_lossy().to_string()))
            }
            (None, None) => anyhow::bail!("either --root or --config must be given"),
        };

        let dataset = &mut config.dataset;
        if let Some(root) = &self.root {
            dataset.data_root_dir = root.to_string_lossy().to_string();
        }
        if let Some(height) = self.height {
            dataset.img_h = height;
        }
        if let Some(width) = self.width {
            dataset.img_w = width;
        }
        if let Some(seed) = self.seed {
            dataset.seed = seed;
        }
        if self.test {
            dataset.is_test = true;
        }
        if self.unpaired {
            dataset.is_paired = false;
        }
        if self.sorted {
            dataset.is_sorted = true;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(num_workers) = self.num_workers {
            config.num_workers = num_workers;
        }

        if config.batch_size == 0 {
            anyhow::bail!("batch size must be positive");
        }
        Ok(config)
    }
}
