//! End-to-end retrieval against a small on-disk fixture.

use std::{fs, path::Path};

use burn::data::{dataloader::DataLoaderBuilder, dataset::Dataset};
use image::{Rgb, RgbImage};
use rand::{rngs::StdRng, SeedableRng};
use vitonhd_data::{Channel, DatasetConfig, DatasetError, VitonHdBatcher, VitonHdDataset};

type TestBackend = burn::backend::ndarray::NdArray<f32>;

const HEIGHT: u32 = 16;
const WIDTH: u32 = 12;

fn garment_color(name: &str) -> [u8; 3] {
    if name.starts_with("00001") {
        [230, 20, 20]
    } else {
        [20, 20, 230]
    }
}

fn fill(channel: Channel, name: &str) -> [u8; 3] {
    match channel {
        Channel::Cloth => garment_color(name),
        Channel::AgnosticMask | Channel::ClothMask | Channel::GtClothWarpedMask => [255; 3],
        Channel::ImageDensepose => [40, 180, 90],
        Channel::Agnostic | Channel::Image => [128, 128, 128],
    }
}

/// Writes the manifest and every channel file of `pairs` under `root/split`.
/// Placeholders are deliberately larger than the configured output size.
fn write_split(root: &Path, split: &str, pairs: &[(&str, &str)]) -> anyhow::Result<()> {
    let manifest: String = pairs
        .iter()
        .map(|(image, cloth)| format!("{image} {cloth}\n"))
        .collect();
    fs::write(root.join(format!("{split}_pairs.txt")), manifest)?;

    for channel in Channel::ALL {
        let dir = root.join(split).join(channel.subdir());
        fs::create_dir_all(&dir)?;
        for (image, cloth) in pairs {
            for name in [image, cloth] {
                let img = RgbImage::from_pixel(40, 30, Rgb(fill(channel, name)));
                img.save(dir.join(channel.file_name(name)))?;
            }
        }
    }
    Ok(())
}

fn fixture() -> anyhow::Result<tempfile::TempDir> {
    let tmp = tempfile::tempdir()?;
    let pairs = [("00001_00.jpg", "00002_00.jpg"), ("00002_00.jpg", "00001_00.jpg")];
    write_split(tmp.path(), "train", &pairs)?;
    write_split(tmp.path(), "test", &pairs)?;
    Ok(tmp)
}

fn config(root: &Path) -> DatasetConfig {
    DatasetConfig::new(root.to_string_lossy().to_string())
        .with_img_h(HEIGHT)
        .with_img_w(WIDTH)
}

#[test]
fn test_split_returns_configured_resolution() -> anyhow::Result<()> {
    let tmp = fixture()?;
    let dataset = VitonHdDataset::new(&config(tmp.path()).with_is_test(true))?;
    assert_eq!(dataset.len(), 2);

    for index in 0..dataset.len() {
        let item = dataset.try_get(index)?;
        assert_eq!(item.txt, "");
        for (channel, buffer) in item.iter_channels() {
            assert_eq!(
                buffer.shape(),
                [HEIGHT as usize, WIDTH as usize, channel.depth()],
                "channel {channel}"
            );
            if channel.is_mask() {
                assert!(buffer.data.iter().all(|&v| v == 0.0 || v == 1.0));
            } else {
                assert!(buffer.data.iter().all(|&v| (-1.0..=1.0).contains(&v)));
            }
        }
        // White agnostic-mask files are inverted to all zeros.
        assert!(item.agn_mask.data.iter().all(|&v| v == 0.0));
        assert!(item.cloth_mask.data.iter().all(|&v| v == 1.0));
    }
    Ok(())
}

#[test]
fn garment_channels_load_under_person_name() -> anyhow::Result<()> {
    let tmp = fixture()?;

    let paired = VitonHdDataset::new(&config(tmp.path()).with_is_test(true))?;
    let item = paired.try_get(0)?;
    assert_eq!(item.img_fn, "00001_00.jpg");
    assert_eq!(item.cloth_fn, "00001_00.jpg");
    // Red garment: the red channel is well above the blue one.
    assert!(item.cloth.data[0] > item.cloth.data[2]);

    // Unpaired mode reports the manifest's garment name, but every channel
    // file is still read under the person's filename.
    let unpaired =
        VitonHdDataset::new(&config(tmp.path()).with_is_test(true).with_is_paired(false))?;
    let item = unpaired.try_get(0)?;
    assert_eq!(item.img_fn, "00001_00.jpg");
    assert_eq!(item.cloth_fn, "00002_00.jpg");
    assert!(item.cloth.data[0] > item.cloth.data[2]);
    assert_eq!(
        unpaired.image_path(Channel::Cloth, 0)?,
        tmp.path().join("test").join("cloth").join("00001_00.jpg")
    );
    assert_eq!(
        unpaired.image_path(Channel::ClothMask, 1)?,
        tmp.path().join("test").join("cloth-mask").join("00002_00.jpg")
    );
    Ok(())
}

#[test]
fn sorted_manifest_orders_by_name() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_split(
        tmp.path(),
        "test",
        &[("00002_00.jpg", "00002_00.jpg"), ("00001_00.jpg", "00001_00.jpg")],
    )?;

    let unsorted = VitonHdDataset::new(&config(tmp.path()).with_is_test(true))?;
    assert_eq!(unsorted.try_get(0)?.img_fn, "00002_00.jpg");

    let sorted =
        VitonHdDataset::new(&config(tmp.path()).with_is_test(true).with_is_sorted(true))?;
    assert_eq!(sorted.try_get(0)?.img_fn, "00001_00.jpg");
    Ok(())
}

#[test]
fn train_split_augments_within_ranges() -> anyhow::Result<()> {
    let tmp = fixture()?;
    let dataset = VitonHdDataset::new(&config(tmp.path()))?;

    for seed in 0..8 {
        let mut rng = StdRng::seed_from_u64(seed);
        let item = dataset.try_get_with_rng(seed as usize % 2, &mut rng)?;
        for (channel, buffer) in item.iter_channels() {
            assert_eq!(buffer.height, HEIGHT as usize);
            assert_eq!(buffer.width, WIDTH as usize);
            if channel.is_mask() {
                assert!(buffer.data.iter().all(|&v| v == 0.0 || v == 1.0));
            } else {
                assert!(buffer.data.iter().all(|&v| (-1.0..=1.0).contains(&v)));
            }
        }
    }
    Ok(())
}

#[test]
fn same_rng_seed_gives_identical_samples() -> anyhow::Result<()> {
    let tmp = fixture()?;
    let dataset = VitonHdDataset::new(&config(tmp.path()))?;

    let a = dataset.try_get_with_rng(1, &mut StdRng::seed_from_u64(99))?;
    let b = dataset.try_get_with_rng(1, &mut StdRng::seed_from_u64(99))?;
    for ((_, x), (_, y)) in a.iter_channels().zip(b.iter_channels()) {
        assert_eq!(x, y);
    }
    Ok(())
}

#[test]
fn missing_channel_file_fails_the_sample() -> anyhow::Result<()> {
    let tmp = fixture()?;
    let dataset = VitonHdDataset::new(&config(tmp.path()).with_is_test(true))?;
    fs::remove_file(dataset.image_path(Channel::ImageDensepose, 1)?)?;

    assert!(matches!(
        dataset.try_get(1),
        Err(DatasetError::ImageOpenFailed { .. })
    ));
    assert!(dataset.get(1).is_none());
    assert!(dataset.get(0).is_some());
    assert!(dataset.get(2).is_none());
    Ok(())
}

#[test]
fn dataloader_yields_batched_tensors() -> anyhow::Result<()> {
    let tmp = fixture()?;
    let dataset = VitonHdDataset::new(&config(tmp.path()).with_is_test(true))?;

    let loader = DataLoaderBuilder::new(VitonHdBatcher::<TestBackend>::new())
        .batch_size(2)
        .build(dataset);
    let batch = loader.iter().next().expect("one batch");

    assert_eq!(batch.image.dims(), [2, 3, HEIGHT as usize, WIDTH as usize]);
    assert_eq!(batch.agn_mask.dims(), [2, 1, HEIGHT as usize, WIDTH as usize]);
    assert_eq!(batch.img_fn.len(), 2);
    Ok(())
}
