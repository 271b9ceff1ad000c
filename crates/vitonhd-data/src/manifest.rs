//! Pairing manifest for person/garment samples.
//!
//! The manifest is a plain text file `{root}/{split}_pairs.txt` with one
//! `image_name cloth_name` pair per line. It is read once at dataset
//! construction and never mutated afterwards.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{DatasetError, DatasetResult};

/// Dataset split, which also selects the manifest and image directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub const fn from_is_test(is_test: bool) -> Self {
        if is_test {
            Self::Test
        } else {
            Self::Train
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Test => "test",
        }
    }

    /// Manifest path for this split under `root`.
    pub fn manifest_path(self, root: &Path) -> PathBuf {
        root.join(format!("{}_pairs.txt", self.as_str()))
    }
}

/// Whether each person is paired with its own garment or another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    Paired,
    Unpaired,
}

impl Pairing {
    pub const fn from_is_paired(is_paired: bool) -> Self {
        if is_paired {
            Self::Paired
        } else {
            Self::Unpaired
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paired => "paired",
            Self::Unpaired => "unpaired",
        }
    }
}

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PairEntry {
    pub image_name: String,
    pub cloth_name: String,
}

/// Ordered list of person/garment pairs.
#[derive(Debug, Clone)]
pub struct Manifest {
    entries: Vec<PairEntry>,
    pairing: Pairing,
}

impl Manifest {
    /// Reads `{root}/{split}_pairs.txt`.
    ///
    /// The train/unpaired combination is rejected before the file is
    /// touched. With `sorted`, pairs are ordered by `(image, cloth)`;
    /// otherwise file order is kept.
    pub fn load(root: &Path, split: Split, pairing: Pairing, sorted: bool) -> DatasetResult<Self> {
        if split == Split::Train && pairing == Pairing::Unpaired {
            return Err(DatasetError::UnpairedTrainSplit);
        }

        let path = split.manifest_path(root);
        let contents = fs::read_to_string(&path).map_err(|source| {
            DatasetError::ManifestReadFailed {
                path: path.clone(),
                source,
            }
        })?;

        let mut entries = Self::parse(&path, &contents)?;
        if entries.is_empty() {
            tracing::warn!(manifest = %path.display(), "manifest holds no pairs");
        }
        if sorted {
            entries.sort();
        }

        tracing::debug!(
            manifest = %path.display(),
            pairs = entries.len(),
            pairing = pairing.as_str(),
            sorted,
            "manifest loaded"
        );

        Ok(Self { entries, pairing })
    }

    /// Parses manifest text. Every line, blank ones included, must hold
    /// exactly two tokens; a file without lines parses to no pairs.
    pub fn parse(path: &Path, contents: &str) -> DatasetResult<Vec<PairEntry>> {
        let mut entries = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            let mut tokens = line.split_whitespace();
            let (image_name, cloth_name) = match (tokens.next(), tokens.next(), tokens.next()) {
                (Some(image), Some(cloth), None) => (image, cloth),
                _ => {
                    return Err(DatasetError::MalformedManifestLine {
                        path: path.to_path_buf(),
                        line: line_no + 1,
                        content: line.to_string(),
                    })
                }
            };
            entries.push(PairEntry {
                image_name: image_name.to_string(),
                cloth_name: cloth_name.to_string(),
            });
        }
        Ok(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn pairing(&self) -> Pairing {
        self.pairing
    }

    pub fn get(&self, index: usize) -> Option<&PairEntry> {
        self.entries.get(index)
    }

    /// Person filename at `index`.
    pub fn image_name(&self, index: usize) -> Option<&str> {
        self.get(index).map(|entry| entry.image_name.as_str())
    }

    /// Garment filename at `index`: the person's own garment when paired,
    /// the manifest's second column when unpaired.
    pub fn cloth_name(&self, index: usize) -> Option<&str> {
        self.get(index).map(|entry| match self.pairing {
            Pairing::Paired => entry.image_name.as_str(),
            Pairing::Unpaired => entry.cloth_name.as_str(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &PairEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, split: Split, contents: &str) {
        fs::write(split.manifest_path(dir), contents).unwrap();
    }

    #[test]
    fn train_unpaired_is_rejected_before_reading() {
        // The directory does not exist; a read attempt would give a different error.
        let result = Manifest::load(
            Path::new("/nonexistent/vitonhd"),
            Split::Train,
            Pairing::Unpaired,
            false,
        );
        assert!(matches!(result, Err(DatasetError::UnpairedTrainSplit)));
    }

    #[test]
    fn missing_manifest_is_a_read_error() {
        let result = Manifest::load(
            Path::new("/nonexistent/vitonhd"),
            Split::Test,
            Pairing::Unpaired,
            false,
        );
        assert!(matches!(
            result,
            Err(DatasetError::ManifestReadFailed { .. })
        ));
    }

    #[test]
    fn parse_preserves_order_and_trims_whitespace() {
        let entries =
            Manifest::parse(Path::new("m.txt"), "b.jpg y.jpg\n  a.jpg\tx.jpg  \n").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].image_name, "b.jpg");
        assert_eq!(entries[1].image_name, "a.jpg");
        assert_eq!(entries[1].cloth_name, "x.jpg");
    }

    #[test]
    fn blank_line_is_malformed() {
        let err = Manifest::parse(Path::new("m.txt"), "a.jpg b.jpg\n\nc.jpg d.jpg\n").unwrap_err();
        assert!(matches!(
            err,
            DatasetError::MalformedManifestLine { line: 2, .. }
        ));
    }

    #[test]
    fn parse_rejects_wrong_token_count() {
        let err = Manifest::parse(Path::new("m.txt"), "a.jpg b.jpg\nc.jpg\n").unwrap_err();
        match err {
            DatasetError::MalformedManifestLine { line, content, .. } => {
                assert_eq!(line, 2);
                assert_eq!(content, "c.jpg");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(Manifest::parse(Path::new("m.txt"), "a b c\n").is_err());
    }

    #[test]
    fn sorted_and_pairing_aware_lookup() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), Split::Test, "b.jpg x.jpg\na.jpg y.jpg\n");

        let unsorted =
            Manifest::load(dir.path(), Split::Test, Pairing::Unpaired, false).unwrap();
        assert_eq!(unsorted.image_name(0), Some("b.jpg"));
        assert_eq!(unsorted.cloth_name(0), Some("x.jpg"));

        let sorted = Manifest::load(dir.path(), Split::Test, Pairing::Unpaired, true).unwrap();
        assert_eq!(sorted.image_name(0), Some("a.jpg"));
        assert_eq!(sorted.cloth_name(0), Some("y.jpg"));

        let paired = Manifest::load(dir.path(), Split::Test, Pairing::Paired, false).unwrap();
        assert_eq!(paired.cloth_name(1), Some("a.jpg"));
        assert_eq!(paired.len(), 2);
        assert_eq!(paired.cloth_name(2), None);
    }

    #[test]
    fn empty_manifest_gives_no_pairs() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), Split::Train, "");
        let manifest = Manifest::load(dir.path(), Split::Train, Pairing::Paired, false).unwrap();
        assert!(manifest.is_empty());
        assert_eq!(manifest.image_name(0), None);
    }
}
