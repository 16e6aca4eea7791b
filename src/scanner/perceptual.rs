//! Perceptual image hashing for similarity detection.
//!
//! This module provides the [`PerceptualHasher`] which computes hashes for
//! images that remain stable under re-encoding and resizing, and a
//! BK-tree backed [`SimilarityIndex`] for radius queries by Hamming
//! distance.

use bk_tree::{BKTree, Metric};
use image_hasher::{HashAlg, HasherConfig, ImageHash};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::HashError;

/// Supported perceptual hashing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PerceptualAlgorithm {
    /// aHash (Average Hash) - reduced-resolution mean intensity.
    #[default]
    Ahash,
    /// dHash (Difference Hash) - gradient-based, very fast.
    Dhash,
    /// pHash (Perceptual Hash) - DCT-based, most resilient to transformations.
    Phash,
}

impl PerceptualAlgorithm {
    /// Default similarity threshold (Hamming distance) for this algorithm.
    #[must_use]
    pub fn default_threshold(&self) -> u32 {
        match self {
            Self::Phash => 10,
            Self::Dhash => 2,
            Self::Ahash => 5,
        }
    }
}

impl std::fmt::Display for PerceptualAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Phash => write!(f, "pHash"),
            Self::Dhash => write!(f, "dHash"),
            Self::Ahash => write!(f, "aHash"),
        }
    }
}

impl std::str::FromStr for PerceptualAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ahash" | "average" | "mean" => Ok(Self::Ahash),
            "dhash" | "difference" | "gradient" => Ok(Self::Dhash),
            "phash" | "dct" => Ok(Self::Phash),
            other => Err(format!(
                "Unknown perceptual algorithm '{}' (expected ahash, dhash or phash)",
                other
            )),
        }
    }
}

/// Number of bits in every perceptual hash produced here (8x8 grid).
pub const HASH_BITS: u32 = 64;

/// Computes perceptual hashes for images.
pub struct PerceptualHasher {
    hasher: image_hasher::Hasher,
    algorithm: PerceptualAlgorithm,
}

impl PerceptualHasher {
    /// Create a new `PerceptualHasher` with the given algorithm.
    #[must_use]
    pub fn new(algorithm: PerceptualAlgorithm) -> Self {
        let config = HasherConfig::new().hash_size(8, 8);
        let config = match algorithm {
            PerceptualAlgorithm::Phash => config.hash_alg(HashAlg::Median).preproc_dct(),
            PerceptualAlgorithm::Dhash => config.hash_alg(HashAlg::Gradient),
            PerceptualAlgorithm::Ahash => config.hash_alg(HashAlg::Mean),
        };

        Self {
            hasher: config.to_hasher(),
            algorithm,
        }
    }

    /// Decode the image at `path` and compute its perceptual hash.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Decode`] for content that is not a supported
    /// image, or an I/O flavoured [`HashError`] if the file cannot be read.
    pub fn compute_hash(&self, path: &Path) -> Result<ImageHash, HashError> {
        let img = image::open(path).map_err(|e| match e {
            image::ImageError::IoError(io) => HashError::from_io(path, io),
            other => HashError::Decode {
                path: path.to_path_buf(),
                message: other.to_string(),
            },
        })?;

        Ok(self.hasher.hash_image(&img))
    }

    /// Get the algorithm used by this hasher.
    #[must_use]
    pub fn algorithm(&self) -> PerceptualAlgorithm {
        self.algorithm
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new(PerceptualAlgorithm::default())
    }
}

impl std::fmt::Debug for PerceptualHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerceptualHasher")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Metric for comparing `ImageHash` values using Hamming distance.
#[derive(Default, Clone, Copy, Debug)]
pub struct ImageHashMetric;

impl Metric<ImageHash> for ImageHashMetric {
    fn distance(&self, a: &ImageHash, b: &ImageHash) -> u32 {
        a.dist(b)
    }

    fn threshold_distance(&self, a: &ImageHash, b: &ImageHash, threshold: u32) -> Option<u32> {
        let d = self.distance(a, b);
        if d <= threshold {
            Some(d)
        } else {
            None
        }
    }
}

/// A similarity index for perceptual hashes using a BK-tree.
///
/// Callers should insert each distinct hash once; identical hashes are
/// matched by equality before the index is consulted.
pub struct SimilarityIndex {
    tree: BKTree<ImageHash, ImageHashMetric>,
    count: usize,
}

impl SimilarityIndex {
    /// Create a new empty similarity index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: BKTree::new(ImageHashMetric),
            count: 0,
        }
    }

    /// Add an image hash to the index.
    pub fn insert(&mut self, hash: ImageHash) {
        self.tree.add(hash);
        self.count += 1;
    }

    /// Find all hashes in the index within the given Hamming distance.
    ///
    /// Returns a list of (distance, hash) pairs.
    #[must_use]
    pub fn find(&self, hash: &ImageHash, max_distance: u32) -> Vec<(u32, &ImageHash)> {
        self.tree.find(hash, max_distance).collect()
    }

    /// Returns the number of items in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Default for SimilarityIndex {
    fn default() -> Self {
        Self::new()
    }
}
