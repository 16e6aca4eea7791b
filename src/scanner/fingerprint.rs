//! Fingerprint strategies.
//!
//! A scan selects exactly one [`Strategy`]; the [`FingerprintEngine`] built
//! from it turns a [`FileRecord`] into a [`Fingerprint`]. Exact
//! fingerprints are content digests, perceptual fingerprints are 64-bit
//! image hashes compared by Hamming distance.

use std::fmt;

use image_hasher::ImageHash;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use super::{FileRecord, HashAlgorithm, HashError, Hasher, PerceptualAlgorithm, PerceptualHasher};

/// Fingerprint strategy tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Cryptographic content digest; equal digests are exact duplicates.
    #[default]
    Exact,
    /// Perceptual image hash; equal or near hashes are similar images.
    Perceptual,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::Perceptual => f.write_str("perceptual"),
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "perceptual" => Ok(Self::Perceptual),
            other => Err(format!(
                "Unknown strategy '{}' (expected exact or perceptual)",
                other
            )),
        }
    }
}

/// Derived value representing file content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// Hex digest of the full file content.
    Exact {
        /// Algorithm that produced the digest
        algorithm: HashAlgorithm,
        /// Lowercase hex digest
        digest: String,
    },
    /// Perceptual hash bit-vector.
    Perceptual(ImageHash),
}

impl Fingerprint {
    /// Strategy that produced this fingerprint.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::Exact { .. } => Strategy::Exact,
            Self::Perceptual(_) => Strategy::Perceptual,
        }
    }

    /// Hamming distance between two perceptual fingerprints.
    ///
    /// Returns `None` if either side is not perceptual.
    #[must_use]
    pub fn distance(&self, other: &Self) -> Option<u32> {
        match (self, other) {
            (Self::Perceptual(a), Self::Perceptual(b)) => Some(a.dist(b)),
            _ => None,
        }
    }

    /// Fixed-format textual value: the digest, or the hash bytes as hex.
    #[must_use]
    pub fn value(&self) -> String {
        match self {
            Self::Exact { digest, .. } => digest.clone(),
            Self::Perceptual(hash) => hash
                .as_bytes()
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect(),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.strategy(), self.value())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Fingerprint", 2)?;
        state.serialize_field("strategy", &self.strategy())?;
        state.serialize_field("value", &self.value())?;
        state.end()
    }
}

/// Computes fingerprints for one scan using a single strategy.
#[derive(Debug)]
pub enum FingerprintEngine {
    /// Exact strategy backed by a streaming content hasher.
    Exact(Hasher),
    /// Perceptual strategy backed by an image hasher.
    Perceptual(PerceptualHasher),
}

impl FingerprintEngine {
    /// Exact engine for the given hash algorithm.
    #[must_use]
    pub fn exact(algorithm: HashAlgorithm) -> Self {
        Self::Exact(Hasher::new(algorithm))
    }

    /// Perceptual engine for the given image hash algorithm.
    #[must_use]
    pub fn perceptual(algorithm: PerceptualAlgorithm) -> Self {
        Self::Perceptual(PerceptualHasher::new(algorithm))
    }

    /// Strategy implemented by this engine.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::Exact(_) => Strategy::Exact,
            Self::Perceptual(_) => Strategy::Perceptual,
        }
    }

    /// Whether a record is eligible for this strategy at all.
    ///
    /// The perceptual strategy only applies to declared image content.
    #[must_use]
    pub fn accepts(&self, record: &FileRecord) -> bool {
        match self {
            Self::Exact(_) => true,
            Self::Perceptual(_) => record.is_image(),
        }
    }

    /// Compute the fingerprint of a record.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be read or decoded.
    pub fn fingerprint(&self, record: &FileRecord) -> Result<Fingerprint, HashError> {
        match self {
            Self::Exact(hasher) => Ok(Fingerprint::Exact {
                algorithm: hasher.algorithm(),
                digest: hasher.hash_file(&record.path)?,
            }),
            Self::Perceptual(hasher) => hasher.compute_hash(&record.path).map(Fingerprint::Perceptual),
        }
    }
}
