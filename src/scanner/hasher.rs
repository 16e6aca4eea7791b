//! Streaming content hasher for the exact strategy.
//!
//! # Overview
//!
//! [`Hasher`] reads a file in fixed-size blocks and folds them through the
//! configured [`HashAlgorithm`]. The resulting lowercase hex digest is the
//! exact-strategy fingerprint. [`files_identical`] provides the optional
//! byte-for-byte confirmation step.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::{HashAlgorithm, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new(HashAlgorithm::Sha256);
//! let digest = hasher.hash_file(Path::new("photo.jpg")).unwrap();
//! println!("{}", digest);
//! ```

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use super::HashError;

/// Block size used when streaming file content (64 KiB).
pub const BLOCK_SIZE: usize = 64 * 1024;

/// Supported content hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256 (256-bit digest)
    #[default]
    Sha256,
    /// SHA-224 (224-bit digest)
    Sha224,
    /// SHA-384 (384-bit digest)
    Sha384,
    /// SHA-512 (512-bit digest)
    Sha512,
    /// BLAKE3 (256-bit digest), multi-threaded for large inputs
    Blake3,
}

impl HashAlgorithm {
    /// All supported algorithms, in display order.
    pub const ALL: [HashAlgorithm; 5] = [
        Self::Sha256,
        Self::Sha224,
        Self::Sha384,
        Self::Sha512,
        Self::Blake3,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha224 => "sha224",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Blake3 => "blake3",
        }
    }

    /// Length of the hex digest produced by this algorithm.
    #[must_use]
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha224 => 56,
            Self::Sha256 | Self::Blake3 => 64,
            Self::Sha384 => 96,
            Self::Sha512 => 128,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    /// Parse an algorithm name. Case and `-`/`_` separators are ignored,
    /// so `SHA-256`, `sha_256` and `sha256` are equivalent.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        Self::ALL
            .into_iter()
            .find(|alg| alg.name() == normalized)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|a| a.name()).collect();
                format!(
                    "Unknown hash algorithm '{}' (expected one of: {})",
                    s,
                    names.join(", ")
                )
            })
    }
}

/// Incremental digest state for one file.
enum DigestState {
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
    Blake3(Box<blake3::Hasher>),
}

impl DigestState {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha224 => Self::Sha224(Sha224::new()),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Sha384 => Self::Sha384(Sha384::new()),
            HashAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, block: &[u8]) {
        match self {
            Self::Sha224(h) => h.update(block),
            Self::Sha256(h) => h.update(block),
            Self::Sha384(h) => h.update(block),
            Self::Sha512(h) => h.update(block),
            Self::Blake3(h) => {
                h.update(block);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Sha224(h) => format!("{:x}", h.finalize()),
            Self::Sha256(h) => format!("{:x}", h.finalize()),
            Self::Sha384(h) => format!("{:x}", h.finalize()),
            Self::Sha512(h) => format!("{:x}", h.finalize()),
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Streaming file hasher.
#[derive(Debug, Clone)]
pub struct Hasher {
    algorithm: HashAlgorithm,
    block_size: usize,
}

impl Hasher {
    /// Create a hasher for the given algorithm with the default block size.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            block_size: BLOCK_SIZE,
        }
    }

    /// Override the read block size (minimum 1 byte).
    #[must_use]
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// The configured algorithm.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash the full content of a file and return the hex digest.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn hash_file(&self, path: &Path) -> Result<String, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        self.hash_reader(file)
            .map_err(|e| HashError::from_io(path, e))
    }

    /// Hash everything readable from `reader`.
    ///
    /// # Errors
    ///
    /// Propagates read errors.
    pub fn hash_reader<R: Read>(&self, reader: R) -> std::io::Result<String> {
        let mut reader = BufReader::with_capacity(self.block_size, reader);
        let mut state = DigestState::new(self.algorithm);
        let mut buffer = vec![0u8; self.block_size];

        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            state.update(&buffer[..n]);
        }

        Ok(state.finalize_hex())
    }

    /// Hash an in-memory byte slice.
    #[must_use]
    pub fn hash_bytes(&self, bytes: &[u8]) -> String {
        let mut state = DigestState::new(self.algorithm);
        state.update(bytes);
        state.finalize_hex()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new(HashAlgorithm::default())
    }
}

/// Compare two files byte for byte.
///
/// # Errors
///
/// Returns [`HashError`] naming whichever file could not be read.
pub fn files_identical(a: &Path, b: &Path) -> Result<bool, HashError> {
    let file_a = File::open(a).map_err(|e| HashError::from_io(a, e))?;
    let file_b = File::open(b).map_err(|e| HashError::from_io(b, e))?;

    let len_a = file_a.metadata().map_err(|e| HashError::from_io(a, e))?.len();
    let len_b = file_b.metadata().map_err(|e| HashError::from_io(b, e))?.len();
    if len_a != len_b {
        return Ok(false);
    }

    let mut reader_a = BufReader::with_capacity(BLOCK_SIZE, file_a);
    let mut reader_b = BufReader::with_capacity(BLOCK_SIZE, file_b);
    let mut buf_a = vec![0u8; BLOCK_SIZE];
    let mut buf_b = vec![0u8; BLOCK_SIZE];

    loop {
        let n = read_full(&mut reader_a, &mut buf_a).map_err(|e| HashError::from_io(a, e))?;
        let m = read_full(&mut reader_b, &mut buf_b).map_err(|e| HashError::from_io(b, e))?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows; returns bytes read (0 at EOF).
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
