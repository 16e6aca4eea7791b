//! Metadata pre-filter and duplicate group types.
//!
//! # Overview
//!
//! The pre-filter is the first phase of duplicate detection. It drops
//! records outside the configured size range or media-type filter and
//! buckets the rest by size (and optionally modification time). Files of
//! different sizes cannot be byte-identical, so only buckets with two or
//! more members are forwarded to fingerprinting.
//!
//! Every record is stamped with its discovery ordinal. Buckets keep
//! members in discovery order, and that order later decides which member
//! of a duplicate group is canonical.
//!
//! # Example
//!
//! ```
//! use dupescan::scanner::FileRecord;
//! use dupescan::duplicates::{bucket_candidates, PrefilterConfig};
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let files = vec![
//!     FileRecord::new(PathBuf::from("/file1.txt"), 1024, SystemTime::UNIX_EPOCH),
//!     FileRecord::new(PathBuf::from("/file2.txt"), 1024, SystemTime::UNIX_EPOCH),
//!     FileRecord::new(PathBuf::from("/file3.txt"), 2048, SystemTime::UNIX_EPOCH),
//! ];
//!
//! let (buckets, stats) = bucket_candidates(files, &PrefilterConfig::default());
//!
//! assert_eq!(stats.total_files, 3);
//! assert_eq!(stats.forwarded, 2);
//! assert_eq!(buckets.len(), 1);
//! ```

use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::scanner::{FileRecord, Fingerprint, Strategy};

/// A file record stamped with its discovery position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Zero-based position in enumeration order
    pub ordinal: usize,
    /// The discovered file
    pub record: FileRecord,
}

/// Cheap-attribute key for a pre-filter bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketKey {
    /// Shared file size in bytes, when bucketing by size
    pub size: Option<u64>,
    /// Shared modification time, when bucketing by mtime
    pub modified_at: Option<SystemTime>,
}

/// Records sharing a [`BucketKey`], in discovery order.
#[derive(Debug, Clone)]
pub struct MetadataBucket {
    /// Bucket key
    pub key: BucketKey,
    /// Members in discovery order
    pub members: Vec<Candidate>,
}

impl MetadataBucket {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the bucket has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// A bucket with fewer than two members cannot hold a duplicate.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.members.len() > 1
    }
}

/// Inclusion/exclusion filter on declared media type.
///
/// Patterns are `type/subtype` (`image/png`), `type/*` (`image/*`) or a
/// bare top-level type (`image`), matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaTypeFilter {
    /// If non-empty, a record must match one of these
    pub include: Vec<String>,
    /// A record matching any of these is dropped
    pub exclude: Vec<String>,
}

impl MediaTypeFilter {
    /// Create a filter from include and exclude patterns.
    #[must_use]
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    fn pattern_matches(pattern: &str, media_type: &str) -> bool {
        let pattern = pattern.trim().to_ascii_lowercase();
        let media_type = media_type.to_ascii_lowercase();
        if let Some(top) = pattern.strip_suffix("/*") {
            media_type.split('/').next() == Some(top)
        } else if !pattern.contains('/') {
            media_type.split('/').next() == Some(pattern.as_str())
        } else {
            media_type == pattern
        }
    }

    /// Whether a record with this declared media type passes the filter.
    ///
    /// Records without a declared type fail a non-empty include list and
    /// never match an exclude pattern.
    #[must_use]
    pub fn allows(&self, media_type: Option<&str>) -> bool {
        match media_type {
            Some(mt) => {
                let included = self.include.is_empty()
                    || self.include.iter().any(|p| Self::pattern_matches(p, mt));
                included && !self.exclude.iter().any(|p| Self::pattern_matches(p, mt))
            }
            None => self.include.is_empty(),
        }
    }
}

/// Pre-filter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefilterConfig {
    /// Smallest size kept, inclusive
    pub min_size: u64,
    /// Largest size kept, inclusive; `None` for unbounded
    pub max_size: Option<u64>,
    /// Media-type filter
    pub media_types: MediaTypeFilter,
    /// Include size in the bucket key
    pub bucket_by_size: bool,
    /// Include modification time in the bucket key
    pub bucket_by_mtime: bool,
}

impl Default for PrefilterConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: None,
            media_types: MediaTypeFilter::default(),
            bucket_by_size: true,
            bucket_by_mtime: false,
        }
    }
}

impl PrefilterConfig {
    /// Whether `size` lies in the configured range.
    #[must_use]
    pub fn size_in_range(&self, size: u64) -> bool {
        size >= self.min_size && self.max_size.is_none_or(|max| size <= max)
    }

    fn key_for(&self, record: &FileRecord) -> BucketKey {
        BucketKey {
            size: self.bucket_by_size.then_some(record.size_bytes),
            modified_at: self.bucket_by_mtime.then_some(record.modified_at),
        }
    }
}

/// Statistics from the pre-filter phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefilterStats {
    /// Records offered to the pre-filter
    pub total_files: usize,
    /// Total size of all offered records in bytes
    pub total_size: u64,
    /// Records dropped for lying outside the size range
    pub dropped_by_size: usize,
    /// Records dropped by the media-type filter
    pub dropped_by_type: usize,
    /// Records eliminated because their bucket had a single member
    pub eliminated_unique: usize,
    /// Records forwarded to fingerprinting
    pub forwarded: usize,
    /// Buckets forwarded to fingerprinting
    pub buckets: usize,
}

impl PrefilterStats {
    /// Percentage of offered files that never reach fingerprinting.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            ((self.total_files - self.forwarded) as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Incremental pre-filter fed one record at a time in discovery order.
#[derive(Debug)]
pub struct Prefilter {
    config: PrefilterConfig,
    index: HashMap<BucketKey, usize>,
    buckets: Vec<MetadataBucket>,
    stats: PrefilterStats,
    next_ordinal: usize,
}

impl Prefilter {
    /// Create an empty pre-filter.
    #[must_use]
    pub fn new(config: PrefilterConfig) -> Self {
        Self {
            config,
            index: HashMap::new(),
            buckets: Vec::new(),
            stats: PrefilterStats::default(),
            next_ordinal: 0,
        }
    }

    /// Offer the next discovered record.
    ///
    /// Returns `true` if the record was placed in a bucket.
    pub fn push(&mut self, record: FileRecord) -> bool {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        self.stats.total_files += 1;
        self.stats.total_size += record.size_bytes;

        if !self.config.size_in_range(record.size_bytes) {
            self.stats.dropped_by_size += 1;
            log::trace!(
                "Dropped by size filter ({}): {}",
                record.size_bytes,
                record.path.display()
            );
            return false;
        }

        if !self
            .config
            .media_types
            .allows(record.declared_media_type.as_deref())
        {
            self.stats.dropped_by_type += 1;
            log::trace!("Dropped by media-type filter: {}", record.path.display());
            return false;
        }

        let key = self.config.key_for(&record);
        let slot = *self.index.entry(key).or_insert_with(|| {
            self.buckets.push(MetadataBucket {
                key,
                members: Vec::new(),
            });
            self.buckets.len() - 1
        });
        self.buckets[slot].members.push(Candidate { ordinal, record });
        true
    }

    /// Finish bucketing and return only buckets with two or more members,
    /// ordered by their first member's discovery ordinal.
    #[must_use]
    pub fn finish(self) -> (Vec<MetadataBucket>, PrefilterStats) {
        let mut stats = self.stats;
        let forwarded: Vec<MetadataBucket> = self
            .buckets
            .into_iter()
            .filter(|bucket| {
                if bucket.has_duplicates() {
                    stats.forwarded += bucket.len();
                    stats.buckets += 1;
                    log::debug!(
                        "Bucket {:?}: {} potential duplicates",
                        bucket.key,
                        bucket.len()
                    );
                    true
                } else {
                    stats.eliminated_unique += bucket.len();
                    false
                }
            })
            .collect();

        log::info!(
            "Pre-filter complete: {} files → {} candidates in {} buckets ({:.1}% eliminated)",
            stats.total_files,
            stats.forwarded,
            stats.buckets,
            stats.elimination_rate()
        );

        (forwarded, stats)
    }
}

/// Bucket a sequence of records in one call.
#[must_use]
pub fn bucket_candidates(
    records: impl IntoIterator<Item = FileRecord>,
    config: &PrefilterConfig,
) -> (Vec<MetadataBucket>, PrefilterStats) {
    let mut prefilter = Prefilter::new(config.clone());
    for record in records {
        prefilter.push(record);
    }
    prefilter.finish()
}

/// Confirmed group of duplicate (or near-duplicate) files.
///
/// Members are ordered by discovery; the first member is canonical and is
/// never touched by actions. Every group has at least two members.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    /// Fingerprint shared by the group (for perceptual groups, the
    /// canonical member's fingerprint)
    pub fingerprint: Fingerprint,
    /// Members in discovery order
    pub members: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Create a group from members already in discovery order.
    #[must_use]
    pub fn new(fingerprint: Fingerprint, members: Vec<FileRecord>) -> Self {
        debug_assert!(members.len() >= 2, "duplicate group needs two members");
        Self {
            fingerprint,
            members,
        }
    }

    /// The retained member.
    #[must_use]
    pub fn canonical(&self) -> &FileRecord {
        &self.members[0]
    }

    /// Members eligible for delete/move.
    #[must_use]
    pub fn redundant(&self) -> &[FileRecord] {
        &self.members[1..]
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Strategy that formed this group.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.fingerprint.strategy()
    }

    /// Total size of all files in this group.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.members.iter().map(|f| f.size_bytes).sum()
    }

    /// Space reclaimable by removing every redundant member.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.redundant().iter().map(|f| f.size_bytes).sum()
    }

    /// Paths of all members, canonical first.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.members.iter().map(|f| f.path.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn rec(path: &str, size: u64) -> FileRecord {
        FileRecord::new(PathBuf::from(path), size, SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn test_bucket_by_size() {
        let files = vec![rec("/a", 100), rec("/b", 200), rec("/c", 100), rec("/d", 300)];
        let (buckets, stats) = bucket_candidates(files, &PrefilterConfig::default());

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].key.size, Some(100));
        let paths: Vec<_> = buckets[0].members.iter().map(|c| c.record.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("/a"), PathBuf::from("/c")]);
        assert_eq!(buckets[0].members[0].ordinal, 0);
        assert_eq!(buckets[0].members[1].ordinal, 2);

        assert_eq!(stats.total_files, 4);
        assert_eq!(stats.eliminated_unique, 2);
        assert_eq!(stats.forwarded, 2);
        assert_eq!(stats.elimination_rate(), 50.0);
    }

    #[test]
    fn test_buckets_ordered_by_first_member() {
        let files = vec![rec("/x", 5), rec("/y", 9), rec("/z", 9), rec("/w", 5)];
        let (buckets, _) = bucket_candidates(files, &PrefilterConfig::default());

        let sizes: Vec<_> = buckets.iter().map(|b| b.key.size).collect();
        assert_eq!(sizes, vec![Some(5), Some(9)]);
    }

    #[test]
    fn test_size_range_filter() {
        let config = PrefilterConfig {
            min_size: 10,
            max_size: Some(100),
            ..Default::default()
        };
        let files = vec![
            rec("/small1", 5),
            rec("/small2", 5),
            rec("/big1", 500),
            rec("/big2", 500),
            rec("/ok1", 50),
            rec("/ok2", 50),
        ];
        let (buckets, stats) = bucket_candidates(files, &config);

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].key.size, Some(50));
        assert_eq!(stats.dropped_by_size, 4);
    }

    #[test]
    fn test_default_drops_empty_files() {
        let (buckets, stats) =
            bucket_candidates(vec![rec("/e1", 0), rec("/e2", 0)], &PrefilterConfig::default());
        assert!(buckets.is_empty());
        assert_eq!(stats.dropped_by_size, 2);

        let config = PrefilterConfig {
            min_size: 0,
            ..Default::default()
        };
        let (buckets, _) = bucket_candidates(vec![rec("/e1", 0), rec("/e2", 0)], &config);
        assert_eq!(buckets.len(), 1);
    }

    #[test]
    fn test_bucket_by_mtime() {
        let t0 = SystemTime::UNIX_EPOCH;
        let t1 = t0 + Duration::from_secs(60);
        let files = vec![
            FileRecord::new(PathBuf::from("/a"), 10, t0),
            FileRecord::new(PathBuf::from("/b"), 10, t1),
            FileRecord::new(PathBuf::from("/c"), 10, t0),
        ];

        let (by_size, _) = bucket_candidates(files.clone(), &PrefilterConfig::default());
        assert_eq!(by_size.len(), 1);
        assert_eq!(by_size[0].len(), 3);

        let config = PrefilterConfig {
            bucket_by_mtime: true,
            ..Default::default()
        };
        let (by_mtime, stats) = bucket_candidates(files, &config);
        assert_eq!(by_mtime.len(), 1);
        assert_eq!(by_mtime[0].len(), 2);
        assert_eq!(by_mtime[0].key.modified_at, Some(t0));
        assert_eq!(stats.eliminated_unique, 1);
    }

    #[test]
    fn test_single_bucket_without_size_key() {
        let config = PrefilterConfig {
            bucket_by_size: false,
            ..Default::default()
        };
        let files = vec![rec("/a.png", 100), rec("/b.png", 250), rec("/c.png", 900)];
        let (buckets, stats) = bucket_candidates(files, &config);

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].key.size, None);
        assert_eq!(stats.forwarded, 3);
    }

    #[test]
    fn test_media_type_filter() {
        let filter = MediaTypeFilter::new(vec!["image/*".into()], vec!["image/gif".into()]);
        assert!(filter.allows(Some("image/png")));
        assert!(filter.allows(Some("IMAGE/JPEG")));
        assert!(!filter.allows(Some("image/gif")));
        assert!(!filter.allows(Some("text/plain")));
        assert!(!filter.allows(None));

        let exclude_only = MediaTypeFilter::new(vec![], vec!["video".into()]);
        assert!(exclude_only.allows(None));
        assert!(exclude_only.allows(Some("text/plain")));
        assert!(!exclude_only.allows(Some("video/mp4")));
    }

    #[test]
    fn test_prefilter_drops_by_type() {
        let config = PrefilterConfig {
            media_types: MediaTypeFilter::new(vec!["text/plain".into()], vec![]),
            ..Default::default()
        };
        let files = vec![
            rec("/a.txt", 4).with_media_type("text/plain"),
            rec("/b.txt", 4).with_media_type("text/plain"),
            rec("/c.png", 4).with_media_type("image/png"),
        ];
        let (buckets, stats) = bucket_candidates(files, &config);
        assert_eq!(buckets[0].len(), 2);
        assert_eq!(stats.dropped_by_type, 1);
    }

    #[test]
    fn test_duplicate_group_accessors() {
        let group = DuplicateGroup::new(
            Fingerprint::Exact {
                algorithm: crate::scanner::HashAlgorithm::Sha256,
                digest: "00".into(),
            },
            vec![rec("/a", 10), rec("/b", 10), rec("/c", 10)],
        );

        assert_eq!(group.canonical().path, PathBuf::from("/a"));
        assert_eq!(group.redundant().len(), 2);
        assert_eq!(group.total_size(), 30);
        assert_eq!(group.wasted_space(), 20);
        assert_eq!(group.strategy(), Strategy::Exact);
    }
}
