//! Duplicate detection.
//!
//! - [`groups`] - metadata pre-filter and the [`DuplicateGroup`] type
//! - [`index`] - grouping index with perceptual refinement
//! - [`finder`] - the scan pipeline and its pause/cancel gate

pub mod finder;
pub mod groups;
pub mod index;

pub use finder::{
    validate_root, DuplicateFinder, FinderConfig, FinderError, ScanControl, ScanSummary,
    DEFAULT_IO_THREADS,
};
pub use groups::{
    bucket_candidates, BucketKey, Candidate, DuplicateGroup, MediaTypeFilter, MetadataBucket,
    Prefilter, PrefilterConfig, PrefilterStats,
};
pub use index::GroupingIndex;
