//! Duplicate detection pipeline.
//!
//! # Overview
//!
//! [`DuplicateFinder`] runs one scan end to end:
//!
//! 1. **Walk** - enumerate the tree and feed the pre-filter as records arrive
//! 2. **Pre-filter** - size/type filters and metadata buckets
//! 3. **Fingerprint** - hash every forwarded candidate on a bounded pool
//! 4. **Group** - finalize the grouping index
//! 5. **Verify** (optional) - split exact groups into byte-identical sub-groups
//!
//! Workers only compute. Their results travel over a channel to the scan
//! thread, which alone updates the grouping index, the progress counter and
//! the progress sink.
//!
//! A [`ScanControl`] is consulted before every dispatched unit. While it is
//! paused no new unit starts; once it is cancelled the remaining units are
//! skipped and the scan returns [`FinderError::Interrupted`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;

use super::{Candidate, DuplicateGroup, GroupingIndex, Prefilter, PrefilterConfig, PrefilterStats};
use crate::error_sink::{ErrorCategory, ErrorSink};
use crate::progress::{ProgressSink, PHASE_FINGERPRINT, PHASE_VERIFY, PHASE_WALK};
use crate::scanner::{
    files_identical, FileRecord, FingerprintEngine, HashAlgorithm, HashError, PerceptualAlgorithm,
    Strategy, Walker, WalkerConfig,
};

/// Default number of I/O threads for fingerprinting.
pub const DEFAULT_IO_THREADS: usize = 4;

/// How often a paused worker re-checks an external cancel flag.
const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Cooperative pause/cancel gate shared by the scan thread and its workers.
///
/// Checked between units, never inside a single file's read loop.
#[derive(Debug, Default)]
pub struct ScanControl {
    cancelled: Arc<AtomicBool>,
    paused: Mutex<bool>,
    resumed: Condvar,
}

impl ScanControl {
    /// New gate in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// New gate whose cancel flag is shared with someone else, such as a
    /// Ctrl+C handler.
    #[must_use]
    pub fn with_cancel_flag(flag: Arc<AtomicBool>) -> Self {
        Self {
            cancelled: flag,
            ..Self::default()
        }
    }

    /// The cancel flag, for components that poll it directly.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    fn paused(&self) -> MutexGuard<'_, bool> {
        self.paused.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Stop dispatching new units.
    pub fn pause(&self) {
        *self.paused() = true;
    }

    /// Resume dispatching.
    pub fn resume(&self) {
        *self.paused() = false;
        self.resumed.notify_all();
    }

    /// Skip every unit not yet started. Also releases paused workers.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.resumed.notify_all();
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Whether dispatch is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.paused()
    }

    /// Gate before a unit of work.
    ///
    /// Blocks while paused. Returns `false` if the unit must be skipped
    /// because the scan was cancelled.
    pub fn checkpoint(&self) -> bool {
        let mut paused = self.paused();
        while *paused && !self.is_cancelled() {
            paused = match self.resumed.wait_timeout(paused, PAUSE_POLL) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        !self.is_cancelled()
    }
}

/// Configuration for the duplicate finder.
#[derive(Clone)]
pub struct FinderConfig {
    /// Fingerprint strategy for the whole scan
    pub strategy: Strategy,
    /// Content hash for the exact strategy
    pub hash_algorithm: HashAlgorithm,
    /// Image hash for the perceptual strategy
    pub perceptual_algorithm: PerceptualAlgorithm,
    /// Maximum Hamming distance for perceptual near-duplicates
    pub threshold: u32,
    /// Size/type/bucketing options
    pub prefilter: PrefilterConfig,
    /// Traversal options
    pub walker_config: WalkerConfig,
    /// Worker threads for fingerprinting
    pub io_threads: usize,
    /// Confirm exact groups byte for byte
    pub verify_content: bool,
    /// Where per-file failures go
    pub error_sink: ErrorSink,
    /// Optional progress sink
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("strategy", &self.strategy)
            .field("hash_algorithm", &self.hash_algorithm)
            .field("perceptual_algorithm", &self.perceptual_algorithm)
            .field("threshold", &self.threshold)
            .field("prefilter", &self.prefilter)
            .field("walker_config", &self.walker_config)
            .field("io_threads", &self.io_threads)
            .field("verify_content", &self.verify_content)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish_non_exhaustive()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Exact,
            hash_algorithm: HashAlgorithm::default(),
            perceptual_algorithm: PerceptualAlgorithm::default(),
            threshold: PerceptualAlgorithm::default().default_threshold(),
            prefilter: PrefilterConfig::default(),
            walker_config: WalkerConfig::default(),
            io_threads: DEFAULT_IO_THREADS,
            verify_content: false,
            error_sink: ErrorSink::new(),
            progress: None,
        }
    }
}

impl FinderConfig {
    /// Set the fingerprint strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the exact-strategy hash algorithm.
    #[must_use]
    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    /// Set the perceptual algorithm.
    #[must_use]
    pub fn with_perceptual_algorithm(mut self, algorithm: PerceptualAlgorithm) -> Self {
        self.perceptual_algorithm = algorithm;
        self
    }

    /// Set the perceptual threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the pre-filter options.
    #[must_use]
    pub fn with_prefilter(mut self, prefilter: PrefilterConfig) -> Self {
        self.prefilter = prefilter;
        self
    }

    /// Set the traversal options.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the number of fingerprinting threads (minimum 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Enable byte-for-byte confirmation of exact groups.
    #[must_use]
    pub fn with_verify_content(mut self, enabled: bool) -> Self {
        self.verify_content = enabled;
        self
    }

    /// Set the error sink.
    #[must_use]
    pub fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.error_sink = sink;
        self
    }

    /// Set the progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn engine(&self) -> FingerprintEngine {
        match self.strategy {
            Strategy::Exact => FingerprintEngine::exact(self.hash_algorithm),
            Strategy::Perceptual => FingerprintEngine::perceptual(self.perceptual_algorithm),
        }
    }

    /// Similar images rarely share a size, so perceptual scans bucket
    /// without the size key.
    fn effective_prefilter(&self) -> PrefilterConfig {
        let mut prefilter = self.prefilter.clone();
        if self.strategy == Strategy::Perceptual {
            prefilter.bucket_by_size = false;
        }
        prefilter
    }
}

/// Summary statistics from a completed scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    /// Strategy used
    pub strategy: Strategy,
    /// Regular files found by the walk
    pub files_enumerated: usize,
    /// Files the strategy does not apply to (non-images in perceptual mode)
    pub not_applicable: usize,
    /// Pre-filter statistics
    pub prefilter: PrefilterStats,
    /// Candidates fingerprinted, successfully or not
    pub processed: usize,
    /// Confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Redundant members across all groups
    pub duplicate_files: usize,
    /// Bytes freed by removing every redundant member
    pub reclaimable_space: u64,
    /// Directory entries that could not be read
    pub enumeration_errors: usize,
    /// Files that could not be fingerprinted or verified
    pub fingerprint_errors: usize,
    /// Exact groups split or shrunk by byte verification
    pub verify_splits: usize,
    /// Wall-clock duration of the scan
    #[serde(with = "duration_secs")]
    pub scan_duration: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

impl ScanSummary {
    /// Total failures logged during the scan.
    #[must_use]
    pub fn errors(&self) -> usize {
        self.enumeration_errors + self.fingerprint_errors
    }

    /// Format reclaimable space as human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        ByteSize::b(self.reclaimable_space).to_string()
    }
}

/// Fatal scan errors. Per-file failures are never reported here.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was cancelled.
    #[error("Scan interrupted")]
    Interrupted,

    /// The provided path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The provided path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Check that `root` is an existing directory.
///
/// # Errors
///
/// [`FinderError::PathNotFound`] or [`FinderError::NotADirectory`].
pub fn validate_root(root: &Path) -> Result<(), FinderError> {
    if !root.exists() {
        return Err(FinderError::PathNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(FinderError::NotADirectory(root.to_path_buf()));
    }
    Ok(())
}

/// Run `work` over `units` on `pool`, feeding each result to `collect` on
/// the calling thread as soon as it completes.
///
/// Units are gated by `control`; skipped units produce no result.
fn dispatch_units<T, R, W, C>(
    pool: &ThreadPool,
    units: Vec<T>,
    control: &ScanControl,
    work: W,
    mut collect: C,
) where
    T: Send,
    R: Send,
    W: Fn(T) -> R + Sync,
    C: FnMut(R),
{
    let (tx, rx) = mpsc::channel::<R>();
    std::thread::scope(|scope| {
        scope.spawn(|| {
            pool.install(|| {
                units.into_par_iter().for_each_with(tx, |tx, unit| {
                    if control.checkpoint() {
                        // The receiver outlives every sender in this scope.
                        let _ = tx.send(work(unit));
                    }
                });
            });
        });
        for result in rx {
            collect(result);
        }
    });
}

/// Duplicate finder that runs the detection pipeline.
///
/// # Example
///
/// ```no_run
/// use dupescan::duplicates::{DuplicateFinder, FinderConfig, ScanControl};
/// use std::path::Path;
///
/// let finder = DuplicateFinder::new(FinderConfig::default().with_io_threads(4));
/// let control = ScanControl::new();
/// let (groups, summary) = finder.find_duplicates(Path::new("."), &control).unwrap();
///
/// println!("Found {} duplicate groups", groups.len());
/// println!("Reclaimable space: {}", summary.reclaimable_display());
/// ```
#[derive(Debug)]
pub struct DuplicateFinder {
    config: FinderConfig,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        Self { config }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// The finder's configuration.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    fn progress(&self) -> Option<&dyn ProgressSink> {
        self.config.progress.as_deref()
    }

    /// Find all duplicate groups under `root`.
    ///
    /// Groups come back in a deterministic order and each group's first
    /// member is its earliest-discovered file.
    ///
    /// # Errors
    ///
    /// Returns `FinderError` if the root is invalid, the worker pool cannot
    /// be built, or `control` is cancelled before the scan completes.
    pub fn find_duplicates(
        &self,
        root: &Path,
        control: &ScanControl,
    ) -> Result<(Vec<DuplicateGroup>, ScanSummary), FinderError> {
        let start = Instant::now();
        validate_root(root)?;

        let engine = self.config.engine();
        let mut summary = ScanSummary {
            strategy: engine.strategy(),
            ..Default::default()
        };
        log::info!(
            "Scanning {} ({} strategy, {} I/O threads)",
            root.display(),
            summary.strategy,
            self.config.io_threads
        );

        let candidates = self.enumerate(root, &engine, control, &mut summary);
        if control.is_cancelled() {
            log::info!("Scan cancelled during enumeration");
            return Err(FinderError::Interrupted);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads.max(1))
            .thread_name(|i| format!("dupescan-io-{}", i))
            .build()?;

        let index = self.fingerprint(&pool, candidates, &engine, control, &mut summary);
        if control.is_cancelled() {
            log::info!("Scan cancelled during fingerprinting");
            return Err(FinderError::Interrupted);
        }

        let mut groups = index.finalize();
        if self.config.verify_content && summary.strategy == Strategy::Exact {
            groups = self.verify(&pool, groups, control, &mut summary);
            if control.is_cancelled() {
                log::info!("Scan cancelled during verification");
                return Err(FinderError::Interrupted);
            }
        }

        summary.duplicate_groups = groups.len();
        summary.duplicate_files = groups.iter().map(|g| g.redundant().len()).sum();
        summary.reclaimable_space = groups.iter().map(DuplicateGroup::wasted_space).sum();
        summary.scan_duration = start.elapsed();

        log::info!(
            "Scan complete: {} processed, {} groups, {} reclaimable, {} errors in {:.2?}",
            summary.processed,
            summary.duplicate_groups,
            summary.reclaimable_display(),
            summary.errors(),
            summary.scan_duration
        );

        Ok((groups, summary))
    }

    /// Walk the tree and pre-filter as records arrive.
    fn enumerate(
        &self,
        root: &Path,
        engine: &FingerprintEngine,
        control: &ScanControl,
        summary: &mut ScanSummary,
    ) -> Vec<Candidate> {
        if let Some(progress) = self.progress() {
            progress.on_phase_start(PHASE_WALK, 0);
        }

        let walker = Walker::new(root, self.config.walker_config.clone())
            .with_shutdown_flag(control.cancel_flag());
        let mut prefilter = Prefilter::new(self.config.effective_prefilter());

        for item in walker.walk() {
            if !control.checkpoint() {
                break;
            }
            match item {
                Ok(record) => {
                    summary.files_enumerated += 1;
                    if let Some(progress) = self.progress() {
                        progress.on_progress(summary.files_enumerated, 0, &record.path);
                    }
                    if engine.accepts(&record) {
                        prefilter.push(record);
                    } else {
                        summary.not_applicable += 1;
                    }
                }
                Err(e) => {
                    summary.enumeration_errors += 1;
                    log::warn!("{}", e);
                    self.config.error_sink.record(
                        ErrorCategory::Enumeration,
                        e.path().display().to_string(),
                        e.to_string(),
                    );
                }
            }
        }

        if let Some(progress) = self.progress() {
            progress.on_phase_end(PHASE_WALK);
        }

        let (buckets, stats) = prefilter.finish();
        summary.prefilter = stats;
        buckets.into_iter().flat_map(|b| b.members).collect()
    }

    /// Fingerprint every candidate and build the grouping index.
    fn fingerprint(
        &self,
        pool: &ThreadPool,
        candidates: Vec<Candidate>,
        engine: &FingerprintEngine,
        control: &ScanControl,
        summary: &mut ScanSummary,
    ) -> GroupingIndex {
        let total = candidates.len();
        let mut index = GroupingIndex::for_strategy(engine.strategy(), self.config.threshold);
        log::info!("Fingerprinting {} candidates", total);

        if let Some(progress) = self.progress() {
            progress.on_phase_start(PHASE_FINGERPRINT, total);
        }

        dispatch_units(
            pool,
            candidates,
            control,
            |candidate: Candidate| {
                let result = engine.fingerprint(&candidate.record);
                (candidate, result)
            },
            |(candidate, result)| {
                summary.processed += 1;
                if let Some(progress) = self.progress() {
                    progress.on_progress(summary.processed, total, &candidate.record.path);
                }
                match result {
                    Ok(fingerprint) => {
                        log::trace!("{} {}", fingerprint, candidate.record.path.display());
                        index.insert(candidate.ordinal, candidate.record, fingerprint);
                    }
                    Err(e) => self.record_hash_error(&e, summary),
                }
            },
        );

        if let Some(progress) = self.progress() {
            progress.on_phase_end(PHASE_FINGERPRINT);
        }
        index
    }

    /// Split exact groups into byte-identical sub-groups.
    fn verify(
        &self,
        pool: &ThreadPool,
        groups: Vec<DuplicateGroup>,
        control: &ScanControl,
        summary: &mut ScanSummary,
    ) -> Vec<DuplicateGroup> {
        let total = groups.len();
        log::info!("Verifying {} groups byte for byte", total);
        if let Some(progress) = self.progress() {
            progress.on_phase_start(PHASE_VERIFY, total);
        }

        // Results arrive in completion order; slot them back by position.
        let mut slots: Vec<Option<Vec<DuplicateGroup>>> = vec![None; total];
        let mut done = 0;
        dispatch_units(
            pool,
            groups.into_iter().enumerate().collect(),
            control,
            |(position, group): (usize, DuplicateGroup)| {
                let canonical = group.canonical().path.clone();
                let before = group.len();
                let (parts, errors) = split_identical(group);
                (position, canonical, before, parts, errors)
            },
            |(position, canonical, before, parts, errors)| {
                done += 1;
                if let Some(progress) = self.progress() {
                    progress.on_progress(done, total, &canonical);
                }
                let after: usize = parts.iter().map(DuplicateGroup::len).sum();
                if parts.len() != 1 || after != before {
                    summary.verify_splits += 1;
                    log::debug!(
                        "Verification reshaped group of {}: {} -> {:?}",
                        canonical.display(),
                        before,
                        parts.iter().map(DuplicateGroup::len).collect::<Vec<_>>()
                    );
                }
                for e in &errors {
                    self.record_hash_error(e, summary);
                }
                slots[position] = Some(parts);
            },
        );

        if let Some(progress) = self.progress() {
            progress.on_phase_end(PHASE_VERIFY);
        }
        slots.into_iter().flatten().flatten().collect()
    }

    fn record_hash_error(&self, e: &HashError, summary: &mut ScanSummary) {
        summary.fingerprint_errors += 1;
        log::warn!("{}", e);
        self.config.error_sink.record(
            ErrorCategory::Fingerprint,
            e.path().display().to_string(),
            e.to_string(),
        );
    }
}

/// Partition a group into byte-identical sub-groups of two or more,
/// preserving member order. Members that cannot be read are dropped.
fn split_identical(group: DuplicateGroup) -> (Vec<DuplicateGroup>, Vec<HashError>) {
    let fingerprint = group.fingerprint;
    let mut parts: Vec<Vec<FileRecord>> = Vec::new();
    let mut errors = Vec::new();

    'members: for member in group.members {
        let mut target = None;
        for (i, part) in parts.iter().enumerate() {
            match files_identical(&part[0].path, &member.path) {
                Ok(true) => {
                    target = Some(i);
                    break;
                }
                Ok(false) => {}
                Err(e) => {
                    errors.push(e);
                    continue 'members;
                }
            }
        }
        match target {
            Some(i) => parts[i].push(member),
            None => parts.push(vec![member]),
        }
    }

    let groups = parts
        .into_iter()
        .filter(|p| p.len() > 1)
        .map(|p| DuplicateGroup::new(fingerprint.clone(), p))
        .collect();
    (groups, errors)
}
