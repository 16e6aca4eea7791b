use dupescan::duplicates::{
    DuplicateFinder, FinderConfig, FinderError, MediaTypeFilter, PrefilterConfig, ScanControl,
};
use dupescan::scanner::{HashAlgorithm, Strategy, WalkerConfig};
use filetime::{set_file_mtime, FileTime};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn write(path: &Path, content: &[u8]) {
    File::create(path).unwrap().write_all(content).unwrap();
}

fn scan(root: &Path, config: FinderConfig) -> (Vec<dupescan::duplicates::DuplicateGroup>, dupescan::duplicates::ScanSummary) {
    DuplicateFinder::new(config)
        .find_duplicates(root, &ScanControl::new())
        .unwrap()
}

fn names(group: &dupescan::duplicates::DuplicateGroup) -> Vec<String> {
    group.members.iter().map(|m| m.file_name()).collect()
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let (groups, summary) = scan(dir.path(), FinderConfig::default());

    assert!(groups.is_empty());
    assert_eq!(summary.files_enumerated, 0);
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.duplicate_groups, 0);
}

#[test]
fn test_hello_world_scenario() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.txt"), b"hello");
    fs::create_dir(dir.path().join("sub")).unwrap();
    write(&dir.path().join("sub").join("b.txt"), b"hello");
    write(&dir.path().join("c.txt"), b"world");

    let (groups, summary) = scan(dir.path(), FinderConfig::default());

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].canonical().path, dir.path().join("a.txt"));
    assert_eq!(groups[0].redundant()[0].path, dir.path().join("sub").join("b.txt"));
    assert_eq!(groups[0].strategy(), Strategy::Exact);
    // Three files of size 5 share a bucket; all three are fingerprinted.
    assert_eq!(summary.files_enumerated, 3);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.duplicate_files, 1);
    assert_eq!(summary.reclaimable_space, 5);
    assert_eq!(summary.errors(), 0);
}

#[test]
fn test_same_size_different_content() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("x.bin"), b"aaaa");
    write(&dir.path().join("y.bin"), b"bbbb");

    let (groups, summary) = scan(dir.path(), FinderConfig::default());

    assert!(groups.is_empty());
    assert_eq!(summary.prefilter.forwarded, 2);
    assert_eq!(summary.processed, 2);
}

#[test]
fn test_unique_sizes_are_never_hashed() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("one"), b"1");
    write(&dir.path().join("two"), b"22");
    write(&dir.path().join("three"), b"333");

    let (groups, summary) = scan(dir.path(), FinderConfig::default());

    assert!(groups.is_empty());
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.prefilter.eliminated_unique, 3);
}

#[test]
fn test_rescan_is_identical() {
    let dir = tempdir().unwrap();
    for (i, content) in [b"alpha", b"omega", b"alpha", b"omega", b"gamma"].iter().enumerate() {
        write(&dir.path().join(format!("f{}.dat", i)), *content);
    }

    let config = FinderConfig::default().with_io_threads(4);
    let (first, _) = scan(dir.path(), config.clone());
    let (second, _) = scan(dir.path(), config);

    assert_eq!(first.len(), 2);
    let first_paths: Vec<_> = first.iter().map(|g| g.paths()).collect();
    let second_paths: Vec<_> = second.iter().map(|g| g.paths()).collect();
    assert_eq!(first_paths, second_paths);
    assert_eq!(names(&first[0]), vec!["f0.dat", "f2.dat"]);
    assert_eq!(names(&first[1]), vec!["f1.dat", "f3.dat"]);
}

#[test]
fn test_canonical_independent_of_thread_count() {
    let dir = tempdir().unwrap();
    for i in 0..40 {
        write(&dir.path().join(format!("file_{:02}.bin", i)), &[(i % 4) as u8; 256]);
    }

    let (single, _) = scan(dir.path(), FinderConfig::default().with_io_threads(1));
    let (many, _) = scan(dir.path(), FinderConfig::default().with_io_threads(8));

    assert_eq!(single.len(), 4);
    for (a, b) in single.iter().zip(&many) {
        assert_eq!(a.paths(), b.paths());
    }
    assert_eq!(single[0].canonical().file_name(), "file_00.bin");
}

#[test]
fn test_size_range_excludes_files() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("small_a"), b"ab");
    write(&dir.path().join("small_b"), b"ab");
    write(&dir.path().join("big_a"), &[9u8; 100]);
    write(&dir.path().join("big_b"), &[9u8; 100]);

    let prefilter = PrefilterConfig {
        min_size: 10,
        ..PrefilterConfig::default()
    };
    let (groups, summary) = scan(dir.path(), FinderConfig::default().with_prefilter(prefilter));

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].canonical().file_name(), "big_a");
    assert_eq!(summary.prefilter.dropped_by_size, 2);

    let prefilter = PrefilterConfig {
        max_size: Some(10),
        ..PrefilterConfig::default()
    };
    let (groups, _) = scan(dir.path(), FinderConfig::default().with_prefilter(prefilter));
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].canonical().file_name(), "small_a");
}

#[test]
fn test_zero_length_files_need_min_size_zero() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("empty1"), b"");
    write(&dir.path().join("empty2"), b"");

    let (groups, _) = scan(dir.path(), FinderConfig::default());
    assert!(groups.is_empty());

    let prefilter = PrefilterConfig {
        min_size: 0,
        ..PrefilterConfig::default()
    };
    let (groups, _) = scan(dir.path(), FinderConfig::default().with_prefilter(prefilter));
    assert_eq!(groups.len(), 1);
}

#[test]
fn test_media_type_filter() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.txt"), b"same bytes");
    write(&dir.path().join("b.txt"), b"same bytes");
    write(&dir.path().join("a.csv"), b"more bytes");
    write(&dir.path().join("b.csv"), b"more bytes");

    let prefilter = PrefilterConfig {
        media_types: MediaTypeFilter::new(vec![], vec!["text/csv".into()]),
        ..PrefilterConfig::default()
    };
    let (groups, summary) = scan(dir.path(), FinderConfig::default().with_prefilter(prefilter));

    assert_eq!(groups.len(), 1);
    assert_eq!(names(&groups[0]), vec!["a.txt", "b.txt"]);
    assert_eq!(summary.prefilter.dropped_by_type, 2);
}

#[test]
fn test_bucket_by_mtime_splits_groups() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    write(&a, b"identical");
    write(&b, b"identical");
    set_file_mtime(&a, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    set_file_mtime(&b, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

    let (groups, _) = scan(dir.path(), FinderConfig::default());
    assert_eq!(groups.len(), 1);

    let prefilter = PrefilterConfig {
        bucket_by_mtime: true,
        ..PrefilterConfig::default()
    };
    let (groups, _) = scan(dir.path(), FinderConfig::default().with_prefilter(prefilter.clone()));
    assert!(groups.is_empty());

    set_file_mtime(&b, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    let (groups, _) = scan(dir.path(), FinderConfig::default().with_prefilter(prefilter));
    assert_eq!(groups.len(), 1);
}

#[test]
fn test_every_hash_algorithm_groups_the_same() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a"), b"payload");
    write(&dir.path().join("b"), b"payload");
    write(&dir.path().join("c"), b"PAYLOAD");

    for algorithm in [
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Blake3,
    ] {
        let (groups, _) = scan(dir.path(), FinderConfig::default().with_hash_algorithm(algorithm));
        assert_eq!(groups.len(), 1, "{}", algorithm);
        assert_eq!(names(&groups[0]), vec!["a", "b"]);
    }
}

#[test]
fn test_verify_content_keeps_true_duplicates() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a"), b"verified");
    write(&dir.path().join("b"), b"verified");

    let (groups, summary) = scan(dir.path(), FinderConfig::default().with_verify_content(true));
    assert_eq!(groups.len(), 1);
    assert_eq!(summary.verify_splits, 0);
}

#[test]
fn test_ignore_patterns_and_hidden() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("keep1.txt"), b"dup");
    write(&dir.path().join("keep2.txt"), b"dup");
    write(&dir.path().join("skip.tmp"), b"dup");
    write(&dir.path().join(".hidden"), b"dup");

    let walker = WalkerConfig::new(false, true, vec!["*.tmp".into()]);
    let (groups, summary) = scan(dir.path(), FinderConfig::default().with_walker_config(walker));

    assert_eq!(summary.files_enumerated, 2);
    assert_eq!(names(&groups[0]), vec!["keep1.txt", "keep2.txt"]);
}

#[test]
fn test_invalid_roots() {
    let finder = DuplicateFinder::with_defaults();
    let control = ScanControl::new();

    let missing = finder.find_duplicates(Path::new("/non/existent/dupescan/root"), &control);
    assert!(matches!(missing, Err(FinderError::PathNotFound(_))));

    let dir = tempdir().unwrap();
    let file = dir.path().join("file.txt");
    write(&file, b"x");
    let not_dir = finder.find_duplicates(&file, &control);
    assert!(matches!(not_dir, Err(FinderError::NotADirectory(_))));
}

#[test]
fn test_cancelled_control_interrupts() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a"), b"same");
    write(&dir.path().join("b"), b"same");

    let control = ScanControl::new();
    control.cancel();
    let result = DuplicateFinder::with_defaults().find_duplicates(dir.path(), &control);
    assert!(matches!(result, Err(FinderError::Interrupted)));
}
