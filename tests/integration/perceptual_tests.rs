use dupescan::duplicates::{DuplicateFinder, FinderConfig, ScanControl};
use dupescan::scanner::{PerceptualAlgorithm, PerceptualHasher, Strategy};
use image::{GrayImage, Luma};
use std::path::Path;
use tempfile::tempdir;

fn gradient() -> GrayImage {
    GrayImage::from_fn(64, 64, |x, _| Luma([(x * 4) as u8]))
}

fn checkerboard() -> GrayImage {
    GrayImage::from_fn(64, 64, |x, y| {
        if ((x / 8) + (y / 8)) % 2 == 0 {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

fn perceptual() -> FinderConfig {
    FinderConfig::default()
        .with_strategy(Strategy::Perceptual)
        .with_perceptual_algorithm(PerceptualAlgorithm::Ahash)
}

fn populate(root: &Path) {
    gradient().save(root.join("a_gradient.png")).unwrap();
    gradient().save(root.join("b_gradient.bmp")).unwrap();
    checkerboard().save(root.join("c_checker.png")).unwrap();
    std::fs::write(root.join("notes.txt"), "not an image").unwrap();
}

#[test]
fn test_reencoded_image_grouped() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    let (groups, summary) = DuplicateFinder::new(perceptual())
        .find_duplicates(dir.path(), &ScanControl::new())
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].strategy(), Strategy::Perceptual);
    assert_eq!(groups[0].canonical().path, dir.path().join("a_gradient.png"));
    assert_eq!(groups[0].redundant()[0].path, dir.path().join("b_gradient.bmp"));
    assert_eq!(summary.not_applicable, 1);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.errors(), 0);
}

#[test]
fn test_exact_strategy_ignores_reencoding() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    let (groups, _) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &ScanControl::new())
        .unwrap();
    assert!(groups.is_empty());
}

#[test]
fn test_distinct_images_far_apart() {
    let dir = tempdir().unwrap();
    gradient().save(dir.path().join("g.png")).unwrap();
    checkerboard().save(dir.path().join("c.png")).unwrap();

    let hasher = PerceptualHasher::new(PerceptualAlgorithm::Ahash);
    let g = hasher.compute_hash(&dir.path().join("g.png")).unwrap();
    let c = hasher.compute_hash(&dir.path().join("c.png")).unwrap();
    assert!(g.dist(&c) > PerceptualAlgorithm::Ahash.default_threshold());

    // A threshold wide enough to cover the distance joins them.
    let config = perceptual().with_threshold(64);
    let (groups, _) = DuplicateFinder::new(config)
        .find_duplicates(dir.path(), &ScanControl::new())
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].canonical().file_name(), "c.png");
}

#[test]
fn test_corrupt_image_is_logged_not_fatal() {
    let dir = tempdir().unwrap();
    gradient().save(dir.path().join("a.png")).unwrap();
    gradient().save(dir.path().join("b.png")).unwrap();
    std::fs::write(dir.path().join("broken.png"), b"\x89PNG definitely not").unwrap();

    let config = perceptual();
    let sink = config.error_sink.clone();
    let (groups, summary) = DuplicateFinder::new(config)
        .find_duplicates(dir.path(), &ScanControl::new())
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(summary.fingerprint_errors, 1);
    assert_eq!(sink.len(), 1);
    assert!(sink.records()[0].context.contains("broken.png"));
}
