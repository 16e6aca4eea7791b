use clap::Parser;
use dupescan::actions::{ActionPolicy, DeleteMode};
use dupescan::cli::{ActionKind, Cli, Commands};
use dupescan::config::{ConfigError, ScanSettings};
use dupescan::scanner::{HashAlgorithm, Strategy};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::tempdir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("DUPESCAN_") {
            std::env::remove_var(key);
        }
    }
}

fn scan_args(argv: &[&str]) -> dupescan::cli::ScanArgs {
    match Cli::try_parse_from(argv).unwrap().command {
        Commands::Scan(args) => args,
        _ => panic!("Expected Scan command"),
    }
}

#[test]
fn test_missing_file_uses_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    clear_env();
    let dir = tempdir().unwrap();

    let settings = ScanSettings::load_from_path(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(settings, ScanSettings::default());
}

#[test]
fn test_load_from_toml() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
strategy = "perceptual"
hash_algorithm = "blake3"
min_size = 1024
include_media_types = ["image/*"]
action = "move"
destination_path = "/srv/dupes"
io_threads = 8
unknown_key = "ignored"
"#,
    )
    .unwrap();

    let settings = ScanSettings::load_from_path(&path).unwrap();
    assert_eq!(settings.strategy, Strategy::Perceptual);
    assert_eq!(settings.hash_algorithm, HashAlgorithm::Blake3);
    assert_eq!(settings.min_size, 1024);
    assert_eq!(settings.include_media_types, vec!["image/*"]);
    assert_eq!(settings.io_threads, 8);
    assert_eq!(
        settings.action_policy(),
        Some(ActionPolicy::Move {
            destination: PathBuf::from("/srv/dupes")
        })
    );
}

#[test]
fn test_defaults_file_env_cli_hierarchy() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "min_size = 100\nio_threads = 8\nhash_algorithm = \"sha512\"\n").unwrap();

    std::env::set_var("DUPESCAN_MIN_SIZE", "200");
    let mut settings = ScanSettings::load_from_path(&path).unwrap();
    std::env::remove_var("DUPESCAN_MIN_SIZE");

    assert_eq!(settings.min_size, 200);
    assert_eq!(settings.io_threads, 8);
    assert_eq!(settings.hash_algorithm, HashAlgorithm::Sha512);

    settings.merge_scan_args(&scan_args(&["dupescan", "scan", "/data", "--min-size", "1KB"]));
    assert_eq!(settings.min_size, 1000);
    assert_eq!(settings.io_threads, 8);
    assert_eq!(settings.hash_algorithm, HashAlgorithm::Sha512);
    assert_eq!(settings.root_path, Some(PathBuf::from("/data")));
}

#[test]
fn test_cli_flags_override_only_when_set() {
    let mut settings = ScanSettings {
        verify_content: true,
        ignore_patterns: vec!["*.bak".into()],
        ..ScanSettings::default()
    };
    settings.merge_scan_args(&scan_args(&["dupescan", "scan", "/data", "--trash", "--action", "delete"]));

    assert!(settings.verify_content);
    assert_eq!(settings.ignore_patterns, vec!["*.bak"]);
    assert_eq!(settings.action, ActionKind::Delete);
    assert_eq!(
        settings.action_policy(),
        Some(ActionPolicy::Delete(DeleteMode::Trash))
    );
}

#[test]
fn test_malformed_file_is_an_error() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "min_size = \"lots\"\n").unwrap();

    assert!(matches!(
        ScanSettings::load_from_path(&path),
        Err(ConfigError::Load(_))
    ));
}

#[test]
fn test_save_and_reload() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let settings = ScanSettings {
        strategy: Strategy::Perceptual,
        perceptual_threshold: Some(12),
        bucket_by_mtime: true,
        exclude_media_types: vec!["image/gif".into()],
        ..ScanSettings::default()
    };
    assert_eq!(settings.save(Some(path.as_path())).unwrap(), path);

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("strategy = \"perceptual\""));
    assert!(text.contains("perceptual_threshold = 12"));

    assert_eq!(ScanSettings::load_from_path(&path).unwrap(), settings);
}

#[test]
fn test_validation_after_merge() {
    let mut settings = ScanSettings::default();
    settings.merge_scan_args(&scan_args(&[
        "dupescan",
        "scan",
        "/data",
        "--min-size",
        "10MB",
        "--max-size",
        "1MB",
    ]));
    assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));

    let mut settings = ScanSettings::default();
    settings.merge_scan_args(&scan_args(&["dupescan", "scan", "/data", "--action", "move"]));
    let err = settings.validate().unwrap_err();
    assert!(err.to_string().contains("destination"));
}
