use dupescan::actions::{ActionExecutor, ActionPolicy};
use dupescan::duplicates::{DuplicateFinder, DuplicateGroup, ScanControl};
use dupescan::output::CsvOutput;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn scan(root: &Path) -> Vec<DuplicateGroup> {
    DuplicateFinder::with_defaults()
        .find_duplicates(root, &ScanControl::new())
        .unwrap()
        .0
}

fn write(path: &Path, content: &[u8]) {
    File::create(path).unwrap().write_all(content).unwrap();
}

#[test]
fn test_paths_with_quotes() {
    let dir = tempdir().unwrap();

    // Windows does not allow double quotes in filenames.
    if cfg!(not(windows)) {
        write(&dir.path().join("file_with_\"quote\".txt"), b"content");
        write(&dir.path().join("duplicate.txt"), b"content");

        let groups = scan(dir.path());
        assert_eq!(groups.len(), 1);
        assert!(groups[0]
            .members
            .iter()
            .any(|f| f.path.to_string_lossy().contains('"')));

        // The csv writer quotes the field rather than corrupting the row.
        let csv = CsvOutput::new(&groups).to_string().unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("\"\""));
    }
}

#[test]
fn test_paths_with_newlines() {
    let dir = tempdir().unwrap();

    if cfg!(not(windows)) {
        write(&dir.path().join("file_with\nnewline.txt"), b"content");
        write(&dir.path().join("duplicate.txt"), b"content");

        let groups = scan(dir.path());
        assert_eq!(groups.len(), 1);
        assert!(groups[0]
            .members
            .iter()
            .any(|f| f.path.to_string_lossy().contains('\n')));
    }
}

#[test]
fn test_extremely_long_paths() {
    let dir = tempdir().unwrap();

    let mut current_path = dir.path().to_path_buf();
    let folder_name = "a".repeat(50);

    for i in 0..6 {
        current_path = current_path.join(format!("{}_{}", i, folder_name));
        if let Err(e) = fs::create_dir(&current_path) {
            eprintln!("Skipping long path test: failed to create dir: {}", e);
            return;
        }
    }

    let file_path = current_path.join("file.txt");
    if let Err(e) = File::create(&file_path).and_then(|mut f| f.write_all(b"content")) {
        eprintln!("Skipping long path test: failed to create file: {}", e);
        return;
    }
    write(&dir.path().join("duplicate.txt"), b"content");

    let groups = scan(dir.path());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
}

#[test]
fn test_unicode_names_move_with_collision() {
    let root = tempdir().unwrap();
    let dest = tempdir().unwrap();
    fs::create_dir(root.path().join("one")).unwrap();
    fs::create_dir(root.path().join("two")).unwrap();
    write(&root.path().join("one").join("café.txt"), b"bonjour");
    write(&root.path().join("two").join("café.txt"), b"bonjour");
    write(&dest.path().join("café.txt"), b"occupied");

    let groups = scan(root.path());
    assert_eq!(groups.len(), 1);

    let report = ActionExecutor::new(ActionPolicy::Move {
        destination: dest.path().to_path_buf(),
    })
    .execute(&groups)
    .unwrap();

    assert!(report.all_succeeded());
    assert_eq!(
        report.results[0].destination,
        Some(dest.path().join("café_1.txt"))
    );
}

#[cfg(unix)]
#[test]
fn test_non_utf8_file_names() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let odd = dir.path().join(OsStr::from_bytes(b"bad_\xFF_name.bin"));
    if let Err(e) = File::create(&odd).and_then(|mut f| f.write_all(b"bytes")) {
        eprintln!("Skipping non-UTF-8 test: filesystem refused the name: {}", e);
        return;
    }
    write(&dir.path().join("plain.bin"), b"bytes");

    let groups = scan(dir.path());
    assert_eq!(groups.len(), 1);
    assert!(groups[0].members.iter().any(|f| f.path == odd));
    assert!(groups[0].members.iter().any(|f| f.file_name().contains('\u{FFFD}')));
}
