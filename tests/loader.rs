use dashboard::loader::{DatasetLoader, InvalidationPolicy, read_dataset};
use dashboard::{ColumnKind, DataLoadError, Value};
use rust_xlsxwriter::Workbook;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn write_csv(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
}

fn bump_mtime(path: &Path) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();
}

#[test]
fn repeated_loads_share_one_parse() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.csv");
    write_csv(&path, "alo,height\nA,170\nB,165\n");

    let loader = DatasetLoader::new(&path, InvalidationPolicy::ModifiedTime);
    let first = loader.load().unwrap();
    let second = loader.load().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(loader.load_count(), 1);
    assert_eq!(first.row_count(), 2);
}

#[test]
fn modified_file_is_reparsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.csv");
    write_csv(&path, "alo\nA\n");

    let loader = DatasetLoader::new(&path, InvalidationPolicy::ModifiedTime);
    assert_eq!(loader.load().unwrap().row_count(), 1);

    write_csv(&path, "alo\nA\nB\n");
    bump_mtime(&path);

    assert_eq!(loader.load().unwrap().row_count(), 2);
    assert_eq!(loader.load_count(), 2);
}

#[test]
fn content_hash_ignores_touch_without_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.csv");
    write_csv(&path, "alo\nA\n");

    let loader = DatasetLoader::new(&path, InvalidationPolicy::ContentHash);
    let first = loader.load().unwrap();
    bump_mtime(&path);
    assert!(Arc::ptr_eq(&first, &loader.load().unwrap()));

    write_csv(&path, "alo\nB\n");
    let changed = loader.load().unwrap();
    assert!(!Arc::ptr_eq(&first, &changed));
    assert_eq!(loader.load_count(), 2);
}

#[test]
fn never_policy_reloads_only_on_invalidate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.csv");
    write_csv(&path, "alo\nA\n");

    let loader = DatasetLoader::new(&path, InvalidationPolicy::Never);
    loader.load().unwrap();

    write_csv(&path, "alo\nA\nB\nC\n");
    bump_mtime(&path);
    assert_eq!(loader.load().unwrap().row_count(), 1);

    loader.invalidate();
    assert_eq!(loader.load().unwrap().row_count(), 3);
    assert_eq!(loader.load_count(), 2);
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.xlsx");

    let loader = DatasetLoader::new(&path, InvalidationPolicy::ModifiedTime);
    let err = loader.load().unwrap_err();
    assert!(matches!(err, DataLoadError::NotFound { .. }));
    assert_eq!(err.path(), path.as_path());
    assert_eq!(loader.load_count(), 0);
}

#[test]
fn empty_csv_has_no_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.csv");
    write_csv(&path, "\n\n");

    assert!(matches!(read_dataset(&path), Err(DataLoadError::Empty { .. })));
}

#[test]
fn reads_first_worksheet_of_xlsx() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.xlsx");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "alo").unwrap();
    sheet.write_string(0, 1, "bmi2").unwrap();
    sheet.write_string(1, 0, "Treatment").unwrap();
    sheet.write_number(1, 1, 24.5).unwrap();
    sheet.write_string(2, 0, "Control").unwrap();
    sheet.write_number(3, 1, 31.0).unwrap();
    sheet.write_string(3, 0, "Control").unwrap();
    workbook.save(&path).unwrap();

    let dataset = read_dataset(&path).unwrap();
    assert_eq!(dataset.schema().names(), vec!["alo", "bmi2"]);
    assert_eq!(dataset.row_count(), 3);

    let bmi = dataset.column("bmi2").unwrap();
    assert_eq!(bmi.kind, ColumnKind::Numeric);
    assert_eq!(bmi.values[0], Value::Number(24.5));
    assert_eq!(bmi.values[1], Value::Missing);

    let alo = dataset.column("alo").unwrap();
    assert_eq!(alo.kind, ColumnKind::Categorical);
    assert_eq!(alo.values[1], Value::Text("Control".to_string()));
}

#[test]
fn concurrent_cold_loads_parse_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.csv");
    write_csv(&path, "alo,height\nA,170\nB,165\nA,181\n");

    let loader = DatasetLoader::new(&path, InvalidationPolicy::ContentHash);
    let datasets: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| loader.load().unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(loader.load_count(), 1);
    assert!(datasets.iter().all(|ds| Arc::ptr_eq(ds, &datasets[0])));
}
