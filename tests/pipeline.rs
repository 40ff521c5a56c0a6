use food_splitter::copy::{copy_files_in_parallel, CopyJob};
use food_splitter::io::{rollback_publish, PREVIOUS_DIR, STAGING_DIR};
use food_splitter::types::OutputDirs;
use food_splitter::utils::create_io_thread_pool;
use food_splitter::{
    analyze_dataset, prepare_splits, ClassManifest, DatasetInfo, Split, SplitConfig, SplitError,
    SplitRatios, CLASS_INDICES_FILE, DATASET_INFO_FILE,
};
use indicatif::ProgressBar;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Build `root/raw/<category>/<category>_NNN.jpg` with unique contents.
fn make_source(root: &Path, categories: &[(&str, usize)]) -> PathBuf {
    let source = root.join("raw");
    for (name, count) in categories {
        let dir = source.join(name);
        fs::create_dir_all(&dir).unwrap();
        for i in 0..*count {
            let ext = if i % 2 == 0 { "jpg" } else { "png" };
            fs::write(
                dir.join(format!("{}_{:03}.{}", name, i, ext)),
                format!("{}-{}", name, i),
            )
            .unwrap();
        }
    }
    source
}

fn config(train: f64, validation: f64, test: f64, min_samples: usize) -> SplitConfig {
    SplitConfig {
        ratios: SplitRatios::new(train, validation, test).unwrap(),
        min_samples,
        seed: 42,
        workers: 2,
        dry_run: false,
    }
}

fn file_names(dir: &Path) -> BTreeSet<String> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => BTreeSet::new(),
    }
}

/// Every file under `root`, relative path to contents.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                files.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    files
}

#[test]
fn test_worked_example() {
    let temp_dir = TempDir::new().unwrap();
    let source = make_source(
        temp_dir.path(),
        &[("biryani", 12), ("idli", 8), ("dosa", 15)],
    );
    let destination = temp_dir.path().join("datasets");

    let summary = prepare_splits(&source, &destination, &config(0.8, 0.2, 0.0, 10)).unwrap();

    assert_eq!(summary.excluded.len(), 1);
    assert_eq!(summary.excluded[0].name, "idli");
    assert_eq!(summary.excluded[0].count, 8);
    assert!(summary.skipped_files.is_empty());

    assert_eq!(file_names(&destination.join("train/biryani")).len(), 9);
    assert_eq!(file_names(&destination.join("validation/biryani")).len(), 3);
    assert_eq!(file_names(&destination.join("test/biryani")).len(), 0);
    assert_eq!(file_names(&destination.join("train/dosa")).len(), 12);
    assert_eq!(file_names(&destination.join("validation/dosa")).len(), 3);

    for split in Split::ALL {
        assert!(!destination.join(split.dir_name()).join("idli").exists());
    }

    let manifest = ClassManifest::load(&destination.join(CLASS_INDICES_FILE)).unwrap();
    assert_eq!(manifest.classes, vec!["biryani", "dosa"]);
    assert_eq!(manifest.num_classes, 2);
    assert_eq!(manifest.index_of("biryani"), Some(0));
    assert_eq!(manifest.index_of("dosa"), Some(1));
    assert_eq!(manifest, summary.manifest);
}

#[test]
fn test_partition_is_complete_and_disjoint() {
    let temp_dir = TempDir::new().unwrap();
    let source = make_source(temp_dir.path(), &[("samosa", 31), ("naan", 17)]);
    let destination = temp_dir.path().join("out");

    let summary = prepare_splits(&source, &destination, &config(0.7, 0.2, 0.1, 1)).unwrap();

    for (name, total) in [("samosa", 31usize), ("naan", 17)] {
        let train = file_names(&destination.join("train").join(name));
        let val = file_names(&destination.join("validation").join(name));
        let test = file_names(&destination.join("test").join(name));

        assert!(train.is_disjoint(&val));
        assert!(train.is_disjoint(&test));
        assert!(val.is_disjoint(&test));

        let union: BTreeSet<_> = train.iter().chain(&val).chain(&test).cloned().collect();
        assert_eq!(union, file_names(&source.join(name)));

        let (train_end, val_end) = SplitRatios::new(0.7, 0.2, 0.1).unwrap().boundaries(total);
        assert_eq!(train.len(), train_end);
        assert_eq!(val.len(), val_end - train_end);
        assert_eq!(test.len(), total - val_end);

        let counts = summary.counts[name];
        assert_eq!(counts.train + counts.validation + counts.test, total);
    }
}

#[test]
fn test_copied_files_keep_name_and_contents() {
    let temp_dir = TempDir::new().unwrap();
    let source = make_source(temp_dir.path(), &[("dal", 5)]);
    let destination = temp_dir.path().join("out");

    prepare_splits(&source, &destination, &config(1.0, 0.0, 0.0, 1)).unwrap();

    for name in file_names(&source.join("dal")) {
        let copied = destination.join("train/dal").join(&name);
        assert_eq!(
            fs::read(&copied).unwrap(),
            fs::read(source.join("dal").join(&name)).unwrap()
        );
    }
}

#[test]
fn test_same_seed_same_assignment() {
    let temp_dir = TempDir::new().unwrap();
    let source = make_source(temp_dir.path(), &[("biryani", 40), ("dosa", 25)]);
    let first = temp_dir.path().join("first");
    let second = temp_dir.path().join("second");

    prepare_splits(&source, &first, &config(0.7, 0.2, 0.1, 1)).unwrap();
    prepare_splits(&source, &second, &config(0.7, 0.2, 0.1, 1)).unwrap();

    assert_eq!(snapshot(&first), snapshot(&second));
}

#[test]
fn test_different_seed_changes_assignment() {
    let temp_dir = TempDir::new().unwrap();
    let source = make_source(temp_dir.path(), &[("biryani", 40)]);
    let first = temp_dir.path().join("first");
    let second = temp_dir.path().join("second");

    let mut other = config(0.7, 0.2, 0.1, 1);
    other.seed = 7;
    prepare_splits(&source, &first, &config(0.7, 0.2, 0.1, 1)).unwrap();
    prepare_splits(&source, &second, &other).unwrap();

    assert_ne!(
        file_names(&first.join("train/biryani")),
        file_names(&second.join("train/biryani"))
    );
}

#[test]
fn test_rerun_replaces_previous_output() {
    let temp_dir = TempDir::new().unwrap();
    let source = make_source(temp_dir.path(), &[("idli", 20), ("vada", 20)]);
    let destination = temp_dir.path().join("out");

    prepare_splits(&source, &destination, &config(0.7, 0.2, 0.1, 1)).unwrap();
    let before = snapshot(&destination);

    // Stale files from an older run must not survive.
    fs::write(destination.join("train/idli/stale.jpg"), b"old").unwrap();
    fs::create_dir_all(destination.join("test/removed_class")).unwrap();

    prepare_splits(&source, &destination, &config(0.7, 0.2, 0.1, 1)).unwrap();

    assert_eq!(snapshot(&destination), before);
    assert!(!destination.join(STAGING_DIR).exists());
    assert!(!destination.join(PREVIOUS_DIR).exists());
}

#[test]
fn test_unrelated_destination_entries_are_kept() {
    let temp_dir = TempDir::new().unwrap();
    // Source lives next to the outputs, as in datasets/raw + datasets/train.
    let root = temp_dir.path().join("datasets");
    let source = make_source(&root, &[("roti", 10)]);
    fs::write(root.join("notes.txt"), b"keep me").unwrap();

    prepare_splits(&source, &root, &config(0.7, 0.2, 0.1, 1)).unwrap();
    prepare_splits(&source, &root, &config(0.7, 0.2, 0.1, 1)).unwrap();

    assert_eq!(fs::read(root.join("notes.txt")).unwrap(), b"keep me");
    assert_eq!(file_names(&source.join("roti")).len(), 10);
    assert_eq!(file_names(&root.join("train/roti")).len(), 7);
}

#[test]
fn test_non_images_and_hidden_entries_are_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let source = make_source(temp_dir.path(), &[("poha", 4)]);
    fs::write(source.join("poha/labels.csv"), b"x").unwrap();
    fs::write(source.join("poha/.hidden.jpg"), b"x").unwrap();
    fs::create_dir_all(source.join(".cache")).unwrap();
    fs::write(source.join(".cache/thumb.jpg"), b"x").unwrap();
    fs::write(source.join("stray.jpg"), b"x").unwrap();

    let stats = analyze_dataset(&source).unwrap();
    assert_eq!(stats.num_categories(), 1);
    assert_eq!(stats.category_counts["poha"], 4);
    assert_eq!(stats.total_images, 4);
}

#[test]
fn test_analyze_dataset_reports_counts() {
    let temp_dir = TempDir::new().unwrap();
    let source = make_source(temp_dir.path(), &[("biryani", 12), ("idli", 8), ("dosa", 15)]);

    let stats = analyze_dataset(&source).unwrap();

    assert_eq!(stats.num_categories(), 3);
    assert_eq!(stats.total_images, 35);
    assert!((stats.average_per_category() - 35.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.smallest(), Some(("idli", 8)));
    assert_eq!(stats.largest(), Some(("dosa", 15)));
}

#[test]
fn test_dry_run_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let source = make_source(temp_dir.path(), &[("upma", 10), ("vada", 3)]);
    let destination = temp_dir.path().join("out");

    let mut dry = config(0.7, 0.2, 0.1, 5);
    dry.dry_run = true;
    let summary = prepare_splits(&source, &destination, &dry).unwrap();

    assert!(!destination.exists());
    assert!(summary.dry_run);
    assert_eq!(summary.manifest.classes, vec!["upma"]);
    assert_eq!(summary.counts["upma"].train, 7);
    assert_eq!(summary.excluded[0].name, "vada");
}

#[test]
fn test_dataset_info_records_provenance() {
    let temp_dir = TempDir::new().unwrap();
    let source = make_source(temp_dir.path(), &[("paneer", 10), ("rajma", 2)]);
    let destination = temp_dir.path().join("out");

    prepare_splits(&source, &destination, &config(0.7, 0.2, 0.1, 5)).unwrap();

    let info = DatasetInfo::load(&destination.join(DATASET_INFO_FILE)).unwrap();
    assert_eq!(info.classes, vec!["paneer"]);
    assert_eq!(info.splits, Split::ALL.to_vec());
    assert_eq!(info.seed, 42);
    assert_eq!(info.min_samples, 5);
    assert_eq!(info.counts["paneer"].train, 7);
    assert_eq!(info.counts["paneer"].validation, 2);
    assert_eq!(info.counts["paneer"].test, 1);
    assert_eq!(info.excluded["rajma"], 2);
}

#[test]
fn test_missing_source_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("out");

    let err = prepare_splits(
        &temp_dir.path().join("does-not-exist"),
        &destination,
        &config(0.7, 0.2, 0.1, 1),
    )
    .unwrap_err();

    assert!(matches!(err, SplitError::NotFound { .. }));
    assert!(!destination.exists());
}

#[test]
fn test_bad_ratios_abort_before_writing() {
    let temp_dir = TempDir::new().unwrap();
    let source = make_source(temp_dir.path(), &[("chole", 10)]);
    let destination = temp_dir.path().join("out");

    let mut bad = config(0.7, 0.2, 0.1, 1);
    bad.ratios.test = 0.5;
    let err = prepare_splits(&source, &destination, &bad).unwrap_err();

    assert!(matches!(err, SplitError::InvalidConfiguration(_)));
    assert!(!destination.exists());
}

#[test]
fn test_no_surviving_category_is_empty_result() {
    let temp_dir = TempDir::new().unwrap();
    let source = make_source(temp_dir.path(), &[("idli", 3), ("dosa", 4)]);
    let destination = temp_dir.path().join("out");

    // A previous good run must stay intact.
    prepare_splits(&source, &destination, &config(0.7, 0.2, 0.1, 1)).unwrap();
    let before = snapshot(&destination);

    let err = prepare_splits(&source, &destination, &config(0.7, 0.2, 0.1, 10)).unwrap_err();

    match err {
        SplitError::EmptyResult {
            min_samples,
            scanned,
        } => {
            assert_eq!(min_samples, 10);
            assert_eq!(scanned, 2);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(snapshot(&destination), before);
}

#[test]
fn test_destination_inside_source_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let source = make_source(temp_dir.path(), &[("naan", 10)]);

    let err = prepare_splits(&source, &source.join("splits"), &config(0.7, 0.2, 0.1, 1))
        .unwrap_err();
    assert!(matches!(err, SplitError::InvalidConfiguration(_)));

    let err = prepare_splits(&source, &source, &config(0.7, 0.2, 0.1, 1)).unwrap_err();
    assert!(matches!(err, SplitError::InvalidConfiguration(_)));
}

#[test]
fn test_copy_failures_are_reported_in_job_order() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("src");
    let dst = temp_dir.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    fs::write(src.join("a.jpg"), b"a").unwrap();
    fs::write(src.join("b.jpg"), b"b").unwrap();

    let job = |name: &str| CopyJob {
        source: src.join(name),
        destination: dst.join(name),
    };
    let jobs = vec![job("a.jpg"), job("missing.jpg"), job("b.jpg"), job("gone.png")];

    let pool = create_io_thread_pool(2).unwrap();
    let pb = ProgressBar::hidden();
    let failures = copy_files_in_parallel(&jobs, &pool, &pb);

    let failed: Vec<_> = failures
        .iter()
        .map(|f| f.source.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(failed, vec!["missing.jpg", "gone.png"]);
    assert_eq!(failures[0].destination, dst.join("missing.jpg"));
    assert!(!failures[0].reason.is_empty());

    assert_eq!(fs::read(dst.join("a.jpg")).unwrap(), b"a");
    assert_eq!(fs::read(dst.join("b.jpg")).unwrap(), b"b");
    assert_eq!(pb.position(), 4);
}

#[test]
fn test_failed_publish_keeps_previous_output_and_cleans_staging() {
    let temp_dir = TempDir::new().unwrap();
    let source = make_source(temp_dir.path(), &[("dosa", 10)]);
    let destination = temp_dir.path().join("out");

    prepare_splits(&source, &destination, &config(0.7, 0.2, 0.1, 1)).unwrap();
    // A regular file where the previous-run directory goes blocks publishing.
    fs::write(destination.join(PREVIOUS_DIR), b"blocker").unwrap();
    let before = snapshot(&destination);

    let mut reseeded = config(0.7, 0.2, 0.1, 1);
    reseeded.seed = 9;
    let err = prepare_splits(&source, &destination, &reseeded).unwrap_err();

    assert!(matches!(err, SplitError::Io { .. }));
    assert!(!destination.join(STAGING_DIR).exists());
    assert_eq!(snapshot(&destination), before);
}

#[test]
fn test_rollback_publish_withdraws_new_entries_and_restores_parked() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("out");
    let output_dirs = OutputDirs {
        root: root.clone(),
        staging: root.join(STAGING_DIR),
        previous: root.join(PREVIOUS_DIR),
    };

    // `train` had no earlier version; the manifest did.
    fs::create_dir_all(root.join("train/idli")).unwrap();
    fs::write(root.join("train/idli/a.jpg"), b"new").unwrap();
    fs::write(root.join(CLASS_INDICES_FILE), b"new").unwrap();
    fs::create_dir_all(&output_dirs.previous).unwrap();
    fs::write(output_dirs.previous.join(CLASS_INDICES_FILE), b"old").unwrap();
    fs::write(root.join("notes.txt"), b"keep").unwrap();

    rollback_publish(
        &output_dirs,
        &[CLASS_INDICES_FILE],
        &["train", CLASS_INDICES_FILE],
    );

    assert!(!root.join("train").exists());
    assert_eq!(fs::read(root.join(CLASS_INDICES_FILE)).unwrap(), b"old");
    assert_eq!(fs::read(root.join("notes.txt")).unwrap(), b"keep");
    assert!(!output_dirs.previous.exists());
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_source_is_invalid_configuration() {
    use food_splitter::scan_categories;
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join(OsStr::from_bytes(b"raw\xff"));
    fs::create_dir_all(source.join("dosa")).unwrap();
    fs::write(source.join("dosa/a.jpg"), b"a").unwrap();

    assert!(matches!(
        scan_categories(&source),
        Err(SplitError::InvalidConfiguration(_))
    ));

    let destination = temp_dir.path().join("out");
    let err = prepare_splits(&source, &destination, &config(0.7, 0.2, 0.1, 1)).unwrap_err();
    assert!(matches!(err, SplitError::InvalidConfiguration(_)));
    assert!(!destination.exists());
}
