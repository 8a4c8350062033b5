mod common;

use std::fs;
use std::path::Path;

use common::{base_options, write_recording, SAMPLE_RATE};
use eegprep::{
    Batch, BatchSummary, FileDecisions, FileOutcome, PipelineError, ReplayOperator, RunRecord,
    ScriptedOperator, SelectionMode, TextTableReader,
};

fn exported_files(subdir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut out: Vec<(String, Vec<u8>)> = fs::read_dir(subdir)
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            (
                e.file_name().to_string_lossy().into_owned(),
                fs::read(e.path()).unwrap(),
            )
        })
        .collect();
    out.sort();
    out
}

#[test]
fn replayed_batch_reproduces_exports_bit_for_bit() {
    let dir = tempfile::tempdir().unwrap();
    // 16 s at 512 Hz: resamples to 256 Hz and segments into 8 × 2 s epochs.
    let input = write_recording(dir.path(), "subj.txt", 8192);
    let reader = TextTableReader { sample_rate: SAMPLE_RATE };

    let fresh_root = dir.path().join("fresh");
    let mut options = base_options(&fresh_root);
    options.epoch_length_secs = 2.0;
    options.bands = vec!["delta".into(), "alpha".into()];

    let mut operator = ScriptedOperator::default().with_file(
        "subj.txt",
        FileDecisions {
            selected_epochs: Some(vec![0, 2, 5]),
            ..FileDecisions::default()
        },
    );
    let mut batch = Batch::new(options, &reader, &mut operator, None).unwrap();
    let summary = batch.run(&[input.clone()]).unwrap();
    assert_eq!(summary, BatchSummary { completed: 1, skipped: 0, failed: 0 });
    let record_path = batch.record_path().to_path_buf();

    // Replay into a different root, answering every prompt from the record.
    let replay_root = dir.path().join("replay");
    let mut record = RunRecord::load(&record_path).unwrap();
    record.options.output_root = replay_root.clone();
    let oracle = record.clone();
    let mut operator = ReplayOperator::new(&oracle);
    let mut batch = Batch::resume(record, &reader, &mut operator, None).unwrap();
    let summary = batch.run(&[input]).unwrap();
    assert_eq!(summary, BatchSummary { completed: 1, skipped: 0, failed: 0 });

    let fresh = exported_files(&fresh_root.join("subjtxt"));
    let replayed = exported_files(&replay_root.join("subjtxt"));
    assert!(!fresh.is_empty());
    assert_eq!(fresh, replayed);

    // The replayed record carries the same decisions.
    let replayed_record = RunRecord::load(batch.record_path()).unwrap();
    assert_eq!(
        replayed_record.files["subj.txt"].selected_epochs,
        Some(vec![0, 2, 5])
    );
}

#[test]
fn replay_against_shorter_file_surfaces_the_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let long = write_recording(&make_subdir(dir.path(), "long"), "subj.txt", 8192);
    let reader = TextTableReader { sample_rate: SAMPLE_RATE };

    let fresh_root = dir.path().join("fresh");
    let mut options = base_options(&fresh_root);
    options.epoch_length_secs = 2.0;
    options.bands = vec!["unfiltered".into()];

    let mut operator = ScriptedOperator::default().with_file(
        "subj.txt",
        FileDecisions {
            selected_epochs: Some(vec![0, 2, 5]),
            ..FileDecisions::default()
        },
    );
    let mut batch = Batch::new(options, &reader, &mut operator, None).unwrap();
    batch.run(&[long]).unwrap();
    let record_path = batch.record_path().to_path_buf();

    // Same file name, half the data: only 4 epochs now, so replayed index 5
    // must fail loudly instead of being clamped.
    let short = write_recording(&make_subdir(dir.path(), "short"), "subj.txt", 4096);
    let mut record = RunRecord::load(&record_path).unwrap();
    record.options.output_root = dir.path().join("replay");
    let oracle = record.clone();
    let mut operator = ReplayOperator::new(&oracle);
    let mut batch = Batch::resume(record, &reader, &mut operator, None).unwrap();

    match batch.process_file(&short) {
        FileOutcome::Failed(PipelineError::Validation(_)) => {}
        other => panic!("expected a validation failure, got {other:?}"),
    }
}

#[test]
fn auto_selected_record_replays_the_recorded_indices_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let long = write_recording(&make_subdir(dir.path(), "long"), "subj.txt", 8192);
    let reader = TextTableReader { sample_rate: SAMPLE_RATE };

    // Fresh run with automatic dispersion-based selection: 8 × 2 s epochs,
    // all clean, so all eight indices land in the record.
    let mut options = base_options(&dir.path().join("fresh"));
    options.selection_mode = SelectionMode::Auto;
    options.epoch_length_secs = 2.0;
    options.bands = vec!["unfiltered".into()];

    let mut operator = ScriptedOperator::default();
    let mut batch = Batch::new(options, &reader, &mut operator, None).unwrap();
    let summary = batch.run(&[long]).unwrap();
    assert_eq!(summary, BatchSummary { completed: 1, skipped: 0, failed: 0 });
    let record_path = batch.record_path().to_path_buf();

    let recorded = RunRecord::load(&record_path).unwrap();
    assert_eq!(
        recorded.files["subj.txt"].selected_epochs,
        Some((0..8).collect())
    );

    // Same name, half the samples: only 4 epochs exist now. A replay must
    // read the recorded indices as-is and reject the out-of-range ones, not
    // quietly rerun the automatic selection on the shorter data.
    let short = write_recording(&make_subdir(dir.path(), "short"), "subj.txt", 4096);
    let mut record = recorded.clone();
    record.options.output_root = dir.path().join("replay");
    let oracle = record.clone();
    let mut operator = ReplayOperator::new(&oracle);
    let mut batch = Batch::resume(record, &reader, &mut operator, None).unwrap();

    match batch.process_file(&short) {
        FileOutcome::Failed(PipelineError::Validation(_)) => {}
        other => panic!("expected a validation failure, got {other:?}"),
    }

    // And a record whose stored selection was narrowed by hand replays that
    // narrowed selection, even though a rerun would keep all eight epochs.
    let mut record = recorded;
    record.options.output_root = dir.path().join("narrowed");
    record.files.get_mut("subj.txt").unwrap().selected_epochs = Some(vec![0, 3]);
    let oracle = record.clone();
    let mut operator = ReplayOperator::new(&oracle);
    let mut batch = Batch::resume(record, &reader, &mut operator, None).unwrap();
    let long_again = dir.path().join("long").join("subj.txt");
    let summary = batch.run(&[long_again]).unwrap();
    assert_eq!(summary, BatchSummary { completed: 1, skipped: 0, failed: 0 });

    let names: Vec<String> = exported_files(&dir.path().join("narrowed").join("subjtxt"))
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(
        names,
        vec![
            "subj_Sensor_level_unfiltered_Epoch_1.txt",
            "subj_Sensor_level_unfiltered_Epoch_2.txt",
        ]
    );
}

#[test]
fn replay_of_a_file_never_recorded_fails_with_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_recording(dir.path(), "unseen.txt", 4096);
    let reader = TextTableReader { sample_rate: SAMPLE_RATE };

    let mut options = base_options(&dir.path().join("out"));
    options.bands = vec!["unfiltered".into()];
    let record = RunRecord::start_batch(options);

    let oracle = record.clone();
    let mut operator = ReplayOperator::new(&oracle);
    let mut batch = Batch::resume(record, &reader, &mut operator, None).unwrap();

    match batch.process_file(&input) {
        FileOutcome::Failed(PipelineError::NotFound(_)) => {}
        other => panic!("expected a not-found failure, got {other:?}"),
    }
}

fn make_subdir(base: &Path, name: &str) -> std::path::PathBuf {
    let p = base.join(name);
    fs::create_dir_all(&p).unwrap();
    p
}
