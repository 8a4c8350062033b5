/// Shared helpers: synthetic tab-separated recordings and batch options.
use std::io::Write;
use std::path::{Path, PathBuf};

use eegprep::BatchOptions;

pub const SAMPLE_RATE: f64 = 512.0;

/// Write a three-channel recording of `n_samples` rows, amplitudes in
/// microvolts. Deterministic, no exact-zero samples (the DC offsets keep
/// every value away from the auto-rejection mask).
#[allow(unused)]
pub fn write_recording(dir: &Path, name: &str, n_samples: usize) -> PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "Fp1\tFp2\tCz").unwrap();
    for t in 0..n_samples {
        let t = t as f64;
        let a = 12.0 + (t * 0.0831).sin() * 6.0;
        let b = -7.0 + (t * 0.2113).sin() * 4.0 + (t * 0.0127).cos() * 2.0;
        let c = 20.0 + (t * 0.1409).cos() * 5.0;
        writeln!(f, "{a:.6}\t{b:.6}\t{c:.6}").unwrap();
    }
    path
}

/// Options used across the integration tests: no optional stages, average
/// referencing off so the synthetic signals keep their DC offsets.
#[allow(unused)]
pub fn base_options(root: &Path) -> BatchOptions {
    BatchOptions {
        apply_average_ref: false,
        text_sample_rate: Some(SAMPLE_RATE),
        output_root: root.to_path_buf(),
        ..BatchOptions::default()
    }
}
