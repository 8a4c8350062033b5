//! Bad-channel handling: marking, spatial interpolation, dropping.
//!
//! Interpolation replaces each bad channel with a weighted sum of the good
//! channels, weights falling off with squared distance between electrode
//! positions. Sample and channel counts are preserved; only bad rows change;
//! the bad set is cleared afterwards because the rows are now synthetic
//! estimates rather than unreliable data.
use std::collections::BTreeSet;

use crate::buffer::SignalBuffer;
use crate::error::{PipelineError, Result};

/// Fewest channels a buffer may be left with after a drop.
pub const MIN_CHANNELS: usize = 2;

/// Return a copy of `buffer` with `bad` as its bad-channel set.
///
/// Data rows are untouched. Every name must exist in the current channel set.
pub fn mark_bad(buffer: &SignalBuffer, bad: &BTreeSet<String>) -> Result<SignalBuffer> {
    buffer.check_channels_known(bad)?;
    let mut out = buffer.clone();
    out.bad_channels = bad.clone();
    Ok(out)
}

/// Replace every bad channel with a weighted estimate from the good
/// channels, then clear the bad set.
///
/// With `channel_positions` attached, the weights fall off with squared
/// electrode distance. Without positions (text-table recordings carry none)
/// every good channel weighs equally, so the estimate is the good-channel
/// mean. Fails with `ConfigurationError` when no good channels remain. A
/// buffer with no bad channels is returned as a plain copy.
pub fn interpolate_bad(buffer: &SignalBuffer) -> Result<SignalBuffer> {
    let mut out = buffer.clone();
    if buffer.bad_channels.is_empty() {
        return Ok(out);
    }

    let good = buffer.good_indices();
    if good.is_empty() {
        return Err(PipelineError::config(
            "no good channels left to interpolate from",
        ));
    }

    for bad_name in &buffer.bad_channels {
        // Known to exist: bad_channels ⊆ channel_names.
        let bi = buffer
            .channel_index(bad_name)
            .expect("bad channel not in channel set");

        let mut weights: Vec<f64> = match buffer.channel_positions.as_ref() {
            // Inverse-square-distance weights over the good channels.
            Some(positions) => {
                let bp = positions[bi];
                good.iter()
                    .map(|&gi| {
                        let gp = positions[gi];
                        let d2 = (bp[0] - gp[0]).powi(2)
                            + (bp[1] - gp[1]).powi(2)
                            + (bp[2] - gp[2]).powi(2);
                        1.0 / (d2 + 1e-12)
                    })
                    .collect()
            }
            None => vec![1.0; good.len()],
        };
        let total: f64 = weights.iter().sum();
        weights.iter_mut().for_each(|w| *w /= total);

        let n_t = buffer.n_samples();
        for t in 0..n_t {
            let mut v = 0.0;
            for (w, &gi) in weights.iter().zip(&good) {
                v += w * buffer.samples[[gi, t]];
            }
            out.samples[[bi, t]] = v;
        }
    }

    out.bad_channels.clear();
    Ok(out)
}

/// Remove the named channels entirely (rows, names, positions).
///
/// Fails with `ConfigurationError` when a name is unknown or when fewer than
/// [`MIN_CHANNELS`] channels would remain. An empty set returns a copy.
pub fn drop_channels(buffer: &SignalBuffer, to_drop: &BTreeSet<String>) -> Result<SignalBuffer> {
    if to_drop.is_empty() {
        return Ok(buffer.clone());
    }
    for name in to_drop {
        if buffer.channel_index(name).is_none() {
            return Err(PipelineError::config(format!(
                "cannot drop unknown channel '{name}'"
            )));
        }
    }
    let keep: Vec<usize> = buffer
        .channel_names
        .iter()
        .enumerate()
        .filter(|(_, n)| !to_drop.contains(*n))
        .map(|(i, _)| i)
        .collect();
    if keep.len() < MIN_CHANNELS {
        return Err(PipelineError::config(format!(
            "dropping {} channels would leave {} (< {MIN_CHANNELS})",
            to_drop.len(),
            keep.len()
        )));
    }

    let samples = buffer.samples.select(ndarray::Axis(0), &keep);
    let channel_names: Vec<String> = keep
        .iter()
        .map(|&i| buffer.channel_names[i].clone())
        .collect();
    let channel_positions = buffer
        .channel_positions
        .as_ref()
        .map(|pos| keep.iter().map(|&i| pos[i]).collect());
    let bad_channels = buffer
        .bad_channels
        .iter()
        .filter(|n| !to_drop.contains(*n))
        .cloned()
        .collect();

    Ok(SignalBuffer {
        samples,
        sample_rate: buffer.sample_rate,
        channel_names,
        channel_positions,
        bad_channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn test_buffer() -> SignalBuffer {
        let data = Array2::from_shape_fn((4, 16), |(c, t)| (c * 16 + t) as f64);
        let names = vec!["Fp1".into(), "Fp2".into(), "Cz".into(), "Oz".into()];
        SignalBuffer::new(data, 256.0, names)
            .unwrap()
            .with_positions(vec![
                [-0.3, 0.9, 0.3],
                [0.3, 0.9, 0.3],
                [0.0, 0.0, 1.0],
                [0.0, -0.9, 0.4],
            ])
            .unwrap()
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mark_bad_rejects_unknown() {
        let buf = test_buffer();
        assert!(matches!(
            mark_bad(&buf, &set(&["Nope"])),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn mark_bad_keeps_rows() {
        let buf = test_buffer();
        let marked = mark_bad(&buf, &set(&["Cz"])).unwrap();
        assert_eq!(marked.n_channels(), 4);
        assert_eq!(marked.samples, buf.samples);
        assert!(marked.bad_channels.contains("Cz"));
    }

    #[test]
    fn interpolate_changes_only_bad_rows_and_clears_bads() {
        let buf = test_buffer();
        let marked = mark_bad(&buf, &set(&["Fp2"])).unwrap();
        let fixed = interpolate_bad(&marked).unwrap();
        assert_eq!(fixed.n_channels(), 4);
        assert_eq!(fixed.n_samples(), 16);
        assert!(fixed.bad_channels.is_empty());
        // Good rows byte-identical.
        for &g in &[0usize, 2, 3] {
            assert_eq!(fixed.samples.row(g), buf.samples.row(g));
        }
        // Interpolated row is a convex combination of good rows, so it stays
        // within their range at each time point.
        for t in 0..16 {
            let v = fixed.samples[[1, t]];
            let lo = [0usize, 2, 3]
                .iter()
                .map(|&g| buf.samples[[g, t]])
                .fold(f64::INFINITY, f64::min);
            let hi = [0usize, 2, 3]
                .iter()
                .map(|&g| buf.samples[[g, t]])
                .fold(f64::NEG_INFINITY, f64::max);
            assert!(v >= lo - 1e-9 && v <= hi + 1e-9);
        }
    }

    #[test]
    fn interpolate_without_positions_uses_good_channel_mean() {
        let data = Array2::from_shape_fn((3, 8), |(c, t)| (c * 10) as f64 + t as f64);
        let names = vec!["A".into(), "B".into(), "C".into()];
        let mut buf = SignalBuffer::new(data, 256.0, names).unwrap();
        buf.bad_channels.insert("B".into());
        let fixed = interpolate_bad(&buf).unwrap();
        assert!(fixed.bad_channels.is_empty());
        for t in 0..8 {
            let mean = (buf.samples[[0, t]] + buf.samples[[2, t]]) / 2.0;
            assert!((fixed.samples[[1, t]] - mean).abs() < 1e-12);
        }
    }

    #[test]
    fn interpolate_without_good_channels_fails() {
        let data = Array2::zeros((2, 8));
        let names = vec!["A".into(), "B".into()];
        let mut buf = SignalBuffer::new(data, 256.0, names).unwrap();
        buf.bad_channels.insert("A".into());
        buf.bad_channels.insert("B".into());
        assert!(matches!(
            interpolate_bad(&buf),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn drop_unknown_channel_fails() {
        let buf = test_buffer();
        assert!(drop_channels(&buf, &set(&["XX"])).is_err());
    }

    #[test]
    fn drop_below_floor_fails() {
        let buf = test_buffer();
        assert!(drop_channels(&buf, &set(&["Fp1", "Fp2", "Cz"])).is_err());
    }

    #[test]
    fn drop_removes_rows_names_positions() {
        let buf = test_buffer();
        let out = drop_channels(&buf, &set(&["Fp1", "Oz"])).unwrap();
        assert_eq!(out.channel_names, vec!["Fp2".to_string(), "Cz".to_string()]);
        assert_eq!(out.n_channels(), 2);
        assert_eq!(out.channel_positions.as_ref().unwrap().len(), 2);
        assert_eq!(out.samples.row(0), buf.samples.row(1));
    }
}
