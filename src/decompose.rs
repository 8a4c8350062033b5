//! Decomposition-based artifact removal.
//!
//! Two-phase stage: [`Decomposition::fit`] computes a linear unmixing over
//! the *good* channels of a cleaned copy; [`Decomposition::apply`] projects a
//! target buffer onto the fitted components, zeroes the operator-excluded
//! ones and reconstructs the sensor signal. Fit and apply deliberately take
//! different buffers: the usual pattern is to fit on a 1–45 Hz filtered,
//! interpolated copy and apply the exclusions to the broadband output signal.
//!
//! The unmixing is a principal-component decomposition: eigenvectors of the
//! channel covariance, ordered by descending eigenvalue, with a fixed sign
//! convention (largest-magnitude coefficient positive) so repeated fits on
//! identical input are bit-identical.
use std::collections::BTreeSet;

use nalgebra::{DMatrix, DVector};

use crate::buffer::SignalBuffer;
use crate::error::{PipelineError, Result};

/// A fitted linear decomposition over a fixed set of fit channels.
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Component vectors as columns, `[n_fit_channels, k]`.
    components: DMatrix<f64>,
    /// Names of the channels the decomposition was fit on (good channels of
    /// the fit buffer, in row order).
    fit_channels: Vec<String>,
    /// Fraction of total variance captured by each component, descending.
    explained_variance: Vec<f64>,
}

impl Decomposition {
    /// Fit `k` components on the good channels of `buffer`.
    ///
    /// Bad channels are excluded from the fit entirely. Fails with
    /// `ConfigurationError` unless `1 <= k < n_good_channels`.
    pub fn fit(buffer: &SignalBuffer, k: usize) -> Result<Self> {
        let good = buffer.good_indices();
        let n_good = good.len();
        if k < 1 || k >= n_good {
            return Err(PipelineError::config(format!(
                "component count {k} must be in 1..{n_good} (good channels)"
            )));
        }
        let n_t = buffer.n_samples();
        if n_t < 2 {
            return Err(PipelineError::config("too few samples to fit a decomposition"));
        }

        // Row-centred good-channel matrix. Non-finite samples would poison
        // the eigendecomposition, so they are rejected up front.
        let mut x = DMatrix::<f64>::zeros(n_good, n_t);
        for (r, &gi) in good.iter().enumerate() {
            let row = buffer.samples.row(gi);
            if row.iter().any(|v| !v.is_finite()) {
                return Err(PipelineError::config(format!(
                    "channel {} contains NaN or infinite samples",
                    buffer.channel_names[gi]
                )));
            }
            let mean = row.sum() / n_t as f64;
            for t in 0..n_t {
                x[(r, t)] = row[t] - mean;
            }
        }

        // Channel covariance and its eigendecomposition.
        let cov = (&x * x.transpose()) / n_t as f64;
        let eig = cov.symmetric_eigen();

        // Order by descending eigenvalue.
        let mut order: Vec<usize> = (0..n_good).collect();
        order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

        let total_var: f64 = eig.eigenvalues.iter().filter(|v| **v > 0.0).sum();
        let mut components = DMatrix::<f64>::zeros(n_good, k);
        let mut explained_variance = Vec::with_capacity(k);
        for (c, &oi) in order.iter().take(k).enumerate() {
            let mut v: DVector<f64> = eig.eigenvectors.column(oi).into();
            // Sign convention for reproducibility.
            let dominant = v
                .iter()
                .fold(0.0_f64, |acc, &w| if w.abs() > acc.abs() { w } else { acc });
            if dominant < 0.0 {
                v.neg_mut();
            }
            components.set_column(c, &v);
            let var = eig.eigenvalues[oi].max(0.0);
            explained_variance.push(if total_var > 0.0 { var / total_var } else { 0.0 });
        }

        Ok(Self {
            components,
            fit_channels: good.iter().map(|&i| buffer.channel_names[i].clone()).collect(),
            explained_variance,
        })
    }

    /// Number of fitted components.
    pub fn n_components(&self) -> usize {
        self.components.ncols()
    }

    /// Per-component fraction of variance (descending), for operator review.
    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    /// Remove the contribution of `excluded` components from `target`.
    ///
    /// `target` may be filtered differently from the fit buffer but must
    /// contain every fit channel. Only the fit channels' rows change; the
    /// remainder of the buffer passes through. An empty exclusion set returns
    /// a copy. Fails with `ValidationError` when an index is `>= k` or a fit
    /// channel is missing from the target.
    pub fn apply(&self, target: &SignalBuffer, excluded: &BTreeSet<usize>) -> Result<SignalBuffer> {
        let k = self.n_components();
        for &idx in excluded {
            if idx >= k {
                return Err(PipelineError::validation(format!(
                    "excluded component index {idx} out of range (k = {k})"
                )));
            }
        }
        let mut out = target.clone();
        if excluded.is_empty() {
            return Ok(out);
        }

        let rows: Vec<usize> = self
            .fit_channels
            .iter()
            .map(|name| {
                target.channel_index(name).ok_or_else(|| {
                    PipelineError::validation(format!(
                        "fit channel '{name}' missing from target buffer"
                    ))
                })
            })
            .collect::<Result<_>>()?;

        let n_fit = rows.len();
        let n_t = target.n_samples();

        // Row-centred fit-channel matrix of the target.
        let mut y = DMatrix::<f64>::zeros(n_fit, n_t);
        let mut means = vec![0.0_f64; n_fit];
        for (r, &ti) in rows.iter().enumerate() {
            let row = target.samples.row(ti);
            let mean = row.sum() / n_t as f64;
            means[r] = mean;
            for t in 0..n_t {
                y[(r, t)] = row[t] - mean;
            }
        }

        // Subtract each excluded component's subspace contribution.
        for &ci in excluded {
            let v = self.components.column(ci);
            let scores = v.transpose() * &y; // [1, T]
            y -= v * scores;
        }

        for (r, &ti) in rows.iter().enumerate() {
            for t in 0..n_t {
                out.samples[[ti, t]] = y[(r, t)] + means[r];
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn buffer(data: Array2<f64>) -> SignalBuffer {
        let names = (0..data.nrows()).map(|i| format!("Ch{i}")).collect();
        SignalBuffer::new(data, 256.0, names).unwrap()
    }

    fn artifact_buffer() -> SignalBuffer {
        // One strong shared artifact across all channels plus small
        // channel-specific signal.
        let data = Array2::from_shape_fn((4, 512), |(c, t)| {
            let artifact = 10.0 * (t as f64 * 0.21).sin();
            let own = 0.3 * ((c + 1) as f64 * t as f64 * 0.017).cos();
            artifact + own
        });
        buffer(data)
    }

    #[test]
    fn fit_rejects_bad_component_counts() {
        let buf = artifact_buffer();
        assert!(Decomposition::fit(&buf, 0).is_err());
        assert!(Decomposition::fit(&buf, 4).is_err()); // k must be < n_good
        assert!(Decomposition::fit(&buf, 3).is_ok());
    }

    #[test]
    fn fit_on_non_finite_samples_is_an_error_not_a_panic() {
        let mut data = Array2::from_shape_fn((4, 64), |(c, t)| (c as f64 + 1.0) * t as f64);
        data[[2, 10]] = f64::NAN;
        let buf = buffer(data);
        assert!(matches!(
            Decomposition::fit(&buf, 2),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn fit_uses_good_channels_only() {
        let mut buf = artifact_buffer();
        buf.bad_channels.insert("Ch3".into());
        // 3 good channels → k must be < 3.
        assert!(Decomposition::fit(&buf, 3).is_err());
        let d = Decomposition::fit(&buf, 2).unwrap();
        assert_eq!(d.fit_channels, vec!["Ch0", "Ch1", "Ch2"]);
    }

    #[test]
    fn fit_is_deterministic() {
        let buf = artifact_buffer();
        let a = Decomposition::fit(&buf, 2).unwrap();
        let b = Decomposition::fit(&buf, 2).unwrap();
        assert_eq!(a.components, b.components);
    }

    #[test]
    fn excluding_out_of_range_component_fails() {
        let buf = artifact_buffer();
        let d = Decomposition::fit(&buf, 2).unwrap();
        let excl: BTreeSet<usize> = [25].into_iter().collect();
        assert!(matches!(
            d.apply(&buf, &excl),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn removing_dominant_component_shrinks_artifact() {
        let buf = artifact_buffer();
        let d = Decomposition::fit(&buf, 2).unwrap();
        // First component carries the shared artifact.
        assert!(d.explained_variance()[0] > 0.9);

        let excl: BTreeSet<usize> = [0].into_iter().collect();
        let cleaned = d.apply(&buf, &excl).unwrap();

        let power = |b: &SignalBuffer| b.samples.iter().map(|v| v * v).sum::<f64>();
        assert!(power(&cleaned) < power(&buf) * 0.05);
    }

    #[test]
    fn empty_exclusion_is_copy() {
        let buf = artifact_buffer();
        let d = Decomposition::fit(&buf, 2).unwrap();
        let out = d.apply(&buf, &BTreeSet::new()).unwrap();
        assert_eq!(out.samples, buf.samples);
    }

    #[test]
    fn apply_to_differently_filtered_target() {
        // Fit on one copy, apply to another with the same channels but
        // different content; only fit-channel rows may change.
        let fit_buf = artifact_buffer();
        let d = Decomposition::fit(&fit_buf, 2).unwrap();

        let target = buffer(Array2::from_shape_fn((4, 256), |(c, t)| {
            (c as f64 + 1.0) * (t as f64 * 0.05).sin()
        }));
        let excl: BTreeSet<usize> = [1].into_iter().collect();
        let out = d.apply(&target, &excl).unwrap();
        assert_eq!(out.n_samples(), 256);
        assert_eq!(out.channel_names, target.channel_names);
    }
}
