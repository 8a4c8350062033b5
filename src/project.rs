//! Spatial projection from sensor space to anatomical source space.
//!
//! The geometric and statistical construction of the projection weights
//! (forward modeling, covariance estimation, beamformer weighting) lives
//! outside this crate behind [`SpatialFilterBuilder`]. The core consumes the
//! resulting [`SpatialFilter`] and applies it with [`project`], which is a
//! deterministic matrix product: `source = weights · sensor`.
use nalgebra::DMatrix;

use crate::buffer::SignalBuffer;
use crate::error::{PipelineError, Result};

/// Precomputed sensor→source weighting.
#[derive(Debug, Clone)]
pub struct SpatialFilter {
    /// `[n_sources, n_sensors]` weight matrix.
    pub weights: DMatrix<f64>,
    /// Sensor channel names the weights columns correspond to, in order.
    pub sensor_channels: Vec<String>,
    /// Fixed anatomical source channel names, one per weights row.
    pub source_channels: Vec<String>,
}

impl SpatialFilter {
    pub fn new(
        weights: DMatrix<f64>,
        sensor_channels: Vec<String>,
        source_channels: Vec<String>,
    ) -> Result<Self> {
        if weights.ncols() != sensor_channels.len() {
            return Err(PipelineError::config(format!(
                "{} weight columns for {} sensor channels",
                weights.ncols(),
                sensor_channels.len()
            )));
        }
        if weights.nrows() != source_channels.len() {
            return Err(PipelineError::config(format!(
                "{} weight rows for {} source channels",
                weights.nrows(),
                source_channels.len()
            )));
        }
        Ok(Self { weights, sensor_channels, source_channels })
    }
}

/// Builds a [`SpatialFilter`] from a prepared buffer. Implemented by the
/// external beamforming collaborator; the buffer handed to `build_filter`
/// must already be average-referenced and free of bad channels (checked by
/// the pipeline before calling).
pub trait SpatialFilterBuilder {
    fn build_filter(&self, buffer: &SignalBuffer) -> Result<SpatialFilter>;
}

/// Map `buffer` into source space: the returned buffer carries the filter's
/// fixed source channel set in place of the sensor set.
///
/// Fails with `ValidationError` when the buffer is missing a sensor channel
/// the filter was built for, or still has bad channels flagged.
pub fn project(buffer: &SignalBuffer, filter: &SpatialFilter) -> Result<SignalBuffer> {
    if !buffer.bad_channels.is_empty() {
        return Err(PipelineError::validation(
            "spatial projection requires a buffer without bad channels",
        ));
    }
    let rows: Vec<usize> = filter
        .sensor_channels
        .iter()
        .map(|name| {
            buffer.channel_index(name).ok_or_else(|| {
                PipelineError::validation(format!(
                    "sensor channel '{name}' required by spatial filter is missing"
                ))
            })
        })
        .collect::<Result<_>>()?;

    let n_t = buffer.n_samples();
    let mut sensor = DMatrix::<f64>::zeros(rows.len(), n_t);
    for (r, &bi) in rows.iter().enumerate() {
        for t in 0..n_t {
            sensor[(r, t)] = buffer.samples[[bi, t]];
        }
    }

    let source = &filter.weights * sensor;
    let mut samples = ndarray::Array2::<f64>::zeros((source.nrows(), n_t));
    for r in 0..source.nrows() {
        for t in 0..n_t {
            samples[[r, t]] = source[(r, t)];
        }
    }

    SignalBuffer::new(samples, buffer.sample_rate, filter.source_channels.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn sensor_buffer() -> SignalBuffer {
        let data = Array2::from_shape_fn((3, 32), |(c, t)| (c + 1) as f64 * (t + 1) as f64);
        let names = vec!["A".into(), "B".into(), "C".into()];
        SignalBuffer::new(data, 250.0, names).unwrap()
    }

    fn mean_filter() -> SpatialFilter {
        // One source = mean of the three sensors, one = A - B.
        let weights = DMatrix::from_row_slice(2, 3, &[
            1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0,
            1.0, -1.0, 0.0,
        ]);
        SpatialFilter::new(
            weights,
            vec!["A".into(), "B".into(), "C".into()],
            vec!["frontal".into(), "lateral".into()],
        )
        .unwrap()
    }

    #[test]
    fn shape_mismatch_rejected() {
        let weights = DMatrix::zeros(2, 3);
        assert!(SpatialFilter::new(weights, vec!["A".into()], vec!["s".into(), "t".into()]).is_err());
    }

    #[test]
    fn projects_to_source_channels() {
        let buf = sensor_buffer();
        let out = project(&buf, &mean_filter()).unwrap();
        assert_eq!(out.channel_names, vec!["frontal", "lateral"]);
        assert_eq!(out.n_samples(), 32);
        assert_eq!(out.sample_rate, 250.0);
        // frontal = mean(1,2,3)*(t+1) = 2*(t+1); lateral = (1-2)*(t+1).
        approx::assert_abs_diff_eq!(out.samples[[0, 0]], 2.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(out.samples[[1, 4]], -5.0, epsilon = 1e-12);
    }

    #[test]
    fn projection_is_deterministic() {
        let buf = sensor_buffer();
        let f = mean_filter();
        let a = project(&buf, &f).unwrap();
        let b = project(&buf, &f).unwrap();
        assert_eq!(a.samples, b.samples);
    }

    #[test]
    fn missing_sensor_channel_fails() {
        let data = Array2::zeros((2, 8));
        let buf = SignalBuffer::new(data, 250.0, vec!["A".into(), "X".into()]).unwrap();
        assert!(matches!(
            project(&buf, &mean_filter()),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn bad_channels_block_projection() {
        let mut buf = sensor_buffer();
        buf.bad_channels.insert("B".into());
        assert!(project(&buf, &mean_filter()).is_err());
    }
}
