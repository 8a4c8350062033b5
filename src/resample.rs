//! FFT-based resampler and the two rate rules of the pipeline.
//!
//! Algorithm per channel:
//!   1. Pad with reflect-limited samples on each side (next power of 2).
//!   2. rfft(padded) → complex half-spectrum.
//!   3. If downsampling: double the Nyquist bin (use_len = new_len).
//!      If upsampling:   halve  the Nyquist bin (use_len = old_len).
//!   4. Scale all bins by `new_len_padded / old_len_padded`.
//!   5. irfft(spectrum, n=new_len_padded), truncating or zero-padding.
//!   6. Strip the resampled padding edges.
//!
//! Rate rules:
//! - [`working_rate`] is a pure function of the source rate (256 Hz when the
//!   source divides evenly by 256, else 250 Hz) — deterministic, so it needs
//!   no recording.
//! - The final output downsample *factor* is operator-chosen and therefore
//!   recorded in the run record; [`downsample`] applies it.
use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::buffer::SignalBuffer;
use crate::error::{PipelineError, Result};

/// Working sample rate used during review and cleaning: 256 Hz when the
/// source rate divides by 256, otherwise 250 Hz. Rates at or below the
/// preferred target are left unchanged.
pub fn working_rate(sample_rate: f64) -> f64 {
    let preferred = if (sample_rate as u64) % 256 == 0 { 256.0 } else { 250.0 };
    if sample_rate <= preferred {
        sample_rate
    } else {
        preferred
    }
}

/// Resample `buffer` to `target_rate`. No-op copy when the rates already
/// match (within 1 mHz).
pub fn resample(buffer: &SignalBuffer, target_rate: f64) -> Result<SignalBuffer> {
    if target_rate <= 0.0 {
        return Err(PipelineError::config(format!(
            "target rate must be positive, got {target_rate}"
        )));
    }
    let mut out = buffer.clone();
    if (buffer.sample_rate - target_rate).abs() < 1e-3 {
        return Ok(out);
    }
    out.samples = resample_array(&buffer.samples, buffer.sample_rate, target_rate)?;
    out.sample_rate = target_rate;
    Ok(out)
}

/// Apply the operator-chosen integer downsample factor (1 = no-op).
pub fn downsample(buffer: &SignalBuffer, factor: u32) -> Result<SignalBuffer> {
    if factor == 0 {
        return Err(PipelineError::config("downsample factor must be >= 1"));
    }
    if factor == 1 {
        return Ok(buffer.clone());
    }
    resample(buffer, buffer.sample_rate / factor as f64)
}

/// Resample a `[C, T]` array from `src_sfreq` to `dst_sfreq`.
pub fn resample_array(data: &Array2<f64>, src_sfreq: f64, dst_sfreq: f64) -> Result<Array2<f64>> {
    let ratio = dst_sfreq / src_sfreq;
    let n_in = data.ncols();
    let final_len = (ratio * n_in as f64).round() as usize;
    let n_ch = data.nrows();

    let (npad_l, npad_r) = auto_npad(n_in);
    let mut out = Array2::<f64>::zeros((n_ch, final_len));
    for ch in 0..n_ch {
        let row: Vec<f64> = data.row(ch).to_vec();
        let resampled = resample_1d(&row, ratio, npad_l, npad_r)?;
        out.row_mut(ch).assign(&ndarray::ArrayView1::from(&resampled));
    }
    Ok(out)
}

/// Padding amounts: pad to the next power of 2.
///
/// ```text
/// min_add = min(n // 8, 100) * 2
/// total   = 2^ceil(log2(n + min_add)) - n
/// npads   = [total // 2, total - total // 2]
/// ```
pub fn auto_npad(n: usize) -> (usize, usize) {
    let min_add = (n / 8).min(100) * 2;
    let sum = n + min_add;
    let next_pow2 = 1usize << ((sum as f64).log2().ceil() as u32);
    let total = next_pow2 - n;
    (total / 2, total - total / 2)
}

/// Resample a single 1-D signal with explicit (possibly asymmetric) padding.
pub fn resample_1d(x: &[f64], ratio: f64, npad_l: usize, npad_r: usize) -> Result<Vec<f64>> {
    let n_in = x.len();
    if n_in == 0 {
        return Ok(vec![]);
    }
    let final_len = (ratio * n_in as f64).round() as usize;

    // --- 1. Reflect-limited padding --------------------------------------
    let pad_l = npad_l.min(n_in - 1);
    let pad_r = npad_r.min(n_in - 1);
    let old_len = n_in + pad_l + pad_r;

    let mut x_ext = Vec::with_capacity(old_len);
    for i in (1..=pad_l).rev() {
        x_ext.push(2.0 * x[0] - x[i]);
    }
    x_ext.extend_from_slice(x);
    let last = x[n_in - 1];
    for i in 1..=pad_r {
        let idx = (n_in - 1).saturating_sub(i);
        x_ext.push(2.0 * last - x[idx]);
    }

    // --- 2. Padded output length ------------------------------------------
    let new_len_padded = (ratio * old_len as f64).round() as usize;
    let shorter = new_len_padded < old_len;
    let use_len = if shorter { new_len_padded } else { old_len };

    // --- 3. rfft of padded signal -----------------------------------------
    // Full FFT, keep the first n//2 + 1 coefficients.
    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fft = planner.plan_fft_forward(old_len);
    let mut buf: Vec<Complex<f64>> = x_ext
        .iter()
        .map(|&v| Complex { re: v, im: 0.0 })
        .collect();
    fft.process(&mut buf);

    let rfft_len = old_len / 2 + 1;
    let mut x_fft: Vec<Complex<f64>> = buf[..rfft_len].to_vec();

    // --- 4. Nyquist bin ----------------------------------------------------
    if use_len % 2 == 0 {
        let nyq = use_len / 2;
        if nyq < x_fft.len() {
            let factor = if shorter { 2.0 } else { 0.5 };
            x_fft[nyq] *= factor;
        }
    }

    // --- 5. Scale by new_len_padded / old_len ------------------------------
    let scale = new_len_padded as f64 / old_len as f64;
    for v in &mut x_fft {
        *v *= scale;
    }

    // --- 6. irfft(x_fft, n=new_len_padded) ---------------------------------
    let new_rfft_len = new_len_padded / 2 + 1;
    let mut irfft_in = vec![Complex::<f64>::default(); new_len_padded];

    let n_copy = x_fft.len().min(new_rfft_len);
    irfft_in[..n_copy].copy_from_slice(&x_fft[..n_copy]);

    // Reconstruct the full spectrum from the half-spectrum (Hermitian symmetry).
    for i in 1..new_rfft_len {
        let idx = new_len_padded - i;
        if idx < new_len_padded && idx >= new_rfft_len {
            irfft_in[idx] = irfft_in[i].conj();
        }
    }

    let ifft = planner.plan_fft_inverse(new_len_padded);
    ifft.process(&mut irfft_in);
    let inv_scale = 1.0 / new_len_padded as f64;

    // --- 7. Strip padding --------------------------------------------------
    let to_remove_l = (ratio * npad_l as f64).round() as usize;
    let to_remove_r = new_len_padded - final_len - to_remove_l;
    let strip_end = new_len_padded.saturating_sub(to_remove_r);

    let mut result: Vec<f64> = irfft_in[to_remove_l..strip_end]
        .iter()
        .map(|c| c.re * inv_scale)
        .collect();
    result.resize(final_len, 0.0);
    Ok(result)
}
