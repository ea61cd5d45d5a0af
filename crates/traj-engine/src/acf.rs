//! FFT autocorrelation of interleaved real series.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use traj_store::{TrajError, TrajResult};

/// Autocorrelate `howmany` series of length `ntime` stored as
/// `data[t * howmany + s]`.
///
/// Each series is zero padded to the next power of two at or above
/// `2 * ntime`, so the result is the linear (not circular) correlation
/// `out[lag * howmany + s] = sum_t x[t] x[t + lag] / ntime`.
pub fn acf(data: &[f64], howmany: usize, ntime: usize) -> TrajResult<Vec<f64>> {
    if data.len() != howmany * ntime {
        return Err(TrajError::DimensionMismatch(format!(
            "acf input holds {} values, expected {howmany} x {ntime}",
            data.len()
        )));
    }
    if ntime == 0 || howmany == 0 {
        return Ok(Vec::new());
    }
    let size = (ntime * 2).next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(size);
    let ifft = planner.plan_fft_inverse(size);
    let scale = 1.0 / (size as f64 * ntime as f64);

    let mut out = vec![0.0f64; howmany * ntime];
    let mut buf = vec![Complex { re: 0.0, im: 0.0 }; size];
    for s in 0..howmany {
        for v in buf.iter_mut() {
            *v = Complex { re: 0.0, im: 0.0 };
        }
        for t in 0..ntime {
            buf[t].re = data[t * howmany + s];
        }
        fft.process(&mut buf);
        for v in &mut buf {
            *v = Complex {
                re: v.norm_sqr(),
                im: 0.0,
            };
        }
        ifft.process(&mut buf);
        for lag in 0..ntime {
            out[lag * howmany + s] = buf[lag].re * scale;
        }
    }
    Ok(out)
}
