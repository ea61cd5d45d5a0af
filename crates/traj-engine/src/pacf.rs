use traj_store::{StepAccess, TrajResult};

use crate::acf::acf;
use crate::analysis::Analysis;

/// Position autocorrelation function.
#[derive(Clone, Debug, Default)]
pub struct PacfPlan;

#[derive(Clone, Debug, PartialEq)]
pub struct PacfOutput {
    pub per_type: Vec<Vec<f64>>,
    pub total: Vec<f64>,
}

impl PacfPlan {
    pub fn new() -> Self {
        Self
    }
}

/// Correlate mean-removed positions of `frames` (already unwrapped) and sum
/// them per type and overall, each normalised to 1 at lag 0.
pub(crate) fn position_acf(
    frames: &[&[[f64; 3]]],
    typat: &[usize],
    ntypes: usize,
) -> TrajResult<PacfOutput> {
    let ntime = frames.len();
    let natom = typat.len();
    let howmany = 3 * natom;
    let mut data = vec![0.0f64; ntime * howmany];
    for s in 0..howmany {
        let (atom, k) = (s / 3, s % 3);
        let mean = frames.iter().map(|f| f[atom][k]).sum::<f64>() / ntime.max(1) as f64;
        for (t, f) in frames.iter().enumerate() {
            data[t * howmany + s] = f[atom][k] - mean;
        }
    }
    let corr = acf(&data, howmany, ntime)?;

    let mut per_type = vec![vec![0.0f64; ntime]; ntypes];
    let mut total = vec![0.0f64; ntime];
    for lag in 0..ntime {
        for s in 0..howmany {
            let c = corr[lag * howmany + s];
            per_type[typat[s / 3]][lag] += c;
            total[lag] += c;
        }
    }
    for series in per_type.iter_mut().chain(std::iter::once(&mut total)) {
        normalise(series);
    }
    Ok(PacfOutput { per_type, total })
}

fn normalise(series: &mut [f64]) {
    let Some(&zero) = series.first() else { return };
    if zero > 0.0 {
        for v in series.iter_mut() {
            *v /= zero;
        }
    } else {
        series.fill(0.0);
    }
}

impl Analysis for PacfPlan {
    type Output = PacfOutput;

    fn name(&self) -> &'static str {
        "pacf"
    }

    fn run<S>(&self, traj: &S, tbegin: usize, tend: usize) -> TrajResult<PacfOutput>
    where
        S: StepAccess + ?Sized,
    {
        let window = traj.check_times(tbegin, tend)?;
        let path = traj.unwrapped_xcart(window)?;
        let frames: Vec<&[[f64; 3]]> = path.iter().map(|f| f.as_slice()).collect();
        position_acf(&frames, traj.typat(), traj.species().ntypes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traj_store::{Snapshot, Species, Trajectory};

    fn oscillator(ntime: usize) -> Trajectory {
        let species = Species::from_znucl_per_atom(&[1, 8]);
        let rprimd = [[20.0, 0.0, 0.0], [0.0, 20.0, 0.0], [0.0, 0.0, 20.0]];
        let snaps = (0..ntime)
            .map(|t| {
                let phase = t as f64 * std::f64::consts::PI / 4.0;
                Snapshot::from_cartesian(
                    [1.0; 3],
                    rprimd,
                    vec![[10.0 + phase.cos(), 10.0, 10.0], [5.0, 5.0, 5.0]],
                    t as f64,
                )
                .unwrap()
            })
            .collect();
        Trajectory::from_snapshots(species, true, snaps).unwrap()
    }

    #[test]
    fn unit_at_lag_zero_and_anticorrelated_at_half_period() {
        let out = PacfPlan::new().run(&oscillator(64), 0, 64).unwrap();
        assert!((out.total[0] - 1.0).abs() < 1e-12);
        assert!((out.per_type[0][0] - 1.0).abs() < 1e-12);
        assert!(out.total[4] < -0.8);
        // The oxygen never moves.
        assert!(out.per_type[1].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn static_window_is_all_zero() {
        let species = Species::from_znucl_per_atom(&[1]);
        let rprimd = [[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]];
        let snaps = (0..5)
            .map(|t| Snapshot::from_cartesian([1.0; 3], rprimd, vec![[1.0, 1.0, 1.0]], t as f64).unwrap())
            .collect();
        let traj = Trajectory::from_snapshots(species, true, snaps).unwrap();
        let out = PacfPlan::new().run(&traj, 0, 5).unwrap();
        assert!(out.total.iter().all(|v| *v == 0.0));
    }
}
