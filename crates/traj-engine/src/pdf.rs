use std::f64::consts::PI;

use log::debug;
use traj_store::{PdfConfig, StepAccess, TrajError, TrajResult};

use crate::analysis::Analysis;

/// Pair distribution function between two species selections.
#[derive(Clone, Debug)]
pub struct PdfPlan {
    znucl1: Option<u32>,
    znucl2: Option<u32>,
    rmax: f64,
    dr: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PdfOutput {
    /// Bin centres.
    pub r: Vec<f64>,
    pub g: Vec<f64>,
    /// Mean number of selection-2 atoms within the outer edge of each bin.
    pub coordination: Vec<f64>,
    pub counts: Vec<u64>,
}

impl PdfPlan {
    /// `None` selects every atom.
    pub fn new(znucl1: Option<u32>, znucl2: Option<u32>, rmax: f64, dr: f64) -> TrajResult<Self> {
        if rmax <= 0.0 || !rmax.is_finite() || dr <= 0.0 || !dr.is_finite() {
            return Err(TrajError::Invalid(format!(
                "pdf needs positive rmax and dr, got {rmax} and {dr}"
            )));
        }
        Ok(Self {
            znucl1,
            znucl2,
            rmax,
            dr,
        })
    }

    pub fn from_config(cfg: &PdfConfig, znucl1: Option<u32>, znucl2: Option<u32>) -> TrajResult<Self> {
        Self::new(znucl1, znucl2, cfg.rmax(), cfg.dr())
    }

    pub fn nbins(&self) -> usize {
        (self.rmax / self.dr).ceil() as usize
    }

    fn shell_volume(&self, k: usize) -> f64 {
        let lo = k as f64 * self.dr;
        let hi = ((k + 1) as f64 * self.dr).min(self.rmax);
        4.0 / 3.0 * PI * (hi.powi(3) - lo.powi(3))
    }
}

/// Image offsets `n` such that an image `d + n . rprimd` of a minimum-image
/// displacement `d` can lie within `rmax`.
fn image_range(spacing: f64, rmax: f64) -> i64 {
    (rmax / spacing).ceil() as i64 + 1
}

impl Analysis for PdfPlan {
    type Output = PdfOutput;

    fn name(&self) -> &'static str {
        "pdf"
    }

    fn run<S>(&self, traj: &S, tbegin: usize, tend: usize) -> TrajResult<PdfOutput>
    where
        S: StepAccess + ?Sized,
    {
        let window = traj.check_times(tbegin, tend)?;
        let set1 = traj.species().atoms_with_znucl(self.znucl1);
        let set2 = traj.species().atoms_with_znucl(self.znucl2);
        if set1.is_empty() || set2.is_empty() {
            return Err(TrajError::Invalid(format!(
                "pdf selection {:?}/{:?} matches no atoms",
                self.znucl1, self.znucl2
            )));
        }
        // Periodic images of an atom are its own neighbours, so only the
        // non-periodic self-pair is missing from the reference density.
        let same_set = set1 == set2;
        let n2_eff = if same_set && !traj.is_periodic() {
            set2.len() - 1
        } else {
            set2.len()
        };
        if n2_eff == 0 {
            return Err(TrajError::Invalid(
                "pdf of a single isolated atom with itself is undefined".into(),
            ));
        }

        let nbins = self.nbins();
        let rmax2 = self.rmax * self.rmax;
        let mut counts = vec![0u64; nbins];
        let mut volume = 0.0;
        for t in window.steps() {
            let cell = traj.cell(t)?;
            let x = traj.xcart(t)?;
            volume += cell.volume();
            let ranges = if traj.is_periodic() {
                cell.plane_spacings().map(|s| image_range(s, self.rmax))
            } else {
                [0; 3]
            };
            let a = cell.rprimd();
            for &i in &set1 {
                for &j in &set2 {
                    let d = if traj.is_periodic() {
                        cell.minimum_image(x[j], x[i])
                    } else {
                        [x[j][0] - x[i][0], x[j][1] - x[i][1], x[j][2] - x[i][2]]
                    };
                    for n0 in -ranges[0]..=ranges[0] {
                        for n1 in -ranges[1]..=ranges[1] {
                            for n2 in -ranges[2]..=ranges[2] {
                                if i == j && n0 == 0 && n1 == 0 && n2 == 0 {
                                    continue;
                                }
                                let (f0, f1, f2) = (n0 as f64, n1 as f64, n2 as f64);
                                let mut r2 = 0.0;
                                for k in 0..3 {
                                    let c = d[k] + f0 * a[0][k] + f1 * a[1][k] + f2 * a[2][k];
                                    r2 += c * c;
                                }
                                if r2 < rmax2 {
                                    let bin = ((r2.sqrt() / self.dr) as usize).min(nbins - 1);
                                    counts[bin] += 1;
                                }
                            }
                        }
                    }
                }
            }
        }

        let nsteps = window.len() as f64;
        let n1 = set1.len() as f64;
        let rho2 = n2_eff as f64 / (volume / nsteps);
        let mut r = Vec::with_capacity(nbins);
        let mut g = Vec::with_capacity(nbins);
        let mut coordination = Vec::with_capacity(nbins);
        let mut running = 0.0;
        for (k, &c) in counts.iter().enumerate() {
            r.push((k as f64 + 0.5) * self.dr);
            g.push(c as f64 / (nsteps * n1 * rho2 * self.shell_volume(k)));
            running += c as f64 / (nsteps * n1);
            coordination.push(running);
        }
        debug!(
            "pdf over {} steps: {} pairs counted",
            window.len(),
            counts.iter().sum::<u64>()
        );
        Ok(PdfOutput {
            r,
            g,
            coordination,
            counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traj_store::{Snapshot, Species, Trajectory};

    fn simple_cubic(n: usize, a: f64) -> Trajectory {
        let l = n as f64 * a;
        let mut x = Vec::new();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    x.push([i as f64 * a, j as f64 * a, k as f64 * a]);
                }
            }
        }
        let natom = x.len();
        let snap = Snapshot::from_cartesian(
            [1.0; 3],
            [[l, 0.0, 0.0], [0.0, l, 0.0], [0.0, 0.0, l]],
            x,
            0.0,
        )
        .unwrap();
        Trajectory::from_snapshots(Species::from_znucl_per_atom(&vec![18; natom]), true, vec![snap])
            .unwrap()
    }

    #[test]
    fn shell_integral_counts_neighbours() {
        let traj = simple_cubic(4, 1.0);
        let plan = PdfPlan::new(None, None, 1.5, 0.05).unwrap();
        let out = plan.run(&traj, 0, 1).unwrap();
        assert_eq!(out.g.len(), 30);
        // 6 first neighbours at 1, 12 second neighbours at sqrt(2).
        let total = *out.coordination.last().unwrap();
        assert!((total - 18.0).abs() < 1e-9);

        let rho = 1.0;
        let integral: f64 = out
            .g
            .iter()
            .enumerate()
            .map(|(k, g)| rho * g * plan.shell_volume(k))
            .sum();
        assert!((integral - 18.0).abs() < 1e-9);
        let below_one: u64 = out.counts[..19].iter().sum();
        assert_eq!(below_one, 0);
    }

    #[test]
    fn images_beyond_half_box_are_counted() {
        // A 2x2x2 lattice: neighbours at distance 1 repeat through the box.
        let traj = simple_cubic(2, 1.0);
        let plan = PdfPlan::new(Some(18), Some(18), 1.2, 0.1).unwrap();
        let out = plan.run(&traj, 0, 1).unwrap();
        assert!((out.coordination.last().unwrap() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn self_images_use_full_density() {
        // One atom in a unit box: all neighbours are its own images, and the
        // lattice density is exactly one.
        let traj = simple_cubic(1, 1.0);
        let plan = PdfPlan::new(None, None, 1.5, 0.05).unwrap();
        let out = plan.run(&traj, 0, 1).unwrap();
        assert!((out.coordination.last().unwrap() - 18.0).abs() < 1e-9);
        let integral: f64 = out
            .g
            .iter()
            .enumerate()
            .map(|(k, g)| g * plan.shell_volume(k))
            .sum();
        assert!((integral - 18.0).abs() < 1e-9);

        let large = PdfPlan::new(None, None, 1.5, 0.05)
            .unwrap()
            .run(&simple_cubic(4, 1.0), 0, 1)
            .unwrap();
        for (a, b) in out.g.iter().zip(&large.g) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn isolated_single_atom_is_invalid() {
        let snap = Snapshot::from_cartesian(
            [1.0; 3],
            [[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]],
            vec![[1.0; 3]],
            0.0,
        )
        .unwrap();
        let traj = Trajectory::from_snapshots(Species::from_znucl_per_atom(&[18]), false, vec![snap]).unwrap();
        let plan = PdfPlan::new(None, None, 1.0, 0.1).unwrap();
        assert!(matches!(plan.run(&traj, 0, 1), Err(TrajError::Invalid(_))));
    }

    #[test]
    fn empty_selection_is_invalid() {
        let traj = simple_cubic(2, 1.0);
        let plan = PdfPlan::new(Some(8), None, 1.0, 0.1).unwrap();
        assert!(matches!(plan.run(&traj, 0, 1), Err(TrajError::Invalid(_))));
    }

    #[test]
    fn bad_parameters_are_rejected() {
        assert!(PdfPlan::new(None, None, 0.0, 0.1).is_err());
        assert!(PdfPlan::new(None, None, 1.0, -0.1).is_err());
    }
}
