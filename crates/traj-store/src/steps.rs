//! Read-only step access shared by owned and still-loading stores.

use crate::cell::Cell;
use crate::elements::{mass_amu, AMU_TO_EMASS, KB_HARTREE};
use crate::error::{TrajError, TrajResult};
use crate::snapshot::{Snapshot, Species};
use crate::trajectory::TimeWindow;

/// Indexed access to a run of immutable steps.
///
/// Implementors supply the four required methods; every derived quantity
/// is computed from `snapshot`. `ntime` is the number of steps readable right
/// now, which for a loading store may grow between calls but never shrinks.
pub trait StepAccess {
    fn species(&self) -> &Species;

    fn is_periodic(&self) -> bool;

    fn ntime(&self) -> usize;

    fn snapshot(&self, t: usize) -> TrajResult<&Snapshot>;

    fn natom(&self) -> usize {
        self.species().natom()
    }

    fn typat(&self) -> &[usize] {
        self.species().typat()
    }

    fn xcart(&self, t: usize) -> TrajResult<&[[f64; 3]]> {
        Ok(self.snapshot(t)?.xcart())
    }

    fn cell(&self, t: usize) -> TrajResult<Cell> {
        self.snapshot(t)?.cell()
    }

    fn time(&self, t: usize) -> TrajResult<f64> {
        Ok(self.snapshot(t)?.time())
    }

    fn etotal(&self, t: usize) -> TrajResult<f64> {
        self.snapshot(t)?
            .etotal()
            .ok_or_else(|| TrajError::Unsupported(format!("no total energy at step {t}")))
    }

    fn stress(&self, t: usize) -> TrajResult<[f64; 6]> {
        self.snapshot(t)?
            .stress()
            .ok_or_else(|| TrajError::Unsupported(format!("no stress tensor at step {t}")))
    }

    fn volume(&self, t: usize) -> TrajResult<f64> {
        Ok(self.cell(t)?.volume())
    }

    /// Hydrostatic pressure `-(σxx + σyy + σzz) / 3`.
    fn pressure(&self, t: usize) -> TrajResult<f64> {
        let s = self.stress(t)?;
        Ok(-(s[0] + s[1] + s[2]) / 3.0)
    }

    /// Energy and stress present on every readable step.
    fn has_thermo(&self) -> bool {
        let n = self.ntime();
        n > 0
            && (0..n).all(|t| {
                self.snapshot(t)
                    .is_ok_and(|s| s.etotal().is_some() && s.stress().is_some())
            })
    }

    fn check_times(&self, tbegin: usize, tend: usize) -> TrajResult<TimeWindow> {
        let ntime = self.ntime();
        if tbegin >= tend || tend > ntime {
            return Err(TrajError::InvalidRange(format!(
                "window [{tbegin}, {tend}) not inside [0, {ntime})"
            )));
        }
        Ok(TimeWindow {
            begin: tbegin,
            end: tend,
        })
    }

    /// Cartesian positions over `window`, with periodic jumps removed by
    /// following each atom's nearest image from one step to the next.
    fn unwrapped_xcart(&self, window: TimeWindow) -> TrajResult<Vec<Vec<[f64; 3]>>> {
        let periodic = self.is_periodic();
        let mut out: Vec<Vec<[f64; 3]>> = Vec::with_capacity(window.len());
        for t in window.steps() {
            let snap = self.snapshot(t)?;
            if !periodic || out.is_empty() {
                out.push(snap.xcart().to_vec());
                continue;
            }
            let cell = snap.cell()?;
            let prev = &out[out.len() - 1];
            let frame = snap
                .xcart()
                .iter()
                .zip(prev.iter())
                .map(|(&cur, &p)| {
                    let d = cell.minimum_image(cur, p);
                    [p[0] + d[0], p[1] + d[1], p[2] + d[2]]
                })
                .collect();
            out.push(frame);
        }
        Ok(out)
    }

    /// Atomic masses in amu.
    fn masses(&self) -> TrajResult<Vec<f64>> {
        let species = self.species();
        (0..species.natom())
            .map(|a| {
                let z = species.znucl_of(a);
                mass_amu(z).ok_or_else(|| TrajError::Unsupported(format!("no mass for znucl {z}")))
            })
            .collect()
    }

    /// Stored velocities, or central finite differences of the unwrapped
    /// positions when the source carried none.
    fn velocities(&self, t: usize) -> TrajResult<Vec<[f64; 3]>> {
        let snap = self.snapshot(t)?;
        if let Some(vel) = snap.vel() {
            return Ok(vel.to_vec());
        }
        let ntime = self.ntime();
        if ntime < 2 {
            return Err(TrajError::Unsupported(
                "velocities need stored data or at least two steps".into(),
            ));
        }
        let lo = t.saturating_sub(1);
        let hi = (t + 1).min(ntime - 1);
        let dt = self.time(hi)? - self.time(lo)?;
        if dt <= 0.0 {
            return Err(TrajError::Invalid(format!(
                "non-increasing time between steps {lo} and {hi}"
            )));
        }
        let path = self.unwrapped_xcart(TimeWindow { begin: lo, end: hi + 1 })?;
        let first = &path[0];
        let last = &path[path.len() - 1];
        Ok(first
            .iter()
            .zip(last.iter())
            .map(|(a, b)| [(b[0] - a[0]) / dt, (b[1] - a[1]) / dt, (b[2] - a[2]) / dt])
            .collect())
    }

    /// Instantaneous kinetic temperature in kelvin, `Σ m v² / (3 N k_B)`.
    fn temperature(&self, t: usize) -> TrajResult<f64> {
        let vel = self.velocities(t)?;
        let masses = self.masses()?;
        if vel.is_empty() {
            return Ok(0.0);
        }
        let twice_ekin: f64 = vel
            .iter()
            .zip(masses.iter())
            .map(|(v, m)| m * AMU_TO_EMASS * (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]))
            .sum();
        Ok(twice_ekin / (3.0 * vel.len() as f64 * KB_HARTREE))
    }
}
