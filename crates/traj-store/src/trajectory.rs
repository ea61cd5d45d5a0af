use std::ops::Range;

use crate::cell::{fold_reduced, nearest_image, Cell};
use crate::error::{check_index, TrajError, TrajResult};
use crate::geom::center_of_geometry;
use crate::snapshot::{Snapshot, Species};
use crate::steps::StepAccess;

/// Validated half-open step range `[begin, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub begin: usize,
    pub end: usize,
}

impl TimeWindow {
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }

    pub fn steps(&self) -> Range<usize> {
        self.begin..self.end
    }
}

/// Owned, fully populated trajectory. Every step holds exactly `natom` atoms
/// and `xcart`/`xred` agree under that step's cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    species: Species,
    pub(crate) steps: Vec<Snapshot>,
    periodic: bool,
}

impl Trajectory {
    pub fn new(species: Species, periodic: bool) -> Self {
        Self {
            species,
            steps: Vec::new(),
            periodic,
        }
    }

    pub fn from_snapshots(
        species: Species,
        periodic: bool,
        snapshots: Vec<Snapshot>,
    ) -> TrajResult<Self> {
        let mut traj = Self::new(species, periodic);
        traj.steps.reserve(snapshots.len());
        for snap in snapshots {
            traj.push(snap)?;
        }
        Ok(traj)
    }

    pub fn push(&mut self, snapshot: Snapshot) -> TrajResult<()> {
        snapshot.validate(self.natom())?;
        self.steps.push(snapshot);
        Ok(())
    }

    pub fn species(&self) -> &Species {
        &self.species
    }

    pub fn natom(&self) -> usize {
        self.species.natom()
    }

    pub fn nimage(&self) -> usize {
        self.species.nimage()
    }

    pub fn ntime(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    pub(crate) fn set_periodic(&mut self, periodic: bool) {
        self.periodic = periodic;
    }

    pub fn typat(&self) -> &[usize] {
        self.species.typat()
    }

    pub fn znucl(&self) -> &[u32] {
        self.species.znucl()
    }

    pub fn znucl_of(&self, atom: usize) -> TrajResult<u32> {
        check_index("atom", atom, self.natom())?;
        Ok(self.species.znucl_of(atom))
    }

    pub fn snapshot(&self, t: usize) -> TrajResult<&Snapshot> {
        check_index("time step", t, self.ntime())?;
        Ok(&self.steps[t])
    }

    pub(crate) fn snapshot_mut(&mut self, t: usize) -> TrajResult<&mut Snapshot> {
        check_index("time step", t, self.ntime())?;
        Ok(&mut self.steps[t])
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.steps
    }

    pub fn xcart(&self, t: usize) -> TrajResult<&[[f64; 3]]> {
        Ok(self.snapshot(t)?.xcart())
    }

    pub fn xred(&self, t: usize) -> TrajResult<&[[f64; 3]]> {
        Ok(self.snapshot(t)?.xred())
    }

    pub fn fcart(&self, t: usize) -> TrajResult<&[[f64; 3]]> {
        self.snapshot(t)?
            .fcart()
            .ok_or_else(|| TrajError::Unsupported(format!("no forces stored at step {t}")))
    }

    pub fn vel(&self, t: usize) -> TrajResult<&[[f64; 3]]> {
        self.snapshot(t)?
            .vel()
            .ok_or_else(|| TrajError::Unsupported(format!("no velocities stored at step {t}")))
    }

    pub fn spinat(&self, t: usize) -> TrajResult<&[[f64; 3]]> {
        self.snapshot(t)?
            .spinat()
            .ok_or_else(|| TrajError::Unsupported(format!("no spins stored at step {t}")))
    }

    pub fn acell(&self, t: usize) -> TrajResult<[f64; 3]> {
        Ok(self.snapshot(t)?.acell())
    }

    pub fn rprimd(&self, t: usize) -> TrajResult<&[[f64; 3]; 3]> {
        Ok(self.snapshot(t)?.rprimd())
    }

    pub fn cell(&self, t: usize) -> TrajResult<Cell> {
        self.snapshot(t)?.cell()
    }

    pub fn time(&self, t: usize) -> TrajResult<f64> {
        Ok(self.snapshot(t)?.time())
    }

    pub fn times(&self) -> Vec<f64> {
        self.steps.iter().map(Snapshot::time).collect()
    }

    pub fn etotal(&self, t: usize) -> TrajResult<f64> {
        self.snapshot(t)?
            .etotal()
            .ok_or_else(|| TrajError::Unsupported(format!("no total energy at step {t}")))
    }

    pub fn stress(&self, t: usize) -> TrajResult<[f64; 6]> {
        self.snapshot(t)?
            .stress()
            .ok_or_else(|| TrajError::Unsupported(format!("no stress tensor at step {t}")))
    }

    pub fn volume(&self, t: usize) -> TrajResult<f64> {
        Ok(self.cell(t)?.volume())
    }

    /// Hydrostatic pressure `-(σxx + σyy + σzz) / 3`.
    pub fn pressure(&self, t: usize) -> TrajResult<f64> {
        let s = self.stress(t)?;
        Ok(-(s[0] + s[1] + s[2]) / 3.0)
    }

    pub fn has_etotal(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.etotal.is_some())
    }

    pub fn has_stress(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.stress.is_some())
    }

    pub fn has_forces(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.fcart.is_some())
    }

    pub fn has_thermo(&self) -> bool {
        self.has_etotal() && self.has_stress()
    }

    pub fn check_times(&self, tbegin: usize, tend: usize) -> TrajResult<TimeWindow> {
        StepAccess::check_times(self, tbegin, tend)
    }

    /// Set one atom's reduced coordinates at step `t`.
    pub fn move_atom(&mut self, t: usize, atom: usize, x: f64, y: f64, z: f64) -> TrajResult<()> {
        check_index("atom", atom, self.natom())?;
        let periodic = self.periodic;
        let snap = self.snapshot_mut(t)?;
        let cell = snap.cell()?;
        let mut red = [x, y, z];
        if periodic {
            red = red.map(fold_reduced);
        }
        snap.xred[atom] = red;
        snap.sync_cartesian(&cell, atom);
        Ok(())
    }

    /// Move the origin of step `t` to the reduced point `(x, y, z)`.
    pub fn shift_origin(&mut self, t: usize, x: f64, y: f64, z: f64) -> TrajResult<()> {
        let periodic = self.periodic;
        let snap = self.snapshot_mut(t)?;
        let cell = snap.cell()?;
        let shift = [x, y, z];
        for red in snap.xred.iter_mut() {
            for k in 0..3 {
                red[k] -= shift[k];
                if periodic {
                    red[k] = fold_reduced(red[k]);
                }
            }
        }
        snap.sync_all_cartesian(&cell);
        Ok(())
    }

    /// Cartesian positions over `window`, with periodic jumps removed by
    /// following each atom's nearest image from one step to the next.
    pub fn unwrapped_xcart(&self, window: TimeWindow) -> TrajResult<Vec<Vec<[f64; 3]>>> {
        StepAccess::unwrapped_xcart(self, window)
    }

    /// Atomic masses in amu.
    pub fn masses(&self) -> TrajResult<Vec<f64>> {
        StepAccess::masses(self)
    }

    /// Stored velocities, or central finite differences of the unwrapped
    /// positions when the source carried none.
    pub fn velocities(&self, t: usize) -> TrajResult<Vec<[f64; 3]>> {
        StepAccess::velocities(self, t)
    }

    /// Instantaneous kinetic temperature in kelvin.
    pub fn temperature(&self, t: usize) -> TrajResult<f64> {
        StepAccess::temperature(self, t)
    }

    /// Single-step store holding the window means.
    pub fn average(&self, tbegin: usize, tend: usize) -> TrajResult<Trajectory> {
        let window = self.check_times(tbegin, tend)?;
        let natom = self.natom();
        let inv_n = 1.0 / window.len() as f64;
        let reference = self.steps[window.begin].xred.clone();

        let mut xred = vec![[0.0f64; 3]; natom];
        let mut acell = [0.0f64; 3];
        let mut rprimd = [[0.0f64; 3]; 3];
        let mut time = 0.0f64;
        for t in window.steps() {
            let snap = &self.steps[t];
            for (acc, (red, r0)) in xred.iter_mut().zip(snap.xred.iter().zip(reference.iter())) {
                for k in 0..3 {
                    let v = if self.periodic {
                        nearest_image(red[k], r0[k])
                    } else {
                        red[k]
                    };
                    acc[k] += v * inv_n;
                }
            }
            for k in 0..3 {
                acell[k] += snap.acell[k] * inv_n;
                for j in 0..3 {
                    rprimd[k][j] += snap.rprimd[k][j] * inv_n;
                }
            }
            time += snap.time * inv_n;
        }
        if self.periodic {
            for red in &mut xred {
                *red = red.map(fold_reduced);
            }
        }

        let steps = &self.steps[window.steps()];
        let mut snap = Snapshot::from_reduced(acell, rprimd, xred, time)?;
        snap.etotal = mean_scalar(steps.iter().map(|s| s.etotal));
        snap.stress = mean_voigt(steps.iter().map(|s| s.stress));
        snap.fcart = mean_vectors(steps.iter().map(|s| s.fcart.as_deref()), natom);
        snap.spinat = mean_vectors(steps.iter().map(|s| s.spinat.as_deref()), natom);
        Trajectory::from_snapshots(self.species.clone(), self.periodic, vec![snap])
    }

    /// Collapse image replicas into one averaged configuration per step.
    pub fn centroid(&self) -> TrajResult<Trajectory> {
        let nimage = self.nimage();
        if nimage < 2 {
            return Err(TrajError::Unsupported(
                "centroid requires more than one image".into(),
            ));
        }
        let nper = self.species.natom_per_image();
        let mut out = Trajectory::new(self.species.single_image(), self.periodic);
        for snap in &self.steps {
            let cell = snap.cell()?;
            let mut xcart = Vec::with_capacity(nper);
            let mut replicas = Vec::with_capacity(nimage);
            for a in 0..nper {
                let anchor = snap.xcart[a];
                replicas.clear();
                replicas.extend((0..nimage).map(|image| {
                    let p = snap.xcart[image * nper + a];
                    if self.periodic {
                        let d = cell.minimum_image(p, anchor);
                        [anchor[0] + d[0], anchor[1] + d[1], anchor[2] + d[2]]
                    } else {
                        p
                    }
                }));
                xcart.push(center_of_geometry(&replicas));
            }
            let mut reduced = Snapshot::from_cartesian(snap.acell, snap.rprimd, xcart, snap.time)?;
            reduced.etotal = snap.etotal;
            reduced.stress = snap.stress;
            reduced.fcart = snap
                .fcart
                .as_ref()
                .map(|f| average_images(f, nimage, nper));
            reduced.spinat = snap
                .spinat
                .as_ref()
                .map(|s| average_images(s, nimage, nper));
            out.push(reduced)?;
        }
        Ok(out)
    }

    /// New store made of the given steps, in the given order.
    pub fn select_steps(&self, steps: &[usize]) -> TrajResult<Trajectory> {
        let mut out = Trajectory::new(self.species.clone(), self.periodic);
        for &t in steps {
            out.steps.push(self.snapshot(t)?.clone());
        }
        Ok(out)
    }
}

impl StepAccess for Trajectory {
    fn species(&self) -> &Species {
        Trajectory::species(self)
    }

    fn is_periodic(&self) -> bool {
        self.periodic
    }

    fn ntime(&self) -> usize {
        self.steps.len()
    }

    fn snapshot(&self, t: usize) -> TrajResult<&Snapshot> {
        Trajectory::snapshot(self, t)
    }

    fn has_thermo(&self) -> bool {
        Trajectory::has_thermo(self)
    }
}

fn average_images(values: &[[f64; 3]], nimage: usize, nper: usize) -> Vec<[f64; 3]> {
    let inv_n = 1.0 / nimage as f64;
    (0..nper)
        .map(|a| {
            let mut acc = [0.0f64; 3];
            for image in 0..nimage {
                let v = values[image * nper + a];
                for k in 0..3 {
                    acc[k] += v[k] * inv_n;
                }
            }
            acc
        })
        .collect()
}

fn mean_scalar(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values {
        sum += v?;
        n += 1;
    }
    (n > 0).then(|| sum / n as f64)
}

fn mean_voigt(values: impl Iterator<Item = Option<[f64; 6]>>) -> Option<[f64; 6]> {
    let mut sum = [0.0f64; 6];
    let mut n = 0usize;
    for v in values {
        let v = v?;
        for k in 0..6 {
            sum[k] += v[k];
        }
        n += 1;
    }
    (n > 0).then(|| sum.map(|s| s / n as f64))
}

fn mean_vectors<'a>(
    values: impl Iterator<Item = Option<&'a [[f64; 3]]>>,
    natom: usize,
) -> Option<Vec<[f64; 3]>> {
    let mut sum = vec![[0.0f64; 3]; natom];
    let mut n = 0usize;
    for v in values {
        for (acc, x) in sum.iter_mut().zip(v?.iter()) {
            for k in 0..3 {
                acc[k] += x[k];
            }
        }
        n += 1;
    }
    if n == 0 {
        return None;
    }
    let inv = 1.0 / n as f64;
    Some(sum.into_iter().map(|a| a.map(|x| x * inv)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(l: f64) -> [[f64; 3]; 3] {
        [[l, 0.0, 0.0], [0.0, l, 0.0], [0.0, 0.0, l]]
    }

    fn two_atom_store(periodic: bool) -> Trajectory {
        let species = Species::new(vec![0, 1], vec![1, 8], 1).unwrap();
        let mut traj = Trajectory::new(species, periodic);
        for t in 0..4 {
            let x = 0.1 * t as f64;
            let snap = Snapshot::from_reduced(
                [1.0; 3],
                cubic(10.0),
                vec![[x, 0.0, 0.0], [0.5, 0.5, 0.5]],
                t as f64,
            )
            .unwrap()
            .with_etotal(-1.0 - t as f64)
            .with_stress([1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
            traj.push(snap).unwrap();
        }
        traj
    }

    #[test]
    fn getters_are_bounds_checked() {
        let traj = two_atom_store(true);
        assert!(traj.xcart(3).is_ok());
        assert!(matches!(traj.xcart(4), Err(TrajError::OutOfRange(_))));
        assert!(matches!(traj.fcart(0), Err(TrajError::Unsupported(_))));
        assert!((traj.etotal(2).unwrap() + 3.0).abs() < 1e-12);
    }

    #[test]
    fn check_times_rejects_bad_windows() {
        let traj = two_atom_store(false);
        assert!(traj.check_times(0, 4).is_ok());
        assert!(traj.check_times(1, 2).is_ok());
        assert!(matches!(traj.check_times(2, 2), Err(TrajError::InvalidRange(_))));
        assert!(matches!(traj.check_times(3, 1), Err(TrajError::InvalidRange(_))));
        assert!(matches!(traj.check_times(0, 5), Err(TrajError::InvalidRange(_))));
    }

    #[test]
    fn move_atom_folds_and_syncs_cartesian() {
        let mut traj = two_atom_store(true);
        traj.move_atom(1, 0, 1.25, -0.5, 0.0).unwrap();
        let red = traj.xred(1).unwrap()[0];
        assert!((red[0] - 0.25).abs() < 1e-12);
        assert!((red[1] - 0.5).abs() < 1e-12);
        let cart = traj.xcart(1).unwrap()[0];
        assert!((cart[0] - 2.5).abs() < 1e-12);
        assert!(matches!(
            traj.move_atom(1, 2, 0.0, 0.0, 0.0),
            Err(TrajError::OutOfRange(_))
        ));
    }

    #[test]
    fn shift_origin_moves_every_atom() {
        let mut traj = two_atom_store(false);
        traj.shift_origin(0, 0.5, 0.5, 0.5).unwrap();
        let red = traj.xred(0).unwrap();
        assert!((red[1][0]).abs() < 1e-12);
        assert!((red[0][0] + 0.5).abs() < 1e-12);
        assert!((traj.xcart(0).unwrap()[0][0] + 5.0).abs() < 1e-12);
    }

    #[test]
    fn average_builds_single_step() {
        let traj = two_atom_store(false);
        let avg = traj.average(0, 4).unwrap();
        assert_eq!(avg.ntime(), 1);
        assert!((avg.xred(0).unwrap()[0][0] - 0.15).abs() < 1e-12);
        assert!((avg.etotal(0).unwrap() + 2.5).abs() < 1e-12);
        assert!((avg.time(0).unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn average_follows_nearest_image_when_periodic() {
        let species = Species::new(vec![0], vec![1], 1).unwrap();
        let snaps = vec![
            Snapshot::from_reduced([1.0; 3], cubic(10.0), vec![[0.95, 0.0, 0.0]], 0.0).unwrap(),
            Snapshot::from_reduced([1.0; 3], cubic(10.0), vec![[0.05, 0.0, 0.0]], 1.0).unwrap(),
        ];
        let traj = Trajectory::from_snapshots(species, true, snaps).unwrap();
        let avg = traj.average(0, 2).unwrap();
        let x = avg.xred(0).unwrap()[0][0];
        assert!(x < 1e-9 || (1.0 - x) < 1e-9, "got {x}");
    }

    #[test]
    fn centroid_averages_images() {
        let species = Species::new(vec![0, 0], vec![1], 2).unwrap();
        let snap =
            Snapshot::from_cartesian([1.0; 3], cubic(10.0), vec![[1.0, 0.0, 0.0], [3.0, 0.0, 0.0]], 0.0)
                .unwrap();
        let traj = Trajectory::from_snapshots(species, false, vec![snap]).unwrap();
        let c = traj.centroid().unwrap();
        assert_eq!(c.natom(), 1);
        assert_eq!(c.nimage(), 1);
        assert!((c.xcart(0).unwrap()[0][0] - 2.0).abs() < 1e-12);
        assert!(matches!(c.centroid(), Err(TrajError::Unsupported(_))));
    }

    #[test]
    fn finite_difference_velocity_and_temperature() {
        let traj = two_atom_store(true);
        let v = traj.velocities(1).unwrap();
        assert!((v[0][0] - 1.0).abs() < 1e-9);
        assert!(v[1][0].abs() < 1e-12);
        assert!(traj.temperature(1).unwrap() > 0.0);
    }

    #[test]
    fn push_rejects_wrong_atom_count() {
        let mut traj = two_atom_store(false);
        let snap = Snapshot::from_reduced([1.0; 3], cubic(10.0), vec![[0.0; 3]], 9.0).unwrap();
        assert!(matches!(traj.push(snap), Err(TrajError::DimensionMismatch(_))));
        assert_eq!(traj.ntime(), 4);
    }
}
