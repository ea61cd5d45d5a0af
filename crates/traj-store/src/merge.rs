//! Concatenation of trajectories and atom correspondence between them.

use log::debug;

use crate::config::ReorderConfig;
use crate::error::{TrajError, TrajResult};
use crate::trajectory::Trajectory;

fn require_same_natom(a: &Trajectory, b: &Trajectory) -> TrajResult<()> {
    if a.natom() != b.natom() {
        return Err(TrajError::DimensionMismatch(format!(
            "stores hold {} and {} atoms",
            a.natom(),
            b.natom()
        )));
    }
    Ok(())
}

/// Kuhn augmenting path from `i` over the within-tolerance candidates.
fn augment(
    i: usize,
    adjacency: &[Vec<usize>],
    perm: &mut [usize],
    owner: &mut [usize],
    visited: &mut [bool],
) -> bool {
    for &j in &adjacency[i] {
        if visited[j] {
            continue;
        }
        visited[j] = true;
        if owner[j] == usize::MAX || augment(owner[j], adjacency, perm, owner, visited) {
            perm[i] = j;
            owner[j] = i;
            return true;
        }
    }
    false
}

/// Permutation `perm` such that atom `i` of `a` (last step) corresponds to
/// atom `perm[i]` of `b` (first step).
///
/// Candidate pairs must share an atomic number and lie within `tolerance`.
/// Pairs are ranked by minimum-image distance, ties resolved toward the
/// lowest index in `a` and then in `b`, and accepted greedily while both
/// atoms are free. Atoms the greedy pass leaves unpaired are placed by
/// augmenting paths, so `Unmatchable` means no complete matching exists.
pub fn reorder(a: &Trajectory, b: &Trajectory, tolerance: f64) -> TrajResult<Vec<usize>> {
    require_same_natom(a, b)?;
    if a.is_empty() || b.is_empty() {
        return Err(TrajError::Unmatchable("cannot match atoms of an empty store".into()));
    }
    let natom = a.natom();
    let snap_a = a.snapshot(a.ntime() - 1)?;
    let snap_b = b.snapshot(0)?;
    let cell = snap_b.cell()?;
    let periodic = a.is_periodic() || b.is_periodic();

    let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
    for i in 0..natom {
        let za = a.species().znucl_of(i);
        let pa = snap_a.xcart()[i];
        for j in 0..natom {
            if b.species().znucl_of(j) != za {
                continue;
            }
            let pb = snap_b.xcart()[j];
            let d = if periodic {
                cell.minimum_image(pb, pa)
            } else {
                [pb[0] - pa[0], pb[1] - pa[1], pb[2] - pa[2]]
            };
            let dist = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
            if dist <= tolerance {
                pairs.push((dist, i, j));
            }
        }
    }
    pairs.sort_by(|x, y| {
        x.0.total_cmp(&y.0)
            .then(x.1.cmp(&y.1))
            .then(x.2.cmp(&y.2))
    });

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); natom];
    for &(_, i, j) in &pairs {
        adjacency[i].push(j);
    }

    // Greedy pass in ranked order, then augmenting paths for anything left.
    let mut perm = vec![usize::MAX; natom];
    let mut owner = vec![usize::MAX; natom];
    for &(_, i, j) in &pairs {
        if perm[i] == usize::MAX && owner[j] == usize::MAX {
            perm[i] = j;
            owner[j] = i;
        }
    }
    let mut repaired = 0;
    for i in 0..natom {
        if perm[i] != usize::MAX {
            continue;
        }
        let mut visited = vec![false; natom];
        if !augment(i, &adjacency, &mut perm, &mut owner, &mut visited) {
            return Err(TrajError::Unmatchable(format!(
                "atom {i} has no partner within {tolerance}"
            )));
        }
        repaired += 1;
    }
    if repaired > 0 {
        debug!("reorder repaired {repaired} greedy conflicts");
    }
    debug!(
        "reorder matched {natom} atoms, {} moved",
        perm.iter().enumerate().filter(|(i, &j)| *i != j).count()
    );
    Ok(perm)
}

impl Trajectory {
    /// Reorder atoms so that new atom `i` is old atom `perm[i]`.
    pub fn permute_atoms(&mut self, perm: &[usize]) -> TrajResult<()> {
        let natom = self.natom();
        if perm.len() != natom {
            return Err(TrajError::DimensionMismatch(format!(
                "permutation has {} entries for {natom} atoms",
                perm.len()
            )));
        }
        let mut seen = vec![false; natom];
        for &src in perm {
            if src >= natom || seen[src] {
                return Err(TrajError::Invalid(format!(
                    "permutation entry {src} is out of range or repeated"
                )));
            }
            seen[src] = true;
        }
        let species = self.species().permuted(perm);
        let steps = self.steps.iter().map(|s| s.permuted(perm)).collect();
        *self = Trajectory::from_snapshots(species, self.is_periodic(), steps)?;
        Ok(())
    }

    /// Concatenate `other` after `self`. The appended steps are re-timed to
    /// continue this store's own last time increment.
    pub fn append(&mut self, other: &Trajectory) -> TrajResult<()> {
        require_same_natom(self, other)?;
        if self.species() != other.species() {
            return Err(TrajError::DimensionMismatch(
                "stores have different species layouts".into(),
            ));
        }
        if self.is_periodic() != other.is_periodic() {
            return Err(TrajError::DimensionMismatch(
                "cannot append a periodic store to a non-periodic one".into(),
            ));
        }
        let times = self.times();
        let (origin, dt) = match times.len() {
            0 => (-1.0, 1.0),
            1 => (times[0], 1.0),
            n => {
                let step = times[n - 1] - times[n - 2];
                (times[n - 1], if step > 0.0 { step } else { 1.0 })
            }
        };
        debug!(
            "appending {} steps after {} (dt = {dt})",
            other.ntime(),
            self.ntime()
        );
        self.steps.reserve(other.ntime());
        for (k, snap) in other.snapshots().iter().enumerate() {
            let mut snap = snap.clone();
            snap.time = origin + (k + 1) as f64 * dt;
            self.steps.push(snap);
        }
        Ok(())
    }

    /// Match `other`'s atoms onto this store's ordering, then append.
    pub fn append_reordered(&mut self, other: &Trajectory, tolerance: f64) -> TrajResult<()> {
        let perm = reorder(self, other, tolerance)?;
        let mut aligned = other.clone();
        aligned.permute_atoms(&perm)?;
        // Matched atoms share atomic numbers, so this store's type table applies.
        let aligned = Trajectory::from_snapshots(
            self.species().clone(),
            aligned.is_periodic(),
            aligned.steps,
        )?;
        self.append(&aligned)
    }

    /// [`append_reordered`](Self::append_reordered) with the configured
    /// matching tolerance.
    pub fn append_reordered_with(&mut self, other: &Trajectory, cfg: &ReorderConfig) -> TrajResult<()> {
        let tolerance = cfg.tolerance();
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(TrajError::Invalid(format!(
                "reorder tolerance {tolerance} must be positive"
            )));
        }
        self.append_reordered(other, tolerance)
    }
}
