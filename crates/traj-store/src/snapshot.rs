use crate::cell::Cell;
use crate::error::{TrajError, TrajResult};

/// Static per-atom attributes shared by every step of a store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Species {
    typat: Vec<usize>,
    znucl: Vec<u32>,
    nimage: usize,
}

impl Species {
    pub fn new(typat: Vec<usize>, znucl: Vec<u32>, nimage: usize) -> TrajResult<Self> {
        if nimage == 0 {
            return Err(TrajError::Invalid("nimage must be at least 1".into()));
        }
        if typat.len() % nimage != 0 {
            return Err(TrajError::DimensionMismatch(format!(
                "{} atoms cannot be split into {nimage} images",
                typat.len()
            )));
        }
        if let Some(&bad) = typat.iter().find(|&&t| t >= znucl.len()) {
            return Err(TrajError::Invalid(format!(
                "typat {bad} has no znucl entry ({} types)",
                znucl.len()
            )));
        }
        Ok(Self {
            typat,
            znucl,
            nimage,
        })
    }

    /// One type per distinct atomic number, in order of first appearance.
    pub fn from_znucl_per_atom(per_atom: &[u32]) -> Self {
        let mut znucl: Vec<u32> = Vec::new();
        let mut typat = Vec::with_capacity(per_atom.len());
        for &z in per_atom {
            let ty = match znucl.iter().position(|&k| k == z) {
                Some(ty) => ty,
                None => {
                    znucl.push(z);
                    znucl.len() - 1
                }
            };
            typat.push(ty);
        }
        Self {
            typat,
            znucl,
            nimage: 1,
        }
    }

    pub fn natom(&self) -> usize {
        self.typat.len()
    }

    pub fn ntypes(&self) -> usize {
        self.znucl.len()
    }

    pub fn nimage(&self) -> usize {
        self.nimage
    }

    /// Atoms per image.
    pub fn natom_per_image(&self) -> usize {
        self.typat.len() / self.nimage
    }

    pub fn typat(&self) -> &[usize] {
        &self.typat
    }

    pub fn znucl(&self) -> &[u32] {
        &self.znucl
    }

    pub fn znucl_of(&self, atom: usize) -> u32 {
        self.znucl[self.typat[atom]]
    }

    pub fn atoms_of_type(&self, ty: usize) -> Vec<usize> {
        self.typat
            .iter()
            .enumerate()
            .filter(|(_, &t)| t == ty)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Atoms whose atomic number matches; `None` selects every atom.
    pub fn atoms_with_znucl(&self, znucl: Option<u32>) -> Vec<usize> {
        (0..self.natom())
            .filter(|&a| znucl.map_or(true, |z| self.znucl_of(a) == z))
            .collect()
    }

    pub(crate) fn permuted(&self, perm: &[usize]) -> Self {
        Self {
            typat: perm.iter().map(|&src| self.typat[src]).collect(),
            znucl: self.znucl.clone(),
            nimage: self.nimage,
        }
    }

    pub(crate) fn single_image(&self) -> Self {
        Self {
            typat: self.typat[..self.natom_per_image()].to_vec(),
            znucl: self.znucl.clone(),
            nimage: 1,
        }
    }
}

/// Full physical state at one time index.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub(crate) xcart: Vec<[f64; 3]>,
    pub(crate) xred: Vec<[f64; 3]>,
    pub(crate) fcart: Option<Vec<[f64; 3]>>,
    pub(crate) vel: Option<Vec<[f64; 3]>>,
    pub(crate) spinat: Option<Vec<[f64; 3]>>,
    pub(crate) acell: [f64; 3],
    pub(crate) rprimd: [[f64; 3]; 3],
    pub(crate) time: f64,
    pub(crate) etotal: Option<f64>,
    pub(crate) stress: Option<[f64; 6]>,
}

impl Snapshot {
    pub fn from_reduced(
        acell: [f64; 3],
        rprimd: [[f64; 3]; 3],
        xred: Vec<[f64; 3]>,
        time: f64,
    ) -> TrajResult<Self> {
        let cell = Cell::new(rprimd)?;
        let xcart = xred.iter().map(|&r| cell.to_cartesian(r)).collect();
        Ok(Self::bare(acell, rprimd, xcart, xred, time))
    }

    pub fn from_cartesian(
        acell: [f64; 3],
        rprimd: [[f64; 3]; 3],
        xcart: Vec<[f64; 3]>,
        time: f64,
    ) -> TrajResult<Self> {
        let cell = Cell::new(rprimd)?;
        let xred = xcart.iter().map(|&c| cell.to_reduced(c)).collect();
        Ok(Self::bare(acell, rprimd, xcart, xred, time))
    }

    fn bare(
        acell: [f64; 3],
        rprimd: [[f64; 3]; 3],
        xcart: Vec<[f64; 3]>,
        xred: Vec<[f64; 3]>,
        time: f64,
    ) -> Self {
        Self {
            xcart,
            xred,
            fcart: None,
            vel: None,
            spinat: None,
            acell,
            rprimd,
            time,
            etotal: None,
            stress: None,
        }
    }

    pub fn with_forces(mut self, fcart: Vec<[f64; 3]>) -> Self {
        self.fcart = Some(fcart);
        self
    }

    pub fn with_velocities(mut self, vel: Vec<[f64; 3]>) -> Self {
        self.vel = Some(vel);
        self
    }

    pub fn with_spins(mut self, spinat: Vec<[f64; 3]>) -> Self {
        self.spinat = Some(spinat);
        self
    }

    pub fn with_etotal(mut self, etotal: f64) -> Self {
        self.etotal = Some(etotal);
        self
    }

    pub fn with_stress(mut self, stress: [f64; 6]) -> Self {
        self.stress = Some(stress);
        self
    }

    pub fn natom(&self) -> usize {
        self.xcart.len()
    }

    pub fn xcart(&self) -> &[[f64; 3]] {
        &self.xcart
    }

    pub fn xred(&self) -> &[[f64; 3]] {
        &self.xred
    }

    pub fn fcart(&self) -> Option<&[[f64; 3]]> {
        self.fcart.as_deref()
    }

    pub fn vel(&self) -> Option<&[[f64; 3]]> {
        self.vel.as_deref()
    }

    pub fn spinat(&self) -> Option<&[[f64; 3]]> {
        self.spinat.as_deref()
    }

    pub fn acell(&self) -> [f64; 3] {
        self.acell
    }

    pub fn rprimd(&self) -> &[[f64; 3]; 3] {
        &self.rprimd
    }

    pub fn cell(&self) -> TrajResult<Cell> {
        Cell::new(self.rprimd)
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn etotal(&self) -> Option<f64> {
        self.etotal
    }

    pub fn stress(&self) -> Option<[f64; 6]> {
        self.stress
    }

    /// Checks per-atom array lengths and the cell against `natom`.
    pub fn validate(&self, natom: usize) -> TrajResult<()> {
        let check = |label: &str, len: usize| {
            if len != natom {
                return Err(TrajError::DimensionMismatch(format!(
                    "snapshot {label} has {len} atoms, expected {natom}"
                )));
            }
            Ok(())
        };
        check("xcart", self.xcart.len())?;
        check("xred", self.xred.len())?;
        if let Some(f) = &self.fcart {
            check("fcart", f.len())?;
        }
        if let Some(v) = &self.vel {
            check("vel", v.len())?;
        }
        if let Some(s) = &self.spinat {
            check("spinat", s.len())?;
        }
        Cell::new(self.rprimd)?;
        Ok(())
    }

    /// Recompute `xcart[atom]` from `xred[atom]`.
    pub(crate) fn sync_cartesian(&mut self, cell: &Cell, atom: usize) {
        self.xcart[atom] = cell.to_cartesian(self.xred[atom]);
    }

    pub(crate) fn sync_all_cartesian(&mut self, cell: &Cell) {
        for atom in 0..self.xred.len() {
            self.sync_cartesian(cell, atom);
        }
    }

    pub(crate) fn permuted(&self, perm: &[usize]) -> Self {
        let pick = |v: &Vec<[f64; 3]>| perm.iter().map(|&src| v[src]).collect::<Vec<_>>();
        Self {
            xcart: pick(&self.xcart),
            xred: pick(&self.xred),
            fcart: self.fcart.as_ref().map(pick),
            vel: self.vel.as_ref().map(pick),
            spinat: self.spinat.as_ref().map(pick),
            acell: self.acell,
            rprimd: self.rprimd,
            time: self.time,
            etotal: self.etotal,
            stress: self.stress,
        }
    }
}
