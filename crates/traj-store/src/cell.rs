use nalgebra::Matrix3;

use crate::error::{TrajError, TrajResult};
use crate::geom::Vec3;

/// Simulation cell. Rows of `rprimd` are the primitive vectors (already
/// scaled by `acell`), so `xcart = xred · rprimd`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    rprimd: [[f64; 3]; 3],
    inv: [[f64; 3]; 3],
}

impl Cell {
    pub fn new(rprimd: [[f64; 3]; 3]) -> TrajResult<Self> {
        let m = to_matrix(&rprimd);
        let inv = m
            .try_inverse()
            .ok_or_else(|| TrajError::Invalid("cell vectors are not invertible".into()))?;
        Ok(Self {
            rprimd,
            inv: from_matrix(&inv),
        })
    }

    pub fn orthorhombic(lx: f64, ly: f64, lz: f64) -> TrajResult<Self> {
        Self::new([[lx, 0.0, 0.0], [0.0, ly, 0.0], [0.0, 0.0, lz]])
    }

    pub fn rprimd(&self) -> &[[f64; 3]; 3] {
        &self.rprimd
    }

    pub fn vector(&self, i: usize) -> Vec3 {
        Vec3::from_array(self.rprimd[i])
    }

    pub fn volume(&self) -> f64 {
        to_matrix(&self.rprimd).determinant().abs()
    }

    pub fn to_cartesian(&self, red: [f64; 3]) -> [f64; 3] {
        let r = &self.rprimd;
        let mut out = [0.0f64; 3];
        for (j, o) in out.iter_mut().enumerate() {
            *o = red[0] * r[0][j] + red[1] * r[1][j] + red[2] * r[2][j];
        }
        out
    }

    pub fn to_reduced(&self, cart: [f64; 3]) -> [f64; 3] {
        let inv = &self.inv;
        let mut out = [0.0f64; 3];
        for (j, o) in out.iter_mut().enumerate() {
            *o = cart[0] * inv[0][j] + cart[1] * inv[1][j] + cart[2] * inv[2][j];
        }
        out
    }

    /// Cartesian displacement `a - b` folded to its nearest periodic image.
    pub fn minimum_image(&self, a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
        let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
        let mut f = self.to_reduced(d);
        for v in &mut f {
            *v -= v.round();
        }
        self.to_cartesian(f)
    }

    /// Distance between opposite faces for each lattice direction.
    pub fn plane_spacings(&self) -> [f64; 3] {
        let v = self.volume();
        let a = self.vector(0);
        let b = self.vector(1);
        let c = self.vector(2);
        [
            v / b.cross(c).norm(),
            v / c.cross(a).norm(),
            v / a.cross(b).norm(),
        ]
    }

    pub fn scaled(&self, factors: [f64; 3]) -> TrajResult<Self> {
        if factors.iter().any(|&f| f <= 0.0 || !f.is_finite()) {
            return Err(TrajError::Invalid(format!(
                "cell scaling factors must be positive, got {factors:?}"
            )));
        }
        let mut r = self.rprimd;
        for (row, &f) in r.iter_mut().zip(factors.iter()) {
            for v in row.iter_mut() {
                *v *= f;
            }
        }
        Self::new(r)
    }
}

/// Fold a reduced coordinate into `[0, 1)`.
pub fn fold_reduced(x: f64) -> f64 {
    let y = x - x.floor();
    if y >= 1.0 {
        0.0
    } else {
        y
    }
}

/// Image of `x` nearest to `reference`, both reduced.
pub fn nearest_image(x: f64, reference: f64) -> f64 {
    x + (reference - x).round()
}

fn to_matrix(r: &[[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::new(
        r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2],
    )
}

fn from_matrix(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hexagonal() -> Cell {
        let a = 3.0;
        Cell::new([
            [a, 0.0, 0.0],
            [-0.5 * a, 0.5 * 3.0f64.sqrt() * a, 0.0],
            [0.0, 0.0, 5.0],
        ])
        .unwrap()
    }

    #[test]
    fn reduced_cartesian_roundtrip_triclinic() {
        let cell = hexagonal();
        let red = [0.25, 0.6, 0.9];
        let back = cell.to_reduced(cell.to_cartesian(red));
        for k in 0..3 {
            assert!((back[k] - red[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn volume_of_orthorhombic_cell() {
        let cell = Cell::orthorhombic(2.0, 3.0, 4.0).unwrap();
        assert!((cell.volume() - 24.0).abs() < 1e-12);
        let s = cell.plane_spacings();
        assert!((s[0] - 2.0).abs() < 1e-12);
        assert!((s[2] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn minimum_image_folds_across_boundary() {
        let cell = Cell::orthorhombic(10.0, 10.0, 10.0).unwrap();
        let d = cell.minimum_image([9.5, 0.0, 0.0], [0.5, 0.0, 0.0]);
        assert!((d[0] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn singular_cell_rejected() {
        let err = Cell::new([[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(matches!(err, Err(TrajError::Invalid(_))));
    }

    #[test]
    fn fold_stays_in_unit_interval() {
        assert_eq!(fold_reduced(1.25), 0.25);
        assert_eq!(fold_reduced(-0.25), 0.75);
        let y = fold_reduced(-1e-20);
        assert!((0.0..1.0).contains(&y));
    }
}
