//! Dense linear algebra for small systems

use std::ops::Mul;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

const SINGULAR: f64 = 1e-12;

/// Solve `a · x = b` by Gaussian elimination with partial pivoting
pub fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, DomainError> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(DomainError::BadArgs(format!(
            "Linear system needs a {}x{} matrix",
            n, n
        )));
    }
    let scale = a
        .iter()
        .flatten()
        .fold(0.0_f64, |m, v| m.max(v.abs()))
        .max(1.0);

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() <= SINGULAR * scale {
            return Err(DomainError::Geometry(
                "Linear system is singular".to_string(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

/// Least squares solution of the overdetermined system `rows · p ≈ b`
pub fn least_squares(rows: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>, DomainError> {
    let m = rows.first().map(Vec::len).unwrap_or(0);
    if rows.len() < m || m == 0 || rows.len() != b.len() {
        return Err(DomainError::BadArgs(format!(
            "Least squares fit needs at least {} equations, got {}",
            m.max(1),
            rows.len()
        )));
    }
    let mut ata = vec![vec![0.0; m]; m];
    let mut atb = vec![0.0; m];
    for (row, &rhs) in rows.iter().zip(b) {
        for i in 0..m {
            atb[i] += row[i] * rhs;
            for j in 0..m {
                ata[i][j] += row[i] * row[j];
            }
        }
    }
    solve(ata, atb)
}

/// 3×3 matrix, row-major
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix3(pub [[f64; 3]; 3]);

impl Matrix3 {
    pub fn identity() -> Self {
        Matrix3([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.0;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    pub fn inverse(&self) -> Result<Matrix3, DomainError> {
        let det = self.determinant();
        if det.abs() < SINGULAR {
            return Err(DomainError::Calibration(
                "Transformation matrix is singular".to_string(),
            ));
        }
        let m = &self.0;
        let cofactor = |r0: usize, r1: usize, c0: usize, c1: usize| {
            m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]
        };
        // adjugate is the transposed cofactor matrix
        let adj = [
            [cofactor(1, 2, 1, 2), -cofactor(0, 2, 1, 2), cofactor(0, 1, 1, 2)],
            [-cofactor(1, 2, 0, 2), cofactor(0, 2, 0, 2), -cofactor(0, 1, 0, 2)],
            [cofactor(1, 2, 0, 1), -cofactor(0, 2, 0, 1), cofactor(0, 1, 0, 1)],
        ];
        let mut inv = [[0.0; 3]; 3];
        for (r, row) in adj.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                inv[r][c] = value / det;
            }
        }
        Ok(Matrix3(inv))
    }

    /// Upper left 2×2 block
    pub fn block_2d(&self) -> [[f64; 2]; 2] {
        let m = &self.0;
        [[m[0][0], m[0][1]], [m[1][0], m[1][1]]]
    }
}

impl Mul<[f64; 3]> for Matrix3 {
    type Output = [f64; 3];

    fn mul(self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.0;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }
}

/// 2×2 matrix times vector
pub fn mul_2d(m: [[f64; 2]; 2], v: [f64; 2]) -> [f64; 2] {
    [
        m[0][0] * v[0] + m[0][1] * v[1],
        m[1][0] * v[0] + m[1][1] * v[1],
    ]
}
