use crate::error::{JkError, Result};
use basis::BasisSet;
use nalgebra::{DMatrix, DVector, Dyn, LU};

/// Replaces `m` by (m + mᵀ) / 2. The result is exactly symmetric.
pub fn hermitivitize(m: &mut DMatrix<f64>) {
    let n = m.nrows();
    for i in 0..n {
        for j in 0..i {
            let value = (m[(i, j)] + m[(j, i)]) * 0.5;
            m[(i, j)] = value;
            m[(j, i)] = value;
        }
    }
}

/// Largest |M[m][n]| over all matrices for every shell pair (M, N), with `columns` giving
/// the shell layout of the column space.
pub fn shell_block_max(
    rows: &BasisSet,
    columns: &BasisSet,
    matrices: &[DMatrix<f64>],
) -> DMatrix<f64> {
    let mut maxima = DMatrix::zeros(rows.nshell(), columns.nshell());
    for (m, shell_m) in rows.shells().iter().enumerate() {
        for (n, shell_n) in columns.shells().iter().enumerate() {
            let mut block_max = 0.0_f64;
            for matrix in matrices {
                for i in shell_m.function_range() {
                    for j in shell_n.function_range() {
                        block_max = block_max.max(matrix[(i, j)].abs());
                    }
                }
            }
            maxima[(m, n)] = block_max;
        }
    }
    maxima
}

/// LU factorization kept around to solve several right-hand sides against one matrix.
pub struct LuSolver {
    name: &'static str,
    lu: LU<f64, Dyn, Dyn>,
}

impl LuSolver {
    /// Factorizes `matrix`; `name` identifies it in error messages.
    pub fn new(name: &'static str, matrix: DMatrix<f64>) -> Result<Self> {
        let lu = matrix.lu();
        if !lu.is_invertible() {
            return Err(JkError::SingularMatrix(name));
        }
        Ok(Self { name, lu })
    }

    pub fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>> {
        self.lu.solve(rhs).ok_or(JkError::SingularMatrix(self.name))
    }

    pub fn solve_matrix(&self, rhs: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.lu.solve(rhs).ok_or(JkError::SingularMatrix(self.name))
    }
}
