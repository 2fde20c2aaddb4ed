//! Overlap fitting for COSX: Q with S_analytic = Q · S_numeric on one grid.

use crate::error::Result;
use crate::grid::MolecularGrid;
use crate::linalg::{hermitivitize, LuSolver};
use crate::parallel::chunk_ranges;
use basis::BasisSet;
use nalgebra::DMatrix;
use rayon::prelude::*;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OverlapFitting {
    q: DMatrix<f64>,
}

impl OverlapFitting {
    pub fn new(basis: &BasisSet, grid: &MolecularGrid, analytic: &DMatrix<f64>) -> Result<Self> {
        let numeric = numeric_overlap(basis, grid);
        // both overlaps are symmetric: S_num Qᵀ = S_an
        let solver = LuSolver::new("numerical overlap", numeric)?;
        let q = solver.solve_matrix(analytic)?.transpose();
        debug!(
            "Overlap fitting on {} points: max |Q - 1| = {:.3e}",
            grid.npoints(),
            (&q - DMatrix::identity(q.nrows(), q.ncols())).amax()
        );
        Ok(Self { q })
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.q
    }
}

/// Σ_g w_g φ_μ(g) φ_ν(g), with the sign of every weight kept apart from its magnitude.
pub fn numeric_overlap(basis: &BasisSet, grid: &MolecularGrid) -> DMatrix<f64> {
    let nbf = basis.nbf();
    let blocks = grid.blocks();

    let partials: Vec<DMatrix<f64>> = chunk_ranges(blocks.len())
        .into_par_iter()
        .map(|range| {
            let mut partial = DMatrix::zeros(nbf, nbf);
            for block in &blocks[range] {
                let functions = block.local_functions();
                if functions.is_empty() {
                    continue;
                }
                let phi = block.basis_values(basis);
                let mut x = phi.clone();
                let mut x_sign = phi;
                for (g, &w) in block.weights().iter().enumerate() {
                    let root = w.abs().sqrt();
                    x.row_mut(g).scale_mut(root);
                    x_sign.row_mut(g).scale_mut(w.signum() * root);
                }
                let local = x_sign.transpose() * &x;
                for (a, &mu) in functions.iter().enumerate() {
                    for (b, &nu) in functions.iter().enumerate() {
                        partial[(mu, nu)] += local[(a, b)];
                    }
                }
            }
            partial
        })
        .collect();

    let mut overlap = DMatrix::zeros(nbf, nbf);
    for partial in partials {
        overlap += partial;
    }
    hermitivitize(&mut overlap);
    overlap
}
