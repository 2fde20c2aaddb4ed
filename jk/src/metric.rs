//! Coulomb metric (P|Q) of the fitting basis.

use crate::error::Result;
use crate::linalg::LuSolver;
use crate::parallel::chunk_ranges;
use basis::{BasisSet, IntegralEngine};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::debug;

/// The metric, kept factorized, and its largest diagonal element per auxiliary shell.
pub struct FittingMetric {
    solver: LuSolver,
    shell_diagonal_max: Vec<f64>,
    naux: usize,
}

impl FittingMetric {
    pub fn new<E: IntegralEngine>(auxiliary: &BasisSet, engine: &E) -> Result<Self> {
        let nshell = auxiliary.nshell();
        let pairs: Vec<(usize, usize)> = (0..nshell)
            .flat_map(|a| (0..=a).map(move |b| (a, b)))
            .collect();

        let blocks: Vec<Vec<Vec<f64>>> = chunk_ranges(pairs.len())
            .into_par_iter()
            .map_init(
                || engine.clone(),
                |engine, range| {
                    pairs[range]
                        .iter()
                        .map(|&(a, b)| engine.two_center(a, b).to_vec())
                        .collect()
                },
            )
            .collect();

        let mut metric = DMatrix::zeros(auxiliary.nbf(), auxiliary.nbf());
        for (&(a, b), block) in pairs.iter().zip(blocks.into_iter().flatten()) {
            let (shell_a, shell_b) = (auxiliary.shell(a), auxiliary.shell(b));
            let nb = shell_b.nfunction();
            for (i, p) in shell_a.function_range().enumerate() {
                for (j, q) in shell_b.function_range().enumerate() {
                    metric[(p, q)] = block[i * nb + j];
                    metric[(q, p)] = block[i * nb + j];
                }
            }
        }
        Self::from_matrix(auxiliary, metric)
    }

    pub fn from_matrix(auxiliary: &BasisSet, metric: DMatrix<f64>) -> Result<Self> {
        let shell_diagonal_max = auxiliary
            .shells()
            .iter()
            .map(|shell| {
                shell
                    .function_range()
                    .map(|p| metric[(p, p)])
                    .fold(0.0, f64::max)
            })
            .collect();
        let naux = metric.nrows();
        debug!("Fitting metric: {} auxiliary functions", naux);
        Ok(Self {
            solver: LuSolver::new("Coulomb fitting metric", metric)?,
            shell_diagonal_max,
            naux,
        })
    }

    pub fn naux(&self) -> usize {
        self.naux
    }

    /// max_{p in P} (p|p) for every auxiliary shell P.
    pub fn shell_diagonal_max(&self) -> &[f64] {
        &self.shell_diagonal_max
    }

    /// Solves metric · h = g.
    pub fn solve(&self, g: &DVector<f64>) -> Result<DVector<f64>> {
        self.solver.solve(g)
    }
}
