//! Integral bounds shared by the builders.
//!
//! The Schwarz table `pair_value(M, N) = max |(mn|mn)|` is computed once per basis. Density
//! maxima per shell pair are recomputed by the builders every call (see
//! [`crate::linalg::shell_block_max`]).

use crate::config::ScreeningType;
use crate::parallel::chunk_ranges;
use basis::{BasisSet, IntegralEngine};
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::f64::consts::PI;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ScreeningBounds {
    pair_values: DMatrix<f64>,
    max_integral: f64,
    cutoff: f64,
    screening: ScreeningType,
}

impl ScreeningBounds {
    /// Evaluates every diagonal quartet (MN|MN) of `basis`.
    pub fn new<E: IntegralEngine>(
        basis: &BasisSet,
        engine: &E,
        cutoff: f64,
        screening: ScreeningType,
    ) -> Self {
        let nshell = basis.nshell();
        let pairs: Vec<(usize, usize)> = (0..nshell)
            .flat_map(|m| (0..=m).map(move |n| (m, n)))
            .collect();

        let values: Vec<Vec<f64>> = chunk_ranges(pairs.len())
            .into_par_iter()
            .map_init(
                || engine.clone(),
                |engine, range| {
                    pairs[range]
                        .iter()
                        .map(|&(m, n)| diagonal_maximum(engine, basis, m, n))
                        .collect()
                },
            )
            .collect();

        let mut pair_values = DMatrix::zeros(nshell, nshell);
        for (&(m, n), value) in pairs.iter().zip(values.into_iter().flatten()) {
            pair_values[(m, n)] = value;
            pair_values[(n, m)] = value;
        }
        Self::from_pair_values(pair_values, cutoff, screening)
    }

    pub fn from_pair_values(pair_values: DMatrix<f64>, cutoff: f64, screening: ScreeningType) -> Self {
        let max_integral = pair_values.iter().cloned().fold(0.0, f64::max);
        let bounds = Self {
            pair_values,
            max_integral,
            cutoff,
            screening,
        };
        debug!(
            "Schwarz screening: {} of {} shell pairs significant, max (mn|mn) = {:.6e}",
            bounds.significant_pairs().len(),
            bounds.nshell() * (bounds.nshell() + 1) / 2,
            max_integral
        );
        bounds
    }

    pub fn nshell(&self) -> usize {
        self.pair_values.nrows()
    }

    /// max |(mn|mn)| over the functions of shells M and N.
    #[inline]
    pub fn pair_value(&self, m: usize, n: usize) -> f64 {
        self.pair_values[(m, n)]
    }

    pub fn max_integral(&self) -> f64 {
        self.max_integral
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn density_screening(&self) -> bool {
        self.screening == ScreeningType::Density
    }

    /// Whether any quartet with bra (M, N) can exceed the cutoff.
    #[inline]
    pub fn shell_significant(&self, m: usize, n: usize) -> bool {
        self.pair_values[(m, n)] * self.max_integral >= self.cutoff * self.cutoff
    }

    /// Final quartet test; `density` holds per-shell-pair density maxima and is only used
    /// under density screening.
    pub fn quartet_significant(
        &self,
        p: usize,
        q: usize,
        r: usize,
        s: usize,
        density: Option<&DMatrix<f64>>,
    ) -> bool {
        let ceiling2 = self.pair_values[(p, q)] * self.pair_values[(r, s)];
        let cutoff2 = self.cutoff * self.cutoff;
        match density {
            Some(d) if self.density_screening() => {
                let dmax = d[(p, r)].max(d[(p, s)]).max(d[(q, r)]).max(d[(q, s)]);
                ceiling2 * dmax * dmax >= cutoff2
            }
            _ => ceiling2 >= cutoff2,
        }
    }

    /// Significant pairs (M, N) with M >= N, ordered by M then N.
    pub fn significant_pairs(&self) -> Vec<(usize, usize)> {
        let nshell = self.nshell();
        (0..nshell)
            .flat_map(|m| (0..=m).map(move |n| (m, n)))
            .filter(|&(m, n)| self.shell_significant(m, n))
            .collect()
    }
}

fn diagonal_maximum<E: IntegralEngine>(engine: &mut E, basis: &BasisSet, m: usize, n: usize) -> f64 {
    let nm = basis.shell(m).nfunction();
    let nn = basis.shell(n).nfunction();
    let block = engine.quartet(m, n, m, n);
    let mut value = 0.0_f64;
    for i in 0..nm {
        for j in 0..nn {
            let mn = i * nn + j;
            value = value.max(block[mn * nm * nn + mn].abs());
        }
    }
    value
}

/// Overlap-only bound on the electrostatic potential integrals of every shell pair,
/// independent of where the potential is evaluated.
pub fn esp_bounds(basis: &BasisSet) -> DMatrix<f64> {
    let nshell = basis.nshell();
    let mut bounds = DMatrix::zeros(nshell, nshell);
    for s1 in 0..nshell {
        for s2 in 0..=s1 {
            let (shell1, shell2) = (basis.shell(s1), basis.shell(s2));
            let r2 = (shell1.center - shell2.center).norm_squared();
            let (f1, f2) = (&shell1.functions[0], &shell2.functions[0]);
            let mut value = 0.0;
            for (g1, c1) in f1.primitives.iter().zip(f1.coefficients.iter()) {
                for (g2, c2) in f2.primitives.iter().zip(f2.coefficients.iter()) {
                    let (e1, e2) = (g1.alpha, g2.alpha);
                    let sum = e1 + e2;
                    value += c1 * g1.norm * c2 * g2.norm * (-r2 * e1 * e2 / sum).exp() * 2.0 * PI / sum;
                }
            }
            bounds[(s1, s2)] = f64::abs(value);
            bounds[(s2, s1)] = f64::abs(value);
        }
    }
    bounds
}
