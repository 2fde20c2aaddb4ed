//! Integral-direct density-fitted Coulomb matrix.
//!
//! J is built from two screened passes over the (P|MN) triplets: the first contracts the
//! density into G_P = Σ (P|mn) D_mn, the metric solve turns G into fitting coefficients H,
//! and the second pass contracts J_mn = Σ (P|mn) H_P. No three-index tensor is stored.

use crate::error::Result;
use crate::linalg::{hermitivitize, shell_block_max};
use crate::metric::FittingMetric;
use crate::parallel::chunk_ranges;
use crate::screening::ScreeningBounds;
use basis::{BasisSet, IntegralEngine};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

pub struct DirectDfJ<E: IntegralEngine> {
    primary: Arc<BasisSet>,
    auxiliary: Arc<BasisSet>,
    engine: E,
    screening: Arc<ScreeningBounds>,
    metric: FittingMetric,
    tolerance: f64,
    computed_triplets: usize,
}

impl<E: IntegralEngine> DirectDfJ<E> {
    pub fn new(
        primary: Arc<BasisSet>,
        auxiliary: Arc<BasisSet>,
        engine: E,
        screening: Arc<ScreeningBounds>,
        tolerance: f64,
    ) -> Result<Self> {
        let metric = FittingMetric::new(&auxiliary, &engine)?;
        Ok(Self {
            primary,
            auxiliary,
            engine,
            screening,
            metric,
            tolerance,
            computed_triplets: 0,
        })
    }

    pub fn name(&self) -> &'static str {
        "DirectDFJ"
    }

    /// Triplets evaluated by the last build, both passes together.
    pub fn num_computed_triplets(&self) -> usize {
        self.computed_triplets
    }

    pub fn naux(&self) -> usize {
        self.metric.naux()
    }

    /// Adds the Coulomb matrix of every density to `j`. Must run inside the worker pool.
    pub fn build(&mut self, densities: &[DMatrix<f64>], j: &mut [DMatrix<f64>]) -> Result<()> {
        let thresh2 = self.tolerance * self.tolerance;
        let pairs = self.screening.significant_pairs();
        let naux_shell = self.auxiliary.nshell();
        let ntriplet = pairs.len() * naux_shell;
        let jdiag = self.metric.shell_diagonal_max();

        // first contraction: G_P = Σ (P|mn) D_mn
        let d_shell = shell_block_max(&self.primary, &self.primary, densities);
        let (g, computed_g) = self.contract_density(&pairs, ntriplet, densities, |m, n, p| {
            let d = d_shell[(m, n)];
            d * d * jdiag[p] * self.screening.pair_value(m, n) >= thresh2
        });

        let h = g
            .iter()
            .map(|g| self.metric.solve(g))
            .collect::<Result<Vec<DVector<f64>>>>()?;

        let h_shell: Vec<f64> = self
            .auxiliary
            .shells()
            .iter()
            .map(|shell| {
                h.iter()
                    .flat_map(|h| shell.function_range().map(move |p| h[p].abs()))
                    .fold(0.0, f64::max)
            })
            .collect();

        // second contraction: J_mn = Σ (P|mn) H_P
        let (contributions, computed_j) = self.contract_fit(&pairs, ntriplet, &h, |m, n, p| {
            h_shell[p] * h_shell[p] * jdiag[p] * self.screening.pair_value(m, n) >= thresh2
        });

        for (j, contribution) in j.iter_mut().zip(contributions) {
            *j += contribution;
            hermitivitize(j);
        }

        self.computed_triplets = computed_g + computed_j;
        debug!(
            "{}: {} of {} triplets computed per pass ({} + {})",
            self.name(),
            self.computed_triplets,
            2 * ntriplet,
            computed_g,
            computed_j
        );
        Ok(())
    }

    fn contract_density<F>(
        &self,
        pairs: &[(usize, usize)],
        ntriplet: usize,
        densities: &[DMatrix<f64>],
        significant: F,
    ) -> (Vec<DVector<f64>>, usize)
    where
        F: Fn(usize, usize, usize) -> bool + Sync,
    {
        let naux = self.metric.naux();
        let npair = pairs.len();
        let partials: Vec<(Vec<DVector<f64>>, usize)> = chunk_ranges(ntriplet)
            .into_par_iter()
            .map_init(
                || self.engine.clone(),
                |engine, range| {
                    let mut g = vec![DVector::zeros(naux); densities.len()];
                    let mut computed = 0;
                    for triplet in range {
                        let (m_shell, n_shell) = pairs[triplet % npair];
                        let p_shell = triplet / npair;
                        if !significant(m_shell, n_shell, p_shell) {
                            continue;
                        }
                        computed += 1;

                        let (sm, sn) = (self.primary.shell(m_shell), self.primary.shell(n_shell));
                        let sp = self.auxiliary.shell(p_shell);
                        let (nm, nn) = (sm.nfunction(), sn.nfunction());
                        let block = engine.triplet(p_shell, m_shell, n_shell);
                        for (density, g) in densities.iter().zip(g.iter_mut()) {
                            for (ip, p) in sp.function_range().enumerate() {
                                let mut value = 0.0;
                                for (im, m) in sm.function_range().enumerate() {
                                    for (in_, n) in sn.function_range().enumerate() {
                                        let mut d = density[(m, n)];
                                        if m_shell != n_shell {
                                            d += density[(n, m)];
                                        }
                                        value += block[(ip * nm + im) * nn + in_] * d;
                                    }
                                }
                                g[p] += value;
                            }
                        }
                    }
                    (g, computed)
                },
            )
            .collect();

        let mut g = vec![DVector::zeros(naux); densities.len()];
        let mut computed = 0;
        for (partial, count) in partials {
            for (total, part) in g.iter_mut().zip(partial) {
                *total += part;
            }
            computed += count;
        }
        (g, computed)
    }

    fn contract_fit<F>(
        &self,
        pairs: &[(usize, usize)],
        ntriplet: usize,
        h: &[DVector<f64>],
        significant: F,
    ) -> (Vec<DMatrix<f64>>, usize)
    where
        F: Fn(usize, usize, usize) -> bool + Sync,
    {
        let nbf = self.primary.nbf();
        let npair = pairs.len();
        let partials: Vec<(Vec<DMatrix<f64>>, usize)> = chunk_ranges(ntriplet)
            .into_par_iter()
            .map_init(
                || self.engine.clone(),
                |engine, range| {
                    let mut j = vec![DMatrix::zeros(nbf, nbf); h.len()];
                    let mut computed = 0;
                    for triplet in range {
                        let (m_shell, n_shell) = pairs[triplet % npair];
                        let p_shell = triplet / npair;
                        if !significant(m_shell, n_shell, p_shell) {
                            continue;
                        }
                        computed += 1;

                        let (sm, sn) = (self.primary.shell(m_shell), self.primary.shell(n_shell));
                        let sp = self.auxiliary.shell(p_shell);
                        let (nm, nn) = (sm.nfunction(), sn.nfunction());
                        let block = engine.triplet(p_shell, m_shell, n_shell);
                        for (h, j) in h.iter().zip(j.iter_mut()) {
                            for (im, m) in sm.function_range().enumerate() {
                                for (in_, n) in sn.function_range().enumerate() {
                                    let mut value = 0.0;
                                    for (ip, p) in sp.function_range().enumerate() {
                                        value += block[(ip * nm + im) * nn + in_] * h[p];
                                    }
                                    j[(m, n)] += value;
                                    if m_shell != n_shell {
                                        j[(n, m)] += value;
                                    }
                                }
                            }
                        }
                    }
                    (j, computed)
                },
            )
            .collect();

        let mut j = vec![DMatrix::zeros(nbf, nbf); h.len()];
        let mut computed = 0;
        for (partial, count) in partials {
            for (total, part) in j.iter_mut().zip(partial) {
                *total += part;
            }
            computed += count;
        }
        (j, computed)
    }
}
