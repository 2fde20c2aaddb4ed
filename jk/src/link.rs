//! Linear exchange (LinK, Ochsenfeld, White and Head-Gordon 1998).
//!
//! Bra pairs are taken from presorted Schwarz lists and ket pairs from density-weighted
//! lists, so each significant bra only meets the kets that can survive screening. Quartets
//! are enumerated once with PQ >= RS, accumulated per atom pair in thread-owned scratch and
//! merged into K with atomic adds.

use crate::error::{JkError, Result};
use crate::linalg::{hermitivitize, shell_block_max};
use crate::parallel::AtomicMatrix;
use crate::screening::ScreeningBounds;
use basis::{BasisSet, IntegralEngine};
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

pub struct Link<E: IntegralEngine> {
    basis: Arc<BasisSet>,
    engine: E,
    screening: Arc<ScreeningBounds>,
    link_cutoff: f64,
    atom_pairs: Vec<(usize, usize)>,
    /// significant Q for every P, largest bound first
    significant_bras: Vec<Vec<usize>>,
    shell_ceilings: Vec<f64>,
    max_atom_functions: usize,
    computed_quartets: usize,
}

/// Per-thread state: an engine and, per density, the four PR/PS/QR/QS stripes of one atom
/// pair.
struct LinkScratch<E> {
    engine: E,
    buffers: Vec<[DMatrix<f64>; 4]>,
}

impl<E: IntegralEngine> Link<E> {
    pub fn new(
        basis: Arc<BasisSet>,
        engine: E,
        screening: Arc<ScreeningBounds>,
        link_cutoff: f64,
    ) -> Self {
        let nshell = basis.nshell();
        let atom_ranges = basis.atom_shell_ranges();

        let mut atom_pairs = Vec::new();
        for (pa, p_range) in atom_ranges.iter().enumerate() {
            for (qa, q_range) in atom_ranges.iter().enumerate().take(pa + 1) {
                let significant = p_range.clone().any(|p| {
                    q_range
                        .clone()
                        .any(|q| screening.shell_significant(p, q))
                });
                if significant {
                    atom_pairs.push((pa, qa));
                }
            }
        }

        let cutoff = screening.cutoff();
        let max_integral = screening.max_integral();
        let significant_bras = (0..nshell)
            .map(|p| {
                let mut bras: Vec<(f64, usize)> = (0..nshell)
                    .map(|q| ((screening.pair_value(p, q) * max_integral).sqrt(), q))
                    .filter(|&(value, _)| value >= cutoff)
                    .collect();
                sort_descending(&mut bras);
                bras.into_iter().map(|(_, q)| q).collect()
            })
            .collect();

        let mut shell_ceilings = vec![0.0_f64; nshell];
        for p in 0..nshell {
            for q in 0..=p {
                let value = screening.pair_value(p, q);
                shell_ceilings[p] = shell_ceilings[p].max(value);
                shell_ceilings[q] = shell_ceilings[q].max(value);
            }
        }

        let max_atom_functions = atom_ranges
            .iter()
            .map(|range| range.clone().map(|s| basis.shell(s).nfunction()).sum::<usize>())
            .max()
            .unwrap_or(0);

        debug!(
            "LinK: {} significant atom pairs over {} atoms",
            atom_pairs.len(),
            basis.natom()
        );

        Self {
            basis,
            engine,
            screening,
            link_cutoff,
            atom_pairs,
            significant_bras,
            shell_ceilings,
            max_atom_functions,
            computed_quartets: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        "LinK"
    }

    pub fn num_computed_quartets(&self) -> usize {
        self.computed_quartets
    }

    /// Doubles of per-thread scratch needed for each density.
    pub fn scratch_size(&self) -> usize {
        4 * self.max_atom_functions * self.basis.nbf()
    }

    /// Adds the exchange matrix of every density to `k`. Must run inside the worker pool.
    pub fn build(
        &mut self,
        densities: &[DMatrix<f64>],
        k: &mut [DMatrix<f64>],
        lr_symmetric: bool,
    ) -> Result<()> {
        if !lr_symmetric {
            return Err(JkError::AsymmetricExchange("LinK"));
        }
        let nshell = self.basis.nshell();
        let nbf = self.basis.nbf();
        let d_max = shell_block_max(&self.basis, &self.basis, densities);

        let significant_kets: Vec<Vec<usize>> = (0..nshell)
            .map(|p| {
                let mut kets: Vec<(f64, usize)> = (0..nshell)
                    .map(|r| (self.shell_ceilings[p] * self.shell_ceilings[r] * d_max[(p, r)], r))
                    .filter(|&(value, _)| value >= self.link_cutoff)
                    .collect();
                sort_descending(&mut kets);
                kets.into_iter().map(|(_, r)| r).collect()
            })
            .collect();

        let targets: Vec<AtomicMatrix> = k.iter().map(AtomicMatrix::from_matrix).collect();
        let this = &*self;
        let computed: usize = this
            .atom_pairs
            .par_iter()
            .map_init(
                || LinkScratch {
                    engine: this.engine.clone(),
                    buffers: densities
                        .iter()
                        .map(|_| {
                            std::array::from_fn(|_| DMatrix::zeros(this.max_atom_functions, nbf))
                        })
                        .collect(),
                },
                |scratch, &(pa, qa)| {
                    this.atom_pair(scratch, pa, qa, densities, &d_max, &significant_kets, &targets)
                },
            )
            .sum();

        for (k, target) in k.iter_mut().zip(targets) {
            *k = target.into_matrix();
            hermitivitize(k);
        }

        self.computed_quartets = computed;
        debug!("{}: {} shell quartets computed", self.name(), computed);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn atom_pair(
        &self,
        scratch: &mut LinkScratch<E>,
        pa: usize,
        qa: usize,
        densities: &[DMatrix<f64>],
        d_max: &DMatrix<f64>,
        significant_kets: &[Vec<usize>],
        targets: &[AtomicMatrix],
    ) -> usize {
        let basis = &self.basis;
        let nshell = basis.nshell();
        let p_shells = basis.atom_shell_ranges()[pa].clone();
        let q_shells = basis.atom_shell_ranges()[qa].clone();
        let p_offset = basis.shell(p_shells.start).function_offset;
        let q_offset = basis.shell(q_shells.start).function_offset;

        for buffers in scratch.buffers.iter_mut() {
            for buffer in buffers.iter_mut() {
                buffer.fill(0.0);
            }
        }
        let mut p_stripes = vec![BTreeSet::new(); p_shells.len()];
        let mut q_stripes = vec![BTreeSet::new(); q_shells.len()];
        let mut computed = 0;

        for p_shell in p_shells.clone() {
            for q_shell in q_shells.clone() {
                if q_shell > p_shell || !self.screening.shell_significant(p_shell, q_shell) {
                    continue;
                }
                let pq = p_shell * nshell + q_shell;
                let pair_pq = self.screening.pair_value(p_shell, q_shell);

                let mut kets = BTreeSet::new();
                for bra_shell in [p_shell, q_shell] {
                    for &r_shell in &significant_kets[bra_shell] {
                        let mut any = false;
                        for &s_shell in &self.significant_bras[r_shell] {
                            let bound = d_max[(bra_shell, r_shell)]
                                * (pair_pq * self.screening.pair_value(r_shell, s_shell)).sqrt();
                            if bound < self.link_cutoff {
                                break;
                            }
                            any = true;
                            let rs = r_shell.max(s_shell) * nshell + r_shell.min(s_shell);
                            if rs <= pq {
                                kets.insert(rs);
                            }
                        }
                        if !any {
                            break;
                        }
                    }
                }

                let dp = p_shell - p_shells.start;
                let dq = q_shell - q_shells.start;
                for rs in kets {
                    let (r_shell, s_shell) = (rs / nshell, rs % nshell);
                    if !self.screening.shell_significant(r_shell, s_shell)
                        || !self.screening.quartet_significant(
                            p_shell,
                            q_shell,
                            r_shell,
                            s_shell,
                            Some(d_max),
                        )
                    {
                        continue;
                    }
                    computed += 1;

                    let mut prefactor = 1.0;
                    if p_shell == q_shell {
                        prefactor *= 0.5;
                    }
                    if r_shell == s_shell {
                        prefactor *= 0.5;
                    }
                    if pq == rs {
                        prefactor *= 0.5;
                    }

                    let (sp, sq) = (basis.shell(p_shell), basis.shell(q_shell));
                    let (sr, ss) = (basis.shell(r_shell), basis.shell(s_shell));
                    let (nq, nr, ns) = (sq.nfunction(), sr.nfunction(), ss.nfunction());
                    let block = scratch.engine.quartet(p_shell, q_shell, r_shell, s_shell);

                    for (density, buffers) in densities.iter().zip(scratch.buffers.iter_mut()) {
                        let [k_pr, k_ps, k_qr, k_qs] = buffers;
                        for (ip, p) in sp.function_range().enumerate() {
                            let p_local = p - p_offset;
                            for (iq, q) in sq.function_range().enumerate() {
                                let q_local = q - q_offset;
                                for (ir, r) in sr.function_range().enumerate() {
                                    for (is, s) in ss.function_range().enumerate() {
                                        let value = prefactor
                                            * block[((ip * nq + iq) * nr + ir) * ns + is];
                                        k_pr[(p_local, r)] += density[(q, s)] * value;
                                        k_ps[(p_local, s)] += density[(q, r)] * value;
                                        k_qr[(q_local, r)] += density[(p, s)] * value;
                                        k_qs[(q_local, s)] += density[(p, r)] * value;
                                    }
                                }
                            }
                        }
                    }

                    p_stripes[dp].insert(r_shell);
                    p_stripes[dp].insert(s_shell);
                    q_stripes[dq].insert(r_shell);
                    q_stripes[dq].insert(s_shell);
                }
            }
        }

        for (buffers, target) in scratch.buffers.iter().zip(targets) {
            let [k_pr, k_ps, k_qr, k_qs] = buffers;
            merge_stripes(basis, &p_shells, p_offset, &p_stripes, k_pr, k_ps, target);
            merge_stripes(basis, &q_shells, q_offset, &q_stripes, k_qr, k_qs, target);
        }
        computed
    }
}

/// K[row][col] += 2 (first + second)[row][col] over the columns touched by each row shell.
fn merge_stripes(
    basis: &BasisSet,
    row_shells: &Range<usize>,
    offset: usize,
    stripes: &[BTreeSet<usize>],
    first: &DMatrix<f64>,
    second: &DMatrix<f64>,
    target: &AtomicMatrix,
) {
    for (row_shell, columns) in row_shells.clone().zip(stripes) {
        for row in basis.shell(row_shell).function_range() {
            let local = row - offset;
            for &column_shell in columns {
                for column in basis.shell(column_shell).function_range() {
                    let value = first[(local, column)] + second[(local, column)];
                    target.add(row, column, 2.0 * value);
                }
            }
        }
    }
}

/// Largest bound first; ties broken by the larger shell index.
fn sort_descending(entries: &mut [(f64, usize)]) {
    entries.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)));
}
