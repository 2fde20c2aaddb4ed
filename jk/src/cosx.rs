//! Chain-of-spheres semi-numerical exchange (Neese et al. 2009, Izsák and Neese 2011).
//!
//! One electron of every exchange integral is integrated on a grid and the other
//! analytically, through the electrostatic potential of a shell pair at each grid point:
//!
//!   K_μν = Σ_g X_gμ Σ_τ A_ντ(g) F_gτ,    X_gμ = φ_μ(g) sqrt|w_g|,   F = X D
//!
//! Weights may be negative; X carries |w| and the sign is folded back into G. With overlap
//! fitting, X is replaced by X Qᵀ (see [`crate::overlap_fitting`]).

use crate::config::CosxOptions;
use crate::error::Result;
use crate::grid::{GridBlock, MolecularGrid};
use crate::linalg::hermitivitize;
use crate::overlap_fitting::OverlapFitting;
use crate::parallel::chunk_ranges;
use crate::screening::esp_bounds;
use basis::{BasisSet, IntegralEngine};
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// A quadrature grid together with its overlap-fitting operator, if fitting is enabled.
pub struct CosxGrid {
    grid: MolecularGrid,
    fitting: Option<OverlapFitting>,
}

impl CosxGrid {
    pub fn new(
        basis: &BasisSet,
        grid: MolecularGrid,
        overlap_fitting: bool,
        analytic_overlap: &DMatrix<f64>,
    ) -> Result<Self> {
        let fitting = if overlap_fitting {
            Some(OverlapFitting::new(basis, &grid, analytic_overlap)?)
        } else {
            None
        };
        Ok(Self { grid, fitting })
    }

    pub fn grid(&self) -> &MolecularGrid {
        &self.grid
    }

    pub fn fitting(&self) -> Option<&OverlapFitting> {
        self.fitting.as_ref()
    }
}

pub struct Cosx<E: IntegralEngine> {
    basis: Arc<BasisSet>,
    engine: E,
    kscreen: f64,
    dscreen: f64,
    esp_bounds: DMatrix<f64>,
    extents: Vec<f64>,
    /// shells whose extent sphere overlaps that of each shell
    extent_map: Vec<Vec<usize>>,
    computed_integrals: usize,
}

impl<E: IntegralEngine> Cosx<E> {
    pub fn new(basis: Arc<BasisSet>, engine: E, options: &CosxOptions) -> Self {
        let nshell = basis.nshell();
        let extents: Vec<f64> = basis
            .shells()
            .iter()
            .map(|shell| shell.extent(options.basis_tolerance))
            .collect();
        let extent_map: Vec<Vec<usize>> = (0..nshell)
            .map(|tau| {
                (0..nshell)
                    .filter(|&nu| {
                        let distance = (basis.shell(tau).center - basis.shell(nu).center).norm();
                        distance <= extents[tau] + extents[nu]
                    })
                    .collect()
            })
            .collect();
        let overlapping: usize = extent_map.iter().map(Vec::len).sum();
        debug!(
            "COSX: {} of {} shell pairs overlap within their extents",
            overlapping,
            nshell * nshell
        );

        Self {
            esp_bounds: esp_bounds(&basis),
            basis,
            engine,
            kscreen: options.ints_tolerance,
            dscreen: options.density_tolerance,
            extents,
            extent_map,
            computed_integrals: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        "COSX"
    }

    /// Potential integral blocks evaluated by the last build (one per shell pair and point).
    pub fn num_computed_integrals(&self) -> usize {
        self.computed_integrals
    }

    /// Adds the exchange matrix of every density on `grid` to `k`. Must run inside the
    /// worker pool.
    pub fn build(
        &mut self,
        grid: &CosxGrid,
        densities: &[DMatrix<f64>],
        k: &mut [DMatrix<f64>],
        lr_symmetric: bool,
    ) -> Result<()> {
        let nbf = self.basis.nbf();
        let blocks = grid.grid().blocks();
        let fitting = grid.fitting().map(OverlapFitting::matrix);
        if grid.grid().has_negative_weights() {
            debug!("COSX grid has negative weights, applying the sign correction");
        }

        let this = &*self;
        let partials: Vec<(Vec<DMatrix<f64>>, usize)> = chunk_ranges(blocks.len())
            .into_par_iter()
            .map_init(
                || this.engine.clone(),
                |engine, range| {
                    let mut partial = vec![DMatrix::zeros(nbf, nbf); densities.len()];
                    let computed = blocks[range]
                        .iter()
                        .map(|block| this.block(engine, block, fitting, densities, &mut partial))
                        .sum::<usize>();
                    (partial, computed)
                },
            )
            .collect();

        let mut computed = 0;
        for (partial, count) in partials {
            for (k, part) in k.iter_mut().zip(partial) {
                *k += part;
            }
            computed += count;
        }
        if lr_symmetric {
            k.iter_mut().for_each(hermitivitize);
        }

        self.computed_integrals = computed;
        debug!(
            "{}: {} potential integrals over {} points",
            self.name(),
            computed,
            grid.grid().npoints()
        );
        Ok(())
    }

    fn block(
        &self,
        engine: &mut E,
        block: &GridBlock,
        fitting: Option<&DMatrix<f64>>,
        densities: &[DMatrix<f64>],
        k: &mut [DMatrix<f64>],
    ) -> usize {
        let basis = &self.basis;
        let nshell = basis.nshell();
        let nbf = basis.nbf();
        let local = block.local_functions();
        let nlocal = local.len();
        let npoints = block.npoints();
        if nlocal == 0 || npoints == 0 {
            return 0;
        }

        // X = φ sqrt|w|, sign kept apart
        let mut x = block.basis_values(basis);
        let mut signs = Vec::with_capacity(npoints);
        for (g, &w) in block.weights().iter().enumerate() {
            x.row_mut(g).scale_mut(w.abs().sqrt());
            signs.push(if w < 0.0 { -1.0 } else { 1.0 });
        }
        let x_bfmax: Vec<f64> = (0..npoints).map(|g| x.row(g).amax()).collect();
        let x_max = x_bfmax.iter().cloned().fold(0.0, f64::max);

        let mut local_columns: Vec<Range<usize>> = Vec::with_capacity(block.local_shells().len());
        let mut column = 0;
        for &shell in block.local_shells() {
            let n = basis.shell(shell).nfunction();
            local_columns.push(column..column + n);
            column += n;
        }

        // density restricted to block-local columns, and the shells τ it reaches
        let d_blocks: Vec<DMatrix<f64>> = densities
            .iter()
            .map(|d| DMatrix::from_fn(nbf, nlocal, |i, a| d[(i, local[a])]))
            .collect();
        let mut in_tau = vec![false; nshell];
        for (tau, significant) in in_tau.iter_mut().enumerate() {
            *significant = basis.shell(tau).function_range().any(|i| {
                d_blocks
                    .iter()
                    .any(|d| local_columns.iter().any(|cols| cols.clone().any(|a| d[(i, a)].abs() > self.dscreen)))
            });
        }
        let tau_map: Vec<usize> = (0..nshell).filter(|&tau| in_tau[tau]).collect();
        if tau_map.is_empty() {
            return 0;
        }

        let f: Vec<DMatrix<f64>> = d_blocks.iter().map(|d| &x * d.transpose()).collect();
        let mut f_shell = DMatrix::zeros(npoints, nshell);
        let mut f_gmax = vec![0.0_f64; nshell];
        for &tau in &tau_map {
            for g in 0..npoints {
                let value = f
                    .iter()
                    .flat_map(|f| basis.shell(tau).function_range().map(move |t| f[(g, t)].abs()))
                    .fold(0.0, f64::max);
                f_shell[(g, tau)] = value;
                f_gmax[tau] = f_gmax[tau].max(value);
            }
        }

        let points = block.points();
        let mut g_matrices = vec![DMatrix::zeros(nbf, npoints); densities.len()];
        let mut computed = 0;
        for &tau in &tau_map {
            let shell_tau = basis.shell(tau);
            for &nu in &self.extent_map[tau] {
                let symmetric = nu != tau && in_tau[nu];
                if symmetric && tau > nu {
                    continue;
                }
                let shell_nu = basis.shell(nu);
                let esp = self.esp_bounds[(nu, tau)];

                // the block-level bound ignores where the points are
                let mut block_bound = x_max * esp * f_gmax[tau];
                if symmetric {
                    block_bound = block_bound.max(x_max * esp * f_gmax[nu]);
                }
                if block_bound < self.kscreen {
                    continue;
                }

                let ntau = shell_tau.nfunction();
                for (g, point) in points.iter().enumerate() {
                    let edge_tau = (point - shell_tau.center).norm() - self.extents[tau];
                    let edge_nu = (point - shell_nu.center).norm() - self.extents[nu];
                    let decay = 1.0 / edge_tau.min(edge_nu).max(1.0);
                    let mut bound = x_bfmax[g] * esp * f_shell[(g, tau)];
                    if symmetric {
                        bound = bound.max(x_bfmax[g] * esp * f_shell[(g, nu)]);
                    }
                    if bound * decay < self.kscreen {
                        continue;
                    }

                    let ints = engine.potential(nu, tau, point);
                    computed += 1;
                    let sign = signs[g];
                    for (f, g_matrix) in f.iter().zip(g_matrices.iter_mut()) {
                        for (i_nu, nu_function) in shell_nu.function_range().enumerate() {
                            let mut value = 0.0;
                            for (i_tau, tau_function) in shell_tau.function_range().enumerate() {
                                value += ints[i_nu * ntau + i_tau] * f[(g, tau_function)];
                            }
                            g_matrix[(nu_function, g)] += sign * value;
                        }
                        if symmetric {
                            for (i_tau, tau_function) in shell_tau.function_range().enumerate() {
                                let mut value = 0.0;
                                for (i_nu, nu_function) in shell_nu.function_range().enumerate() {
                                    value += ints[i_nu * ntau + i_tau] * f[(g, nu_function)];
                                }
                                g_matrix[(tau_function, g)] += sign * value;
                            }
                        }
                    }
                }
            }
        }

        let fitted;
        let left = match fitting {
            Some(q) => {
                let q_local = DMatrix::from_fn(nlocal, nlocal, |a, b| q[(local[a], local[b])]);
                fitted = &x * q_local.transpose();
                &fitted
            }
            None => &x,
        };
        for (k, g_matrix) in k.iter_mut().zip(g_matrices.iter()) {
            let k_block = left.transpose() * g_matrix.transpose();
            for (a, &mu) in local.iter().enumerate() {
                for nu in 0..nbf {
                    k[(mu, nu)] += k_block[(a, nu)];
                }
            }
        }
        computed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GridOptions, JkOptions};
    use crate::parallel::build_pool;
    use basis::engine::overlap_matrix;
    use basis::{ElementBasis, GtoEngine};
    use nalgebra::Vector3;

    fn h2() -> Arc<BasisSet> {
        let h = ElementBasis::parse_nwchem(
            "H S\n 3.42525091 0.15432897\n 0.62391373 0.53532814\n 0.16885540 0.44463454\n",
        )
        .unwrap();
        Arc::new(BasisSet::new(
            "sto-3g",
            &[(Vector3::zeros(), &h), (Vector3::new(0.0, 0.0, 1.4), &h)],
        ))
    }

    fn exact_exchange(engine: &mut GtoEngine, d: &DMatrix<f64>) -> DMatrix<f64> {
        let mut k = DMatrix::zeros(2, 2);
        for p in 0..2 {
            for r in 0..2 {
                for q in 0..2 {
                    for s in 0..2 {
                        k[(p, r)] += engine.quartet(p, q, r, s)[0] * d[(q, s)];
                    }
                }
            }
        }
        k
    }

    #[test]
    fn test_exchange_approaches_analytic_value() {
        let pool = build_pool(2).unwrap();
        let basis = h2();
        let engine = GtoEngine::new(basis.clone(), basis.clone());
        let options = JkOptions::default().cosx;
        let mut cosx = Cosx::new(basis.clone(), engine.clone(), &options);

        let grid = MolecularGrid::new(
            &basis,
            &GridOptions {
                radial_points: 60,
                spherical_points: 200,
            },
            options.basis_tolerance,
        );
        let analytic = overlap_matrix(&basis);
        let grid = CosxGrid::new(&basis, grid, true, &analytic).unwrap();

        let d = DMatrix::from_row_slice(2, 2, &[0.6, 0.6, 0.6, 0.6]);
        let mut k = vec![DMatrix::zeros(2, 2)];
        pool.install(|| cosx.build(&grid, &[d.clone()], &mut k, true)).unwrap();

        let reference = exact_exchange(&mut engine.clone(), &d);
        assert_eq!(k[0], k[0].transpose());
        assert!((&k[0] - &reference).amax() < 1e-3);
        assert!(cosx.num_computed_integrals() > 0);
    }

    #[test]
    fn test_negative_weight_is_folded_back() {
        let pool = build_pool(1).unwrap();
        let basis = h2();
        let engine = GtoEngine::new(basis.clone(), basis.clone());
        let options = CosxOptions {
            ints_tolerance: 0.0,
            density_tolerance: 0.0,
            ..JkOptions::default().cosx
        };
        let point = vec![Vector3::new(0.3, 0.0, 0.5)];
        let analytic = overlap_matrix(&basis);
        let positive = CosxGrid::new(
            &basis,
            MolecularGrid::from_points(&basis, point.clone(), vec![0.5], 1e-10),
            false,
            &analytic,
        )
        .unwrap();
        let negative = CosxGrid::new(
            &basis,
            MolecularGrid::from_points(&basis, point, vec![-0.5], 1e-10),
            false,
            &analytic,
        )
        .unwrap();

        let d = DMatrix::from_row_slice(2, 2, &[0.6, 0.2, 0.2, 0.6]);
        let mut cosx = Cosx::new(basis, engine, &options);
        let mut k_pos = vec![DMatrix::zeros(2, 2)];
        let mut k_neg = vec![DMatrix::zeros(2, 2)];
        pool.install(|| {
            cosx.build(&positive, &[d.clone()], &mut k_pos, true)?;
            cosx.build(&negative, &[d.clone()], &mut k_neg, true)
        })
        .unwrap();
        assert!((&k_pos[0] + &k_neg[0]).amax() < 1e-14);
        assert!(k_pos[0].amax() > 0.0);
    }

    #[test]
    fn test_zero_density_is_skipped() {
        let pool = build_pool(1).unwrap();
        let basis = h2();
        let engine = GtoEngine::new(basis.clone(), basis.clone());
        let options = JkOptions::default().cosx;
        let mut cosx = Cosx::new(basis.clone(), engine, &options);
        let grid = MolecularGrid::new(&basis, &options.initial_grid, options.basis_tolerance);
        let grid = CosxGrid::new(&basis, grid, false, &overlap_matrix(&basis)).unwrap();
        let mut k = vec![DMatrix::zeros(2, 2)];
        pool.install(|| cosx.build(&grid, &[DMatrix::zeros(2, 2)], &mut k, true)).unwrap();
        assert_eq!(cosx.num_computed_integrals(), 0);
        assert_eq!(k[0], DMatrix::zeros(2, 2));
    }
}
