//! Mix-and-match J and K builds behind one entry point.

use crate::config::{GridOptions, JAlgorithm, JkOptions, KAlgorithm};
use crate::cosx::{Cosx, CosxGrid};
use crate::dfj::DirectDfJ;
use crate::error::{JkError, Result};
use crate::grid::MolecularGrid;
use crate::incfock::IncrementalFock;
use crate::link::Link;
use crate::parallel::build_pool;
use crate::screening::ScreeningBounds;
use basis::engine::overlap_matrix;
use basis::{BasisSet, GtoEngine, IntegralEngine};
use nalgebra::DMatrix;
use rayon::ThreadPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const TRIPLETS: &str = "Triplets";
const QUARTETS: &str = "Quartets";

/// Which COSX grid an iteration integrates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridStage {
    /// Small grid of the iterations before convergence
    Initial,
    /// Large grid of the last iteration
    Final,
}

/// Coulomb and exchange matrices, one per density.
#[derive(Debug, Clone, PartialEq)]
pub struct JkMatrices {
    pub j: Vec<DMatrix<f64>>,
    pub k: Vec<DMatrix<f64>>,
}

impl JkMatrices {
    pub fn zeros(nchannel: usize, nbf: usize) -> Self {
        Self {
            j: vec![DMatrix::zeros(nbf, nbf); nchannel],
            k: vec![DMatrix::zeros(nbf, nbf); nchannel],
        }
    }

    fn fit(&mut self, nchannel: usize, nbf: usize) {
        let fits = |matrices: &[DMatrix<f64>]| {
            matrices.len() == nchannel && matrices.iter().all(|m| m.shape() == (nbf, nbf))
        };
        if !fits(&self.j) || !fits(&self.k) {
            *self = Self::zeros(nchannel, nbf);
        }
    }
}

enum ExchangeBuilder<E: IntegralEngine> {
    Link(Link<E>),
    Cosx {
        builder: Cosx<E>,
        initial: CosxGrid,
        last: CosxGrid,
    },
}

pub struct CompositeJk<E: IntegralEngine = GtoEngine> {
    basis: Arc<BasisSet>,
    options: JkOptions,
    pool: ThreadPool,
    j_builder: DirectDfJ<E>,
    k_builder: Option<ExchangeBuilder<E>>,
    incfock: IncrementalFock,
    do_j: bool,
    do_k: bool,
    lr_symmetric: bool,
    num_computed_shells: usize,
    computed_shells_per_iter: BTreeMap<&'static str, Vec<usize>>,
}

impl<E: IntegralEngine> CompositeJk<E> {
    /// Sets up the worker pool, screening tables, fitting metric and, for COSX, both grids.
    pub fn new(
        primary: Arc<BasisSet>,
        auxiliary: Arc<BasisSet>,
        engine: E,
        options: JkOptions,
    ) -> Result<Self> {
        options.check()?;
        let pool = build_pool(options.threads)?;
        let cutoff = options.effective_cutoff();

        let (j_builder, k_builder) = pool.install(|| -> Result<_> {
            let screening = Arc::new(ScreeningBounds::new(
                &primary,
                &engine,
                cutoff,
                options.screening,
            ));

            let j_builder = match options.algorithm.j {
                JAlgorithm::DfDirJ => DirectDfJ::new(
                    primary.clone(),
                    auxiliary.clone(),
                    engine.clone(),
                    screening.clone(),
                    cutoff,
                )?,
            };

            let k_builder = match options.algorithm.k {
                Some(KAlgorithm::Link) => Some(ExchangeBuilder::Link(Link::new(
                    primary.clone(),
                    engine.clone(),
                    screening,
                    options.effective_link_cutoff(),
                ))),
                Some(KAlgorithm::Cosx) => {
                    let cosx = &options.cosx;
                    let analytic = overlap_matrix(&primary);
                    let grid = |resolution: &GridOptions| {
                        MolecularGrid::new(&primary, resolution, cosx.basis_tolerance)
                    };
                    Some(ExchangeBuilder::Cosx {
                        builder: Cosx::new(primary.clone(), engine.clone(), cosx),
                        initial: CosxGrid::new(
                            &primary,
                            grid(&cosx.initial_grid),
                            cosx.overlap_fitting,
                            &analytic,
                        )?,
                        last: CosxGrid::new(
                            &primary,
                            grid(&cosx.final_grid),
                            cosx.overlap_fitting,
                            &analytic,
                        )?,
                    })
                }
                None => None,
            };
            Ok((j_builder, k_builder))
        })?;

        let do_k = k_builder.is_some();
        Ok(Self {
            basis: primary,
            incfock: IncrementalFock::new(options.incfock),
            options,
            pool,
            j_builder,
            k_builder,
            do_j: true,
            do_k,
            lr_symmetric: true,
            num_computed_shells: 0,
            computed_shells_per_iter: BTreeMap::new(),
        })
    }

    pub fn set_do_j(&mut self, do_j: bool) {
        self.do_j = do_j;
    }

    /// Requests or drops the exchange build. Requesting it without a K algorithm fails.
    pub fn set_do_k(&mut self, do_k: bool) -> Result<()> {
        if do_k && self.k_builder.is_none() {
            return Err(JkError::MissingKAlgorithm {
                j_algorithm: self.options.algorithm.j.to_string(),
            });
        }
        if !do_k {
            if let Some(k) = self.options.algorithm.k {
                info!("K algorithm {} is configured but will not be used", k);
            }
        }
        self.do_k = do_k;
        Ok(())
    }

    pub fn set_lr_symmetric(&mut self, lr_symmetric: bool) {
        self.lr_symmetric = lr_symmetric;
    }

    pub fn options(&self) -> &JkOptions {
        &self.options
    }

    /// Whether the last compute extended the previous results with a delta density.
    pub fn is_incremental(&self) -> bool {
        self.incfock.is_incremental()
    }

    /// Shell units evaluated by the last compute; the K count replaces the J count when
    /// both are built.
    pub fn num_computed_shells(&self) -> usize {
        self.num_computed_shells
    }

    /// History of computed triplets ("Triplets") and quartets ("Quartets") per compute,
    /// recorded when benchmarking is on.
    pub fn computed_shells_per_iter(&self) -> &BTreeMap<&'static str, Vec<usize>> {
        &self.computed_shells_per_iter
    }

    /// Builds J and K of `densities` into `out`.
    ///
    /// `d_norm` is the size of the density change since the last call and drives the
    /// incremental builds; `stage` picks the COSX grid. `out` is resized and zeroed when its
    /// shape does not match the densities.
    pub fn compute(
        &mut self,
        densities: &[DMatrix<f64>],
        d_norm: f64,
        stage: GridStage,
        out: &mut JkMatrices,
    ) -> Result<()> {
        let nbf = self.basis.nbf();
        if densities.is_empty() {
            return Err(JkError::NoDensity);
        }
        for (index, density) in densities.iter().enumerate() {
            if density.shape() != (nbf, nbf) {
                return Err(JkError::DensityShape {
                    index,
                    rows: density.nrows(),
                    cols: density.ncols(),
                    nbf,
                });
            }
        }
        if self.do_k && !self.lr_symmetric {
            if let Some(ExchangeBuilder::Link(link)) = &self.k_builder {
                return Err(JkError::AsymmetricExchange(link.name()));
            }
        }

        out.fit(densities.len(), nbf);
        let reference = self
            .incfock
            .prepare(densities, d_norm, stage, &mut [&mut out.j, &mut out.k]);

        let (do_j, do_k, lr_symmetric) = (self.do_j, self.do_k, self.lr_symmetric);
        let j_builder = &mut self.j_builder;
        let k_builder = &mut self.k_builder;
        let (computed_j, computed_k) = self.pool.install(|| -> Result<_> {
            let mut computed_j = None;
            if do_j {
                let start = Instant::now();
                j_builder.build(&reference, &mut out.j)?;
                debug!("{} build: {:.3?}", j_builder.name(), start.elapsed());
                computed_j = Some(j_builder.num_computed_triplets());
            }
            let mut computed_k = None;
            if do_k {
                let start = Instant::now();
                computed_k = match k_builder {
                    Some(ExchangeBuilder::Link(link)) => {
                        link.build(&reference, &mut out.k, lr_symmetric)?;
                        Some(link.num_computed_quartets())
                    }
                    Some(ExchangeBuilder::Cosx {
                        builder,
                        initial,
                        last,
                    }) => {
                        let grid = match stage {
                            GridStage::Initial => &*initial,
                            GridStage::Final => &*last,
                        };
                        builder.build(grid, &reference, &mut out.k, lr_symmetric)?;
                        Some(builder.num_computed_integrals())
                    }
                    None => None,
                };
                debug!("K build: {:.3?}", start.elapsed());
            }
            Ok((computed_j, computed_k))
        })?;

        if let Some(count) = computed_j {
            self.num_computed_shells = count;
            if self.options.bench {
                self.computed_shells_per_iter.entry(TRIPLETS).or_default().push(count);
            }
        }
        if let Some(count) = computed_k {
            self.num_computed_shells = count;
            if self.options.bench {
                self.computed_shells_per_iter.entry(QUARTETS).or_default().push(count);
            }
        }

        self.incfock.finish(densities, stage);
        Ok(())
    }

    /// Estimated working memory in doubles.
    pub fn memory_estimate(&self) -> usize {
        let nbf = self.basis.nbf();
        let threads = self.options.threads;
        let naux = self.j_builder.naux();
        // metric, per-thread G vectors and J partials
        let mut doubles = naux * naux + threads * (naux + nbf * nbf);
        doubles += match &self.k_builder {
            Some(ExchangeBuilder::Link(link)) => threads * link.scratch_size(),
            Some(ExchangeBuilder::Cosx { initial, last, .. }) => {
                let per_grid = |grid: &CosxGrid| {
                    let fitting = grid.fitting().map_or(0, |_| nbf * nbf);
                    let g = grid.grid();
                    fitting + threads * (nbf * nbf + 2 * g.max_points() * (nbf + g.max_functions()))
                };
                per_grid(initial).max(per_grid(last)) + nbf * nbf
            }
            None => 0,
        };
        doubles
    }

    pub fn print_header(&self) {
        let options = &self.options;
        let yes_no = |flag: bool| if flag { "Yes" } else { "No" };
        info!("\n  ==> CompositeJK: Mix-and-Match J+K Algorithm Combos <==\n");
        info!("    J tasked:          {:>11}", yes_no(self.do_j));
        if self.do_j {
            info!("    J algorithm:       {:>11}", options.algorithm.j);
            info!("    Auxiliary functions: {:>9}", self.j_builder.naux());
        }
        info!("    K tasked:          {:>11}", yes_no(self.do_k));
        if self.do_k {
            if let Some(k) = options.algorithm.k {
                info!("    K algorithm:       {:>11}", k);
            }
        }
        info!("    Integrals threads: {:>11}", options.threads);
        info!("    Incremental Fock:  {:>11}", yes_no(options.incfock.enabled));
        info!("    Screening type:    {:>11}", options.screening);
        info!("    Screening cutoff:  {:>11.0e}", options.effective_cutoff());
        info!(
            "    Memory [MiB]:      {:>11.2}",
            (self.memory_estimate() * 8) as f64 / (1024.0 * 1024.0)
        );

        if let Some(ExchangeBuilder::Link(_)) = &self.k_builder {
            info!("    LinK cutoff:       {:>11.0e}", options.effective_link_cutoff());
        }
        if let Some(ExchangeBuilder::Cosx { initial, last, .. }) = &self.k_builder {
            let cosx = &options.cosx;
            info!("    COSX ints cutoff:  {:>11.0e}", cosx.ints_tolerance);
            info!("    COSX density cut:  {:>11.0e}", cosx.density_tolerance);
            info!("    COSX basis cutoff: {:>11.0e}", cosx.basis_tolerance);
            info!("    Overlap fitting:   {:>11}", yes_no(cosx.overlap_fitting));
            info!(
                "    Initial grid:      {:>4} x {:>4} ({} points)",
                cosx.initial_grid.radial_points,
                cosx.initial_grid.spherical_points,
                initial.grid().npoints()
            );
            info!(
                "    Final grid:        {:>4} x {:>4} ({} points)",
                cosx.final_grid.radial_points,
                cosx.final_grid.spherical_points,
                last.grid().npoints()
            );
        }
    }
}
