//! Incremental Fock builds: feed the builders D - D_prev and add onto the previous J/K.

use crate::composite::GridStage;
use crate::config::IncFockOptions;
use nalgebra::DMatrix;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct IncrementalFock {
    options: IncFockOptions,
    initial: bool,
    /// iterations run in incremental mode since setup
    count: usize,
    incremental: bool,
    previous: Vec<DMatrix<f64>>,
    /// grid the previous results were built on
    previous_stage: Option<GridStage>,
}

impl IncrementalFock {
    pub fn new(options: IncFockOptions) -> Self {
        Self {
            options,
            initial: true,
            count: 0,
            incremental: false,
            previous: Vec::new(),
            previous_stage: None,
        }
    }

    /// Whether the last `prepare` chose a delta density.
    pub fn is_incremental(&self) -> bool {
        self.incremental
    }

    /// Picks the reference densities of this iteration and zeroes `outputs` unless the
    /// previous results are being extended. Results from another grid stage are never
    /// extended.
    pub fn prepare(
        &mut self,
        densities: &[DMatrix<f64>],
        d_norm: f64,
        stage: GridStage,
        outputs: &mut [&mut Vec<DMatrix<f64>>],
    ) -> Vec<DMatrix<f64>> {
        let reset = self.options.full_fock_every;
        let converging = d_norm >= self.options.convergence;
        let do_incremental = self.options.enabled
            && converging
            && !self.initial
            && self.count % reset != reset - 1;
        if self.options.enabled && !self.initial && converging {
            self.count += 1;
        }

        let channels_changed = self.previous.len() != densities.len();
        let stage_changed = self.previous_stage != Some(stage);
        if do_incremental && stage_changed {
            debug!("Grid stage changed to {:?}, rebuilding J/K from scratch", stage);
        }
        self.incremental = do_incremental && !channels_changed && !stage_changed;

        if self.incremental {
            debug!("Incremental Fock build {} (|dD| = {:.3e})", self.count, d_norm);
            densities
                .iter()
                .zip(self.previous.iter())
                .map(|(current, previous)| current - previous)
                .collect()
        } else {
            for output in outputs.iter_mut() {
                for matrix in output.iter_mut() {
                    matrix.fill(0.0);
                }
            }
            densities.to_vec()
        }
    }

    /// Stores the densities and grid stage of this iteration for the next delta.
    pub fn finish(&mut self, densities: &[DMatrix<f64>], stage: GridStage) {
        if self.options.enabled {
            self.previous = densities.to_vec();
            self.previous_stage = Some(stage);
        }
        self.initial = false;
    }
}
