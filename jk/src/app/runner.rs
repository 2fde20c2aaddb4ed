use ::basis::engine::{kinetic_matrix, nuclear_attraction_matrix, nuclear_repulsion, overlap_matrix};
use ::basis::{BasisSet, IntegralEngine};
use color_eyre::eyre::{eyre, Result, WrapErr};
use composite_jk::config::{KAlgorithm, ScfParams};
use composite_jk::{CompositeJk, GridStage, JkMatrices};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use tracing::{debug, info};

// overlap eigenvalues below this are dropped by the orthogonalizer
const LINEAR_DEPENDENCY_THRESHOLD: f64 = 1e-8;

/// Converged restricted Hartree-Fock state.
pub struct RestrictedResult {
    pub total_energy: f64,
    pub orbital_energies: DVector<f64>,
    pub nocc: usize,
    pub cycles: usize,
    pub converged: bool,
}

/// Restricted Hartree-Fock with F = H + J - K/2, driven by the composite builder.
///
/// The small COSX grid is used until the density converges; one more iteration then runs on
/// the large grid.
pub fn run_restricted<E: IntegralEngine>(
    basis: &BasisSet,
    jk: &mut CompositeJk<E>,
    params: &ScfParams,
) -> Result<RestrictedResult> {
    let max_cycle = params.max_cycle.unwrap_or(50);
    let threshold = params.convergence_threshold.unwrap_or(1e-6);
    let mixing = params.density_mixing.unwrap_or(0.0);

    let electrons: u32 = basis.charges().iter().sum();
    if electrons % 2 != 0 {
        return Err(eyre!(
            "Restricted Hartree-Fock needs an even electron count, found {}",
            electrons
        ));
    }
    let nocc = (electrons / 2) as usize;
    let needs_final_grid = jk.options().algorithm.k == Some(KAlgorithm::Cosx);

    info!("\nBuilding one-electron integrals...");
    let overlap = overlap_matrix(basis);
    let hcore = kinetic_matrix(basis) + nuclear_attraction_matrix(basis);
    let e_nuc = nuclear_repulsion(basis);
    let orthogonalizer = canonical_orthogonalizer(&overlap)?;
    if orthogonalizer.ncols() < nocc {
        return Err(eyre!(
            "{} independent functions cannot hold {} occupied orbitals",
            orthogonalizer.ncols(),
            nocc
        ));
    }

    let (mut orbital_energies, coefficients) = diagonalize(&hcore, &orthogonalizer);
    let mut density = occupied_density(&coefficients, nocc);

    let mut out = JkMatrices::zeros(1, basis.nbf());
    let mut stage = GridStage::Initial;
    let mut d_norm = f64::INFINITY;
    let mut energy = 0.0;
    let mut converged = false;
    let mut cycles = 0;

    info!("\nStarting SCF iterations...");
    for cycle in 1..=max_cycle {
        cycles = cycle;
        jk.compute(std::slice::from_ref(&density), d_norm, stage, &mut out)
            .wrap_err_with(|| format!("J/K build failed in cycle {}", cycle))?;
        let fock = &hcore + &out.j[0] - &out.k[0] * 0.5;

        let previous_energy = energy;
        energy = 0.5 * density.component_mul(&(&hcore + &fock)).sum() + e_nuc;
        let delta_e = energy - previous_energy;

        let (levels, coefficients) = diagonalize(&fock, &orthogonalizer);
        orbital_energies = levels;
        let new_density = occupied_density(&coefficients, nocc) * (1.0 - mixing) + &density * mixing;
        d_norm = rms(&(&new_density - &density));
        density = new_density;

        info!(
            "  Cycle {:>3}: E = {:>18.10} au  dE = {:>10.3e}  rms(dD) = {:>10.3e}  [{} shells]",
            cycle,
            energy,
            delta_e,
            d_norm,
            jk.num_computed_shells()
        );

        if stage == GridStage::Final {
            converged = true;
            break;
        }
        if d_norm < threshold && delta_e.abs() < threshold {
            if needs_final_grid {
                debug!("Density converged on the initial grid, switching to the final grid");
                stage = GridStage::Final;
            } else {
                converged = true;
                break;
            }
        }
    }

    Ok(RestrictedResult {
        total_energy: energy,
        orbital_energies,
        nocc,
        cycles,
        converged,
    })
}

/// X = U s^-1/2 over the overlap eigenvectors above the linear-dependency threshold.
fn canonical_orthogonalizer(overlap: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let eigen = SymmetricEigen::new(overlap.clone());
    let kept: Vec<usize> = (0..eigen.eigenvalues.len())
        .filter(|&i| eigen.eigenvalues[i] > LINEAR_DEPENDENCY_THRESHOLD)
        .collect();
    if kept.is_empty() {
        return Err(eyre!("Overlap matrix has no usable eigenvalues"));
    }
    let dropped = eigen.eigenvalues.len() - kept.len();
    if dropped > 0 {
        info!("Removed {} linearly dependent functions", dropped);
    }

    let n = overlap.nrows();
    let mut x = DMatrix::zeros(n, kept.len());
    for (col, &i) in kept.iter().enumerate() {
        let scale = 1.0 / eigen.eigenvalues[i].sqrt();
        x.set_column(col, &(eigen.eigenvectors.column(i) * scale));
    }
    Ok(x)
}

/// Orbital energies in ascending order and the matching AO coefficients.
fn diagonalize(fock: &DMatrix<f64>, x: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let transformed = x.transpose() * fock * x;
    let eigen = SymmetricEigen::new(transformed);

    let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

    let energies = DVector::from_iterator(order.len(), order.iter().map(|&i| eigen.eigenvalues[i]));
    let mut sorted = DMatrix::zeros(eigen.eigenvectors.nrows(), order.len());
    for (col, &i) in order.iter().enumerate() {
        sorted.set_column(col, &eigen.eigenvectors.column(i));
    }
    (energies, x * sorted)
}

fn occupied_density(coefficients: &DMatrix<f64>, nocc: usize) -> DMatrix<f64> {
    let occupied = coefficients.columns(0, nocc);
    &occupied * occupied.transpose() * 2.0
}

fn rms(matrix: &DMatrix<f64>) -> f64 {
    (matrix.norm_squared() / matrix.len() as f64).sqrt()
}
