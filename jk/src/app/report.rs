use super::runner::RestrictedResult;
use ::basis::IntegralEngine;
use composite_jk::CompositeJk;
use tracing::{info, warn};

pub fn report_restricted_summary(result: &RestrictedResult) {
    if result.converged {
        info!("\nSCF converged in {} cycles.", result.cycles);
    } else {
        warn!("\nSCF did not converge within {} cycles.", result.cycles);
    }

    info!("\nFinal Energy Levels:");
    for (i, energy) in result.orbital_energies.iter().enumerate() {
        let occupation = if i < result.nocc { "occ" } else { "vir" };
        info!("  Level {:>3} ({}): {:>14.8} au", i + 1, occupation, energy);
    }

    info!("\nHartree-Fock Total Energy: {:.10} au", result.total_energy);
}

pub fn report_bench<E: IntegralEngine>(jk: &CompositeJk<E>) {
    let history = jk.computed_shells_per_iter();
    if history.is_empty() {
        return;
    }
    info!("\n  ==> Computed shells per iteration <==\n");
    for (kind, counts) in history {
        let total: usize = counts.iter().sum();
        info!("    {:<9} total {:>12}", kind, total);
        for (i, count) in counts.iter().enumerate() {
            info!("      iter {:>3}: {:>12}", i + 1, count);
        }
    }
}
