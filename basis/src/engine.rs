//! Shell-blocked integral evaluation.
//!
//! Builders only talk to [`IntegralEngine`]; [`GtoEngine`] implements it on top of the
//! McMurchie-Davidson kernels of this crate.

use crate::basis::Basis;
use crate::cgto::ContractedGTO;
use crate::gto::GTO;
use crate::shell::BasisSet;
use nalgebra::{DMatrix, Vector3};
use rayon::prelude::*;
use std::sync::Arc;

/// Evaluates integral blocks over shells and returns them as flat row-major buffers.
///
/// A returned slice is owned by the engine and is only valid until the next call. Engines
/// are cheap to clone; every worker thread clones its own from a template.
pub trait IntegralEngine: Clone + Send + Sync {
    /// (PQ|RS) over primary shells, layout `[p][q][r][s]`.
    fn quartet(&mut self, p: usize, q: usize, r: usize, s: usize) -> &[f64];

    /// (A|MN) with `a` an auxiliary shell and `m`, `n` primary shells, layout `[a][m][n]`.
    fn triplet(&mut self, a: usize, m: usize, n: usize) -> &[f64];

    /// (A|B) over auxiliary shells, layout `[a][b]`.
    fn two_center(&mut self, a: usize, b: usize) -> &[f64];

    /// Electrostatic potential integral ∫ φ_ν(r) φ_τ(r) / |r - origin| dr over primary
    /// shells, layout `[nu][tau]`. Values are positive for a positive overlap density.
    fn potential(&mut self, nu: usize, tau: usize, origin: &Vector3<f64>) -> &[f64];
}

#[derive(Debug, Clone)]
pub struct GtoEngine {
    primary: Arc<BasisSet>,
    auxiliary: Arc<BasisSet>,
    unit: ContractedGTO,
    buffer: Vec<f64>,
}

impl GtoEngine {
    pub fn new(primary: Arc<BasisSet>, auxiliary: Arc<BasisSet>) -> Self {
        let max_functions = primary
            .max_function_per_shell()
            .max(auxiliary.max_function_per_shell());
        Self {
            primary,
            auxiliary,
            unit: ContractedGTO::new(vec![GTO::unit(Vector3::zeros())], vec![1.0]),
            buffer: Vec::with_capacity(max_functions.pow(4)),
        }
    }

    pub fn primary(&self) -> &Arc<BasisSet> {
        &self.primary
    }

    pub fn auxiliary(&self) -> &Arc<BasisSet> {
        &self.auxiliary
    }
}

impl IntegralEngine for GtoEngine {
    fn quartet(&mut self, p: usize, q: usize, r: usize, s: usize) -> &[f64] {
        let basis = &self.primary;
        let (sp, sq, sr, ss) = (basis.shell(p), basis.shell(q), basis.shell(r), basis.shell(s));
        self.buffer.clear();
        for a in &sp.functions {
            for b in &sq.functions {
                for c in &sr.functions {
                    for d in &ss.functions {
                        self.buffer.push(ContractedGTO::JKabcd(a, b, c, d));
                    }
                }
            }
        }
        &self.buffer
    }

    fn triplet(&mut self, a: usize, m: usize, n: usize) -> &[f64] {
        let sa = self.auxiliary.shell(a);
        let (sm, sn) = (self.primary.shell(m), self.primary.shell(n));
        self.buffer.clear();
        for fa in &sa.functions {
            for fm in &sm.functions {
                for fn_ in &sn.functions {
                    self.buffer
                        .push(ContractedGTO::JKabcd(fa, &self.unit, fm, fn_));
                }
            }
        }
        &self.buffer
    }

    fn two_center(&mut self, a: usize, b: usize) -> &[f64] {
        let (sa, sb) = (self.auxiliary.shell(a), self.auxiliary.shell(b));
        self.buffer.clear();
        for fa in &sa.functions {
            for fb in &sb.functions {
                self.buffer
                    .push(ContractedGTO::JKabcd(fa, &self.unit, fb, &self.unit));
            }
        }
        &self.buffer
    }

    fn potential(&mut self, nu: usize, tau: usize, origin: &Vector3<f64>) -> &[f64] {
        let (snu, stau) = (self.primary.shell(nu), self.primary.shell(tau));
        self.buffer.clear();
        for a in &snu.functions {
            for b in &stau.functions {
                self.buffer.push(-ContractedGTO::Vab(a, b, *origin, 1));
            }
        }
        &self.buffer
    }
}

fn one_electron_matrix<F>(basis: &BasisSet, element: F) -> DMatrix<f64>
where
    F: Fn(&ContractedGTO, &ContractedGTO) -> f64 + Sync,
{
    let functions: Vec<&ContractedGTO> = basis.functions().collect();
    let n = functions.len();
    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| (0..=i).map(|j| element(functions[i], functions[j])).collect())
        .collect();

    let mut matrix = DMatrix::zeros(n, n);
    for (i, row) in rows.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            matrix[(i, j)] = value;
            matrix[(j, i)] = value;
        }
    }
    matrix
}

pub fn overlap_matrix(basis: &BasisSet) -> DMatrix<f64> {
    one_electron_matrix(basis, ContractedGTO::Sab)
}

pub fn kinetic_matrix(basis: &BasisSet) -> DMatrix<f64> {
    one_electron_matrix(basis, ContractedGTO::Tab)
}

/// Attraction of the electrons to every nucleus of the basis' atoms.
pub fn nuclear_attraction_matrix(basis: &BasisSet) -> DMatrix<f64> {
    let nuclei: Vec<(Vector3<f64>, u32)> = basis
        .centers()
        .iter()
        .copied()
        .zip(basis.charges().iter().copied())
        .collect();
    one_electron_matrix(basis, |a, b| {
        nuclei
            .iter()
            .map(|&(r, z)| ContractedGTO::Vab(a, b, r, z))
            .sum()
    })
}

/// Coulomb metric (P|Q) of an auxiliary basis.
pub fn coulomb_metric(auxiliary: &BasisSet) -> DMatrix<f64> {
    let unit = ContractedGTO::new(vec![GTO::unit(Vector3::zeros())], vec![1.0]);
    one_electron_matrix(auxiliary, |a, b| ContractedGTO::JKabcd(a, &unit, b, &unit))
}

/// Nuclear repulsion energy of the basis' atoms.
pub fn nuclear_repulsion(basis: &BasisSet) -> f64 {
    let centers = basis.centers();
    let charges = basis.charges();
    let mut energy = 0.0;
    for i in 0..centers.len() {
        for j in 0..i {
            energy += (charges[i] * charges[j]) as f64 / (centers[i] - centers[j]).norm();
        }
    }
    energy
}
