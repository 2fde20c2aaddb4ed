#![allow(dead_code)]

use basis::basis::Basis;
use basis::engine::coulomb_metric;
use basis::{BasisSet, ContractedGTO, ElementBasis, GtoEngine, IntegralEngine};
use composite_jk::config::JkParams;
use composite_jk::{CompositeJk, JkOptions};
use nalgebra::{DMatrix, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

pub const H_STO3G: &str = "\
H    S
      3.42525091             0.15432897
      0.62391373             0.53532814
      0.16885540             0.44463454
END
";

pub const LI_STO3G: &str = "\
Li    S
     16.1195750              0.15432897
      2.9362007              0.53532814
      0.7946505              0.44463454
Li    SP
      0.6362897             -0.09996723             0.15591627
      0.1478601              0.39951283             0.60768372
      0.0480887              0.70011547             0.39195739
END
";

pub struct System {
    pub primary: Arc<BasisSet>,
    pub auxiliary: Arc<BasisSet>,
}

impl System {
    pub fn engine(&self) -> GtoEngine {
        GtoEngine::new(self.primary.clone(), self.auxiliary.clone())
    }

    pub fn nbf(&self) -> usize {
        self.primary.nbf()
    }

    pub fn composite(&self, options: JkOptions) -> CompositeJk {
        CompositeJk::new(self.primary.clone(), self.auxiliary.clone(), self.engine(), options)
            .unwrap()
    }
}

fn build(atoms: &[(&str, Vector3<f64>)]) -> System {
    let h = ElementBasis::parse_nwchem(H_STO3G).unwrap();
    let li = ElementBasis::parse_nwchem(LI_STO3G).unwrap();
    let h_aux = ElementBasis::even_tempered("H", 1, 0.2, 3.0, 4).unwrap();
    let li_aux = ElementBasis::even_tempered("Li", 2, 0.05, 3.0, 5).unwrap();

    let pick = |symbol: &str| match symbol {
        "H" => (&h, &h_aux),
        _ => (&li, &li_aux),
    };
    let primary: Vec<_> = atoms.iter().map(|(s, c)| (*c, pick(s).0)).collect();
    let auxiliary: Vec<_> = atoms.iter().map(|(s, c)| (*c, pick(s).1)).collect();
    System {
        primary: Arc::new(BasisSet::new("sto-3g", &primary)),
        auxiliary: Arc::new(BasisSet::new("even-tempered", &auxiliary)),
    }
}

pub fn h2() -> System {
    build(&[("H", Vector3::zeros()), ("H", Vector3::new(0.0, 0.0, 1.4))])
}

pub fn lih() -> System {
    build(&[("Li", Vector3::zeros()), ("H", Vector3::new(0.0, 0.0, 3.015))])
}

pub fn options(scf_type: &str, threads: usize) -> JkOptions {
    let mut params = JkParams::default();
    params.scf_type = Some(scf_type.to_string());
    params.threads = Some(threads);
    params.validate().unwrap()
}

pub fn options_without_screening(scf_type: &str, threads: usize) -> JkOptions {
    let mut options = options(scf_type, threads);
    options.screening = composite_jk::ScreeningType::None;
    options
}

/// Symmetric density with a dominant diagonal and small off-diagonal coupling.
pub fn model_density(nbf: usize, shift: f64) -> DMatrix<f64> {
    DMatrix::from_fn(nbf, nbf, |i, j| {
        if i == j {
            0.8 + 0.05 * i as f64 + shift
        } else {
            0.15 / (1.0 + (i + j) as f64) + 0.5 * shift
        }
    })
}

/// Seeded random symmetric density.
pub fn random_density(nbf: usize, seed: u64) -> DMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let a = DMatrix::from_fn(nbf, nbf, |_, _| rng.gen_range(-0.5..0.5));
    (&a + a.transpose()) * 0.5 + DMatrix::identity(nbf, nbf)
}

/// All primary two-electron integrals (pq|rs) over functions.
pub fn eri_tensor(basis: &BasisSet) -> Vec<f64> {
    let functions: Vec<&ContractedGTO> = basis.functions().collect();
    let n = functions.len();
    let mut eri = vec![0.0; n * n * n * n];
    for p in 0..n {
        for q in 0..n {
            for r in 0..n {
                for s in 0..n {
                    eri[((p * n + q) * n + r) * n + s] =
                        ContractedGTO::JKabcd(functions[p], functions[q], functions[r], functions[s]);
                }
            }
        }
    }
    eri
}

pub fn exact_exchange(eri: &[f64], density: &DMatrix<f64>) -> DMatrix<f64> {
    let n = density.nrows();
    DMatrix::from_fn(n, n, |p, r| {
        let mut value = 0.0;
        for q in 0..n {
            for s in 0..n {
                value += eri[((p * n + q) * n + r) * n + s] * density[(q, s)];
            }
        }
        value
    })
}

/// Dense density-fitted Coulomb matrix from the full three-index tensor.
pub fn dense_df_coulomb(system: &System, density: &DMatrix<f64>) -> DMatrix<f64> {
    let primary = &system.primary;
    let auxiliary = &system.auxiliary;
    let (nbf, naux) = (primary.nbf(), auxiliary.nbf());
    let mut engine = system.engine();

    let mut b = DMatrix::zeros(naux, nbf * nbf);
    for a in 0..auxiliary.nshell() {
        for m in 0..primary.nshell() {
            for n in 0..primary.nshell() {
                let fa = auxiliary.shell(a).function_range();
                let fm = primary.shell(m).function_range();
                let fn_ = primary.shell(n).function_range();
                let values = engine.triplet(a, m, n).to_vec();
                let mut index = 0;
                for x in fa.clone() {
                    for mu in fm.clone() {
                        for nu in fn_.clone() {
                            b[(x, mu * nbf + nu)] = values[index];
                            index += 1;
                        }
                    }
                }
            }
        }
    }

    let d = DMatrix::from_fn(nbf * nbf, 1, |mn, _| density[(mn / nbf, mn % nbf)]);
    let gamma = &b * d;
    let metric = coulomb_metric(auxiliary);
    let h = metric.lu().solve(&gamma).unwrap();
    let j = b.transpose() * h;
    DMatrix::from_fn(nbf, nbf, |m, n| j[(m * nbf + n, 0)])
}
