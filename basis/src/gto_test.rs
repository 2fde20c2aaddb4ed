#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use crate::basis::Basis;
    use crate::cgto::{ContractedGTO, ElementBasis};
    use crate::engine::{
        coulomb_metric, kinetic_matrix, nuclear_attraction_matrix, overlap_matrix, GtoEngine,
        IntegralEngine,
    };
    use crate::gto::{GTO1d, GTO};
    use crate::helper::boys_function;
    use crate::shell::BasisSet;
    use nalgebra::Vector3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;
    use std::sync::Arc;

    fn simpson<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, n: usize) -> f64 {
        let n = if n % 2 == 0 { n } else { n + 1 };
        let h = (b - a) / n as f64;
        let mut sum = f(a) + f(b);
        for i in 1..n {
            let x = a + i as f64 * h;
            sum += if i % 2 == 0 { 2.0 * f(x) } else { 4.0 * f(x) };
        }
        sum * h / 3.0
    }

    fn h2_sto3g() -> BasisSet {
        let h = ElementBasis::parse_nwchem(
            "H S\n 3.42525091 0.15432897\n 0.62391373 0.53532814\n 0.16885540 0.44463454\n",
        )
        .unwrap();
        BasisSet::new(
            "sto-3g",
            &[(Vector3::zeros(), &h), (Vector3::new(0.0, 0.0, 1.4), &h)],
        )
    }

    #[test]
    fn test_gto1d_normalization() {
        let gto = GTO1d::new(1.0, 2, 1.0);
        let integral = simpson(|x| gto.evaluate(x).powi(2), -10.0, 10.0, 10_000);
        assert!(
            (integral - 1.0).abs() < 1e-8,
            "Integral is not close to 1: got {}",
            integral
        );
    }

    #[test]
    fn test_gto1d_overlap() {
        let gto1 = GTO1d::new(1.2, 1, 1.0);
        let gto2 = GTO1d::new(0.8, 1, 3.0);
        let integral = simpson(|x| gto1.evaluate(x) * gto2.evaluate(x), -10.0, 12.0, 10_000);
        let overlap = GTO1d::Sab(&gto1, &gto2);
        assert!(
            (integral - overlap).abs() < 1e-8,
            "Overlap {} is not close to quadrature {}",
            overlap,
            integral
        );
    }

    #[test]
    fn test_gto1d_eab() {
        let (Qx, a, b) = (1.0, 1.0, 0.5);
        let q = a * b / (a + b);
        assert!((GTO1d::Eab(0, 0, 0, Qx, a, b) - (-q * Qx * Qx).exp()).abs() < 1e-14);
        assert_eq!(GTO1d::Eab(-1, 0, 0, Qx, a, b), 0.0);
        assert_eq!(GTO1d::Eab(0, 0, -1, Qx, a, b), 0.0);
        assert_eq!(GTO1d::Eab(1, 1, 3, Qx, a, b), 0.0);
    }

    #[test]
    fn test_gto_hermite_coulomb_base() {
        let (PCx, PCy, PCz) = (1.0_f64, 0.5_f64, 0.2_f64);
        let RPC = (PCx * PCx + PCy * PCy + PCz * PCz).sqrt();
        let value = GTO::hermite_coulomb(0, 0, 0, 0, 1.0, PCx, PCy, PCz, RPC);
        assert!((value - boys_function(0, RPC * RPC)).abs() < 1e-14);
    }

    #[test]
    fn test_gto_merge() {
        let a = GTO::new(1.0, Vector3::new(0, 0, 0), Vector3::new(0.0, 0.0, 0.0));
        let b = GTO::new(2.0, Vector3::new(1, 0, 0), Vector3::new(1.0, 0.0, 0.0));
        let merged = GTO::merge(&a, &b);
        assert_eq!(merged.alpha, 3.0);
        assert_eq!(merged.l_xyz, Vector3::new(1, 0, 0));
        assert!((merged.center - Vector3::new(2.0 / 3.0, 0.0, 0.0)).norm() < 1e-14);
    }

    #[test]
    fn test_vab_symmetric() {
        let a = GTO::new(1.0, Vector3::new(1, 0, 0), Vector3::new(1.0, 1.0, 0.0));
        let b = GTO::new(0.8, Vector3::new(0, 1, 1), Vector3::new(0.0, 1.0, 1.0));
        let R = Vector3::new(0.05, 0.0, 0.0);
        let diff = (GTO::Vab(&a, &b, R, 1) - GTO::Vab(&b, &a, R, 1)).abs();
        assert!(diff < 1e-12, "Vab is not symmetric! diff={}", diff);
    }

    #[test]
    fn test_jkabcd_permutational_symmetry() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut center = || {
            Vector3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
        };
        let a = GTO::new(1.1, Vector3::new(1, 0, 0), center());
        let b = GTO::new(0.7, Vector3::new(0, 0, 0), center());
        let c = GTO::new(0.9, Vector3::new(0, 1, 0), center());
        let d = GTO::new(1.6, Vector3::new(0, 0, 1), center());
        let abcd = GTO::JKabcd(&a, &b, &c, &d);
        for other in [
            GTO::JKabcd(&b, &a, &c, &d),
            GTO::JKabcd(&a, &b, &d, &c),
            GTO::JKabcd(&c, &d, &a, &b),
            GTO::JKabcd(&d, &c, &b, &a),
        ] {
            assert!((abcd - other).abs() < 1e-12, "{} vs {}", abcd, other);
        }
    }

    #[test]
    fn test_high_angular_momentum_quartets() {
        // (aa|aa) of an l = 4 primitive needs Boys orders up to 16
        let g = GTO::new(0.8, Vector3::new(2, 1, 1), Vector3::new(0.0, 0.0, 0.0));
        let g_shifted = GTO::new(0.8, Vector3::new(2, 1, 1), Vector3::new(0.0, 0.0, 0.2));
        let f = GTO::new(1.3, Vector3::new(1, 1, 1), Vector3::new(0.4, -0.3, 0.9));

        let gggg = GTO::JKabcd(&g, &g, &g, &g);
        assert!(gggg.is_finite() && gggg > 0.0);
        let near = GTO::JKabcd(&g, &g, &g_shifted, &g_shifted);
        assert!(near > 0.0 && near < gggg);

        let ffff = GTO::JKabcd(&f, &f, &f, &f);
        let mixed = GTO::JKabcd(&g, &g, &f, &f);
        // Schwarz: (gg|ff)^2 <= (gg|gg)(ff|ff)
        assert!(mixed * mixed <= gggg * ffff * (1.0 + 1e-12));
        assert!((mixed - GTO::JKabcd(&f, &f, &g, &g)).abs() < 1e-12);
    }

    #[test]
    fn test_h2_sto3g_reference_integrals() {
        // Szabo & Ostlund, table 3.8 (R = 1.4 bohr)
        let basis = h2_sto3g();
        let s = overlap_matrix(&basis);
        let t = kinetic_matrix(&basis);
        let v = nuclear_attraction_matrix(&basis);
        assert!((s[(0, 0)] - 1.0).abs() < 1e-10);
        assert!((s[(0, 1)] - 0.6593).abs() < 1e-4);
        assert!((t[(0, 0)] - 0.7600).abs() < 1e-4);
        assert!((t[(0, 1)] - 0.2365).abs() < 1e-4);
        assert!((v[(0, 0)] - (-1.2266 - 0.6538)).abs() < 2e-4);
        assert!((v[(0, 1)] - (-0.5974 * 2.0)).abs() < 2e-4);

        let functions: Vec<&ContractedGTO> = basis.functions().collect();
        let (f1, f2) = (functions[0], functions[1]);
        let eri = |a, b, c, d| ContractedGTO::JKabcd(a, b, c, d);
        assert!((eri(f1, f1, f1, f1) - 0.7746).abs() < 1e-4);
        assert!((eri(f1, f1, f2, f2) - 0.5697).abs() < 1e-4);
        assert!((eri(f2, f1, f1, f1) - 0.4441).abs() < 1e-4);
        assert!((eri(f2, f1, f2, f1) - 0.2970).abs() < 1e-4);
    }

    #[test]
    fn test_unit_function_gives_two_center_integral() {
        // (a|b) for normalized s gaussians
        let (a, b) = (0.9, 0.4);
        let ra = Vector3::new(0.0, 0.0, 0.0);
        let rb = Vector3::new(0.3, -0.2, 1.1);
        let ga = GTO::new(a, Vector3::zeros(), ra);
        let gb = GTO::new(b, Vector3::zeros(), rb);
        let unit = GTO::unit(Vector3::zeros());

        let value = GTO::JKabcd(&ga, &unit, &gb, &unit);
        let rho = a * b / (a + b);
        let expected = ga.norm * gb.norm * 2.0 * PI.powf(2.5) / (a * b * (a + b).sqrt())
            * boys_function(0, rho * (ra - rb).norm_squared());
        assert!((value - expected).abs() < 1e-12, "{} vs {}", value, expected);
    }

    #[test]
    fn test_engine_blocks() {
        let h = ElementBasis::parse_nwchem(
            "H S\n 3.42525091 0.15432897\n 0.62391373 0.53532814\n 0.16885540 0.44463454\n",
        )
        .unwrap();
        let aux = ElementBasis::even_tempered("H", 1, 0.3, 3.0, 3).unwrap();
        let centers = [Vector3::zeros(), Vector3::new(0.0, 0.0, 1.4)];
        let primary = Arc::new(BasisSet::new("sto-3g", &[(centers[0], &h), (centers[1], &h)]));
        let auxiliary = Arc::new(BasisSet::new("et", &[(centers[0], &aux), (centers[1], &aux)]));
        let mut engine = GtoEngine::new(primary.clone(), auxiliary.clone());

        let pqrs = engine.quartet(1, 0, 1, 0)[0];
        let rspq = engine.quartet(0, 1, 0, 1)[0];
        assert!((pqrs - 0.2970).abs() < 1e-4);
        assert!((pqrs - rspq).abs() < 1e-14);

        // p shell against the s pair: three functions
        let p_shell = 3;
        assert_eq!(auxiliary.shell(p_shell).l, 1);
        let block = engine.triplet(p_shell, 0, 1).to_vec();
        assert_eq!(block.len(), 3);
        let swapped = engine.triplet(p_shell, 1, 0).to_vec();
        for (x, y) in block.iter().zip(swapped.iter()) {
            assert!((x - y).abs() < 1e-14);
        }

        let metric = coulomb_metric(&auxiliary);
        let first = auxiliary.shell(p_shell).function_offset;
        let direct = engine.two_center(p_shell, p_shell).to_vec();
        for i in 0..3 {
            for j in 0..3 {
                assert!((metric[(first + i, first + j)] - direct[i * 3 + j]).abs() < 1e-14);
            }
        }
    }

    #[test]
    fn test_potential_far_field() {
        let basis = h2_sto3g();
        let mut engine = GtoEngine::new(Arc::new(basis.clone()), Arc::new(basis));
        let origin = Vector3::new(0.0, 40.0, 0.7);
        let value = engine.potential(0, 0, &origin)[0];
        let distance = (origin - Vector3::zeros()).norm();
        assert!(value > 0.0);
        assert!((value - 1.0 / distance).abs() < 1e-6);
    }
}
