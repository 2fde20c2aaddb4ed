#![allow(non_snake_case)]
extern crate nalgebra as na;

use crate::basis::Basis;
use crate::helper::boys_function;
use itertools::iproduct;
use na::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// One cartesian factor x^l exp(-alpha x^2) of a primitive, normalized on its own.
#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub struct GTO1d {
    pub alpha: f64,
    pub l: i32,
    pub center: f64,
    pub norm: f64,
}

fn factorial(n: i32) -> f64 {
    (1..=n).fold(1.0, |acc, x| acc * x as f64)
}

impl GTO1d {
    pub fn new(alpha: f64, l: i32, center: f64) -> Self {
        let norm = GTO1d::compute_norm(alpha, l);
        Self {
            alpha,
            l,
            center,
            norm,
        }
    }

    // N^2 = 2^(3l) l! alpha^l sqrt(2 alpha / pi) / (2l)!
    fn compute_norm(alpha: f64, l: i32) -> f64 {
        let numerator = 2.0_f64.powi(3 * l) * factorial(l) * alpha.powi(l);
        let n_squared = numerator * (2.0 * alpha / PI).sqrt() / factorial(2 * l);
        n_squared.sqrt()
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let x = x - self.center;
        self.norm * x.powi(self.l) * (-self.alpha * x * x).exp()
    }

    /// Hermite expansion coefficient E^{ij}_t of the product of two 1-D Gaussians with
    /// exponents `a`, `b` whose centers are `Qx` apart.
    pub fn Eab(i: i32, j: i32, t: i32, Qx: f64, a: f64, b: f64) -> f64 {
        let p = a + b;
        let q = a * b / p;

        if t < 0 || t > i + j || i < 0 || j < 0 {
            0.0
        } else if i == 0 && j == 0 && t == 0 {
            (-q * Qx * Qx).exp()
        } else if j == 0 {
            GTO1d::Eab(i - 1, j, t - 1, Qx, a, b) / (2.0 * p)
                - GTO1d::Eab(i - 1, j, t, Qx, a, b) * q * Qx / a
                + GTO1d::Eab(i - 1, j, t + 1, Qx, a, b) * ((t + 1) as f64)
        } else {
            GTO1d::Eab(i, j - 1, t - 1, Qx, a, b) / (2.0 * p)
                + GTO1d::Eab(i, j - 1, t, Qx, a, b) * q * Qx / b
                + GTO1d::Eab(i, j - 1, t + 1, Qx, a, b) * ((t + 1) as f64)
        }
    }

    pub(crate) fn Sab(a: &GTO1d, b: &GTO1d) -> f64 {
        let p = a.alpha + b.alpha;
        let Qx = a.center - b.center;
        GTO1d::Eab(a.l, b.l, 0, Qx, a.alpha, b.alpha) * (PI / p).sqrt() * a.norm * b.norm
    }

    // <a| -1/2 d^2/dx^2 |b>
    pub(crate) fn Tab(a: &GTO1d, b: &GTO1d) -> f64 {
        let p = a.alpha + b.alpha;
        let Qx = a.center - b.center;
        let norm = a.norm * b.norm * (PI / p).sqrt();

        let lb = b.l as f64;
        let term1 = lb * (lb - 1.0) * GTO1d::Eab(a.l, b.l - 2, 0, Qx, a.alpha, b.alpha);
        let term2 = -2.0 * b.alpha * (2.0 * lb + 1.0) * GTO1d::Eab(a.l, b.l, 0, Qx, a.alpha, b.alpha);
        let term3 = 4.0 * b.alpha * b.alpha * GTO1d::Eab(a.l, b.l + 2, 0, Qx, a.alpha, b.alpha);

        -0.5 * norm * (term1 + term2 + term3)
    }
}

/// Normalized cartesian primitive x^i y^j z^k exp(-alpha r^2).
#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub struct GTO {
    pub alpha: f64,
    pub l_xyz: Vector3<i32>,
    pub center: Vector3<f64>,
    pub norm: f64,
    pub gto1d: [GTO1d; 3],
}

impl GTO {
    pub fn new(alpha: f64, l_xyz: Vector3<i32>, center: Vector3<f64>) -> Self {
        let gto1d = [
            GTO1d::new(alpha, l_xyz.x, center.x),
            GTO1d::new(alpha, l_xyz.y, center.y),
            GTO1d::new(alpha, l_xyz.z, center.z),
        ];
        let norm = gto1d[0].norm * gto1d[1].norm * gto1d[2].norm;
        Self {
            alpha,
            l_xyz,
            center,
            norm,
            gto1d,
        }
    }

    /// The constant function 1, written as a zero-exponent s primitive.
    ///
    /// Used as the partner of a fitting function so that (P 1|M N) is the three-center
    /// integral (P|MN) and (P 1|Q 1) the two-center metric. It must always sit in the
    /// second slot of a pair.
    pub fn unit(center: Vector3<f64>) -> Self {
        let gto1d = [
            GTO1d { alpha: 0.0, l: 0, center: center.x, norm: 1.0 },
            GTO1d { alpha: 0.0, l: 0, center: center.y, norm: 1.0 },
            GTO1d { alpha: 0.0, l: 0, center: center.z, norm: 1.0 },
        ];
        Self {
            alpha: 0.0,
            l_xyz: Vector3::zeros(),
            center,
            norm: 1.0,
            gto1d,
        }
    }

    /// Gaussian product of `a` and `b` (exponent, angular sum and weighted center only).
    pub(crate) fn merge(a: &GTO, b: &GTO) -> GTO {
        let alpha = a.alpha + b.alpha;
        let center = (a.center * a.alpha + b.center * b.alpha) / alpha;
        GTO::new(alpha, a.l_xyz + b.l_xyz, center)
    }

    /// Hermite Coulomb integral R^n_{tuv} (Helgaker, Jørgensen and Olsen, eq. 9.9.18-20).
    ///
    /// * `t, u, v` - Hermite orders along x, y, z
    /// * `n` - Boys order
    /// * `p` - reduced exponent of the charge distributions
    /// * `PCx, PCy, PCz, RPC` - separation of the distribution center from the point charge
    #[allow(clippy::too_many_arguments)]
    pub fn hermite_coulomb(
        t: i32,
        u: i32,
        v: i32,
        n: i32,
        p: f64,
        PCx: f64,
        PCy: f64,
        PCz: f64,
        RPC: f64,
    ) -> f64 {
        let mut val = 0.0;

        if t == 0 && u == 0 && v == 0 {
            val += (-2.0 * p).powi(n) * boys_function(n, p * RPC * RPC);
        } else if t == 0 && u == 0 {
            if v > 1 {
                val += (v as f64 - 1.0)
                    * GTO::hermite_coulomb(t, u, v - 2, n + 1, p, PCx, PCy, PCz, RPC);
            }
            val += PCz * GTO::hermite_coulomb(t, u, v - 1, n + 1, p, PCx, PCy, PCz, RPC);
        } else if t == 0 {
            if u > 1 {
                val += (u as f64 - 1.0)
                    * GTO::hermite_coulomb(t, u - 2, v, n + 1, p, PCx, PCy, PCz, RPC);
            }
            val += PCy * GTO::hermite_coulomb(t, u - 1, v, n + 1, p, PCx, PCy, PCz, RPC);
        } else {
            if t > 1 {
                val += (t as f64 - 1.0)
                    * GTO::hermite_coulomb(t - 2, u, v, n + 1, p, PCx, PCy, PCz, RPC);
            }
            val += PCx * GTO::hermite_coulomb(t - 1, u, v, n + 1, p, PCx, PCy, PCz, RPC);
        }

        val
    }

    fn hermite_coefficients(a: &GTO, b: &GTO, t: i32, u: i32, v: i32) -> f64 {
        let d = a.center - b.center;
        GTO1d::Eab(a.l_xyz.x, b.l_xyz.x, t, d.x, a.alpha, b.alpha)
            * GTO1d::Eab(a.l_xyz.y, b.l_xyz.y, u, d.y, a.alpha, b.alpha)
            * GTO1d::Eab(a.l_xyz.z, b.l_xyz.z, v, d.z, a.alpha, b.alpha)
    }
}

impl Basis for GTO {
    fn evaluate(&self, r: &Vector3<f64>) -> f64 {
        self.gto1d[0].evaluate(r.x) * self.gto1d[1].evaluate(r.y) * self.gto1d[2].evaluate(r.z)
    }

    fn Sab(a: &GTO, b: &GTO) -> f64 {
        GTO1d::Sab(&a.gto1d[0], &b.gto1d[0])
            * GTO1d::Sab(&a.gto1d[1], &b.gto1d[1])
            * GTO1d::Sab(&a.gto1d[2], &b.gto1d[2])
    }

    fn Tab(a: &GTO, b: &GTO) -> f64 {
        let s = [
            GTO1d::Sab(&a.gto1d[0], &b.gto1d[0]),
            GTO1d::Sab(&a.gto1d[1], &b.gto1d[1]),
            GTO1d::Sab(&a.gto1d[2], &b.gto1d[2]),
        ];
        GTO1d::Tab(&a.gto1d[0], &b.gto1d[0]) * s[1] * s[2]
            + GTO1d::Tab(&a.gto1d[1], &b.gto1d[1]) * s[0] * s[2]
            + GTO1d::Tab(&a.gto1d[2], &b.gto1d[2]) * s[0] * s[1]
    }

    fn Vab(a: &GTO, b: &GTO, R: Vector3<f64>, Z: u32) -> f64 {
        let c = GTO::merge(a, b);
        let dr = c.center - R;
        let rpc = dr.norm();

        let val: f64 = iproduct!(0..=c.l_xyz.x, 0..=c.l_xyz.y, 0..=c.l_xyz.z)
            .map(|(i, j, k)| {
                GTO::hermite_coefficients(a, b, i, j, k)
                    * GTO::hermite_coulomb(i, j, k, 0, c.alpha, dr.x, dr.y, dr.z, rpc)
            })
            .sum();

        // attraction to a positive point charge
        -1.0 * a.norm * b.norm * val * 2.0 * PI * (Z as f64) / c.alpha
    }

    fn JKabcd(a: &GTO, b: &GTO, c: &GTO, d: &GTO) -> f64 {
        let e = GTO::merge(a, b);
        let f = GTO::merge(c, d);
        let dr = e.center - f.center;
        let rpq = dr.norm();
        let alpha = e.alpha * f.alpha / (e.alpha + f.alpha);

        let val: f64 = iproduct!(
            0..=e.l_xyz.x,
            0..=e.l_xyz.y,
            0..=e.l_xyz.z,
            0..=f.l_xyz.x,
            0..=f.l_xyz.y,
            0..=f.l_xyz.z
        )
        .map(|(i, j, k, l, m, n)| {
            let eab = GTO::hermite_coefficients(a, b, i, j, k);
            if eab == 0.0 {
                return 0.0;
            }
            let ecd = GTO::hermite_coefficients(c, d, l, m, n);
            let hermite_val =
                GTO::hermite_coulomb(i + l, j + m, k + n, 0, alpha, dr.x, dr.y, dr.z, rpq);
            let sgn = if (l + m + n) % 2 == 0 { 1.0 } else { -1.0 };
            eab * ecd * sgn * hermite_val
        })
        .sum();

        a.norm * b.norm * c.norm * d.norm * val * 2.0 * PI.powf(2.5)
            / (e.alpha * f.alpha * (e.alpha + f.alpha).sqrt())
    }
}
