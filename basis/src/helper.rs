use libm::{erf, sqrt};

/// Highest Boys order needed by (gg|gg) quartets.
pub const MAX_BOYS_ORDER: i32 = 16;

// upward recursion from erf is used above this argument
const UPWARD_X: f64 = 30.0;
const SQRT_PI_OVER_2: f64 = 0.886226925452758014;
const SERIES_EPSILON: f64 = 1e-17;
const MAX_SERIES_TERMS: usize = 1000;

/// Boys function F_n(x) = ∫_0^1 t^2n exp(-x t^2) dt.
///
/// Large arguments recurse upward from the error function. Everything else uses the
/// convergent series e^-x Σ_k (2x)^k / ((2n+1)(2n+3)...(2n+2k+1)), whose terms are all
/// positive.
pub fn boys_function(n: i32, x: f64) -> f64 {
    debug_assert!(n >= 0, "negative Boys order {}", n);
    debug_assert!(x >= 0.0, "Boys argument must be nonnegative, got {}", x);
    if x >= UPWARD_X && (n as f64) < x / 2.0 {
        boys_upward(n as usize, x)
    } else {
        boys_series(n, x)
    }
}

fn boys_series(n: i32, x: f64) -> f64 {
    let a = n as f64 + 0.5;
    let mut term = 0.5 / a;
    let mut sum = term;
    for k in 1..MAX_SERIES_TERMS {
        term *= x / (a + k as f64);
        sum += term;
        if term <= SERIES_EPSILON * sum {
            break;
        }
    }
    (-x).exp() * sum
}

fn boys_upward(n: usize, x: f64) -> f64 {
    let half_y = (-x).exp() / 2.0;
    let root = sqrt(x);
    let mut value = SQRT_PI_OVER_2 * erf(root) / root;
    for k in 1..=n {
        value = ((k as f64 - 0.5) * value - half_y) / x;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn boys_by_quadrature(n: i32, x: f64) -> f64 {
        // composite Simpson on t in [0, 1]
        let steps = 4000;
        let h = 1.0 / steps as f64;
        let f = |t: f64| t.powi(2 * n) * (-x * t * t).exp();
        let mut sum = f(0.0) + f(1.0);
        for i in 1..steps {
            let t = i as f64 * h;
            sum += if i % 2 == 0 { 2.0 * f(t) } else { 4.0 * f(t) };
        }
        sum * h / 3.0
    }

    #[test]
    fn test_boys_at_origin() {
        for n in 0..=MAX_BOYS_ORDER {
            let expected = 1.0 / (2.0 * n as f64 + 1.0);
            assert!((boys_function(n, 0.0) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_boys_matches_quadrature() {
        for &x in &[0.05, 0.7, 3.0, 4.6, 9.0, 25.0] {
            for n in [0, 1, 3, 6, 12, MAX_BOYS_ORDER] {
                let reference = boys_by_quadrature(n, x);
                let value = boys_function(n, x);
                assert!(
                    (value - reference).abs() < 1e-10,
                    "F_{}({}) = {} vs {}",
                    n,
                    x,
                    value,
                    reference
                );
            }
        }
    }

    #[test]
    fn test_boys_branches_agree() {
        for &x in &[UPWARD_X, 40.0, 80.0] {
            for n in [0, 4, 12] {
                let series = boys_series(n, x);
                let upward = boys_upward(n as usize, x);
                assert!(
                    ((series - upward) / series).abs() < 1e-13,
                    "F_{}({}): {} vs {}",
                    n,
                    x,
                    series,
                    upward
                );
            }
        }
    }

    #[test]
    fn test_boys_downward_recursion_holds() {
        // F_n = (2x F_{n+1} + e^-x) / (2n + 1)
        for &x in &[0.0, 0.7, 12.0, 45.0] {
            for n in 0..MAX_BOYS_ORDER {
                let lhs = boys_function(n, x);
                let rhs = (2.0 * x * boys_function(n + 1, x) + (-x).exp()) / (2.0 * n as f64 + 1.0);
                assert!((lhs - rhs).abs() < 1e-14 * lhs, "n = {}, x = {}", n, x);
            }
        }
    }

    #[test]
    fn test_boys_asymptote() {
        let x = 60.0;
        let expected = 0.5 * (PI / x).sqrt();
        assert!((boys_function(0, x) - expected).abs() < 1e-14);
    }
}
