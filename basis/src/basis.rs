#![allow(non_snake_case)]

use nalgebra::Vector3;

/// One-particle function with the analytic integrals the Fock build needs.
///
/// `Vab` is the attraction to a point charge `Z` at `R` and therefore negative for a
/// positive overlap density; `JKabcd` is the repulsion integral (ab|cd) in chemists'
/// notation.
pub trait Basis {
    fn evaluate(&self, r: &Vector3<f64>) -> f64;
    fn Sab(a: &Self, b: &Self) -> f64;
    fn Tab(a: &Self, b: &Self) -> f64;
    fn Vab(a: &Self, b: &Self, R: Vector3<f64>, Z: u32) -> f64;
    fn JKabcd(a: &Self, b: &Self, c: &Self, d: &Self) -> f64;
}
