//! Atom-centered molecular quadrature grids, cut into spatially local blocks.
//!
//! Every atom carries a Becke-mapped Gauss-Legendre radial grid times a product angular grid
//! (Gauss-Legendre in cos θ, uniform in φ). Becke's fuzzy-cell weights partition the atomic
//! grids. The points are then split recursively into compact blocks, each listing the shells
//! whose extent reaches it.

use crate::config::GridOptions;
use basis::BasisSet;
use nalgebra::{DMatrix, Vector3};
use std::f64::consts::PI;
use tracing::{debug, info};

const MAX_BLOCK_POINTS: usize = 256;
const MAX_BLOCK_RADIUS: f64 = 3.0;
const WEIGHT_CUTOFF: f64 = 1e-15;
const ANGSTROM_TO_BOHR: f64 = 1.0 / 0.529_177_210_903;

/// One batch of nearby points and the shells with support on them.
#[derive(Debug, Clone)]
pub struct GridBlock {
    points: Vec<Vector3<f64>>,
    weights: Vec<f64>,
    center: Vector3<f64>,
    radius: f64,
    local_shells: Vec<usize>,
    local_functions: Vec<usize>,
}

impl GridBlock {
    pub fn npoints(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }

    /// Signed quadrature weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn center(&self) -> &Vector3<f64> {
        &self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Shells reaching the block, in ascending order.
    pub fn local_shells(&self) -> &[usize] {
        &self.local_shells
    }

    /// Global index of every block-local function, shell by shell.
    pub fn local_functions(&self) -> &[usize] {
        &self.local_functions
    }

    /// Values of the block-local functions, `[point][local function]`.
    pub fn basis_values(&self, basis: &BasisSet) -> DMatrix<f64> {
        let mut values = DMatrix::zeros(self.npoints(), self.local_functions.len());
        let mut scratch = vec![0.0; basis.max_function_per_shell()];
        for (g, point) in self.points.iter().enumerate() {
            let mut column = 0;
            for &shell_index in &self.local_shells {
                let shell = basis.shell(shell_index);
                let n = shell.nfunction();
                shell.evaluate_into(point, &mut scratch[..n]);
                for value in &scratch[..n] {
                    values[(g, column)] = *value;
                    column += 1;
                }
            }
        }
        values
    }
}

#[derive(Debug, Clone)]
pub struct MolecularGrid {
    blocks: Vec<GridBlock>,
    shell_extents: Vec<f64>,
    npoints: usize,
    negative_weights: bool,
}

impl MolecularGrid {
    /// Builds the Becke grid of `basis`' atoms; `basis_tolerance` sets the shell extents.
    pub fn new(basis: &BasisSet, options: &GridOptions, basis_tolerance: f64) -> Self {
        let centers = basis.centers();
        let (radial_x, radial_w) = gauss_legendre(options.radial_points);
        let angular = product_angular_grid(options.spherical_points);

        let mut points = Vec::new();
        let mut weights = Vec::new();
        for (atom, center) in centers.iter().enumerate() {
            let r_m = becke_radius(basis.charges()[atom]);
            for (&x, &wx) in radial_x.iter().zip(radial_w.iter()) {
                let r = r_m * (1.0 + x) / (1.0 - x);
                let w_radial = wx * 2.0 * r_m / ((1.0 - x) * (1.0 - x)) * r * r;
                for (direction, w_angular) in &angular {
                    let point = center + direction * r;
                    let w = w_radial * w_angular * becke_weight_for_atom(atom, &point, centers);
                    if w.is_finite() && w.abs() >= WEIGHT_CUTOFF {
                        points.push(point);
                        weights.push(w);
                    }
                }
            }
        }

        debug!(
            "Atomic grids: {} radial x {} angular points per atom",
            radial_x.len(),
            angular.len()
        );
        Self::from_points(basis, points, weights, basis_tolerance)
    }

    /// Blocks an arbitrary set of points and signed weights.
    pub fn from_points(
        basis: &BasisSet,
        points: Vec<Vector3<f64>>,
        weights: Vec<f64>,
        basis_tolerance: f64,
    ) -> Self {
        let shell_extents: Vec<f64> = basis
            .shells()
            .iter()
            .map(|shell| shell.extent(basis_tolerance))
            .collect();

        let negative_weights = weights.iter().any(|&w| w < 0.0);
        if negative_weights {
            info!("Quadrature grid contains negative weights; COSX uses a sign-aware correction");
        }

        let npoints = points.len();
        let mut blocks = Vec::new();
        split_block(
            (0..npoints).collect(),
            &points,
            &mut |indices: &[usize], center: Vector3<f64>, radius: f64| {
                blocks.push(make_block(
                    basis,
                    &shell_extents,
                    &points,
                    &weights,
                    indices,
                    center,
                    radius,
                ))
            },
        );

        Self {
            blocks,
            shell_extents,
            npoints,
            negative_weights,
        }
    }

    pub fn blocks(&self) -> &[GridBlock] {
        &self.blocks
    }

    pub fn npoints(&self) -> usize {
        self.npoints
    }

    /// Radius around its center beyond which a shell is negligible.
    pub fn shell_extents(&self) -> &[f64] {
        &self.shell_extents
    }

    pub fn has_negative_weights(&self) -> bool {
        self.negative_weights
    }

    pub fn max_points(&self) -> usize {
        self.blocks.iter().map(GridBlock::npoints).max().unwrap_or(0)
    }

    pub fn max_functions(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.local_functions.len())
            .max()
            .unwrap_or(0)
    }
}

fn make_block(
    basis: &BasisSet,
    extents: &[f64],
    points: &[Vector3<f64>],
    weights: &[f64],
    indices: &[usize],
    center: Vector3<f64>,
    radius: f64,
) -> GridBlock {
    let local_shells: Vec<usize> = basis
        .shells()
        .iter()
        .enumerate()
        .filter(|(index, shell)| (shell.center - center).norm() <= extents[*index] + radius)
        .map(|(index, _)| index)
        .collect();
    let local_functions = local_shells
        .iter()
        .flat_map(|&s| basis.shell(s).function_range())
        .collect();

    GridBlock {
        points: indices.iter().map(|&i| points[i]).collect(),
        weights: indices.iter().map(|&i| weights[i]).collect(),
        center,
        radius,
        local_shells,
        local_functions,
    }
}

/// Bisects along the longest box axis until blocks are small and compact.
fn split_block<F>(mut indices: Vec<usize>, points: &[Vector3<f64>], emit: &mut F)
where
    F: FnMut(&[usize], Vector3<f64>, f64),
{
    if indices.is_empty() {
        return;
    }
    let mut lower = points[indices[0]];
    let mut upper = lower;
    for &i in &indices {
        lower = lower.inf(&points[i]);
        upper = upper.sup(&points[i]);
    }
    let center = (lower + upper) * 0.5;
    let radius = indices
        .iter()
        .map(|&i| (points[i] - center).norm())
        .fold(0.0, f64::max);

    if indices.len() == 1 || (indices.len() <= MAX_BLOCK_POINTS && radius <= MAX_BLOCK_RADIUS) {
        emit(&indices, center, radius);
        return;
    }

    let axis = (upper - lower).imax();
    indices.sort_by(|&a, &b| points[a][axis].total_cmp(&points[b][axis]));
    let upper_half = indices.split_off(indices.len() / 2);
    split_block(indices, points, emit);
    split_block(upper_half, points, emit);
}

/// Half the Bragg-Slater radius (bohr), the full radius for hydrogen.
fn becke_radius(atomic_number: u32) -> f64 {
    let angstrom = match atomic_number {
        1 => 0.35 * 2.0,
        2 => 0.35,
        3 => 1.45,
        4 => 1.05,
        5 => 0.85,
        6 => 0.70,
        7 => 0.65,
        8 => 0.60,
        9 => 0.50,
        10 => 0.45,
        _ => 1.00,
    };
    0.5 * angstrom * ANGSTROM_TO_BOHR
}

/// At least `minimum` unit directions with weights summing to 4π.
fn product_angular_grid(minimum: usize) -> Vec<(Vector3<f64>, f64)> {
    let n_theta = ((minimum as f64 / 2.0).sqrt().ceil() as usize).max(1);
    let n_phi = 2 * n_theta;
    let (cos_theta, w_theta) = gauss_legendre(n_theta);
    let w_phi = 2.0 * PI / n_phi as f64;

    let mut directions = Vec::with_capacity(n_theta * n_phi);
    for (&ct, &wt) in cos_theta.iter().zip(w_theta.iter()) {
        let st = (1.0 - ct * ct).max(0.0).sqrt();
        for k in 0..n_phi {
            let phi = w_phi * k as f64;
            directions.push((
                Vector3::new(st * phi.cos(), st * phi.sin(), ct),
                wt * w_phi,
            ));
        }
    }
    directions
}

/// Becke's fuzzy-cell weight of atom `a` at point `r`.
fn becke_weight_for_atom(a: usize, r: &Vector3<f64>, coords: &[Vector3<f64>]) -> f64 {
    let na = coords.len();
    if na == 1 {
        return 1.0;
    }
    let mut cell = vec![1.0_f64; na];
    for i in 0..na {
        for j in 0..na {
            if i != j {
                cell[i] *= becke_step(i, j, r, coords);
            }
        }
    }
    let total: f64 = cell.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    cell[a] / total
}

fn becke_step(i: usize, j: usize, r: &Vector3<f64>, coords: &[Vector3<f64>]) -> f64 {
    let ri = (r - coords[i]).norm();
    let rj = (r - coords[j]).norm();
    let rij = (coords[i] - coords[j]).norm();
    if rij < 1e-12 {
        return 0.5;
    }
    let mut mu = (ri - rj) / rij;
    for _ in 0..3 {
        mu = (3.0 * mu - mu * mu * mu) / 2.0;
    }
    0.5 * (1.0 - mu)
}

/// Gauss-Legendre nodes (ascending) and weights on [-1, 1].
fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let n = n.max(1);
    let nn = n as f64;
    let mut x = vec![0.0_f64; n];
    let mut w = vec![0.0_f64; n];

    for i in 0..(n + 1) / 2 {
        let mut z = (PI * (i as f64 + 0.75) / (nn + 0.5)).cos();
        let mut derivative = 1.0;
        for _ in 0..100 {
            let (p_n, p_prev) = legendre_pn(n, z);
            derivative = nn * (z * p_n - p_prev) / (z * z - 1.0);
            let step = p_n / derivative;
            z -= step;
            if step.abs() < 1e-15 {
                let (p_n, p_prev) = legendre_pn(n, z);
                derivative = nn * (z * p_n - p_prev) / (z * z - 1.0);
                break;
            }
        }
        x[i] = -z;
        x[n - 1 - i] = z;
        let weight = 2.0 / ((1.0 - z * z) * derivative * derivative);
        w[i] = weight;
        w[n - 1 - i] = weight;
    }
    (x, w)
}

/// (P_n(z), P_{n-1}(z)) by upward recursion.
fn legendre_pn(n: usize, z: f64) -> (f64, f64) {
    let mut p1 = 1.0;
    let mut p2 = 0.0;
    for j in 1..=n {
        let p3 = p2;
        p2 = p1;
        p1 = ((2.0 * j as f64 - 1.0) * z * p2 - (j as f64 - 1.0) * p3) / (j as f64);
    }
    (p1, p2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use basis::ElementBasis;

    fn h2() -> BasisSet {
        let h = ElementBasis::parse_nwchem(
            "H S\n 3.42525091 0.15432897\n 0.62391373 0.53532814\n 0.16885540 0.44463454\n",
        )
        .unwrap();
        BasisSet::new(
            "sto-3g",
            &[
                (Vector3::new(0.0, 0.0, -0.7), &h),
                (Vector3::new(0.0, 0.0, 0.7), &h),
            ],
        )
    }

    #[test]
    fn test_gauss_legendre_integrates_polynomials() {
        let (x, w) = gauss_legendre(5);
        assert!((w.iter().sum::<f64>() - 2.0).abs() < 1e-14);
        let x8: f64 = x.iter().zip(w.iter()).map(|(x, w)| w * x.powi(8)).sum();
        assert!((x8 - 2.0 / 9.0).abs() < 1e-14);
        assert!(x.windows(2).all(|p| p[0] < p[1]));

        let (x1, w1) = gauss_legendre(1);
        assert_eq!(x1, vec![0.0]);
        assert!((w1[0] - 2.0).abs() < 1e-15);
    }

    #[test]
    fn test_angular_grid_sums_to_sphere() {
        let angular = product_angular_grid(50);
        assert!(angular.len() >= 50);
        let total: f64 = angular.iter().map(|(_, w)| w).sum();
        assert!((total - 4.0 * PI).abs() < 1e-12);
        // <z^2> over the sphere is 4π/3
        let z2: f64 = angular.iter().map(|(d, w)| w * d.z * d.z).sum();
        assert!((z2 - 4.0 * PI / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_grid_integrates_overlap() {
        let basis = h2();
        let grid = MolecularGrid::new(
            &basis,
            &GridOptions {
                radial_points: 40,
                spherical_points: 110,
            },
            1e-12,
        );
        assert!(!grid.has_negative_weights());

        let mut numeric = DMatrix::zeros(2, 2);
        for block in grid.blocks() {
            let phi = block.basis_values(&basis);
            for (g, w) in block.weights().iter().enumerate() {
                for a in 0..phi.ncols() {
                    for b in 0..phi.ncols() {
                        let (i, j) = (block.local_functions()[a], block.local_functions()[b]);
                        numeric[(i, j)] += w * phi[(g, a)] * phi[(g, b)];
                    }
                }
            }
        }
        let analytic = basis::engine::overlap_matrix(&basis);
        assert!((numeric - analytic).amax() < 1e-4);
    }

    #[test]
    fn test_blocks_partition_points() {
        let basis = h2();
        let grid = MolecularGrid::new(
            &basis,
            &GridOptions {
                radial_points: 20,
                spherical_points: 50,
            },
            1e-10,
        );
        let total: usize = grid.blocks().iter().map(GridBlock::npoints).sum();
        assert_eq!(total, grid.npoints());
        for block in grid.blocks() {
            assert!(block.npoints() <= MAX_BLOCK_POINTS);
            for p in block.points() {
                assert!((p - block.center()).norm() <= block.radius() + 1e-12);
            }
            assert!(block.local_shells().windows(2).all(|s| s[0] < s[1]));
        }
    }

    #[test]
    fn test_negative_weights_are_detected() {
        let basis = h2();
        let points = vec![Vector3::new(0.0, 0.0, 0.1), Vector3::new(0.0, 0.3, 0.0)];
        let grid = MolecularGrid::from_points(&basis, points, vec![0.5, -0.25], 1e-10);
        assert!(grid.has_negative_weights());
        assert_eq!(grid.blocks().len(), 1);
        assert_eq!(grid.blocks()[0].local_functions(), &[0, 1]);
    }
}
