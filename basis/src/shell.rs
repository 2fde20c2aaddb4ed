use crate::basis::Basis;
use crate::cgto::{ContractedGTO, ElementBasis, ShellTemplate};
use crate::gto::GTO;
use nalgebra::Vector3;
use std::ops::Range;

/// Cartesian exponent triples of angular momentum `l` in lexicographic order
/// (xx, xy, xz, yy, yz, zz for d).
pub fn cartesian_components(l: i32) -> Vec<Vector3<i32>> {
    let mut components = Vec::with_capacity(((l + 1) * (l + 2) / 2) as usize);
    for lx in (0..=l).rev() {
        for ly in (0..=(l - lx)).rev() {
            components.push(Vector3::new(lx, ly, l - lx - ly));
        }
    }
    components
}

/// Functions sharing a center, an angular momentum and a contraction.
#[derive(Debug, Clone)]
pub struct Shell {
    pub l: i32,
    pub center_index: usize,
    pub center: Vector3<f64>,
    pub exponents: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub function_offset: usize,
    pub functions: Vec<ContractedGTO>,
}

impl Shell {
    pub fn new(
        template: &ShellTemplate,
        center_index: usize,
        center: Vector3<f64>,
        function_offset: usize,
    ) -> Self {
        let functions = cartesian_components(template.l)
            .into_iter()
            .map(|l_xyz| {
                let primitives = template
                    .exponents
                    .iter()
                    .map(|&alpha| GTO::new(alpha, l_xyz, center))
                    .collect();
                ContractedGTO::new(primitives, template.coefficients.clone()).normalized()
            })
            .collect();

        Self {
            l: template.l,
            center_index,
            center,
            exponents: template.exponents.clone(),
            coefficients: template.coefficients.clone(),
            function_offset,
            functions,
        }
    }

    pub fn nfunction(&self) -> usize {
        self.functions.len()
    }

    pub fn nprimitive(&self) -> usize {
        self.exponents.len()
    }

    /// Global indices of the functions of this shell.
    pub fn function_range(&self) -> Range<usize> {
        self.function_offset..self.function_offset + self.nfunction()
    }

    /// Upper bound on |φ(r)| for every function of the shell at distance `r` from its center.
    pub fn radial_bound(&self, r: f64) -> f64 {
        let r_l = r.powi(self.l);
        self.functions
            .iter()
            .map(|function| {
                function
                    .primitives
                    .iter()
                    .zip(function.coefficients.iter())
                    .map(|(g, c)| (c * g.norm).abs() * r_l * (-g.alpha * r * r).exp())
                    .sum::<f64>()
            })
            .fold(0.0, f64::max)
    }

    /// Distance beyond which `radial_bound` stays below `tolerance`.
    pub fn extent(&self, tolerance: f64) -> f64 {
        // walk out past the maximum of r^l exp(-a r^2) first, then bisect the crossing
        let mut outer = 1.0_f64;
        while self.radial_bound(outer) >= tolerance && outer < 1e3 {
            outer *= 2.0;
        }
        let mut inner = 0.0_f64;
        if self.l > 0 {
            let diffuse = self.exponents.iter().cloned().fold(f64::INFINITY, f64::min);
            inner = (self.l as f64 / (2.0 * diffuse)).sqrt().min(outer);
        }
        if self.radial_bound(inner) < tolerance {
            return inner;
        }
        for _ in 0..60 {
            let mid = 0.5 * (inner + outer);
            if self.radial_bound(mid) >= tolerance {
                inner = mid;
            } else {
                outer = mid;
            }
        }
        outer
    }

    /// Writes the value of every function of the shell at `r` into `out`.
    pub fn evaluate_into(&self, r: &Vector3<f64>, out: &mut [f64]) {
        for (value, function) in out.iter_mut().zip(self.functions.iter()) {
            *value = function.evaluate(r);
        }
    }
}

/// The shells of a whole molecule, ordered atom by atom.
#[derive(Debug, Clone)]
pub struct BasisSet {
    name: String,
    shells: Vec<Shell>,
    centers: Vec<Vector3<f64>>,
    charges: Vec<u32>,
    atom_shells: Vec<Range<usize>>,
    nbf: usize,
    max_shell_functions: usize,
}

impl BasisSet {
    /// Places the element basis of every atom at its position (bohr).
    pub fn new(name: &str, atoms: &[(Vector3<f64>, &ElementBasis)]) -> Self {
        let mut shells = Vec::new();
        let mut atom_shells = Vec::with_capacity(atoms.len());
        let mut nbf = 0;

        for (index, (center, element)) in atoms.iter().enumerate() {
            let start = shells.len();
            for template in &element.shells {
                let shell = Shell::new(template, index, *center, nbf);
                nbf += shell.nfunction();
                shells.push(shell);
            }
            atom_shells.push(start..shells.len());
        }

        let max_shell_functions = shells.iter().map(Shell::nfunction).max().unwrap_or(0);

        Self {
            name: name.to_string(),
            shells,
            centers: atoms.iter().map(|(c, _)| *c).collect(),
            charges: atoms.iter().map(|(_, e)| e.atomic_number).collect(),
            atom_shells,
            nbf,
            max_shell_functions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nbf(&self) -> usize {
        self.nbf
    }

    pub fn nshell(&self) -> usize {
        self.shells.len()
    }

    pub fn natom(&self) -> usize {
        self.centers.len()
    }

    pub fn shell(&self, index: usize) -> &Shell {
        &self.shells[index]
    }

    pub fn shells(&self) -> &[Shell] {
        &self.shells
    }

    pub fn centers(&self) -> &[Vector3<f64>] {
        &self.centers
    }

    pub fn charges(&self) -> &[u32] {
        &self.charges
    }

    /// Contiguous shell range owned by each atom (possibly empty).
    pub fn atom_shell_ranges(&self) -> &[Range<usize>] {
        &self.atom_shells
    }

    pub fn max_function_per_shell(&self) -> usize {
        self.max_shell_functions
    }

    /// Shell owning each basis function.
    pub fn function_to_shell(&self) -> Vec<usize> {
        let mut map = Vec::with_capacity(self.nbf);
        for (index, shell) in self.shells.iter().enumerate() {
            map.extend(std::iter::repeat(index).take(shell.nfunction()));
        }
        map
    }

    /// Contracted functions in global order.
    pub fn functions(&self) -> impl Iterator<Item = &ContractedGTO> {
        self.shells.iter().flat_map(|s| s.functions.iter())
    }

    /// Values of all basis functions at `r`.
    pub fn values_at(&self, r: &Vector3<f64>, out: &mut [f64]) {
        for shell in &self.shells {
            shell.evaluate_into(r, &mut out[shell.function_range()]);
        }
    }
}
