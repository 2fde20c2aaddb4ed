//! Configuration management for composite J/K builds
//!
//! Raw YAML structures keep every field optional and are completed by `with_defaults`.
//! `JkParams::validate` turns them into the typed [`JkOptions`] the builders consume, so
//! algorithm names and tolerances are checked once, before any integral is computed.

mod args;

pub use args::Args;

use crate::error::{JkError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const DEFAULT_SCF_TYPE: &str = "DFDIRJ+LINK";
const DEFAULT_INTS_TOLERANCE: f64 = 1e-12;
const DEFAULT_SCREENING: &str = "SCHWARZ";
const DEFAULT_INCFOCK_FULL_FOCK_EVERY: i64 = 100;
const DEFAULT_INCFOCK_CONVERGENCE: f64 = 1e-5;
const DEFAULT_COSX_INTS_TOLERANCE: f64 = 1e-11;
const DEFAULT_COSX_DENSITY_TOLERANCE: f64 = 1e-10;
const DEFAULT_COSX_BASIS_TOLERANCE: f64 = 1e-10;
const DEFAULT_COSX_RADIAL_INITIAL: usize = 25;
const DEFAULT_COSX_SPHERICAL_INITIAL: usize = 50;
const DEFAULT_COSX_RADIAL_FINAL: usize = 35;
const DEFAULT_COSX_SPHERICAL_FINAL: usize = 110;

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Main configuration structure for the command-line driver
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub geometry: Vec<Atom>,
    /// Primary basis per element: a path to an NWChem file or a Basis Set Exchange name.
    pub basis_sets: HashMap<String, String>,
    /// Fitting basis per element (NWChem file). Elements without one get an even-tempered set.
    #[serde(default)]
    pub auxiliary_basis_sets: HashMap<String, String>,
    #[serde(default)]
    pub scf_params: ScfParams,
    #[serde(default)]
    pub jk_params: JkParams,
}

impl Config {
    pub fn with_defaults(mut self) -> Self {
        self.scf_params = self.scf_params.with_defaults();
        self.jk_params = self.jk_params.with_defaults();
        self
    }
}

/// Atomic position configuration (bohr)
#[derive(Debug, Deserialize, Serialize)]
pub struct Atom {
    pub element: String,
    pub coords: [f64; 3],
}

/// Parameters of the RHF loop that drives the builders
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScfParams {
    pub density_mixing: Option<f64>,
    pub max_cycle: Option<usize>,
    pub convergence_threshold: Option<f64>,
}

impl Default for ScfParams {
    fn default() -> Self {
        ScfParams {
            density_mixing: Some(0.0),
            max_cycle: Some(50),
            convergence_threshold: Some(1e-6),
        }
    }
}

impl ScfParams {
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.density_mixing.is_none() {
            self.density_mixing = defaults.density_mixing;
        }
        if self.max_cycle.is_none() {
            self.max_cycle = defaults.max_cycle;
        }
        if self.convergence_threshold.is_none() {
            self.convergence_threshold = defaults.convergence_threshold;
        }
        self
    }
}

/// J/K build options as written in the YAML file
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JkParams {
    pub scf_type: Option<String>,
    pub ints_tolerance: Option<f64>,
    pub link_ints_tolerance: Option<f64>,
    pub screening: Option<String>,
    pub incfock: Option<bool>,
    pub incfock_full_fock_every: Option<i64>,
    pub incfock_convergence: Option<f64>,
    pub cosx_ints_tolerance: Option<f64>,
    pub cosx_density_tolerance: Option<f64>,
    pub cosx_basis_tolerance: Option<f64>,
    pub cosx_overlap_fitting: Option<bool>,
    pub cosx_radial_points_initial: Option<usize>,
    pub cosx_spherical_points_initial: Option<usize>,
    pub cosx_radial_points_final: Option<usize>,
    pub cosx_spherical_points_final: Option<usize>,
    pub threads: Option<usize>,
    pub bench: Option<bool>,
}

impl Default for JkParams {
    fn default() -> Self {
        JkParams {
            scf_type: Some(DEFAULT_SCF_TYPE.to_string()),
            ints_tolerance: Some(DEFAULT_INTS_TOLERANCE),
            // falls back to ints_tolerance
            link_ints_tolerance: None,
            screening: Some(DEFAULT_SCREENING.to_string()),
            incfock: Some(false),
            incfock_full_fock_every: Some(DEFAULT_INCFOCK_FULL_FOCK_EVERY),
            incfock_convergence: Some(DEFAULT_INCFOCK_CONVERGENCE),
            cosx_ints_tolerance: Some(DEFAULT_COSX_INTS_TOLERANCE),
            cosx_density_tolerance: Some(DEFAULT_COSX_DENSITY_TOLERANCE),
            cosx_basis_tolerance: Some(DEFAULT_COSX_BASIS_TOLERANCE),
            cosx_overlap_fitting: Some(true),
            cosx_radial_points_initial: Some(DEFAULT_COSX_RADIAL_INITIAL),
            cosx_spherical_points_initial: Some(DEFAULT_COSX_SPHERICAL_INITIAL),
            cosx_radial_points_final: Some(DEFAULT_COSX_RADIAL_FINAL),
            cosx_spherical_points_final: Some(DEFAULT_COSX_SPHERICAL_FINAL),
            threads: Some(default_threads()),
            bench: Some(false),
        }
    }
}

macro_rules! fill_missing {
    ($target:ident, $defaults:ident, $($field:ident),+ $(,)?) => {
        $(
            if $target.$field.is_none() {
                $target.$field = $defaults.$field;
            }
        )+
    };
}

impl JkParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        fill_missing!(
            self,
            defaults,
            scf_type,
            ints_tolerance,
            screening,
            incfock,
            incfock_full_fock_every,
            incfock_convergence,
            cosx_ints_tolerance,
            cosx_density_tolerance,
            cosx_basis_tolerance,
            cosx_overlap_fitting,
            cosx_radial_points_initial,
            cosx_spherical_points_initial,
            cosx_radial_points_final,
            cosx_spherical_points_final,
            threads,
            bench,
        );
        self
    }

    /// Checks every option and produces the typed form used by the builders.
    pub fn validate(&self) -> Result<JkOptions> {
        let params = self.clone().with_defaults();
        let defaults = JkOptions::default();

        let algorithm = params
            .scf_type
            .as_deref()
            .unwrap_or(DEFAULT_SCF_TYPE)
            .parse::<JkAlgorithm>()?;

        let ints_tolerance = non_negative(
            "INTS_TOLERANCE",
            params.ints_tolerance.unwrap_or(defaults.ints_tolerance),
        )?;
        let link_ints_tolerance = non_negative(
            "LINK_INTS_TOLERANCE",
            params.link_ints_tolerance.unwrap_or(ints_tolerance),
        )?;
        let screening = params
            .screening
            .as_deref()
            .unwrap_or(DEFAULT_SCREENING)
            .parse::<ScreeningType>()?;

        let reset = params
            .incfock_full_fock_every
            .unwrap_or(DEFAULT_INCFOCK_FULL_FOCK_EVERY);
        if reset <= 0 {
            return Err(JkError::InvalidOption {
                name: "INCFOCK_FULL_FOCK_EVERY",
                reason: format!("{} <= 0", reset),
            });
        }
        let incfock = IncFockOptions {
            enabled: params.incfock.unwrap_or(defaults.incfock.enabled),
            full_fock_every: reset as usize,
            convergence: non_negative(
                "INCFOCK_CONVERGENCE",
                params
                    .incfock_convergence
                    .unwrap_or(defaults.incfock.convergence),
            )?,
        };

        let cosx = CosxOptions {
            ints_tolerance: non_negative(
                "COSX_INTS_TOLERANCE",
                params
                    .cosx_ints_tolerance
                    .unwrap_or(defaults.cosx.ints_tolerance),
            )?,
            density_tolerance: non_negative(
                "COSX_DENSITY_TOLERANCE",
                params
                    .cosx_density_tolerance
                    .unwrap_or(defaults.cosx.density_tolerance),
            )?,
            basis_tolerance: positive(
                "COSX_BASIS_TOLERANCE",
                params
                    .cosx_basis_tolerance
                    .unwrap_or(defaults.cosx.basis_tolerance),
            )?,
            overlap_fitting: params
                .cosx_overlap_fitting
                .unwrap_or(defaults.cosx.overlap_fitting),
            initial_grid: GridOptions::checked(
                "COSX_RADIAL_POINTS_INITIAL",
                params
                    .cosx_radial_points_initial
                    .unwrap_or(DEFAULT_COSX_RADIAL_INITIAL),
                params
                    .cosx_spherical_points_initial
                    .unwrap_or(DEFAULT_COSX_SPHERICAL_INITIAL),
            )?,
            final_grid: GridOptions::checked(
                "COSX_RADIAL_POINTS_FINAL",
                params
                    .cosx_radial_points_final
                    .unwrap_or(DEFAULT_COSX_RADIAL_FINAL),
                params
                    .cosx_spherical_points_final
                    .unwrap_or(DEFAULT_COSX_SPHERICAL_FINAL),
            )?,
        };

        let threads = params.threads.unwrap_or(defaults.threads);
        if threads == 0 {
            return Err(JkError::InvalidOption {
                name: "THREADS",
                reason: "at least one worker thread is required".to_string(),
            });
        }

        let options = JkOptions {
            algorithm,
            ints_tolerance,
            link_ints_tolerance,
            screening,
            incfock,
            cosx,
            threads,
            bench: params.bench.unwrap_or(false),
        };
        options.check()?;
        Ok(options)
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(JkError::InvalidOption {
            name,
            reason: format!("{} is not a non-negative number", value),
        })
    }
}

fn positive(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(JkError::InvalidOption {
            name,
            reason: format!("{} is not a positive number", value),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JAlgorithm {
    /// Integral-direct density-fitted Coulomb
    DfDirJ,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KAlgorithm {
    /// Linear exchange
    Link,
    /// Chain-of-spheres semi-numerical exchange
    Cosx,
}

impl fmt::Display for JAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JAlgorithm::DfDirJ => f.pad("DFDIRJ"),
        }
    }
}

impl fmt::Display for KAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KAlgorithm::Link => f.pad("LINK"),
            KAlgorithm::Cosx => f.pad("COSX"),
        }
    }
}

/// A supported (J, K) combination; `k` is `None` when only J is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JkAlgorithm {
    pub j: JAlgorithm,
    pub k: Option<KAlgorithm>,
}

impl FromStr for JkAlgorithm {
    type Err = JkError;

    /// Parses `J_ALGO+K_ALGO`. A lone name or two identical names select no K algorithm.
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let (j_name, k_name) = match upper.split_once('+') {
            Some((j, k)) => (j.trim().to_string(), k.trim().to_string()),
            None => (upper.clone(), upper.clone()),
        };

        let j = match j_name.as_str() {
            "DFDIRJ" => JAlgorithm::DfDirJ,
            _ => return Err(JkError::InvalidJAlgorithm(j_name)),
        };

        let k = if k_name == j_name {
            None
        } else {
            match k_name.as_str() {
                "LINK" => Some(KAlgorithm::Link),
                "COSX" => Some(KAlgorithm::Cosx),
                _ => return Err(JkError::InvalidKAlgorithm(k_name)),
            }
        };

        Ok(JkAlgorithm { j, k })
    }
}

impl fmt::Display for JkAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.k {
            Some(k) => write!(f, "{}+{}", self.j, k),
            None => write!(f, "{}", self.j),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreeningType {
    None,
    Schwarz,
    Density,
}

impl FromStr for ScreeningType {
    type Err = JkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(ScreeningType::None),
            "SCHWARZ" | "CSAM" => Ok(ScreeningType::Schwarz),
            "DENSITY" => Ok(ScreeningType::Density),
            other => Err(JkError::InvalidOption {
                name: "SCREENING",
                reason: format!("unknown screening type '{}'", other),
            }),
        }
    }
}

impl fmt::Display for ScreeningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScreeningType::None => "NONE",
            ScreeningType::Schwarz => "SCHWARZ",
            ScreeningType::Density => "DENSITY",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncFockOptions {
    pub enabled: bool,
    pub full_fock_every: usize,
    pub convergence: f64,
}

/// Resolution of one COSX grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridOptions {
    pub radial_points: usize,
    /// Minimum number of angular points per radial shell.
    pub spherical_points: usize,
}

impl GridOptions {
    fn checked(name: &'static str, radial_points: usize, spherical_points: usize) -> Result<Self> {
        if radial_points < 2 || spherical_points == 0 {
            return Err(JkError::InvalidOption {
                name,
                reason: format!(
                    "grid needs at least 2 radial and 1 spherical point, got {}x{}",
                    radial_points, spherical_points
                ),
            });
        }
        Ok(Self {
            radial_points,
            spherical_points,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CosxOptions {
    pub ints_tolerance: f64,
    pub density_tolerance: f64,
    pub basis_tolerance: f64,
    pub overlap_fitting: bool,
    pub initial_grid: GridOptions,
    pub final_grid: GridOptions,
}

/// Validated J/K options.
#[derive(Debug, Clone, PartialEq)]
pub struct JkOptions {
    pub algorithm: JkAlgorithm,
    pub ints_tolerance: f64,
    pub link_ints_tolerance: f64,
    pub screening: ScreeningType,
    pub incfock: IncFockOptions,
    pub cosx: CosxOptions,
    pub threads: usize,
    pub bench: bool,
}

impl Default for JkOptions {
    fn default() -> Self {
        JkOptions {
            algorithm: JkAlgorithm {
                j: JAlgorithm::DfDirJ,
                k: Some(KAlgorithm::Link),
            },
            ints_tolerance: DEFAULT_INTS_TOLERANCE,
            link_ints_tolerance: DEFAULT_INTS_TOLERANCE,
            screening: ScreeningType::Schwarz,
            incfock: IncFockOptions {
                enabled: false,
                full_fock_every: DEFAULT_INCFOCK_FULL_FOCK_EVERY as usize,
                convergence: DEFAULT_INCFOCK_CONVERGENCE,
            },
            cosx: CosxOptions {
                ints_tolerance: DEFAULT_COSX_INTS_TOLERANCE,
                density_tolerance: DEFAULT_COSX_DENSITY_TOLERANCE,
                basis_tolerance: DEFAULT_COSX_BASIS_TOLERANCE,
                overlap_fitting: true,
                initial_grid: GridOptions {
                    radial_points: DEFAULT_COSX_RADIAL_INITIAL,
                    spherical_points: DEFAULT_COSX_SPHERICAL_INITIAL,
                },
                final_grid: GridOptions {
                    radial_points: DEFAULT_COSX_RADIAL_FINAL,
                    spherical_points: DEFAULT_COSX_SPHERICAL_FINAL,
                },
            },
            threads: default_threads(),
            bench: false,
        }
    }
}

impl JkOptions {
    /// Re-checks the invariants `JkParams::validate` establishes, for options built by hand.
    pub fn check(&self) -> Result<()> {
        non_negative("INTS_TOLERANCE", self.ints_tolerance)?;
        non_negative("LINK_INTS_TOLERANCE", self.link_ints_tolerance)?;
        non_negative("INCFOCK_CONVERGENCE", self.incfock.convergence)?;
        if self.incfock.full_fock_every == 0 {
            return Err(JkError::InvalidOption {
                name: "INCFOCK_FULL_FOCK_EVERY",
                reason: "0 <= 0".to_string(),
            });
        }
        if self.threads == 0 {
            return Err(JkError::InvalidOption {
                name: "THREADS",
                reason: "at least one worker thread is required".to_string(),
            });
        }

        let cosx = &self.cosx;
        non_negative("COSX_INTS_TOLERANCE", cosx.ints_tolerance)?;
        non_negative("COSX_DENSITY_TOLERANCE", cosx.density_tolerance)?;
        positive("COSX_BASIS_TOLERANCE", cosx.basis_tolerance)?;
        GridOptions::checked(
            "COSX_RADIAL_POINTS_INITIAL",
            cosx.initial_grid.radial_points,
            cosx.initial_grid.spherical_points,
        )?;
        GridOptions::checked(
            "COSX_RADIAL_POINTS_FINAL",
            cosx.final_grid.radial_points,
            cosx.final_grid.spherical_points,
        )?;
        Ok(())
    }

    /// Integral cutoff actually applied; screening type NONE disables it.
    pub fn effective_cutoff(&self) -> f64 {
        match self.screening {
            ScreeningType::None => 0.0,
            _ => self.ints_tolerance,
        }
    }

    /// Cutoff of the LinK density-weighted ket lists.
    pub fn effective_link_cutoff(&self) -> f64 {
        match self.screening {
            ScreeningType::None => 0.0,
            _ => self.link_ints_tolerance,
        }
    }
}
