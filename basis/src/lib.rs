//! Gaussian basis functions and the integral kernels used by the J/K builders.

pub mod basis;
pub mod cgto;
pub mod engine;
pub mod error;
pub mod gto;
pub mod helper;
pub mod shell;

mod gto_test;

pub use cgto::{ContractedGTO, ElementBasis, ShellTemplate};
pub use engine::{GtoEngine, IntegralEngine};
pub use error::BasisError;
pub use shell::{BasisSet, Shell};
