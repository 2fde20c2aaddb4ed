//! Composite J/K builds for self-consistent-field iterations.
//!
//! The Coulomb matrix is built by integral-direct density fitting ([`dfj`]) and the exchange
//! matrix by either linear exchange ([`link`]) or chain-of-spheres semi-numerical exchange
//! ([`cosx`]). [`CompositeJk`] selects the pair named by the `scf_type` option and runs it on
//! a fixed rayon pool, optionally on incremental densities ([`incfock`]).

pub mod composite;
pub mod config;
pub mod cosx;
pub mod dfj;
pub mod error;
pub mod grid;
pub mod incfock;
pub mod linalg;
pub mod link;
pub mod metric;
pub mod overlap_fitting;
pub mod parallel;
pub mod screening;

pub use composite::{CompositeJk, GridStage, JkMatrices};
pub use config::{JkAlgorithm, JkOptions, JkParams, ScreeningType};
pub use error::{JkError, Result};
