//! Composite J/K command-line interface
//!
//! Runs a restricted Hartree-Fock calculation whose Coulomb and exchange matrices come from
//! the configured composite J/K algorithms.

use color_eyre::eyre::Result;

mod app;
mod io;

use app::JkApplication;

fn main() -> Result<()> {
    color_eyre::install()?;
    JkApplication::from_cli()?.run()
}
