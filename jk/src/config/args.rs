//! Command-line argument parsing for the composite J/K driver

use clap::Parser;

/// Restricted Hartree-Fock with composite J/K builds, configured from YAML
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config_file: String,

    /// Override the J+K algorithm pair, e.g. DFDIRJ+COSX
    #[arg(long)]
    pub scf_type: Option<String>,

    /// Override the integral screening tolerance
    #[arg(long)]
    pub ints_tolerance: Option<f64>,

    /// Override the worker thread count
    #[arg(long)]
    pub threads: Option<usize>,

    /// Enable incremental Fock builds
    #[arg(long)]
    pub incfock: bool,

    /// Record the number of computed shells per iteration
    #[arg(long)]
    pub bench: bool,

    /// Override maximum SCF cycles
    #[arg(long)]
    pub max_cycle: Option<usize>,

    /// Override convergence threshold
    #[arg(long)]
    pub convergence_threshold: Option<f64>,

    /// Override output file: (default stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Print debug-level diagnostics
    #[arg(short, long)]
    pub verbose: bool,
}
