mod basis;
mod geometry;
mod report;
mod runner;

pub use basis::load_basis_sets;
pub use geometry::build_geometry;
pub use runner::run_restricted;

use self::report::{report_bench, report_restricted_summary};
use crate::io::setup_output;
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use composite_jk::config::{Args, Config};
use composite_jk::CompositeJk;
use std::fs;
use tracing::info;

pub struct JkApplication {
    args: Args,
    config: Config,
}

impl JkApplication {
    pub fn from_cli() -> Result<Self> {
        let args = Args::parse();
        let config = load_config(&args)?;
        Ok(Self { args, config })
    }

    pub fn run(self) -> Result<()> {
        setup_output(self.args.output.as_ref(), self.args.verbose)?;

        let geometry = build_geometry(&self.config)?;
        let (primary, auxiliary) = load_basis_sets(&self.config, &geometry)?;
        info!(
            "Primary basis: {} functions, auxiliary basis: {} functions",
            primary.nbf(),
            auxiliary.nbf()
        );

        let options = self
            .config
            .jk_params
            .validate()
            .wrap_err("Invalid J/K options")?;
        let engine = ::basis::GtoEngine::new(primary.clone(), auxiliary.clone());
        let mut jk = CompositeJk::new(primary.clone(), auxiliary, engine, options)
            .wrap_err("Failed to set up the J/K builders")?;
        jk.print_header();

        let result = run_restricted(&primary, &mut jk, &self.config.scf_params)?;
        report_restricted_summary(&result);
        report_bench(&jk);
        Ok(())
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let config_content = fs::read_to_string(&args.config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", args.config_file))?;

    let mut config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .with_defaults();
    apply_overrides(args, &mut config);
    Ok(config)
}

/// Command-line flags take precedence over the YAML file.
fn apply_overrides(args: &Args, config: &mut Config) {
    let jk = &mut config.jk_params;
    if let Some(scf_type) = &args.scf_type {
        jk.scf_type = Some(scf_type.clone());
    }
    if let Some(tolerance) = args.ints_tolerance {
        jk.ints_tolerance = Some(tolerance);
    }
    if let Some(threads) = args.threads {
        jk.threads = Some(threads);
    }
    if args.incfock {
        jk.incfock = Some(true);
    }
    if args.bench {
        jk.bench = Some(true);
    }

    let scf = &mut config.scf_params;
    if let Some(max_cycle) = args.max_cycle {
        scf.max_cycle = Some(max_cycle);
    }
    if let Some(threshold) = args.convergence_threshold {
        scf.convergence_threshold = Some(threshold);
    }
}
