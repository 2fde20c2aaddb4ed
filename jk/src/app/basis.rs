use super::geometry::Geometry;
use crate::io::fetch_basis;
use ::basis::{BasisSet, ElementBasis};
use color_eyre::eyre::{eyre, Result, WrapErr};
use composite_jk::config::Config;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

// even-tempered fitting set used when no auxiliary basis is configured
const AUX_SMALLEST_EXPONENT: f64 = 0.1;
const AUX_RATIO: f64 = 2.5;
const AUX_COUNT: usize = 8;

/// Loads the primary and auxiliary basis of every atom and places them on the geometry.
pub fn load_basis_sets(config: &Config, geometry: &Geometry) -> Result<(Arc<BasisSet>, Arc<BasisSet>)> {
    let mut primary: HashMap<&str, ElementBasis> = HashMap::new();
    let mut auxiliary: HashMap<&str, ElementBasis> = HashMap::new();

    for element in &geometry.elements {
        let symbol = element.get_symbol();
        if primary.contains_key(symbol) {
            continue;
        }

        let source = config
            .basis_sets
            .get(symbol)
            .ok_or_else(|| eyre!("No basis set configured for {}", symbol))?;
        info!("Loading {} basis for {}", source, symbol);
        let element_basis = fetch_basis(source, symbol)?;

        let fitting = match config.auxiliary_basis_sets.get(symbol) {
            Some(source) => {
                info!("Loading {} auxiliary basis for {}", source, symbol);
                fetch_basis(source, symbol)?
            }
            None => {
                let max_l = element_basis.shells.iter().map(|s| s.l).max().unwrap_or(0) + 1;
                info!(
                    "Using even-tempered auxiliary basis for {} (l <= {}, {} exponents)",
                    symbol, max_l, AUX_COUNT
                );
                ElementBasis::even_tempered(symbol, max_l, AUX_SMALLEST_EXPONENT, AUX_RATIO, AUX_COUNT)
                    .wrap_err_with(|| format!("Failed to build auxiliary basis for {}", symbol))?
            }
        };

        primary.insert(symbol, element_basis);
        auxiliary.insert(symbol, fitting);
    }

    let place = |name: &str, sets: &HashMap<&str, ElementBasis>| {
        let atoms: Vec<_> = geometry
            .elements
            .iter()
            .zip(&geometry.coords)
            .filter_map(|(element, coord)| sets.get(element.get_symbol()).map(|b| (*coord, b)))
            .collect();
        Arc::new(BasisSet::new(name, &atoms))
    };

    Ok((place("primary", &primary), place("auxiliary", &auxiliary)))
}
