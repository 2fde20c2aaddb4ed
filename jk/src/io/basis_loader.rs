//! Basis set loading utilities

use basis::ElementBasis;
use color_eyre::eyre::{Result, WrapErr};
use std::fs;
use std::path::Path;
use tracing::debug;

const LOCAL_BASIS_DIR: &str = "basis_sets";

/// Loads the basis of one element.
///
/// `source` is either a path to an NWChem file or a basis set name. Names are looked up in
/// `basis_sets/<name>.<symbol>.nwchem` first and fetched from the Basis Set Exchange
/// otherwise.
pub fn fetch_basis(source: &str, atomic_symbol: &str) -> Result<ElementBasis> {
    let text = if Path::new(source).is_file() {
        debug!("Loading {} basis from file {}", atomic_symbol, source);
        fs::read_to_string(source)
            .wrap_err_with(|| format!("Failed to read basis set file: {}", source))?
    } else {
        let local_path = format!(
            "{}/{}.{}.nwchem",
            LOCAL_BASIS_DIR,
            source.to_lowercase(),
            atomic_symbol.to_lowercase()
        );
        if Path::new(&local_path).exists() {
            debug!("Loading {} basis from local file {}", atomic_symbol, local_path);
            fs::read_to_string(&local_path)
                .wrap_err_with(|| format!("Failed to read local basis set file: {}", local_path))?
        } else {
            let url = format!(
                "https://www.basissetexchange.org/api/basis/{}/format/nwchem?elements={}",
                source, atomic_symbol
            );
            debug!("Fetching {} basis from {}", atomic_symbol, url);
            reqwest::blocking::get(&url)
                .wrap_err_with(|| format!("Failed to fetch basis set for {}", atomic_symbol))?
                .error_for_status()
                .wrap_err_with(|| format!("Basis Set Exchange rejected {} for {}", source, atomic_symbol))?
                .text()
                .wrap_err("Failed to get response text from basis set API")?
        }
    };

    ElementBasis::parse_nwchem(&text)
        .wrap_err_with(|| format!("Invalid {} basis for {}", source, atomic_symbol))
}
