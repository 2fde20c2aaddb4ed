/* Contracted gaussian type orbitals (CGTO) built from the primitives in gto.rs,
   and the per-element shell templates read from NWChem basis files.
*/
#![allow(non_snake_case)]

use crate::basis::Basis;
use crate::error::BasisError;
use crate::gto::GTO;
use nalgebra::Vector3;
use periodic_table_on_an_enum::Element;
use serde::{Deserialize, Serialize};

/// Fixed linear combination of primitives sharing one center and angular part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractedGTO {
    pub primitives: Vec<GTO>,
    pub coefficients: Vec<f64>,
}

impl ContractedGTO {
    pub fn new(primitives: Vec<GTO>, coefficients: Vec<f64>) -> Self {
        debug_assert_eq!(primitives.len(), coefficients.len());
        Self {
            primitives,
            coefficients,
        }
    }

    /// Rescales the contraction coefficients so that <self|self> = 1.
    pub fn normalized(mut self) -> Self {
        let s = ContractedGTO::Sab(&self, &self);
        if s > 0.0 {
            let scale = 1.0 / s.sqrt();
            self.coefficients.iter_mut().for_each(|c| *c *= scale);
        }
        self
    }

    fn pairs<'a>(&'a self) -> impl Iterator<Item = (&'a GTO, f64)> + 'a {
        self.primitives.iter().zip(self.coefficients.iter().copied())
    }
}

impl Basis for ContractedGTO {
    fn evaluate(&self, r: &Vector3<f64>) -> f64 {
        self.pairs().map(|(g, c)| c * g.evaluate(r)).sum()
    }

    fn Sab(a: &Self, b: &Self) -> f64 {
        a.pairs()
            .map(|(ga, ca)| b.pairs().map(|(gb, cb)| ca * cb * GTO::Sab(ga, gb)).sum::<f64>())
            .sum()
    }

    fn Tab(a: &Self, b: &Self) -> f64 {
        a.pairs()
            .map(|(ga, ca)| b.pairs().map(|(gb, cb)| ca * cb * GTO::Tab(ga, gb)).sum::<f64>())
            .sum()
    }

    fn Vab(a: &Self, b: &Self, R: Vector3<f64>, Z: u32) -> f64 {
        a.pairs()
            .map(|(ga, ca)| {
                b.pairs()
                    .map(|(gb, cb)| ca * cb * GTO::Vab(ga, gb, R, Z))
                    .sum::<f64>()
            })
            .sum()
    }

    fn JKabcd(a: &Self, b: &Self, c: &Self, d: &Self) -> f64 {
        let mut val = 0.0;
        for (ga, ca) in a.pairs() {
            for (gb, cb) in b.pairs() {
                for (gc, cc) in c.pairs() {
                    for (gd, cd) in d.pairs() {
                        val += ca * cb * cc * cd * GTO::JKabcd(ga, gb, gc, gd);
                    }
                }
            }
        }
        val
    }
}

/// Exponents and contraction coefficients of one shell, independent of position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellTemplate {
    pub l: i32,
    pub exponents: Vec<f64>,
    pub coefficients: Vec<f64>,
}

/// All shells a basis assigns to one element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementBasis {
    pub symbol: String,
    pub atomic_number: u32,
    pub shells: Vec<ShellTemplate>,
}

fn shell_momenta(label: &str) -> Option<Vec<i32>> {
    let momenta = match label.to_ascii_uppercase().as_str() {
        "S" => vec![0],
        "P" => vec![1],
        "D" => vec![2],
        "F" => vec![3],
        "G" => vec![4],
        "SP" | "L" => vec![0, 1],
        _ => return None,
    };
    Some(momenta)
}

fn parse_float(token: &str, line: usize) -> Result<f64, BasisError> {
    token
        .replace(['D', 'd'], "E")
        .parse::<f64>()
        .map_err(|_| BasisError::InvalidNumber {
            token: token.to_string(),
            line,
        })
}

fn lookup_element(symbol: &str) -> Result<Element, BasisError> {
    Element::from_symbol(symbol).ok_or_else(|| BasisError::UnknownElement(symbol.to_string()))
}

impl ElementBasis {
    // Example of nwchem format:
    //
    // BASIS "ao basis" PRINT
    // #BASIS SET: (6s,3p) -> [2s,1p]
    // Li    S
    //      16.1195750              0.15432897
    //       2.9362007              0.53532814
    //       0.7946505              0.44463454
    // Li    SP
    //       0.6362897             -0.09996723             0.15591627
    //       0.1478601              0.39951283             0.60768372
    //       0.0480887              0.70011547             0.39195739
    // END

    /// Parses the basis of a single element from NWChem text.
    pub fn parse_nwchem(input: &str) -> Result<Self, BasisError> {
        let mut symbol: Option<String> = None;
        let mut shells: Vec<ShellTemplate> = Vec::new();
        // index of the first template of the shell block being read
        let mut open_block: Option<(String, usize)> = None;

        for (lineno, raw) in input.lines().enumerate() {
            let line = raw.trim();
            let lineno = lineno + 1;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let upper = line.to_ascii_uppercase();
            if upper.starts_with("BASIS") {
                continue;
            }
            if upper == "END" {
                break;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            let starts_with_letter = tokens[0].chars().all(char::is_alphabetic);
            if starts_with_letter && tokens.len() >= 2 {
                let label = tokens[1];
                let momenta =
                    shell_momenta(label).ok_or_else(|| BasisError::UnknownShell(label.to_string()))?;
                match &symbol {
                    None => symbol = Some(tokens[0].to_string()),
                    Some(first) if !first.eq_ignore_ascii_case(tokens[0]) => {
                        return Err(BasisError::MixedElements {
                            first: first.clone(),
                            second: tokens[0].to_string(),
                        })
                    }
                    Some(_) => {}
                }
                open_block = Some((label.to_string(), shells.len()));
                for l in momenta {
                    shells.push(ShellTemplate {
                        l,
                        exponents: Vec::new(),
                        coefficients: Vec::new(),
                    });
                }
                continue;
            }

            let Some((label, first)) = &open_block else {
                continue;
            };
            let width = shells.len() - first;
            if tokens.len() < width + 1 {
                return Err(BasisError::MissingColumns {
                    label: label.clone(),
                    line: lineno,
                    expected: width + 1,
                    found: tokens.len(),
                });
            }
            let exponent = parse_float(tokens[0], lineno)?;
            for (k, shell) in shells[*first..].iter_mut().enumerate() {
                shell.exponents.push(exponent);
                shell.coefficients.push(parse_float(tokens[k + 1], lineno)?);
            }
        }

        let symbol = symbol.ok_or(BasisError::Empty)?;
        let element = lookup_element(&symbol)?;
        shells.retain(|s| !s.exponents.is_empty());
        if shells.is_empty() {
            return Err(BasisError::Empty);
        }

        Ok(Self {
            symbol: element.get_symbol().to_string(),
            atomic_number: element.get_atomic_number() as u32,
            shells,
        })
    }

    /// Uncontracted even-tempered set: `count` exponents `smallest * ratio^k` for every
    /// angular momentum up to `max_l`.
    pub fn even_tempered(
        symbol: &str,
        max_l: i32,
        smallest: f64,
        ratio: f64,
        count: usize,
    ) -> Result<Self, BasisError> {
        let element = lookup_element(symbol)?;
        let shells = (0..=max_l)
            .flat_map(|l| {
                (0..count).rev().map(move |k| ShellTemplate {
                    l,
                    exponents: vec![smallest * ratio.powi(k as i32)],
                    coefficients: vec![1.0],
                })
            })
            .collect();
        Ok(Self {
            symbol: element.get_symbol().to_string(),
            atomic_number: element.get_atomic_number() as u32,
            shells,
        })
    }

    pub fn nfunction(&self) -> usize {
        self.shells
            .iter()
            .map(|s| ((s.l + 1) * (s.l + 2) / 2) as usize)
            .sum()
    }
}
