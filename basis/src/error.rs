use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BasisError {
    #[error("unknown shell label '{0}'")]
    UnknownShell(String),

    #[error("unknown element symbol '{0}'")]
    UnknownElement(String),

    #[error("basis text mixes elements {first} and {second}")]
    MixedElements { first: String, second: String },

    #[error("cannot parse '{token}' as a number on line {line}")]
    InvalidNumber { token: String, line: usize },

    #[error("line {line}: expected {expected} columns for a {label} shell, found {found}")]
    MissingColumns {
        label: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("no shells found in basis text")]
    Empty,

    #[error("no basis supplied for atom {index} ({symbol})")]
    MissingAtomBasis { index: usize, symbol: String },
}
