use basis::BasisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JkError {
    #[error("invalid composite J algorithm '{0}' (supported: DFDIRJ)")]
    InvalidJAlgorithm(String),

    #[error("invalid composite K algorithm '{0}' (supported: LINK, COSX)")]
    InvalidKAlgorithm(String),

    #[error("invalid input for option {name}: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    #[error(
        "K build requested but no composite K algorithm was given; set scf_type to {j_algorithm}+{{K_ALGO}}"
    )]
    MissingKAlgorithm { j_algorithm: String },

    #[error("non-symmetric K matrix builds are not supported by the {0} algorithm")]
    AsymmetricExchange(&'static str),

    #[error("the {0} matrix is singular")]
    SingularMatrix(&'static str),

    #[error("density matrix {index} is {rows}x{cols}, expected {nbf}x{nbf}")]
    DensityShape {
        index: usize,
        rows: usize,
        cols: usize,
        nbf: usize,
    },

    #[error("no density matrices supplied")]
    NoDensity,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Basis(#[from] BasisError),
}

pub type Result<T> = std::result::Result<T, JkError>;
