use crate::measurement::SensorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Covariance is not positive definite")]
    NotPositiveDefinite,

    #[error("Singular innovation covariance in {sensor} update")]
    SingularInnovation { sensor: SensorKind },

    #[error("Parse error at line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
