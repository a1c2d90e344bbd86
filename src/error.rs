use thiserror::Error;

/// Precondition failures raised by the lattice and the driver.
///
/// Both variants are raised before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LatticeError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, LatticeError>;
