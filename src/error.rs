use std::fmt;

/// Errors surfaced by matrix algebra and parameter flattening.
///
/// All failures are local and synchronous: the operation that detects the
/// problem returns it immediately, nothing is retried or partially applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Two matrices with incompatible shapes were combined in a
    /// non-broadcasting operation.
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// `set_parameters` received a vector whose length disagrees with the
    /// network's flattened parameter count.
    ParameterCountMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "dimension mismatch: expected {}x{}, got {}x{}",
                    expected.0, expected.1, actual.0, actual.1
                )
            }
            Error::ParameterCountMismatch { expected, actual } => {
                write!(
                    f,
                    "parameter count mismatch: expected {expected}, got {actual}"
                )
            }
        }
    }
}

impl std::error::Error for Error {}
