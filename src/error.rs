use std::fmt::{self, Debug, Display};
use std::io;

/// Provides `Covid19GymError` and maps other errors to
/// convert to a `Covid19GymError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum Covid19GymError {
    /// The parameter set failed validation. Fatal, raised at construction.
    InvalidConfiguration(String),
    /// `step()` was called before the first `reset()`.
    NotInitialized,
    /// `step()` was called after the episode terminated.
    EpisodeDone,
    /// The action was not a finite number.
    InvalidAction(f64),
    /// A Poisson draw was asked for a negative, non-finite or out-of-range mean.
    /// `GymConfig::validate` rules this out.
    Sampling(String),
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
}

impl From<io::Error> for Covid19GymError {
    fn from(error: io::Error) -> Self {
        Covid19GymError::IoError(error)
    }
}

impl From<serde_json::Error> for Covid19GymError {
    fn from(error: serde_json::Error) -> Self {
        Covid19GymError::JsonError(error)
    }
}

impl From<csv::Error> for Covid19GymError {
    fn from(error: csv::Error) -> Self {
        Covid19GymError::CsvError(error)
    }
}

impl From<crate::parameters::GymConfigBuilderError> for Covid19GymError {
    fn from(error: crate::parameters::GymConfigBuilderError) -> Self {
        Covid19GymError::InvalidConfiguration(error.to_string())
    }
}

impl std::error::Error for Covid19GymError {}

impl Display for Covid19GymError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Covid19GymError::InvalidConfiguration(msg) => {
                write!(f, "invalid configuration: {msg}")
            }
            Covid19GymError::NotInitialized => {
                write!(f, "environment not initialized: call reset() before step()")
            }
            Covid19GymError::EpisodeDone => {
                write!(f, "episode is done: call reset() before step()")
            }
            Covid19GymError::InvalidAction(action) => {
                write!(f, "invalid action {action}: isolation intensity must be finite")
            }
            Covid19GymError::Sampling(msg) => write!(f, "sampling error: {msg}"),
            Covid19GymError::IoError(e) => write!(f, "Error: {e:?}"),
            Covid19GymError::JsonError(e) => write!(f, "Error: {e:?}"),
            Covid19GymError::CsvError(e) => write!(f, "Error: {e:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failure() {
        let err = Covid19GymError::InvalidConfiguration("population must be positive".into());
        assert_eq!(
            err.to_string(),
            "invalid configuration: population must be positive"
        );
        assert!(Covid19GymError::NotInitialized
            .to_string()
            .contains("reset()"));
        assert!(Covid19GymError::InvalidAction(f64::NAN)
            .to_string()
            .contains("NaN"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: Covid19GymError = io_err.into();
        assert!(matches!(err, Covid19GymError::IoError(_)));
    }
}
