//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::exitcode;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("{0}")]
    Usage(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => exitcode::USAGE,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => exitcode::IOERR,
                InfraError::Http { .. } => exitcode::SOFTWARE,
                InfraError::Application(app) => application_exit_code(app),
            },
        }
    }
}

fn application_exit_code(e: &ApplicationError) -> i32 {
    match e {
        ApplicationError::Load { .. } => exitcode::NOINPUT,
        ApplicationError::Malformed { .. } | ApplicationError::Domain(_) => exitcode::DATAERR,
        ApplicationError::Permission(_) => exitcode::NOPERM,
        ApplicationError::Backup { .. } => exitcode::CANTCREAT,
        ApplicationError::Write { .. } => exitcode::IOERR,
        ApplicationError::Cancelled => exitcode::INTERRUPTED,
        ApplicationError::Config { .. } => exitcode::CONFIG,
        ApplicationError::OperationFailed { .. } => exitcode::SOFTWARE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn given_application_errors_when_mapping_then_distinct_sysexits() {
        let permission: CliError = ApplicationError::Permission(PathBuf::from("/x")).into();
        let cancelled: CliError = ApplicationError::Cancelled.into();
        let config: CliError = ApplicationError::config("bad").into();

        assert_eq!(permission.exit_code(), exitcode::NOPERM);
        assert_eq!(cancelled.exit_code(), exitcode::INTERRUPTED);
        assert_eq!(config.exit_code(), exitcode::CONFIG);
        assert_eq!(CliError::Usage("x".into()).exit_code(), exitcode::USAGE);
    }
}
