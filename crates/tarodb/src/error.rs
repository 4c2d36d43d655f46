//! Error types for the address book database.

use sqlx::error::ErrorKind;
use taro_address::AddrError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Address book database error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Uniqueness, foreign key, not-null or check constraint violated.
    #[error("Database constraint violated: {0}")]
    Constraint(String),

    /// Stored bytes did not decode to the expected type.
    #[error("Unable to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: BoxError,
    },

    /// A related record required by the operation does not exist.
    #[error("Missing {what}")]
    MissingDependency { what: &'static str },

    #[error("Root key not found")]
    RootKeyNotFound,

    #[error(transparent)]
    Addr(#[from] AddrError),

    /// Failure of one step of a multi-step operation.
    #[error("{step}: {source}")]
    Context {
        step: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for address book database operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let violated = matches!(
                db_err.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            ) || db_err.message().contains("constraint failed");

            if violated {
                return Self::Constraint(db_err.message().to_string());
            }
        }

        Self::Database(err)
    }
}

impl Error {
    pub(crate) fn decode(what: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Decode {
            what,
            source: source.into(),
        }
    }

    /// Returns the innermost error, skipping step context.
    pub fn root(&self) -> &Error {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self.root(), Self::Constraint(_))
    }

    /// Whether the error means the requested address is unknown.
    pub fn is_no_addr(&self) -> bool {
        matches!(self.root(), Self::Addr(AddrError::NoAddr))
    }
}

/// Attaches the name of the failing step to an error.
pub(crate) trait ResultExt<T> {
    fn context(self, step: &'static str) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, step: &'static str) -> Result<T> {
        self.map_err(|err| {
            let err = err.into();
            match err {
                // The domain signal passes through untouched so callers can match on it.
                Error::Addr(AddrError::NoAddr) => err,
                err => Error::Context {
                    step,
                    source: Box::new(err),
                },
            }
        })
    }
}
