use thiserror::Error;

use crate::db::DbError;
use crate::fetcher::FetchError;

/// Every way a command can fail. The router hands these back unchanged.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("{0}")]
    Argument(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("there are no feeds to aggregate")]
    NoFeeds,
    #[error("not logged in: {0}")]
    Unauthenticated(String),
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<DbError> for CommandError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(_) => CommandError::NotFound(err.to_string()),
            DbError::Duplicate(_) => CommandError::Duplicate(err.to_string()),
            DbError::Sqlx(e) => CommandError::Database(e),
        }
    }
}

pub type CommandResult<T = ()> = Result<T, CommandError>;
