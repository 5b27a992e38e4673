//! Data collectors.
//!
//! Each collector queries one source (the database session, the host or the
//! local file system) and shapes the result into the structs in
//! `crate::models` or its own module.

pub mod pg_logs;
pub mod server_info;
pub mod sql_files;
pub mod system;

use thiserror::Error;

use crate::db::DbError;
use crate::secrets::SecretError;

/// Errors raised by the database-backed collectors.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("failed to get DB config from secret store: {0}")]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("failed to list log files: {0}")]
    ListLogs(#[source] DbError),
}
