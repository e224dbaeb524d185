//! CLI command implementations

pub mod retry;
pub mod revert;

use crate::error::CliResult;
use crate::output::print_error;
use revert_engine::{read_log, LogFile, RevertError};
use std::path::Path;

/// Read a log, reporting a missing file to the user instead of failing
pub(crate) async fn load_log(path: &Path) -> CliResult<Option<LogFile>> {
    match read_log(path).await {
        Ok(log) => Ok(Some(log)),
        Err(RevertError::LogNotFound(path)) => {
            print_error(&format!("Log file {} does not exist", path.display()));
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
