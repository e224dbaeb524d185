//! Environment resolution
//!
//! Logs record environment *names*; publish details record environment
//! *uids*. The resolver asks the environment directory once per run and keeps
//! only the environments that still exist.

use crate::error::{Result, RevertError};
use crate::model::ResolvedEnvironment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Boxed error returned by directory implementations
pub type DirectoryError = Box<dyn std::error::Error + Send + Sync>;

/// An environment as listed by the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub name: String,
    pub uid: String,
}

/// Authoritative list of environments of a stack
#[async_trait]
pub trait EnvironmentDirectory: Send + Sync {
    /// List every environment currently defined
    async fn list_environments(&self) -> std::result::Result<Vec<EnvironmentRecord>, DirectoryError>;
}

/// Fixed directory, used for dry runs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    environments: Vec<EnvironmentRecord>,
}

impl StaticDirectory {
    pub fn new(environments: Vec<EnvironmentRecord>) -> Self {
        Self { environments }
    }

    /// Build from `(name, uid)` pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, uid)| EnvironmentRecord {
                    name: name.to_string(),
                    uid: uid.to_string(),
                })
                .collect(),
        )
    }
}

#[async_trait]
impl EnvironmentDirectory for StaticDirectory {
    async fn list_environments(&self) -> std::result::Result<Vec<EnvironmentRecord>, DirectoryError> {
        Ok(self.environments.clone())
    }
}

/// Resolve environment names against the directory
///
/// Names that no longer exist are dropped silently. The result keeps the
/// directory's order. Any directory failure aborts the resolution.
#[instrument(skip(directory), fields(requested = names.len()))]
pub async fn resolve_environments(
    directory: &dyn EnvironmentDirectory,
    names: &[String],
) -> Result<Vec<ResolvedEnvironment>> {
    let listed = directory
        .list_environments()
        .await
        .map_err(|e| RevertError::EnvironmentLookup(e.to_string()))?;

    let resolved: Vec<ResolvedEnvironment> = listed
        .into_iter()
        .filter(|env| names.iter().any(|name| name == &env.name))
        .map(|EnvironmentRecord { name, uid }| ResolvedEnvironment { name, uid })
        .collect();

    for name in names {
        if !resolved.iter().any(|env| &env.name == name) {
            debug!(environment = %name, "Environment no longer exists, skipping");
        }
    }

    Ok(resolved)
}
