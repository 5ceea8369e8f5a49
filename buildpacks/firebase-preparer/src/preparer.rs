use crate::env_file::{self, EnvFileError, EnvVars};
use crate::secrets::{SecretAccessor, SecretError, SecretReference, SECRET_PREFIX};
use std::path::Path;

/// The variables of an `apphosting.env` file in two forms.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct PreparedEnv {
    /// Secret variables keep their name and point at a fully qualified secret version.
    pub(crate) referenced: EnvVars,
    /// Secret variables lose their prefix and hold the secret's value.
    pub(crate) dereferenced: EnvVars,
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum PrepareError {
    #[error(transparent)]
    EnvFile(#[from] EnvFileError),

    #[error("{key}: {source}")]
    Secret {
        key: String,
        #[source]
        source: SecretError,
    },
}

/// Reads `app_hosting_env`, resolves its secret references and writes both forms of the result
/// to the given output files. A missing `app_hosting_env` yields empty outputs.
pub(crate) fn prepare(
    app_hosting_env: &Path,
    project_id: Option<&str>,
    referenced_output: &Path,
    dereferenced_output: &Path,
    accessor: &dyn SecretAccessor,
) -> Result<PreparedEnv, PrepareError> {
    let prepared = dereference(env_file::read(app_hosting_env)?, project_id, accessor)?;

    env_file::write(referenced_output, &prepared.referenced)?;
    env_file::write(dereferenced_output, &prepared.dereferenced)?;

    Ok(prepared)
}

fn dereference(
    vars: EnvVars,
    project_id: Option<&str>,
    accessor: &dyn SecretAccessor,
) -> Result<PreparedEnv, PrepareError> {
    let mut prepared = PreparedEnv::default();

    for (key, value) in vars {
        let secret_name = key
            .strip_prefix(SECRET_PREFIX)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        match secret_name {
            Some(name) => {
                let secret_error = |source| PrepareError::Secret {
                    key: key.clone(),
                    source,
                };
                let reference =
                    SecretReference::parse(&value, project_id).map_err(secret_error)?;
                let secret_value = accessor.access(&reference).map_err(secret_error)?;

                prepared.dereferenced.insert(name, secret_value);
                prepared.referenced.insert(key, reference.to_string());
            }
            None => {
                prepared.dereferenced.insert(key.clone(), value.clone());
                prepared.referenced.insert(key, value);
            }
        }
    }

    Ok(prepared)
}
