use commons::command::{CommandError, CommandRunner};
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io;
use std::process::Command;

/// Variables with this prefix hold a Secret Manager reference instead of a value. The secret's
/// value is exposed under the name without the prefix.
pub(crate) const SECRET_PREFIX: &str = "SECRET_";

const LATEST_VERSION: &str = "latest";

/// A Secret Manager secret version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SecretReference {
    pub(crate) project: String,
    pub(crate) secret: String,
    pub(crate) version: String,
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum SecretError {
    #[error("{value:?} is not a valid secret reference: {reason}")]
    InvalidReference { value: String, reason: String },

    #[error("Couldn't access {reference}: {source}")]
    Access {
        reference: String,
        #[source]
        source: CommandError,
    },

    #[error("Couldn't read the value of {reference}: {source}")]
    Payload {
        reference: String,
        #[source]
        source: io::Error,
    },
}

impl SecretReference {
    /// Parses `projects/<project>/secrets/<secret>[/versions/<version>]`, `<secret>@<version>`
    /// or `<secret>`. The short forms are resolved in `default_project`, a missing version
    /// means the latest one.
    pub(crate) fn parse(value: &str, default_project: Option<&str>) -> Result<Self, SecretError> {
        let value = value.trim();
        let invalid = |reason: &str| SecretError::InvalidReference {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        if let Some(path) = value.strip_prefix("projects/") {
            let (project, secret, version) = match path.split('/').collect::<Vec<_>>().as_slice() {
                [project, "secrets", secret] => (*project, *secret, LATEST_VERSION),
                [project, "secrets", secret, "versions", version] => (*project, *secret, *version),
                _ => {
                    return Err(invalid(
                        "expected projects/<project>/secrets/<secret>/versions/<version>",
                    ))
                }
            };
            return Self::new(project, secret, version).ok_or_else(|| invalid("empty path segment"));
        }

        let project = default_project
            .map(str::trim)
            .filter(|project| !project.is_empty())
            .ok_or_else(|| invalid("no project ID to look it up in, set GOOGLE_CLOUD_PROJECT"))?;
        let (secret, version) = value.split_once('@').unwrap_or((value, LATEST_VERSION));
        if secret.contains('/') {
            return Err(invalid("secret IDs can't contain '/'"));
        }

        Self::new(project, secret, version).ok_or_else(|| invalid("empty secret ID or version"))
    }

    fn new(project: &str, secret: &str, version: &str) -> Option<Self> {
        [project, secret, version]
            .iter()
            .all(|part| !part.is_empty())
            .then(|| Self {
                project: project.to_string(),
                secret: secret.to_string(),
                version: version.to_string(),
            })
    }
}

impl Display for SecretReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/secrets/{}/versions/{}",
            self.project, self.secret, self.version
        )
    }
}

/// Reads the value of a secret version.
pub(crate) trait SecretAccessor {
    fn access(&self, reference: &SecretReference) -> Result<String, SecretError>;
}

/// [`SecretAccessor`] using the `gcloud` CLI and the credentials it is configured with.
///
/// The value is written to a temporary file rather than stdout, which ends up in the build log.
pub(crate) struct GcloudSecretAccessor<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> GcloudSecretAccessor<'a> {
    pub(crate) fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }
}

impl SecretAccessor for GcloudSecretAccessor<'_> {
    fn access(&self, reference: &SecretReference) -> Result<String, SecretError> {
        let payload_error = |source| SecretError::Payload {
            reference: reference.to_string(),
            source,
        };
        let out_file = tempfile::NamedTempFile::new().map_err(payload_error)?;

        self.runner
            .run(
                Command::new("gcloud")
                    .args(["secrets", "versions", "access", &reference.version])
                    .arg(format!("--secret={}", reference.secret))
                    .arg(format!("--project={}", reference.project))
                    .arg("--out-file")
                    .arg(out_file.path()),
            )
            .map_err(|source| SecretError::Access {
                reference: reference.to_string(),
                source,
            })?;

        fs::read_to_string(out_file.path()).map_err(payload_error)
    }
}
