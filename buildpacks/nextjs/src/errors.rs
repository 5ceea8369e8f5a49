use commons::command::CommandError;
use commons::error::BuildpackErrorMessage;
use commons::nodejs::{LockfileError, PackageJsonError};

#[derive(Debug)]
pub(crate) enum NextJsBuildpackError {
    PackageJson(PackageJsonError),
    NextJsVersion(LockfileError),
    AdapterVersion(String),
    InstallAdapter(CommandError),
}

impl BuildpackErrorMessage for NextJsBuildpackError {
    fn header(&self) -> String {
        match self {
            NextJsBuildpackError::PackageJson(_) => "Couldn't read package.json",
            NextJsBuildpackError::NextJsVersion(_) => "Couldn't determine Next.js version",
            NextJsBuildpackError::AdapterVersion(_) => "Unsupported Next.js version",
            NextJsBuildpackError::InstallAdapter(_) => "Couldn't install Next.js build adapter",
        }
        .to_string()
    }

    fn body(&self) -> String {
        match self {
            NextJsBuildpackError::PackageJson(error) => error.to_string(),
            NextJsBuildpackError::NextJsVersion(error) => format!(
                "{error}\n\nThe installed Next.js version is read from the lockfile. Commit the \
                 lockfile of your package manager together with package.json."
            ),
            NextJsBuildpackError::AdapterVersion(reason) => reason.clone(),
            NextJsBuildpackError::InstallAdapter(error) => error.to_string(),
        }
    }
}

impl From<NextJsBuildpackError> for libcnb::Error<NextJsBuildpackError> {
    fn from(error: NextJsBuildpackError) -> Self {
        Self::BuildpackError(error)
    }
}
