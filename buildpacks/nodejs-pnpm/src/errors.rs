use crate::install::InstallPnpmError;
use commons::command::CommandError;
use commons::error::BuildpackErrorMessage;
use commons::nodejs::PackageJsonError;
use commons::version::ResolveError;

#[derive(Debug)]
pub(crate) enum PnpmBuildpackError {
    PackageJson(PackageJsonError),
    UnsupportedArchitecture(String),
    ResolveVersion(ResolveError),
    InstallPnpm(InstallPnpmError),
    PnpmInstall(CommandError),
}

impl BuildpackErrorMessage for PnpmBuildpackError {
    fn header(&self) -> String {
        match self {
            PnpmBuildpackError::PackageJson(_) => "Couldn't read package.json",
            PnpmBuildpackError::UnsupportedArchitecture(_) => "Unsupported architecture",
            PnpmBuildpackError::ResolveVersion(_) => "Couldn't resolve pnpm version",
            PnpmBuildpackError::InstallPnpm(_) => "Couldn't install pnpm",
            PnpmBuildpackError::PnpmInstall(_) => "Failed to install dependencies with pnpm",
        }
        .to_string()
    }

    fn body(&self) -> String {
        match self {
            PnpmBuildpackError::PackageJson(error) => error.to_string(),
            PnpmBuildpackError::UnsupportedArchitecture(arch) => {
                format!("pnpm binaries aren't available for the {arch} architecture.")
            }
            PnpmBuildpackError::ResolveVersion(error) => format!(
                "{error}\n\nCheck the packageManager field and the engines.pnpm range in \
                 package.json."
            ),
            PnpmBuildpackError::InstallPnpm(error) => error.to_string(),
            PnpmBuildpackError::PnpmInstall(error) => format!(
                "{error}\n\nIf pnpm-lock.yaml is out of date, run `pnpm install` locally and \
                 commit the updated lockfile."
            ),
        }
    }
}

impl From<PnpmBuildpackError> for libcnb::Error<PnpmBuildpackError> {
    fn from(error: PnpmBuildpackError) -> Self {
        Self::BuildpackError(error)
    }
}
