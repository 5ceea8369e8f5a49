use commons::error::BuildpackErrorMessage;
use commons::nodejs::PackageJsonError;
use commons::tar::ExtractError;
use commons::version::ResolveError;

#[derive(Debug)]
pub(crate) enum NodeJsRuntimeBuildpackError {
    PackageJson(PackageJsonError),
    UnsupportedArchitecture(String),
    ResolveVersion(ResolveError),
    InstallNode(ExtractError),
}

impl BuildpackErrorMessage for NodeJsRuntimeBuildpackError {
    fn header(&self) -> String {
        match self {
            NodeJsRuntimeBuildpackError::PackageJson(_) => "Couldn't read package.json",
            NodeJsRuntimeBuildpackError::UnsupportedArchitecture(_) => "Unsupported architecture",
            NodeJsRuntimeBuildpackError::ResolveVersion(_) => "Couldn't resolve Node.js version",
            NodeJsRuntimeBuildpackError::InstallNode(_) => "Couldn't install Node.js",
        }
        .to_string()
    }

    fn body(&self) -> String {
        match self {
            NodeJsRuntimeBuildpackError::PackageJson(error) => error.to_string(),
            NodeJsRuntimeBuildpackError::UnsupportedArchitecture(arch) => {
                format!("Node.js binaries aren't available for the {arch} architecture.")
            }
            NodeJsRuntimeBuildpackError::ResolveVersion(error) => format!(
                "{error}\n\nCheck the engines.node range in package.json or the value of \
                 GOOGLE_RUNTIME_VERSION against the releases listed at https://nodejs.org/dist/."
            ),
            NodeJsRuntimeBuildpackError::InstallNode(error) => error.to_string(),
        }
    }
}

impl From<NodeJsRuntimeBuildpackError> for libcnb::Error<NodeJsRuntimeBuildpackError> {
    fn from(error: NodeJsRuntimeBuildpackError) -> Self {
        Self::BuildpackError(error)
    }
}
