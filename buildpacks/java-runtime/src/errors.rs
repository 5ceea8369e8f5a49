use commons::error::BuildpackErrorMessage;
use commons::tar::ExtractError;
use commons::version::ResolveError;
use std::io;

#[derive(Debug)]
pub(crate) enum JavaRuntimeBuildpackError {
    DetectJavaApp(io::Error),
    UnsupportedArchitecture(String),
    ResolveRelease(ResolveError),
    InstallJdk(ExtractError),
}

impl BuildpackErrorMessage for JavaRuntimeBuildpackError {
    fn header(&self) -> String {
        match self {
            JavaRuntimeBuildpackError::DetectJavaApp(_) => "Couldn't inspect application files",
            JavaRuntimeBuildpackError::UnsupportedArchitecture(_) => "Unsupported architecture",
            JavaRuntimeBuildpackError::ResolveRelease(_) => "Couldn't find a matching JDK release",
            JavaRuntimeBuildpackError::InstallJdk(_) => "Couldn't install the JDK",
        }
        .to_string()
    }

    fn body(&self) -> String {
        match self {
            JavaRuntimeBuildpackError::DetectJavaApp(error) => error.to_string(),
            JavaRuntimeBuildpackError::UnsupportedArchitecture(arch) => {
                format!("JDK binaries aren't available for the {arch} architecture.")
            }
            JavaRuntimeBuildpackError::ResolveRelease(error) => format!(
                "{error}\n\nSet GOOGLE_RUNTIME_VERSION to a Java feature version, for example 17."
            ),
            JavaRuntimeBuildpackError::InstallJdk(error) => error.to_string(),
        }
    }
}

impl From<JavaRuntimeBuildpackError> for libcnb::Error<JavaRuntimeBuildpackError> {
    fn from(error: JavaRuntimeBuildpackError) -> Self {
        Self::BuildpackError(error)
    }
}
