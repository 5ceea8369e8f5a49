use crate::versions::RubyVersionError;
use commons::error::BuildpackErrorMessage;
use commons::tar::ExtractError;
use std::io;

#[derive(Debug)]
pub(crate) enum RubyRuntimeBuildpackError {
    DetectRubyApp(io::Error),
    ReadGemfileLock(io::Error),
    ResolveVersion(RubyVersionError),
    InstallRuby(ExtractError),
}

impl BuildpackErrorMessage for RubyRuntimeBuildpackError {
    fn header(&self) -> String {
        match self {
            RubyRuntimeBuildpackError::DetectRubyApp(_) => "Couldn't inspect application files",
            RubyRuntimeBuildpackError::ReadGemfileLock(_) => "Couldn't read Gemfile.lock",
            RubyRuntimeBuildpackError::ResolveVersion(_) => "Invalid Ruby version",
            RubyRuntimeBuildpackError::InstallRuby(_) => "Couldn't install Ruby",
        }
        .to_string()
    }

    fn body(&self) -> String {
        match self {
            RubyRuntimeBuildpackError::DetectRubyApp(error)
            | RubyRuntimeBuildpackError::ReadGemfileLock(error) => error.to_string(),
            RubyRuntimeBuildpackError::ResolveVersion(error) => error.to_string(),
            RubyRuntimeBuildpackError::InstallRuby(error) => error.to_string(),
        }
    }
}

impl From<RubyRuntimeBuildpackError> for libcnb::Error<RubyRuntimeBuildpackError> {
    fn from(error: RubyRuntimeBuildpackError) -> Self {
        Self::BuildpackError(error)
    }
}
