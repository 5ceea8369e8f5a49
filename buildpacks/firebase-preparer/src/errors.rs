use crate::preparer::PrepareError;
use commons::error::BuildpackErrorMessage;

#[derive(Debug)]
pub(crate) enum FirebasePreparerBuildpackError {
    Prepare(PrepareError),
}

impl BuildpackErrorMessage for FirebasePreparerBuildpackError {
    fn header(&self) -> String {
        match self {
            FirebasePreparerBuildpackError::Prepare(PrepareError::EnvFile(_)) => {
                "Invalid apphosting.env"
            }
            FirebasePreparerBuildpackError::Prepare(PrepareError::Secret { .. }) => {
                "Couldn't resolve secret"
            }
        }
        .to_string()
    }

    fn body(&self) -> String {
        match self {
            FirebasePreparerBuildpackError::Prepare(error @ PrepareError::EnvFile(_)) => {
                error.to_string()
            }
            FirebasePreparerBuildpackError::Prepare(error @ PrepareError::Secret { .. }) => {
                format!(
                    "{error}\n\nVariables prefixed with SECRET_ reference a Secret Manager secret \
                     as <secret>@<version>, <secret> or \
                     projects/<project>/secrets/<secret>/versions/<version>."
                )
            }
        }
    }
}

impl From<FirebasePreparerBuildpackError> for libcnb::Error<FirebasePreparerBuildpackError> {
    fn from(error: FirebasePreparerBuildpackError) -> Self {
        Self::BuildpackError(error)
    }
}
