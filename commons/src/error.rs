use crate::log::log_error;
use std::fmt::Debug;

/// A buildpack error that knows how to present itself in the build log.
///
/// The header is a short summary, the body explains what happened and, where possible, what the
/// user can change about their app to fix it.
pub trait BuildpackErrorMessage {
    fn header(&self) -> String;
    fn body(&self) -> String;
}

/// Handles a [`libcnb::Error`] in a consistent style.
///
/// Intended to be called from [`libcnb::Buildpack::on_error`]. Buildpack specific errors are
/// printed using their [`BuildpackErrorMessage`] implementation, framework errors are printed as
/// internal errors.
///
/// # Example:
/// ```
/// use commons::error::{on_error, BuildpackErrorMessage};
///
/// #[derive(Debug)]
/// enum FooBuildpackError {
///     MissingFooToml,
/// }
///
/// impl BuildpackErrorMessage for FooBuildpackError {
///     fn header(&self) -> String {
///         String::from("Missing foo.toml")
///     }
///
///     fn body(&self) -> String {
///         String::from("Add a foo.toml to the root of your app.")
///     }
/// }
///
/// on_error(libcnb::Error::BuildpackError(FooBuildpackError::MissingFooToml));
/// ```
pub fn on_error<E>(error: libcnb::Error<E>)
where
    E: BuildpackErrorMessage + Debug,
{
    match error {
        libcnb::Error::BuildpackError(buildpack_error) => {
            log_error(buildpack_error.header(), buildpack_error.body());
        }
        framework_error => {
            log_error("Internal buildpack error", framework_error.to_string());
        }
    }
}
