//! Environment variables users set to steer runtime buildpacks.

use libcnb::Env;

/// Forces a single language runtime, e.g. `GOOGLE_RUNTIME=ruby`, regardless of which files the
/// app contains.
pub const RUNTIME_ENV_VAR: &str = "GOOGLE_RUNTIME";

/// Overrides the runtime version that would otherwise be picked from the app's files.
pub const RUNTIME_VERSION_ENV_VAR: &str = "GOOGLE_RUNTIME_VERSION";

/// Command for the `web` process, taking precedence over a `Procfile`.
pub const ENTRYPOINT_ENV_VAR: &str = "GOOGLE_ENTRYPOINT";

/// How `GOOGLE_RUNTIME` affects a runtime buildpack's detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeSelection {
    /// `GOOGLE_RUNTIME` is not set, detection is up to the app's files.
    Unspecified,
    /// `GOOGLE_RUNTIME` names this runtime.
    Selected,
    /// `GOOGLE_RUNTIME` names a different runtime.
    Excluded,
}

impl RuntimeSelection {
    pub fn from_env(env: &Env, runtime: &str) -> Self {
        match non_empty_var(env, RUNTIME_ENV_VAR) {
            None => RuntimeSelection::Unspecified,
            Some(selected) if selected.eq_ignore_ascii_case(runtime) => RuntimeSelection::Selected,
            Some(_) => RuntimeSelection::Excluded,
        }
    }

    /// Combines the selection with the result of the buildpack's own file checks.
    ///
    /// `files_present` is only evaluated when no runtime was selected explicitly.
    pub fn participates(self, files_present: impl FnOnce() -> bool) -> bool {
        match self {
            RuntimeSelection::Selected => true,
            RuntimeSelection::Excluded => false,
            RuntimeSelection::Unspecified => files_present(),
        }
    }
}

/// The trimmed value of `GOOGLE_RUNTIME_VERSION`, if set and non-empty.
pub fn runtime_version_override(env: &Env) -> Option<String> {
    non_empty_var(env, RUNTIME_VERSION_ENV_VAR)
}

/// The trimmed value of `GOOGLE_ENTRYPOINT`, if set and non-empty.
pub fn entrypoint_override(env: &Env) -> Option<String> {
    non_empty_var(env, ENTRYPOINT_ENV_VAR)
}

fn non_empty_var(env: &Env, key: &str) -> Option<String> {
    env.get_string_lossy(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
