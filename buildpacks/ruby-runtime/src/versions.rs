use crate::gemfile_lock::GemfileLock;
use commons::http::{fetch_json, Fetcher};
use commons::runtime::RUNTIME_VERSION_ENV_VAR;
use commons::version::{
    resolve_version, IndexedVersion, LockConflictPolicy, ResolveError, ResolvedVersion, Sourced,
    VersionIndex, VersionRequest,
};

/// Ruby versions available for download, listed as a JSON array of version strings.
///
/// The listing is only fetched when a version has to be looked up, not for versions locked in
/// `Gemfile.lock`.
pub(crate) struct RubyVersionIndex<'a> {
    fetcher: &'a dyn Fetcher,
    url: String,
}

impl<'a> RubyVersionIndex<'a> {
    pub(crate) fn new(fetcher: &'a dyn Fetcher, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }
}

impl VersionIndex for RubyVersionIndex<'_> {
    fn name(&self) -> String {
        self.url.clone()
    }

    fn versions(&self) -> Result<Vec<IndexedVersion>, ResolveError> {
        let versions: Vec<String> = fetch_json(self.fetcher, &self.url)
            .map_err(|error| ResolveError::from_index_fetch(&self.url, error))?;

        versions
            .iter()
            .map(|version| IndexedVersion::parse(version, &self.url))
            .collect()
    }
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum RubyVersionError {
    #[error(
        "Ruby version {locked:?} in Gemfile.lock can't be overriden to {requested:?} using GOOGLE_RUNTIME_VERSION environment variable"
    )]
    LockedVersionOverride { locked: String, requested: String },

    #[error("Runtime version {0} does not exist")]
    UnknownVersion(String),

    #[error(transparent)]
    Resolve(ResolveError),
}

/// Picks the Ruby version to install.
///
/// The version in `Gemfile.lock` wins and can't be overridden with a different
/// `GOOGLE_RUNTIME_VERSION`. Without a locked version the override must name a listed version.
/// Without either the newest listed version is installed.
pub(crate) fn resolve_ruby_version(
    gemfile_lock: Option<&GemfileLock>,
    override_version: Option<String>,
    index: &dyn VersionIndex,
) -> Result<ResolvedVersion, RubyVersionError> {
    let request = VersionRequest {
        override_version: override_version
            .clone()
            .map(|version| Sourced::new(version, RUNTIME_VERSION_ENV_VAR)),
        locked: gemfile_lock
            .and_then(|lock| lock.ruby_version.clone())
            .map(|version| Sourced::new(version, "Gemfile.lock")),
        constraint: None,
    };

    resolve_version(&request, LockConflictPolicy::Reject, index).map_err(|error| match error {
        ResolveError::Conflict {
            locked, requested, ..
        } => RubyVersionError::LockedVersionOverride { locked, requested },
        ResolveError::InvalidConstraint { .. } | ResolveError::NoMatch { .. } => {
            match override_version {
                Some(requested) => RubyVersionError::UnknownVersion(requested),
                None => RubyVersionError::Resolve(error),
            }
        }
        error => RubyVersionError::Resolve(error),
    })
}
