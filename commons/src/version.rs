//! Version constraints and version resolution.
//!
//! Constraints use npm range syntax, which is what `package.json` files contain and a superset of
//! what users put into `GOOGLE_RUNTIME_VERSION`. They are translated into [`semver::VersionReq`]s,
//! one per `||` alternative.

use crate::http::HttpError;
use semver::{Version, VersionReq};
use std::fmt::{self, Display, Formatter};

/// A value together with a human readable description of where it came from, for example
/// `GOOGLE_RUNTIME_VERSION` or `package.json (engines.node)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    pub value: T,
    pub origin: String,
}

impl<T> Sourced<T> {
    pub fn new(value: T, origin: impl Into<String>) -> Self {
        Self {
            value,
            origin: origin.into(),
        }
    }
}

/// The single concrete version picked for a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version: String,
    /// Where the version (or the constraint it satisfies) came from.
    pub origin: String,
}

impl Display for ResolvedVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} (from {})", self.version, self.origin)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("{origin} is malformed: {detail}")]
    MalformedInput { origin: String, detail: String },

    #[error("{origin} doesn't exist")]
    SourceUnavailable { origin: String },

    #[error("{index} doesn't list any versions")]
    NoCandidates { index: String },

    #[error("No version listed in {index} satisfies {constraint:?} from {origin}")]
    NoMatch {
        index: String,
        origin: String,
        constraint: String,
    },

    #[error("Invalid version constraint {value:?} in {origin}: {reason}")]
    InvalidConstraint {
        origin: String,
        value: String,
        reason: String,
    },

    #[error(
        "Version {locked:?} in {locked_origin} conflicts with version {requested:?} requested by {requested_origin}"
    )]
    Conflict {
        locked: String,
        locked_origin: String,
        requested: String,
        requested_origin: String,
    },

    #[error("Couldn't fetch {index}: {error}")]
    IndexUnavailable {
        index: String,
        #[source]
        error: HttpError,
    },
}

impl ResolveError {
    /// Maps an error that occurred while fetching a version index. Payloads that aren't valid
    /// JSON are malformed input, everything else means the index is unavailable.
    pub fn from_index_fetch(index: impl Into<String>, error: HttpError) -> Self {
        match error {
            HttpError::Json { source, .. } => ResolveError::MalformedInput {
                origin: index.into(),
                detail: source.to_string(),
            },
            error => ResolveError::IndexUnavailable {
                index: index.into(),
                error,
            },
        }
    }
}

/// A parsed npm style version range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    raw: String,
    // Empty means any version is acceptable.
    alternatives: Vec<VersionReq>,
}

impl VersionConstraint {
    /// A constraint that accepts any stable version.
    pub fn any() -> Self {
        Self {
            raw: String::from("latest"),
            alternatives: Vec::new(),
        }
    }

    /// Parses an npm style range such as `^13.1.0`, `8.x.x`, `>=18 <20`, `1.2.3 - 2.3.4`,
    /// `^16 || ^18` or an exact version. Empty input, `*` and `latest` accept any version.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut alternatives = Vec::new();

        for alternative in raw.split("||").map(str::trim) {
            match translate_alternative(alternative)? {
                Some(requirement) => alternatives.push(requirement),
                None => {
                    return Ok(Self {
                        raw: raw.trim().to_string(),
                        alternatives: Vec::new(),
                    })
                }
            }
        }

        Ok(Self {
            raw: raw.trim().to_string(),
            alternatives,
        })
    }

    /// Whether this constraint accepts any version, i.e. asks for the latest one.
    pub fn is_any(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// Whether the given version satisfies the constraint.
    ///
    /// Pre-release versions only match alternatives that explicitly name a pre-release of the
    /// same `major.minor.patch`; an unrestricted constraint never matches them.
    pub fn matches(&self, version: &Version) -> bool {
        if self.is_any() {
            version.pre.is_empty()
        } else {
            self.alternatives
                .iter()
                .any(|requirement| requirement.matches(version))
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl Display for VersionConstraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// Returns `None` when the alternative accepts any version.
fn translate_alternative(alternative: &str) -> Result<Option<VersionReq>, String> {
    if matches!(alternative, "" | "*" | "x" | "X" | "latest") {
        return Ok(None);
    }

    let comparators = if let Some((lower, upper)) = alternative.split_once(" - ") {
        vec![
            translate_comparator(">=", lower.trim())?,
            translate_comparator("<=", upper.trim())?,
        ]
    } else {
        let mut comparators = Vec::new();
        let mut pending_operator: Option<&str> = None;

        for token in alternative.split_whitespace() {
            let split_at = token
                .find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^'))
                .unwrap_or(token.len());
            let (operator, version) = token.split_at(split_at);

            if version.is_empty() {
                pending_operator = Some(operator);
                continue;
            }

            let operator = pending_operator.take().unwrap_or(operator);
            comparators.push(translate_comparator(operator, version)?);
        }

        if let Some(operator) = pending_operator {
            return Err(format!("operator {operator:?} is missing a version"));
        }

        comparators
    };

    let comparators = comparators.into_iter().flatten().collect::<Vec<_>>();
    if comparators.is_empty() {
        return Ok(None);
    }

    VersionReq::parse(&comparators.join(", "))
        .map(Some)
        .map_err(|error| error.to_string())
}

// Returns `None` for comparators that don't restrict anything, such as `*` or `>=x`.
fn translate_comparator(operator: &str, version: &str) -> Result<Option<String>, String> {
    let version = version.trim_start_matches(['v', 'V']);
    let version = version.split_once('+').map_or(version, |(version, _)| version);

    let (numbers, pre_release) = match version.split_once('-') {
        Some((numbers, pre_release)) => (numbers, Some(pre_release)),
        None => (version, None),
    };

    let mut parts = Vec::new();
    for part in numbers.split('.') {
        if matches!(part, "x" | "X" | "*") {
            break;
        }
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("{version:?} is not a version"));
        }
        parts.push(part);
    }

    if parts.len() > 3 {
        return Err(format!("{version:?} has too many components"));
    }

    let operator = match operator {
        "" | "=" | "==" => match parts.len() {
            0 => return Ok(None),
            1 => "^",
            2 => "~",
            _ => "=",
        },
        ">" | ">=" | "<" | "<=" | "~" | "^" => operator,
        operator => return Err(format!("unsupported operator {operator:?}")),
    };

    if parts.is_empty() {
        return match operator {
            ">=" | "^" | "~" => Ok(None),
            _ => Err(format!("{operator}{version} can never be satisfied")),
        };
    }

    let pre_release = match pre_release {
        Some(pre_release) if parts.len() == 3 => format!("-{pre_release}"),
        Some(_) => return Err(format!("{version:?} has a pre-release without a patch")),
        None => String::new(),
    };

    Ok(Some(format!("{operator}{}{pre_release}", parts.join("."))))
}

/// A version listed by a [`VersionIndex`], keeping the index's own spelling of it.
///
/// Download URLs are built from the label, so `3.2` stays `3.2` even though it compares as
/// `3.2.0`. A leading `v` is not part of the label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedVersion {
    pub version: Version,
    pub label: String,
}

impl IndexedVersion {
    /// Parses an index entry, failing with [`ResolveError::MalformedInput`] attributed to `origin`.
    pub fn parse(raw: &str, origin: &str) -> Result<Self, ResolveError> {
        let label = raw.trim().trim_start_matches(['v', 'V']);
        parse_version(label)
            .map(|version| Self {
                version,
                label: label.to_string(),
            })
            .ok_or_else(|| ResolveError::MalformedInput {
                origin: origin.to_string(),
                detail: format!("{raw:?} is not a valid version"),
            })
    }
}

/// Parses a concrete version, tolerating a leading `v` and missing minor/patch components.
pub fn parse_version(raw: &str) -> Option<Version> {
    let raw = raw.trim().trim_start_matches(['v', 'V']);
    Version::parse(raw).ok().or_else(|| {
        let mut parts = raw.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().map_or(Some(0), |minor| minor.parse().ok())?;
        parts
            .next()
            .is_none()
            .then_some(Version::new(major, minor, 0))
    })
}

/// Truncates a version to its `major.minor` identifier, e.g. `13.0.1-canary` to `13.0`.
///
/// Pre-release and build suffixes are ignored. Fails if the version doesn't start with two
/// numeric components.
pub fn major_minor(version: &str) -> Result<String, String> {
    let trimmed = version.trim().trim_start_matches(['v', 'V']);
    let numbers = trimmed
        .split(['-', '+'])
        .next()
        .unwrap_or_default();

    let mut parts = numbers.split('.');
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor))
            if [major, minor]
                .iter()
                .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit())) =>
        {
            Ok(format!("{major}.{minor}"))
        }
        _ => Err(format!("{version:?} doesn't start with a major.minor version")),
    }
}

/// Lists the versions available from an upstream source.
pub trait VersionIndex {
    /// Human readable name of the index, used in error messages.
    fn name(&self) -> String;

    /// All versions the index offers, in no particular order.
    fn versions(&self) -> Result<Vec<IndexedVersion>, ResolveError>;

    /// The version the index recommends when no constraint is given, for example the newest LTS
    /// release. Defaults to the greatest stable version when `None`.
    fn default_version(&self) -> Result<Option<IndexedVersion>, ResolveError> {
        Ok(None)
    }
}

/// How to handle an explicit override that disagrees with a locked version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockConflictPolicy {
    /// Fail the build with [`ResolveError::Conflict`].
    Reject,
    /// Ignore the locked version and resolve the override against the index.
    PreferOverride,
}

/// The candidate sources for a version, each optional.
#[derive(Debug, Clone, Default)]
pub struct VersionRequest {
    /// Explicit user override, usually from an environment variable.
    pub override_version: Option<Sourced<String>>,
    /// An already resolved version recorded in a lockfile.
    pub locked: Option<Sourced<String>>,
    /// A version range declared in a manifest.
    pub constraint: Option<Sourced<String>>,
}

/// Resolves a [`VersionRequest`] to exactly one version.
///
/// Precedence:
/// 1. A locked version is returned as-is, without consulting the index. If an override is also
///    present and differs from it, `policy` decides between failing and using the override.
/// 2. The override, then the manifest constraint, is resolved against the index: the greatest
///    listed version satisfying it wins.
/// 3. Without any constraint the index's default version, or its greatest stable version, is used.
pub fn resolve_version(
    request: &VersionRequest,
    policy: LockConflictPolicy,
    index: &dyn VersionIndex,
) -> Result<ResolvedVersion, ResolveError> {
    match (&request.override_version, &request.locked) {
        (Some(requested), Some(locked)) if requested.value.trim() != locked.value.trim() => {
            if policy == LockConflictPolicy::Reject {
                return Err(ResolveError::Conflict {
                    locked: locked.value.clone(),
                    locked_origin: locked.origin.clone(),
                    requested: requested.value.clone(),
                    requested_origin: requested.origin.clone(),
                });
            }
        }
        (_, Some(locked)) => {
            return Ok(ResolvedVersion {
                version: locked.value.trim().to_string(),
                origin: locked.origin.clone(),
            });
        }
        _ => {}
    }

    let requested = request
        .override_version
        .as_ref()
        .or(request.constraint.as_ref());

    let constraint = match requested {
        Some(requested) => VersionConstraint::parse(&requested.value).map_err(|reason| {
            ResolveError::InvalidConstraint {
                origin: requested.origin.clone(),
                value: requested.value.clone(),
                reason,
            }
        })?,
        None => VersionConstraint::any(),
    };
    let origin = requested.map_or_else(|| index.name(), |requested| requested.origin.clone());

    let versions = index.versions()?;
    if versions.is_empty() {
        return Err(ResolveError::NoCandidates {
            index: index.name(),
        });
    }

    let chosen = if constraint.is_any() {
        match index.default_version()? {
            Some(default_version) => Some(default_version),
            None => greatest_matching(&versions, &constraint),
        }
    } else {
        greatest_matching(&versions, &constraint)
    };

    chosen
        .map(|indexed| ResolvedVersion {
            version: indexed.label,
            origin,
        })
        .ok_or_else(|| ResolveError::NoMatch {
            index: index.name(),
            origin: requested.map_or_else(|| String::from("default"), |r| r.origin.clone()),
            constraint: constraint.raw().to_string(),
        })
}

fn greatest_matching(
    versions: &[IndexedVersion],
    constraint: &VersionConstraint,
) -> Option<IndexedVersion> {
    versions
        .iter()
        .filter(|indexed| constraint.matches(&indexed.version))
        .max_by(|a, b| a.version.cmp(&b.version))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedIndex {
        versions: Vec<&'static str>,
        default_version: Option<&'static str>,
    }

    impl FixedIndex {
        fn new(versions: Vec<&'static str>) -> Self {
            Self {
                versions,
                default_version: None,
            }
        }
    }

    impl VersionIndex for FixedIndex {
        fn name(&self) -> String {
            String::from("test index")
        }

        fn versions(&self) -> Result<Vec<IndexedVersion>, ResolveError> {
            self.versions
                .iter()
                .map(|version| IndexedVersion::parse(version, "test index"))
                .collect()
        }

        fn default_version(&self) -> Result<Option<IndexedVersion>, ResolveError> {
            self.default_version
                .map(|version| IndexedVersion::parse(version, "test index"))
                .transpose()
        }
    }

    struct UnreachableIndex;

    impl VersionIndex for UnreachableIndex {
        fn name(&self) -> String {
            String::from("unreachable index")
        }

        fn versions(&self) -> Result<Vec<IndexedVersion>, ResolveError> {
            panic!("index must not be queried")
        }
    }

    fn matches(constraint: &str, version: &str) -> bool {
        VersionConstraint::parse(constraint)
            .unwrap()
            .matches(&Version::parse(version).unwrap())
    }

    #[test]
    fn constraint_forms() {
        assert!(matches("^13.1.0", "13.5.6"));
        assert!(!matches("^13.1.0", "14.0.0"));
        assert!(matches("8.x.x", "8.4.0"));
        assert!(matches("8.x", "8.4.0"));
        assert!(!matches("8.x.x", "9.0.0"));
        assert!(!matches(">9.0.0", "8.4.0"));
        assert!(matches(">= 18 < 20", "19.9.0"));
        assert!(!matches(">=18 <20", "20.0.0"));
        assert!(matches("1.2.3 - 2.3", "2.3.9"));
        assert!(!matches("1.2.3 - 2.3", "2.4.0"));
        assert!(matches("^16 || ^18", "18.1.0"));
        assert!(!matches("^16 || ^18", "17.0.0"));
        assert!(matches("v2.7.5", "2.7.5"));
        assert!(!matches("2.7.5", "2.7.6"));
        assert!(matches("18.2", "18.2.7"));
        assert!(!matches("18.2", "18.3.0"));
        assert!(matches("18", "18.20.0"));
    }

    #[test]
    fn any_constraints() {
        for raw in ["", "*", "latest", "x", "  "] {
            assert!(VersionConstraint::parse(raw).unwrap().is_any(), "{raw:?}");
        }
        assert!(VersionConstraint::parse("^16 || *").unwrap().is_any());
    }

    #[test]
    fn pre_releases_need_explicit_opt_in() {
        assert!(!matches("^13.0.0", "13.0.1-canary"));
        assert!(!matches("*", "13.0.1-canary"));
        assert!(matches(">=13.0.1-canary", "13.0.1-canary.2"));
    }

    #[test]
    fn invalid_constraints() {
        for raw in ["BAD_NEWS_BEARS", "1.2.3.4", ">=", "~> 3.0"] {
            assert!(VersionConstraint::parse(raw).is_err(), "{raw:?}");
        }
    }

    #[test]
    fn major_minor_tolerates_pre_releases() {
        assert_eq!(major_minor("13.0.0").unwrap(), "13.0");
        assert_eq!(major_minor("13.0.1-canary").unwrap(), "13.0");
        assert_eq!(major_minor("v14.2.3+build.5").unwrap(), "14.2");
        assert!(major_minor("13").is_err());
        assert!(major_minor("canary").is_err());
    }

    #[test]
    fn parse_version_is_lenient() {
        assert_eq!(parse_version("v20.11.1"), Some(Version::new(20, 11, 1)));
        assert_eq!(parse_version("3.2"), Some(Version::new(3, 2, 0)));
        assert_eq!(parse_version("21"), Some(Version::new(21, 0, 0)));
        assert_eq!(parse_version("BAD_NEWS_BEARS"), None);
    }

    #[test]
    fn indexed_versions_keep_their_label() {
        let indexed = IndexedVersion::parse("v3.2", "test index").unwrap();

        assert_eq!(indexed.version, Version::new(3, 2, 0));
        assert_eq!(indexed.label, "3.2");
        assert!(matches!(
            IndexedVersion::parse("latest", "test index"),
            Err(ResolveError::MalformedInput { ref origin, .. }) if origin == "test index"
        ));
    }

    #[test]
    fn resolved_version_is_the_index_label() {
        let index = FixedIndex::new(vec!["3.1", "3.2"]);

        let resolved =
            resolve_version(&VersionRequest::default(), LockConflictPolicy::Reject, &index)
                .unwrap();
        assert_eq!(resolved.version, "3.2");

        let request = VersionRequest {
            override_version: Some(Sourced::new(String::from("3.1"), "GOOGLE_RUNTIME_VERSION")),
            ..VersionRequest::default()
        };
        let resolved = resolve_version(&request, LockConflictPolicy::Reject, &index).unwrap();
        assert_eq!(resolved.version, "3.1");
    }

    #[test]
    fn locked_version_wins_over_constraint() {
        let request = VersionRequest {
            locked: Some(Sourced::new(String::from("13.5.6"), "package-lock.json")),
            constraint: Some(Sourced::new(String::from("^13.1.0"), "package.json")),
            ..VersionRequest::default()
        };

        let resolved =
            resolve_version(&request, LockConflictPolicy::Reject, &UnreachableIndex).unwrap();

        assert_eq!(resolved.version, "13.5.6");
        assert_eq!(resolved.origin, "package-lock.json");
    }

    #[test]
    fn conflicting_override_is_rejected() {
        let request = VersionRequest {
            override_version: Some(Sourced::new(String::from("2.7.5"), "GOOGLE_RUNTIME_VERSION")),
            locked: Some(Sourced::new(String::from("3.0.3"), "Gemfile.lock")),
            ..VersionRequest::default()
        };

        let error =
            resolve_version(&request, LockConflictPolicy::Reject, &UnreachableIndex).unwrap_err();

        match error {
            ResolveError::Conflict {
                locked, requested, ..
            } => {
                assert_eq!(locked, "3.0.3");
                assert_eq!(requested, "2.7.5");
            }
            error => panic!("unexpected error: {error}"),
        }
    }

    #[test]
    fn conflicting_override_can_take_precedence() {
        let request = VersionRequest {
            override_version: Some(Sourced::new(String::from("2.7.5"), "GOOGLE_RUNTIME_VERSION")),
            locked: Some(Sourced::new(String::from("3.0.3"), "Gemfile.lock")),
            ..VersionRequest::default()
        };

        let resolved = resolve_version(
            &request,
            LockConflictPolicy::PreferOverride,
            &FixedIndex::new(vec!["2.7.5", "3.0.3"]),
        )
        .unwrap();

        assert_eq!(resolved.version, "2.7.5");
        assert_eq!(resolved.origin, "GOOGLE_RUNTIME_VERSION");
    }

    #[test]
    fn matching_override_uses_locked_version() {
        let request = VersionRequest {
            override_version: Some(Sourced::new(String::from("3.0.3"), "GOOGLE_RUNTIME_VERSION")),
            locked: Some(Sourced::new(String::from("3.0.3"), "Gemfile.lock")),
            ..VersionRequest::default()
        };

        let resolved =
            resolve_version(&request, LockConflictPolicy::Reject, &UnreachableIndex).unwrap();

        assert_eq!(resolved.origin, "Gemfile.lock");
    }

    #[test]
    fn override_takes_priority_over_manifest_constraint() {
        let request = VersionRequest {
            override_version: Some(Sourced::new(String::from("16.x"), "GOOGLE_RUNTIME_VERSION")),
            constraint: Some(Sourced::new(String::from("^18"), "package.json")),
            ..VersionRequest::default()
        };

        let resolved = resolve_version(
            &request,
            LockConflictPolicy::Reject,
            &FixedIndex::new(vec!["16.1.0", "16.20.2", "18.19.0"]),
        )
        .unwrap();

        assert_eq!(resolved.version, "16.20.2");
    }

    #[test]
    fn greatest_satisfying_version_is_chosen() {
        let request = VersionRequest {
            constraint: Some(Sourced::new(String::from("8.x.x"), "package.json")),
            ..VersionRequest::default()
        };

        let resolved = resolve_version(
            &request,
            LockConflictPolicy::Reject,
            &FixedIndex::new(vec!["7.33.0", "8.4.0", "8.15.1", "9.0.0", "8.16.0-rc.1"]),
        )
        .unwrap();

        assert_eq!(resolved.version, "8.15.1");
    }

    #[test]
    fn unsatisfiable_constraint_fails() {
        let request = VersionRequest {
            constraint: Some(Sourced::new(String::from(">9.0.0"), "package.json")),
            ..VersionRequest::default()
        };

        let error = resolve_version(
            &request,
            LockConflictPolicy::Reject,
            &FixedIndex::new(vec!["8.4.0"]),
        )
        .unwrap_err();

        assert!(matches!(
            error,
            ResolveError::NoMatch { ref constraint, ref origin, .. } if constraint == ">9.0.0" && origin == "package.json"
        ));
    }

    #[test]
    fn empty_index_fails() {
        let error = resolve_version(
            &VersionRequest::default(),
            LockConflictPolicy::Reject,
            &FixedIndex::new(vec![]),
        )
        .unwrap_err();

        assert!(matches!(error, ResolveError::NoCandidates { .. }));
    }

    #[test]
    fn invalid_override_names_its_origin() {
        let request = VersionRequest {
            override_version: Some(Sourced::new(
                String::from("BAD_NEWS_BEARS"),
                "GOOGLE_RUNTIME_VERSION",
            )),
            ..VersionRequest::default()
        };

        let error = resolve_version(
            &request,
            LockConflictPolicy::Reject,
            &FixedIndex::new(vec!["3.0.3"]),
        )
        .unwrap_err();

        assert!(matches!(
            error,
            ResolveError::InvalidConstraint { ref origin, ref value, .. } if origin == "GOOGLE_RUNTIME_VERSION" && value == "BAD_NEWS_BEARS"
        ));
    }

    #[test]
    fn without_constraint_the_index_default_wins() {
        let index = FixedIndex {
            versions: vec!["18.19.0", "20.11.1", "21.6.1"],
            default_version: Some("20.11.1"),
        };

        let resolved =
            resolve_version(&VersionRequest::default(), LockConflictPolicy::Reject, &index)
                .unwrap();

        assert_eq!(resolved.version, "20.11.1");
        assert_eq!(resolved.origin, "test index");
    }

    #[test]
    fn without_constraint_the_greatest_stable_version_wins() {
        let resolved = resolve_version(
            &VersionRequest::default(),
            LockConflictPolicy::Reject,
            &FixedIndex::new(vec!["3.2.2", "3.3.0", "3.4.0-preview1"]),
        )
        .unwrap();

        assert_eq!(resolved.version, "3.3.0");
    }
}
