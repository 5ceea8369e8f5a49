use commons::version::ResolveError;
use serde::Deserialize;
use std::fmt::{self, Display, Formatter};

/// Release name prefixes that aren't part of the version.
const PRODUCT_PREFIXES: [&str; 2] = ["jdk-", "jre-"];

/// A JDK release as listed by the AdoptOpenJDK release API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Release {
    pub(crate) release_name: String,
    #[serde(default)]
    pub(crate) binaries: Vec<Binary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Binary {
    pub(crate) os: String,
    pub(crate) architecture: String,
    pub(crate) binary_type: String,
    pub(crate) binary_link: String,
}

/// The binary a build needs. All fields must match exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BinaryRequirement {
    pub(crate) os: String,
    pub(crate) architecture: String,
    pub(crate) binary_type: String,
}

impl BinaryRequirement {
    pub(crate) fn jdk(os: &str, architecture: &str) -> Self {
        Self {
            os: os.to_string(),
            architecture: architecture.to_string(),
            binary_type: String::from("jdk"),
        }
    }

    fn matches(&self, binary: &Binary) -> bool {
        binary.os == self.os
            && binary.architecture == self.architecture
            && binary.binary_type == self.binary_type
    }
}

impl Display for BinaryRequirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.binary_type, self.os, self.architecture)
    }
}

/// Parses a release listing and returns the last release in it, which is the newest one.
pub(crate) fn parse_releases(json: &str, origin: &str) -> Result<Release, ResolveError> {
    let mut releases: Vec<Release> =
        serde_json::from_str(json).map_err(|error| ResolveError::MalformedInput {
            origin: origin.to_string(),
            detail: error.to_string(),
        })?;

    releases.pop().ok_or_else(|| ResolveError::NoCandidates {
        index: origin.to_string(),
    })
}

/// Picks the binary matching `requirement` from a release.
///
/// Returns the version (the release name without its product prefix) and the download link.
pub(crate) fn extract_release(
    release: &Release,
    requirement: &BinaryRequirement,
) -> Result<(String, String), ResolveError> {
    if release.binaries.is_empty() {
        return Err(ResolveError::NoCandidates {
            index: format!("release {}", release.release_name),
        });
    }

    let binary = release
        .binaries
        .iter()
        .find(|binary| requirement.matches(binary))
        .ok_or_else(|| ResolveError::NoMatch {
            index: format!("release {}", release.release_name),
            origin: String::from("build target"),
            constraint: requirement.to_string(),
        })?;

    let version = PRODUCT_PREFIXES
        .iter()
        .find_map(|prefix| release.release_name.strip_prefix(prefix))
        .unwrap_or(&release.release_name);

    Ok((version.to_string(), binary.binary_link.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://api.adoptopenjdk.net/v2/info/releases/openjdk11";

    fn binary(binary_type: &str, os: &str, architecture: &str, link: &str) -> Binary {
        Binary {
            os: os.to_string(),
            architecture: architecture.to_string(),
            binary_type: binary_type.to_string(),
            binary_link: link.to_string(),
        }
    }

    fn release(binaries: Vec<Binary>) -> Release {
        Release {
            release_name: String::from("jdk-11.0.6+10"),
            binaries,
        }
    }

    #[test]
    fn parses_single_release() {
        let json = r#"[{
          "release_name": "jdk-11.0.6+10",
          "binaries": [
            {
              "os": "linux",
              "architecture": "x64",
              "binary_type": "jdk",
              "binary_link": "https://example.com/want"
            }
          ]
        }]"#;

        let release = parse_releases(json, ORIGIN).unwrap();

        assert_eq!(release.release_name, "jdk-11.0.6+10");
        assert_eq!(
            release.binaries,
            vec![binary("jdk", "linux", "x64", "https://example.com/want")]
        );
    }

    #[test]
    fn last_release_wins() {
        let json = r#"[
          {
            "release_name": "jdk-11.0.5+10",
            "binaries": [{"os": "linux", "architecture": "x64", "binary_type": "jdk", "binary_link": "https://example.com/want"}]
          },
          {
            "release_name": "jdk-11.0.6+10",
            "binaries": [{"os": "linux", "architecture": "x64", "binary_type": "jdk", "binary_link": "https://example2.com/want"}]
          }
        ]"#;

        let release = parse_releases(json, ORIGIN).unwrap();

        assert_eq!(release.release_name, "jdk-11.0.6+10");
        assert_eq!(
            release.binaries,
            vec![binary("jdk", "linux", "x64", "https://example2.com/want")]
        );
    }

    #[test]
    fn invalid_json_is_malformed_input() {
        assert!(matches!(
            parse_releases("[{]", ORIGIN),
            Err(ResolveError::MalformedInput { .. })
        ));
    }

    #[test]
    fn empty_listing_has_no_candidates() {
        assert!(matches!(
            parse_releases("[]", ORIGIN),
            Err(ResolveError::NoCandidates { .. })
        ));
    }

    #[test]
    fn extracts_only_binary() {
        let release = release(vec![binary("jdk", "linux", "x64", "https://example.com/want")]);

        let (version, link) =
            extract_release(&release, &BinaryRequirement::jdk("linux", "x64")).unwrap();

        assert_eq!(version, "11.0.6+10");
        assert_eq!(link, "https://example.com/want");
    }

    #[test]
    fn skips_binaries_that_differ_in_one_field() {
        let requirement = BinaryRequirement::jdk("linux", "x64");
        let wanted = binary("jdk", "linux", "x64", "https://example2.com/want");

        for unwanted in [
            binary("jre", "linux", "x64", "https://example.com/want"),
            binary("jdk", "windows", "x64", "https://example.com/want"),
            binary("jdk", "linux", "x86", "https://example.com/want"),
        ] {
            let release = release(vec![unwanted, wanted.clone()]);

            let (version, link) = extract_release(&release, &requirement).unwrap();

            assert_eq!(version, "11.0.6+10");
            assert_eq!(link, "https://example2.com/want");
        }
    }

    #[test]
    fn release_without_binaries_has_no_candidates() {
        assert!(matches!(
            extract_release(&release(vec![]), &BinaryRequirement::jdk("linux", "x64")),
            Err(ResolveError::NoCandidates { .. })
        ));
    }

    #[test]
    fn release_without_matching_binary_has_no_match() {
        let release = release(vec![
            binary("jre", "linux", "x64", "https://example.com/want"),
            binary("jdk", "windows", "x64", "https://example2.com/want"),
        ]);

        assert!(matches!(
            extract_release(&release, &BinaryRequirement::jdk("linux", "x64")),
            Err(ResolveError::NoMatch { ref constraint, .. }) if constraint == "jdk linux/x64"
        ));
    }

    #[test]
    fn keeps_release_names_without_known_prefix() {
        let release = Release {
            release_name: String::from("11.0.6+10"),
            binaries: vec![binary("jdk", "linux", "aarch64", "https://example.com/want")],
        };

        let (version, _) =
            extract_release(&release, &BinaryRequirement::jdk("linux", "aarch64")).unwrap();

        assert_eq!(version, "11.0.6+10");
    }
}
