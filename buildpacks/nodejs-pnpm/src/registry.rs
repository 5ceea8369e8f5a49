use commons::http::{fetch_json, Fetcher};
use commons::version::{IndexedVersion, ResolveError, VersionIndex};
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::HashMap;

/// The npm registry document ("packument") describing all published versions of a package.
#[derive(Debug, Deserialize)]
struct Packument {
    #[serde(rename = "dist-tags", default)]
    dist_tags: HashMap<String, String>,
    #[serde(default)]
    versions: HashMap<String, IgnoredAny>,
}

/// Versions of a package published to the npm registry. The `latest` dist-tag is the default.
#[derive(Debug)]
pub(crate) struct NpmRegistryIndex {
    url: String,
    packument: Packument,
}

impl NpmRegistryIndex {
    pub(crate) fn fetch(fetcher: &dyn Fetcher, url: &str) -> Result<Self, ResolveError> {
        let packument = fetch_json(fetcher, url)
            .map_err(|error| ResolveError::from_index_fetch(url, error))?;

        Ok(Self {
            url: url.to_string(),
            packument,
        })
    }

}

impl VersionIndex for NpmRegistryIndex {
    fn name(&self) -> String {
        self.url.clone()
    }

    fn versions(&self) -> Result<Vec<IndexedVersion>, ResolveError> {
        self.packument
            .versions
            .keys()
            .map(|version| IndexedVersion::parse(version, &self.url))
            .collect()
    }

    fn default_version(&self) -> Result<Option<IndexedVersion>, ResolveError> {
        self.packument
            .dist_tags
            .get("latest")
            .map(|latest| IndexedVersion::parse(latest, &self.url))
            .transpose()
    }
}
