use commons::http::{fetch_json, Fetcher};
use commons::version::{IndexedVersion, ResolveError, VersionIndex};
use serde::Deserialize;

/// The release listing at `https://nodejs.org/dist/index.json`.
#[derive(Debug, Clone)]
pub(crate) struct NodeDistIndex {
    url: String,
    releases: Vec<NodeRelease>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct NodeRelease {
    pub(crate) version: String,
    #[serde(default)]
    pub(crate) lts: Lts,
}

/// `false` for current releases, the release line's codename (e.g. `"Iron"`) for LTS releases.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum Lts {
    Codename(String),
    Flag(bool),
}

impl Default for Lts {
    fn default() -> Self {
        Lts::Flag(false)
    }
}

impl NodeRelease {
    fn is_lts(&self) -> bool {
        matches!(self.lts, Lts::Codename(_) | Lts::Flag(true))
    }
}

impl NodeDistIndex {
    pub(crate) fn fetch(fetcher: &dyn Fetcher, url: &str) -> Result<Self, ResolveError> {
        let releases = fetch_json(fetcher, url)
            .map_err(|error| ResolveError::from_index_fetch(url, error))?;

        Ok(Self {
            url: url.to_string(),
            releases,
        })
    }

    fn parsed_releases(&self) -> Result<Vec<(IndexedVersion, &NodeRelease)>, ResolveError> {
        self.releases
            .iter()
            .map(|release| {
                IndexedVersion::parse(&release.version, &self.url).map(|version| (version, release))
            })
            .collect()
    }
}

impl VersionIndex for NodeDistIndex {
    fn name(&self) -> String {
        self.url.clone()
    }

    fn versions(&self) -> Result<Vec<IndexedVersion>, ResolveError> {
        Ok(self
            .parsed_releases()?
            .into_iter()
            .map(|(version, _)| version)
            .collect())
    }

    /// The newest LTS release.
    fn default_version(&self) -> Result<Option<IndexedVersion>, ResolveError> {
        Ok(self
            .parsed_releases()?
            .into_iter()
            .filter(|(_, release)| release.is_lts())
            .map(|(version, _)| version)
            .max_by(|a, b| a.version.cmp(&b.version)))
    }
}
