use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const PACKAGE_JSON: &str = "package.json";

/// The subset of `package.json` the buildpacks look at. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default)]
    pub engines: Engines,
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: HashMap<String, String>,
    pub package_manager: Option<String>,
}

/// Version ranges from the `engines` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Engines {
    pub node: Option<String>,
    pub pnpm: Option<String>,
}

/// A parsed `packageManager` field, e.g. `pnpm@8.4.0+sha256.1a2b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManager {
    pub name: String,
    /// The pinned version without the integrity hash suffix.
    pub version: String,
}

#[derive(thiserror::Error, Debug)]
pub enum PackageJsonError {
    #[error("{0} doesn't exist")]
    Missing(PathBuf),

    #[error("Couldn't read {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("{0} is not valid JSON: {1}")]
    Parse(PathBuf, serde_json::Error),
}

impl PackageJson {
    /// Reads `package.json` from the application directory.
    pub fn read(app_dir: &Path) -> Result<Self, PackageJsonError> {
        let path = app_dir.join(PACKAGE_JSON);
        let contents = std::fs::read_to_string(&path).map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                PackageJsonError::Missing(path.clone())
            } else {
                PackageJsonError::Read(path.clone(), error)
            }
        })?;

        serde_json::from_str(&contents).map_err(|error| PackageJsonError::Parse(path, error))
    }

    /// The range a package is declared with, checking `dependencies` before `devDependencies`.
    pub fn dependency_range(&self, package: &str) -> Option<&str> {
        self.dependencies
            .get(package)
            .or_else(|| self.dev_dependencies.get(package))
            .map(String::as_str)
    }

    pub fn has_dependency(&self, package: &str) -> bool {
        self.dependency_range(package).is_some()
    }

    /// Parses the `packageManager` field. Values without an `@version` part yield `None`.
    pub fn package_manager(&self) -> Option<PackageManager> {
        let (name, version) = self.package_manager.as_deref()?.trim().split_once('@')?;
        let version = version.split('+').next().unwrap_or_default();

        (!name.is_empty() && !version.is_empty()).then(|| PackageManager {
            name: name.to_string(),
            version: version.to_string(),
        })
    }
}
