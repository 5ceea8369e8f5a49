mod dist_index;
mod errors;

use crate::dist_index::NodeDistIndex;
use crate::errors::NodeJsRuntimeBuildpackError;
use commons::http::{render_url, UreqFetcher};
use commons::layer::{cached_version_layer, install_version_layer, LayerScope};
use commons::log::{log_header, log_info};
use commons::nodejs::{PackageJson, PackageJsonError};
use commons::runtime::{runtime_version_override, RuntimeSelection, RUNTIME_VERSION_ENV_VAR};
use commons::tar::download_and_extract;
use commons::version::{resolve_version, LockConflictPolicy, Sourced, VersionRequest};
use libcnb::build::{BuildContext, BuildResult, BuildResultBuilder};
use libcnb::data::layer_name;
use libcnb::detect::{DetectContext, DetectResult, DetectResultBuilder};
use libcnb::generic::GenericPlatform;
use libcnb::{buildpack_main, Buildpack, Env, Platform};
use serde::Deserialize;
use std::path::Path;

// Suppress warnings due to the `unused_crate_dependencies` lint not handling integration tests well.
#[cfg(test)]
use libcnb_test as _;

pub(crate) struct NodeJsRuntimeBuildpack;

impl Buildpack for NodeJsRuntimeBuildpack {
    type Platform = GenericPlatform;
    type Metadata = NodeJsRuntimeBuildpackMetadata;
    type Error = NodeJsRuntimeBuildpackError;

    fn detect(&self, context: DetectContext<Self>) -> libcnb::Result<DetectResult, Self::Error> {
        if RuntimeSelection::from_env(context.platform.env(), "nodejs")
            .participates(|| context.app_dir.join("package.json").is_file())
        {
            DetectResultBuilder::pass().build()
        } else {
            DetectResultBuilder::fail().build()
        }
    }

    fn build(&self, context: BuildContext<Self>) -> libcnb::Result<BuildResult, Self::Error> {
        log_header("Node.js Runtime");

        let metadata = &context.buildpack_descriptor.metadata;
        let package_json = read_package_json(&context.app_dir)?;
        let request = version_request(context.platform.env(), package_json.as_ref());

        let fetcher = UreqFetcher;
        let index = NodeDistIndex::fetch(&fetcher, &metadata.index_url)
            .map_err(NodeJsRuntimeBuildpackError::ResolveVersion)?;
        let resolved = resolve_version(&request, LockConflictPolicy::PreferOverride, &index)
            .map_err(NodeJsRuntimeBuildpackError::ResolveVersion)?;
        log_info(format!("Resolved Node.js version {resolved}"));

        let binary_url = render_url(
            &metadata.binary_url,
            &[
                ("version", &resolved.version),
                ("arch", nodejs_arch(&context.target.arch)?),
            ],
        );

        let layer_ref = cached_version_layer(
            &context,
            layer_name!("nodejs"),
            &resolved.version,
            LayerScope {
                build: true,
                launch: true,
            },
        )?;
        install_version_layer(&layer_ref, "Node.js", &resolved.version, |layer_dir| {
            download_and_extract(&fetcher, &binary_url, layer_dir, 1)
                .map_err(NodeJsRuntimeBuildpackError::InstallNode)
        })?;

        BuildResultBuilder::new().build()
    }

    fn on_error(&self, error: libcnb::Error<Self::Error>) {
        commons::error::on_error(error);
    }
}

/// `package.json` is optional when `GOOGLE_RUNTIME` selected this buildpack.
fn read_package_json(app_dir: &Path) -> Result<Option<PackageJson>, NodeJsRuntimeBuildpackError> {
    match PackageJson::read(app_dir) {
        Ok(package_json) => Ok(Some(package_json)),
        Err(PackageJsonError::Missing(_)) => Ok(None),
        Err(error) => Err(NodeJsRuntimeBuildpackError::PackageJson(error)),
    }
}

/// `GOOGLE_RUNTIME_VERSION` takes precedence over `engines.node`. Without either, the newest LTS
/// release is installed.
fn version_request(env: &Env, package_json: Option<&PackageJson>) -> VersionRequest {
    VersionRequest {
        override_version: runtime_version_override(env)
            .map(|version| Sourced::new(version, RUNTIME_VERSION_ENV_VAR)),
        locked: None,
        constraint: package_json
            .and_then(|package_json| package_json.engines.node.clone())
            .map(|range| Sourced::new(range, "package.json (engines.node)")),
    }
}

fn nodejs_arch(arch: &str) -> Result<&'static str, NodeJsRuntimeBuildpackError> {
    match arch {
        "amd64" => Ok("x64"),
        "arm64" => Ok("arm64"),
        other => Err(NodeJsRuntimeBuildpackError::UnsupportedArchitecture(
            other.to_string(),
        )),
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub(crate) struct NodeJsRuntimeBuildpackMetadata {
    pub(crate) index_url: String,
    /// Download URL template with `{version}` and `{arch}` placeholders.
    pub(crate) binary_url: String,
}

buildpack_main!(NodeJsRuntimeBuildpack);

#[cfg(test)]
mod tests {
    use super::*;
    use commons::nodejs::Engines;
    use std::fs;

    #[derive(Deserialize)]
    struct BuildpackToml {
        metadata: NodeJsRuntimeBuildpackMetadata,
    }

    fn package_json_with_engine(node: &str) -> PackageJson {
        PackageJson {
            engines: Engines {
                node: Some(node.to_string()),
                ..Engines::default()
            },
            ..PackageJson::default()
        }
    }

    #[test]
    fn buildpack_toml_metadata_is_valid() {
        let buildpack_toml: BuildpackToml =
            toml::from_str(include_str!("../buildpack.toml")).unwrap();

        assert_eq!(
            render_url(
                &buildpack_toml.metadata.binary_url,
                &[("version", "20.11.1"), ("arch", "x64")]
            ),
            "https://nodejs.org/dist/v20.11.1/node-v20.11.1-linux-x64.tar.gz"
        );
    }

    #[test]
    fn override_takes_precedence_over_engines() {
        let mut env = Env::new();
        env.insert("GOOGLE_RUNTIME_VERSION", "18.19.1");

        let request = version_request(&env, Some(&package_json_with_engine("20.x")));

        assert_eq!(
            request.override_version,
            Some(Sourced::new(String::from("18.19.1"), "GOOGLE_RUNTIME_VERSION"))
        );
        assert_eq!(
            request.constraint,
            Some(Sourced::new(
                String::from("20.x"),
                "package.json (engines.node)"
            ))
        );
        assert_eq!(request.locked, None);
    }

    #[test]
    fn no_package_json_means_no_constraint() {
        let request = version_request(&Env::new(), None);

        assert_eq!(request.override_version, None);
        assert_eq!(request.constraint, None);
    }

    #[test]
    fn missing_package_json_is_optional() {
        let app_dir = tempfile::tempdir().unwrap();

        assert_eq!(read_package_json(app_dir.path()).unwrap(), None);
    }

    #[test]
    fn invalid_package_json_is_an_error() {
        let app_dir = tempfile::tempdir().unwrap();
        fs::write(app_dir.path().join("package.json"), "not json").unwrap();

        assert!(matches!(
            read_package_json(app_dir.path()),
            Err(NodeJsRuntimeBuildpackError::PackageJson(
                PackageJsonError::Parse(..)
            ))
        ));
    }

    #[test]
    fn maps_target_architectures() {
        assert_eq!(nodejs_arch("amd64").unwrap(), "x64");
        assert_eq!(nodejs_arch("arm64").unwrap(), "arm64");
        assert!(nodejs_arch("ppc64le").is_err());
    }
}
