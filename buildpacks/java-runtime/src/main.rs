mod detect;
mod errors;
mod release;

use crate::errors::JavaRuntimeBuildpackError;
use crate::release::{extract_release, parse_releases, BinaryRequirement};
use commons::http::{render_url, Fetcher, UreqFetcher};
use commons::layer::{cached_version_layer, install_version_layer, LayerScope};
use commons::log::{log_header, log_info};
use commons::runtime::{runtime_version_override, RuntimeSelection};
use commons::tar::download_and_extract;
use commons::version::ResolveError;
use libcnb::build::{BuildContext, BuildResult, BuildResultBuilder};
use libcnb::data::layer_name;
use libcnb::detect::{DetectContext, DetectResult, DetectResultBuilder};
use libcnb::generic::GenericPlatform;
use libcnb::layer_env::{LayerEnv, ModificationBehavior, Scope};
use libcnb::{buildpack_main, Buildpack, Platform};
use serde::Deserialize;

// Suppress warnings due to the `unused_crate_dependencies` lint not handling integration tests well.
#[cfg(test)]
use libcnb_test as _;

pub(crate) struct JavaRuntimeBuildpack;

impl Buildpack for JavaRuntimeBuildpack {
    type Platform = GenericPlatform;
    type Metadata = JavaRuntimeBuildpackMetadata;
    type Error = JavaRuntimeBuildpackError;

    fn detect(&self, context: DetectContext<Self>) -> libcnb::Result<DetectResult, Self::Error> {
        let is_java_app = match RuntimeSelection::from_env(context.platform.env(), "java") {
            RuntimeSelection::Selected => true,
            RuntimeSelection::Excluded => false,
            RuntimeSelection::Unspecified => detect::is_java_app(&context.app_dir)
                .map_err(JavaRuntimeBuildpackError::DetectJavaApp)?,
        };

        if is_java_app {
            DetectResultBuilder::pass().build()
        } else {
            DetectResultBuilder::fail().build()
        }
    }

    fn build(&self, context: BuildContext<Self>) -> libcnb::Result<BuildResult, Self::Error> {
        log_header("Java Runtime");

        let metadata = &context.buildpack_descriptor.metadata;
        let feature_version = runtime_version_override(context.platform.env())
            .unwrap_or_else(|| metadata.default_feature_version.clone());
        let arch = adoptopenjdk_arch(&context.target.arch)?;

        let fetcher = UreqFetcher;
        let releases_url = render_url(
            &metadata.releases_url,
            &[("feature_version", &feature_version), ("arch", arch)],
        );
        log_info(format!("Looking up the latest Java {feature_version} release"));
        let (version, binary_link) = latest_jdk(&fetcher, &releases_url, arch)
            .map_err(JavaRuntimeBuildpackError::ResolveRelease)?;

        let layer_ref = cached_version_layer(
            &context,
            layer_name!("java"),
            &version,
            LayerScope {
                build: true,
                launch: true,
            },
        )?;
        install_version_layer(&layer_ref, "JDK", &version, |layer_dir| {
            download_and_extract(&fetcher, &binary_link, layer_dir, 1)
                .map_err(JavaRuntimeBuildpackError::InstallJdk)
        })?;
        layer_ref.write_env(LayerEnv::new().chainable_insert(
            Scope::All,
            ModificationBehavior::Override,
            "JAVA_HOME",
            layer_ref.path(),
        ))?;

        BuildResultBuilder::new().build()
    }

    fn on_error(&self, error: libcnb::Error<Self::Error>) {
        commons::error::on_error(error);
    }
}

fn latest_jdk(
    fetcher: &dyn Fetcher,
    releases_url: &str,
    arch: &str,
) -> Result<(String, String), ResolveError> {
    let body = fetcher
        .get_string(releases_url)
        .map_err(|error| ResolveError::from_index_fetch(releases_url, error))?;
    let release = parse_releases(&body, releases_url)?;

    extract_release(&release, &BinaryRequirement::jdk("linux", arch))
}

/// Maps a CNB target architecture to the name the AdoptOpenJDK API uses.
fn adoptopenjdk_arch(arch: &str) -> Result<&'static str, JavaRuntimeBuildpackError> {
    match arch {
        "amd64" => Ok("x64"),
        "arm64" => Ok("aarch64"),
        other => Err(JavaRuntimeBuildpackError::UnsupportedArchitecture(
            other.to_string(),
        )),
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub(crate) struct JavaRuntimeBuildpackMetadata {
    /// Used when `GOOGLE_RUNTIME_VERSION` isn't set.
    pub(crate) default_feature_version: String,
    /// Release listing URL template with `{feature_version}` and `{arch}` placeholders.
    pub(crate) releases_url: String,
}

buildpack_main!(JavaRuntimeBuildpack);
