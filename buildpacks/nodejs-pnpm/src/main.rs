mod errors;
mod install;
mod registry;

use crate::errors::PnpmBuildpackError;
use crate::install::{install_pnpm, pnpm_install};
use crate::registry::NpmRegistryIndex;
use commons::command::SystemCommandRunner;
use commons::http::{render_url, UreqFetcher};
use commons::layer::{cached_version_layer, install_version_layer, LayerScope};
use commons::log::{log_header, log_info};
use commons::nodejs::{Lockfile, PackageJson, PackageJsonError};
use commons::version::{resolve_version, LockConflictPolicy, Sourced, VersionRequest};
use libcnb::build::{BuildContext, BuildResult, BuildResultBuilder};
use libcnb::data::layer_name;
use libcnb::detect::{DetectContext, DetectResult, DetectResultBuilder};
use libcnb::generic::GenericPlatform;
use libcnb::{buildpack_main, Buildpack};
use serde::Deserialize;
use std::path::Path;

// Suppress warnings due to the `unused_crate_dependencies` lint not handling integration tests well.
#[cfg(test)]
use libcnb_test as _;

pub(crate) struct PnpmBuildpack;

impl Buildpack for PnpmBuildpack {
    type Platform = GenericPlatform;
    type Metadata = PnpmBuildpackMetadata;
    type Error = PnpmBuildpackError;

    fn detect(&self, context: DetectContext<Self>) -> libcnb::Result<DetectResult, Self::Error> {
        if uses_pnpm(&context.app_dir) {
            DetectResultBuilder::pass().build()
        } else {
            DetectResultBuilder::fail().build()
        }
    }

    fn build(&self, context: BuildContext<Self>) -> libcnb::Result<BuildResult, Self::Error> {
        log_header("pnpm");

        let metadata = &context.buildpack_descriptor.metadata;
        let package_json = match PackageJson::read(&context.app_dir) {
            Ok(package_json) => Some(package_json),
            Err(PackageJsonError::Missing(_)) => None,
            Err(error) => return Err(PnpmBuildpackError::PackageJson(error).into()),
        };

        let fetcher = UreqFetcher;
        let index = NpmRegistryIndex::fetch(&fetcher, &metadata.registry_url)
            .map_err(PnpmBuildpackError::ResolveVersion)?;
        let resolved = resolve_version(
            &version_request(package_json.as_ref()),
            LockConflictPolicy::PreferOverride,
            &index,
        )
        .map_err(PnpmBuildpackError::ResolveVersion)?;
        log_info(format!("Resolved pnpm version {resolved}"));

        let binary_url = render_url(
            &metadata.binary_url,
            &[
                ("version", &resolved.version),
                ("arch", pnpm_arch(&context.target.arch)?),
            ],
        );

        let layer_ref = cached_version_layer(
            &context,
            layer_name!("pnpm"),
            &resolved.version,
            LayerScope {
                build: true,
                launch: false,
            },
        )?;
        install_version_layer(&layer_ref, "pnpm", &resolved.version, |layer_dir| {
            install_pnpm(&fetcher, &binary_url, layer_dir)
                .map_err(PnpmBuildpackError::InstallPnpm)
        })?;

        log_header("Installing dependencies");
        pnpm_install(
            &SystemCommandRunner,
            &context.app_dir,
            &layer_ref.path().join("bin"),
        )
        .map_err(PnpmBuildpackError::PnpmInstall)?;

        BuildResultBuilder::new().build()
    }

    fn on_error(&self, error: libcnb::Error<Self::Error>) {
        commons::error::on_error(error);
    }
}

/// A `pnpm-lock.yaml`, or a `packageManager` field naming pnpm, marks an app as using pnpm.
fn uses_pnpm(app_dir: &Path) -> bool {
    app_dir.join(Lockfile::PnpmLock.file_name()).is_file()
        || PackageJson::read(app_dir)
            .ok()
            .and_then(|package_json| package_json.package_manager())
            .is_some_and(|package_manager| package_manager.name == "pnpm")
}

/// A `packageManager` pin takes precedence over `engines.pnpm`. Without either, the registry's
/// `latest` tag is installed.
fn version_request(package_json: Option<&PackageJson>) -> VersionRequest {
    let pinned = package_json
        .and_then(PackageJson::package_manager)
        .filter(|package_manager| package_manager.name == "pnpm")
        .map(|package_manager| {
            Sourced::new(package_manager.version, "package.json (packageManager)")
        });

    VersionRequest {
        override_version: pinned,
        locked: None,
        constraint: package_json
            .and_then(|package_json| package_json.engines.pnpm.clone())
            .map(|range| Sourced::new(range, "package.json (engines.pnpm)")),
    }
}

fn pnpm_arch(arch: &str) -> Result<&'static str, PnpmBuildpackError> {
    match arch {
        "amd64" => Ok("x64"),
        "arm64" => Ok("arm64"),
        other => Err(PnpmBuildpackError::UnsupportedArchitecture(
            other.to_string(),
        )),
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub(crate) struct PnpmBuildpackMetadata {
    /// npm registry document listing the published pnpm versions.
    pub(crate) registry_url: String,
    /// Standalone executable URL template with `{version}` and `{arch}` placeholders.
    pub(crate) binary_url: String,
}

buildpack_main!(PnpmBuildpack);
