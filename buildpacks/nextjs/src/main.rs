mod adapter;
mod errors;

use crate::adapter::{adapter_bin_dir, adapter_version, install_adapter, nextjs_version};
use crate::errors::NextJsBuildpackError;
use commons::command::SystemCommandRunner;
use commons::layer::{cached_version_layer, install_version_layer, LayerScope};
use commons::log::{log_header, log_info};
use commons::nodejs::PackageJson;
use libcnb::build::{BuildContext, BuildResult, BuildResultBuilder};
use libcnb::data::layer_name;
use libcnb::detect::{DetectContext, DetectResult, DetectResultBuilder};
use libcnb::generic::GenericPlatform;
use libcnb::layer_env::{LayerEnv, ModificationBehavior, Scope};
use libcnb::{buildpack_main, Buildpack};
use serde::Deserialize;
use std::path::Path;

// Suppress warnings due to the `unused_crate_dependencies` lint not handling integration tests well.
#[cfg(test)]
use libcnb_test as _;

pub(crate) struct NextJsBuildpack;

impl Buildpack for NextJsBuildpack {
    type Platform = GenericPlatform;
    type Metadata = NextJsBuildpackMetadata;
    type Error = NextJsBuildpackError;

    fn detect(&self, context: DetectContext<Self>) -> libcnb::Result<DetectResult, Self::Error> {
        if uses_nextjs(&context.app_dir) {
            DetectResultBuilder::pass().build()
        } else {
            DetectResultBuilder::fail().build()
        }
    }

    fn build(&self, context: BuildContext<Self>) -> libcnb::Result<BuildResult, Self::Error> {
        log_header("Next.js");

        let package_json =
            PackageJson::read(&context.app_dir).map_err(NextJsBuildpackError::PackageJson)?;
        if let Some(range) = package_json.dependency_range("next") {
            log_info(format!("package.json requires next@{range}"));
        }

        let nextjs_version =
            nextjs_version(&context.app_dir).map_err(NextJsBuildpackError::NextJsVersion)?;
        log_info(format!(
            "Found Next.js {} in {}",
            nextjs_version.value, nextjs_version.origin
        ));
        let adapter_version =
            adapter_version(&nextjs_version.value).map_err(NextJsBuildpackError::AdapterVersion)?;

        let adapter_package = &context.buildpack_descriptor.metadata.adapter_package;
        let layer_ref = cached_version_layer(
            &context,
            layer_name!("nextjs-adapter"),
            &adapter_version,
            LayerScope {
                build: true,
                launch: false,
            },
        )?;
        install_version_layer(
            &layer_ref,
            "Next.js build adapter",
            &adapter_version,
            |layer_dir| {
                install_adapter(
                    &SystemCommandRunner,
                    layer_dir,
                    adapter_package,
                    &adapter_version,
                )
                .map(|_| ())
                .map_err(NextJsBuildpackError::InstallAdapter)
            },
        )?;
        layer_ref.write_env(adapter_layer_env(&layer_ref.path()))?;

        BuildResultBuilder::new().build()
    }

    fn on_error(&self, error: libcnb::Error<Self::Error>) {
        commons::error::on_error(error);
    }
}

fn uses_nextjs(app_dir: &Path) -> bool {
    PackageJson::read(app_dir).is_ok_and(|package_json| package_json.has_dependency("next"))
}

/// Puts the adapter's executables on `PATH` for the rest of the build.
fn adapter_layer_env(layer_dir: &Path) -> LayerEnv {
    LayerEnv::new()
        .chainable_insert(
            Scope::Build,
            ModificationBehavior::Prepend,
            "PATH",
            adapter_bin_dir(layer_dir),
        )
        .chainable_insert(Scope::Build, ModificationBehavior::Delimiter, "PATH", ":")
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub(crate) struct NextJsBuildpackMetadata {
    /// npm package of the build adapter, installed at the app's Next.js `major.minor`.
    pub(crate) adapter_package: String,
}

buildpack_main!(NextJsBuildpack);
