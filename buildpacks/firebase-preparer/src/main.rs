mod env_file;
mod errors;
mod preparer;
mod secrets;

use crate::env_file::EnvVars;
use crate::errors::FirebasePreparerBuildpackError;
use crate::preparer::prepare;
use crate::secrets::GcloudSecretAccessor;
use commons::command::SystemCommandRunner;
use commons::log::{log_header, log_info};
use libcnb::build::{BuildContext, BuildResult, BuildResultBuilder};
use libcnb::data::layer_name;
use libcnb::detect::{DetectContext, DetectResult, DetectResultBuilder};
use libcnb::generic::{GenericMetadata, GenericPlatform};
use libcnb::layer::UncachedLayerDefinition;
use libcnb::layer_env::{LayerEnv, ModificationBehavior, Scope};
use libcnb::{buildpack_main, Buildpack, Env, Platform};

// Suppress warnings due to the `unused_crate_dependencies` lint not handling integration tests well.
#[cfg(test)]
use libcnb_test as _;

const APPHOSTING_ENV: &str = "apphosting.env";
const PROJECT_ID_ENV_VAR: &str = "GOOGLE_CLOUD_PROJECT";
const REFERENCED_ENV: &str = "referenced.env";
const DEREFERENCED_ENV: &str = "dereferenced.env";

pub(crate) struct FirebasePreparerBuildpack;

impl Buildpack for FirebasePreparerBuildpack {
    type Platform = GenericPlatform;
    type Metadata = GenericMetadata;
    type Error = FirebasePreparerBuildpackError;

    fn detect(&self, context: DetectContext<Self>) -> libcnb::Result<DetectResult, Self::Error> {
        if context.app_dir.join(APPHOSTING_ENV).is_file() {
            DetectResultBuilder::pass().build()
        } else {
            DetectResultBuilder::fail().build()
        }
    }

    fn build(&self, context: BuildContext<Self>) -> libcnb::Result<BuildResult, Self::Error> {
        log_header("App Hosting environment");

        // Secret values end up in this layer, so it is never exported or cached.
        let layer_ref = context.uncached_layer(
            layer_name!("apphosting-env"),
            UncachedLayerDefinition {
                build: true,
                launch: false,
            },
        )?;
        let layer_dir = layer_ref.path();

        let prepared = prepare(
            &context.app_dir.join(APPHOSTING_ENV),
            project_id(context.platform.env()).as_deref(),
            &layer_dir.join(REFERENCED_ENV),
            &layer_dir.join(DEREFERENCED_ENV),
            &GcloudSecretAccessor::new(&SystemCommandRunner),
        )
        .map_err(FirebasePreparerBuildpackError::Prepare)?;

        log_info(format!(
            "Exposing {} variables to the build: {}",
            prepared.dereferenced.len(),
            prepared
                .dereferenced
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ));
        layer_ref.write_env(build_env(&prepared.dereferenced))?;

        BuildResultBuilder::new().build()
    }

    fn on_error(&self, error: libcnb::Error<Self::Error>) {
        commons::error::on_error(error);
    }
}

fn project_id(env: &Env) -> Option<String> {
    env.get_string_lossy(PROJECT_ID_ENV_VAR)
        .map(|project_id| project_id.trim().to_string())
        .filter(|project_id| !project_id.is_empty())
}

fn build_env(vars: &EnvVars) -> LayerEnv {
    vars.iter().fold(LayerEnv::new(), |layer_env, (key, value)| {
        layer_env.chainable_insert(Scope::Build, ModificationBehavior::Override, key, value)
    })
}

buildpack_main!(FirebasePreparerBuildpack);
