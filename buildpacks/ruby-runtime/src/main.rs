mod errors;
mod gemfile_lock;
mod versions;

use crate::errors::RubyRuntimeBuildpackError;
use crate::gemfile_lock::GemfileLock;
use crate::versions::{resolve_ruby_version, RubyVersionIndex};
use commons::http::{render_url, UreqFetcher};
use commons::layer::{cached_version_layer, install_version_layer, LayerScope};
use commons::log::{log_header, log_info};
use commons::runtime::{runtime_version_override, RuntimeSelection};
use commons::tar::download_and_extract;
use libcnb::build::{BuildContext, BuildResult, BuildResultBuilder};
use libcnb::data::layer_name;
use libcnb::detect::{DetectContext, DetectResult, DetectResultBuilder};
use libcnb::generic::GenericPlatform;
use libcnb::{buildpack_main, Buildpack, Platform};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;

// Suppress warnings due to the `unused_crate_dependencies` lint not handling integration tests well.
#[cfg(test)]
use libcnb_test as _;

const GEMFILE_LOCK: &str = "Gemfile.lock";

pub(crate) struct RubyRuntimeBuildpack;

impl Buildpack for RubyRuntimeBuildpack {
    type Platform = GenericPlatform;
    type Metadata = RubyRuntimeBuildpackMetadata;
    type Error = RubyRuntimeBuildpackError;

    fn detect(&self, context: DetectContext<Self>) -> libcnb::Result<DetectResult, Self::Error> {
        let is_ruby_app = match RuntimeSelection::from_env(context.platform.env(), "ruby") {
            RuntimeSelection::Selected => true,
            RuntimeSelection::Excluded => false,
            RuntimeSelection::Unspecified => is_ruby_app(&context.app_dir)
                .map_err(RubyRuntimeBuildpackError::DetectRubyApp)?,
        };

        if is_ruby_app {
            DetectResultBuilder::pass().build()
        } else {
            DetectResultBuilder::fail().build()
        }
    }

    fn build(&self, context: BuildContext<Self>) -> libcnb::Result<BuildResult, Self::Error> {
        log_header("Ruby Runtime");

        let metadata = &context.buildpack_descriptor.metadata;
        let gemfile_lock = read_gemfile_lock(&context.app_dir)
            .map_err(RubyRuntimeBuildpackError::ReadGemfileLock)?;
        if let Some(bundler_version) = gemfile_lock
            .as_ref()
            .and_then(|lock| lock.bundler_version.as_deref())
        {
            log_info(format!("Gemfile.lock was bundled with Bundler {bundler_version}"));
        }

        let fetcher = UreqFetcher;
        let resolved = resolve_ruby_version(
            gemfile_lock.as_ref(),
            runtime_version_override(context.platform.env()),
            &RubyVersionIndex::new(&fetcher, &metadata.versions_url),
        )
        .map_err(RubyRuntimeBuildpackError::ResolveVersion)?;
        log_info(format!("Resolved Ruby version {resolved}"));

        let binary_url = render_url(&metadata.binary_url, &[("version", &resolved.version)]);
        let layer_ref = cached_version_layer(
            &context,
            layer_name!("ruby"),
            &resolved.version,
            LayerScope {
                build: true,
                launch: true,
            },
        )?;
        install_version_layer(&layer_ref, "Ruby", &resolved.version, |layer_dir| {
            download_and_extract(&fetcher, &binary_url, layer_dir, 0)
                .map_err(RubyRuntimeBuildpackError::InstallRuby)
        })?;

        BuildResultBuilder::new().build()
    }

    fn on_error(&self, error: libcnb::Error<Self::Error>) {
        commons::error::on_error(error);
    }
}

/// A Gemfile (either name), a `Gemfile.lock` or Ruby sources at the root.
fn is_ruby_app(app_dir: &Path) -> io::Result<bool> {
    if ["Gemfile", GEMFILE_LOCK, "gems.rb"]
        .iter()
        .any(|file| app_dir.join(file).is_file())
    {
        return Ok(true);
    }

    for entry in fs::read_dir(app_dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "rb") {
            return Ok(true);
        }
    }
    Ok(false)
}

fn read_gemfile_lock(app_dir: &Path) -> io::Result<Option<GemfileLock>> {
    match fs::read_to_string(app_dir.join(GEMFILE_LOCK)) {
        Ok(contents) => Ok(Some(GemfileLock::parse(&contents))),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub(crate) struct RubyRuntimeBuildpackMetadata {
    /// JSON array listing the available Ruby versions.
    pub(crate) versions_url: String,
    /// Download URL template with a `{version}` placeholder.
    pub(crate) binary_url: String,
}

buildpack_main!(RubyRuntimeBuildpack);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct BuildpackToml {
        metadata: RubyRuntimeBuildpackMetadata,
    }

    fn app_with(files: &[(&str, &str)]) -> tempfile::TempDir {
        let app_dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            let path = app_dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        app_dir
    }

    #[test]
    fn buildpack_toml_metadata_is_valid() {
        let buildpack_toml: BuildpackToml =
            toml::from_str(include_str!("../buildpack.toml")).unwrap();

        assert_eq!(
            render_url(
                &buildpack_toml.metadata.binary_url,
                &[("version", "3.0.3")]
            ),
            "https://dl.google.com/runtimes/ubuntu2204/ruby/ruby-3.0.3.tar.gz"
        );
    }

    #[test]
    fn detects_ruby_apps() {
        for file in ["Gemfile", "Gemfile.lock", "gems.rb", "main.rb"] {
            assert!(
                is_ruby_app(app_with(&[(file, "")]).path()).unwrap(),
                "{file}"
            );
        }
    }

    #[test]
    fn nested_ruby_sources_are_not_enough() {
        let app_dir = app_with(&[("scripts/release.rb", ""), ("index.js", "")]);

        assert!(!is_ruby_app(app_dir.path()).unwrap());
    }

    #[test]
    fn gemfile_lock_is_optional() {
        let app_dir = app_with(&[("Gemfile", "source 'https://rubygems.org'\n")]);

        assert_eq!(read_gemfile_lock(app_dir.path()).unwrap(), None);
    }

    #[test]
    fn reads_gemfile_lock() {
        let app_dir = app_with(&[(
            "Gemfile.lock",
            "RUBY VERSION\n   ruby 3.0.3p157\n\nBUNDLED WITH\n   2.2.32\n",
        )]);

        let lock = read_gemfile_lock(app_dir.path()).unwrap().unwrap();

        assert_eq!(lock.ruby_version.as_deref(), Some("3.0.3"));
    }
}
