//! Cache layers keyed by the version of what they contain.
//!
//! A layer restored from a previous build is reused only if the version recorded in its metadata
//! is exactly the version resolved for the current build. In every other case the layer is
//! emptied, the artifact installed again and the metadata rewritten.

use crate::log::log_info;
use libcnb::build::BuildContext;
use libcnb::data::layer::LayerName;
use libcnb::layer::{
    CachedLayerDefinition, EmptyLayerCause, InvalidMetadataAction, LayerRef, LayerState,
    RestoredLayerAction,
};
use libcnb::Buildpack;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Layer metadata recording which version a layer contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    pub version: String,
}

/// Which phases a layer is made available to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerScope {
    pub build: bool,
    pub launch: bool,
}

/// Decides whether a restored layer can be kept for the wanted version.
pub fn restored_layer_action(
    metadata: &VersionMetadata,
    wanted_version: &str,
) -> RestoredLayerAction {
    if metadata.version == wanted_version {
        RestoredLayerAction::KeepLayer
    } else {
        RestoredLayerAction::DeleteLayer
    }
}

/// Creates or restores the named cached layer for `version`.
///
/// Layers with unreadable metadata or a different version are deleted and come back empty.
pub fn cached_version_layer<B: Buildpack>(
    context: &BuildContext<B>,
    name: LayerName,
    version: &str,
    scope: LayerScope,
) -> libcnb::Result<LayerRef<B, (), ()>, B::Error> {
    context.cached_layer(
        name,
        CachedLayerDefinition {
            build: scope.build,
            launch: scope.launch,
            invalid_metadata_action: &|_| InvalidMetadataAction::DeleteLayer,
            restored_layer_action: &|metadata: &VersionMetadata, _: &Path| {
                restored_layer_action(metadata, version)
            },
        },
    )
}

/// Fills an empty version layer by calling `install` with the layer directory, then records
/// `version` in the layer metadata. Restored layers are left untouched.
///
/// The metadata is only written after `install` succeeded, so a failed install is never mistaken
/// for a cached one.
pub fn install_version_layer<B, F>(
    layer_ref: &LayerRef<B, (), ()>,
    label: &str,
    version: &str,
    install: F,
) -> libcnb::Result<(), B::Error>
where
    B: Buildpack,
    F: FnOnce(&Path) -> Result<(), B::Error>,
{
    match &layer_ref.state {
        LayerState::Restored { .. } => {
            log_info(format!("Reusing cached {label} {version}"));
            Ok(())
        }
        LayerState::Empty { cause } => {
            match cause {
                EmptyLayerCause::NewlyCreated => {
                    log_info(format!("Installing {label} {version}"));
                }
                EmptyLayerCause::InvalidMetadataAction { .. } => {
                    log_info(format!(
                        "Installing {label} {version} (cached layer metadata was unreadable)"
                    ));
                }
                EmptyLayerCause::RestoredLayerAction { .. } => {
                    log_info(format!(
                        "Installing {label} {version} (cached layer held a different version)"
                    ));
                }
            }

            install(layer_ref.path().as_path()).map_err(libcnb::Error::BuildpackError)?;
            layer_ref.write_metadata(VersionMetadata {
                version: version.to_string(),
            })?;
            Ok(())
        }
    }
}
