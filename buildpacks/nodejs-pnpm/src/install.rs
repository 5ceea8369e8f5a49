use commons::command::{CommandError, CommandOutput, CommandRunner};
use commons::http::{Fetcher, HttpError};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(thiserror::Error, Debug)]
pub(crate) enum InstallPnpmError {
    #[error("Couldn't create {0}: {1}")]
    CreateBinDir(PathBuf, io::Error),

    #[error(transparent)]
    Download(#[from] HttpError),

    #[error("Couldn't make {0} executable: {1}")]
    SetPermissions(PathBuf, io::Error),
}

/// Downloads the standalone pnpm executable to `bin/pnpm` inside `layer_dir`.
pub(crate) fn install_pnpm(
    fetcher: &dyn Fetcher,
    binary_url: &str,
    layer_dir: &Path,
) -> Result<(), InstallPnpmError> {
    let bin_dir = layer_dir.join("bin");
    fs::create_dir_all(&bin_dir)
        .map_err(|error| InstallPnpmError::CreateBinDir(bin_dir.clone(), error))?;

    let pnpm = bin_dir.join("pnpm");
    fetcher.download(binary_url, &pnpm)?;
    fs::set_permissions(&pnpm, fs::Permissions::from_mode(0o755))
        .map_err(|error| InstallPnpmError::SetPermissions(pnpm, error))
}

/// Installs the app's dependencies with the pnpm from `pnpm_bin_dir`.
///
/// The lockfile must not change during the build when one is present.
pub(crate) fn pnpm_install(
    runner: &dyn CommandRunner,
    app_dir: &Path,
    pnpm_bin_dir: &Path,
) -> Result<CommandOutput, CommandError> {
    let mut command = Command::new("pnpm");
    command.arg("install").current_dir(app_dir);
    if app_dir.join("pnpm-lock.yaml").is_file() {
        command.arg("--frozen-lockfile");
    }
    if let Some(path) = prepend_path(pnpm_bin_dir, std::env::var_os("PATH")) {
        command.env("PATH", path);
    }

    runner.run(&mut command)
}

fn prepend_path(dir: &Path, path: Option<OsString>) -> Option<OsString> {
    let existing = path.unwrap_or_default();
    std::env::join_paths(
        std::iter::once(dir.to_path_buf()).chain(std::env::split_paths(&existing)),
    )
    .ok()
}
