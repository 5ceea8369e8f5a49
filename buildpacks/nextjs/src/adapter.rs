use commons::command::{CommandError, CommandOutput, CommandRunner};
use commons::log::{log_info, log_warning};
use commons::nodejs::{locked_version, LockfileError};
use commons::version::{major_minor, Sourced};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Directory inside the adapter layer that npm installs into.
pub(crate) const NPM_PREFIX: &str = "npm_modules";

/// The Next.js version the app is built with, as recorded in its lockfile.
///
/// Ranges from `package.json` aren't used: without a lockfile the build couldn't be reproduced.
pub(crate) fn nextjs_version(app_dir: &Path) -> Result<Sourced<String>, LockfileError> {
    locked_version(app_dir, "next")
}

/// Adapters are released per Next.js minor version, so `13.0.1-canary` maps to `13.0`.
pub(crate) fn adapter_version(nextjs_version: &str) -> Result<String, String> {
    major_minor(nextjs_version)
}

/// Directory with the executables of the installed adapter.
pub(crate) fn adapter_bin_dir(layer_dir: &Path) -> PathBuf {
    layer_dir.join(NPM_PREFIX).join("node_modules").join(".bin")
}

/// Installs `package` at `adapter_version` into the layer. Not every Next.js minor version has
/// a matching adapter release, so a failed install is retried once with the latest adapter.
pub(crate) fn install_adapter(
    runner: &dyn CommandRunner,
    layer_dir: &Path,
    package: &str,
    adapter_version: &str,
) -> Result<CommandOutput, CommandError> {
    npm_install(runner, layer_dir, &format!("{package}@{adapter_version}")).or_else(|error| {
        log_warning(
            format!("Couldn't install {package}@{adapter_version}"),
            format!("{error}\nFalling back to {package}@latest."),
        );
        npm_install(runner, layer_dir, &format!("{package}@latest"))
    })
}

fn npm_install(
    runner: &dyn CommandRunner,
    layer_dir: &Path,
    package_spec: &str,
) -> Result<CommandOutput, CommandError> {
    log_info(format!("Installing {package_spec}"));
    runner.run(
        Command::new("npm")
            .args(["install", "--prefix", NPM_PREFIX, package_spec])
            .current_dir(layer_dir),
    )
}
