use crate::version::Sourced;
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use std::fmt::{self, Display, Formatter};
use std::path::Path;

/// The lockfiles of the supported package managers, in the order they are looked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lockfile {
    PackageLock,
    YarnLock,
    PnpmLock,
}

impl Lockfile {
    pub const ALL: [Lockfile; 3] = [Lockfile::PackageLock, Lockfile::YarnLock, Lockfile::PnpmLock];

    pub fn file_name(self) -> &'static str {
        match self {
            Lockfile::PackageLock => "package-lock.json",
            Lockfile::YarnLock => "yarn.lock",
            Lockfile::PnpmLock => "pnpm-lock.yaml",
        }
    }

    /// The first lockfile present in the application directory.
    pub fn detect(app_dir: &Path) -> Option<Lockfile> {
        Lockfile::ALL
            .into_iter()
            .find(|lockfile| app_dir.join(lockfile.file_name()).is_file())
    }
}

impl Display for Lockfile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LockfileError {
    #[error("No lockfile found, expected one of package-lock.json, yarn.lock or pnpm-lock.yaml")]
    NoLockfile,

    #[error("{lockfile} doesn't contain an entry for {package}")]
    MissingEntry { lockfile: Lockfile, package: String },

    #[error("Couldn't read {lockfile}: {detail}")]
    Malformed { lockfile: Lockfile, detail: String },
}

/// The exact version of `package` recorded in the application's lockfile.
///
/// Only the first lockfile found is consulted. The origin of the result names that lockfile.
pub fn locked_version(app_dir: &Path, package: &str) -> Result<Sourced<String>, LockfileError> {
    let lockfile = Lockfile::detect(app_dir).ok_or(LockfileError::NoLockfile)?;
    let contents = std::fs::read_to_string(app_dir.join(lockfile.file_name())).map_err(|error| {
        LockfileError::Malformed {
            lockfile,
            detail: error.to_string(),
        }
    })?;

    let version = match lockfile {
        Lockfile::PackageLock => package_lock_version(&contents, package),
        Lockfile::YarnLock => Ok(yarn_lock_version(&contents, package)),
        Lockfile::PnpmLock => pnpm_lock_version(&contents, package),
    }
    .map_err(|detail| LockfileError::Malformed { lockfile, detail })?;

    version
        .map(|version| Sourced::new(version, lockfile.file_name()))
        .ok_or_else(|| LockfileError::MissingEntry {
            lockfile,
            package: package.to_string(),
        })
}

fn package_lock_version(contents: &str, package: &str) -> Result<Option<String>, String> {
    let lock: JsonValue = serde_json::from_str(contents).map_err(|error| error.to_string())?;

    // lockfileVersion 2 and 3 key packages by their install path, version 1 by name.
    let version = lock
        .get("packages")
        .and_then(|packages| packages.get(format!("node_modules/{package}")))
        .or_else(|| {
            lock.get("dependencies")
                .and_then(|dependencies| dependencies.get(package))
        })
        .and_then(|entry| entry.get("version"))
        .and_then(JsonValue::as_str)
        .map(ToString::to_string);

    Ok(version)
}

/// Yarn classic lockfiles aren't YAML and Yarn berry lockfiles are often indented with tabs, so
/// both are read line by line.
fn yarn_lock_version(contents: &str, package: &str) -> Option<String> {
    let mut in_entry = false;

    for line in contents.lines() {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        if !line.starts_with([' ', '\t']) {
            in_entry = line
                .trim_end()
                .strip_suffix(':')
                .is_some_and(|header| header_declares(header, package));
            continue;
        }

        if in_entry {
            if let Some(version) = yarn_version_line(line.trim()) {
                return Some(version);
            }
        }
    }

    None
}

fn header_declares(header: &str, package: &str) -> bool {
    header
        .split(',')
        .map(|descriptor| descriptor.trim().trim_matches('"'))
        .any(|descriptor| descriptor_name(descriptor) == Some(package))
}

/// The package name of a descriptor such as `next@^13.1.0`, `next@npm:^13.1.0` or
/// `@babel/core@^7.0.0`.
fn descriptor_name(descriptor: &str) -> Option<&str> {
    let separator = descriptor.get(1..)?.find('@')? + 1;
    Some(&descriptor[..separator])
}

fn yarn_version_line(line: &str) -> Option<String> {
    let rest = line.strip_prefix("version")?;
    let value = rest
        .strip_prefix(':')
        .or_else(|| rest.starts_with([' ', '\t']).then_some(rest))?
        .trim()
        .trim_matches('"');

    (!value.is_empty()).then(|| value.to_string())
}

fn pnpm_lock_version(contents: &str, package: &str) -> Result<Option<String>, String> {
    let lock: YamlValue = serde_yaml::from_str(contents).map_err(|error| error.to_string())?;

    let root_importer = lock
        .get("importers")
        .and_then(|importers| importers.get("."));

    let version = [Some(&lock), root_importer]
        .into_iter()
        .flatten()
        .flat_map(|section| ["dependencies", "devDependencies"].map(|key| section.get(key)))
        .flatten()
        .filter_map(|dependencies| dependencies.get(package))
        .find_map(pnpm_entry_version);

    Ok(version)
}

/// Entries are either a plain version string or a mapping with a `version` key. Both may carry a
/// peer dependency suffix, `13.5.6(@babel/core@7.23.9)` since lockfile v6 and
/// `13.4.19_react@18.2.0` before.
fn pnpm_entry_version(entry: &YamlValue) -> Option<String> {
    let raw = match entry {
        YamlValue::String(version) => version.as_str(),
        YamlValue::Mapping(_) => entry.get("version")?.as_str()?,
        _ => return None,
    };

    let version = raw.split(['(', '_']).next().unwrap_or_default().trim();
    (!version.is_empty()).then(|| version.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::fs;

    fn app_with(files: &[(&str, &str)]) -> tempfile::TempDir {
        let app_dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            fs::write(app_dir.path().join(name), contents).unwrap();
        }
        app_dir
    }

    #[test]
    fn no_lockfile() {
        let app_dir = app_with(&[("package.json", "{}")]);

        assert!(matches!(
            locked_version(app_dir.path(), "next"),
            Err(LockfileError::NoLockfile)
        ));
    }

    #[test]
    fn package_lock() {
        let app_dir = app_with(&[(
            "package-lock.json",
            indoc! {r#"
                {
                  "packages": {
                    "node_modules/next": {
                      "version": "13.5.6"
                    }
                  }
                }
            "#},
        )]);

        let version = locked_version(app_dir.path(), "next").unwrap();

        assert_eq!(version.value, "13.5.6");
        assert_eq!(version.origin, "package-lock.json");
    }

    #[test]
    fn package_lock_v1() {
        let app_dir = app_with(&[(
            "package-lock.json",
            r#"{"lockfileVersion": 1, "dependencies": {"next": {"version": "12.3.4"}}}"#,
        )]);

        assert_eq!(
            locked_version(app_dir.path(), "next").unwrap().value,
            "12.3.4"
        );
    }

    #[test]
    fn package_lock_without_entry() {
        let app_dir = app_with(&[("package-lock.json", r#"{"packages": {"": {}}}"#)]);

        assert!(matches!(
            locked_version(app_dir.path(), "next"),
            Err(LockfileError::MissingEntry { lockfile: Lockfile::PackageLock, ref package }) if package == "next"
        ));
    }

    #[test]
    fn malformed_package_lock() {
        let app_dir = app_with(&[("package-lock.json", "{")]);

        assert!(matches!(
            locked_version(app_dir.path(), "next"),
            Err(LockfileError::Malformed {
                lockfile: Lockfile::PackageLock,
                ..
            })
        ));
    }

    #[test]
    fn yarn_berry() {
        let app_dir = app_with(&[("yarn.lock", "\n\"next@npm:^13.1.0\":\n\tversion: 13.5.6")]);

        assert_eq!(
            locked_version(app_dir.path(), "next").unwrap().value,
            "13.5.6"
        );
    }

    #[test]
    fn yarn_classic() {
        let app_dir = app_with(&[("yarn.lock", "\nnext@^13.1.0:\n\tversion: \"13.5.6\"\n\t\t\t\t")]);

        let version = locked_version(app_dir.path(), "next").unwrap();

        assert_eq!(version.value, "13.5.6");
        assert_eq!(version.origin, "yarn.lock");
    }

    #[test]
    fn yarn_classic_with_multiple_descriptors() {
        let app_dir = app_with(&[(
            "yarn.lock",
            indoc! {r#"
                # THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
                # yarn lockfile v1


                "@next/env@13.5.6":
                  version "13.5.6"
                  resolved "https://registry.yarnpkg.com/@next/env/-/env-13.5.6.tgz"

                next-tick@^1.1.0:
                  version "1.1.0"

                next@^13.1.0, "next@>= 13":
                  version "13.5.4"
                  resolved "https://registry.yarnpkg.com/next/-/next-13.5.4.tgz"
                  dependencies:
                    "@next/env" "13.5.6"
            "#},
        )]);

        assert_eq!(
            locked_version(app_dir.path(), "next").unwrap().value,
            "13.5.4"
        );
        assert_eq!(
            locked_version(app_dir.path(), "@next/env").unwrap().value,
            "13.5.6"
        );
    }

    #[test]
    fn yarn_without_entry() {
        let app_dir = app_with(&[("yarn.lock", "react@^18.0.0:\n  version \"18.2.0\"\n")]);

        assert!(matches!(
            locked_version(app_dir.path(), "next"),
            Err(LockfileError::MissingEntry {
                lockfile: Lockfile::YarnLock,
                ..
            })
        ));
    }

    #[test]
    fn pnpm_with_peer_suffix() {
        let app_dir = app_with(&[(
            "pnpm-lock.yaml",
            "\ndependencies:\n  next:\n    version: 13.5.6(@babel/core@7.23.9)\n\n",
        )]);

        let version = locked_version(app_dir.path(), "next").unwrap();

        assert_eq!(version.value, "13.5.6");
        assert_eq!(version.origin, "pnpm-lock.yaml");
    }

    #[test]
    fn pnpm_v5_plain_string_entries() {
        let app_dir = app_with(&[(
            "pnpm-lock.yaml",
            indoc! {"
                lockfileVersion: 5.4
                devDependencies:
                  next: 13.4.19_react@18.2.0
                  typescript: 5.3.3
            "},
        )]);

        assert_eq!(
            locked_version(app_dir.path(), "typescript").unwrap().value,
            "5.3.3"
        );
        assert_eq!(
            locked_version(app_dir.path(), "next").unwrap().value,
            "13.4.19"
        );
    }

    #[test]
    fn pnpm_importers() {
        let app_dir = app_with(&[(
            "pnpm-lock.yaml",
            indoc! {"
                lockfileVersion: '9.0'
                importers:
                  .:
                    dependencies:
                      next:
                        specifier: ^14.0.0
                        version: 14.1.0(react-dom@18.2.0)(react@18.2.0)
            "},
        )]);

        assert_eq!(
            locked_version(app_dir.path(), "next").unwrap().value,
            "14.1.0"
        );
    }

    #[test]
    fn prefers_package_lock() {
        let app_dir = app_with(&[
            ("yarn.lock", "next@^13.1.0:\n  version \"13.0.0\"\n"),
            (
                "package-lock.json",
                r#"{"packages": {"node_modules/next": {"version": "13.5.6"}}}"#,
            ),
        ]);

        assert_eq!(Lockfile::detect(app_dir.path()), Some(Lockfile::PackageLock));
        assert_eq!(
            locked_version(app_dir.path(), "next").unwrap().value,
            "13.5.6"
        );
    }
}
