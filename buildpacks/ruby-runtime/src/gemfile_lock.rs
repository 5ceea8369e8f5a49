/// The parts of a `Gemfile.lock` relevant for installing Ruby.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct GemfileLock {
    /// From the `RUBY VERSION` section, without the patch level (`ruby 3.0.3p157` is `3.0.3`).
    pub(crate) ruby_version: Option<String>,
    /// From the `BUNDLED WITH` section.
    pub(crate) bundler_version: Option<String>,
}

impl GemfileLock {
    pub(crate) fn parse(contents: &str) -> Self {
        let mut lock = GemfileLock::default();
        let mut section = "";

        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if !line.starts_with(char::is_whitespace) {
                section = line.trim();
                continue;
            }

            let value = line.trim();
            match section {
                "RUBY VERSION" if lock.ruby_version.is_none() => {
                    lock.ruby_version = value
                        .strip_prefix("ruby ")
                        .map(|version| strip_patch_level(version.trim()).to_string());
                }
                "BUNDLED WITH" if lock.bundler_version.is_none() => {
                    lock.bundler_version = Some(value.to_string());
                }
                _ => {}
            }
        }

        lock
    }
}

fn strip_patch_level(version: &str) -> &str {
    match version.split_once('p') {
        Some((version, patch_level))
            if !patch_level.is_empty() && patch_level.chars().all(|c| c.is_ascii_digit()) =>
        {
            version
        }
        _ => version,
    }
}
