use std::fs;
use std::io;
use std::path::Path;

const BUILD_FILES: [&str; 3] = ["pom.xml", "build.gradle", "build.gradle.kts"];

/// Whether the app looks like a Java app: a Maven or Gradle build file, a jar at the root or Java
/// sources anywhere outside hidden directories.
pub(crate) fn is_java_app(app_dir: &Path) -> io::Result<bool> {
    if BUILD_FILES
        .iter()
        .any(|build_file| app_dir.join(build_file).is_file())
    {
        return Ok(true);
    }

    if has_file_with_extension(app_dir, "jar")? {
        return Ok(true);
    }

    contains_java_sources(app_dir)
}

fn has_file_with_extension(dir: &Path, extension: &str) -> io::Result<bool> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn contains_java_sources(dir: &Path) -> io::Result<bool> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_dir() {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            if contains_java_sources(&path)? {
                return Ok(true);
            }
        } else if path.extension().is_some_and(|ext| ext == "java") {
            return Ok(true);
        }
    }
    Ok(false)
}
