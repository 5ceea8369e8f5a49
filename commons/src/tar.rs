use crate::http::{Fetcher, HttpError};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("Couldn't download archive: {0}")]
    Download(#[from] HttpError),

    #[error("Couldn't create temporary file for download: {0}")]
    TempFile(io::Error),

    #[error("Error reading archive entries: {0}")]
    Entries(io::Error),

    #[error("Error reading archive entry: {0}")]
    Entry(io::Error),

    #[error("Archive entry {0} escapes the destination directory")]
    UnsafePath(PathBuf),

    #[error("Error writing archive entry {0}: {1}")]
    Unpack(PathBuf, io::Error),
}

/// Extracts a gzipped tarball into `destination`, dropping the first `strip_components` path
/// components of every entry (like `tar --strip-components`).
///
/// Entries that have no path left after stripping are skipped.
pub fn extract_tarball(
    reader: impl Read,
    destination: &Path,
    strip_components: usize,
) -> Result<(), ExtractError> {
    let mut archive = Archive::new(GzDecoder::new(reader));
    archive.set_preserve_permissions(true);

    for entry in archive.entries().map_err(ExtractError::Entries)? {
        let mut entry = entry.map_err(ExtractError::Entry)?;
        let path = entry.path().map_err(ExtractError::Entry)?.into_owned();

        let Some(relative_path) = strip_path(&path, strip_components)? else {
            continue;
        };

        if has_symlink_parent(destination, &relative_path) {
            return Err(ExtractError::UnsafePath(path));
        }

        let target_path = destination.join(&relative_path);
        if let Some(parent) = target_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| ExtractError::Unpack(relative_path.clone(), error))?;
        }

        entry
            .unpack(&target_path)
            .map_err(|error| ExtractError::Unpack(relative_path, error))?;
    }

    Ok(())
}

/// Downloads a gzipped tarball to a temporary file and extracts it into `destination`.
pub fn download_and_extract(
    fetcher: &dyn Fetcher,
    url: &str,
    destination: &Path,
    strip_components: usize,
) -> Result<(), ExtractError> {
    let tarball = tempfile::NamedTempFile::new().map_err(ExtractError::TempFile)?;
    fetcher.download(url, tarball.path())?;

    let file = File::open(tarball.path()).map_err(ExtractError::TempFile)?;
    extract_tarball(file, destination, strip_components)
}

// Symlinks in the archive may point anywhere, so nothing is written through an already extracted
// one.
fn has_symlink_parent(destination: &Path, relative_path: &Path) -> bool {
    relative_path
        .ancestors()
        .skip(1)
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .any(|ancestor| {
            std::fs::symlink_metadata(destination.join(ancestor))
                .is_ok_and(|metadata| metadata.file_type().is_symlink())
        })
}

fn strip_path(path: &Path, strip_components: usize) -> Result<Option<PathBuf>, ExtractError> {
    let mut components = path
        .components()
        .filter(|component| !matches!(component, Component::CurDir));

    for _ in 0..strip_components {
        if components.next().is_none() {
            return Ok(None);
        }
    }

    let stripped = components.collect::<PathBuf>();
    if stripped.as_os_str().is_empty() {
        return Ok(None);
    }

    if stripped
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(ExtractError::UnsafePath(path.to_path_buf()));
    }

    Ok(Some(stripped))
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    /// Builds an in-memory `.tar.gz` containing the given `(path, contents)` files, all with mode
    /// `0755`.
    ///
    /// # Panics
    ///
    /// Panics if the archive can't be assembled, which only happens for invalid paths.
    #[allow(clippy::unwrap_used)]
    pub fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, path, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }
}
