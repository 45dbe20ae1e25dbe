//! Gzip-compressed tar extraction.

use std::fs::File;
use std::io;

use camino::Utf8Path;
use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::PreviewError;

/// Unpacks every entry of `archive` below `dest` and returns the entry
/// count. Entries whose paths would land outside `dest` are rejected.
pub(super) fn extract_tgz(archive: File, dest: &Utf8Path) -> Result<usize, PreviewError> {
    let corrupt = |detail: String| PreviewError::CorruptArtifact { message: detail };

    let mut tar = Archive::new(GzDecoder::new(archive));
    let entries = tar
        .entries()
        .map_err(|error| corrupt(format!("unreadable archive: {error}")))?;

    let mut count = 0_usize;
    for entry_result in entries {
        let mut entry =
            entry_result.map_err(|error| corrupt(format!("unreadable entry: {error}")))?;
        let unpacked = entry.unpack_in(dest).map_err(|error| {
            corrupt(format!("extracting into '{dest}' failed: {error}"))
        })?;
        if !unpacked {
            let name = entry
                .path()
                .map(|path| path.display().to_string())
                .unwrap_or_default();
            return Err(corrupt(format!("entry '{name}' escapes the staging directory")));
        }
        count += 1;
    }

    if count == 0 {
        return Err(corrupt("archive contains no entries".to_owned()));
    }
    Ok(count)
}

/// Opens up the staging root, which is created owner-only, so the web
/// server can traverse it once published.
#[cfg(unix)]
pub(super) fn make_servable(root: &Utf8Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(root, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
pub(super) fn make_servable(_root: &Utf8Path) -> io::Result<()> {
    Ok(())
}
