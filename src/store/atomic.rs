//! Directory moves that never expose a partially populated target.
//!
//! A move is a single `renameat` when source and target share a filesystem.
//! When the kernel reports a cross-device rename, the tree is copied into a
//! dot-prefixed sibling inside the target directory and that sibling is then
//! renamed into place, so the final step is still atomic for readers.

use std::io;
use std::sync::Arc;

use cap_std::fs_utf8::Dir;
use uuid::Uuid;

/// Errno for cross-device links on Linux and the BSDs.
const EXDEV: i32 = 18;

type RenameFn = dyn Fn(&Dir, &str, &Dir, &str) -> io::Result<()> + Send + Sync;

/// Moves directories between capability handles.
#[derive(Clone)]
pub(crate) struct DirectoryMover {
    rename: Arc<RenameFn>,
}

impl Default for DirectoryMover {
    fn default() -> Self {
        Self {
            rename: Arc::new(os_rename),
        }
    }
}

fn os_rename(from_dir: &Dir, from: &str, to_dir: &Dir, to: &str) -> io::Result<()> {
    from_dir.rename(from, to_dir, to)
}

impl std::fmt::Debug for DirectoryMover {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("DirectoryMover").finish_non_exhaustive()
    }
}

impl DirectoryMover {
    /// Uses `rename` in place of the `renameat` system call.
    #[cfg(test)]
    pub(crate) fn with_rename(
        rename: impl Fn(&Dir, &str, &Dir, &str) -> io::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            rename: Arc::new(rename),
        }
    }

    /// Moves `from_dir/from` to `to_dir/to`.
    ///
    /// `to` must not exist. On failure nothing appears under `to` and the
    /// source is left as it was.
    pub(crate) fn move_dir(
        &self,
        from_dir: &Dir,
        from: &str,
        to_dir: &Dir,
        to: &str,
    ) -> io::Result<()> {
        match (self.rename)(from_dir, from, to_dir, to) {
            Ok(()) => Ok(()),
            Err(error) if is_cross_device(&error) => {
                tracing::debug!("cross-device move of '{from}', copying into place");
                self.copy_then_rename(from_dir, from, to_dir, to)
            }
            Err(error) => Err(error),
        }
    }

    fn copy_then_rename(
        &self,
        from_dir: &Dir,
        from: &str,
        to_dir: &Dir,
        to: &str,
    ) -> io::Result<()> {
        let sibling = format!(".tmp-{to}-{}", Uuid::new_v4().simple());
        let committed = copy_tree(from_dir, from, to_dir, &sibling)
            .and_then(|()| (self.rename)(to_dir, &sibling, to_dir, to));

        if let Err(error) = committed {
            if let Err(cleanup) = remove_tree_if_present(to_dir, &sibling) {
                tracing::warn!("failed to remove partial copy '{sibling}': {cleanup}");
            }
            return Err(error);
        }

        if let Err(error) = from_dir.remove_dir_all(from) {
            tracing::warn!("moved '{from}' but could not remove the source copy: {error}");
        }
        Ok(())
    }
}

/// Removes `dir/name` recursively, treating a missing entry as success.
pub(crate) fn remove_tree_if_present(dir: &Dir, name: &str) -> io::Result<()> {
    match dir.remove_dir_all(name) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
        _ => Ok(()),
    }
}

fn is_cross_device(error: &io::Error) -> bool {
    error.raw_os_error() == Some(EXDEV)
}

fn copy_tree(from_dir: &Dir, from: &str, to_dir: &Dir, to: &str) -> io::Result<()> {
    let source = from_dir.open_dir(from)?;
    to_dir.create_dir(to)?;
    let target = to_dir.open_dir(to)?;
    copy_contents(&source, &target)
}

fn copy_contents(source: &Dir, target: &Dir) -> io::Result<()> {
    for entry_result in source.entries()? {
        let entry = entry_result?;
        let name = entry.file_name()?;
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            target.create_dir(&name)?;
            copy_contents(&source.open_dir(&name)?, &target.open_dir(&name)?)?;
        } else if file_type.is_file() {
            source.copy(&name, target, &name)?;
        } else {
            tracing::debug!("skipping special file '{name}' during cross-device copy");
        }
    }
    Ok(())
}
