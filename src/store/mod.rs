//! On-disk store of preview builds.
//!
//! [`BuildStore`] is the single source of truth for what is servable. It
//! never caches existence in memory: every operation re-reads the
//! filesystem. Mutations of one pull request are serialized through a keyed
//! lock while unrelated pull requests proceed in parallel.

mod atomic;
mod layout;
mod locks;

use std::io;
use std::sync::Arc;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use uuid::Uuid;

pub use layout::BuildKey;

use crate::error::PreviewError;
use crate::events::{EventEmitter, LifecycleEvent};

use atomic::{DirectoryMover, remove_tree_if_present};
use layout::{HIDDEN_DIR, PUBLIC_DIR, TRASH_PREFIX, subtree_name, validate_pr};
use locks::PrLocks;

/// One stored build artifact for a `(pull request, commit)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewBuild {
    /// Pull request number.
    pub pr: u64,
    /// Commit identifier.
    pub sha: String,
    /// Whether the build is served from the public subtree.
    pub is_public: bool,
    /// Directory holding the unpacked artifact contents.
    pub content_root: Utf8PathBuf,
}

/// A build found while scanning both subtrees.
#[derive(Debug)]
struct Located {
    key: BuildKey,
    is_public: bool,
    modified: Option<SystemTime>,
}

/// One subtree entry as read from the directory listing.
struct ListedEntry {
    /// `None` for names that are not valid UTF-8.
    name: Option<String>,
    modified: Option<SystemTime>,
}

/// Picks the builds of `pr` out of one subtree listing.
///
/// Any failed read fails the whole listing.
fn builds_of(
    pr: u64,
    is_public: bool,
    entries: impl IntoIterator<Item = io::Result<ListedEntry>>,
) -> io::Result<Vec<Located>> {
    let mut located = Vec::new();
    for entry in entries {
        let ListedEntry { name, modified } = entry?;
        let Some(key) = name.as_deref().and_then(BuildKey::parse_dir_name) else {
            continue;
        };
        if key.pr() == pr {
            located.push(Located {
                key,
                is_public,
                modified,
            });
        }
    }
    Ok(located)
}

/// A build moved aside while its replacement is committed.
struct Trashed {
    is_public: bool,
    name: String,
}

/// Owns the `public/` and `hidden/` subtrees under the builds root.
#[derive(Debug)]
pub struct BuildStore {
    tree: Arc<Subtrees>,
    locks: PrLocks,
    events: EventEmitter,
}

/// Filesystem handles shared with blocking commit tasks.
#[derive(Debug)]
struct Subtrees {
    root: Utf8PathBuf,
    public: Dir,
    hidden: Dir,
    mover: DirectoryMover,
}

impl BuildStore {
    /// Opens the store rooted at `root`, creating both subtrees if needed.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Storage`] when the directories cannot be
    /// created or opened.
    pub fn open(root: &Utf8Path, events: EventEmitter) -> Result<Self, PreviewError> {
        Self::open_with_mover(root, events, DirectoryMover::default())
    }

    fn open_with_mover(
        root: &Utf8Path,
        events: EventEmitter,
        mover: DirectoryMover,
    ) -> Result<Self, PreviewError> {
        let operation = || format!("opening build store '{root}'");
        std::fs::create_dir_all(root).map_err(|error| PreviewError::storage(operation(), &error))?;
        let root_dir = Dir::open_ambient_dir(root, ambient_authority())
            .map_err(|error| PreviewError::storage(operation(), &error))?;

        let open_subtree = |name: &str| {
            root_dir
                .create_dir_all(name)
                .and_then(|()| root_dir.open_dir(name))
                .map_err(|error| PreviewError::storage(operation(), &error))
        };

        let tree = Subtrees {
            root: root.to_owned(),
            public: open_subtree(PUBLIC_DIR)?,
            hidden: open_subtree(HIDDEN_DIR)?,
            mover,
        };
        Ok(Self {
            tree: Arc::new(tree),
            locks: PrLocks::default(),
            events,
        })
    }

    /// Builds root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.tree.root
    }

    /// Stores the staged content as the build for `(pr, sha)`.
    ///
    /// The staged directory is moved, not copied, into the subtree matching
    /// `is_public`. An existing build of the same pair in either subtree is
    /// superseded entirely. On success a [`LifecycleEvent::BuildCreated`] is
    /// emitted. On any failure the staged content is removed and the store
    /// is left as it was.
    ///
    /// Once the PR lock is taken the commit runs to completion on the
    /// blocking thread pool, even if the returned future is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::InvalidInput`] for a zero PR or malformed
    /// commit and [`PreviewError::Storage`] when a filesystem step fails.
    pub async fn create(
        &self,
        pr: u64,
        sha: &str,
        staged_root: &Utf8Path,
        is_public: bool,
    ) -> Result<PreviewBuild, PreviewError> {
        let key = match BuildKey::new(pr, sha) {
            Ok(key) => key,
            Err(error) => {
                discard_staged(staged_root);
                return Err(error);
            }
        };

        let guard = self.locks.lock(pr).await;
        let tree = Arc::clone(&self.tree);
        let events = self.events.clone();
        let staged = staged_root.to_owned();
        let operation = format!("creating build {}", key.dir_name());

        // The PR stays locked until the commit finishes, even if the caller
        // is cancelled.
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let result = tree.commit_build(&key, &staged, is_public);
            if result.is_err() {
                discard_staged(&staged);
            }
            let build = result?;

            tracing::info!(
                pr = build.pr,
                sha = %build.sha,
                is_public,
                "stored preview build at '{}'",
                build.content_root
            );
            events.emit(LifecycleEvent::BuildCreated {
                pr: build.pr,
                sha: build.sha.clone(),
                is_public,
            });
            Ok(build)
        })
        .await
        .map_err(|error| PreviewError::blocking_task(operation, &error))?
    }

    /// Moves every build of `pr` into the subtree matching `is_public`.
    ///
    /// Returns `None`, without emitting an event, when the PR has no builds.
    /// Otherwise returns every commit of the PR in discovery order, whether
    /// it had to move or was already in place, and emits one
    /// [`LifecycleEvent::VisibilityChanged`] listing them.
    ///
    /// Moves stop at the first failure. Builds handled before it keep their
    /// new location and are reported in the emitted event; the error tells
    /// the caller the rest were not processed.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::InvalidInput`] for PR zero and
    /// [`PreviewError::Storage`] when scanning or a move fails.
    pub async fn update_pr_visibility(
        &self,
        pr: u64,
        is_public: bool,
    ) -> Result<Option<Vec<String>>, PreviewError> {
        validate_pr(pr)?;
        let _guard = self.locks.lock(pr).await;

        let located = self.tree.scan(pr)?;
        if located.is_empty() {
            tracing::debug!(pr, "no builds to update");
            return Ok(None);
        }

        let target = self.tree.subtree(is_public);
        let mut settled = Vec::with_capacity(located.len());
        let mut failure = None;

        for build in located {
            if build.is_public != is_public {
                let name = build.key.dir_name();
                let moved = self.tree.mover.move_dir(
                    self.tree.subtree(build.is_public),
                    &name,
                    target,
                    &name,
                );
                if let Err(error) = moved {
                    failure = Some(PreviewError::storage(
                        format!("moving {name} to {}/", subtree_name(is_public)),
                        &error,
                    ));
                    break;
                }
            }
            settled.push(build.key.sha().to_owned());
        }

        if !settled.is_empty() {
            tracing::info!(pr, is_public, shas = ?settled, "updated preview visibility");
            self.events.emit(LifecycleEvent::VisibilityChanged {
                pr,
                shas: settled.clone(),
                is_public,
            });
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(Some(settled)),
        }
    }

    /// Deletes every build of `pr` from both subtrees.
    ///
    /// Returns the removed commits. Removing a PR without builds succeeds
    /// with an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::InvalidInput`] for PR zero and
    /// [`PreviewError::Storage`] when scanning or removal fails.
    pub async fn remove_pr(&self, pr: u64) -> Result<Vec<String>, PreviewError> {
        validate_pr(pr)?;
        let _guard = self.locks.lock(pr).await;

        let mut removed = Vec::new();
        for build in self.tree.scan(pr)? {
            let name = build.key.dir_name();
            let trashed = self.tree.trash(build.is_public, &name).map_err(|error| {
                PreviewError::storage(format!("removing {name}"), &error)
            })?;
            self.tree.purge(&trashed);
            removed.push(build.key.sha().to_owned());
        }

        if !removed.is_empty() {
            tracing::info!(pr, shas = ?removed, "removed preview builds");
        }
        Ok(removed)
    }

    /// Lists the builds of `pr` as currently found on disk.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::InvalidInput`] for PR zero and
    /// [`PreviewError::Storage`] when a subtree cannot be read.
    pub fn builds(&self, pr: u64) -> Result<Vec<PreviewBuild>, PreviewError> {
        validate_pr(pr)?;
        Ok(self
            .tree
            .scan(pr)?
            .into_iter()
            .map(|build| {
                let name = build.key.dir_name();
                PreviewBuild {
                    pr,
                    sha: build.key.sha().to_owned(),
                    is_public: build.is_public,
                    content_root: self.tree.content_root(&name, build.is_public),
                }
            })
            .collect())
    }
}

impl Subtrees {
    fn commit_build(
        &self,
        key: &BuildKey,
        staged_root: &Utf8Path,
        is_public: bool,
    ) -> Result<PreviewBuild, PreviewError> {
        let name = key.dir_name();
        let operation = || {
            format!(
                "creating build {name} in {}/",
                subtree_name(is_public)
            )
        };

        let (staged_parent, staged_name) =
            open_parent(staged_root).map_err(|error| PreviewError::storage(operation(), &error))?;

        let trashed = self.trash_existing(&name)?;

        if let Err(error) =
            self.mover
                .move_dir(&staged_parent, staged_name, self.subtree(is_public), &name)
        {
            for item in &trashed {
                self.restore(item, &name);
            }
            return Err(PreviewError::storage(operation(), &error));
        }

        for item in &trashed {
            self.purge(item);
        }

        Ok(PreviewBuild {
            pr: key.pr(),
            sha: key.sha().to_owned(),
            is_public,
            content_root: self.content_root(&name, is_public),
        })
    }

    const fn subtree(&self, is_public: bool) -> &Dir {
        if is_public { &self.public } else { &self.hidden }
    }

    fn content_root(&self, name: &str, is_public: bool) -> Utf8PathBuf {
        self.root.join(subtree_name(is_public)).join(name)
    }

    /// Finds the builds of `pr`, ordered by modification time then commit.
    fn scan(&self, pr: u64) -> Result<Vec<Located>, PreviewError> {
        let mut located = Vec::new();
        for is_public in [true, false] {
            let listing = || format!("listing {}/", subtree_name(is_public));
            let entries = self
                .subtree(is_public)
                .entries()
                .map_err(|error| PreviewError::storage(listing(), &error))?;

            let listed = entries.map(|entry_result| {
                entry_result.map(|entry| ListedEntry {
                    name: entry.file_name().ok(),
                    modified: entry
                        .metadata()
                        .and_then(|metadata| metadata.modified())
                        .map(cap_std::time::SystemTime::into_std)
                        .ok(),
                })
            });
            located.extend(
                builds_of(pr, is_public, listed)
                    .map_err(|error| PreviewError::storage(listing(), &error))?,
            );
        }

        located.sort_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.key.sha().cmp(b.key.sha()))
        });
        Ok(located)
    }

    /// Moves any existing build named `name` out of both subtrees.
    fn trash_existing(&self, name: &str) -> Result<Vec<Trashed>, PreviewError> {
        let mut trashed = Vec::new();
        for is_public in [true, false] {
            if !self.subtree(is_public).exists(name) {
                continue;
            }
            match self.trash(is_public, name) {
                Ok(item) => trashed.push(item),
                Err(error) => {
                    for item in &trashed {
                        self.restore(item, name);
                    }
                    return Err(PreviewError::storage(
                        format!("replacing existing build {name}"),
                        &error,
                    ));
                }
            }
        }
        Ok(trashed)
    }

    fn trash(&self, is_public: bool, name: &str) -> io::Result<Trashed> {
        let subtree = self.subtree(is_public);
        let trash_name = format!("{TRASH_PREFIX}{name}-{}", Uuid::new_v4().simple());
        self.mover.move_dir(subtree, name, subtree, &trash_name)?;
        Ok(Trashed {
            is_public,
            name: trash_name,
        })
    }

    fn restore(&self, item: &Trashed, name: &str) {
        let subtree = self.subtree(item.is_public);
        if let Err(error) = self.mover.move_dir(subtree, &item.name, subtree, name) {
            tracing::error!("failed to restore superseded build '{name}': {error}");
        }
    }

    fn purge(&self, item: &Trashed) {
        if let Err(error) = remove_tree_if_present(self.subtree(item.is_public), &item.name) {
            tracing::warn!("failed to delete superseded build '{}': {error}", item.name);
        }
    }
}

/// Opens the parent of `path` and returns it with the final component.
fn open_parent(path: &Utf8Path) -> io::Result<(Dir, &str)> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("staged path '{path}' has no final component"),
        )
    })?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name))
}

/// Best-effort removal of staged content after a failed create.
fn discard_staged(staged_root: &Utf8Path) {
    let removal = open_parent(staged_root).and_then(|(dir, name)| remove_tree_if_present(&dir, name));
    if let Err(error) = removal {
        tracing::warn!("failed to remove staged content '{staged_root}': {error}");
    }
}
