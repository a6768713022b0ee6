use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::models::AccessToken;
use crate::error::AppError;
use crate::store::{ChangeSet, ContentLayout, ContentStore, Contents, Entry, Listing};

/// Content store over a local working tree (development mode).
///
/// Paths are the same repository-relative paths the remote store uses,
/// resolved against `root`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    layout: ContentLayout,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, layout: ContentLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a repository-relative path into the root, refusing anything that
    /// could step outside it.
    fn resolve(&self, relative: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::BadRequest(format!(
                "Invalid content path '{}'",
                relative.display()
            )));
        }
        Ok(self.root.join(relative))
    }

    /// Remove now-empty directories from `dir` upwards, stopping at the root.
    async fn prune_empty_dirs(&self, mut dir: PathBuf) {
        while dir.starts_with(&self.root) && dir != self.root {
            // remove_dir fails on non-empty directories, which ends the walk.
            if tokio::fs::remove_dir(&dir).await.is_err() {
                break;
            }
            tracing::debug!(dir = %dir.display(), "Removed empty directory");
            if !dir.pop() {
                break;
            }
        }
    }
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::Storage(format!("Failed to {action} '{}': {err}", path.display()))
}

#[async_trait]
impl ContentStore for LocalStore {
    fn layout(&self) -> &ContentLayout {
        &self.layout
    }

    fn with_credentials(&self, _token: &AccessToken) -> Arc<dyn ContentStore> {
        Arc::new(self.clone())
    }

    async fn list_entries(
        &self,
        dir: &str,
        contents: Contents<'_>,
    ) -> Result<Option<Listing>, AppError> {
        let path = self.resolve(dir)?;
        let mut read_dir = match tokio::fs::read_dir(&path).await {
            Ok(read_dir) => read_dir,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                return Ok(None)
            }
            Err(e) => return Err(storage_error("list", &path, e)),
        };

        let mut entries = Vec::new();
        while let Some(item) = read_dir
            .next_entry()
            .await
            .map_err(|e| storage_error("list", &path, e))?
        {
            let Ok(name) = item.file_name().into_string() else {
                continue;
            };
            let file_type = item
                .file_type()
                .await
                .map_err(|e| storage_error("inspect", &item.path(), e))?;
            if file_type.is_dir() {
                entries.push(Entry::dir(name));
            } else if file_type.is_file() {
                let text = if contents.wants(&name) {
                    match tokio::fs::read_to_string(item.path()).await {
                        Ok(text) => Some(text),
                        // Binary files (images next to content) have no text form.
                        Err(e) if e.kind() == ErrorKind::InvalidData => None,
                        Err(e) => return Err(storage_error("read", &item.path(), e)),
                    }
                } else {
                    None
                };
                entries.push(Entry::file(name, text));
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Some(Listing {
            entries,
            revision: None,
        }))
    }

    /// Apply additions, then deletions, one file at a time. Stops at the
    /// first failure and reports what had already been applied.
    async fn commit(&self, changes: ChangeSet) -> Result<(), AppError> {
        let mut applied: Vec<String> = Vec::new();
        let partial = |applied: &Vec<String>, failed: &str, err: AppError| {
            if applied.is_empty() {
                return err;
            }
            tracing::error!(failed, applied = ?applied, "Change set applied only partially: {err}");
            AppError::PartialWrite {
                applied: applied.clone(),
                failed: failed.to_string(),
                reason: err.to_string(),
            }
        };

        for addition in &changes.additions {
            let path = match self.resolve(&addition.path) {
                Ok(path) => path,
                Err(e) => return Err(partial(&applied, &addition.path, e)),
            };
            if let Some(parent) = path.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return Err(partial(
                        &applied,
                        &addition.path,
                        storage_error("create directory", parent, e),
                    ));
                }
            }
            if let Err(e) = tokio::fs::write(&path, &addition.contents).await {
                return Err(partial(&applied, &addition.path, storage_error("write", &path, e)));
            }
            applied.push(addition.path.clone());
        }

        for deletion in &changes.deletions {
            let path = match self.resolve(deletion) {
                Ok(path) => path,
                Err(e) => return Err(partial(&applied, deletion, e)),
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(partial(&applied, deletion, storage_error("delete", &path, e))),
            }
            applied.push(deletion.clone());
            if let Some(parent) = path.parent() {
                self.prune_empty_dirs(parent.to_path_buf()).await;
            }
        }

        tracing::info!(message = %changes.message, files = applied.len(), "Applied local change set");
        Ok(())
    }
}
